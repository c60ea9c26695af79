//! Messages exchanged with open client pages

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::push::NotificationDisplay;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    NotificationsUpdate {
        notifications: Vec<serde_json::Value>,
    },
    SkipWaiting,
    CacheUpdated,
    ShowNotification {
        notification: NotificationDisplay,
    },
    OpenWindow {
        url: String,
    },
}

/// Fan-out channel to every open client context
#[derive(Debug, Clone)]
pub struct ClientHub {
    sender: broadcast::Sender<ClientMessage>,
}

impl ClientHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientMessage> {
        self.sender.subscribe()
    }

    /// Number of currently open clients
    pub fn client_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Post `message` to every open client, returning how many received it
    pub fn broadcast(&self, message: ClientMessage) -> usize {
        match self.sender.send(message) {
            Ok(delivered) => delivered,
            Err(_) => {
                debug!("No open clients to notify");
                0
            }
        }
    }
}

impl Default for ClientHub {
    fn default() -> Self {
        Self::new(64)
    }
}

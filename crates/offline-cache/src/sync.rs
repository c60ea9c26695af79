//! Background sync: deferred shipment replay and notification broadcast

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{OfflineCacheError, Result};
use crate::manager::OfflineCacheManager;
use crate::messages::ClientMessage;
use crate::store::request_key;
use crate::types::{HttpRequest, HttpResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncTag {
    #[serde(rename = "shipment-sync")]
    ShipmentSync,
    #[serde(rename = "notification-sync")]
    NotificationSync,
}

impl FromStr for SyncTag {
    type Err = OfflineCacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "shipment-sync" => Ok(SyncTag::ShipmentSync),
            "notification-sync" => Ok(SyncTag::NotificationSync),
            other => Err(OfflineCacheError::UnknownSyncTag(other.to_string())),
        }
    }
}

impl fmt::Display for SyncTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncTag::ShipmentSync => "shipment-sync",
            SyncTag::NotificationSync => "notification-sync",
        })
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ShipmentSyncReport {
    /// Submissions accepted upstream and removed from the queue
    pub replayed: Vec<String>,
    /// Submissions left queued for the next sync
    pub remaining: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "tag", rename_all = "kebab-case")]
pub enum SyncOutcome {
    #[serde(rename = "shipment-sync")]
    Shipments(ShipmentSyncReport),
    #[serde(rename = "notification-sync")]
    Notifications { delivered: usize },
}

impl OfflineCacheManager {
    pub async fn handle_sync(&self, tag: SyncTag) -> Result<SyncOutcome> {
        info!(tag = %tag, "Background sync triggered");
        match tag {
            SyncTag::ShipmentSync => Ok(SyncOutcome::Shipments(self.sync_shipments().await)),
            SyncTag::NotificationSync => {
                let delivered = self.sync_notifications().await?;
                Ok(SyncOutcome::Notifications { delivered })
            }
        }
    }

    /// Whether a failed passthrough of `request` should be queued for replay
    pub fn is_deferrable(&self, request: &HttpRequest) -> bool {
        !request.is_get() && request.url.as_str().contains(&self.config.shipment_marker)
    }

    /// Queue a mutating request in the dynamic store for the next shipment
    /// sync. Queued requests are pinned, so cache pressure never drops them;
    /// once `max_deferred` are waiting, new ones are refused.
    pub async fn defer(&self, request: HttpRequest) -> Result<String> {
        let key = request_key(&request);
        let store = self.storage.open(&self.config.dynamic_cache).await;
        store
            .pin(request, HttpResponse::new(202, "Accepted"))
            .await?;
        info!(key = %key, "Queued request for background sync");
        Ok(key)
    }

    /// Replay queued shipment submissions, dropping only those that succeed
    pub async fn sync_shipments(&self) -> ShipmentSyncReport {
        let store = self.storage.open(&self.config.dynamic_cache).await;
        let pending: Vec<HttpRequest> = store
            .keys()
            .await
            .into_iter()
            .filter(|request| self.is_deferrable(request))
            .collect();

        let mut report = ShipmentSyncReport::default();
        for request in pending {
            let key = request_key(&request);
            match self.fetcher.fetch(&request).await {
                Ok(response) if response.ok() => {
                    store.delete(&request).await;
                    info!(url = %request.url, "Synced shipment");
                    report.replayed.push(key);
                }
                Ok(response) => {
                    warn!(url = %request.url, status = response.status, "Shipment rejected, keeping it queued");
                    report.remaining.push(key);
                }
                Err(e) => {
                    error!(url = %request.url, error = %e, "Failed to sync shipment");
                    report.remaining.push(key);
                }
            }
        }
        report
    }

    /// Fetch the notification list and post it to every open client
    pub async fn sync_notifications(&self) -> Result<usize> {
        let notifications = self.backend.list_notifications().await.map_err(|e| {
            error!(error = %e, "Failed to sync notifications");
            e
        })?;

        let delivered = self
            .clients
            .broadcast(ClientMessage::NotificationsUpdate { notifications });
        debug!(delivered, "Broadcast notification update");
        Ok(delivered)
    }
}

/// Poll the notification endpoint every `every` while clients are open
pub fn spawn_notification_poller(
    manager: Arc<OfflineCacheManager>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if manager.clients().client_count() == 0 {
                continue;
            }
            if let Err(e) = manager.sync_notifications().await {
                debug!(error = %e, "Notification poll failed");
            }
        }
    })
}

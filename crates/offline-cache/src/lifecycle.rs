//! Worker lifecycle state

use serde::Serialize;
use std::fmt;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{OfflineCacheError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    #[default]
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl WorkerState {
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Parsed, Installing)
                | (Installing, Installed)
                | (Installed, Activating)
                | (Activating, Activated)
                | (Installing | Installed | Activating | Activated, Redundant)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
pub struct Lifecycle {
    state: RwLock<WorkerState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Move to `next`, returning the previous state
    pub async fn transition(&self, next: WorkerState) -> Result<WorkerState> {
        let mut state = self.state.write().await;
        let current = *state;
        if !current.can_transition_to(next) {
            return Err(OfflineCacheError::InvalidTransition {
                from: current,
                to: next,
            });
        }
        *state = next;
        info!(from = %current, to = %next, "Worker state changed");
        Ok(current)
    }

    /// Move to `next` only if currently in `from`
    pub async fn transition_from(&self, from: WorkerState, next: WorkerState) -> bool {
        let mut state = self.state.write().await;
        if *state != from || !from.can_transition_to(next) {
            return false;
        }
        *state = next;
        info!(from = %from, to = %next, "Worker state changed");
        true
    }
}

//! Offline cache manager for the Tovar Taxi web app
//!
//! Owns two versioned cache stores (static and dynamic), routes every GET
//! request through a cache-first or network-first strategy, prunes stale
//! store generations on activation, replays deferred shipment submissions,
//! broadcasts notification updates to open clients and turns push payloads
//! into displayable notifications.

pub mod backend;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod lifecycle;
pub mod manager;
pub mod messages;
pub mod offline;
pub mod push;
pub mod rules;
pub mod store;
pub mod sync;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{application_server_key, csrf_token_from_cookie, BackendClient};
pub use config::{InstallMode, OfflineCacheConfig};
pub use error::{OfflineCacheError, Result};
pub use fetcher::{Fetcher, HttpFetcher};
pub use lifecycle::WorkerState;
pub use manager::{ActivateReport, FetchOutcome, InstallReport, OfflineCacheManager};
pub use messages::{ClientHub, ClientMessage};
pub use push::{ClickOutcome, NotificationDisplay, PushPayload};
pub use rules::{Matcher, Rule, RuleSet, Strategy};
pub use store::{CacheStorage, CacheStore, StoredEntry};
pub use sync::{spawn_notification_poller, ShipmentSyncReport, SyncOutcome, SyncTag};
pub use types::{Destination, HttpRequest, HttpResponse, ResponseSource, StoreStats};

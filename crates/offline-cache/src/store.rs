//! Named cache stores
//!
//! A [`CacheStore`] maps a request identity to the stored response. Stores
//! have no per-entry expiry; a whole store generation is dropped at once
//! through [`CacheStorage::delete`]. Ordinary entries share a byte budget
//! and may be evicted under pressure. Pinned entries (deferred submissions)
//! are never evicted; the store refuses new ones once its pin limit is hit.
//!
//! The proxy serves many browsers from one set of stores, so entries written
//! for a request that carries a session credential are partitioned by a
//! digest of that credential and only ever served back to the same session.

use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{OfflineCacheError, Result};
use crate::types::{HttpRequest, HttpResponse, StoreStats};

/// A request/response pair held by a store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    pub request: HttpRequest,
    pub response: HttpResponse,
    pub cached_at: DateTime<Utc>,
}

fn short_digest(bytes: &[u8]) -> String {
    let mut digest = hex::encode(Sha256::digest(bytes));
    digest.truncate(16);
    digest
}

/// Identity of a request regardless of who sent it
fn shared_key(request: &HttpRequest) -> String {
    let mut url = request.url.clone();
    url.set_fragment(None);
    let method = request.method.to_ascii_uppercase();

    match request.body.as_deref() {
        Some(body) if !body.is_empty() => format!("{} {}#{}", method, url, short_digest(body)),
        _ => format!("{} {}", method, url),
    }
}

/// Identity of a request inside a store.
///
/// `METHOD URL` without the fragment. Requests carrying a body get a short
/// body digest appended so distinct submissions to one URL stay distinct.
/// Requests carrying a session credential get a digest of it appended.
pub fn request_key(request: &HttpRequest) -> String {
    let key = shared_key(request);
    match request.credential() {
        Some(credential) => format!("{}@{}", key, short_digest(credential.as_bytes())),
        None => key,
    }
}

/// Approximate bytes held by an entry
fn weigh(key: &str, entry: &StoredEntry) -> u32 {
    let headers: usize = entry
        .response
        .headers
        .iter()
        .chain(entry.request.headers.iter())
        .map(|(k, v)| k.len() + v.len())
        .sum();
    let size = key.len()
        + headers
        + entry.response.body.len()
        + entry.request.body.as_ref().map_or(0, Vec::len);
    u32::try_from(size).unwrap_or(u32::MAX)
}

fn stored(request: HttpRequest, response: HttpResponse) -> Arc<StoredEntry> {
    Arc::new(StoredEntry {
        request,
        // Session cookies belong to the response that set them, never to a replay
        response: response.without_header("set-cookie"),
        cached_at: Utc::now(),
    })
}

#[derive(Clone)]
pub struct CacheStore {
    name: String,
    entries: Cache<String, Arc<StoredEntry>>,
    pinned: Arc<RwLock<HashMap<String, Arc<StoredEntry>>>>,
    max_pinned: usize,
}

impl CacheStore {
    pub fn new(name: impl Into<String>, max_bytes: u64, max_pinned: usize) -> Self {
        let name = name.into();
        let entries = Cache::builder()
            .name(&name)
            .weigher(|key: &String, entry: &Arc<StoredEntry>| weigh(key, entry))
            .max_capacity(max_bytes)
            .build();
        Self {
            name,
            entries,
            pinned: Arc::new(RwLock::new(HashMap::new())),
            max_pinned,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, key: &str) -> Option<Arc<StoredEntry>> {
        if let Some(entry) = self.entries.get(key).await {
            return Some(entry);
        }
        self.pinned.read().await.get(key).cloned()
    }

    /// Stored response for `request`. A request with a session falls back to
    /// the entry stored for anonymous callers, never to another session's.
    pub async fn match_request(&self, request: &HttpRequest) -> Option<HttpResponse> {
        let key = request_key(request);
        if let Some(entry) = self.lookup(&key).await {
            return Some(entry.response.clone());
        }
        if request.credential().is_some() {
            return self
                .lookup(&shared_key(request))
                .await
                .map(|entry| entry.response.clone());
        }
        None
    }

    /// Store a copy, replacing any previous entry for the same identity
    pub async fn put(&self, request: HttpRequest, response: HttpResponse) {
        let key = request_key(&request);
        debug!(store = %self.name, key = %key, status = response.status, "Caching response");
        self.entries.insert(key, stored(request, response)).await;
    }

    /// Store a copy that is exempt from eviction
    pub async fn pin(&self, request: HttpRequest, response: HttpResponse) -> Result<()> {
        let key = request_key(&request);
        let mut pinned = self.pinned.write().await;
        if !pinned.contains_key(&key) && pinned.len() >= self.max_pinned {
            warn!(store = %self.name, limit = self.max_pinned, "Pinned entry limit reached");
            return Err(OfflineCacheError::StoreFull(self.name.clone()));
        }
        debug!(store = %self.name, key = %key, "Pinning entry");
        pinned.insert(key, stored(request, response));
        Ok(())
    }

    /// Remove the entry for `request`, returning whether one existed
    pub async fn delete(&self, request: &HttpRequest) -> bool {
        let key = request_key(request);
        let evictable = self.entries.remove(&key).await.is_some();
        let pinned = self.pinned.write().await.remove(&key).is_some();
        evictable || pinned
    }

    /// Snapshot of all entries, in no particular order
    pub async fn entries(&self) -> Vec<Arc<StoredEntry>> {
        let mut entries: Vec<Arc<StoredEntry>> =
            self.entries.iter().map(|(_, entry)| entry).collect();
        entries.extend(self.pinned.read().await.values().cloned());
        entries
    }

    /// Requests of all stored entries
    pub async fn keys(&self) -> Vec<HttpRequest> {
        self.entries()
            .await
            .iter()
            .map(|e| e.request.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.iter().count() + self.pinned.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Bytes held by evictable entries
    pub fn weighted_size(&self) -> u64 {
        self.entries.weighted_size()
    }

    /// Apply pending evictions so sizes and counts are current
    pub async fn run_maintenance(&self) {
        self.entries.run_pending_tasks().await;
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("name", &self.name)
            .field("max_pinned", &self.max_pinned)
            .finish()
    }
}

/// All named stores of one origin, in creation order
#[derive(Debug)]
pub struct CacheStorage {
    stores: RwLock<Vec<CacheStore>>,
    max_bytes: u64,
    max_pinned: usize,
}

impl CacheStorage {
    pub fn new(max_bytes: u64, max_pinned: usize) -> Self {
        Self {
            stores: RwLock::new(Vec::new()),
            max_bytes,
            max_pinned,
        }
    }

    /// Open a store, creating it if it doesn't exist yet
    pub async fn open(&self, name: &str) -> CacheStore {
        if let Some(store) = self.get(name).await {
            return store;
        }

        let mut stores = self.stores.write().await;
        // Another opener may have created it while we waited for the lock
        if let Some(store) = stores.iter().find(|s| s.name() == name) {
            return store.clone();
        }
        debug!(store = %name, "Creating cache store");
        let store = CacheStore::new(name, self.max_bytes, self.max_pinned);
        stores.push(store.clone());
        store
    }

    pub async fn get(&self, name: &str) -> Option<CacheStore> {
        self.stores
            .read()
            .await
            .iter()
            .find(|s| s.name() == name)
            .cloned()
    }

    pub async fn has(&self, name: &str) -> bool {
        self.get(name).await.is_some()
    }

    /// Names of all stores
    pub async fn keys(&self) -> Vec<String> {
        self.stores
            .read()
            .await
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    /// Drop a whole store, returning whether it existed
    pub async fn delete(&self, name: &str) -> bool {
        let mut stores = self.stores.write().await;
        let before = stores.len();
        stores.retain(|s| s.name() != name);
        stores.len() != before
    }

    /// First hit across all stores, searched in creation order
    pub async fn match_request(&self, request: &HttpRequest) -> Option<HttpResponse> {
        let stores: Vec<CacheStore> = self.stores.read().await.clone();
        for store in stores {
            if let Some(response) = store.match_request(request).await {
                return Some(response);
            }
        }
        None
    }

    pub async fn stats(&self) -> Vec<StoreStats> {
        let stores: Vec<CacheStore> = self.stores.read().await.clone();
        let mut stats = Vec::with_capacity(stores.len());
        for store in stores {
            store.run_maintenance().await;
            stats.push(StoreStats {
                name: store.name().to_string(),
                entries: store.len().await,
            });
        }
        stats
    }
}

impl Default for CacheStorage {
    fn default() -> Self {
        Self::new(
            crate::config::DEFAULT_MAX_STORE_BYTES,
            crate::config::DEFAULT_MAX_DEFERRED,
        )
    }
}

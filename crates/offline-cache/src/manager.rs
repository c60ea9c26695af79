//! The offline cache manager
//!
//! Owns the static and dynamic stores and answers the host's install,
//! activate and fetch events. Sync, push and message handling live in
//! `sync.rs` and below.

use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::backend::BackendClient;
use crate::config::{InstallMode, OfflineCacheConfig};
use crate::error::Result;
use crate::fetcher::Fetcher;
use crate::lifecycle::{Lifecycle, WorkerState};
use crate::messages::{ClientHub, ClientMessage};
use crate::offline::{self, CACHE_FIRST_UNAVAILABLE, NETWORK_FIRST_UNAVAILABLE};
use crate::push::{self, ClickOutcome, NotificationDisplay, PushPayload};
use crate::rules::{RuleSet, Strategy};
use crate::store::CacheStorage;
use crate::types::{Destination, HttpRequest, HttpResponse, ResponseSource};

/// Result of the install phase
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub cached: Vec<String>,
    pub failed: Vec<String>,
    pub mode: InstallMode,
    /// Activate right away instead of waiting for old instances to release
    pub skip_waiting: bool,
}

/// Result of the activate phase
#[derive(Debug, Clone, Serialize)]
pub struct ActivateReport {
    pub deleted: Vec<String>,
    /// Already-open pages are now served by this instance
    pub clients_claimed: bool,
}

/// How a fetch event was answered
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Not intercepted; the host sends the request on untouched
    Passthrough,
    Respond {
        response: HttpResponse,
        source: ResponseSource,
    },
}

pub struct OfflineCacheManager {
    pub(crate) config: OfflineCacheConfig,
    rules: RuleSet,
    pub(crate) storage: CacheStorage,
    pub(crate) fetcher: Arc<dyn Fetcher>,
    pub(crate) backend: BackendClient,
    lifecycle: Lifecycle,
    pub(crate) clients: ClientHub,
}

impl OfflineCacheManager {
    pub fn new(config: OfflineCacheConfig, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        let storage = CacheStorage::new(config.max_store_bytes, config.max_deferred);
        Self::with_storage(config, fetcher, storage)
    }

    /// Manager over pre-existing storage, e.g. stores left by an older version
    pub fn with_storage(
        config: OfflineCacheConfig,
        fetcher: Arc<dyn Fetcher>,
        storage: CacheStorage,
    ) -> Result<Self> {
        let rules = RuleSet::from_config(&config)?;
        let backend = BackendClient::new(
            fetcher.clone(),
            config.origin.clone(),
            config.notifications_endpoint.clone(),
            config.push_subscription_endpoint.clone(),
        );

        Ok(Self {
            config,
            rules,
            storage,
            fetcher,
            backend,
            lifecycle: Lifecycle::new(),
            clients: ClientHub::default(),
        })
    }

    pub fn config(&self) -> &OfflineCacheConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub fn backend(&self) -> &BackendClient {
        &self.backend
    }

    pub fn clients(&self) -> &ClientHub {
        &self.clients
    }

    pub async fn state(&self) -> WorkerState {
        self.lifecycle.state().await
    }

    pub fn classify(&self, request: &HttpRequest) -> Strategy {
        self.rules.classify(request)
    }

    /// Store names that are not one of the two current generations
    pub fn stale_stores(&self, existing: &[String]) -> Vec<String> {
        let current = self.config.current_stores();
        existing
            .iter()
            .filter(|name| !current.contains(&name.as_str()))
            .cloned()
            .collect()
    }

    /// Populate the static store from the manifest
    pub async fn install(&self) -> Result<InstallReport> {
        self.lifecycle.transition(WorkerState::Installing).await?;
        info!(mode = %self.config.install_mode, "Installing offline cache");

        let urls = match self.config.manifest_urls() {
            Ok(urls) => urls,
            Err(e) => {
                self.lifecycle.transition(WorkerState::Redundant).await?;
                return Err(e);
            }
        };

        let results = join_all(urls.into_iter().map(|url| async move {
            let request = HttpRequest::get(url);
            let result = self.fetcher.fetch(&request).await;
            (request, result)
        }))
        .await;

        let mut fetched = Vec::new();
        let mut failed = Vec::new();
        for (request, result) in results {
            match result {
                Ok(response) if response.ok() => fetched.push((request, response)),
                Ok(response) => {
                    warn!(url = %request.url, status = response.status, "Manifest entry returned error status");
                    failed.push(request.url.to_string());
                }
                Err(e) => {
                    warn!(url = %request.url, error = %e, "Failed to fetch manifest entry");
                    failed.push(request.url.to_string());
                }
            }
        }

        let keep = failed.is_empty() || self.config.install_mode == InstallMode::BestEffort;
        let mut cached = Vec::new();
        if keep {
            let store = self.storage.open(&self.config.static_cache).await;
            for (request, response) in fetched {
                cached.push(request.url.to_string());
                store.put(request, response).await;
            }
        } else {
            error!(
                failed = failed.len(),
                "Failed to cache static files, manifest left uncached"
            );
        }

        self.lifecycle.transition(WorkerState::Installed).await?;
        info!(cached = cached.len(), failed = failed.len(), "Install complete");
        if !cached.is_empty() {
            self.clients.broadcast(ClientMessage::CacheUpdated);
        }

        Ok(InstallReport {
            cached,
            failed,
            mode: self.config.install_mode,
            skip_waiting: true,
        })
    }

    /// Drop every store generation that is not current and claim open clients
    pub async fn activate(&self) -> Result<ActivateReport> {
        // A SKIP_WAITING message may already have moved us to Activating
        self.lifecycle
            .transition_from(WorkerState::Installed, WorkerState::Activating)
            .await;
        self.lifecycle.transition(WorkerState::Activated).await?;

        let existing = self.storage.keys().await;
        let mut deleted = Vec::new();
        for name in self.stale_stores(&existing) {
            info!(store = %name, "Deleting old cache");
            if self.storage.delete(&name).await {
                deleted.push(name);
            }
        }

        Ok(ActivateReport {
            deleted,
            clients_claimed: true,
        })
    }

    /// Answer a fetch event
    pub async fn handle_fetch(&self, request: &HttpRequest) -> FetchOutcome {
        if !request.is_get() {
            debug!(method = %request.method, url = %request.url, "Not intercepting non-GET request");
            return FetchOutcome::Passthrough;
        }

        let strategy = self.classify(request);
        debug!(url = %request.url, strategy = %strategy, "Routing request");

        let (response, source) = match strategy {
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::NetworkFirst => self.network_first(request).await,
        };
        FetchOutcome::Respond { response, source }
    }

    async fn cache_first(&self, request: &HttpRequest) -> (HttpResponse, ResponseSource) {
        if let Some(cached) = self.storage.match_request(request).await {
            return (cached, ResponseSource::Cache);
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.ok() {
                    let store = self.storage.open(&self.config.static_cache).await;
                    store.put(request.clone(), response.clone()).await;
                }
                (response, ResponseSource::Network)
            }
            Err(e) => {
                error!(url = %request.url, error = %e, "Cache first failed");
                (
                    offline::service_unavailable(CACHE_FIRST_UNAVAILABLE),
                    ResponseSource::Fallback,
                )
            }
        }
    }

    async fn network_first(&self, request: &HttpRequest) -> (HttpResponse, ResponseSource) {
        let failure = match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.ok() {
                    let store = self.storage.open(&self.config.dynamic_cache).await;
                    store.put(request.clone(), response.clone()).await;
                }
                return (response, ResponseSource::Network);
            }
            Err(e) => e,
        };

        debug!(url = %request.url, error = %failure, "Network failed, trying cache");
        if let Some(cached) = self.storage.match_request(request).await {
            return (cached, ResponseSource::Cache);
        }

        if request.destination == Destination::Document {
            if let Some(shell) = self.cached_app_shell(request).await {
                return (shell, ResponseSource::Cache);
            }
            return (offline::offline_page(), ResponseSource::Fallback);
        }

        (
            offline::service_unavailable(NETWORK_FIRST_UNAVAILABLE),
            ResponseSource::Fallback,
        )
    }

    /// App shell as cached for the same session as `request`, or anonymously
    async fn cached_app_shell(&self, request: &HttpRequest) -> Option<HttpResponse> {
        let url = self.config.resolve(&self.config.app_shell).ok()?;
        let shell = request
            .headers
            .iter()
            .filter(|(name, _)| {
                name.eq_ignore_ascii_case("cookie") || name.eq_ignore_ascii_case("authorization")
            })
            .fold(HttpRequest::get(url), |shell, (name, value)| {
                shell.with_header(name.as_str(), value.as_str())
            });
        self.storage.match_request(&shell).await
    }

    /// Handle a message posted by a client page. Returns whether it changed anything.
    pub async fn handle_message(&self, message: &ClientMessage) -> bool {
        match message {
            ClientMessage::SkipWaiting => {
                let skipped = self
                    .lifecycle
                    .transition_from(WorkerState::Installed, WorkerState::Activating)
                    .await;
                debug!(skipped, "SKIP_WAITING received");
                skipped
            }
            other => {
                debug!(message = ?other, "Ignoring client message");
                false
            }
        }
    }

    /// Turn a push payload into a notification and show it on open clients
    pub fn handle_push(&self, data: Option<&[u8]>) -> NotificationDisplay {
        let notification = NotificationDisplay::from_payload(&PushPayload::parse(data));
        info!(body = %notification.body, url = %notification.open_url(), "Push notification received");
        self.clients.broadcast(ClientMessage::ShowNotification {
            notification: notification.clone(),
        });
        notification
    }

    /// Resolve a notification click, opening a window on clients when asked to
    pub fn handle_notification_click(
        &self,
        action: Option<&str>,
        data_url: Option<&str>,
    ) -> ClickOutcome {
        let outcome = push::notification_click(action, data_url);
        if let ClickOutcome::OpenWindow { url } = &outcome {
            self.clients
                .broadcast(ClientMessage::OpenWindow { url: url.clone() });
        }
        outcome
    }
}

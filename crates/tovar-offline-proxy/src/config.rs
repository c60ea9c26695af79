use offline_cache::config::{DEFAULT_MAX_DEFERRED, DEFAULT_MAX_STORE_BYTES};
use offline_cache::{InstallMode, OfflineCacheConfig};
use std::env;
use url::Url;

use crate::error::{ProxyError, Result};

/// Proxy configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub upstream_url: Url,
    pub cors_origins: Vec<String>,
    pub static_cache: Option<String>,
    pub dynamic_cache: Option<String>,
    pub install_mode: InstallMode,
    /// Run install and activate before serving
    pub auto_install: bool,
    pub notification_poll_secs: u64,
    pub upstream_timeout_secs: u64,
    /// Byte budget of each cache store
    pub max_cache_size: u64,
    /// Queued shipment submissions before new ones get 503
    pub max_deferred: usize,
}

impl Config {
    /// Parse configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = lookup("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(3005);

        let upstream = lookup("UPSTREAM_URL").unwrap_or_else(|| "http://localhost:8000".to_string());
        let upstream_url = Url::parse(&upstream)
            .map_err(|e| ProxyError::Config(format!("UPSTREAM_URL {}: {}", upstream, e)))?;

        let cors_origins = lookup("CORS_ORIGINS")
            .map(|s| s.split(',').map(|o| o.trim().to_string()).collect())
            .unwrap_or_else(|| vec!["*".to_string()]);

        let install_mode = match lookup("INSTALL_MODE") {
            Some(mode) => mode
                .parse()
                .map_err(|e| ProxyError::Config(format!("INSTALL_MODE: {}", e)))?,
            None => InstallMode::default(),
        };

        let auto_install = lookup("AUTO_INSTALL")
            .map(|v| !matches!(v.trim(), "0" | "false" | "no"))
            .unwrap_or(true);

        let notification_poll_secs = lookup("NOTIFICATION_POLL_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(10);

        let upstream_timeout_secs = lookup("UPSTREAM_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);

        let max_cache_size = lookup("MAX_CACHE_SIZE")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|bytes| *bytes > 0)
            .unwrap_or(DEFAULT_MAX_STORE_BYTES);

        let max_deferred = lookup("MAX_DEFERRED")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_DEFERRED);

        Ok(Self {
            port,
            upstream_url,
            cors_origins,
            static_cache: lookup("STATIC_CACHE"),
            dynamic_cache: lookup("DYNAMIC_CACHE"),
            install_mode,
            auto_install,
            notification_poll_secs,
            upstream_timeout_secs,
            max_cache_size,
            max_deferred,
        })
    }

    /// Cache manager settings for the configured upstream
    pub fn cache_config(&self) -> OfflineCacheConfig {
        let mut config = OfflineCacheConfig::new(self.upstream_url.clone());
        if let Some(name) = &self.static_cache {
            config.static_cache = name.clone();
        }
        if let Some(name) = &self.dynamic_cache {
            config.dynamic_cache = name.clone();
        }
        config.install_mode = self.install_mode;
        config.max_store_bytes = self.max_cache_size;
        config.max_deferred = self.max_deferred;
        config
    }
}

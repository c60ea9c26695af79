//! Cache manager configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::{OfflineCacheError, Result};

pub const DEFAULT_STATIC_CACHE: &str = "tovar-taxi-static-v1";
pub const DEFAULT_DYNAMIC_CACHE: &str = "tovar-taxi-dynamic-v1";

pub const DEFAULT_MAX_STORE_BYTES: u64 = 64 * 1024 * 1024;
pub const DEFAULT_MAX_DEFERRED: usize = 1_000;

/// App shell and assets fetched on install
pub const DEFAULT_STATIC_MANIFEST: &[&str] = &[
    "/",
    "/static/css/animations.css",
    "/static/css/responsive.css",
    "/static/css/popup-styles.css",
    "/static/js/modern-effects.js",
    "/static/js/notifications.js",
    "/static/images/TTaxi9_icon.ico.png",
    "/static/images/TTaxi9_icon.ico.png",
    "/static/manifest.json",
    "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/css/bootstrap.min.css",
    "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css",
    "https://fonts.googleapis.com/css2?family=Inter:wght@300;400;500;600;700&display=swap",
    "https://fonts.googleapis.com/css2?family=Montserrat:wght@400;600;700&display=swap",
];

/// Pages that should stay usable offline
pub const DEFAULT_API_ENDPOINTS: &[&str] = &[
    "/transport/shipper-dashboard/",
    "/transport/carrier-dashboard/",
    "/transport/notifications/",
    "/transport/my-tours/",
    "/transport/manage-vehicles/",
];

/// How install treats a manifest with unreachable entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallMode {
    /// Store every entry that fetched successfully
    #[default]
    BestEffort,
    /// Store nothing unless every entry fetched successfully
    AllOrNothing,
}

impl FromStr for InstallMode {
    type Err = OfflineCacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best-effort" | "best_effort" => Ok(InstallMode::BestEffort),
            "all-or-nothing" | "all_or_nothing" => Ok(InstallMode::AllOrNothing),
            other => Err(OfflineCacheError::InvalidRequest(format!(
                "unknown install mode: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for InstallMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InstallMode::BestEffort => "best-effort",
            InstallMode::AllOrNothing => "all-or-nothing",
        })
    }
}

/// Everything the manager needs to know about the app it fronts
#[derive(Debug, Clone)]
pub struct OfflineCacheConfig {
    /// Origin of the application; relative manifest entries resolve against it
    pub origin: Url,
    pub static_cache: String,
    pub dynamic_cache: String,
    pub static_manifest: Vec<String>,
    pub api_endpoints: Vec<String>,
    /// Substring marking versioned static assets
    pub static_path_marker: String,
    /// Substring identifying deferred shipment submissions
    pub shipment_marker: String,
    pub notifications_endpoint: String,
    pub push_subscription_endpoint: String,
    /// Cached document served to offline navigations before the built-in page
    pub app_shell: String,
    pub install_mode: InstallMode,
    /// Byte budget of each store's evictable entries
    pub max_store_bytes: u64,
    /// Deferred submissions held outside eviction before new ones are refused
    pub max_deferred: usize,
}

impl OfflineCacheConfig {
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            static_cache: DEFAULT_STATIC_CACHE.to_string(),
            dynamic_cache: DEFAULT_DYNAMIC_CACHE.to_string(),
            static_manifest: DEFAULT_STATIC_MANIFEST.iter().map(|s| s.to_string()).collect(),
            api_endpoints: DEFAULT_API_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
            static_path_marker: "/static/".to_string(),
            shipment_marker: "/transport/create-shipment/".to_string(),
            notifications_endpoint: "/transport/api/notifications/".to_string(),
            push_subscription_endpoint: "/transport/api/push-subscription/".to_string(),
            app_shell: "/".to_string(),
            install_mode: InstallMode::default(),
            max_store_bytes: DEFAULT_MAX_STORE_BYTES,
            max_deferred: DEFAULT_MAX_DEFERRED,
        }
    }

    /// Resolve a manifest entry or endpoint path against the app origin
    pub fn resolve(&self, entry: &str) -> Result<Url> {
        Ok(self.origin.join(entry)?)
    }

    /// Absolute manifest URLs, duplicates removed, in declaration order
    pub fn manifest_urls(&self) -> Result<Vec<Url>> {
        let mut urls: Vec<Url> = Vec::with_capacity(self.static_manifest.len());
        for entry in &self.static_manifest {
            let url = self.resolve(entry)?;
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        Ok(urls)
    }

    /// The two store names that survive activation
    pub fn current_stores(&self) -> [&str; 2] {
        [self.static_cache.as_str(), self.dynamic_cache.as_str()]
    }
}

impl Default for OfflineCacheConfig {
    fn default() -> Self {
        Self::new(Url::parse("http://localhost:8000/").expect("default origin is a valid URL"))
    }
}

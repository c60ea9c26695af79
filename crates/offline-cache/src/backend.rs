//! Client for the Tovar Taxi backend endpoints the worker consumes

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::error::{OfflineCacheError, Result};
use crate::fetcher::Fetcher;
use crate::types::{cookie_value, HttpRequest};

/// VAPID public key the push service subscription is created with
pub const APPLICATION_SERVER_KEY: &str =
    "BEl62iUYgUivxIkv69yViEuiBIa40HI80NM9f4EmgD4kFBqKJrXCLJSuJcQGJPZIiGNLI1CKUB4oRGX4TzfCBsQ";

pub const CSRF_COOKIE: &str = "csrftoken";
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// Raw bytes of [`APPLICATION_SERVER_KEY`]
pub fn application_server_key() -> Result<Vec<u8>> {
    Ok(URL_SAFE_NO_PAD.decode(APPLICATION_SERVER_KEY.trim_end_matches('='))?)
}

/// Pull the CSRF token out of a `Cookie` header value
pub fn csrf_token_from_cookie(cookie_header: &str) -> Option<String> {
    cookie_value(cookie_header, CSRF_COOKIE).map(str::to_string)
}

#[derive(Debug, Deserialize)]
struct ActionResponse {
    #[serde(default)]
    redirect: Option<String>,
}

pub struct BackendClient {
    fetcher: Arc<dyn Fetcher>,
    origin: Url,
    notifications_endpoint: String,
    push_subscription_endpoint: String,
}

impl BackendClient {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        origin: Url,
        notifications_endpoint: impl Into<String>,
        push_subscription_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            origin,
            notifications_endpoint: notifications_endpoint.into(),
            push_subscription_endpoint: push_subscription_endpoint.into(),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.origin.join(path)?)
    }

    fn json_post(&self, url: Url, body: &Value, csrf_token: Option<&str>) -> HttpRequest {
        HttpRequest::new("POST", url)
            .with_header("Content-Type", "application/json")
            .with_header(CSRF_HEADER, csrf_token.unwrap_or_default())
            .with_body(body.to_string().into_bytes())
    }

    /// Current unread notifications.
    ///
    /// Accepts either a bare array or an object carrying the list under
    /// `notifikacije` or `notifications`.
    pub async fn list_notifications(&self) -> Result<Vec<Value>> {
        let request = HttpRequest::get(self.endpoint(&self.notifications_endpoint)?)
            .with_header("Accept", "application/json")
            .with_header("X-Requested-With", "XMLHttpRequest");

        let response = self.fetcher.fetch(&request).await?;
        if !response.ok() {
            warn!(status = response.status, "Notification list request failed");
            return Err(OfflineCacheError::UnexpectedStatus(response.status));
        }

        let body: Value = serde_json::from_slice(&response.body)?;
        let notifications = match body {
            Value::Array(items) => items,
            Value::Object(mut map) => match map
                .remove("notifikacije")
                .or_else(|| map.remove("notifications"))
            {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };

        debug!(count = notifications.len(), "Fetched notifications");
        Ok(notifications)
    }

    pub async fn mark_read(&self, id: i64, csrf_token: Option<&str>) -> Result<()> {
        let url = self.endpoint(&format!("{}{}/read/", self.notifications_endpoint, id))?;
        let response = self
            .fetcher
            .fetch(&self.json_post(url, &json!({}), csrf_token))
            .await?;
        if !response.ok() {
            return Err(OfflineCacheError::UnexpectedStatus(response.status));
        }
        Ok(())
    }

    /// Perform `action` on a notification, returning where the page should go next
    pub async fn notification_action(
        &self,
        id: i64,
        action: &str,
        csrf_token: Option<&str>,
    ) -> Result<Option<String>> {
        let url = self.endpoint(&format!("{}{}/action/", self.notifications_endpoint, id))?;
        let response = self
            .fetcher
            .fetch(&self.json_post(url, &json!({ "action": action }), csrf_token))
            .await?;
        if !response.ok() {
            return Err(OfflineCacheError::UnexpectedStatus(response.status));
        }

        let parsed: ActionResponse = serde_json::from_slice(&response.body)?;
        Ok(parsed.redirect)
    }

    /// Forward a push subscription to the backend verbatim
    pub async fn register_push_subscription(
        &self,
        subscription: &Value,
        csrf_token: Option<&str>,
    ) -> Result<()> {
        let url = self.endpoint(&self.push_subscription_endpoint)?;
        let response = self
            .fetcher
            .fetch(&self.json_post(url, subscription, csrf_token))
            .await?;
        if !response.ok() {
            warn!(status = response.status, "Push subscription was rejected");
            return Err(OfflineCacheError::UnexpectedStatus(response.status));
        }
        debug!("Push subscription sent to server");
        Ok(())
    }
}

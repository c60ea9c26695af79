//! Request and response bodies of the control routes

use offline_cache::StoreStats;
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub worker_state: String,
    pub clients: usize,
    pub stores: Vec<StoreStats>,
}

/// A notification click as reported by the page
#[derive(Debug, Default, Deserialize)]
pub struct ClickRequest {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub action: String,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub redirect: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub handled: bool,
}

/// Answer to a shipment submission queued while the upstream was unreachable
#[derive(Debug, Serialize)]
pub struct DeferredResponse {
    pub queued: String,
    pub sync_tag: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushKeyResponse {
    pub application_server_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "ok".to_string(),
            uptime_secs: 3600,
            worker_state: "activated".to_string(),
            clients: 2,
            stores: vec![StoreStats {
                name: "tovar-taxi-static-v1".to_string(),
                entries: 11,
            }],
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["worker_state"], "activated");
        assert_eq!(json["stores"][0]["entries"], 11);
    }

    #[test]
    fn test_click_request_fields_are_optional() {
        let click: ClickRequest = serde_json::from_str("{}").unwrap();
        assert!(click.action.is_none());
        assert!(click.url.is_none());

        let click: ClickRequest =
            serde_json::from_str(r#"{"action":"open","url":"/transport/my-tours/"}"#).unwrap();
        assert_eq!(click.action.as_deref(), Some("open"));
    }

    #[test]
    fn test_push_key_response_is_camel_case() {
        let json = serde_json::to_string(&PushKeyResponse {
            application_server_key: "BEl6".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"applicationServerKey":"BEl6"}"#);
    }
}

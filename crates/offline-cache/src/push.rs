//! Push payloads and the notifications they produce

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const NOTIFICATION_TITLE: &str = "Tovar Taxi";
pub const NOTIFICATION_ICON: &str = "/static/images/TTaxi9_icon.ico.png";
pub const DEFAULT_PUSH_BODY: &str = "Nova notifikacija u Tovar Taxi aplikaciji";
pub const DEFAULT_NOTIFICATION_URL: &str = "/transport/notifications/";

pub const ACTION_OPEN: &str = "open";
pub const ACTION_CLOSE: &str = "close";

/// Server-sent push message. Both fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PushPayload {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl PushPayload {
    /// Parse raw push data. Missing or malformed data yields an empty payload.
    pub fn parse(data: Option<&[u8]>) -> Self {
        let Some(data) = data.filter(|d| !d.is_empty()) else {
            return Self::default();
        };

        match serde_json::from_slice::<PushPayload>(data) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Malformed push payload, using defaults");
                Self::default()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationData {
    pub url: String,
}

/// A system notification ready for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationDisplay {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
    pub actions: Vec<NotificationAction>,
}

impl NotificationDisplay {
    pub fn from_payload(payload: &PushPayload) -> Self {
        let body = non_empty(payload.message.as_deref()).unwrap_or(DEFAULT_PUSH_BODY);
        let url = non_empty(payload.url.as_deref()).unwrap_or(DEFAULT_NOTIFICATION_URL);

        Self {
            title: NOTIFICATION_TITLE.to_string(),
            body: body.to_string(),
            icon: NOTIFICATION_ICON.to_string(),
            badge: NOTIFICATION_ICON.to_string(),
            vibrate: vec![200, 100, 200],
            data: NotificationData {
                url: url.to_string(),
            },
            actions: vec![
                NotificationAction {
                    action: ACTION_OPEN.to_string(),
                    title: "Otvori".to_string(),
                    icon: Some(NOTIFICATION_ICON.to_string()),
                },
                NotificationAction {
                    action: ACTION_CLOSE.to_string(),
                    title: "Zatvori".to_string(),
                    icon: None,
                },
            ],
        }
    }

    /// Target of the `open` action
    pub fn open_url(&self) -> &str {
        &self.data.url
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// What a click on a displayed notification leads to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClickOutcome {
    OpenWindow { url: String },
    Dismiss,
}

/// `open` and body clicks open the notification's URL; anything else only dismisses
pub fn notification_click(action: Option<&str>, data_url: Option<&str>) -> ClickOutcome {
    match non_empty(action) {
        None | Some(ACTION_OPEN) => ClickOutcome::OpenWindow {
            url: non_empty(data_url).unwrap_or("/").to_string(),
        },
        Some(_) => ClickOutcome::Dismiss,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_with_message_and_url() {
        let payload = PushPayload::parse(Some(br#"{"message":"X","url":"/y"}"#));
        let display = NotificationDisplay::from_payload(&payload);

        assert_eq!(display.title, "Tovar Taxi");
        assert_eq!(display.body, "X");
        assert_eq!(display.open_url(), "/y");
        assert_eq!(display.actions[0].action, "open");
        assert_eq!(display.actions[1].action, "close");
    }

    #[test]
    fn test_missing_payload_uses_defaults() {
        let display = NotificationDisplay::from_payload(&PushPayload::parse(None));
        assert_eq!(display.body, DEFAULT_PUSH_BODY);
        assert_eq!(display.open_url(), "/transport/notifications/");
        assert_eq!(display.icon, NOTIFICATION_ICON);
        assert_eq!(display.badge, NOTIFICATION_ICON);
    }

    #[test]
    fn test_malformed_payload_uses_defaults() {
        let payload = PushPayload::parse(Some(b"not json at all"));
        assert_eq!(payload, PushPayload::default());

        let display = NotificationDisplay::from_payload(&payload);
        assert_eq!(display.body, DEFAULT_PUSH_BODY);
    }

    #[test]
    fn test_partial_payload() {
        let payload = PushPayload::parse(Some(br#"{"message":"Nova tura","extra":1}"#));
        let display = NotificationDisplay::from_payload(&payload);
        assert_eq!(display.body, "Nova tura");
        assert_eq!(display.open_url(), DEFAULT_NOTIFICATION_URL);
    }

    #[test]
    fn test_empty_strings_fall_back() {
        let payload = PushPayload::parse(Some(br#"{"message":"","url":""}"#));
        let display = NotificationDisplay::from_payload(&payload);
        assert_eq!(display.body, DEFAULT_PUSH_BODY);
        assert_eq!(display.open_url(), DEFAULT_NOTIFICATION_URL);
    }

    #[test]
    fn test_click_open_and_body() {
        assert_eq!(
            notification_click(Some("open"), Some("/y")),
            ClickOutcome::OpenWindow {
                url: "/y".to_string()
            }
        );
        assert_eq!(
            notification_click(None, None),
            ClickOutcome::OpenWindow {
                url: "/".to_string()
            }
        );
        assert_eq!(
            notification_click(Some(""), Some("/transport/notifications/")),
            ClickOutcome::OpenWindow {
                url: "/transport/notifications/".to_string()
            }
        );
    }

    #[test]
    fn test_click_close_dismisses() {
        assert_eq!(
            notification_click(Some("close"), Some("/y")),
            ClickOutcome::Dismiss
        );
    }

    #[test]
    fn test_display_serialization() {
        let display = NotificationDisplay::from_payload(&PushPayload::default());
        let json = serde_json::to_value(&display).unwrap();
        assert_eq!(json["vibrate"], serde_json::json!([200, 100, 200]));
        assert_eq!(json["data"]["url"], "/transport/notifications/");
        assert!(json["actions"][1].get("icon").is_none());
    }
}

//! Synthetic responses served when neither network nor cache can answer

use crate::types::HttpResponse;

pub const CACHE_FIRST_UNAVAILABLE: &str = "Offline - content not available";
pub const NETWORK_FIRST_UNAVAILABLE: &str = "Offline";

/// Self-contained page for navigations made while offline
pub const OFFLINE_HTML: &str = r#"<!DOCTYPE html>
<html lang="sr">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Offline - Tovar Taxi</title>
    <style>
        body {
            font-family: 'Inter', sans-serif;
            background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
            min-height: 100vh;
            display: flex;
            align-items: center;
            justify-content: center;
            margin: 0;
            color: white;
            text-align: center;
        }
        .offline-container {
            background: rgba(255, 255, 255, 0.1);
            padding: 40px;
            border-radius: 20px;
            box-shadow: 0 20px 40px rgba(0, 0, 0, 0.1);
        }
        .offline-title { font-size: 24px; font-weight: 600; margin-bottom: 10px; }
        .offline-message { font-size: 16px; opacity: 0.8; margin-bottom: 20px; }
        .retry-button {
            background: #FFD700;
            color: #000;
            border: none;
            padding: 12px 24px;
            border-radius: 25px;
            font-weight: 600;
            cursor: pointer;
        }
        .retry-button:hover { background: #FFC107; }
    </style>
</head>
<body>
    <div class="offline-container">
        <div class="offline-title">Nema internetske veze</div>
        <div class="offline-message">Proverite internetsku vezu i pokušajte ponovo.</div>
        <button class="retry-button" onclick="window.location.reload()">Pokušaj ponovo</button>
    </div>
</body>
</html>
"#;

pub fn offline_page() -> HttpResponse {
    HttpResponse::new(200, "OK")
        .with_header("Content-Type", "text/html; charset=utf-8")
        .with_header("Cache-Control", "no-store")
        .with_body(OFFLINE_HTML.as_bytes().to_vec())
}

pub fn service_unavailable(message: &str) -> HttpResponse {
    HttpResponse::new(503, "Service Unavailable")
        .with_header("Content-Type", "text/plain; charset=utf-8")
        .with_body(message.as_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_page() {
        let response = offline_page();
        assert_eq!(response.status, 200);
        assert!(response.content_type().unwrap().starts_with("text/html"));
        assert_eq!(response.body, OFFLINE_HTML.as_bytes());
    }

    #[test]
    fn test_offline_page_has_no_external_assets() {
        assert!(!OFFLINE_HTML.contains("<link"));
        assert!(!OFFLINE_HTML.contains("<script src"));
        assert!(!OFFLINE_HTML.contains("http://"));
        assert!(!OFFLINE_HTML.contains("https://"));
    }

    #[test]
    fn test_service_unavailable() {
        let response = service_unavailable(CACHE_FIRST_UNAVAILABLE);
        assert_eq!(response.status, 503);
        assert_eq!(response.status_text, "Service Unavailable");
        assert_eq!(response.body, b"Offline - content not available");
    }
}

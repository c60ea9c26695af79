//! Request and response types shared by the stores and strategies

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Headers that describe a single connection and must not be replayed
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "content-length",
    "host",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Cookie carrying the application session
pub const SESSION_COOKIE: &str = "sessionid";

/// Value of cookie `name` in a `Cookie` header value
pub fn cookie_value<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then_some(value)
    })
}

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

/// What the requesting context intends to do with the response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Document,
    Style,
    Script,
    Image,
    Font,
    Manifest,
    #[default]
    Empty,
}

impl Destination {
    /// Parse a `Sec-Fetch-Dest` header value
    pub fn from_fetch_dest(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "document" => Destination::Document,
            "style" => Destination::Style,
            "script" => Destination::Script,
            "image" => Destination::Image,
            "font" => Destination::Font,
            "manifest" => Destination::Manifest,
            _ => Destination::Empty,
        }
    }
}

/// An outgoing request as seen by the interceptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: String,
    pub url: Url,
    #[serde(default)]
    pub destination: Destination,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            url,
            destination: Destination::Empty,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// A top-level navigation to `url`
    pub fn navigate(url: Url) -> Self {
        Self::get(url).with_destination(Destination::Document)
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Who the response may be personalised for: the session cookie, else
    /// an `Authorization` header. `None` for anonymous requests.
    pub fn credential(&self) -> Option<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("cookie"))
            .find_map(|(_, v)| cookie_value(v, SESSION_COOKIE))
            .or_else(|| self.header("authorization"))
    }
}

/// A stored or synthesized response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, status_text: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Drop every header called `name`
    pub fn without_header(mut self, name: &str) -> Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self
    }

    /// 2xx status
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

/// Where a served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Cache,
    Network,
    Fallback,
}

impl ResponseSource {
    /// Value for the `X-Cache` response header
    pub fn cache_header(&self) -> &'static str {
        match self {
            ResponseSource::Cache => "HIT",
            ResponseSource::Network => "MISS",
            ResponseSource::Fallback => "OFFLINE",
        }
    }
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResponseSource::Cache => "cache",
            ResponseSource::Network => "network",
            ResponseSource::Fallback => "fallback",
        })
    }
}

/// Entry count for one named store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub name: String,
    pub entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_method_is_normalized() {
        let request = HttpRequest::new("post", url("http://localhost/transport/create-shipment/"));
        assert_eq!(request.method, "POST");
        assert!(!request.is_get());
        assert!(HttpRequest::get(url("http://localhost/")).is_get());
    }

    #[test]
    fn test_navigate_is_document() {
        let request = HttpRequest::navigate(url("http://localhost/transport/my-tours/"));
        assert_eq!(request.destination, Destination::Document);
    }

    #[test]
    fn test_destination_from_fetch_dest() {
        assert_eq!(Destination::from_fetch_dest("document"), Destination::Document);
        assert_eq!(Destination::from_fetch_dest(" Style "), Destination::Style);
        assert_eq!(Destination::from_fetch_dest("iframe"), Destination::Empty);
        assert_eq!(Destination::from_fetch_dest(""), Destination::Empty);
    }

    #[test]
    fn test_response_ok_range() {
        assert!(HttpResponse::new(200, "OK").ok());
        assert!(HttpResponse::new(204, "No Content").ok());
        assert!(!HttpResponse::new(304, "Not Modified").ok());
        assert!(!HttpResponse::new(503, "Service Unavailable").ok());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = HttpResponse::new(200, "OK").with_header("Content-Type", "text/css");
        assert_eq!(response.content_type(), Some("text/css"));

        let request = HttpRequest::get(url("http://localhost/")).with_header("Cookie", "a=b");
        assert_eq!(request.header("cookie"), Some("a=b"));
    }

    #[test]
    fn test_credential_from_session_cookie_or_authorization() {
        let anonymous = HttpRequest::get(url("http://localhost/")).with_header("Cookie", "csrftoken=t");
        assert_eq!(anonymous.credential(), None);

        let session = HttpRequest::get(url("http://localhost/"))
            .with_header("cookie", "csrftoken=t")
            .with_header("cookie", "theme=dark; sessionid=alice");
        assert_eq!(session.credential(), Some("alice"));

        let bearer = HttpRequest::get(url("http://localhost/")).with_header("Authorization", "Token x");
        assert_eq!(bearer.credential(), Some("Token x"));
    }

    #[test]
    fn test_without_header_removes_every_copy() {
        let response = HttpResponse::new(200, "OK")
            .with_header("Set-Cookie", "a=1")
            .with_header("set-cookie", "b=2")
            .with_header("Content-Type", "text/html")
            .without_header("set-cookie");
        assert_eq!(response.headers.len(), 1);
        assert_eq!(response.content_type(), Some("text/html"));
    }

    #[test]
    fn test_hop_by_hop() {
        assert!(is_hop_by_hop("Transfer-Encoding"));
        assert!(is_hop_by_hop("host"));
        assert!(!is_hop_by_hop("content-type"));
    }

    #[test]
    fn test_cache_header_values() {
        assert_eq!(ResponseSource::Cache.cache_header(), "HIT");
        assert_eq!(ResponseSource::Network.cache_header(), "MISS");
        assert_eq!(ResponseSource::Fallback.cache_header(), "OFFLINE");
    }

    #[test]
    fn test_stored_request_serialization() {
        let request = HttpRequest::new("POST", url("http://localhost/transport/create-shipment/"))
            .with_body(b"weight=120".to_vec());

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("create-shipment"));

        let deserialized: HttpRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, request);
    }
}

//! Network access
//!
//! Strategies and sync tasks reach the network through the [`Fetcher`] trait
//! so the policy logic can run against a stub.

use async_trait::async_trait;
use reqwest::{redirect, Client, ClientBuilder, Method};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{OfflineCacheError, Result};
use crate::types::{is_hop_by_hop, HttpRequest, HttpResponse};

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Issue `request`. Transport failures are errors; any HTTP status,
    /// including 4xx and 5xx, is a response.
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// reqwest-backed fetcher.
///
/// Redirects are handed back to the caller as responses. Following them here
/// would replay the caller's cookies against wherever `Location` points and
/// swallow the `Set-Cookie` of the redirecting response.
pub struct HttpFetcher {
    client: Client,
}

fn builder() -> ClientBuilder {
    Client::builder().redirect(redirect::Policy::none())
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: builder().build()?,
        })
    }

    /// Fetcher whose requests give up after `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Fetcher over a caller-built client, whose redirect policy is kept
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let method = Method::from_bytes(request.method.as_bytes()).map_err(|_| {
            OfflineCacheError::InvalidRequest(format!("bad method: {}", request.method))
        })?;

        debug!(method = %method, url = %request.url, "Fetching from network");

        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in &request.headers {
            if !is_hop_by_hop(name) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            warn!(url = %request.url, error = %e, "Network request failed");
            e
        })?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        debug!(
            url = %request.url,
            status = status.as_u16(),
            size = body.len(),
            "Fetched from network"
        );

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[tokio::test]
    async fn test_invalid_method_is_rejected() {
        let fetcher = HttpFetcher::new().unwrap();
        let request = HttpRequest::new("BAD METHOD", Url::parse("http://localhost/").unwrap());

        let result = fetcher.fetch(&request).await;
        assert!(matches!(result, Err(OfflineCacheError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let fetcher = HttpFetcher::with_timeout(Duration::from_secs(2)).unwrap();
        // Port 9 (discard) on loopback is closed in test environments
        let request = HttpRequest::get(Url::parse("http://127.0.0.1:9/").unwrap());

        let err = fetcher.fetch(&request).await.unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_redirect_is_returned_not_followed() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await.unwrap();
            socket
                .write_all(
                    b"HTTP/1.1 302 Found\r\n\
                      Location: http://127.0.0.1:9/elsewhere/\r\n\
                      Set-Cookie: sessionid=fresh; HttpOnly\r\n\
                      Content-Length: 0\r\n\
                      Connection: close\r\n\r\n",
                )
                .await
                .unwrap();
        });

        let fetcher = HttpFetcher::with_timeout(Duration::from_secs(5)).unwrap();
        let url = Url::parse(&format!("http://{}/accounts/login/", addr)).unwrap();
        let request = HttpRequest::new("POST", url)
            .with_header("Cookie", "sessionid=old")
            .with_body(b"username=marko".to_vec());

        let response = fetcher.fetch(&request).await.unwrap();
        assert_eq!(response.status, 302);
        assert_eq!(response.header("location"), Some("http://127.0.0.1:9/elsewhere/"));
        assert_eq!(response.header("set-cookie"), Some("sessionid=fresh; HttpOnly"));
        server.await.unwrap();
    }
}

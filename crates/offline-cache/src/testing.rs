//! Scripted fetcher for unit tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{OfflineCacheError, Result};
use crate::fetcher::Fetcher;
use crate::types::{HttpRequest, HttpResponse};

/// Answers from a URL table; unknown URLs fail like an unreachable network
#[derive(Default)]
pub struct StubFetcher {
    routes: Mutex<HashMap<String, HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, response: HttpResponse) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
    }

    pub fn respond_text(&self, url: &str, status: u16, body: &str) {
        self.respond(
            url,
            HttpResponse::new(status, "")
                .with_header("Content-Type", "text/plain")
                .with_body(body.as_bytes().to_vec()),
        );
    }

    pub fn respond_json(&self, url: &str, status: u16, body: &str) {
        self.respond(
            url,
            HttpResponse::new(status, "")
                .with_header("Content-Type", "application/json")
                .with_body(body.as_bytes().to_vec()),
        );
    }

    /// Make `url` unreachable again
    pub fn fail(&self, url: &str) {
        self.routes.lock().unwrap().remove(url);
    }

    pub fn requests_to(&self, url: &str) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.as_str() == url)
            .cloned()
            .collect()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.requests_to(url).len()
    }

    pub fn total_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.routes
            .lock()
            .unwrap()
            .get(request.url.as_str())
            .cloned()
            .ok_or_else(|| OfflineCacheError::Network(format!("unreachable: {}", request.url)))
    }
}

//! Translation between axum requests and the cache manager's request model

use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Json, Response},
};
use offline_cache::{
    types::is_hop_by_hop, Destination, Fetcher, HttpRequest, HttpResponse, ResponseSource,
    SyncTag,
};
use tracing::{debug, warn};
use url::Url;

use crate::error::{ProxyError, Result};
use crate::server::ServerState;
use crate::types::DeferredResponse;

/// Largest request body the proxy buffers
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Destination from `Sec-Fetch-Dest`, or a document for HTML navigations
fn destination(request: &Request<Body>) -> Destination {
    let headers = request.headers();
    if let Some(dest) = headers
        .get("sec-fetch-dest")
        .and_then(|v| v.to_str().ok())
    {
        return Destination::from_fetch_dest(dest);
    }

    let accepts_html = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|accept| accept.contains("text/html"))
        .unwrap_or(false);
    if accepts_html && request.method() == axum::http::Method::GET {
        Destination::Document
    } else {
        Destination::Empty
    }
}

/// Upstream URL for an incoming path and query.
///
/// Only the path and query are carried over, so a scheme-relative target
/// such as `//other.host/x` stays a path on the upstream origin.
fn upstream_url(upstream: &Url, path: &str, query: Option<&str>) -> Result<Url> {
    let mut url = upstream.clone();
    url.set_path(path);
    url.set_query(query);
    url.set_fragment(None);
    if url.origin() != upstream.origin() {
        return Err(ProxyError::BadRequest(format!(
            "path {} leaves the upstream origin",
            path
        )));
    }
    Ok(url)
}

/// Rebase an incoming request onto the upstream origin
pub async fn into_http_request(request: Request<Body>, upstream: &Url) -> Result<HttpRequest> {
    let url = upstream_url(upstream, request.uri().path(), request.uri().query())?;

    let mut converted =
        HttpRequest::new(request.method().as_str(), url).with_destination(destination(&request));
    for (name, value) in request.headers() {
        if is_hop_by_hop(name.as_str()) {
            continue;
        }
        if let Ok(value) = value.to_str() {
            converted = converted.with_header(name.as_str(), value);
        }
    }

    let body = axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| ProxyError::BadRequest(format!("failed to read body: {}", e)))?;
    if !body.is_empty() {
        converted = converted.with_body(body.to_vec());
    }

    Ok(converted)
}

/// Build the response sent back to the browser
pub fn into_response(response: HttpResponse, source: Option<ResponseSource>) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let headers = response.headers;

    let mut out = Response::new(Body::from(response.body));
    *out.status_mut() = status;

    let out_headers = out.headers_mut();
    for (name, value) in &headers {
        if is_hop_by_hop(name) {
            continue;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                out_headers.append(name, value);
            }
            _ => debug!(header = %name, "Dropping invalid upstream header"),
        }
    }
    if let Some(source) = source {
        out_headers.insert("x-cache", HeaderValue::from_static(source.cache_header()));
    }

    out
}

/// Send a request the cache manager declined straight to the upstream.
///
/// Shipment submissions that cannot reach the upstream are queued for
/// `shipment-sync` and acknowledged with 202.
pub async fn forward(state: &ServerState, request: HttpRequest) -> Result<Response> {
    match state.fetcher.fetch(&request).await {
        Ok(response) => Ok(into_response(response, None)),
        Err(e) if e.is_network() && state.manager.is_deferrable(&request) => {
            warn!(url = %request.url, error = %e, "Upstream unreachable, deferring shipment");
            let queued = state.manager.defer(request).await?;
            Ok((
                StatusCode::ACCEPTED,
                Json(DeferredResponse {
                    queued,
                    sync_tag: SyncTag::ShipmentSync.to_string(),
                }),
            )
                .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

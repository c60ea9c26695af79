//! HTTP server for the offline proxy
//!
//! `/health` and the `/_sw/*` control routes drive the cache manager's
//! lifecycle, sync, push and messaging events. Every other path is a fetch
//! event answered by the manager or forwarded to the upstream.

use crate::error::Result;
use crate::proxy;
use crate::types::{
    ActionRequest, ActionResponse, ClickRequest, HealthResponse, MessageResponse,
    PushKeyResponse,
};
use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, HeaderMap, Method, Request, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};
use offline_cache::{
    backend::{APPLICATION_SERVER_KEY, CSRF_HEADER},
    csrf_token_from_cookie, ActivateReport, ClickOutcome, ClientMessage, FetchOutcome, Fetcher,
    InstallReport, NotificationDisplay, OfflineCacheManager, SyncOutcome, SyncTag,
};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use url::Url;

/// Shared state for the HTTP server
pub struct ServerState {
    pub manager: Arc<OfflineCacheManager>,
    pub fetcher: Arc<dyn Fetcher>,
    pub upstream: Url,
    pub cors_origins: Vec<String>,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(
        manager: Arc<OfflineCacheManager>,
        fetcher: Arc<dyn Fetcher>,
        upstream: Url,
        cors_origins: Vec<String>,
    ) -> Self {
        Self {
            manager,
            fetcher,
            upstream,
            cors_origins,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::COOKIE])
        .allow_credentials(true)
}

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.cors_origins);

    Router::new()
        .route("/health", get(health))
        // Lifecycle
        .route("/_sw/install", post(install))
        .route("/_sw/activate", post(activate))
        // Background sync
        .route("/_sw/sync/{tag}", post(sync))
        // Push
        .route("/_sw/push", post(push))
        .route("/_sw/notificationclick", post(notification_click))
        .route("/_sw/push-key", get(push_key))
        .route("/_sw/push-subscription", post(push_subscription))
        // Notification actions
        .route("/_sw/notifications/{id}/read", post(mark_read))
        .route("/_sw/notifications/{id}/action", post(notification_action))
        // Client messaging
        .route("/_sw/message", post(message))
        .route("/_sw/clients", get(client_events))
        // Everything else is a fetch event
        .fallback(intercept)
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds() as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        worker_state: state.manager.state().await.to_string(),
        clients: state.manager.clients().client_count(),
        stores: state.manager.storage().stats().await,
    })
}

async fn install(State(state): State<SharedState>) -> Result<Json<InstallReport>> {
    Ok(Json(state.manager.install().await?))
}

async fn activate(State(state): State<SharedState>) -> Result<Json<ActivateReport>> {
    Ok(Json(state.manager.activate().await?))
}

async fn sync(
    State(state): State<SharedState>,
    Path(tag): Path<String>,
) -> Result<Json<SyncOutcome>> {
    let tag: SyncTag = tag.parse()?;
    Ok(Json(state.manager.handle_sync(tag).await?))
}

async fn push(State(state): State<SharedState>, body: Bytes) -> Json<NotificationDisplay> {
    Json(state.manager.handle_push(Some(body.as_ref())))
}

async fn notification_click(
    State(state): State<SharedState>,
    Json(click): Json<ClickRequest>,
) -> Json<ClickOutcome> {
    Json(
        state
            .manager
            .handle_notification_click(click.action.as_deref(), click.url.as_deref()),
    )
}

async fn push_key() -> Json<PushKeyResponse> {
    Json(PushKeyResponse {
        application_server_key: APPLICATION_SERVER_KEY.to_string(),
    })
}

/// CSRF token from the page's cookie, falling back to an explicit header
fn csrf_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(csrf_token_from_cookie)
        .or_else(|| {
            headers
                .get(CSRF_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
}

async fn push_subscription(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(subscription): Json<Value>,
) -> Result<Response> {
    state
        .manager
        .backend()
        .register_push_subscription(&subscription, csrf_token(&headers).as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true }))).into_response())
}

async fn mark_read(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<ActionResponse>> {
    state
        .manager
        .backend()
        .mark_read(id, csrf_token(&headers).as_deref())
        .await?;
    Ok(Json(ActionResponse {
        success: true,
        redirect: None,
    }))
}

async fn notification_action(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<ActionRequest>,
) -> Result<Json<ActionResponse>> {
    let redirect = state
        .manager
        .backend()
        .notification_action(id, &request.action, csrf_token(&headers).as_deref())
        .await?;
    Ok(Json(ActionResponse {
        success: true,
        redirect,
    }))
}

async fn message(
    State(state): State<SharedState>,
    Json(message): Json<ClientMessage>,
) -> Json<MessageResponse> {
    Json(MessageResponse {
        handled: state.manager.handle_message(&message).await,
    })
}

/// Server-sent stream of every message posted to clients
async fn client_events(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let receiver = state.manager.clients().subscribe();
    info!(
        clients = state.manager.clients().client_count(),
        "Client connected"
    );

    let events = stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(message) => match Event::default().json_data(&message) {
                    Ok(event) => return Some((Ok::<_, Infallible>(event), receiver)),
                    Err(e) => warn!(error = %e, "Failed to encode client message"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Client fell behind, messages dropped")
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Fetch event entry point
async fn intercept(State(state): State<SharedState>, request: Request<Body>) -> Result<Response> {
    let request = proxy::into_http_request(request, &state.upstream).await?;

    match state.manager.handle_fetch(&request).await {
        FetchOutcome::Respond { response, source } => {
            Ok(proxy::into_response(response, Some(source)))
        }
        FetchOutcome::Passthrough => proxy::forward(&state, request).await,
    }
}

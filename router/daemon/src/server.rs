//! HTTP Surface
//!
//! Exposes the request handler over HTTP:
//! - `POST /generate` streams one generation as `text/event-stream`
//! - `GET /health` reports liveness and whether a policy has been loaded
//!
//! Each generation runs in its own task that owns the sending half of a
//! bounded channel; the response body drains the receiving half. When the
//! client disconnects, the body is dropped, the next send fails, and the
//! handler cancels the backend invocation.
//!
//! ```text
//!  POST /generate ──► spawn(handler.handle(body, tx))
//!                                          │ StreamEvent
//!  response body ◄── ReceiverStream(rx) ◄──┘
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use router_core::backend::{BedrockBackend, ModelBackend};
use router_core::config::RouterSettings;
use router_core::source::{AppConfigSidecar, PolicySource};
use router_core::{ConfigCache, RequestHandler};

/// Shared state for the HTTP routes
pub struct AppState<S, B> {
    handler: Arc<RequestHandler<S, B>>,
    channel_capacity: usize,
}

impl<S, B> Clone for AppState<S, B> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            channel_capacity: self.channel_capacity,
        }
    }
}

impl<S, B> AppState<S, B> {
    /// Create state around a handler
    pub fn new(handler: Arc<RequestHandler<S, B>>, channel_capacity: usize) -> Self {
        Self {
            handler,
            channel_capacity: channel_capacity.max(1),
        }
    }
}

/// Build the HTTP router
pub fn router<S, B>(state: AppState<S, B>) -> Router
where
    S: PolicySource + 'static,
    B: ModelBackend + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/generate", post(generate::<S, B>))
        .route("/health", get(health::<S, B>))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn generate<S, B>(State(state): State<AppState<S, B>>, body: Bytes) -> Response
where
    S: PolicySource + 'static,
    B: ModelBackend + 'static,
{
    let (tx, rx) = mpsc::channel(state.channel_capacity);
    let handler = Arc::clone(&state.handler);

    tokio::spawn(async move {
        handler.handle(&body, tx).await;
    });

    let frames = ReceiverStream::new(rx).map(|event| Ok::<_, Infallible>(event.to_frame()));

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(frames),
    )
        .into_response()
}

async fn health<S, B>(State(state): State<AppState<S, B>>) -> Json<Value>
where
    S: PolicySource + 'static,
    B: ModelBackend + 'static,
{
    Json(json!({
        "status": "ok",
        "policy_loaded": state.handler.cache().is_loaded(),
    }))
}

/// Run the HTTP daemon until a shutdown signal arrives
pub async fn serve(settings: RouterSettings) -> Result<()> {
    let source = AppConfigSidecar::new(&settings.config_source)
        .context("Failed to create policy source")?;
    let backend =
        BedrockBackend::from_settings(&settings.backend).context("Failed to create backend")?;

    info!(
        policy = %source.describe(),
        backend = backend.name(),
        endpoint = %settings.backend.endpoint_url(),
        "Request handler ready"
    );

    let handler = Arc::new(RequestHandler::new(ConfigCache::new(source), backend));
    let app = router(AppState::new(handler, settings.server.channel_capacity));

    let listener = TcpListener::bind(&settings.server.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", settings.server.bind_address))?;
    info!(address = %listener.local_addr()?, "Listening for requests");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

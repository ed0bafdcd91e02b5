//! HTTP server implementation using Axum.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use filingwatch_core::FilingStore;
use filingwatch_core::config::{ConfigIssue, GatewayConfig};
use filingwatch_scheduler::SchedulerHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn FilingStore>,
    pub scheduler: SchedulerHandle,
    /// Problems found at startup; reported by `/health`.
    pub config_issues: Vec<ConfigIssue>,
    pub admin_token: Option<String>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn FilingStore>, scheduler: SchedulerHandle) -> Self {
        Self {
            store,
            scheduler,
            config_issues: Vec::new(),
            admin_token: None,
            start_time: std::time::Instant::now(),
        }
    }
}

/// Admin token middleware: validates the X-Admin-Token header.
async fn require_admin(
    State(state): State<Arc<AppState>>,
    req: Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Response {
    let Some(expected) = state.admin_token.as_deref().filter(|t| !t.is_empty()) else {
        return next.run(req).await;
    };

    let provided = req
        .headers()
        .get("X-Admin-Token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if provided == expected {
        return next.run(req).await;
    }

    tracing::warn!("🔒 Rejected admin request: missing or invalid token");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({"ok": false, "error": "invalid or missing admin token"})),
    )
        .into_response()
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let shared = Arc::new(state);

    let admin = Router::new()
        .route("/api/admin/trigger", post(super::routes::trigger_job))
        .route_layer(axum::middleware::from_fn_with_state(
            shared.clone(),
            require_admin,
        ));

    let public = Router::new()
        .route("/health", get(super::routes::health_check))
        .route("/api/announcements", get(super::routes::list_announcements))
        .route("/api/jobs/history", get(super::routes::job_history));

    admin
        .merge(public)
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any)
                .allow_origin(Any)
                .max_age(std::time::Duration::from_secs(3600)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Bind and serve until the process exits.
pub async fn start(config: &GatewayConfig, state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("🌐 Gateway listening on http://{addr}");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

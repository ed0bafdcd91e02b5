//! API route handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use filingwatch_core::types::{Filing, FilingQuery, ScreenshotPayload};
use filingwatch_scheduler::GateState;

use crate::server::AppState;

const MAX_PAGE_SIZE: u32 = 200;

type ApiError = (StatusCode, Json<serde_json::Value>);

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let store_ok = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("⚠️ Health probe: store unreachable: {e}");
            false
        }
    };
    let healthy = store_ok && state.config_issues.is_empty();

    Json(serde_json::json!({
        "status": if healthy { "ok" } else { "degraded" },
        "service": "filingwatch",
        "version": env!("CARGO_PKG_VERSION"),
        "store": if store_ok { "ok" } else { "unreachable" },
        "config_issues": state.config_issues,
        "gate": state.scheduler.gate().state().as_str(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Paged filing listing: `?limit=&offset=&category=&company=`.
pub async fn list_announcements(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let query = FilingQuery {
        company: non_empty_param(&params, "company"),
        category: non_empty_param(&params, "category"),
        limit: params
            .get("limit")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(50)
            .clamp(1, MAX_PAGE_SIZE),
        offset: params
            .get("offset")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(0),
    };

    let filings = state.store.query(&query).await.map_err(|e| {
        tracing::error!("❌ Listing filings failed: {e}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"ok": false, "error": e.to_string()})),
        )
    })?;

    let items: Vec<serde_json::Value> = filings.iter().map(announcement_json).collect();
    Ok(Json(serde_json::json!({
        "ok": true,
        "count": items.len(),
        "limit": query.limit,
        "offset": query.offset,
        "announcements": items,
    })))
}

/// Start a job now; returns before it finishes.
pub async fn trigger_job(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let already_running = state.scheduler.gate().state() == GateState::Running;
    // Detached: the gate records the outcome in its history.
    drop(state.scheduler.trigger_now());
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "ok": true,
            "message": if already_running {
                "a job is already running; this trigger will be skipped"
            } else {
                "job started"
            },
            "already_running": already_running,
        })),
    )
}

/// Recent job reports, newest first: `?limit=` (default 20).
pub async fn job_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    let limit = params
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(20)
        .clamp(1, 50);
    let gate = state.scheduler.gate();
    Json(serde_json::json!({
        "gate": gate.state().as_str(),
        "jobs": gate.history(limit).await,
    }))
}

fn non_empty_param(params: &HashMap<String, String>, key: &str) -> Option<String> {
    params
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Listing view of a filing: the screenshot blob is replaced by its image count.
fn announcement_json(f: &Filing) -> serde_json::Value {
    let image_count = f
        .screenshot
        .as_deref()
        .and_then(|raw| ScreenshotPayload::parse(raw).ok())
        .map(|p| p.images.len())
        .unwrap_or(0);
    serde_json::json!({
        "id": f.id,
        "company_name": f.company_name,
        "company_code": f.company_code,
        "category": f.category,
        "subject": f.subject,
        "summary": f.summary,
        "title": f.title,
        "filed_at": f.filed_at,
        "scraped_at": f.scraped_at,
        "source_page": f.source_page,
        "pdf_url": f.pdf_url,
        "image_count": image_count,
        "dispatched": f.dispatched,
    })
}

//! # FilingWatch Gateway
//! Small operator-facing HTTP API served with Axum.
//!
//! - `GET /health`: store reachability, config issues, gate state
//! - `GET /api/announcements`: paged filing listing, newest first
//! - `POST /api/admin/trigger`: start a job outside the schedule
//! - `GET /api/jobs/history`: recent job reports

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start};

//! Liveness and readiness checks

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::time::Instant;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Up,
    Down,
}

#[derive(Serialize)]
pub struct Dependency {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Dependency {
    fn check<E: ToString>(started: Instant, outcome: std::result::Result<(), E>) -> Self {
        match outcome {
            Ok(()) => Self {
                status: Status::Up,
                latency_ms: Some(started.elapsed().as_millis() as u64),
                error: None,
            },
            Err(e) => Self {
                status: Status::Down,
                latency_ms: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub database: Dependency,
    pub uploads: Dependency,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: papertrail_common::VERSION,
    })
}

/// 503 until the database answers and the upload directory is usable
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let started = Instant::now();
    let database = Dependency::check(started, state.db.ping().await);

    let started = Instant::now();
    let uploads = Dependency::check(started, tokio::fs::create_dir_all(state.uploads.dir()).await);

    let ready = database.status == Status::Up && uploads.status == Status::Up;
    if !ready {
        tracing::warn!(
            database = ?database.status,
            uploads = ?uploads.status,
            "Readiness check failed"
        );
    }

    let status = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status,
        Json(ReadyResponse {
            ready,
            database,
            uploads,
        }),
    )
}

//! Health check handlers.

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use vframe_queue::StatusCounts;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
    pub tasks: StatusCounts,
    pub active_jobs: usize,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub storage: CheckStatus,
    pub background_remover: CheckStatus,
    pub executor: CheckStatus,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl CheckStatus {
    fn ok(latency_ms: u64) -> Self {
        Self {
            status: "ok".to_string(),
            error: None,
            latency_ms: Some(latency_ms),
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(msg.into()),
            latency_ms: None,
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Readiness check endpoint (readiness probe).
///
/// Checks that both storage roots are present, that the background remover
/// answers and that the executor still accepts jobs.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let storage_check = {
        let start = Instant::now();
        let config = state.storage.config();
        let mut missing = None;
        for dir in [&config.upload_dir, &config.output_dir] {
            if !tokio::fs::metadata(dir).await.map(|m| m.is_dir()).unwrap_or(false) {
                missing = Some(format!("{} is not a directory", dir.display()));
                break;
            }
        }
        match missing {
            None => CheckStatus::ok(start.elapsed().as_millis() as u64),
            Some(msg) => CheckStatus::error(msg),
        }
    };

    let remover_check = {
        let start = Instant::now();
        if state.remover.health_check().await {
            CheckStatus::ok(start.elapsed().as_millis() as u64)
        } else {
            CheckStatus::error(format!("{} remover is unavailable", state.remover.name()))
        }
    };

    let executor_check = if state.executor.is_shutdown() {
        CheckStatus::error("executor is shutting down")
    } else {
        CheckStatus::ok(0)
    };

    let all_ok = storage_check.is_ok() && remover_check.is_ok() && executor_check.is_ok();

    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "degraded" }.to_string(),
        checks: ReadinessChecks {
            storage: storage_check,
            background_remover: remover_check,
            executor: executor_check,
        },
        tasks: state.registry.count_by_status(),
        active_jobs: state.executor.active_jobs(),
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

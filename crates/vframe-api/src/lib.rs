//! Axum HTTP API server.
//!
//! This crate provides:
//! - Upload submission and progress polling
//! - Frame listing, single-frame serving and zip download
//! - Health/readiness probes and Prometheus metrics
//! - Security headers, request IDs and request logging

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;

//! Client for the remote background-removal service.
//!
//! The service accepts a PNG frame as multipart upload and answers with an
//! RGBA PNG of the same size whose background pixels are transparent.

pub mod client;
pub mod error;
pub mod types;

pub use client::{MlClient, MlClientConfig, RemoteBackgroundRemover};
pub use error::{MlError, MlResult};
pub use types::HealthResponse;

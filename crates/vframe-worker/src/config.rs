//! Worker configuration.

use std::str::FromStr;
use std::sync::Arc;

use tracing::{info, warn};

use vframe_media::{BackgroundRemover, OpaqueRemover};
use vframe_ml_client::{MlClient, MlClientConfig, RemoteBackgroundRemover};

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum jobs processed at once; the rest wait in `pending`
    pub max_concurrent_jobs: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(2),
        }
    }
}

/// Which background remover the worker uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackgroundRemoverKind {
    /// Keep every pixel opaque
    #[default]
    None,
    /// Call the remote matting service
    Remote,
}

impl FromStr for BackgroundRemoverKind {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "opaque" => Ok(Self::None),
            "remote" => Ok(Self::Remote),
            other => Err(WorkerError::config_error(format!(
                "unknown BACKGROUND_REMOVER '{}'",
                other
            ))),
        }
    }
}

/// Background removal configuration.
#[derive(Debug, Clone, Default)]
pub struct BackgroundConfig {
    pub kind: BackgroundRemoverKind,
    pub ml: MlClientConfig,
}

impl BackgroundConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        let kind = match std::env::var("BACKGROUND_REMOVER") {
            Ok(value) => value.parse()?,
            Err(_) => BackgroundRemoverKind::default(),
        };
        Ok(Self {
            kind,
            ml: MlClientConfig::from_env(),
        })
    }

    /// Instantiate the configured remover.
    pub fn build(&self) -> WorkerResult<Arc<dyn BackgroundRemover>> {
        match self.kind {
            BackgroundRemoverKind::None => {
                warn!(
                    "Background removal disabled: frames keep an opaque alpha channel \
                     (set BACKGROUND_REMOVER=remote to enable it)"
                );
                Ok(Arc::new(OpaqueRemover))
            }
            BackgroundRemoverKind::Remote => {
                info!(url = %self.ml.base_url, "Using remote background remover");
                let client = MlClient::new(self.ml.clone())?;
                Ok(Arc::new(RemoteBackgroundRemover::new(client)))
            }
        }
    }
}

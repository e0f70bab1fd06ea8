//! Application state.

use std::sync::Arc;

use vframe_media::{BackgroundRemover, FfmpegSourceOpener};
use vframe_queue::TaskRegistry;
use vframe_storage::LocalStorage;
use vframe_worker::{BackgroundConfig, JobExecutor, ProcessingContext, WorkerConfig};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub executor: Arc<JobExecutor>,
    pub registry: Arc<TaskRegistry>,
    pub storage: LocalStorage,
    pub remover: Arc<dyn BackgroundRemover>,
}

impl AppState {
    /// Build state around an existing executor.
    pub fn new(config: ApiConfig, executor: Arc<JobExecutor>) -> Self {
        let ctx = executor.context();
        Self {
            registry: Arc::clone(&ctx.registry),
            storage: ctx.storage.clone(),
            remover: Arc::clone(&ctx.remover),
            config,
            executor,
        }
    }

    /// Wire storage, background removal and the job executor from the
    /// environment. Must be called from within a tokio runtime.
    pub async fn from_env(config: ApiConfig) -> anyhow::Result<Self> {
        let storage = LocalStorage::from_env();
        storage.ensure_dirs().await?;

        let remover = BackgroundConfig::from_env()?.build()?;
        let registry = Arc::new(TaskRegistry::new());
        let ctx = ProcessingContext::new(
            registry,
            Arc::new(FfmpegSourceOpener),
            remover,
            storage,
        );
        let executor = JobExecutor::new(WorkerConfig::from_env(), ctx);

        Ok(Self::new(config, Arc::new(executor)))
    }
}

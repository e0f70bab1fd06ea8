//! Job executor.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use vframe_models::{Task, TaskId};
use vframe_queue::ProcessVideoJob;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::processor::{process_video, ProcessingContext};

/// Registers submissions and runs each job on its own tokio task.
///
/// A semaphore sized by `max_concurrent_jobs` caps how many jobs process at
/// once; the rest stay `pending` until a permit frees up.
pub struct JobExecutor {
    config: WorkerConfig,
    ctx: Arc<ProcessingContext>,
    job_semaphore: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
}

impl JobExecutor {
    /// Create a new job executor.
    pub fn new(config: WorkerConfig, ctx: ProcessingContext) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));

        info!(
            "Job executor ready with {} max concurrent jobs",
            config.max_concurrent_jobs
        );

        Self {
            config,
            ctx: Arc::new(ctx),
            job_semaphore,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn context(&self) -> &ProcessingContext {
        &self.ctx
    }

    /// Register `job` as `pending` and schedule it.
    ///
    /// Returns as soon as the task is registered; processing happens in the
    /// background. Must be called from within a tokio runtime.
    pub fn submit(&self, job: ProcessVideoJob) -> WorkerResult<Task> {
        if self.job_semaphore.is_closed() {
            return Err(WorkerError::ShuttingDown);
        }

        let task = self
            .ctx
            .registry
            .create(Task::new(job.job_id.clone(), job.params.clone()))?;

        let ctx = Arc::clone(&self.ctx);
        let semaphore = Arc::clone(&self.job_semaphore);
        let active = Arc::clone(&self.active);
        tokio::spawn(async move {
            Self::execute_job(ctx, semaphore, active, job).await;
        });

        Ok(task)
    }

    /// Wait for a permit, then run the job on a child task so a panic is
    /// contained and recorded on the task.
    async fn execute_job(
        ctx: Arc<ProcessingContext>,
        semaphore: Arc<Semaphore>,
        active: Arc<AtomicUsize>,
        job: ProcessVideoJob,
    ) {
        let job_id = job.job_id.clone();

        let permit = match semaphore.acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                warn!(job_id = %job_id, "Executor closed before job started");
                Self::abandon(&ctx, &job, "Worker shut down before the job started");
                return;
            }
        };

        metrics::set_active_jobs(active.fetch_add(1, Ordering::SeqCst) + 1);
        debug!(job_id = %job_id, "Executing job");

        let run_ctx = Arc::clone(&ctx);
        let handle = tokio::spawn(async move {
            let _permit = permit;
            process_video(&run_ctx, &job).await
        });

        match handle.await {
            Ok(Ok(task)) => {
                debug!(job_id = %job_id, status = %task.status(), "Job finished");
            }
            Ok(Err(e)) => {
                error!(job_id = %job_id, "Failed to record job state: {}", e);
            }
            Err(join_error) => {
                error!(job_id = %job_id, "Job task aborted: {}", join_error);
                let reason = if join_error.is_panic() {
                    "Job crashed unexpectedly"
                } else {
                    "Job was cancelled"
                };
                Self::fail_unless_terminal(&ctx, &job_id, reason);
            }
        }

        metrics::set_active_jobs(active.fetch_sub(1, Ordering::SeqCst).saturating_sub(1));
    }

    /// Mark a never-started job as failed and drop its upload.
    fn abandon(ctx: &ProcessingContext, job: &ProcessVideoJob, reason: &str) {
        if let Err(e) = ctx.storage.remove_input(&job.input_path) {
            warn!(job_id = %job.job_id, "Failed to delete input: {}", e);
        }
        Self::fail_unless_terminal(ctx, &job.job_id, reason);
    }

    fn fail_unless_terminal(ctx: &ProcessingContext, job_id: &TaskId, reason: &str) {
        let result = ctx.registry.update(job_id, |t| {
            if t.is_terminal() {
                return Ok(());
            }
            t.fail(reason)
        });
        if let Err(e) = result {
            error!(job_id = %job_id, "Failed to mark job as failed: {}", e);
        }
    }

    /// Jobs currently holding a permit.
    pub fn active_jobs(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Stop admitting work. Jobs still waiting for a permit are failed;
    /// running jobs finish normally.
    pub fn shutdown(&self) {
        info!("Shutdown signal received, closing job executor");
        self.job_semaphore.close();
    }

    pub fn is_shutdown(&self) -> bool {
        self.job_semaphore.is_closed()
    }

    /// Wait until no job holds a permit, or `timeout` elapses.
    pub async fn wait_for_jobs(&self, timeout: Duration) -> bool {
        let wait = async {
            while self.active_jobs() > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

//! Frame extraction orchestration.
//!
//! One call to [`process_video`] owns a job from `pending` until it is
//! terminal. Raw frames are read in order; every `stride`-th frame goes
//! through the transform pipeline and is written as
//! `frame_{n:05}.{ext}`. Progress and counters are published to the
//! registry after every raw frame.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use vframe_media::{
    output_filename, BackgroundRemover, FrameSource, FrameTransformPipeline, SourceOpener,
};
use vframe_models::{progress_percent, Task};
use vframe_queue::{ProcessVideoJob, TaskRegistry};
use vframe_storage::LocalStorage;

use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::metrics;

/// Everything a job needs to run.
#[derive(Clone)]
pub struct ProcessingContext {
    pub registry: Arc<TaskRegistry>,
    pub opener: Arc<dyn SourceOpener>,
    pub remover: Arc<dyn BackgroundRemover>,
    pub storage: LocalStorage,
}

impl ProcessingContext {
    pub fn new(
        registry: Arc<TaskRegistry>,
        opener: Arc<dyn SourceOpener>,
        remover: Arc<dyn BackgroundRemover>,
        storage: LocalStorage,
    ) -> Self {
        Self {
            registry,
            opener,
            remover,
            storage,
        }
    }
}

/// Run one job to completion and return its terminal snapshot.
///
/// Processing failures are recorded on the task, not returned; an `Err`
/// means the registry itself refused an update. The uploaded input is
/// deleted on every path, and always before the task turns terminal.
pub async fn process_video(ctx: &ProcessingContext, job: &ProcessVideoJob) -> WorkerResult<Task> {
    let logger = JobLogger::new(&job.job_id, "frame_extraction");
    let span = logger.create_span();
    run_job(ctx, job, &logger).instrument(span).await
}

async fn run_job(
    ctx: &ProcessingContext,
    job: &ProcessVideoJob,
    logger: &JobLogger,
) -> WorkerResult<Task> {
    let input_guard = scopeguard::guard(job.input_path.as_path(), |path| {
        remove_input(&ctx.storage, path, logger)
    });

    ctx.registry
        .update(&job.job_id, |t| t.start("Opening video..."))?;
    metrics::record_job_started();
    logger.log_start(&format!(
        "{} ({}px, every {}s, {})",
        job.original_filename,
        job.params.target_width,
        job.params.interval_seconds,
        job.params.output_format
    ));

    let started = Instant::now();
    let outcome = extract_frames(ctx, job, logger).await;
    let elapsed = started.elapsed().as_secs_f64();

    drop(input_guard);

    match outcome {
        Ok(written) => {
            let message = format!("Done: {} frames extracted", written);
            let task = ctx
                .registry
                .update(&job.job_id, |t| t.complete(written, message.as_str()))?;
            metrics::record_job_completed(elapsed);
            logger.log_completion(&format!("{} in {:.2}s", message, elapsed));
            Ok(task)
        }
        Err(e) => {
            let message = e.to_string();
            logger.log_error(&message);
            metrics::record_job_failed(elapsed);
            Ok(ctx
                .registry
                .update(&job.job_id, |t| t.fail(message.as_str()))?)
        }
    }
}

/// Open the source, extract, then release it whatever the outcome.
async fn extract_frames(
    ctx: &ProcessingContext,
    job: &ProcessVideoJob,
    logger: &JobLogger,
) -> WorkerResult<u64> {
    let mut source = ctx.opener.open(&job.input_path).await?;

    let result = run_source(ctx, job, source.as_mut(), logger).await;

    if let Err(e) = source.close().await {
        logger.log_warning(&format!("Failed to release frame source: {}", e));
    }

    result
}

async fn run_source(
    ctx: &ProcessingContext,
    job: &ProcessVideoJob,
    source: &mut dyn FrameSource,
    logger: &JobLogger,
) -> WorkerResult<u64> {
    let fps = source.fps();
    let total_frames = source.total_frames();
    let stride = job.params.sampling_stride(fps);
    let format = job.params.output_format;

    let output_dir = ctx.storage.create_job_output_dir(&job.job_id).await?;
    let summary = format!(
        "Video: {} frames at {:.2} fps. Extracting every {}s ({} frames).",
        total_frames, fps, job.params.interval_seconds, stride
    );
    ctx.registry.update(&job.job_id, |t| {
        t.set_total_frames(total_frames)?;
        t.set_output_dir(output_dir.as_path())?;
        t.set_message(summary.as_str());
        Ok(())
    })?;
    logger.log_progress(&summary);

    let pipeline = FrameTransformPipeline::new(job.params.clone(), Arc::clone(&ctx.remover));
    let mut frames_read: u64 = 0;
    let mut frames_written: u64 = 0;

    while let Some(frame) = source.next_frame().await? {
        let sampled = frames_read % stride == 0;
        if sampled {
            let encoded = pipeline.process(frame).await?;
            let filename = output_filename(frames_written, format);
            ctx.storage
                .write_output(&output_dir, &filename, &encoded.bytes)
                .await?;
            frames_written += 1;
            metrics::record_frame_written(format);
        }
        frames_read += 1;

        ctx.registry.update(&job.job_id, |t| {
            t.record_progress(frames_read, frames_written)?;
            if sampled {
                t.set_message(format!(
                    "Extracting frames... {}%",
                    progress_percent(frames_read, total_frames)
                ));
            }
            Ok(())
        })?;
    }

    if total_frames > 0 && frames_read != total_frames {
        logger.log_warning(&format!(
            "Source reported {} frames but yielded {}",
            total_frames, frames_read
        ));
    }

    Ok(frames_written)
}

fn remove_input(storage: &LocalStorage, path: &Path, logger: &JobLogger) {
    match storage.remove_input(path) {
        Ok(true) => {}
        Ok(false) => logger.log_warning(&format!("Input {} was already gone", path.display())),
        Err(e) => logger.log_warning(&format!(
            "Failed to delete input {}: {}",
            path.display(),
            e
        )),
    }
}

//! Job submission, progress and output handlers.

use axum::body::Bytes;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use tracing::{error, info, warn};

use vframe_models::params::{DEFAULT_INTERVAL_SECONDS, DEFAULT_TARGET_WIDTH};
use vframe_models::{JobParams, ModelError, OutputFormat, Task, TaskId, TaskStatus};
use vframe_queue::ProcessVideoJob;
use vframe_storage::{extension_of, is_allowed_video, sanitize_filename, StorageError};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Fields of a `/process` upload, before validation.
#[derive(Debug, Default)]
struct UploadForm {
    file_name: Option<String>,
    file: Option<Bytes>,
    target_width: Option<String>,
    interval: Option<String>,
    output_format: Option<String>,
    unblur_option: Option<String>,
}

impl UploadForm {
    async fn read(multipart: &mut Multipart) -> ApiResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match name.as_str() {
                "video_file" => {
                    form.file_name = Some(field.file_name().unwrap_or_default().to_string());
                    form.file = Some(field.bytes().await?);
                }
                "target_width" => form.target_width = Some(field.text().await?),
                "interval" => form.interval = Some(field.text().await?),
                "output_format" => form.output_format = Some(field.text().await?),
                "unblur_option" => form.unblur_option = Some(field.text().await?),
                _ => {}
            }
        }

        Ok(form)
    }

    /// Absent fields take their defaults. Numbers tolerate surrounding
    /// whitespace; `output_format` must be exactly `png`, `jpg` or `webp` and
    /// `unblur_option` is set only by the exact value `on`.
    fn params(&self) -> ApiResult<JobParams> {
        let output_format = match self.output_format.as_deref() {
            None => OutputFormat::default(),
            Some(raw @ ("png" | "jpg" | "webp")) => raw.parse::<OutputFormat>()?,
            Some(raw) => return Err(ModelError::UnsupportedFormat(raw.to_string()).into()),
        };

        let target_width = match self.target_width.as_deref() {
            None => DEFAULT_TARGET_WIDTH,
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
                ApiError::bad_request(format!("Invalid target_width: {:?}", raw))
            })?,
        };

        let interval = match self.interval.as_deref() {
            None => DEFAULT_INTERVAL_SECONDS,
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .map_err(|_| ApiError::bad_request(format!("Invalid interval: {:?}", raw)))?,
        };

        let unblur = self.unblur_option.as_deref() == Some("on");

        Ok(JobParams::new(target_width, interval, output_format, unblur)?)
    }
}

/// Accepted submission.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub video_id: String,
    pub message: String,
}

/// Upload a video and start frame extraction.
pub async fn submit_job(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let form = UploadForm::read(&mut multipart).await?;

    let (Some(file_name), Some(data)) = (form.file_name.as_deref(), form.file.as_ref()) else {
        return Err(ApiError::bad_request("No video file provided"));
    };
    if file_name.is_empty() {
        return Err(ApiError::bad_request("Empty file name"));
    }
    if !is_allowed_video(file_name) {
        return Err(ApiError::bad_request(format!(
            "File type not allowed: {}",
            file_name
        )));
    }
    if data.is_empty() {
        return Err(ApiError::bad_request("Uploaded file is empty"));
    }

    let params = form.params()?;

    let job_id = TaskId::new();
    let mut safe_name = sanitize_filename(file_name);
    if safe_name.is_empty() || extension_of(&safe_name) != extension_of(file_name) {
        let ext = extension_of(file_name).unwrap_or_default();
        safe_name = format!("upload.{}", ext);
    }

    let input_path = state
        .storage
        .save_upload(&job_id, &safe_name, data)
        .await
        .map_err(|e| {
            error!(job_id = %job_id, "Failed to save upload: {}", e);
            ApiError::internal("Failed to save uploaded file")
        })?;

    let format = params.output_format;
    let job = ProcessVideoJob::new(job_id.clone(), input_path.clone(), file_name, params);

    if let Err(e) = state.executor.submit(job) {
        if let Err(cleanup) = state.storage.remove_input(&input_path) {
            warn!(job_id = %job_id, "Failed to remove rejected upload: {}", cleanup);
        }
        return Err(e.into());
    }

    metrics::record_job_submitted(format.extension(), data.len());
    info!(
        job_id = %job_id,
        filename = %file_name,
        bytes = data.len(),
        format = %format,
        "Accepted upload"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            video_id: job_id.to_string(),
            message: "Processing started".to_string(),
        }),
    ))
}

/// Progress snapshot of one job.
#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub status: TaskStatus,
    pub progress: u8,
    pub message: String,
    pub frames_count: u64,
    pub total_frames: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<&Task> for ProgressResponse {
    fn from(task: &Task) -> Self {
        Self {
            status: task.status(),
            progress: task.progress(),
            message: task.message().to_string(),
            frames_count: task.frames_count(),
            total_frames: task.total_frames(),
            error_message: task.error_message().map(str::to_string),
        }
    }
}

/// Poll a job.
pub async fn get_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProgressResponse>> {
    let task = state.registry.get(&TaskId::from_string(id))?;
    Ok(Json(ProgressResponse::from(&task)))
}

/// Extracted frame names of a completed job.
#[derive(Debug, Serialize)]
pub struct FramesResponse {
    pub frames: Vec<String>,
}

pub async fn list_frames(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<FramesResponse>> {
    let task = completed_task(&state, id)?;
    let dir = output_dir(&task)?;

    let frames = state.storage.list_outputs(dir).await.map_err(|e| {
        error!(job_id = %task.id(), "Failed to list frames: {}", e);
        ApiError::internal("Failed to list frames")
    })?;

    Ok(Json(FramesResponse { frames }))
}

/// Serve one extracted frame while the job is running or after it completed.
pub async fn serve_output(
    State(state): State<AppState>,
    Path((id, filename)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let task = state.registry.get(&TaskId::from_string(id))?;
    if !matches!(task.status(), TaskStatus::Processing | TaskStatus::Completed) {
        return Err(ApiError::not_found("No outputs available for this job"));
    }
    let dir = output_dir(&task)?;

    let path = match state.storage.resolve_output(dir, &filename).await {
        Ok(path) => path,
        Err(StorageError::InvalidPath(_)) | Err(StorageError::NotFound(_)) => {
            return Err(ApiError::not_found(format!("Unknown output {}", filename)));
        }
        Err(e) => return Err(e.into()),
    };

    let bytes = tokio::fs::read(&path).await.map_err(StorageError::from)?;
    let content_type = extension_of(&filename)
        .and_then(|ext| OutputFormat::from_extension(&ext))
        .map(|format| format.mime_type())
        .unwrap_or("application/octet-stream");

    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}

/// Download every frame of a completed job as a zip archive.
pub async fn download_archive(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let task = completed_task(&state, id)?;
    let dir = output_dir(&task)?;

    let archive = state.storage.archive_outputs(dir).await.map_err(|e| {
        error!(job_id = %task.id(), "Failed to build archive: {}", e);
        ApiError::internal("Failed to build archive")
    })?;

    let disposition = format!("attachment; filename=\"frames_{}.zip\"", task.id());
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        archive,
    ))
}

fn completed_task(state: &AppState, id: String) -> ApiResult<Task> {
    let task = state.registry.get(&TaskId::from_string(id))?;
    if task.status() != TaskStatus::Completed {
        return Err(ApiError::not_found(format!(
            "Job {} is not completed",
            task.id()
        )));
    }
    Ok(task)
}

fn output_dir(task: &Task) -> ApiResult<&std::path::Path> {
    task.output_dir()
        .ok_or_else(|| ApiError::not_found(format!("Job {} has no outputs", task.id())))
}

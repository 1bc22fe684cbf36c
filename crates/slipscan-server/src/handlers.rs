use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use slipscan::{
    FileState, JobKind, JobOutput, PipelineError, ReceiptRow, SourceFileRow, Verdict,
};

use crate::error::ApiError;
use crate::state::AppState;

const UPLOAD_FIELD: &str = "file";
const FALLBACK_FILE_NAME: &str = "upload.pdf";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRequest {
    pub file_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileView {
    #[serde(flatten)]
    pub file: SourceFileRow,
    pub state: FileState,
}

impl From<SourceFileRow> for FileView {
    fn from(file: SourceFileRow) -> Self {
        let state = file.state();
        Self { file, state }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub file_id: String,
    #[serde(flatten)]
    pub verdict: Verdict,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub receipt: ReceiptRow,
    pub already_processed: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Runs a coordinator call on the blocking thread pool.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PipelineError::Internal(format!("blocking task failed: {}", e)))?
        .map_err(ApiError::from)
}

fn unexpected(output: JobOutput) -> ApiError {
    PipelineError::Internal(format!("unexpected job output: {:?}", output)).into()
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /upload`, multipart with a `file` part.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileView>), ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field
            .file_name()
            .unwrap_or(FALLBACK_FILE_NAME)
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {}", e)))?;
        upload = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) = upload
        .ok_or_else(|| ApiError::BadRequest(format!("missing '{}' field", UPLOAD_FIELD)))?;

    let coordinator = state.coordinator.clone();
    let file = blocking(move || coordinator.register_upload(&file_name, &bytes)).await?;
    info!(file_id = %file.id, "Upload registered");

    Ok((StatusCode::CREATED, Json(file.into())))
}

/// `POST /validate {fileId}`
pub async fn validate(
    State(state): State<AppState>,
    Json(request): Json<FileRequest>,
) -> Result<Json<ValidateResponse>, ApiError> {
    match state.pool.run(&request.file_id, JobKind::Validate).await? {
        JobOutput::Validated(verdict) => Ok(Json(ValidateResponse {
            file_id: request.file_id,
            verdict,
        })),
        other => Err(unexpected(other)),
    }
}

/// `POST /process {fileId}`. 201 when a receipt was created, 200 when it
/// already existed.
pub async fn process(
    State(state): State<AppState>,
    Json(request): Json<FileRequest>,
) -> Result<(StatusCode, Json<ProcessResponse>), ApiError> {
    match state.pool.run(&request.file_id, JobKind::Process).await? {
        JobOutput::Processed(outcome) => {
            let status = if outcome.already_processed {
                StatusCode::OK
            } else {
                StatusCode::CREATED
            };
            Ok((
                status,
                Json(ProcessResponse {
                    receipt: outcome.receipt,
                    already_processed: outcome.already_processed,
                }),
            ))
        }
        other => Err(unexpected(other)),
    }
}

pub async fn list_receipts(
    State(state): State<AppState>,
) -> Result<Json<Vec<ReceiptRow>>, ApiError> {
    let coordinator = state.coordinator.clone();
    Ok(Json(blocking(move || coordinator.receipts()).await?))
}

pub async fn get_receipt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReceiptRow>, ApiError> {
    let coordinator = state.coordinator.clone();
    Ok(Json(blocking(move || coordinator.receipt(&id)).await?))
}

pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FileView>, ApiError> {
    let coordinator = state.coordinator.clone();
    let file = blocking(move || coordinator.source_file(&id)).await?;
    Ok(Json(file.into()))
}

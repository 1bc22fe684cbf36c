//! Maps pipeline failures onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use slipscan::{PipelineError, ProcessError, StorageError, WorkerError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    pub retryable: bool,
    /// Stored invalidity reason, set for `not_validated`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Pipeline(PipelineError),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::Pipeline(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(err) => match err {
                PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
                PipelineError::AssetMissing { .. } => StatusCode::GONE,
                PipelineError::NotValidated { .. } => StatusCode::CONFLICT,
                PipelineError::Processing(ProcessError::Rasterization(_))
                | PipelineError::Processing(ProcessError::Extraction(_)) => StatusCode::BAD_GATEWAY,
                PipelineError::Worker(WorkerError::QueueFull { .. }) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                PipelineError::Storage(StorageError::EmptyUpload(_)) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Pipeline(err) => match err {
                PipelineError::NotFound(_) => "not_found",
                PipelineError::AssetMissing { .. } => "asset_missing",
                PipelineError::NotValidated { .. } => "not_validated",
                PipelineError::Processing(ProcessError::Rasterization(_)) => "rasterization_failed",
                PipelineError::Processing(ProcessError::Extraction(_)) => "extraction_failed",
                PipelineError::Worker(WorkerError::QueueFull { .. }) => "busy",
                PipelineError::Storage(StorageError::EmptyUpload(_)) => "empty_upload",
                _ => "internal",
            },
        }
    }

    fn body(&self) -> ErrorResponse {
        match self {
            ApiError::BadRequest(message) => ErrorResponse {
                error: message.clone(),
                code: self.code(),
                retryable: false,
                reason: None,
            },
            ApiError::Pipeline(err) => ErrorResponse {
                error: err.to_string(),
                code: self.code(),
                retryable: err.is_retryable(),
                reason: match err {
                    PipelineError::NotValidated { reason, .. } => Some(reason.clone()),
                    _ => None,
                },
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = self.body();

        if status.is_server_error() {
            tracing::error!(code = body.code, error = %body.error, "Request failed");
        } else {
            tracing::debug!(code = body.code, error = %body.error, "Request rejected");
        }

        (status, Json(body)).into_response()
    }
}

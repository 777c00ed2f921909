//! Upload endpoint: stage the file, run the macro pipeline, stream the
//! processed workbook back, and always remove the staged input afterward.

use std::path::Path;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::DriveError;
use crate::orchestrator::run_pipeline;

use super::server::AppState;

pub const SPREADSHEET_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const ACCEPTED_EXTENSIONS: [&str; 2] = [".xls", ".xlsx"];

/// True when the filename carries an accepted spreadsheet extension,
/// case-insensitively.
pub fn has_accepted_extension(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    ACCEPTED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            detail: detail.into(),
        }),
    )
        .into_response()
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// GET /health - liveness probe
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// POST /upload/ - process an uploaded workbook.
pub async fn upload(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    let (file_name, bytes) = match read_file_field(multipart).await {
        Ok(found) => found,
        Err(response) => return response,
    };

    // Extension check happens before anything touches the filesystem.
    if !has_accepted_extension(&file_name) {
        return error_response(
            StatusCode::BAD_REQUEST,
            DriveError::InvalidExtension(file_name).to_string(),
        );
    }

    let staged = state
        .config
        .staging_dir
        .join(format!("{}_{file_name}", Uuid::new_v4()));

    let response = process_staged(&state, &staged, &file_name, bytes).await;

    // The staged input is ephemeral regardless of outcome; removal failures
    // are logged, never surfaced.
    match tokio::fs::remove_file(&staged).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(staged = %staged.display(), error = %e, "failed to remove staged upload"),
    }

    response
}

/// Persist the upload, run the pipeline on a blocking thread, and build the
/// file response.
async fn process_staged(
    state: &AppState,
    staged: &Path,
    file_name: &str,
    bytes: Bytes,
) -> Response {
    if let Err(e) = tokio::fs::write(staged, &bytes).await {
        error!(staged = %staged.display(), error = %e, "failed to stage upload");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    let config = state.config.clone();
    let input = staged.to_path_buf();
    let outcome = tokio::task::spawn_blocking(move || run_pipeline(&config, &input)).await;

    let output = match outcome {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            error!(error = %e, "processing failed");
            let status = if e.is_client_error() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            return error_response(status, e.to_string());
        }
        Err(e) => {
            error!(error = %e, "processing task panicked");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "processing task failed");
        }
    };

    file_response(&output, file_name).await
}

/// Stream the processed workbook back under `processed_<original-name>`.
async fn file_response(output: &Path, original_name: &str) -> Response {
    match tokio::fs::read(output).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, SPREADSHEET_CONTENT_TYPE.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"processed_{original_name}\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            error!(output = %output.display(), error = %e, "failed to read processed workbook");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Pull the uploaded file out of the multipart body. The frontend sends it
/// as the `file` field; any field carrying a filename is accepted.
async fn read_file_field(mut multipart: Multipart) -> Result<(String, Bytes), Response> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => {
                return Err(error_response(
                    StatusCode::BAD_REQUEST,
                    "multipart body has no file field",
                ))
            }
            Err(e) => return Err(error_response(StatusCode::BAD_REQUEST, e.to_string())),
        };

        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        // Strip any client-supplied directory components.
        let file_name = Path::new(&file_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(file_name);

        return match field.bytes().await {
            Ok(bytes) => Ok((file_name, bytes)),
            Err(e) => Err(error_response(StatusCode::BAD_REQUEST, e.to_string())),
        };
    }
}

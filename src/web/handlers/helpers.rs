// src/web/handlers/helpers.rs
//! Shared plumbing for the route handlers

use anyhow::{Context, Result};
use rocket::fs::TempFile;
use rocket::http::Status;
use tokio::io::AsyncReadExt;
use tracing::error;

use crate::core::ApiError;
use crate::types::UploadedFile;
use crate::utils::{get_file_extension, is_valid_job_id, resume_extension_for};
use crate::web::types::{ErrorReply, StandardErrorResponse};

pub fn check_job_id(job_id: &str) -> Result<(), ErrorReply> {
    if is_valid_job_id(job_id) {
        Ok(())
    } else {
        Err(StandardErrorResponse::new(
            format!("Invalid job id: {}", job_id),
            "INVALID_JOB_ID".to_string(),
            vec!["Check the link you followed".to_string()],
        )
        .reply(Status::BadRequest))
    }
}

/// Map plumbing failures: backend trouble is a 502, anything else a 500
pub fn internal_failure(action: &str, err: anyhow::Error) -> ErrorReply {
    error!("Failed to {}: {:#}", action, err);

    if let Some(api_error) = err.downcast_ref::<ApiError>() {
        return StandardErrorResponse::new(
            format!("The job board is unavailable: {}", api_error),
            "BACKEND_UNAVAILABLE".to_string(),
            vec!["Try again in a few moments".to_string()],
        )
        .reply(Status::BadGateway);
    }

    StandardErrorResponse::new(
        format!("Failed to {}", action),
        "INTERNAL_ERROR".to_string(),
        vec![
            "Try again in a few moments".to_string(),
            "Contact support if the problem persists".to_string(),
        ],
    )
    .reply(Status::InternalServerError)
}

/// Buffer an uploaded file. The extension comes from the content type when
/// it names a document format, otherwise from the client's file name.
pub async fn read_upload(file: &TempFile<'_>, fallback_stem: &str) -> Result<UploadedFile> {
    let content_type = file
        .content_type()
        .map(|ct| ct.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let raw_name = file
        .raw_name()
        .map(|name| name.dangerous_unsafe_unsanitized_raw().as_str().to_string());
    let stem = file.name().unwrap_or(fallback_stem);

    let extension = resume_extension_for(&content_type)
        .ok()
        .map(str::to_string)
        .or_else(|| raw_name.as_deref().and_then(get_file_extension));

    let file_name = match extension {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem.to_string(),
    };

    let mut reader = Box::pin(file.open().await.context("Failed to open uploaded file")?);
    let mut bytes = Vec::with_capacity(file.len() as usize);
    reader
        .read_to_end(&mut bytes)
        .await
        .context("Failed to read uploaded file")?;

    Ok(UploadedFile::new(file_name, content_type, bytes))
}

// src/utils.rs
use anyhow::Result;

/// Where the "already applied" affordance points
pub const APPLICATIONS_PATH: &str = "/applications";

const MAX_JOB_ID_LEN: usize = 64;

/// Job ids are embedded verbatim in paths and query strings, so only a
/// conservative alphabet is accepted.
pub fn is_valid_job_id(job_id: &str) -> bool {
    !job_id.is_empty()
        && job_id.len() <= MAX_JOB_ID_LEN
        && job_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Interpret a query flag the way browsers send them
pub fn parse_flag(value: Option<&str>) -> bool {
    match value.map(|v| v.trim().to_lowercase()).as_deref() {
        Some("") | Some("true") | Some("1") | Some("yes") | Some("on") => true,
        _ => false,
    }
}

// The path builders below interpolate `job_id` verbatim: callers must have
// checked it with `is_valid_job_id` first.

/// Job page, the entry point of the application flow
pub fn job_page_path(job_id: &str) -> String {
    format!("/jobs/{}", job_id)
}

/// Entry point of the MBTI test, carrying the job to come back to
pub fn mbti_test_path(job_id: &str) -> String {
    format!("/mbti-test?jobId={}", job_id)
}

/// Job page with the completion marker the test appends on its way back
pub fn mbti_return_path(job_id: &str, step: u8) -> String {
    format!("/jobs/{}?mbtiCompleted=true&step={}", job_id, step)
}

/// Get file extension in lowercase
pub fn get_file_extension(filename: &str) -> Option<String> {
    std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Resume documents accepted by the backend
pub fn resume_extension_for(content_type: &str) -> Result<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();

    match essence.as_str() {
        "application/pdf" => Ok("pdf"),
        "application/msword" => Ok("doc"),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Ok("docx"),
        _ => anyhow::bail!("Unsupported file format: {}", content_type),
    }
}

/// Inverse of `resume_extension_for`, used when a client sends a generic content type
pub fn content_type_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_lowercase().as_str() {
        "pdf" => Some("application/pdf"),
        "doc" => Some("application/msword"),
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        _ => None,
    }
}

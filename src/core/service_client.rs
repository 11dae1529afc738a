// src/core/service_client.rs
//! HTTP client for the job board REST backend

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::types::{
    AnswerProgress, AnswerProgressWire, AnswerSubmission, ApplicationCheck, ApplicationPayload,
    BackendErrorBody, Credentials, JobSnapshot, LoginResponse, MbtiStatus, MbtiStatusResponse,
    TestQuestion, TestSession, UploadedFile,
};

const JOBS_ENDPOINT: &str = "/jobs";
const APPLICATIONS_ENDPOINT: &str = "/applications";
const APPLICATION_CHECK_ENDPOINT: &str = "/applications/check";
const TEST_STATUS_ENDPOINT: &str = "/tests/status/user";
const TEST_START_ENDPOINT: &str = "/tests/start";
const TEST_QUESTIONS_ENDPOINT: &str = "/tests/questions";
const TEST_ANSWER_ENDPOINT: &str = "/tests/answer";
const LOGIN_ENDPOINT: &str = "/auth/login";
const FACE_LOGIN_ENDPOINT: &str = "/auth/face-login";
const LOGOUT_ENDPOINT: &str = "/auth/logout";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Failure of a backend call, classified by response shape
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("backend returned {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Status { status: u16, message: Option<String> },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ApiError::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND.as_u16())
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// Everything the front end consumes from the backend. The engine only sees
/// this trait, so tests substitute a scripted implementation.
#[async_trait]
pub trait JobBoardApi: Send + Sync {
    async fn fetch_job(&self, job_id: &str) -> Result<JobSnapshot, ApiError>;

    async fn check_application(&self, token: &str, job_id: &str) -> Result<bool, ApiError>;

    async fn mbti_status(&self, token: &str) -> Result<MbtiStatus, ApiError>;

    async fn start_test(&self, token: &str) -> Result<TestSession, ApiError>;

    async fn test_questions(&self, token: &str) -> Result<Vec<TestQuestion>, ApiError>;

    async fn submit_answer(
        &self,
        token: &str,
        answer: &AnswerSubmission,
    ) -> Result<AnswerProgress, ApiError>;

    async fn submit_application(
        &self,
        token: &str,
        payload: &ApplicationPayload,
    ) -> Result<(), ApiError>;

    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError>;

    async fn face_login(&self, image: &UploadedFile) -> Result<LoginResponse, ApiError>;

    async fn logout(&self, token: &str) -> Result<(), ApiError>;
}

pub struct ServiceClient {
    client: reqwest::Client,
    base_url: String,
}

impl ServiceClient {
    /// Create new service client; every request is bounded by `timeout_seconds`
    pub fn new(base_url: String, timeout_seconds: u64) -> Result<Self> {
        let timeout = if timeout_seconds == 0 {
            DEFAULT_TIMEOUT_SECS
        } else {
            timeout_seconds
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn authorized(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Generic GET request
    async fn get<R>(&self, endpoint: &str, token: Option<&str>) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
    {
        let url = self.url(endpoint);
        trace!("GET {}", url);

        let response = Self::authorized(self.client.get(&url), token).send().await?;
        Self::parse(response).await
    }

    /// Generic POST request with JSON
    async fn post_json<T, R>(&self, endpoint: &str, token: Option<&str>, payload: &T) -> Result<R, ApiError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(endpoint);
        trace!("POST {}", url);

        let response = Self::authorized(self.client.post(&url), token)
            .json(payload)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn parse<R>(response: Response) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
    {
        if response.status().is_success() {
            response
                .json::<R>()
                .await
                .map_err(|e| ApiError::Decode(e.to_string()))
        } else {
            Err(Self::error_from(response).await)
        }
    }

    /// Turn a non-2xx response into `ApiError::Status`, keeping the backend's `{message}`
    async fn error_from(response: Response) -> ApiError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        let message = serde_json::from_str::<BackendErrorBody>(&body)
            .ok()
            .and_then(BackendErrorBody::into_message);

        debug!("Backend error {}: {:?}", status, message);
        ApiError::Status { status, message }
    }

    fn file_part(file: &UploadedFile) -> Result<Part, ApiError> {
        Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| ApiError::Transport(format!("Failed to create multipart: {}", e)))
    }
}

#[async_trait]
impl JobBoardApi for ServiceClient {
    async fn fetch_job(&self, job_id: &str) -> Result<JobSnapshot, ApiError> {
        let mut job: JobSnapshot = self
            .get(&format!("{}/{}", JOBS_ENDPOINT, job_id), None)
            .await?;
        if job.id.is_empty() {
            job.id = job_id.to_string();
        }
        Ok(job)
    }

    async fn check_application(&self, token: &str, job_id: &str) -> Result<bool, ApiError> {
        let check: ApplicationCheck = self
            .get(
                &format!("{}/{}", APPLICATION_CHECK_ENDPOINT, job_id),
                Some(token),
            )
            .await?;
        Ok(check.has_applied)
    }

    async fn mbti_status(&self, token: &str) -> Result<MbtiStatus, ApiError> {
        let response: MbtiStatusResponse = self.get(TEST_STATUS_ENDPOINT, Some(token)).await?;
        Ok(response.into())
    }

    async fn start_test(&self, token: &str) -> Result<TestSession, ApiError> {
        self.post_json(TEST_START_ENDPOINT, Some(token), &serde_json::json!({}))
            .await
    }

    async fn test_questions(&self, token: &str) -> Result<Vec<TestQuestion>, ApiError> {
        self.get(TEST_QUESTIONS_ENDPOINT, Some(token)).await
    }

    async fn submit_answer(
        &self,
        token: &str,
        answer: &AnswerSubmission,
    ) -> Result<AnswerProgress, ApiError> {
        let wire: AnswerProgressWire = self
            .post_json(TEST_ANSWER_ENDPOINT, Some(token), answer)
            .await?;
        Ok(wire.into())
    }

    async fn submit_application(
        &self,
        token: &str,
        payload: &ApplicationPayload,
    ) -> Result<(), ApiError> {
        let url = self.url(APPLICATIONS_ENDPOINT);
        let scores = serde_json::to_string(&payload.mbti_scores)
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        let form = Form::new()
            .text("jobId", payload.job_id.clone())
            .text("name", payload.name.clone())
            .text("email", payload.email.clone())
            .text("phone", payload.phone.clone())
            .text("coverLetter", payload.cover_letter.clone())
            .part("resume", Self::file_part(&payload.resume)?)
            .text("mbtiResult", payload.mbti_result.clone())
            .text("mbtiScores", scores);

        trace!("POST {} (multipart)", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            if status != StatusCode::CREATED {
                warn!("Application accepted with unexpected status {}", status);
            }
            Ok(())
        } else {
            Err(Self::error_from(response).await)
        }
    }

    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        self.post_json(LOGIN_ENDPOINT, None, credentials).await
    }

    async fn face_login(&self, image: &UploadedFile) -> Result<LoginResponse, ApiError> {
        let url = self.url(FACE_LOGIN_ENDPOINT);
        let form = Form::new().part("image", Self::file_part(image)?);

        let response = self.client.post(&url).multipart(form).send().await?;
        Self::parse(response).await
    }

    async fn logout(&self, token: &str) -> Result<(), ApiError> {
        let url = self.url(LOGOUT_ENDPOINT);
        let response = self.client.post(&url).bearer_auth(token).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from(response).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let client = ServiceClient::new("http://localhost:5000/api/".to_string(), 5).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000/api");
        assert_eq!(client.url(JOBS_ENDPOINT), "http://localhost:5000/api/jobs");
    }

    #[test]
    fn test_api_error_accessors() {
        let err = ApiError::Status {
            status: 404,
            message: Some("Job not found".to_string()),
        };
        assert!(err.is_not_found());
        assert_eq!(err.message(), Some("Job not found"));
        assert_eq!(err.to_string(), "backend returned 404: Job not found");

        let err = ApiError::Transport("timed out".to_string());
        assert_eq!(err.status(), None);
        assert!(!err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_a_transport_error() {
        // Port 9 (discard) on localhost is not expected to serve HTTP
        let client = ServiceClient::new("http://127.0.0.1:9".to_string(), 2).unwrap();
        let err = client.fetch_job("42").await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }
}

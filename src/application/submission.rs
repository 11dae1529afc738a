// src/application/submission.rs
//! Terminal submit of an application, its error taxonomy and the in-flight guard

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{error, info, warn};

use super::draft::{ApplicationDraft, DraftStore};
use super::sequencer::Step;
use super::validation::{validate_all, FieldValidationErrors};
use crate::core::{ApiError, JobBoardApi, PersistedSession};
use crate::types::{ApplicationPayload, MbtiStatus, SubmissionReceipt, UploadedFile};
use crate::utils::mbti_test_path;

pub const SUBMIT_FALLBACK_MESSAGE: &str = "Failed to submit application. Please try again.";

// ===== In-Flight Guard =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowAction {
    Advance,
    Submit,
}

impl FlowAction {
    fn as_str(self) -> &'static str {
        match self {
            FlowAction::Advance => "advance",
            FlowAction::Submit => "submit",
        }
    }
}

/// One in-flight request per (session, job, action)
#[derive(Default)]
pub struct InFlightRegistry {
    active: Mutex<HashSet<String>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(session_id: &str, job_id: &str, action: FlowAction) -> String {
        format!("{}:{}:{}", session_id, job_id, action.as_str())
    }

    /// `None` while the same action is already running; the slot frees when
    /// the guard drops.
    pub fn try_acquire(&self, session_id: &str, job_id: &str, action: FlowAction) -> Option<InFlightGuard<'_>> {
        let key = Self::key(session_id, job_id, action);
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.insert(key.clone()) {
            Some(InFlightGuard {
                registry: self,
                key,
            })
        } else {
            None
        }
    }

    pub fn is_active(&self, session_id: &str, job_id: &str, action: FlowAction) -> bool {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.contains(&Self::key(session_id, job_id, action))
    }
}

pub struct InFlightGuard<'a> {
    registry: &'a InFlightRegistry,
    key: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut active = self.registry.active.lock().unwrap_or_else(|e| e.into_inner());
        active.remove(&self.key);
    }
}

// ===== Errors =====

/// What the user can do about a failed submit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recovery {
    Login,
    FixFields,
    TakeTest,
    AttachResume,
    ViewApplications,
    None,
    Retry,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    #[error("Please log in to submit your application")]
    Unauthenticated,
    #[error("There is no application in progress for this job")]
    NoDraft,
    #[error("Please review your application before submitting")]
    NotAtReview,
    #[error("Please fix the highlighted fields before submitting")]
    Validation(FieldValidationErrors),
    #[error("Please complete the MBTI test before submitting")]
    MbtiIncomplete,
    #[error("Please re-attach your resume before submitting")]
    ResumeMissing,
    #[error("You have already applied for this job")]
    AlreadyApplied,
    #[error("This job is no longer available")]
    JobNotFound,
    #[error("The MBTI test is required before applying")]
    MbtiRequired { test_url: String },
    #[error("{message}")]
    Server { status: Option<u16>, message: String },
    #[error("Could not reach the job board: {0}")]
    Transport(String),
    #[error("Could not save your application state: {0}")]
    Storage(String),
}

impl SubmitError {
    pub fn recovery(&self) -> Recovery {
        match self {
            SubmitError::Unauthenticated => Recovery::Login,
            SubmitError::NoDraft | SubmitError::NotAtReview | SubmitError::Validation(_) => {
                Recovery::FixFields
            }
            SubmitError::MbtiIncomplete | SubmitError::MbtiRequired { .. } => Recovery::TakeTest,
            SubmitError::ResumeMissing => Recovery::AttachResume,
            SubmitError::AlreadyApplied => Recovery::ViewApplications,
            SubmitError::JobNotFound => Recovery::None,
            SubmitError::Server { .. } | SubmitError::Transport(_) | SubmitError::Storage(_) => {
                Recovery::Retry
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            SubmitError::Unauthenticated => "UNAUTHENTICATED",
            SubmitError::NoDraft => "NO_DRAFT",
            SubmitError::NotAtReview => "NOT_AT_REVIEW",
            SubmitError::Validation(_) => "VALIDATION_FAILED",
            SubmitError::MbtiIncomplete => "MBTI_INCOMPLETE",
            SubmitError::ResumeMissing => "RESUME_MISSING",
            SubmitError::AlreadyApplied => "ALREADY_APPLIED",
            SubmitError::JobNotFound => "JOB_NOT_FOUND",
            SubmitError::MbtiRequired { .. } => "MBTI_REQUIRED",
            SubmitError::Server { .. } => "SUBMIT_FAILED",
            SubmitError::Transport(_) => "BACKEND_UNREACHABLE",
            SubmitError::Storage(_) => "STORAGE_ERROR",
        }
    }

    pub fn storage(err: anyhow::Error) -> Self {
        SubmitError::Storage(format!("{:#}", err))
    }
}

/// Map a failed `POST /applications` onto the taxonomy, by status first and
/// message second
pub fn classify(err: ApiError, job_id: &str) -> SubmitError {
    match err {
        ApiError::Status { status: 404, .. } => SubmitError::JobNotFound,
        ApiError::Status { status, message } => {
            let lowered = message.as_deref().unwrap_or_default().to_lowercase();
            if status == 409 || lowered.contains("already applied") {
                SubmitError::AlreadyApplied
            } else if lowered.contains("mbti") && lowered.contains("required") {
                SubmitError::MbtiRequired {
                    test_url: mbti_test_path(job_id),
                }
            } else {
                SubmitError::Server {
                    status: Some(status),
                    message: message.unwrap_or_else(|| SUBMIT_FALLBACK_MESSAGE.to_string()),
                }
            }
        }
        ApiError::Transport(message) => SubmitError::Transport(message),
        ApiError::Decode(_) => SubmitError::Server {
            status: None,
            message: SUBMIT_FALLBACK_MESSAGE.to_string(),
        },
    }
}

/// Local preconditions of a submit, checked before any network call
pub fn preflight(draft: &ApplicationDraft, resume_attached: bool, mbti: &MbtiStatus) -> Result<(), SubmitError> {
    if draft.current_step != Step::Review {
        return Err(SubmitError::NotAtReview);
    }
    if !resume_attached {
        return Err(SubmitError::ResumeMissing);
    }

    let errors = validate_all(draft, resume_attached);
    if !errors.is_empty() {
        return Err(SubmitError::Validation(errors));
    }

    if !mbti.is_completed() {
        return Err(SubmitError::MbtiIncomplete);
    }
    Ok(())
}

// ===== Executor =====

pub struct SubmissionExecutor<'a> {
    api: &'a dyn JobBoardApi,
    session: PersistedSession<'a>,
}

impl<'a> SubmissionExecutor<'a> {
    pub fn new(api: &'a dyn JobBoardApi, session: PersistedSession<'a>) -> Self {
        Self { api, session }
    }

    /// One network call, never retried. Success erases the draft and any
    /// resume signal; failures keep the draft so the user can retry.
    pub async fn execute(
        &self,
        token: &str,
        draft: &mut ApplicationDraft,
        resume: UploadedFile,
        mbti: &MbtiStatus,
    ) -> Result<SubmissionReceipt, SubmitError> {
        let personality_type = mbti
            .personality_type
            .clone()
            .ok_or(SubmitError::MbtiIncomplete)?;

        let payload = ApplicationPayload {
            job_id: draft.job_id.clone(),
            name: draft.applicant_name.trim().to_string(),
            email: draft.applicant_email.trim().to_string(),
            phone: draft.applicant_phone.trim().to_string(),
            cover_letter: draft.cover_letter_text.trim().to_string(),
            resume,
            mbti_result: personality_type.clone(),
            mbti_scores: mbti.dimension_scores.unwrap_or_default(),
        };

        let drafts = DraftStore::new(self.session);

        match self.api.submit_application(token, &payload).await {
            Ok(()) => {
                info!("Application submitted for job {}", draft.job_id);

                // The backend accepted it: cleanup failures must not turn this into an error
                if let Err(e) = drafts.erase(&draft.job_id).await {
                    error!("Failed to erase submitted draft for job {}: {}", draft.job_id, e);
                }
                if let Err(e) = self.session.clear_resume_signals().await {
                    error!("Failed to clear resume signals: {}", e);
                }

                Ok(SubmissionReceipt {
                    job_id: draft.job_id.clone(),
                    job_title: draft.job_title.clone(),
                    personality_type,
                })
            }
            Err(e) => {
                let failure = classify(e, &draft.job_id);
                warn!(
                    "Application for job {} failed ({}): {}",
                    draft.job_id,
                    failure.error_code(),
                    failure
                );

                match &failure {
                    SubmitError::JobNotFound => {
                        drafts.erase(&draft.job_id).await.map_err(SubmitError::storage)?;
                    }
                    SubmitError::MbtiRequired { .. } => {
                        drafts
                            .save_step(draft, Step::Documents)
                            .await
                            .map_err(SubmitError::storage)?;
                        self.session
                            .mark_return_to_application()
                            .await
                            .map_err(SubmitError::storage)?;
                    }
                    _ => {
                        // Edits may have landed while the request ran; only
                        // restore the draft when nothing is stored
                        let stored = drafts.load(&draft.job_id).await.map_err(SubmitError::storage)?;
                        if stored.is_none() {
                            drafts.save(draft).await.map_err(SubmitError::storage)?;
                        }
                    }
                }

                Err(failure)
            }
        }
    }
}

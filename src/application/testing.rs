// src/application/testing.rs
//! Scripted in-memory backend for engine and route tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

use super::draft::ApplicationDraft;
use super::sequencer::Step;
use crate::core::{ApiError, JobBoardApi};
use crate::types::{
    AnswerOption, AnswerProgress, AnswerSubmission, ApplicationPayload, Credentials, JobSnapshot,
    LoginResponse, MbtiStatus, TestQuestion, TestSession, UploadedFile, UserProfile,
};

pub const TEST_JOB_ID: &str = "job-1";

pub fn sample_job(job_id: &str) -> JobSnapshot {
    JobSnapshot {
        id: job_id.to_string(),
        title: "Backend Engineer".to_string(),
        company: Some("Acme".to_string()),
        location: "Remote".to_string(),
        department: Some("Engineering".to_string()),
        description: "Build things".to_string(),
        salary: None,
        deadline: None,
        posted_date: None,
    }
}

pub fn sample_user() -> UserProfile {
    UserProfile {
        id: "u1".to_string(),
        name: Some("Jane Doe".to_string()),
        email: "jane@x.com".to_string(),
        role: Some("candidate".to_string()),
    }
}

/// A draft that passes every validator and sits on the review step
pub fn complete_draft(job_id: &str) -> ApplicationDraft {
    let mut draft = ApplicationDraft::for_job(&sample_job(job_id));
    draft.applicant_name = "Jane Doe".to_string();
    draft.applicant_email = "jane@x.com".to_string();
    draft.applicant_phone = "12345678".to_string();
    draft.cover_letter_text = "I would love to join the team.".to_string();
    draft.has_resume_attached = true;
    draft.current_step = Step::Review;
    draft
}

pub fn sample_questions() -> Vec<TestQuestion> {
    vec![
        TestQuestion {
            id: "q1".to_string(),
            text: "At a party you...".to_string(),
            options: vec![
                AnswerOption {
                    text: "Talk to many people".to_string(),
                    dimension: "EI".to_string(),
                    value: 1.0,
                },
                AnswerOption {
                    text: "Talk to a few friends".to_string(),
                    dimension: "EI".to_string(),
                    value: -1.0,
                },
            ],
        },
        TestQuestion {
            id: "q2".to_string(),
            text: "You prefer...".to_string(),
            options: vec![AnswerOption {
                text: "Facts".to_string(),
                dimension: "SN".to_string(),
                value: 1.0,
            }],
        },
    ]
}

pub struct ScriptedApi {
    job: Mutex<Option<JobSnapshot>>,
    has_applied: AtomicBool,
    mbti: Mutex<Result<MbtiStatus, ApiError>>,
    submit_result: Mutex<Result<(), ApiError>>,
    answers: Mutex<VecDeque<AnswerProgress>>,
    login_result: Mutex<Result<LoginResponse, ApiError>>,
    last_payload: Mutex<Option<ApplicationPayload>>,
    last_answer: Mutex<Option<AnswerSubmission>>,
    hold_submissions: AtomicBool,
    release: Notify,
    submit_calls: AtomicUsize,
    mbti_calls: AtomicUsize,
    check_calls: AtomicUsize,
    start_calls: AtomicUsize,
    logout_calls: AtomicUsize,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self {
            job: Mutex::new(Some(sample_job(TEST_JOB_ID))),
            has_applied: AtomicBool::new(false),
            mbti: Mutex::new(Ok(MbtiStatus::not_started())),
            submit_result: Mutex::new(Ok(())),
            answers: Mutex::new(VecDeque::new()),
            login_result: Mutex::new(Ok(LoginResponse {
                token: "opaque-test-token".to_string(),
                user: sample_user(),
            })),
            last_payload: Mutex::new(None),
            last_answer: Mutex::new(None),
            hold_submissions: AtomicBool::new(false),
            release: Notify::new(),
            submit_calls: AtomicUsize::new(0),
            mbti_calls: AtomicUsize::new(0),
            check_calls: AtomicUsize::new(0),
            start_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_job(&self, job: Option<JobSnapshot>) {
        *self.job.lock().unwrap() = job;
    }

    pub fn set_has_applied(&self, has_applied: bool) {
        self.has_applied.store(has_applied, Ordering::SeqCst);
    }

    pub fn set_mbti(&self, status: Result<MbtiStatus, ApiError>) {
        *self.mbti.lock().unwrap() = status;
    }

    pub fn set_submit_result(&self, result: Result<(), ApiError>) {
        *self.submit_result.lock().unwrap() = result;
    }

    pub fn set_login_result(&self, result: Result<LoginResponse, ApiError>) {
        *self.login_result.lock().unwrap() = result;
    }

    pub fn push_answer(&self, progress: AnswerProgress) {
        self.answers.lock().unwrap().push_back(progress);
    }

    /// Park every submission until `release_submissions`
    pub fn hold_submissions(&self) {
        self.hold_submissions.store(true, Ordering::SeqCst);
    }

    pub fn release_submissions(&self) {
        self.hold_submissions.store(false, Ordering::SeqCst);
        self.release.notify_one();
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn mbti_calls(&self) -> usize {
        self.mbti_calls.load(Ordering::SeqCst)
    }

    pub fn check_calls(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    pub fn last_payload(&self) -> Option<ApplicationPayload> {
        self.last_payload.lock().unwrap().clone()
    }

    pub fn last_answer(&self) -> Option<AnswerSubmission> {
        self.last_answer.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobBoardApi for ScriptedApi {
    async fn fetch_job(&self, job_id: &str) -> Result<JobSnapshot, ApiError> {
        match self.job.lock().unwrap().clone() {
            Some(job) if job.id == job_id => Ok(job),
            _ => Err(ApiError::Status {
                status: 404,
                message: Some("Job not found".to_string()),
            }),
        }
    }

    async fn check_application(&self, _token: &str, _job_id: &str) -> Result<bool, ApiError> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.has_applied.load(Ordering::SeqCst))
    }

    async fn mbti_status(&self, _token: &str) -> Result<MbtiStatus, ApiError> {
        self.mbti_calls.fetch_add(1, Ordering::SeqCst);
        self.mbti.lock().unwrap().clone()
    }

    async fn start_test(&self, _token: &str) -> Result<TestSession, ApiError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        Ok(TestSession {
            session_id: "test-session".to_string(),
        })
    }

    async fn test_questions(&self, _token: &str) -> Result<Vec<TestQuestion>, ApiError> {
        Ok(sample_questions())
    }

    async fn submit_answer(
        &self,
        _token: &str,
        answer: &AnswerSubmission,
    ) -> Result<AnswerProgress, ApiError> {
        *self.last_answer.lock().unwrap() = Some(answer.clone());
        Ok(self
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(AnswerProgress {
                progress: 50.0,
                status: MbtiStatus::in_progress(),
            }))
    }

    async fn submit_application(
        &self,
        _token: &str,
        payload: &ApplicationPayload,
    ) -> Result<(), ApiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_payload.lock().unwrap() = Some(payload.clone());

        if self.hold_submissions.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        self.submit_result.lock().unwrap().clone()
    }

    async fn login(&self, _credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        self.login_result.lock().unwrap().clone()
    }

    async fn face_login(&self, _image: &UploadedFile) -> Result<LoginResponse, ApiError> {
        self.login_result.lock().unwrap().clone()
    }

    async fn logout(&self, _token: &str) -> Result<(), ApiError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// src/mbti/mod.rs
//! MBTI test runner: starts or resumes the test, records answers and, on
//! completion, hands control back to the application flow that sent the
//! visitor here.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::application::Step;
use crate::core::{ApiError, JobBoardApi, PersistedSession};
use crate::types::{AnswerSubmission, MbtiStatus, TestQuestion};
use crate::utils::{is_valid_job_id, mbti_return_path};

#[derive(Debug, Error)]
pub enum MbtiError {
    #[error(transparent)]
    Backend(#[from] ApiError),
    #[error("Unknown question: {0}")]
    UnknownQuestion(String),
    #[error("Question {question_id} has no option {index}")]
    InvalidOption { question_id: String, index: usize },
    #[error("Invalid job id: {0}")]
    InvalidJobId(String),
    #[error("Could not save test progress: {0}")]
    Storage(String),
}

impl MbtiError {
    pub fn error_code(&self) -> &'static str {
        match self {
            MbtiError::Backend(_) => "MBTI_BACKEND_ERROR",
            MbtiError::UnknownQuestion(_) => "UNKNOWN_QUESTION",
            MbtiError::InvalidOption { .. } => "INVALID_OPTION",
            MbtiError::InvalidJobId(_) => "INVALID_JOB_ID",
            MbtiError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

/// What the test page shows when opened
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TestView {
    #[serde(rename_all = "camelCase")]
    Ready {
        session_id: String,
        questions: Vec<TestQuestion>,
        #[serde(skip_serializing_if = "Option::is_none")]
        job_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Completed {
        result: MbtiStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        return_to: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub session_id: String,
    pub question_id: String,
    pub option_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnswerOutcome {
    InProgress {
        progress: f64,
    },
    #[serde(rename_all = "camelCase")]
    Completed {
        result: MbtiStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        return_to: Option<String>,
    },
}

pub struct MbtiTestRunner<'a> {
    api: &'a dyn JobBoardApi,
    session: PersistedSession<'a>,
    token: &'a str,
}

impl<'a> MbtiTestRunner<'a> {
    pub fn new(api: &'a dyn JobBoardApi, session: PersistedSession<'a>, token: &'a str) -> Self {
        Self {
            api,
            session,
            token,
        }
    }

    fn checked_job_id(job_id: Option<&str>) -> Result<Option<&str>, MbtiError> {
        match job_id {
            Some(id) if !is_valid_job_id(id) => Err(MbtiError::InvalidJobId(id.to_string())),
            other => Ok(other),
        }
    }

    /// Open the test; a visitor who already finished it goes straight back
    pub async fn begin(&self, job_id: Option<&str>) -> Result<TestView, MbtiError> {
        let job_id = Self::checked_job_id(job_id)?;
        let status = self.api.mbti_status(self.token).await?;

        if status.is_completed() {
            let return_to = self.hand_back(job_id).await?;
            return Ok(TestView::Completed {
                result: status,
                return_to,
            });
        }

        let test = self.api.start_test(self.token).await?;
        let questions = self.api.test_questions(self.token).await?;
        debug!(
            "Started MBTI session {} with {} questions",
            test.session_id,
            questions.len()
        );

        Ok(TestView::Ready {
            session_id: test.session_id,
            questions,
            job_id: job_id.map(str::to_string),
        })
    }

    pub async fn answer(
        &self,
        job_id: Option<&str>,
        request: &AnswerRequest,
    ) -> Result<AnswerOutcome, MbtiError> {
        let job_id = Self::checked_job_id(job_id)?;

        let questions = self.api.test_questions(self.token).await?;
        let question = questions
            .iter()
            .find(|q| q.id == request.question_id)
            .ok_or_else(|| MbtiError::UnknownQuestion(request.question_id.clone()))?;
        let option = question
            .options
            .get(request.option_index)
            .ok_or_else(|| MbtiError::InvalidOption {
                question_id: request.question_id.clone(),
                index: request.option_index,
            })?;

        let submission = AnswerSubmission {
            session_id: request.session_id.clone(),
            question_id: question.id.clone(),
            dimension: option.dimension.clone(),
            value: option.value,
        };
        let progress = self.api.submit_answer(self.token, &submission).await?;

        if progress.status.is_completed() {
            info!(
                "MBTI test completed: {}",
                progress.status.personality_type.as_deref().unwrap_or("?")
            );
            let return_to = self.hand_back(job_id).await?;
            Ok(AnswerOutcome::Completed {
                result: progress.status,
                return_to,
            })
        } else {
            Ok(AnswerOutcome::InProgress {
                progress: progress.progress,
            })
        }
    }

    /// Leave the resume signals the application flow reconciles on its next mount
    async fn hand_back(&self, job_id: Option<&str>) -> Result<Option<String>, MbtiError> {
        let Some(job_id) = job_id else {
            return Ok(None);
        };

        let storage = |e: anyhow::Error| MbtiError::Storage(format!("{:#}", e));
        let was_waiting = self
            .session
            .take_return_to_application()
            .await
            .map_err(storage)?;
        self.session
            .set_resume_step(Step::Documents)
            .await
            .map_err(storage)?;
        self.session.set_auto_open().await.map_err(storage)?;

        debug!(
            "Handing back to application for job {} (flow waiting: {})",
            job_id, was_waiting
        );
        Ok(Some(mbti_return_path(job_id, Step::Documents.number())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::ScriptedApi;
    use crate::core::MemoryKeyValueStore;
    use crate::types::{AnswerProgress, DimensionScores};

    #[tokio::test]
    async fn test_begin_starts_a_session() {
        let api = ScriptedApi::new();
        let store = MemoryKeyValueStore::new();
        let runner = MbtiTestRunner::new(&api, PersistedSession::new(&store, "s1"), "tok");

        match runner.begin(Some("job-1")).await.unwrap() {
            TestView::Ready {
                session_id,
                questions,
                job_id,
            } => {
                assert_eq!(session_id, "test-session");
                assert_eq!(questions.len(), 2);
                assert_eq!(job_id.as_deref(), Some("job-1"));
            }
            other => panic!("unexpected view: {:?}", other),
        }
        assert_eq!(api.start_calls(), 1);
    }

    #[tokio::test]
    async fn test_begin_when_already_completed_returns_to_job() {
        let api = ScriptedApi::new();
        api.set_mbti(Ok(MbtiStatus::completed("ISTJ", DimensionScores::default())));
        let store = MemoryKeyValueStore::new();
        let session = PersistedSession::new(&store, "s1");
        let runner = MbtiTestRunner::new(&api, session, "tok");

        match runner.begin(Some("job-1")).await.unwrap() {
            TestView::Completed { return_to, .. } => {
                assert_eq!(
                    return_to.as_deref(),
                    Some("/jobs/job-1?mbtiCompleted=true&step=2")
                );
            }
            other => panic!("unexpected view: {:?}", other),
        }
        assert_eq!(api.start_calls(), 0);
        assert!(session.take_auto_open().await.unwrap());
    }

    #[tokio::test]
    async fn test_answer_maps_option_to_dimension() {
        let api = ScriptedApi::new();
        let store = MemoryKeyValueStore::new();
        let runner = MbtiTestRunner::new(&api, PersistedSession::new(&store, "s1"), "tok");

        let request = AnswerRequest {
            session_id: "test-session".to_string(),
            question_id: "q1".to_string(),
            option_index: 1,
        };
        let outcome = runner.answer(None, &request).await.unwrap();
        assert_eq!(outcome, AnswerOutcome::InProgress { progress: 50.0 });

        let sent = api.last_answer().unwrap();
        assert_eq!(sent.dimension, "EI");
        assert_eq!(sent.value, -1.0);
    }

    #[tokio::test]
    async fn test_final_answer_leaves_resume_signals() {
        let api = ScriptedApi::new();
        api.push_answer(AnswerProgress {
            progress: 100.0,
            status: MbtiStatus::completed("ESTJ", DimensionScores::default()),
        });
        let store = MemoryKeyValueStore::new();
        let session = PersistedSession::new(&store, "s1");
        session.mark_return_to_application().await.unwrap();
        let runner = MbtiTestRunner::new(&api, session, "tok");

        let request = AnswerRequest {
            session_id: "test-session".to_string(),
            question_id: "q2".to_string(),
            option_index: 0,
        };
        match runner.answer(Some("job-1"), &request).await.unwrap() {
            AnswerOutcome::Completed { result, return_to } => {
                assert_eq!(result.personality_type.as_deref(), Some("ESTJ"));
                assert_eq!(
                    return_to.as_deref(),
                    Some("/jobs/job-1?mbtiCompleted=true&step=2")
                );
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        assert!(!session.take_return_to_application().await.unwrap());
        assert_eq!(session.take_resume_step().await.unwrap(), Some(Step::Documents));
        assert!(session.take_auto_open().await.unwrap());
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let api = ScriptedApi::new();
        let store = MemoryKeyValueStore::new();
        let runner = MbtiTestRunner::new(&api, PersistedSession::new(&store, "s1"), "tok");

        let mut request = AnswerRequest {
            session_id: "test-session".to_string(),
            question_id: "q9".to_string(),
            option_index: 0,
        };
        assert!(matches!(
            runner.answer(None, &request).await,
            Err(MbtiError::UnknownQuestion(_))
        ));

        request.question_id = "q2".to_string();
        request.option_index = 3;
        assert!(matches!(
            runner.answer(None, &request).await,
            Err(MbtiError::InvalidOption { index: 3, .. })
        ));

        assert!(matches!(
            runner.begin(Some("../admin")).await,
            Err(MbtiError::InvalidJobId(_))
        ));
    }
}

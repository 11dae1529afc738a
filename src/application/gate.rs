// src/application/gate.rs
//! MBTI precondition gate: decides whether the documents step may be left and
//! arranges the detour to the test when it may not.

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use super::draft::{ApplicationDraft, DraftStore};
use super::sequencer::Step;
use crate::core::{JobBoardApi, PersistedSession};
use crate::types::MbtiStatus;
use crate::utils::{is_valid_job_id, mbti_test_path};

/// Where a suspended flow went and where it will pick up again
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suspension {
    pub job_id: String,
    pub resume_step: Step,
    pub navigate_to: String,
}

#[derive(Clone, Copy)]
pub struct MbtiGate<'a> {
    api: &'a dyn JobBoardApi,
    token: Option<&'a str>,
}

impl<'a> MbtiGate<'a> {
    pub fn new(api: &'a dyn JobBoardApi, token: Option<&'a str>) -> Self {
        Self { api, token }
    }

    /// Never fails: any failure to learn the status becomes `MbtiState::Error`,
    /// which is distinct from `NotStarted`.
    pub async fn check_status(&self) -> MbtiStatus {
        let Some(token) = self.token else {
            return MbtiStatus::error("Login required to check the MBTI test status");
        };

        match self.api.mbti_status(token).await {
            Ok(status) => status,
            Err(e) => {
                warn!("Failed to fetch MBTI status: {}", e);
                MbtiStatus::error(e.to_string())
            }
        }
    }

    /// Persist the draft parked before the gate, leave the "return to
    /// application" flag and name the test entry point to navigate to.
    pub async fn suspend(
        &self,
        session: PersistedSession<'_>,
        draft: &mut ApplicationDraft,
    ) -> Result<Suspension> {
        anyhow::ensure!(is_valid_job_id(&draft.job_id), "Invalid job id: {}", draft.job_id);

        DraftStore::new(session).save_step(draft, Step::Documents).await?;
        session.mark_return_to_application().await?;

        info!(
            "Suspending application for job {} until the MBTI test is completed",
            draft.job_id
        );

        Ok(Suspension {
            job_id: draft.job_id.clone(),
            resume_step: Step::Documents,
            navigate_to: mbti_test_path(&draft.job_id),
        })
    }
}

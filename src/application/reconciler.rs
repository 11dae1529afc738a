// src/application/reconciler.rs
//! Rebuilds the flow on (re)mount from the persisted session and URL signals.
//! Every signal is consumed at most once.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use super::draft::{ApplicationDraft, DraftStore};
use super::flow::Notice;
use super::gate::MbtiGate;
use super::sequencer::Step;
use crate::core::PersistedSession;
use crate::types::MbtiStatus;
use crate::utils::parse_flag;

/// Query parameters appended by the MBTI test on its way back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UrlSignals {
    pub mbti_completed: bool,
    pub step: Option<Step>,
}

impl UrlSignals {
    pub fn from_query(mbti_completed: Option<&str>, step: Option<&str>) -> Self {
        Self {
            mbti_completed: parse_flag(mbti_completed),
            step: step
                .and_then(|s| s.trim().parse::<u8>().ok())
                .and_then(Step::from_number),
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.mbti_completed && self.step.is_none()
    }
}

/// The cross-navigation instruction found on this mount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeSignal {
    pub target_step: Option<Step>,
    pub auto_open: bool,
    pub from_external_task: bool,
}

#[derive(Debug, Clone)]
pub struct Reconciled {
    pub step: Step,
    pub draft: Option<ApplicationDraft>,
    pub signal: Option<ResumeSignal>,
    pub mbti: MbtiStatus,
    /// The flow picked up again after a completed detour
    pub resumed: bool,
    pub notices: Vec<Notice>,
    /// The visible URL still carries signals and should be replaced
    pub strip_query: bool,
}

pub struct ResumeReconciler<'a> {
    session: PersistedSession<'a>,
    gate: MbtiGate<'a>,
}

impl<'a> ResumeReconciler<'a> {
    pub fn new(session: PersistedSession<'a>, gate: MbtiGate<'a>) -> Self {
        Self { session, gate }
    }

    pub async fn reconcile(&self, job_id: &str, signals: UrlSignals) -> Result<Reconciled> {
        // Durable signals are erased as they are read, whatever happens next
        let override_step = self.session.take_resume_step().await?;
        let auto_open = self.session.take_auto_open().await?;
        let left_mid_detour = self.session.take_return_to_application().await?;

        let drafts = DraftStore::new(self.session);
        let mut draft = drafts.load(job_id).await?;

        let from_external_task = signals.mbti_completed;
        let completion_marker = from_external_task || auto_open;

        // The URL step only counts alongside the completion marker, and never
        // over a durable override
        let url_step = signals.step.filter(|_| from_external_task);
        let target_step = override_step.or(url_step);

        let signal = (target_step.is_some() || auto_open || !signals.is_empty()).then_some(
            ResumeSignal {
                target_step,
                auto_open,
                from_external_task,
            },
        );

        let mbti = self.gate.check_status().await;

        let mut step = target_step
            .or(draft.as_ref().map(|d| d.current_step))
            .unwrap_or(Step::FIRST);
        let mut resumed = false;
        let mut notices = Vec::new();

        if completion_marker {
            if mbti.is_completed() {
                // Back before the gate: the user clicks "Next" again
                step = override_step.unwrap_or(Step::Documents);
                resumed = true;
                notices.push(Notice::success(
                    "MBTI test completed! You can now continue your application.",
                ));
                info!("Resuming application for job {} at step {}", job_id, step);
            } else {
                notices.push(Notice::info(
                    "The MBTI test is not completed yet. Your application draft has been saved.",
                ));
                debug!("Completion marker for job {} without a completed test", job_id);
            }
        } else if left_mid_detour && draft.is_some() {
            notices.push(Notice::info(
                "Your application draft was saved. Complete the MBTI test to continue.",
            ));
        }

        // Later mounts without a new signal land on the same step
        match draft.as_mut() {
            Some(draft) if draft.current_step != step => {
                draft.current_step = step;
                drafts.save(draft).await?;
            }
            Some(_) => {}
            None if resumed => {
                // Resuming without a stored draft: the next edit must find
                // one at the resumed step rather than start over at step 1
                let mut fresh = ApplicationDraft::empty(job_id);
                fresh.current_step = step;
                drafts.save(&mut fresh).await?;
                draft = Some(fresh);
            }
            // Nothing to resume into
            None => step = Step::FIRST,
        }

        Ok(Reconciled {
            step,
            draft,
            signal,
            mbti,
            resumed,
            notices,
            strip_query: !signals.is_empty(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::flow::NoticeLevel;
    use crate::application::testing::ScriptedApi;
    use crate::core::MemoryKeyValueStore;
    use crate::types::{DimensionScores, MbtiState};

    async fn seed_draft(session: PersistedSession<'_>, job_id: &str, step: Step) {
        let mut draft = ApplicationDraft::empty(job_id);
        draft.applicant_name = "Jane Doe".to_string();
        draft.current_step = step;
        DraftStore::new(session).save(&mut draft).await.unwrap();
    }

    #[test]
    fn test_url_signals_from_query() {
        let signals = UrlSignals::from_query(Some("true"), Some("2"));
        assert!(signals.mbti_completed);
        assert_eq!(signals.step, Some(Step::Documents));

        let signals = UrlSignals::from_query(None, Some("7"));
        assert!(signals.is_empty());
    }

    #[tokio::test]
    async fn test_override_is_applied_once() {
        let api = ScriptedApi::new();
        let store = MemoryKeyValueStore::new();
        let session = PersistedSession::new(&store, "s1");
        seed_draft(session, "job-1", Step::PersonalInfo).await;
        session.set_resume_step(Step::Documents).await.unwrap();

        let reconciler = ResumeReconciler::new(session, MbtiGate::new(&api, Some("tok")));
        let first = reconciler.reconcile("job-1", UrlSignals::default()).await.unwrap();
        assert_eq!(first.step, Step::Documents);
        assert_eq!(first.signal.and_then(|s| s.target_step), Some(Step::Documents));

        // The user goes back a step; the consumed override must not replay
        let mut draft = first.draft.unwrap();
        draft.current_step = Step::PersonalInfo;
        DraftStore::new(session).save(&mut draft).await.unwrap();

        let second = reconciler.reconcile("job-1", UrlSignals::default()).await.unwrap();
        assert_eq!(second.step, Step::PersonalInfo);
        assert!(second.signal.is_none());
    }

    #[tokio::test]
    async fn test_completed_detour_resumes_at_documents() {
        let api = ScriptedApi::new();
        api.set_mbti(Ok(MbtiStatus::completed("INTJ", DimensionScores::default())));
        let store = MemoryKeyValueStore::new();
        let session = PersistedSession::new(&store, "s1");
        seed_draft(session, "job-1", Step::Documents).await;
        session.set_auto_open().await.unwrap();

        let reconciler = ResumeReconciler::new(session, MbtiGate::new(&api, Some("tok")));
        let signals = UrlSignals::from_query(Some("true"), Some("3"));
        let reconciled = reconciler.reconcile("job-1", signals).await.unwrap();

        assert!(reconciled.resumed);
        assert_eq!(reconciled.step, Step::Documents);
        assert!(reconciled.strip_query);
        assert_eq!(reconciled.notices[0].level, NoticeLevel::Success);
        assert_eq!(api.mbti_calls(), 1);
        assert!(!session.take_auto_open().await.unwrap());
    }

    #[tokio::test]
    async fn test_incomplete_detour_keeps_draft_without_resuming() {
        let api = ScriptedApi::new();
        api.set_mbti(Ok(MbtiStatus::in_progress()));
        let store = MemoryKeyValueStore::new();
        let session = PersistedSession::new(&store, "s1");
        seed_draft(session, "job-1", Step::Documents).await;

        let reconciler = ResumeReconciler::new(session, MbtiGate::new(&api, Some("tok")));
        let reconciled = reconciler
            .reconcile("job-1", UrlSignals::from_query(Some("1"), None))
            .await
            .unwrap();

        assert!(!reconciled.resumed);
        assert_eq!(reconciled.mbti.state, MbtiState::InProgress);
        assert_eq!(reconciled.step, Step::Documents);
        assert_eq!(reconciled.notices[0].level, NoticeLevel::Info);
        assert!(DraftStore::new(session).load("job-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_url_step_without_marker_is_ignored() {
        let api = ScriptedApi::new();
        let store = MemoryKeyValueStore::new();
        let session = PersistedSession::new(&store, "s1");
        seed_draft(session, "job-1", Step::PersonalInfo).await;

        let reconciler = ResumeReconciler::new(session, MbtiGate::new(&api, Some("tok")));
        let reconciled = reconciler
            .reconcile("job-1", UrlSignals::from_query(None, Some("3")))
            .await
            .unwrap();

        assert_eq!(reconciled.step, Step::PersonalInfo);
        assert!(reconciled.strip_query);
    }

    #[tokio::test]
    async fn test_other_jobs_draft_is_not_applied() {
        let api = ScriptedApi::new();
        let store = MemoryKeyValueStore::new();
        let session = PersistedSession::new(&store, "s1");
        seed_draft(session, "job-a", Step::Review).await;

        let reconciler = ResumeReconciler::new(session, MbtiGate::new(&api, Some("tok")));
        let reconciled = reconciler.reconcile("job-b", UrlSignals::default()).await.unwrap();

        assert!(reconciled.draft.is_none());
        assert_eq!(reconciled.step, Step::PersonalInfo);
    }

    #[tokio::test]
    async fn test_completed_detour_without_draft_persists_resumed_step() {
        let api = ScriptedApi::new();
        api.set_mbti(Ok(MbtiStatus::completed("ISFP", DimensionScores::default())));
        let store = MemoryKeyValueStore::new();
        let session = PersistedSession::new(&store, "s1");
        session.set_resume_step(Step::Documents).await.unwrap();
        session.set_auto_open().await.unwrap();

        let reconciler = ResumeReconciler::new(session, MbtiGate::new(&api, Some("tok")));
        let reconciled = reconciler
            .reconcile("job-1", UrlSignals::from_query(Some("true"), Some("2")))
            .await
            .unwrap();

        assert!(reconciled.resumed);
        assert_eq!(reconciled.step, Step::Documents);
        assert_eq!(reconciled.draft.map(|d| d.current_step), Some(Step::Documents));

        let stored = DraftStore::new(session).load("job-1").await.unwrap().unwrap();
        assert_eq!(stored.current_step, Step::Documents);
    }

    #[tokio::test]
    async fn test_incomplete_detour_without_draft_stores_nothing() {
        let api = ScriptedApi::new();
        let store = MemoryKeyValueStore::new();
        let session = PersistedSession::new(&store, "s1");

        let reconciler = ResumeReconciler::new(session, MbtiGate::new(&api, Some("tok")));
        let reconciled = reconciler
            .reconcile("job-1", UrlSignals::from_query(Some("true"), Some("2")))
            .await
            .unwrap();

        assert!(!reconciled.resumed);
        assert_eq!(reconciled.step, Step::PersonalInfo);
        assert!(reconciled.draft.is_none());
        assert_eq!(DraftStore::new(session).load("job-1").await.unwrap(), None);
    }
}

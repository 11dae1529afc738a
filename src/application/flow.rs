// src/application/flow.rs
//! The application flow engine. One instance per request; every request
//! against the job page is a "mount" or an action on the mounted flow.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::attachments::ResumeVault;
use super::draft::{ApplicationDraft, DraftStore, FieldEdit};
use super::gate::MbtiGate;
use super::reconciler::{ResumeReconciler, UrlSignals};
use super::sequencer::{Step, StepSequencer, Transition};
use super::submission::{
    preflight, FlowAction, InFlightRegistry, SubmissionExecutor, SubmitError,
};
use super::validation::{validate_field, Field, FieldValidationErrors};
use crate::core::{JobBoardApi, PersistedSession};
use crate::types::{JobSnapshot, MbtiStatus, SubmissionReceipt, UploadedFile};
use crate::utils::{is_valid_job_id, job_page_path, APPLICATIONS_PATH};

// ===== View Model =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// Transient message shown above the application form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlowState {
    LoginRequired,
    Editing,
    #[serde(rename_all = "camelCase")]
    Suspended { resume_step: Step, job_id: String },
    #[serde(rename_all = "camelCase")]
    AlreadyApplied { applications_url: String },
    Submitted { receipt: SubmissionReceipt },
    JobUnavailable,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowView {
    pub job_id: String,
    pub state: FlowState,
    pub step: Step,
    /// Whether the application form should be shown expanded
    pub open: bool,
    pub draft: Option<ApplicationDraft>,
    pub errors: FieldValidationErrors,
    pub resume_attached: bool,
    pub resume_reattach_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mbti: Option<MbtiStatus>,
    pub notices: Vec<Notice>,
    /// Replace the visible URL with this one, without reloading
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace_url: Option<String>,
}

impl FlowView {
    fn new(job_id: &str, state: FlowState) -> Self {
        Self {
            job_id: job_id.to_string(),
            state,
            step: Step::FIRST,
            open: false,
            draft: None,
            errors: FieldValidationErrors::default(),
            resume_attached: false,
            resume_reattach_required: false,
            mbti: None,
            notices: Vec::new(),
            replace_url: None,
        }
    }
}

/// Result of mounting the job page
#[derive(Debug, Clone, Serialize)]
pub struct Mounted {
    pub job: Option<JobSnapshot>,
    pub flow: FlowView,
}

#[derive(Debug, Clone)]
pub enum AdvanceOutcome {
    Moved(FlowView),
    Blocked(FlowView),
    /// The MBTI gate refused: navigate to `navigate_to`
    Suspended { navigate_to: String, view: FlowView },
    /// Nothing moved (final step, or the gate status is unknown)
    Unchanged(FlowView),
    /// Another advance for the same flow is still running
    Busy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Submitted(SubmissionReceipt),
    /// A submit for the same flow is already running; this one did nothing
    AlreadyInFlight,
}

// ===== Engine =====

pub struct ApplicationFlow<'a> {
    api: &'a dyn JobBoardApi,
    session: PersistedSession<'a>,
    vault: &'a ResumeVault,
    in_flight: &'a InFlightRegistry,
    job_id: &'a str,
    token: Option<&'a str>,
}

impl<'a> ApplicationFlow<'a> {
    pub fn new(
        api: &'a dyn JobBoardApi,
        session: PersistedSession<'a>,
        vault: &'a ResumeVault,
        in_flight: &'a InFlightRegistry,
        job_id: &'a str,
        token: Option<&'a str>,
    ) -> Self {
        Self {
            api,
            session,
            vault,
            in_flight,
            job_id,
            token,
        }
    }

    fn drafts(&self) -> DraftStore<'a> {
        DraftStore::new(self.session)
    }

    fn gate(&self) -> MbtiGate<'a> {
        MbtiGate::new(self.api, self.token)
    }

    fn resume_attached(&self) -> bool {
        self.vault.contains(self.session.id(), self.job_id)
    }

    /// The job id ends up in redirect targets and storage keys
    fn ensure_job_id(&self) -> Result<()> {
        anyhow::ensure!(is_valid_job_id(self.job_id), "Invalid job id: {}", self.job_id);
        Ok(())
    }

    async fn load_or_start_draft(&self) -> Result<ApplicationDraft> {
        self.ensure_job_id()?;
        if let Some(draft) = self.drafts().load(self.job_id).await? {
            return Ok(draft);
        }

        match self.api.fetch_job(self.job_id).await {
            Ok(job) => Ok(ApplicationDraft::for_job(&job)),
            Err(e) => {
                warn!("Starting draft for job {} without a job snapshot: {}", self.job_id, e);
                Ok(ApplicationDraft::empty(self.job_id))
            }
        }
    }

    fn editing_view(&self, draft: ApplicationDraft) -> FlowView {
        let resume_attached = self.resume_attached();
        let mut view = FlowView::new(self.job_id, FlowState::Editing);
        view.step = draft.current_step;
        view.open = true;
        view.resume_attached = resume_attached;
        view.resume_reattach_required = draft.has_resume_attached && !resume_attached;
        view.draft = Some(draft);
        view
    }

    /// Reconcile persisted state and URL signals into the initial view
    pub async fn mount(&self, signals: UrlSignals) -> Result<Mounted> {
        self.ensure_job_id()?;
        let job = match self.api.fetch_job(self.job_id).await {
            Ok(job) => job,
            Err(e) if e.is_not_found() => {
                info!("Job {} is no longer available", self.job_id);
                let mut view = FlowView::new(self.job_id, FlowState::JobUnavailable);
                view.notices.push(Notice::error("This job is no longer available"));
                return Ok(Mounted { job: None, flow: view });
            }
            Err(e) => return Err(e.into()),
        };

        let Some(token) = self.token else {
            // Signals stay in place until the visitor logs in and mounts again
            let view = FlowView::new(self.job_id, FlowState::LoginRequired);
            return Ok(Mounted {
                job: Some(job),
                flow: view,
            });
        };

        let reconciled = ResumeReconciler::new(self.session, self.gate())
            .reconcile(self.job_id, signals)
            .await?;

        let has_applied = match self.api.check_application(token, self.job_id).await {
            Ok(has_applied) => has_applied,
            Err(e) => {
                warn!("Could not check existing application for job {}: {}", self.job_id, e);
                false
            }
        };

        let mut view = match reconciled.draft {
            Some(draft) => self.editing_view(draft),
            None => FlowView::new(self.job_id, FlowState::Editing),
        };
        view.step = reconciled.step;
        view.open = reconciled.resumed;
        view.mbti = Some(reconciled.mbti);
        view.notices = reconciled.notices;
        if reconciled.strip_query {
            view.replace_url = Some(job_page_path(self.job_id));
        }

        if has_applied {
            self.session.clear_resume_signals().await?;
            view.state = FlowState::AlreadyApplied {
                applications_url: APPLICATIONS_PATH.to_string(),
            };
            view.open = false;
            view.notices = vec![Notice::info("You have already applied for this job")];
            return Ok(Mounted {
                job: Some(job),
                flow: view,
            });
        }

        if view.resume_reattach_required {
            view.notices.push(Notice::warning(
                "Your resume is not kept when you leave the page. Please attach it again.",
            ));
        }

        debug!(
            "Mounted application flow for job {} at step {}",
            self.job_id, view.step
        );
        Ok(Mounted {
            job: Some(job),
            flow: view,
        })
    }

    /// Apply field edits, re-validating only the fields that changed
    pub async fn edit(&self, edit: &FieldEdit) -> Result<FlowView> {
        let mut draft = self.load_or_start_draft().await?;
        let touched = draft.apply(edit);

        let resume_attached = self.resume_attached();
        let mut errors = FieldValidationErrors::default();
        for field in &touched {
            errors.update(*field, validate_field(*field, &draft, resume_attached));
        }

        self.drafts().save(&mut draft).await?;

        let mut view = self.editing_view(draft);
        view.errors = errors;
        Ok(view)
    }

    pub async fn attach_resume(&self, file: UploadedFile) -> Result<FlowView> {
        let mut draft = self.load_or_start_draft().await?;
        let mut errors = FieldValidationErrors::default();

        match self.vault.attach(self.session.id(), self.job_id, file) {
            Ok(()) => {
                draft.has_resume_attached = true;
                self.drafts().save(&mut draft).await?;
            }
            Err(e) => {
                debug!("Rejected resume for job {}: {}", self.job_id, e);
                errors.update(Field::Resume, Some(e.to_string()));
            }
        }

        let mut view = self.editing_view(draft);
        view.errors = errors;
        Ok(view)
    }

    pub async fn detach_resume(&self) -> Result<FlowView> {
        self.vault.discard(self.session.id(), self.job_id);

        let mut draft = self.load_or_start_draft().await?;
        if draft.has_resume_attached {
            draft.has_resume_attached = false;
            self.drafts().save(&mut draft).await?;
        }
        Ok(self.editing_view(draft))
    }

    pub async fn advance(&self) -> Result<AdvanceOutcome> {
        let Some(_guard) = self
            .in_flight
            .try_acquire(self.session.id(), self.job_id, FlowAction::Advance)
        else {
            debug!("Advance for job {} already in flight", self.job_id);
            return Ok(AdvanceOutcome::Busy);
        };

        let mut draft = self.load_or_start_draft().await?;
        let resume_attached = self.resume_attached();
        let mut sequencer = StepSequencer::at(draft.current_step);

        let mbti = if sequencer.at_gate() {
            Some(self.gate().check_status().await)
        } else {
            None
        };

        match sequencer.advance(&draft, resume_attached, mbti.as_ref()) {
            Transition::Advanced(step) => {
                draft.current_step = step;
                self.drafts().save(&mut draft).await?;
                let mut view = self.editing_view(draft);
                view.mbti = mbti;
                Ok(AdvanceOutcome::Moved(view))
            }
            Transition::Blocked(errors) => {
                let mut view = self.editing_view(draft);
                view.errors = errors;
                Ok(AdvanceOutcome::Blocked(view))
            }
            Transition::GateRequired => {
                let suspension = self.gate().suspend(self.session, &mut draft).await?;
                // Leaving the page: the file cannot follow
                self.vault.discard(self.session.id(), self.job_id);

                let mut view = self.editing_view(draft);
                view.state = FlowState::Suspended {
                    resume_step: suspension.resume_step,
                    job_id: suspension.job_id,
                };
                view.mbti = mbti;
                view.notices.push(Notice::info(
                    "Please complete the MBTI test to continue your application.",
                ));
                Ok(AdvanceOutcome::Suspended {
                    navigate_to: suspension.navigate_to,
                    view,
                })
            }
            Transition::GateUnavailable(reason) => {
                let mut view = self.editing_view(draft);
                view.mbti = mbti;
                view.notices.push(Notice::error(format!(
                    "Could not verify your MBTI test status ({}). Please try again.",
                    reason
                )));
                Ok(AdvanceOutcome::Unchanged(view))
            }
            Transition::AtFinalStep => Ok(AdvanceOutcome::Unchanged(self.editing_view(draft))),
        }
    }

    pub async fn retreat(&self) -> Result<FlowView> {
        let mut draft = self.load_or_start_draft().await?;
        let mut sequencer = StepSequencer::at(draft.current_step);
        let step = sequencer.retreat();

        if step != draft.current_step {
            draft.current_step = step;
            self.drafts().save(&mut draft).await?;
        }
        Ok(self.editing_view(draft))
    }

    pub async fn submit(&self) -> Result<SubmitOutcome, SubmitError> {
        let Some(_guard) = self
            .in_flight
            .try_acquire(self.session.id(), self.job_id, FlowAction::Submit)
        else {
            debug!("Submit for job {} already in flight", self.job_id);
            return Ok(SubmitOutcome::AlreadyInFlight);
        };

        let token = self.token.ok_or(SubmitError::Unauthenticated)?;
        let mut draft = self
            .drafts()
            .load(self.job_id)
            .await
            .map_err(SubmitError::storage)?
            .ok_or(SubmitError::NoDraft)?;

        let resume = self.vault.get(self.session.id(), self.job_id);
        let mbti = self.gate().check_status().await;
        preflight(&draft, resume.is_some(), &mbti)?;
        let resume = resume.ok_or(SubmitError::ResumeMissing)?;

        let receipt = SubmissionExecutor::new(self.api, self.session)
            .execute(token, &mut draft, resume, &mbti)
            .await?;

        self.vault.discard(self.session.id(), self.job_id);
        Ok(SubmitOutcome::Submitted(receipt))
    }

    /// Explicit cancellation: forget everything about this application
    pub async fn cancel(&self) -> Result<FlowView> {
        self.drafts().erase(self.job_id).await?;
        self.session.clear_resume_signals().await?;
        self.vault.discard(self.session.id(), self.job_id);

        info!("Application for job {} cancelled", self.job_id);

        let mut view = FlowView::new(self.job_id, FlowState::Editing);
        view.notices.push(Notice::info("Your application has been cancelled"));
        Ok(view)
    }

    /// View after a successful submit
    pub fn submitted_view(&self, receipt: SubmissionReceipt) -> FlowView {
        let mut view = FlowView::new(self.job_id, FlowState::Submitted { receipt });
        view.step = Step::LAST;
        view.notices.push(Notice::success("Your application has been submitted"));
        view
    }
}

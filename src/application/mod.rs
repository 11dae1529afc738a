// src/application/mod.rs
//! Multi-step job application flow: draft store, step sequencer, MBTI gate,
//! resume reconciler and submission executor, composed by `ApplicationFlow`.

pub mod attachments;
pub mod draft;
pub mod flow;
pub mod gate;
pub mod reconciler;
pub mod sequencer;
pub mod submission;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use attachments::{ResumeVault, VaultError, MAX_RESUME_BYTES};
pub use draft::{ApplicationDraft, DraftStore, FieldEdit};
pub use flow::{
    AdvanceOutcome, ApplicationFlow, FlowState, FlowView, Mounted, Notice, NoticeLevel,
    SubmitOutcome,
};
pub use gate::{MbtiGate, Suspension};
pub use reconciler::{Reconciled, ResumeReconciler, ResumeSignal, UrlSignals};
pub use sequencer::{Step, StepSequencer, Transition};
pub use submission::{
    classify, preflight, FlowAction, InFlightRegistry, Recovery, SubmissionExecutor, SubmitError,
};
pub use validation::{Field, FieldValidationErrors};

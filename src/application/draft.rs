// src/application/draft.rs
//! Durable, resumable representation of an in-progress application

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::sequencer::Step;
use super::validation::Field;
use crate::core::{PersistedSession, SessionKey};
use crate::types::JobSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDraft {
    pub job_id: String,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub applicant_name: String,
    #[serde(default)]
    pub applicant_email: String,
    #[serde(default)]
    pub applicant_phone: String,
    #[serde(default)]
    pub cover_letter_text: String,
    #[serde(default)]
    pub current_step: Step,
    /// Only a flag: the file itself never reaches durable storage
    #[serde(default)]
    pub has_resume_attached: bool,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl ApplicationDraft {
    pub fn empty(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            job_title: String::new(),
            company: String::new(),
            location: String::new(),
            applicant_name: String::new(),
            applicant_email: String::new(),
            applicant_phone: String::new(),
            cover_letter_text: String::new(),
            current_step: Step::FIRST,
            has_resume_attached: false,
            updated_at: Utc::now(),
        }
    }

    /// New draft carrying a snapshot of the job as it looked when the user started
    pub fn for_job(job: &JobSnapshot) -> Self {
        Self {
            job_title: job.title.clone(),
            company: job.company_name(),
            location: job.location.clone(),
            ..Self::empty(&job.id)
        }
    }

    /// Apply user edits; returns the fields whose value changed
    pub fn apply(&mut self, edit: &FieldEdit) -> Vec<Field> {
        let mut touched = Vec::new();

        let mut assign = |field: Field, slot: &mut String, value: &Option<String>| {
            if let Some(value) = value {
                if slot != value {
                    *slot = value.clone();
                    touched.push(field);
                }
            }
        };

        assign(Field::Name, &mut self.applicant_name, &edit.name);
        assign(Field::Email, &mut self.applicant_email, &edit.email);
        assign(Field::Phone, &mut self.applicant_phone, &edit.phone);
        assign(Field::CoverLetter, &mut self.cover_letter_text, &edit.cover_letter);

        touched
    }
}

/// Partial update of the user-edited fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldEdit {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub cover_letter: Option<String>,
}

impl FieldEdit {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.cover_letter.is_none()
    }
}

/// Drafts keyed by job id in the visitor's persisted session
#[derive(Clone, Copy)]
pub struct DraftStore<'a> {
    session: PersistedSession<'a>,
}

impl<'a> DraftStore<'a> {
    pub fn new(session: PersistedSession<'a>) -> Self {
        Self { session }
    }

    /// A draft is only returned when it belongs to `job_id`; anything else,
    /// including unreadable data, counts as no draft.
    pub async fn load(&self, job_id: &str) -> Result<Option<ApplicationDraft>> {
        let draft: Option<ApplicationDraft> = self
            .session
            .read(&SessionKey::Draft(job_id.to_string()))
            .await?;

        match draft {
            Some(draft) if draft.job_id == job_id => Ok(Some(draft)),
            Some(draft) => {
                warn!(
                    "Ignoring draft for job {} stored under job {}",
                    draft.job_id, job_id
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub async fn save(&self, draft: &mut ApplicationDraft) -> Result<()> {
        draft.updated_at = Utc::now();
        self.session
            .write(&SessionKey::Draft(draft.job_id.clone()), draft)
            .await?;
        debug!(
            "Saved draft for job {} at step {}",
            draft.job_id, draft.current_step
        );
        Ok(())
    }

    /// Move the stored draft to `step`, keeping edits saved after `draft` was
    /// read. `draft` is refreshed from storage; it is written as-is only when
    /// nothing is stored.
    pub async fn save_step(&self, draft: &mut ApplicationDraft, step: Step) -> Result<()> {
        if let Some(stored) = self.load(&draft.job_id).await? {
            *draft = stored;
        }
        draft.current_step = step;
        self.save(draft).await
    }

    pub async fn erase(&self, job_id: &str) -> Result<()> {
        self.session
            .remove(&SessionKey::Draft(job_id.to_string()))
            .await?;
        debug!("Erased draft for job {}", job_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KeyValueStore, MemoryKeyValueStore};

    fn job(id: &str) -> JobSnapshot {
        JobSnapshot {
            id: id.to_string(),
            title: "Backend Engineer".to_string(),
            company: Some("Acme".to_string()),
            location: "Remote".to_string(),
            department: None,
            description: String::new(),
            salary: None,
            deadline: None,
            posted_date: None,
        }
    }

    #[test]
    fn test_for_job_snapshots_listing() {
        let draft = ApplicationDraft::for_job(&job("j1"));
        assert_eq!(draft.job_id, "j1");
        assert_eq!(draft.company, "Acme");
        assert_eq!(draft.current_step, Step::PersonalInfo);
        assert!(!draft.has_resume_attached);
    }

    #[test]
    fn test_apply_reports_changed_fields_only() {
        let mut draft = ApplicationDraft::empty("j1");
        draft.applicant_name = "Jane".to_string();

        let touched = draft.apply(&FieldEdit {
            name: Some("Jane".to_string()),
            email: Some("jane@x.com".to_string()),
            ..FieldEdit::default()
        });

        assert_eq!(touched, vec![Field::Email]);
        assert_eq!(draft.applicant_email, "jane@x.com");
    }

    #[tokio::test]
    async fn test_save_load_erase() {
        let store = MemoryKeyValueStore::new();
        let drafts = DraftStore::new(PersistedSession::new(&store, "s1"));

        let mut draft = ApplicationDraft::for_job(&job("j1"));
        draft.applicant_name = "Jane Doe".to_string();
        draft.current_step = Step::Documents;
        drafts.save(&mut draft).await.unwrap();

        assert_eq!(drafts.load("j1").await.unwrap(), Some(draft));
        assert_eq!(drafts.load("j2").await.unwrap(), None);

        drafts.erase("j1").await.unwrap();
        assert_eq!(drafts.load("j1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_draft_for_other_job_is_ignored() {
        let store = MemoryKeyValueStore::new();
        let mut foreign = ApplicationDraft::empty("job-a");
        foreign.applicant_name = "Jane Doe".to_string();
        store
            .set("s1", "draft:job-b", &serde_json::to_string(&foreign).unwrap())
            .await
            .unwrap();

        let drafts = DraftStore::new(PersistedSession::new(&store, "s1"));
        assert_eq!(drafts.load("job-b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_draft_is_no_draft() {
        let store = MemoryKeyValueStore::new();
        store.set("s1", "draft:j1", "{\"jobId\": ").await.unwrap();

        let drafts = DraftStore::new(PersistedSession::new(&store, "s1"));
        assert_eq!(drafts.load("j1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_older_drafts_without_optional_fields_still_load() {
        let store = MemoryKeyValueStore::new();
        store
            .set("s1", "draft:j1", r#"{"jobId": "j1", "applicantName": "Jane", "currentStep": 2}"#)
            .await
            .unwrap();

        let drafts = DraftStore::new(PersistedSession::new(&store, "s1"));
        let draft = drafts.load("j1").await.unwrap().unwrap();
        assert_eq!(draft.current_step, Step::Documents);
        assert_eq!(draft.applicant_name, "Jane");
        assert!(draft.cover_letter_text.is_empty());
    }

    #[tokio::test]
    async fn test_save_step_keeps_newer_stored_fields() {
        let store = MemoryKeyValueStore::new();
        let drafts = DraftStore::new(PersistedSession::new(&store, "s1"));

        let mut stale = ApplicationDraft::empty("j1");
        stale.applicant_phone = "12345678".to_string();
        drafts.save(&mut stale).await.unwrap();

        let mut newer = stale.clone();
        newer.applicant_phone = "+33 6 99 99 99 99".to_string();
        drafts.save(&mut newer).await.unwrap();

        drafts.save_step(&mut stale, Step::Documents).await.unwrap();
        assert_eq!(stale.applicant_phone, "+33 6 99 99 99 99");

        let saved = drafts.load("j1").await.unwrap().unwrap();
        assert_eq!(saved.current_step, Step::Documents);
        assert_eq!(saved.applicant_phone, "+33 6 99 99 99 99");

        // Nothing stored: the in-memory copy is written
        let mut fresh = ApplicationDraft::empty("j2");
        drafts.save_step(&mut fresh, Step::Review).await.unwrap();
        assert_eq!(drafts.load("j2").await.unwrap().unwrap().current_step, Step::Review);
    }
}

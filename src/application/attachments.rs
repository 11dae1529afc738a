// src/application/attachments.rs
//! In-process vault for resume files. Files never reach durable storage and
//! are lost whenever the flow navigates away.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::types::UploadedFile;
use crate::utils::{content_type_for_extension, get_file_extension, resume_extension_for};

pub const MAX_RESUME_BYTES: usize = 10 * 1024 * 1024;

pub const DEFAULT_RESUME_TTL_MINUTES: i64 = 120;

#[derive(Debug, Error, PartialEq)]
pub enum VaultError {
    #[error("Unsupported resume format: {0}. Please upload a PDF, DOC or DOCX file")]
    UnsupportedType(String),
    #[error("Resume is too large ({size} bytes, maximum {max} bytes)")]
    TooLarge { size: usize, max: usize },
    #[error("Resume file is empty")]
    Empty,
}

struct HeldResume {
    file: UploadedFile,
    attached_at: DateTime<Utc>,
}

type VaultKey = (String, String);

/// Files held per (session, job). Entries older than the TTL are dropped on
/// the next attach or sweep, so abandoned flows do not pin memory.
pub struct ResumeVault {
    files: Mutex<HashMap<VaultKey, HeldResume>>,
    ttl: Duration,
}

impl Default for ResumeVault {
    fn default() -> Self {
        Self::with_ttl(Duration::minutes(DEFAULT_RESUME_TTL_MINUTES))
    }
}

impl ResumeVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn with_files<T>(&self, f: impl FnOnce(&mut HashMap<VaultKey, HeldResume>) -> T) -> T {
        let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut files)
    }

    fn key(session_id: &str, job_id: &str) -> VaultKey {
        (session_id.to_string(), job_id.to_string())
    }

    /// Accept PDF/DOC/DOCX up to `MAX_RESUME_BYTES`. A generic content type is
    /// resolved from the file extension. Replaces any previous file.
    pub fn attach(&self, session_id: &str, job_id: &str, file: UploadedFile) -> Result<(), VaultError> {
        self.attach_at(session_id, job_id, file, Utc::now())
    }

    fn attach_at(
        &self,
        session_id: &str,
        job_id: &str,
        mut file: UploadedFile,
        now: DateTime<Utc>,
    ) -> Result<(), VaultError> {
        if file.is_empty() {
            return Err(VaultError::Empty);
        }
        if file.len() > MAX_RESUME_BYTES {
            return Err(VaultError::TooLarge {
                size: file.len(),
                max: MAX_RESUME_BYTES,
            });
        }

        if resume_extension_for(&file.content_type).is_err() {
            let resolved = get_file_extension(&file.file_name)
                .and_then(|ext| content_type_for_extension(&ext));
            match resolved {
                Some(content_type) => file.content_type = content_type.to_string(),
                None => return Err(VaultError::UnsupportedType(file.content_type.clone())),
            }
        }

        self.evict_expired(now);

        debug!(
            "Attached resume {} ({} bytes) for job {}",
            file.file_name,
            file.len(),
            job_id
        );
        self.with_files(|files| {
            files.insert(
                Self::key(session_id, job_id),
                HeldResume {
                    file,
                    attached_at: now,
                },
            )
        });
        Ok(())
    }

    /// Drop files attached more than the TTL before `now`; returns how many
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = now.checked_sub_signed(self.ttl) else {
            return 0;
        };
        let evicted = self.with_files(|files| {
            let before = files.len();
            files.retain(|_, held| held.attached_at > cutoff);
            before - files.len()
        });
        if evicted > 0 {
            debug!("Evicted {} idle resume file(s)", evicted);
        }
        evicted
    }

    pub fn get(&self, session_id: &str, job_id: &str) -> Option<UploadedFile> {
        self.with_files(|files| {
            files
                .get(&Self::key(session_id, job_id))
                .map(|held| held.file.clone())
        })
    }

    pub fn contains(&self, session_id: &str, job_id: &str) -> bool {
        self.with_files(|files| files.contains_key(&Self::key(session_id, job_id)))
    }

    /// Returns whether a file was held
    pub fn discard(&self, session_id: &str, job_id: &str) -> bool {
        self.with_files(|files| files.remove(&Self::key(session_id, job_id)).is_some())
    }

    pub fn len(&self) -> usize {
        self.with_files(|files| files.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

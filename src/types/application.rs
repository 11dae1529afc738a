// src/types/application.rs
use serde::{Deserialize, Serialize};

use super::mbti::DimensionScores;

/// A file received from the visitor's browser, held in memory only
#[derive(Clone, PartialEq)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Keeps file contents out of logs
impl std::fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Everything `POST /applications` receives as multipart fields
#[derive(Debug, Clone)]
pub struct ApplicationPayload {
    pub job_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub cover_letter: String,
    pub resume: UploadedFile,
    pub mbti_result: String,
    pub mbti_scores: DimensionScores,
}

/// Summary returned to the browser once the backend accepted an application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub job_id: String,
    pub job_title: String,
    pub personality_type: String,
}

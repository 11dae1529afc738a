// src/web/types.rs
use rocket::form::FromForm;
use rocket::fs::TempFile;
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};

use crate::application::FieldValidationErrors;

// ===== Request Types =====

/// Query of the job page: the signals the MBTI test appends on its way back
#[derive(Debug, Default, FromForm)]
pub struct JobPageQuery {
    #[field(name = "mbtiCompleted")]
    pub mbti_completed: Option<String>,
    pub step: Option<String>,
}

#[derive(Debug, Default, FromForm)]
pub struct MbtiQuery {
    #[field(name = "jobId")]
    pub job_id: Option<String>,
}

#[derive(FromForm)]
pub struct ResumeUploadForm<'f> {
    pub resume: TempFile<'f>,
}

#[derive(FromForm)]
pub struct FaceLoginForm<'f> {
    pub image: TempFile<'f>,
}

// ===== Standard Response Types =====

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct TextResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct DataResponse<T> {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
    pub data: T,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct ActionResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_actions: Option<Vec<String>>,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct StandardErrorResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub error: String,
    pub error_code: String,
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<FieldValidationErrors>,
    /// Where the user can recover, e.g. the MBTI test or the applications list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(crate = "rocket::serde", rename_all = "lowercase")]
pub enum ResponseType {
    Text,
    Data,
    Action,
    Error,
}

/// Error half of every handler result
pub type ErrorReply = status::Custom<Json<StandardErrorResponse>>;

// Helper functions to create standard responses
impl TextResponse {
    pub fn success(message: String) -> Self {
        Self {
            response_type: ResponseType::Text,
            success: true,
            message,
        }
    }
}

impl<T> DataResponse<T> {
    pub fn success(message: String, data: T) -> Self {
        Self {
            response_type: ResponseType::Data,
            success: true,
            message,
            data,
        }
    }
}

impl ActionResponse {
    pub fn success(message: String, action: String) -> Self {
        Self {
            response_type: ResponseType::Action,
            success: true,
            message,
            action,
            next_actions: None,
        }
    }

    pub fn with_next_actions(mut self, next_actions: Vec<String>) -> Self {
        self.next_actions = Some(next_actions);
        self
    }
}

impl StandardErrorResponse {
    pub fn new(error: String, error_code: String, suggestions: Vec<String>) -> Self {
        Self {
            response_type: ResponseType::Error,
            success: false,
            error,
            error_code,
            suggestions,
            field_errors: None,
            link: None,
        }
    }

    pub fn with_field_errors(mut self, errors: FieldValidationErrors) -> Self {
        self.field_errors = Some(errors);
        self
    }

    pub fn with_link(mut self, link: String) -> Self {
        self.link = Some(link);
        self
    }

    pub fn reply(self, status: Status) -> ErrorReply {
        status::Custom(status, Json(self))
    }
}

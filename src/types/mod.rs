// src/types/mod.rs
//! Wire types shared with the job board REST backend

pub mod application;
pub mod job;
pub mod mbti;
pub mod response;

pub use application::{ApplicationPayload, SubmissionReceipt, UploadedFile};
pub use job::{ApplicationCheck, JobSnapshot, SalaryRange};
pub use mbti::{
    AnswerOption, AnswerProgress, AnswerProgressWire, AnswerSubmission, Axis, DimensionScores,
    MbtiResultWire, MbtiState, MbtiStatus, MbtiStatusResponse, TestQuestion, TestSession,
};
pub use response::{BackendErrorBody, Credentials, LoginResponse, UserProfile};

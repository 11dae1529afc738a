// src/types/job.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ===== Job Listing =====

/// Snapshot of a job as returned by `GET /jobs/:id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    #[serde(default, alias = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub salary: Option<SalaryRange>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub posted_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl JobSnapshot {
    /// Company shown on the draft; listings without one fall back to the department
    pub fn company_name(&self) -> String {
        self.company
            .clone()
            .or_else(|| self.department.clone())
            .unwrap_or_default()
    }

    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        self.deadline.map_or(false, |deadline| deadline < now)
    }
}

/// Body of `GET /applications/check/:jobId`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationCheck {
    pub has_applied: bool,
}

// src/types/mbti.rs
//! MBTI test status, questions and scores as exchanged with the backend

use serde::{Deserialize, Serialize};
use std::fmt;

// ===== Axes And Scores =====

/// The four bipolar axes of the MBTI classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    EI,
    SN,
    TF,
    JP,
}

impl Axis {
    pub const ALL: [Axis; 4] = [Axis::EI, Axis::SN, Axis::TF, Axis::JP];

    /// (pole selected by a non-negative score, pole selected by a negative score)
    pub fn poles(self) -> (char, char) {
        match self {
            Axis::EI => ('E', 'I'),
            Axis::SN => ('S', 'N'),
            Axis::TF => ('T', 'F'),
            Axis::JP => ('J', 'P'),
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Axis::EI => "EI",
            Axis::SN => "SN",
            Axis::TF => "TF",
            Axis::JP => "JP",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Signed per-axis scores; positive leans to the first pole
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    #[serde(rename = "EI", alias = "E_I", default)]
    pub ei: f64,
    #[serde(rename = "SN", alias = "S_N", default)]
    pub sn: f64,
    #[serde(rename = "TF", alias = "T_F", default)]
    pub tf: f64,
    #[serde(rename = "JP", alias = "J_P", default)]
    pub jp: f64,
}

impl DimensionScores {
    pub fn score(&self, axis: Axis) -> f64 {
        match axis {
            Axis::EI => self.ei,
            Axis::SN => self.sn,
            Axis::TF => self.tf,
            Axis::JP => self.jp,
        }
    }

    /// Reduce the scores to a four-letter type code such as "ENTJ"
    pub fn personality_type(&self) -> String {
        Axis::ALL
            .iter()
            .map(|&axis| {
                let (first, second) = axis.poles();
                if self.score(axis) >= 0.0 {
                    first
                } else {
                    second
                }
            })
            .collect()
    }
}

// ===== Status =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MbtiState {
    NotStarted,
    InProgress,
    Completed,
    /// The status could not be determined (network or backend failure)
    Error,
}

/// The visitor's MBTI test status. `personality_type` is present iff the
/// state is `Completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MbtiStatus {
    pub state: MbtiState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personality_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension_scores: Option<DimensionScores>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MbtiStatus {
    pub fn not_started() -> Self {
        Self::without_result(MbtiState::NotStarted)
    }

    pub fn in_progress() -> Self {
        Self::without_result(MbtiState::InProgress)
    }

    pub fn completed(personality_type: impl Into<String>, scores: DimensionScores) -> Self {
        Self {
            state: MbtiState::Completed,
            personality_type: Some(personality_type.into()),
            dimension_scores: Some(scores),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::without_result(MbtiState::Error)
        }
    }

    fn without_result(state: MbtiState) -> Self {
        Self {
            state,
            personality_type: None,
            dimension_scores: None,
            error: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state == MbtiState::Completed
    }

    /// Normalize the backend's loosely shaped status into the invariant above
    pub fn from_wire(status: &str, result: Option<MbtiResultWire>) -> Self {
        match status.trim().to_lowercase().as_str() {
            "not_started" | "notstarted" | "none" => Self::not_started(),
            "in_progress" | "inprogress" | "started" => Self::in_progress(),
            "completed" | "complete" => {
                let result = result.unwrap_or_default();
                let scores = result.dimension_scores;
                let personality_type = result
                    .personality_type
                    .map(|t| t.trim().to_uppercase())
                    .filter(|t| !t.is_empty())
                    .or_else(|| scores.map(|s| s.personality_type()));

                match personality_type {
                    Some(code) => Self::completed(code, scores.unwrap_or_default()),
                    None => Self::error("Completed test is missing its result"),
                }
            }
            other => Self::error(format!("Unknown MBTI status: {}", other)),
        }
    }
}

/// `result` object of the backend's status and answer responses
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MbtiResultWire {
    #[serde(default)]
    pub personality_type: Option<String>,
    #[serde(default)]
    pub dimension_scores: Option<DimensionScores>,
}

/// Body of `GET /tests/status/user`
#[derive(Debug, Clone, Deserialize)]
pub struct MbtiStatusResponse {
    pub status: String,
    #[serde(default)]
    pub result: Option<MbtiResultWire>,
}

impl From<MbtiStatusResponse> for MbtiStatus {
    fn from(response: MbtiStatusResponse) -> Self {
        MbtiStatus::from_wire(&response.status, response.result)
    }
}

// ===== Test Session =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSession {
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestQuestion {
    #[serde(alias = "_id")]
    pub id: String,
    pub text: String,
    pub options: Vec<AnswerOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub text: String,
    pub dimension: String,
    pub value: f64,
}

/// Body of `POST /tests/answer`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSubmission {
    pub session_id: String,
    pub question_id: String,
    pub dimension: String,
    pub value: f64,
}

/// Response of `POST /tests/answer`
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerProgressWire {
    #[serde(default)]
    pub progress: f64,
    pub status: String,
    #[serde(default)]
    pub result: Option<MbtiResultWire>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerProgress {
    pub progress: f64,
    pub status: MbtiStatus,
}

impl From<AnswerProgressWire> for AnswerProgress {
    fn from(wire: AnswerProgressWire) -> Self {
        Self {
            progress: wire.progress,
            status: MbtiStatus::from_wire(&wire.status, wire.result),
        }
    }
}

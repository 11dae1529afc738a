// src/application/sequencer.rs
//! Step sequencer of the three-step application wizard

use serde::{Deserialize, Serialize};
use std::fmt;

use super::draft::ApplicationDraft;
use super::validation::{validate_step, FieldValidationErrors};
use crate::types::{MbtiState, MbtiStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Step {
    PersonalInfo = 1,
    Documents = 2,
    Review = 3,
}

impl Step {
    pub const FIRST: Step = Step::PersonalInfo;
    pub const LAST: Step = Step::Review;

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(number: u8) -> Option<Step> {
        match number {
            1 => Some(Step::PersonalInfo),
            2 => Some(Step::Documents),
            3 => Some(Step::Review),
            _ => None,
        }
    }

    pub fn next(self) -> Option<Step> {
        Step::from_number(self.number() + 1)
    }

    pub fn previous(self) -> Option<Step> {
        self.number().checked_sub(1).and_then(Step::from_number)
    }
}

impl Default for Step {
    fn default() -> Self {
        Step::FIRST
    }
}

impl TryFrom<u8> for Step {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Step::from_number(value).ok_or_else(|| format!("invalid application step: {}", value))
    }
}

impl From<Step> for u8 {
    fn from(step: Step) -> Self {
        step.number()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Result of asking the sequencer to move forward
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Advanced(Step),
    /// The active step's validator failed; the step is unchanged
    Blocked(FieldValidationErrors),
    /// Leaving the documents step needs a completed MBTI test
    GateRequired,
    /// The MBTI status could not be determined, so the gate can neither pass nor redirect
    GateUnavailable(String),
    /// Review is terminal: only submission leaves it
    AtFinalStep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepSequencer {
    current: Step,
}

impl StepSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(step: Step) -> Self {
        Self { current: step }
    }

    pub fn current(&self) -> Step {
        self.current
    }

    /// Whether the next successful `advance` crosses the MBTI gate
    pub fn at_gate(&self) -> bool {
        self.current == Step::Documents
    }

    pub fn validate(&self, draft: &ApplicationDraft, resume_attached: bool) -> FieldValidationErrors {
        validate_step(self.current, draft, resume_attached)
    }

    /// `mbti` is only consulted when leaving the documents step; `None` there
    /// counts as unsatisfied.
    pub fn advance(
        &mut self,
        draft: &ApplicationDraft,
        resume_attached: bool,
        mbti: Option<&MbtiStatus>,
    ) -> Transition {
        let Some(next) = self.current.next() else {
            return Transition::AtFinalStep;
        };

        let errors = self.validate(draft, resume_attached);
        if !errors.is_empty() {
            return Transition::Blocked(errors);
        }

        if self.at_gate() {
            match mbti {
                Some(status) if status.is_completed() => {}
                Some(status) if status.state == MbtiState::Error => {
                    return Transition::GateUnavailable(
                        status
                            .error
                            .clone()
                            .unwrap_or_else(|| "MBTI status unavailable".to_string()),
                    );
                }
                _ => return Transition::GateRequired,
            }
        }

        self.current = next;
        Transition::Advanced(next)
    }

    pub fn retreat(&mut self) -> Step {
        if let Some(previous) = self.current.previous() {
            self.current = previous;
        }
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::validation::Field;
    use crate::types::DimensionScores;

    fn completed() -> MbtiStatus {
        MbtiStatus::completed("ENTJ", DimensionScores::default())
    }

    fn valid_draft() -> ApplicationDraft {
        let mut draft = ApplicationDraft::empty("job-1");
        draft.applicant_name = "Jane Doe".to_string();
        draft.applicant_email = "jane@x.com".to_string();
        draft.applicant_phone = "12345678".to_string();
        draft.cover_letter_text = "I am very keen on this role".to_string();
        draft
    }

    #[test]
    fn test_step_numbers() {
        assert_eq!(Step::from_number(0), None);
        assert_eq!(Step::from_number(4), None);
        assert_eq!(Step::PersonalInfo.previous(), None);
        assert_eq!(Step::Review.next(), None);
        assert_eq!(serde_json::to_string(&Step::Documents).unwrap(), "2");
        assert_eq!(serde_json::from_str::<Step>("3").unwrap(), Step::Review);
        assert!(serde_json::from_str::<Step>("5").is_err());
    }

    #[test]
    fn test_invalid_personal_info_never_advances() {
        let invalid_inputs = [
            ("", "jane@x.com", "12345678"),
            ("J", "jane@x.com", "12345678"),
            ("Jane Doe", "", "12345678"),
            ("Jane Doe", "jane@", "12345678"),
            ("Jane Doe", "jane@x.com", ""),
            ("Jane Doe", "jane@x.com", "1234"),
            ("Jane Doe", "jane@x.com", "phone-me"),
            ("", "", ""),
        ];

        for (name, email, phone) in invalid_inputs {
            let mut draft = valid_draft();
            draft.applicant_name = name.to_string();
            draft.applicant_email = email.to_string();
            draft.applicant_phone = phone.to_string();

            let mut sequencer = StepSequencer::new();
            let transition = sequencer.advance(&draft, true, Some(&completed()));
            assert!(matches!(transition, Transition::Blocked(_)), "{:?}", (name, email, phone));
            assert_eq!(sequencer.current(), Step::PersonalInfo);
        }
    }

    #[test]
    fn test_gate_blocks_until_completed() {
        let draft = valid_draft();
        let not_done = [
            None,
            Some(MbtiStatus::not_started()),
            Some(MbtiStatus::in_progress()),
        ];

        for status in not_done {
            let mut sequencer = StepSequencer::at(Step::Documents);
            assert_eq!(
                sequencer.advance(&draft, true, status.as_ref()),
                Transition::GateRequired
            );
            assert_eq!(sequencer.current(), Step::Documents);
        }

        let mut sequencer = StepSequencer::at(Step::Documents);
        assert_eq!(
            sequencer.advance(&draft, true, Some(&completed())),
            Transition::Advanced(Step::Review)
        );
    }

    #[test]
    fn test_status_error_is_not_treated_as_not_started() {
        let mut sequencer = StepSequencer::at(Step::Documents);
        let transition = sequencer.advance(
            &valid_draft(),
            true,
            Some(&MbtiStatus::error("timed out")),
        );
        assert_eq!(transition, Transition::GateUnavailable("timed out".to_string()));
        assert_eq!(sequencer.current(), Step::Documents);
    }

    #[test]
    fn test_documents_validation_runs_before_gate() {
        let mut sequencer = StepSequencer::at(Step::Documents);
        match sequencer.advance(&valid_draft(), false, None) {
            Transition::Blocked(errors) => {
                assert!(errors.contains(Field::Resume));
                assert!(!errors.contains(Field::CoverLetter));
            }
            other => panic!("unexpected transition: {:?}", other),
        }
    }

    #[test]
    fn test_first_step_ignores_mbti() {
        let mut sequencer = StepSequencer::new();
        assert_eq!(
            sequencer.advance(&valid_draft(), false, None),
            Transition::Advanced(Step::Documents)
        );
    }

    #[test]
    fn test_review_is_terminal_and_retreat_clamps() {
        let mut sequencer = StepSequencer::at(Step::Review);
        assert_eq!(
            sequencer.advance(&valid_draft(), true, Some(&completed())),
            Transition::AtFinalStep
        );

        assert_eq!(sequencer.retreat(), Step::Documents);
        assert_eq!(sequencer.retreat(), Step::PersonalInfo);
        assert_eq!(sequencer.retreat(), Step::PersonalInfo);
    }
}

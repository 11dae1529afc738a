// src/application/validation.rs
//! Field and step validators for the application wizard

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

use super::draft::ApplicationDraft;
use super::sequencer::Step;

const MIN_NAME_CHARS: usize = 2;
const MIN_PHONE_DIGITS: usize = 8;
const MIN_COVER_LETTER_CHARS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Name,
    Email,
    Phone,
    Resume,
    CoverLetter,
}

impl Field {
    pub const PERSONAL_INFO: [Field; 3] = [Field::Name, Field::Email, Field::Phone];
    pub const DOCUMENTS: [Field; 2] = [Field::Resume, Field::CoverLetter];
}

/// Field name to human-readable message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldValidationErrors(BTreeMap<Field, String>);

impl FieldValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains_key(&field)
    }

    /// Record the field's current verdict: a message sets the error, `None` clears it
    pub fn update(&mut self, field: Field, verdict: Option<String>) {
        match verdict {
            Some(message) => {
                self.0.insert(field, message);
            }
            None => {
                self.0.remove(&field);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }

    /// First message, for callers that surface a single line
    pub fn first_message(&self) -> Option<&str> {
        self.0.values().next().map(String::as_str)
    }
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
    })
}

fn phone_pattern() -> &'static Regex {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE.get_or_init(|| Regex::new(r"^\+?[0-9][0-9\s-]*$").expect("phone pattern is valid"))
}

pub fn validate_name(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() {
        Some("Full name is required".to_string())
    } else if name.chars().count() < MIN_NAME_CHARS {
        Some(format!(
            "Full name must be at least {} characters",
            MIN_NAME_CHARS
        ))
    } else {
        None
    }
}

pub fn validate_email(email: &str) -> Option<String> {
    let email = email.trim();
    if email.is_empty() {
        Some("Email is required".to_string())
    } else if !email_pattern().is_match(email) {
        Some("Please enter a valid email address".to_string())
    } else {
        None
    }
}

pub fn validate_phone(phone: &str) -> Option<String> {
    let phone = phone.trim();
    if phone.is_empty() {
        return Some("Phone number is required".to_string());
    }

    let digits = phone.chars().filter(char::is_ascii_digit).count();
    if !phone_pattern().is_match(phone) || digits < MIN_PHONE_DIGITS {
        Some(format!(
            "Please enter a valid phone number (at least {} digits)",
            MIN_PHONE_DIGITS
        ))
    } else {
        None
    }
}

pub fn validate_resume(resume_attached: bool) -> Option<String> {
    if resume_attached {
        None
    } else {
        Some("Please attach your resume".to_string())
    }
}

pub fn validate_cover_letter(text: &str) -> Option<String> {
    let length = text.trim().chars().count();
    if length == 0 {
        Some("Cover letter is required".to_string())
    } else if length < MIN_COVER_LETTER_CHARS {
        Some(format!(
            "Cover letter must be at least {} characters ({} so far)",
            MIN_COVER_LETTER_CHARS, length
        ))
    } else {
        None
    }
}

pub fn validate_field(field: Field, draft: &ApplicationDraft, resume_attached: bool) -> Option<String> {
    match field {
        Field::Name => validate_name(&draft.applicant_name),
        Field::Email => validate_email(&draft.applicant_email),
        Field::Phone => validate_phone(&draft.applicant_phone),
        Field::Resume => validate_resume(resume_attached),
        Field::CoverLetter => validate_cover_letter(&draft.cover_letter_text),
    }
}

fn validate_fields(fields: &[Field], draft: &ApplicationDraft, resume_attached: bool) -> FieldValidationErrors {
    let mut errors = FieldValidationErrors::default();
    for &field in fields {
        errors.update(field, validate_field(field, draft, resume_attached));
    }
    errors
}

/// Gate for leaving `step`. The review step re-checks everything it summarizes.
pub fn validate_step(step: Step, draft: &ApplicationDraft, resume_attached: bool) -> FieldValidationErrors {
    match step {
        Step::PersonalInfo => validate_fields(&Field::PERSONAL_INFO, draft, resume_attached),
        Step::Documents => validate_fields(&Field::DOCUMENTS, draft, resume_attached),
        Step::Review => validate_all(draft, resume_attached),
    }
}

pub fn validate_all(draft: &ApplicationDraft, resume_attached: bool) -> FieldValidationErrors {
    let mut errors = validate_fields(&Field::PERSONAL_INFO, draft, resume_attached);
    for (field, message) in validate_fields(&Field::DOCUMENTS, draft, resume_attached).iter() {
        errors.update(field, Some(message.to_string()));
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name() {
        assert!(validate_name("Jane Doe").is_none());
        assert!(validate_name("Jo").is_none());
        assert_eq!(validate_name("   ").as_deref(), Some("Full name is required"));
        assert!(validate_name(" J ").is_some());
    }

    #[test]
    fn test_email() {
        assert!(validate_email("jane@x.com").is_none());
        assert!(validate_email(" jane.doe+jobs@mail.example.org ").is_none());
        assert_eq!(validate_email("").as_deref(), Some("Email is required"));
        assert!(validate_email("jane@x").is_some());
        assert!(validate_email("jane x@y.com").is_some());
        assert!(validate_email("@x.com").is_some());
    }

    #[test]
    fn test_phone() {
        assert!(validate_phone("12345678").is_none());
        assert!(validate_phone("+33 6 12-34-56-78").is_none());
        assert!(validate_phone("1234567").is_some());
        assert!(validate_phone("12345678a").is_some());
        assert!(validate_phone("++12345678").is_some());
        assert!(validate_phone("+ -------").is_some());
        assert_eq!(validate_phone("").as_deref(), Some("Phone number is required"));
    }

    #[test]
    fn test_cover_letter() {
        assert!(validate_cover_letter("I would love to join your team").is_none());
        assert!(validate_cover_letter(&"a".repeat(20)).is_none());
        assert!(validate_cover_letter(&format!("  {}  ", "a".repeat(19))).is_some());
        assert_eq!(
            validate_cover_letter("").as_deref(),
            Some("Cover letter is required")
        );
    }

    #[test]
    fn test_documents_step_reports_both_fields() {
        let draft = ApplicationDraft::empty("job-1");
        let errors = validate_step(Step::Documents, &draft, false);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get(Field::Resume), Some("Please attach your resume"));
        assert!(errors.contains(Field::CoverLetter));
        assert!(!errors.contains(Field::Name));
    }

    #[test]
    fn test_update_clears_resolved_fields() {
        let mut errors = FieldValidationErrors::default();
        errors.update(Field::Email, Some("bad".to_string()));
        errors.update(Field::Phone, Some("bad".to_string()));
        errors.update(Field::Email, None);

        assert!(!errors.contains(Field::Email));
        assert_eq!(errors.first_message(), Some("bad"));
        assert_eq!(
            serde_json::to_string(&errors).unwrap(),
            r#"{"phone":"bad"}"#
        );
    }
}

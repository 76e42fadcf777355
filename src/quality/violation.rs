// ==========================================
// Coffee ETL - rule violations and outcomes
// ==========================================

use crate::domain::Record;
use crate::i18n::t_with_args;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Locale-independent reason a field failed a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCode {
    Blank,
    NotPositiveInteger,
    NotPositiveNumber,
    Placeholder,
    OutOfRange,
    Duplicate,
    TooShort,
    TooLong,
    ContainsDigit,
    ForbiddenCharacters,
    MultipleSpaces,
    RepeatedCharacters,
    TestKeyword,
    NotAllowed,
    PhoneFormat,
    PhoneLeadingZeros,
    EmailFormat,
    EmailWhitespace,
    EmailDiacritics,
    UnknownReference,
    DateFormat,
    FutureDate,
    DateTooOld,
    Custom,
}

impl ViolationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationCode::Blank => "blank",
            ViolationCode::NotPositiveInteger => "not_positive_integer",
            ViolationCode::NotPositiveNumber => "not_positive_number",
            ViolationCode::Placeholder => "placeholder",
            ViolationCode::OutOfRange => "out_of_range",
            ViolationCode::Duplicate => "duplicate",
            ViolationCode::TooShort => "too_short",
            ViolationCode::TooLong => "too_long",
            ViolationCode::ContainsDigit => "contains_digit",
            ViolationCode::ForbiddenCharacters => "forbidden_characters",
            ViolationCode::MultipleSpaces => "multiple_spaces",
            ViolationCode::RepeatedCharacters => "repeated_characters",
            ViolationCode::TestKeyword => "test_keyword",
            ViolationCode::NotAllowed => "not_allowed",
            ViolationCode::PhoneFormat => "phone_format",
            ViolationCode::PhoneLeadingZeros => "phone_leading_zeros",
            ViolationCode::EmailFormat => "email_format",
            ViolationCode::EmailWhitespace => "email_whitespace",
            ViolationCode::EmailDiacritics => "email_diacritics",
            ViolationCode::UnknownReference => "unknown_reference",
            ViolationCode::DateFormat => "date_format",
            ViolationCode::FutureDate => "future_date",
            ViolationCode::DateTooOld => "date_too_old",
            ViolationCode::Custom => "custom",
        }
    }

    fn message_key(&self) -> String {
        format!("violation.{}", self.as_str())
    }
}

/// One failed check on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub field: String,
    pub code: ViolationCode,
    pub message: String,
}

impl Violation {
    /// Build a violation whose message is rendered from the active locale.
    pub fn new(field: &str, code: ViolationCode, args: &[(&str, &str)]) -> Self {
        Self {
            field: field.to_string(),
            code,
            message: t_with_args(&code.message_key(), args),
        }
    }

    /// A failed custom rule, keyed by the rule name.
    pub fn custom(rule_name: &str, message: &str) -> Self {
        Self {
            field: rule_name.to_string(),
            code: ViolationCode::Custom,
            message: message.to_string(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            ViolationCode::Custom => write!(f, "[{}] {}", self.field, self.message),
            _ => write!(f, "{}: {}", self.field, self.message),
        }
    }
}

// ==========================================
// RuleOutcome
// ==========================================
// Binary: a record with any violation is rejected whole.
// Warnings never affect `is_valid`.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub is_valid: bool,
    pub normalized_fields: Record,
    pub violations: Vec<Violation>,
    pub warnings: Vec<Violation>,
}

impl RuleOutcome {
    pub fn from_violations(normalized_fields: Record, violations: Vec<Violation>) -> Self {
        Self {
            is_valid: violations.is_empty(),
            normalized_fields,
            violations,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<Violation>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn has_violation(&self, field: &str, code: ViolationCode) -> bool {
        self.violations
            .iter()
            .any(|v| v.field == field && v.code == code)
    }

    pub fn names_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }

    /// `field: message | field: message`, the error-zone reasons column.
    pub fn joined_messages(&self) -> String {
        join_violations(&self.violations)
    }
}

pub fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" | ")
}

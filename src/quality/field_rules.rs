// ==========================================
// Coffee ETL - generic field rules
// ==========================================
// Each method checks one field and accumulates violations.
// A blank value short-circuits the remaining checks for that
// field only; other fields are always checked.
// ==========================================

use crate::quality::context::ValidationContext;
use crate::quality::patterns::{has_repeated_run, normalize_whitespace, Patterns};
use crate::quality::rules_config::{PLACEHOLDER_PHONES, REPEATED_CHAR_RUN};
use crate::quality::violation::{Violation, ViolationCode};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::collections::HashSet;

pub fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

/// Identifier options.
#[derive(Debug, Clone, Copy)]
pub struct IdRule {
    pub placeholders: &'static [i64],
    pub max: Option<i64>,
    pub unique: bool,
}

impl IdRule {
    pub const UNIQUE: IdRule = IdRule {
        placeholders: &[],
        max: None,
        unique: true,
    };
}

/// Character class a free-text field must stay inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Any,
    /// Letters, Vietnamese diacritics and spaces.
    PersonName,
    /// Letters, digits, spaces and `-,.()`.
    Product,
    /// Same as `Product` without digits.
    ProductNoDigits,
}

#[derive(Debug, Clone, Copy)]
pub struct TextRule {
    pub min: usize,
    pub max: usize,
    pub charset: Charset,
    pub forbid_digits: bool,
    pub reject_multi_space: bool,
    pub reject_repeats: bool,
    pub reject_test_keywords: bool,
}

impl TextRule {
    /// Bounded length and test keywords, no character restriction.
    pub const fn plain(min: usize, max: usize) -> Self {
        Self {
            min,
            max,
            charset: Charset::Any,
            forbid_digits: false,
            reject_multi_space: false,
            reject_repeats: false,
            reject_test_keywords: true,
        }
    }

    pub const fn product(min: usize, max: usize) -> Self {
        Self {
            charset: Charset::Product,
            ..Self::plain(min, max)
        }
    }

    pub const fn person_name(min: usize, max: usize) -> Self {
        Self {
            min,
            max,
            charset: Charset::PersonName,
            forbid_digits: true,
            reject_multi_space: true,
            reject_repeats: true,
            reject_test_keywords: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NumberRule {
    pub allow_zero: bool,
    pub max: Option<f64>,
}

// ==========================================
// FieldChecks
// ==========================================

pub struct FieldChecks<'a> {
    patterns: &'a Patterns,
    violations: Vec<Violation>,
}

impl<'a> FieldChecks<'a> {
    pub fn new(patterns: &'a Patterns) -> Self {
        Self {
            patterns,
            violations: Vec::new(),
        }
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }

    fn fail(&mut self, field: &str, code: ViolationCode, args: &[(&str, &str)]) {
        self.violations.push(Violation::new(field, code, args));
    }

    /// Trimmed value when present; a Blank violation otherwise.
    pub fn required<'v>(&mut self, field: &str, value: Option<&'v str>) -> Option<&'v str> {
        if is_blank(value) {
            self.fail(field, ViolationCode::Blank, &[]);
            return None;
        }
        value.map(str::trim)
    }

    // ===== identifier =====

    /// Canonical positive integer, not a placeholder, within bounds,
    /// and (when `unique`) not already accepted in this run.
    pub fn identifier(
        &mut self,
        field: &str,
        value: Option<&str>,
        rule: IdRule,
        context: &ValidationContext,
    ) -> Option<i64> {
        let s = self.required(field, value)?;
        let id = self.positive_integer(field, s)?;

        if rule.placeholders.contains(&id) {
            self.fail(field, ViolationCode::Placeholder, &[("value", s)]);
        }
        if let Some(max) = rule.max {
            if id > max {
                self.fail(
                    field,
                    ViolationCode::OutOfRange,
                    &[("min", "1"), ("max", &max.to_string())],
                );
            }
        }
        if rule.unique && context.contains_id(id) {
            self.fail(field, ViolationCode::Duplicate, &[("value", s)]);
        }
        Some(id)
    }

    fn positive_integer(&mut self, field: &str, s: &str) -> Option<i64> {
        if !self.patterns.id.is_match(s) {
            self.fail(field, ViolationCode::NotPositiveInteger, &[]);
            return None;
        }
        match s.parse::<i64>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.fail(
                    field,
                    ViolationCode::OutOfRange,
                    &[("min", "1"), ("max", &i64::MAX.to_string())],
                );
                None
            }
        }
    }

    /// Positive integer within `min..=max`.
    pub fn bounded_integer(
        &mut self,
        field: &str,
        value: Option<&str>,
        min: i64,
        max: i64,
    ) -> Option<i64> {
        let s = self.required(field, value)?;
        let v = self.positive_integer(field, s)?;
        if v < min || v > max {
            self.fail(
                field,
                ViolationCode::OutOfRange,
                &[("min", &min.to_string()), ("max", &max.to_string())],
            );
        }
        Some(v)
    }

    /// Referenced id must be in `references` when that set is present.
    pub fn foreign_key(
        &mut self,
        field: &str,
        id: Option<i64>,
        references: Option<&HashSet<i64>>,
        target: &str,
    ) {
        if let (Some(id), Some(set)) = (id, references) {
            if !set.contains(&id) {
                self.fail(field, ViolationCode::UnknownReference, &[("target", target)]);
            }
        }
    }

    // ===== free text =====

    pub fn text(&mut self, field: &str, value: Option<&str>, rule: TextRule) {
        if let Some(s) = self.required(field, value) {
            self.text_body(field, s, rule);
        }
    }

    /// Same checks as `text`, but a blank value is accepted.
    pub fn optional_text(&mut self, field: &str, value: Option<&str>, rule: TextRule) {
        if !is_blank(value) {
            self.text(field, value, rule);
        }
    }

    fn text_body(&mut self, field: &str, s: &str, rule: TextRule) {
        let len = s.chars().count();
        let mut length_ok = true;
        if len < rule.min {
            self.fail(field, ViolationCode::TooShort, &[("min", &rule.min.to_string())]);
            length_ok = false;
        }
        if len > rule.max {
            self.fail(field, ViolationCode::TooLong, &[("max", &rule.max.to_string())]);
            length_ok = false;
        }

        if rule.forbid_digits && self.patterns.has_digit.is_match(s) {
            self.fail(field, ViolationCode::ContainsDigit, &[]);
        }

        let charset_ok = match rule.charset {
            Charset::Any => true,
            Charset::PersonName => !self.patterns.person_name_forbidden.is_match(s),
            // anchored patterns also encode a length; only judge characters when the length passed
            Charset::Product => !length_ok || self.patterns.product_name.is_match(s),
            Charset::ProductNoDigits => !length_ok || self.patterns.product_name_file.is_match(s),
        };
        if !charset_ok {
            self.fail(field, ViolationCode::ForbiddenCharacters, &[]);
        }

        if rule.reject_multi_space && self.patterns.multi_space.is_match(s) {
            self.fail(field, ViolationCode::MultipleSpaces, &[]);
        }
        if rule.reject_repeats && has_repeated_run(s, REPEATED_CHAR_RUN) {
            self.fail(
                field,
                ViolationCode::RepeatedCharacters,
                &[("run", &REPEATED_CHAR_RUN.to_string())],
            );
        }
        if rule.reject_test_keywords && self.patterns.test_keywords.is_match(s) {
            self.fail(field, ViolationCode::TestKeyword, &[]);
        }
    }

    // ===== whitelist =====

    /// Case-insensitive, whitespace-normalised membership in `allowed`.
    pub fn whitelist(&mut self, field: &str, s: &str, allowed: &[&str]) {
        let needle = normalize_whitespace(s).to_lowercase();
        let found = allowed
            .iter()
            .any(|a| normalize_whitespace(a).to_lowercase() == needle);
        if !found {
            let mut names: Vec<&str> = allowed.to_vec();
            names.sort_unstable();
            self.fail(field, ViolationCode::NotAllowed, &[("allowed", &names.join(", "))]);
        }
    }

    pub fn city(&mut self, field: &str, value: Option<&str>, allowed: &[&str]) {
        let Some(s) = self.required(field, value) else {
            return;
        };
        if !self.patterns.city.is_match(s) {
            self.fail(field, ViolationCode::ForbiddenCharacters, &[]);
        }
        if self.patterns.has_digit.is_match(s) {
            self.fail(field, ViolationCode::ContainsDigit, &[]);
        }
        self.whitelist(field, s, allowed);
    }

    pub fn status(&mut self, field: &str, value: Option<&str>, allowed: &[&str]) {
        let Some(s) = self.required(field, value) else {
            return;
        };
        if !self.patterns.status_charset.is_match(s) {
            self.fail(field, ViolationCode::ForbiddenCharacters, &[]);
            return;
        }
        self.whitelist(field, s, allowed);
    }

    // ===== contact =====

    pub fn phone(&mut self, field: &str, value: Option<&str>) {
        let Some(s) = self.required(field, value) else {
            return;
        };
        if !self.patterns.phone.is_match(s) {
            self.fail(field, ViolationCode::PhoneFormat, &[]);
            return;
        }
        if self.patterns.phone_placeholder.is_match(s) || PLACEHOLDER_PHONES.contains(&s) {
            self.fail(field, ViolationCode::Placeholder, &[("value", s)]);
        }
        if s.starts_with("00") {
            self.fail(field, ViolationCode::PhoneLeadingZeros, &[]);
        }
    }

    pub fn email(&mut self, field: &str, value: Option<&str>, context: &ValidationContext) {
        let Some(s) = self.required(field, value) else {
            return;
        };
        if s.chars().any(char::is_whitespace) {
            self.fail(field, ViolationCode::EmailWhitespace, &[]);
        }
        if !self.patterns.email.is_match(s) {
            self.fail(field, ViolationCode::EmailFormat, &[]);
        }
        if self.patterns.diacritic.is_match(s) {
            self.fail(field, ViolationCode::EmailDiacritics, &[]);
        }
        if context.contains_email(s) {
            self.fail(field, ViolationCode::Duplicate, &[("value", &s.to_lowercase())]);
        }
    }

    // ===== numeric =====

    pub fn number(&mut self, field: &str, value: Option<&str>, rule: NumberRule) -> Option<f64> {
        let s = self.required(field, value)?;
        if !self.patterns.positive_number.is_match(s) {
            self.fail(field, ViolationCode::NotPositiveNumber, &[]);
            return None;
        }
        let Ok(v) = s.parse::<f64>() else {
            self.fail(field, ViolationCode::NotPositiveNumber, &[]);
            return None;
        };
        let too_small = if rule.allow_zero { v < 0.0 } else { v <= 0.0 };
        let too_large = rule.max.map(|m| v > m).unwrap_or(false);
        if too_small || too_large {
            let min = if rule.allow_zero { "0" } else { ">0" };
            let max = rule.max.map(|m| format!("{}", m)).unwrap_or_else(|| "∞".to_string());
            self.fail(field, ViolationCode::OutOfRange, &[("min", min), ("max", &max)]);
        }
        Some(v)
    }

    // ===== temporal =====

    /// Date or datetime, not after `now`, year not before `min_year`.
    pub fn date(&mut self, field: &str, value: Option<&str>, now: NaiveDateTime, min_year: i32) {
        let Some(s) = self.required(field, value) else {
            return;
        };
        let Some(parsed) = self.parse_date(s) else {
            self.fail(field, ViolationCode::DateFormat, &[]);
            return;
        };
        if parsed > now {
            self.fail(field, ViolationCode::FutureDate, &[]);
        }
        if parsed.year() < min_year {
            self.fail(field, ViolationCode::DateTooOld, &[("year", &min_year.to_string())]);
        }
    }

    fn parse_date(&self, s: &str) -> Option<NaiveDateTime> {
        if self.patterns.date_iso.is_match(s) {
            return NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0));
        }
        if self.patterns.datetime_iso.is_match(s) {
            let head = s.get(..19)?.replacen('T', " ", 1);
            return NaiveDateTime::parse_from_str(&head, "%Y-%m-%d %H:%M:%S").ok();
        }
        None
    }
}

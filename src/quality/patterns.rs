// ==========================================
// Coffee ETL - rule patterns
// ==========================================
// Compiled once per registry and shared by every validator.
// The regex crate has no backreferences, so repeated-character
// runs are detected by `has_repeated_run` instead of a pattern.
// ==========================================

use crate::quality::error::{QualityError, QualityResult};
use regex::Regex;

fn compile(name: &'static str, pattern: &str) -> QualityResult<Regex> {
    Regex::new(pattern).map_err(|source| QualityError::PatternCompile { name, source })
}

#[derive(Debug, Clone)]
pub struct Patterns {
    /// Canonical positive integer, no sign, no leading zero.
    pub id: Regex,
    pub positive_number: Regex,
    pub has_digit: Regex,
    pub multi_space: Regex,
    /// Anything outside letters, Vietnamese diacritics and spaces.
    pub person_name_forbidden: Regex,
    pub phone: Regex,
    pub phone_placeholder: Regex,
    pub email: Regex,
    pub diacritic: Regex,
    pub city: Regex,
    /// Product-style names: letters, digits, spaces and `-,.()`.
    pub product_name: Regex,
    /// File-shape product names: as above but without digits.
    pub product_name_file: Regex,
    pub date_iso: Regex,
    pub datetime_iso: Regex,
    pub status_charset: Regex,
    pub test_keywords: Regex,
}

impl Patterns {
    pub fn compile() -> QualityResult<Self> {
        Ok(Self {
            id: compile("id", r"^[1-9][0-9]*$")?,
            positive_number: compile("positive_number", r"^[0-9]+(\.[0-9]+)?$")?,
            has_digit: compile("has_digit", r"\d")?,
            multi_space: compile("multi_space", r"\s{2,}")?,
            person_name_forbidden: compile("person_name_forbidden", r"[^A-Za-zÀ-Ỵà-ỹ\s]")?,
            phone: compile("phone", r"^[0-9]{9,11}$")?,
            phone_placeholder: compile("phone_placeholder", r"^(0+|1+)$")?,
            email: compile("email", r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")?,
            diacritic: compile("diacritic", r"[À-Ỵà-ỹ]")?,
            city: compile("city", r"^[A-Za-zÀ-Ỵà-ỹ\s]{2,50}$")?,
            product_name: compile("product_name", r"^[A-Za-zÀ-Ỵà-ỹ0-9\s\-,\.()]{2,200}$")?,
            product_name_file: compile("product_name_file", r"^[A-Za-zÀ-Ỵà-ỹ\s\-,\.()]{2,200}$")?,
            date_iso: compile("date_iso", r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$")?,
            datetime_iso: compile("datetime_iso", r"^[0-9]{4}-[0-9]{2}-[0-9]{2}[T ][0-9]{2}:[0-9]{2}:[0-9]{2}")?,
            status_charset: compile("status_charset", r"^[a-zA-ZÀ-ỹ\s]+$")?,
            test_keywords: compile("test_keywords", r"(?i)(test|fake|giả|dummy|sample|demo|example)")?,
        })
    }
}

/// True when some character repeats `min_run` or more times in a row.
pub fn has_repeated_run(value: &str, min_run: usize) -> bool {
    let mut prev: Option<char> = None;
    let mut run = 0usize;
    for c in value.chars() {
        if Some(c) == prev {
            run += 1;
        } else {
            prev = Some(c);
            run = 1;
        }
        if run >= min_run {
            return true;
        }
    }
    false
}

/// Collapse whitespace runs to one space and trim.
pub fn normalize_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

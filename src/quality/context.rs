// ==========================================
// Coffee ETL - per-run validation context
// ==========================================
// One context per (run, entity), shared by both provenances.
// Written only when a record is accepted, so the first
// occurrence of an id or email wins. Callers that add
// parallelism must keep a single writer per context.
// ==========================================

use crate::domain::Record;
use crate::quality::rules_config::IDENTIFIER_FIELDS;
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    ids: Vec<i64>,
    id_set: HashSet<i64>,
    emails: Vec<String>,
    email_set: HashSet<String>,
}

impl ValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_id(&self, id: i64) -> bool {
        self.id_set.contains(&id)
    }

    /// Emails are compared lowercased.
    pub fn contains_email(&self, email: &str) -> bool {
        self.email_set.contains(&email.trim().to_lowercase())
    }

    pub fn insert_id(&mut self, id: i64) {
        if self.id_set.insert(id) {
            self.ids.push(id);
        }
    }

    pub fn insert_email(&mut self, email: &str) {
        let key = email.trim().to_lowercase();
        if key.is_empty() {
            return;
        }
        if self.email_set.insert(key.clone()) {
            self.emails.push(key);
        }
    }

    /// Record an accepted row: every identifier field that parses, plus its email.
    pub fn commit(&mut self, accepted: &Record) {
        for field in IDENTIFIER_FIELDS {
            if let Some(id) = accepted.get(field).and_then(|v| v.trim().parse::<i64>().ok()) {
                self.insert_id(id);
            }
        }
        if let Some(email) = accepted.get("email") {
            self.insert_email(email);
        }
    }

    /// Accepted ids in acceptance order.
    pub fn accepted_ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn accepted_emails(&self) -> &[String] {
        &self.emails
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_commit_tracks_ids_and_emails_in_order() {
        let mut ctx = ValidationContext::new();
        ctx.commit(&record(&[("id", "5"), ("email", "A@X.com")]));
        ctx.commit(&record(&[("id", "2"), ("email", "b@x.com")]));
        ctx.commit(&record(&[("id", "5"), ("email", "a@x.com")]));

        assert_eq!(ctx.accepted_ids(), &[5, 2]);
        assert_eq!(ctx.accepted_emails(), &["a@x.com".to_string(), "b@x.com".to_string()]);
        assert!(ctx.contains_email("A@x.COM"));
    }

    #[test]
    fn test_identifier_fields_share_one_set() {
        let mut ctx = ValidationContext::new();
        ctx.commit(&record(&[("ma_loai", "7")]));
        assert!(ctx.contains_id(7));
    }

    #[test]
    fn test_blank_and_non_numeric_values_ignored() {
        let mut ctx = ValidationContext::new();
        ctx.commit(&record(&[("id", ""), ("email", "  ")]));
        ctx.commit(&record(&[("id", "abc")]));
        assert!(ctx.accepted_ids().is_empty());
        assert!(ctx.accepted_emails().is_empty());
    }
}

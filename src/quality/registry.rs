// ==========================================
// Coffee ETL - rule registry
// ==========================================
// Maps a record shape to its validator and carries the
// optional per-entity custom rules. Stateless across rows:
// all per-run state lives in the ValidationContext passed in.
// ==========================================

use crate::domain::{clean_token, EntityKind, Provenance, Record, RecordShape};
use crate::quality::context::ValidationContext;
use crate::quality::error::QualityResult;
use crate::quality::patterns::Patterns;
use crate::quality::references::ReferenceSets;
use crate::quality::validators::{self, EntityValidator, RuleEnv};
use crate::quality::violation::{RuleOutcome, Violation};
use chrono::NaiveDateTime;
use std::collections::HashMap;

pub type CustomPredicate = Box<dyn Fn(&Record) -> bool + Send + Sync>;

/// Error rules reject the record; warning rules are reported only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleSeverity {
    #[default]
    Error,
    Warning,
}

/// A named per-entity predicate; a record passes when it returns true.
pub struct CustomRule {
    pub name: String,
    pub message: String,
    pub severity: RuleSeverity,
    predicate: CustomPredicate,
}

impl CustomRule {
    fn passes(&self, record: &Record) -> bool {
        (self.predicate)(record)
    }
}

pub struct RuleRegistry {
    patterns: Patterns,
    validators: HashMap<RecordShape, Box<dyn EntityValidator>>,
    custom_rules: HashMap<EntityKind, Vec<CustomRule>>,
}

impl RuleRegistry {
    /// Registry with the built-in validator for every shape.
    pub fn new() -> QualityResult<Self> {
        let validators = validators::builtin()
            .into_iter()
            .map(|v| (v.shape(), v))
            .collect();
        Ok(Self {
            patterns: Patterns::compile()?,
            validators,
            custom_rules: HashMap::new(),
        })
    }

    pub fn patterns(&self) -> &Patterns {
        &self.patterns
    }

    /// Append a rejecting custom rule for `kind`. A failing predicate adds `[name] message`.
    pub fn add_custom_rule<F>(&mut self, kind: EntityKind, name: &str, message: &str, predicate: F)
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        self.add_custom_rule_with(kind, name, message, RuleSeverity::Error, predicate);
    }

    pub fn add_custom_rule_with<F>(
        &mut self,
        kind: EntityKind,
        name: &str,
        message: &str,
        severity: RuleSeverity,
        predicate: F,
    ) where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        self.custom_rules.entry(kind).or_default().push(CustomRule {
            name: name.to_string(),
            message: message.to_string(),
            severity,
            predicate: Box::new(predicate),
        });
    }

    pub fn custom_rules(&self, kind: EntityKind) -> &[CustomRule] {
        self.custom_rules
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Run every rule for `kind`/`provenance` against one record.
    ///
    /// # Parameters
    /// - context: duplicates are judged against it; it is not modified
    /// - references: foreign-key sets, absent sets skip the check
    /// - now: upper bound for date checks
    ///
    /// # Returns
    /// Valid iff no violation was found. `normalized_fields` carries
    /// cleaned keys and trimmed values.
    pub fn validate_row(
        &self,
        kind: EntityKind,
        provenance: Provenance,
        record: &Record,
        context: &ValidationContext,
        references: &ReferenceSets,
        now: NaiveDateTime,
    ) -> RuleOutcome {
        let normalized = normalize(record);
        let shape = RecordShape::resolve(kind, provenance);

        let env = RuleEnv {
            patterns: &self.patterns,
            context,
            references,
            now,
        };

        let mut violations = match self.validators.get(&shape) {
            Some(validator) => validator.check(&normalized, &env),
            None => Vec::new(),
        };

        let mut warnings = Vec::new();
        for rule in self.custom_rules(kind) {
            if rule.passes(&normalized) {
                continue;
            }
            let violation = Violation::custom(&rule.name, &rule.message);
            match rule.severity {
                RuleSeverity::Error => violations.push(violation),
                RuleSeverity::Warning => warnings.push(violation),
            }
        }

        RuleOutcome::from_violations(normalized, violations).with_warnings(warnings)
    }
}

/// Keys and values cleaned of a byte-order mark and surrounding whitespace.
pub fn normalize(record: &Record) -> Record {
    record
        .iter()
        .map(|(k, v)| (clean_token(k), clean_token(v)))
        .collect()
}

// ==========================================
// Coffee ETL - quality engine
// ==========================================
// Owns one ValidationContext per entity for the current run
// and classifies captured rows into valid / rejected.
// Rows are processed strictly in order: the context is
// committed after each accepted row, so first occurrence wins.
// ==========================================

use crate::domain::{CapturedRecord, DatasetKey, EntityKind, MessageMetadata, Provenance, Record};
use crate::quality::context::ValidationContext;
use crate::quality::references::{ForeignKeyMode, ReferenceSets};
use crate::quality::registry::RuleRegistry;
use crate::quality::violation::{join_violations, RuleOutcome, Violation};
use chrono::{Local, NaiveDateTime};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// A row that passed every rule, with normalized fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRecord {
    pub row_number: usize,
    pub fields: Record,
    pub metadata: MessageMetadata,
}

/// A row with at least one violation, with its original field values.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    pub row_number: usize,
    pub fields: Record,
    pub violations: Vec<Violation>,
    pub metadata: MessageMetadata,
}

impl RejectedRecord {
    pub fn reasons(&self) -> String {
        join_violations(&self.violations)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub valid: Vec<ValidRecord>,
    pub rejected: Vec<RejectedRecord>,
    /// Warning-rule hits, valid and rejected rows alike.
    pub warnings: usize,
}

impl ValidationReport {
    pub fn total(&self) -> usize {
        self.valid.len() + self.rejected.len()
    }
}

pub struct QualityEngine {
    registry: RuleRegistry,
    mode: ForeignKeyMode,
    explicit_references: ReferenceSets,
    contexts: HashMap<EntityKind, ValidationContext>,
    clock: Option<NaiveDateTime>,
}

impl QualityEngine {
    pub fn new(registry: RuleRegistry, mode: ForeignKeyMode) -> Self {
        Self {
            registry,
            mode,
            explicit_references: ReferenceSets::new(),
            contexts: HashMap::new(),
            clock: None,
        }
    }

    /// Caller-supplied reference sets; they take precedence over run-scoped ones.
    pub fn with_references(mut self, references: ReferenceSets) -> Self {
        self.explicit_references = references;
        self
    }

    /// Pin "now" for date checks.
    pub fn with_clock(mut self, now: NaiveDateTime) -> Self {
        self.clock = Some(now);
        self
    }

    pub fn registry_mut(&mut self) -> &mut RuleRegistry {
        &mut self.registry
    }

    pub fn mode(&self) -> ForeignKeyMode {
        self.mode
    }

    pub fn context(&self, kind: EntityKind) -> Option<&ValidationContext> {
        self.contexts.get(&kind)
    }

    /// Drop all per-run state.
    pub fn reset(&mut self) {
        self.contexts.clear();
    }

    fn now(&self) -> NaiveDateTime {
        self.clock.unwrap_or_else(|| Local::now().naive_local())
    }

    /// Reference sets in effect for rows of `kind`.
    pub fn references_for(&self, kind: EntityKind) -> ReferenceSets {
        match self.mode {
            ForeignKeyMode::Soft => self.explicit_references.clone(),
            ForeignKeyMode::RunScoped => {
                let mut run_scoped = ReferenceSets::new();
                for target in referenced_entities(kind) {
                    let ids = self
                        .contexts
                        .get(target)
                        .map(|c| c.accepted_ids().to_vec())
                        .unwrap_or_default();
                    run_scoped.insert(*target, ids);
                }
                self.explicit_references.merged_over(&run_scoped)
            }
        }
    }

    /// Validate one row and commit it to the run context when accepted.
    pub fn validate_record(
        &mut self,
        kind: EntityKind,
        provenance: Provenance,
        record: &Record,
    ) -> RuleOutcome {
        let references = self.references_for(kind);
        let now = self.now();
        self.validate_with(kind, provenance, record, &references, now)
    }

    fn validate_with(
        &mut self,
        kind: EntityKind,
        provenance: Provenance,
        record: &Record,
        references: &ReferenceSets,
        now: NaiveDateTime,
    ) -> RuleOutcome {
        let context = self.contexts.entry(kind).or_default();
        let outcome = self
            .registry
            .validate_row(kind, provenance, record, context, references, now);
        if outcome.is_valid {
            context.commit(&outcome.normalized_fields);
        }
        outcome
    }

    /// Validate a whole dataset in row order.
    #[instrument(skip(self, rows), fields(dataset = %key, rows = rows.len()))]
    pub fn validate_dataset(&mut self, key: DatasetKey, rows: &[CapturedRecord]) -> ValidationReport {
        let references = self.references_for(key.entity);
        let now = self.now();
        let mut report = ValidationReport::default();

        for row in rows {
            let outcome = self.validate_with(key.entity, key.provenance, &row.fields, &references, now);
            if !outcome.warnings.is_empty() {
                debug!(
                    dataset = %key,
                    row = row.row_number,
                    warnings = %join_violations(&outcome.warnings),
                    "row warnings"
                );
                report.warnings += outcome.warnings.len();
            }
            if outcome.is_valid {
                report.valid.push(ValidRecord {
                    row_number: row.row_number,
                    fields: outcome.normalized_fields,
                    metadata: row.metadata.clone(),
                });
            } else {
                debug!(
                    dataset = %key,
                    row = row.row_number,
                    reasons = %join_violations(&outcome.violations),
                    "row rejected"
                );
                report.rejected.push(RejectedRecord {
                    row_number: row.row_number,
                    fields: row.fields.clone(),
                    violations: outcome.violations,
                    metadata: row.metadata.clone(),
                });
            }
        }

        info!(
            dataset = %key,
            total = report.total(),
            valid = report.valid.len(),
            invalid = report.rejected.len(),
            warnings = report.warnings,
            "dataset validated"
        );
        report
    }
}

/// Entities whose ids `kind` refers to.
fn referenced_entities(kind: EntityKind) -> &'static [EntityKind] {
    match kind {
        EntityKind::MenuItem => &[EntityKind::MenuCategory],
        EntityKind::Order => &[EntityKind::Customer, EntityKind::MenuItem],
        EntityKind::Customer | EntityKind::MenuCategory | EntityKind::Ingredient => &[],
    }
}

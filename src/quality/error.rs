// ==========================================
// Coffee ETL - quality engine errors
// ==========================================
// Rule rejections are values (RuleOutcome), never errors.
// Only building the rule set can fail.
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QualityError {
    #[error("rule pattern failed to compile ({name}): {source}")]
    PatternCompile {
        name: &'static str,
        #[source]
        source: regex::Error,
    },
}

pub type QualityResult<T> = Result<T, QualityError>;

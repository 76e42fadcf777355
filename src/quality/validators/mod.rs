// ==========================================
// Coffee ETL - per-shape validators
// ==========================================
// One validator per record shape. Every validator runs its
// full battery of field checks and returns all violations.
// ==========================================

mod customer;
mod ingredient;
mod menu_category;
mod menu_item;
mod order;

pub use customer::CustomerValidator;
pub use ingredient::IngredientValidator;
pub use menu_category::MenuCategoryValidator;
pub use menu_item::{MenuItemFileValidator, MenuItemRelationalValidator};
pub use order::OrderValidator;

use crate::domain::{Record, RecordShape};
use crate::quality::context::ValidationContext;
use crate::quality::patterns::Patterns;
use crate::quality::references::ReferenceSets;
use crate::quality::violation::Violation;
use chrono::NaiveDateTime;

/// Everything a validator may read besides the record itself.
pub struct RuleEnv<'a> {
    pub patterns: &'a Patterns,
    pub context: &'a ValidationContext,
    pub references: &'a ReferenceSets,
    /// Upper bound for "not in the future" checks.
    pub now: NaiveDateTime,
}

pub trait EntityValidator: Send + Sync {
    fn shape(&self) -> RecordShape;

    fn check(&self, record: &Record, env: &RuleEnv<'_>) -> Vec<Violation>;
}

/// Field value as `Option<&str>`, the form every rule takes.
pub(crate) fn field<'r>(record: &'r Record, name: &str) -> Option<&'r str> {
    record.get(name).map(String::as_str)
}

/// The built-in validator set, one per shape.
pub fn builtin() -> Vec<Box<dyn EntityValidator>> {
    vec![
        Box::new(CustomerValidator),
        Box::new(OrderValidator),
        Box::new(MenuItemFileValidator),
        Box::new(MenuItemRelationalValidator),
        Box::new(MenuCategoryValidator),
        Box::new(IngredientValidator),
    ]
}

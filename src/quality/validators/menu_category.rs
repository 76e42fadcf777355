// menu_category: id, ten_loai, mo_ta (optional)

use super::{field, EntityValidator, RuleEnv};
use crate::domain::{Record, RecordShape};
use crate::quality::field_rules::{FieldChecks, IdRule, TextRule};
use crate::quality::rules_config::{CATEGORY_NAME_MAX, CATEGORY_NAME_MIN, DESCRIPTION_MAX};
use crate::quality::violation::Violation;

pub struct MenuCategoryValidator;

impl EntityValidator for MenuCategoryValidator {
    fn shape(&self) -> RecordShape {
        RecordShape::MenuCategory
    }

    fn check(&self, record: &Record, env: &RuleEnv<'_>) -> Vec<Violation> {
        let mut checks = FieldChecks::new(env.patterns);

        checks.identifier("id", field(record, "id"), IdRule::UNIQUE, env.context);
        checks.text(
            "ten_loai",
            field(record, "ten_loai"),
            TextRule::product(CATEGORY_NAME_MIN, CATEGORY_NAME_MAX),
        );
        checks.optional_text("mo_ta", field(record, "mo_ta"), TextRule::plain(0, DESCRIPTION_MAX));

        checks.into_violations()
    }
}

// ingredient: id, ten_nguyen_lieu, so_luong, don_vi, nha_cung_cap (optional)

use super::{field, EntityValidator, RuleEnv};
use crate::domain::{Record, RecordShape};
use crate::quality::field_rules::{FieldChecks, IdRule, NumberRule, TextRule};
use crate::quality::rules_config::{
    INGREDIENT_NAME_MAX, PRODUCT_NAME_MIN, SUPPLIER_MAX, SUPPLIER_MIN, UNIT_MAX, UNIT_MIN,
};
use crate::quality::violation::Violation;

const QUANTITY: NumberRule = NumberRule {
    allow_zero: true,
    max: None,
};

pub struct IngredientValidator;

impl EntityValidator for IngredientValidator {
    fn shape(&self) -> RecordShape {
        RecordShape::Ingredient
    }

    fn check(&self, record: &Record, env: &RuleEnv<'_>) -> Vec<Violation> {
        let mut checks = FieldChecks::new(env.patterns);

        checks.identifier("id", field(record, "id"), IdRule::UNIQUE, env.context);
        checks.text(
            "ten_nguyen_lieu",
            field(record, "ten_nguyen_lieu"),
            TextRule::product(PRODUCT_NAME_MIN, INGREDIENT_NAME_MAX),
        );
        checks.number("so_luong", field(record, "so_luong"), QUANTITY);
        checks.text(
            "don_vi",
            field(record, "don_vi"),
            TextRule {
                reject_test_keywords: false,
                ..TextRule::plain(UNIT_MIN, UNIT_MAX)
            },
        );
        checks.optional_text(
            "nha_cung_cap",
            field(record, "nha_cung_cap"),
            TextRule::plain(SUPPLIER_MIN, SUPPLIER_MAX),
        );

        checks.into_violations()
    }
}

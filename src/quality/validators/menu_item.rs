// menu_item comes in two shapes:
// - file:       id (optional), ten_san_pham, gia, loai (category name)
// - relational: id, ten_mon, loai_id (category id), gia

use super::{field, EntityValidator, RuleEnv};
use crate::domain::{EntityKind, Record, RecordShape};
use crate::quality::field_rules::{is_blank, Charset, FieldChecks, IdRule, NumberRule, TextRule};
use crate::quality::rules_config::{
    CATEGORY_NAME_MAX, CATEGORY_NAME_MIN, MAX_CATEGORY_ID, MAX_PRICE, PRODUCT_NAME_MAX,
    PRODUCT_NAME_MIN,
};
use crate::quality::violation::Violation;

const PRICE: NumberRule = NumberRule {
    allow_zero: false,
    max: Some(MAX_PRICE),
};

pub struct MenuItemFileValidator;

impl EntityValidator for MenuItemFileValidator {
    fn shape(&self) -> RecordShape {
        RecordShape::MenuItemFile
    }

    fn check(&self, record: &Record, env: &RuleEnv<'_>) -> Vec<Violation> {
        let mut checks = FieldChecks::new(env.patterns);

        let id = field(record, "id");
        if !is_blank(id) {
            checks.identifier("id", id, IdRule::UNIQUE, env.context);
        }
        checks.text(
            "ten_san_pham",
            field(record, "ten_san_pham"),
            TextRule {
                charset: Charset::ProductNoDigits,
                ..TextRule::plain(PRODUCT_NAME_MIN, PRODUCT_NAME_MAX)
            },
        );
        checks.number("gia", field(record, "gia"), PRICE);
        checks.text(
            "loai",
            field(record, "loai"),
            TextRule::plain(CATEGORY_NAME_MIN, CATEGORY_NAME_MAX),
        );

        checks.into_violations()
    }
}

pub struct MenuItemRelationalValidator;

impl EntityValidator for MenuItemRelationalValidator {
    fn shape(&self) -> RecordShape {
        RecordShape::MenuItemRelational
    }

    fn check(&self, record: &Record, env: &RuleEnv<'_>) -> Vec<Violation> {
        let mut checks = FieldChecks::new(env.patterns);

        checks.identifier("id", field(record, "id"), IdRule::UNIQUE, env.context);
        checks.text(
            "ten_mon",
            field(record, "ten_mon"),
            TextRule::product(PRODUCT_NAME_MIN, PRODUCT_NAME_MAX),
        );
        let category_id = checks.bounded_integer("loai_id", field(record, "loai_id"), 1, MAX_CATEGORY_ID);
        checks.foreign_key(
            "loai_id",
            category_id,
            env.references.get(EntityKind::MenuCategory),
            EntityKind::MenuCategory.as_str(),
        );
        checks.number("gia", field(record, "gia"), PRICE);

        checks.into_violations()
    }
}

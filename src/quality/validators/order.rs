// order: id, khach_hang_id, mon_id, so_luong, ngay_dat, trang_thai

use super::{field, EntityValidator, RuleEnv};
use crate::domain::{EntityKind, Record, RecordShape};
use crate::quality::field_rules::{FieldChecks, IdRule};
use crate::quality::rules_config::{MAX_ORDER_QUANTITY, MIN_ORDER_YEAR, ORDER_STATUSES};
use crate::quality::violation::Violation;

/// Reference ids are checked for format and existence, never for uniqueness.
const REFERENCE_ID: IdRule = IdRule {
    placeholders: &[],
    max: None,
    unique: false,
};

pub struct OrderValidator;

impl EntityValidator for OrderValidator {
    fn shape(&self) -> RecordShape {
        RecordShape::Order
    }

    fn check(&self, record: &Record, env: &RuleEnv<'_>) -> Vec<Violation> {
        let mut checks = FieldChecks::new(env.patterns);

        checks.identifier("id", field(record, "id"), IdRule::UNIQUE, env.context);

        let customer_id =
            checks.identifier("khach_hang_id", field(record, "khach_hang_id"), REFERENCE_ID, env.context);
        checks.foreign_key(
            "khach_hang_id",
            customer_id,
            env.references.get(EntityKind::Customer),
            EntityKind::Customer.as_str(),
        );

        let item_id = checks.identifier("mon_id", field(record, "mon_id"), REFERENCE_ID, env.context);
        checks.foreign_key(
            "mon_id",
            item_id,
            env.references.get(EntityKind::MenuItem),
            EntityKind::MenuItem.as_str(),
        );

        checks.bounded_integer("so_luong", field(record, "so_luong"), 1, MAX_ORDER_QUANTITY);
        checks.date("ngay_dat", field(record, "ngay_dat"), env.now, MIN_ORDER_YEAR);
        checks.status("trang_thai", field(record, "trang_thai"), &ORDER_STATUSES);

        checks.into_violations()
    }
}

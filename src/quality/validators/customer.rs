// customer: id, ho_ten, sdt, thanh_pho, email

use super::{field, EntityValidator, RuleEnv};
use crate::domain::{Record, RecordShape};
use crate::quality::field_rules::{FieldChecks, IdRule, TextRule};
use crate::quality::rules_config::{
    MAX_CUSTOMER_ID, PERSON_NAME_MAX, PERSON_NAME_MIN, PLACEHOLDER_IDS, VALID_CITIES,
};
use crate::quality::violation::Violation;

const CUSTOMER_ID: IdRule = IdRule {
    placeholders: &PLACEHOLDER_IDS,
    max: Some(MAX_CUSTOMER_ID),
    unique: true,
};

pub struct CustomerValidator;

impl EntityValidator for CustomerValidator {
    fn shape(&self) -> RecordShape {
        RecordShape::Customer
    }

    fn check(&self, record: &Record, env: &RuleEnv<'_>) -> Vec<Violation> {
        let mut checks = FieldChecks::new(env.patterns);

        checks.identifier("id", field(record, "id"), CUSTOMER_ID, env.context);
        checks.text(
            "ho_ten",
            field(record, "ho_ten"),
            TextRule::person_name(PERSON_NAME_MIN, PERSON_NAME_MAX),
        );
        checks.phone("sdt", field(record, "sdt"));
        checks.city("thanh_pho", field(record, "thanh_pho"), &VALID_CITIES);
        checks.email("email", field(record, "email"), env.context);

        checks.into_violations()
    }
}

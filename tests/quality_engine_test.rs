// ==========================================
// Quality engine integration tests
// ==========================================
// Row classification across a run: duplicates, mandatory
// fields, foreign keys, placeholders, dataset partitioning.
// ==========================================


use coffee_etl::domain::{DatasetKey, EntityKind, Provenance, Record, RecordShape};
use coffee_etl::quality::ViolationCode;
use coffee_etl::transform::{transform_row, ColumnValue};
use coffee_etl::{ForeignKeyMode, QualityEngine, ReferenceSets, RuleRegistry};
use test_helpers::{captured, customer_row, fixed_now, hundred_customers, record, CUSTOMER_HEADER};

fn engine(mode: ForeignKeyMode) -> QualityEngine {
    QualityEngine::new(RuleRegistry::new().expect("registry"), mode).with_clock(fixed_now())
}

fn order(id: &str, customer: &str, item: &str) -> Record {
    record(&[
        ("id", id),
        ("khach_hang_id", customer),
        ("mon_id", item),
        ("so_luong", "2"),
        ("ngay_dat", "2024-03-15"),
        ("trang_thai", "Hoàn thành"),
    ])
}

#[test]
fn test_accepted_row_is_rejected_on_revalidation() {
    let mut engine = engine(ForeignKeyMode::Soft);
    let rows = vec![
        customer_row("1", "Nguyễn Văn An", "0905123456", "Đà Nẵng", "an@gmail.com"),
        record(&[("id", "2"), ("ten_loai", "Cà phê")]),
    ];

    let first = engine.validate_record(EntityKind::Customer, Provenance::File, &rows[0]);
    assert!(first.is_valid, "first pass: {}", first.joined_messages());

    let again = engine.validate_record(EntityKind::Customer, Provenance::File, &rows[0]);
    assert!(!again.is_valid);
    assert!(again.has_violation("id", ViolationCode::Duplicate));
    assert!(again.has_violation("email", ViolationCode::Duplicate));

    let category = engine.validate_record(EntityKind::MenuCategory, Provenance::Relational, &rows[1]);
    assert!(category.is_valid);
    let category_again = engine.validate_record(EntityKind::MenuCategory, Provenance::File, &rows[1]);
    assert!(category_again.has_violation("id", ViolationCode::Duplicate));
}

#[test]
fn test_missing_mandatory_field_is_named() {
    let mut engine = engine(ForeignKeyMode::Soft);
    for shape in [
        RecordShape::Customer,
        RecordShape::Order,
        RecordShape::MenuItemFile,
        RecordShape::MenuItemRelational,
        RecordShape::MenuCategory,
        RecordShape::Ingredient,
    ] {
        for missing in shape.required_fields() {
            let mut row: Record = shape
                .required_fields()
                .iter()
                .map(|f| (f.to_string(), "x".to_string()))
                .collect();
            row.remove(*missing);
            let provenance = match shape {
                RecordShape::MenuItemFile => Provenance::File,
                _ => Provenance::Relational,
            };
            let outcome = engine.validate_record(shape.entity(), provenance, &row);
            assert!(!outcome.is_valid);
            assert!(
                outcome.has_violation(missing, ViolationCode::Blank),
                "{:?} without {} -> {}",
                shape,
                missing,
                outcome.joined_messages()
            );
        }
    }
}

#[test]
fn test_duplicate_customer_id_in_one_run() {
    let mut engine = engine(ForeignKeyMode::Soft);
    let rows = captured(
        vec![
            customer_row("1", "Nguyễn Văn An", "0905123456", "Đà Nẵng", "an@gmail.com"),
            customer_row("1", "Trần Thị Bình", "0912345678", "Hà Nội", "binh@gmail.com"),
        ],
        "khachhang.csv",
    );

    let report = engine.validate_dataset(DatasetKey::new(EntityKind::Customer, Provenance::File), &rows);
    assert_eq!(report.valid.len(), 1);
    assert_eq!(report.valid[0].row_number, 1);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].violations.len(), 1);
    assert_eq!(report.rejected[0].violations[0].field, "id");
    assert_eq!(report.rejected[0].violations[0].code, ViolationCode::Duplicate);
}

#[test]
fn test_file_menu_item_uses_category_name() {
    let mut engine = engine(ForeignKeyMode::RunScoped);
    let row = record(&[("ten_san_pham", "Cà phê sữa"), ("gia", "29000"), ("loai", "Đồ uống")]);

    let outcome = engine.validate_record(EntityKind::MenuItem, Provenance::File, &row);
    assert!(outcome.is_valid, "{}", outcome.joined_messages());

    let transformed = transform_row(RecordShape::MenuItemFile, &outcome.normalized_fields, fixed_now());
    assert_eq!(transformed.get("loai_id"), Some(&ColumnValue::Null));
    assert_eq!(
        transformed.get("ten_loai"),
        Some(&ColumnValue::Text("Đồ uống".to_string()))
    );
    assert_eq!(transformed.get("gia"), Some(&ColumnValue::Real(29000.0)));
}

#[test]
fn test_order_with_unknown_item_is_rejected() {
    let references = ReferenceSets::new()
        .with(EntityKind::MenuItem, [1, 2, 3])
        .with(EntityKind::Customer, [7]);
    let mut engine = engine(ForeignKeyMode::Soft).with_references(references);

    let unknown = engine.validate_record(EntityKind::Order, Provenance::File, &order("1", "7", "999"));
    assert!(!unknown.is_valid);
    assert!(unknown.has_violation("mon_id", ViolationCode::UnknownReference));
    assert!(!unknown.has_violation("mon_id", ViolationCode::NotPositiveInteger));

    let known = engine.validate_record(EntityKind::Order, Provenance::File, &order("2", "7", "3"));
    assert!(known.is_valid, "{}", known.joined_messages());
}

#[test]
fn test_order_date_with_non_ascii_digit_is_rejected() {
    let mut engine = engine(ForeignKeyMode::Soft);
    let mut row = order("1", "7", "3");
    row.insert("ngay_dat".to_string(), "2024-01-01 08:15:0\u{0660}".to_string());

    let outcome = engine.validate_record(EntityKind::Order, Provenance::File, &row);
    assert!(!outcome.is_valid);
    assert!(outcome.has_violation("ngay_dat", ViolationCode::DateFormat));

    let rows = captured(vec![row, order("2", "7", "3")], "dathang.csv");
    let report = engine.validate_dataset(DatasetKey::new(EntityKind::Order, Provenance::File), &rows);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.valid.len(), 1);
}

#[test]
fn test_run_scoped_references_follow_accepted_rows() {
    let mut engine = engine(ForeignKeyMode::RunScoped);
    let customer = customer_row("7", "Nguyễn Văn An", "0905123456", "Đà Nẵng", "an@gmail.com");
    let item = record(&[("id", "3"), ("ten_mon", "Bạc xỉu"), ("loai_id", "1"), ("gia", "29000")]);
    let category = record(&[("id", "1"), ("ten_loai", "Cà phê")]);

    assert!(engine.validate_record(EntityKind::MenuCategory, Provenance::Relational, &category).is_valid);
    assert!(engine.validate_record(EntityKind::Customer, Provenance::Relational, &customer).is_valid);
    assert!(engine.validate_record(EntityKind::MenuItem, Provenance::Relational, &item).is_valid);

    assert!(engine.validate_record(EntityKind::Order, Provenance::Relational, &order("1", "7", "3")).is_valid);
    let stray = engine.validate_record(EntityKind::Order, Provenance::Relational, &order("2", "8", "3"));
    assert!(stray.has_violation("khach_hang_id", ViolationCode::UnknownReference));
}

#[test]
fn test_placeholder_phone_is_rejected() {
    let mut engine = engine(ForeignKeyMode::Soft);
    let row = customer_row("1", "Nguyễn Văn An", "0000000000", "Đà Nẵng", "an@gmail.com");

    let outcome = engine.validate_record(EntityKind::Customer, Provenance::File, &row);
    assert!(!outcome.is_valid);
    assert!(outcome.has_violation("sdt", ViolationCode::Placeholder));
    assert!(!outcome.has_violation("sdt", ViolationCode::PhoneFormat));
}

#[test]
fn test_hundred_rows_with_seven_violations() {
    let mut engine = engine(ForeignKeyMode::Soft);
    let rows: Vec<Record> = hundred_customers()
        .into_iter()
        .map(|values| {
            CUSTOMER_HEADER
                .iter()
                .map(|h| h.to_string())
                .zip(values)
                .collect()
        })
        .collect();
    let rows = captured(rows, "khachhang.csv");

    let report = engine.validate_dataset(DatasetKey::new(EntityKind::Customer, Provenance::File), &rows);
    assert_eq!(report.valid.len(), 93);
    assert_eq!(report.rejected.len(), 7);
    assert_eq!(report.total(), rows.len());

    let rejected_rows: Vec<usize> = report.rejected.iter().map(|r| r.row_number).collect();
    assert_eq!(rejected_rows, vec![10, 20, 30, 40, 50, 60, 70]);
    assert!(report.rejected.iter().all(|r| !r.reasons().is_empty()));
}

#[test]
fn test_transform_is_pure_apart_from_timestamp() {
    let mut engine = engine(ForeignKeyMode::Soft);
    let row = customer_row("1", "Nguyễn  Văn An", "0905123456", "Đà Nẵng", "A@X.com");
    let spaced = engine.validate_record(EntityKind::Customer, Provenance::File, &row);
    assert!(spaced.has_violation("ho_ten", ViolationCode::MultipleSpaces));

    let row = customer_row("1", "Nguyễn Văn An", "0905123456", "Đà Nẵng", "A@X.com");
    let outcome = engine.validate_record(EntityKind::Customer, Provenance::File, &row);
    assert!(outcome.is_valid, "{}", outcome.joined_messages());

    let a = transform_row(RecordShape::Customer, &outcome.normalized_fields, fixed_now());
    let b = transform_row(RecordShape::Customer, &outcome.normalized_fields, fixed_now());
    assert_eq!(a, b);
    assert_eq!(a.get("email"), Some(&ColumnValue::Text("a@x.com".to_string())));

    let later = fixed_now() + chrono::Duration::hours(1);
    let c = transform_row(RecordShape::Customer, &outcome.normalized_fields, later);
    let len = a.values.len();
    assert_eq!(a.values[..len - 1], c.values[..len - 1]);
    assert_ne!(a.values[len - 1], c.values[len - 1]);
}

#[test]
fn test_custom_rule_adds_violation() {
    let mut engine = engine(ForeignKeyMode::Soft);
    engine.registry_mut().add_custom_rule(
        EntityKind::Customer,
        "gmail_only",
        "email must be a gmail address",
        |r: &Record| r.get("email").map(|e| e.ends_with("@gmail.com")).unwrap_or(false),
    );

    let row = customer_row("1", "Nguyễn Văn An", "0905123456", "Đà Nẵng", "an@yahoo.com");
    let outcome = engine.validate_record(EntityKind::Customer, Provenance::File, &row);
    assert!(!outcome.is_valid);
    assert!(outcome.has_violation("gmail_only", ViolationCode::Custom));
}

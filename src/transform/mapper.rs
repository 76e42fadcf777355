// ==========================================
// Coffee ETL - row transformer
// ==========================================
// Validated record -> destination columns: key renaming,
// type coercion, whitespace normalization, timestamp injection.
// Input is assumed to have passed validation; a value that
// still fails to coerce becomes a safe default with a warning.
// ==========================================

use crate::domain::{EntityKind, Record, RecordShape};
use crate::quality::patterns::normalize_whitespace;
use crate::transform::columns::{entity_columns, ColumnSpec, ColumnValue};
use chrono::{NaiveDate, NaiveDateTime};
use tracing::warn;

/// Format of the injected `extract_time` column.
pub const EXTRACT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Destination row, values in `entity_columns(entity)` order.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedRow {
    pub entity: EntityKind,
    pub values: Vec<ColumnValue>,
}

impl TransformedRow {
    pub fn columns(&self) -> &'static [ColumnSpec] {
        entity_columns(self.entity)
    }

    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.columns()
            .iter()
            .position(|c| c.name == column)
            .and_then(|i| self.values.get(i))
    }
}

/// Map one validated record into its entity's column layout.
///
/// Pure except for `extract_time`, which the caller injects.
pub fn transform_row(shape: RecordShape, record: &Record, extract_time: NaiveDateTime) -> TransformedRow {
    let m = FieldReader { record, shape };
    let mut values = match shape {
        RecordShape::Customer => vec![
            m.integer("id"),
            ColumnValue::Text(normalize_whitespace(m.text("ho_ten"))),
            ColumnValue::Text(m.text("sdt").chars().filter(|c| c.is_ascii_digit()).collect()),
            ColumnValue::Text(normalize_whitespace(m.text("thanh_pho"))),
            ColumnValue::Text(m.text("email").to_lowercase()),
        ],
        RecordShape::MenuCategory => vec![
            m.integer("id"),
            ColumnValue::Text(normalize_whitespace(m.text("ten_loai"))),
            ColumnValue::text_or_null(m.text("mo_ta")),
        ],
        RecordShape::MenuItemFile => vec![
            m.optional_integer("id"),
            ColumnValue::Text(normalize_whitespace(m.text("ten_san_pham"))),
            ColumnValue::Null,
            ColumnValue::Text(normalize_whitespace(m.text("loai"))),
            m.real("gia"),
        ],
        RecordShape::MenuItemRelational => vec![
            m.integer("id"),
            ColumnValue::Text(normalize_whitespace(m.text("ten_mon"))),
            m.optional_integer("loai_id"),
            ColumnValue::Null,
            m.real("gia"),
        ],
        RecordShape::Ingredient => vec![
            m.integer("id"),
            ColumnValue::Text(normalize_whitespace(m.text("ten_nguyen_lieu"))),
            m.real("so_luong"),
            ColumnValue::Text(m.text("don_vi").to_string()),
            m.optional_real("gia"),
            ColumnValue::text_or_null(m.text("nha_cung_cap")),
            m.optional_date("ngay_nhap"),
        ],
        RecordShape::Order => vec![
            m.integer("id"),
            m.integer("khach_hang_id"),
            m.integer("mon_id"),
            m.integer("so_luong"),
            m.optional_date("ngay_dat"),
            ColumnValue::Text(normalize_whitespace(m.text("trang_thai"))),
        ],
    };
    values.push(ColumnValue::Text(extract_time.format(EXTRACT_TIME_FORMAT).to_string()));

    TransformedRow {
        entity: shape.entity(),
        values,
    }
}

struct FieldReader<'a> {
    record: &'a Record,
    shape: RecordShape,
}

impl<'a> FieldReader<'a> {
    fn text(&self, field: &str) -> &'a str {
        self.record.get(field).map(|v| v.trim()).unwrap_or("")
    }

    fn coercion_failed(&self, field: &str, value: &str, target: &str) {
        warn!(
            shape = ?self.shape,
            field,
            value,
            target,
            "coercion failed, using default"
        );
    }

    fn integer(&self, field: &str) -> ColumnValue {
        let raw = self.text(field);
        match raw.parse::<i64>() {
            Ok(v) => ColumnValue::Integer(v),
            Err(_) => {
                self.coercion_failed(field, raw, "integer");
                ColumnValue::Integer(0)
            }
        }
    }

    fn optional_integer(&self, field: &str) -> ColumnValue {
        if self.text(field).is_empty() {
            ColumnValue::Null
        } else {
            self.integer(field)
        }
    }

    fn real(&self, field: &str) -> ColumnValue {
        let raw = self.text(field);
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => ColumnValue::Real(v),
            _ => {
                self.coercion_failed(field, raw, "real");
                ColumnValue::Real(0.0)
            }
        }
    }

    fn optional_real(&self, field: &str) -> ColumnValue {
        if self.text(field).is_empty() {
            ColumnValue::Null
        } else {
            self.real(field)
        }
    }

    /// `YYYY-MM-DD` stays a date; a datetime becomes `YYYY-MM-DD HH:MM:SS`.
    fn optional_date(&self, field: &str) -> ColumnValue {
        let raw = self.text(field);
        if raw.is_empty() {
            return ColumnValue::Null;
        }
        if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return ColumnValue::Text(d.format("%Y-%m-%d").to_string());
        }
        let head: String = raw.chars().take(19).collect::<String>().replacen('T', " ", 1);
        match NaiveDateTime::parse_from_str(&head, "%Y-%m-%d %H:%M:%S") {
            Ok(dt) => ColumnValue::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            Err(_) => {
                self.coercion_failed(field, raw, "date");
                ColumnValue::Null
            }
        }
    }
}

// ==========================================
// Coffee ETL - destination column model
// ==========================================
// One column layout per entity. Both provenance partitions of
// an entity share the layout; menu_item fills the columns its
// shape does not carry with NULL.
// ==========================================

use crate::domain::EntityKind;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Real,
    Text,
}

impl SqlType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub nullable: bool,
}

const fn col(name: &'static str, sql_type: SqlType, nullable: bool) -> ColumnSpec {
    ColumnSpec {
        name,
        sql_type,
        nullable,
    }
}

/// Injected by the transformer for every entity.
pub const EXTRACT_TIME_COLUMN: &str = "extract_time";

const CUSTOMER_COLUMNS: &[ColumnSpec] = &[
    col("customer_id", SqlType::Integer, false),
    col("ho_ten", SqlType::Text, false),
    col("sdt", SqlType::Text, false),
    col("thanh_pho", SqlType::Text, false),
    col("email", SqlType::Text, false),
    col(EXTRACT_TIME_COLUMN, SqlType::Text, false),
];

const MENU_CATEGORY_COLUMNS: &[ColumnSpec] = &[
    col("ma_loai", SqlType::Integer, false),
    col("ten_loai", SqlType::Text, false),
    col("mo_ta", SqlType::Text, true),
    col(EXTRACT_TIME_COLUMN, SqlType::Text, false),
];

const MENU_ITEM_COLUMNS: &[ColumnSpec] = &[
    col("ma_mon", SqlType::Integer, true),
    col("ten_mon", SqlType::Text, false),
    col("loai_id", SqlType::Integer, true),
    col("ten_loai", SqlType::Text, true),
    col("gia", SqlType::Real, false),
    col(EXTRACT_TIME_COLUMN, SqlType::Text, false),
];

const INGREDIENT_COLUMNS: &[ColumnSpec] = &[
    col("ma_nguyen_lieu", SqlType::Integer, false),
    col("ten_nguyen_lieu", SqlType::Text, false),
    col("so_luong", SqlType::Real, false),
    col("don_vi", SqlType::Text, false),
    col("gia", SqlType::Real, true),
    col("nha_cung_cap", SqlType::Text, true),
    col("ngay_nhap", SqlType::Text, true),
    col(EXTRACT_TIME_COLUMN, SqlType::Text, false),
];

const ORDER_COLUMNS: &[ColumnSpec] = &[
    col("ma_don_hang", SqlType::Integer, false),
    col("khach_hang_id", SqlType::Integer, false),
    col("mon_id", SqlType::Integer, false),
    col("so_luong", SqlType::Integer, false),
    col("ngay_dat", SqlType::Text, false),
    col("trang_thai", SqlType::Text, false),
    col(EXTRACT_TIME_COLUMN, SqlType::Text, false),
];

pub fn entity_columns(kind: EntityKind) -> &'static [ColumnSpec] {
    match kind {
        EntityKind::Customer => CUSTOMER_COLUMNS,
        EntityKind::MenuCategory => MENU_CATEGORY_COLUMNS,
        EntityKind::MenuItem => MENU_ITEM_COLUMNS,
        EntityKind::Ingredient => INGREDIENT_COLUMNS,
        EntityKind::Order => ORDER_COLUMNS,
    }
}

/// A typed destination cell.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl ColumnValue {
    pub fn text_or_null(value: &str) -> Self {
        if value.is_empty() {
            ColumnValue::Null
        } else {
            ColumnValue::Text(value.to_string())
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ColumnValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl ToSql for ColumnValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            ColumnValue::Null => ToSqlOutput::Owned(SqlValue::Null),
            ColumnValue::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            ColumnValue::Real(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            ColumnValue::Text(s) => ToSqlOutput::Borrowed(s.as_str().into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_entity_carries_extract_time_last() {
        for kind in EntityKind::ALL {
            let cols = entity_columns(kind);
            assert_eq!(cols.last().map(|c| c.name), Some(EXTRACT_TIME_COLUMN));
        }
    }

    #[test]
    fn test_menu_item_foreign_key_is_nullable() {
        let loai_id = entity_columns(EntityKind::MenuItem)
            .iter()
            .find(|c| c.name == "loai_id")
            .unwrap();
        assert!(loai_id.nullable);
        assert_eq!(loai_id.sql_type, SqlType::Integer);
    }
}

// ==========================================
// Coffee ETL - dataset discovery
// ==========================================
// Flat files: static file -> entity mapping.
// Relational tables: normalized-name lookup; unmapped names
// pass through as their normalized form.
// ==========================================

use crate::domain::{queue_name_for, EntityKind};
use std::fmt;
use std::path::{Path, PathBuf};

/// Entity a source dataset maps to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DatasetName {
    Known(EntityKind),
    /// No entity claims this table; carries the normalized name.
    Unmapped(String),
}

impl DatasetName {
    pub fn as_str(&self) -> &str {
        match self {
            DatasetName::Known(kind) => kind.as_str(),
            DatasetName::Unmapped(name) => name,
        }
    }

    pub fn queue_name(&self) -> String {
        queue_name_for(self.as_str())
    }

    pub fn entity(&self) -> Option<EntityKind> {
        match self {
            DatasetName::Known(kind) => Some(*kind),
            DatasetName::Unmapped(_) => None,
        }
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const TABLE_LOOKUP: [(&str, EntityKind); 21] = [
    ("khachhang", EntityKind::Customer),
    ("khach_hang", EntityKind::Customer),
    ("khach_hang_tbl", EntityKind::Customer),
    ("customer", EntityKind::Customer),
    ("customers", EntityKind::Customer),
    ("loaimon", EntityKind::MenuCategory),
    ("loai_mon", EntityKind::MenuCategory),
    ("loai_mon_tbl", EntityKind::MenuCategory),
    ("menu_category", EntityKind::MenuCategory),
    ("mon", EntityKind::MenuItem),
    ("mon_tbl", EntityKind::MenuItem),
    ("menu_item", EntityKind::MenuItem),
    ("nguyenlieu", EntityKind::Ingredient),
    ("nguyen_lieu", EntityKind::Ingredient),
    ("nguyen_lieu_tbl", EntityKind::Ingredient),
    ("ingredient", EntityKind::Ingredient),
    ("dathang", EntityKind::Order),
    ("dat_hang", EntityKind::Order),
    ("dat_hang_tbl", EntityKind::Order),
    ("order", EntityKind::Order),
    ("orders", EntityKind::Order),
];

/// Lowercase; `-` and spaces become `_`.
pub fn normalize_table_name(name: &str) -> String {
    name.trim().to_lowercase().replace(['-', ' '], "_")
}

pub fn dataset_for_table(table: &str) -> DatasetName {
    let normalized = normalize_table_name(table);
    TABLE_LOOKUP
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, kind)| DatasetName::Known(*kind))
        .unwrap_or(DatasetName::Unmapped(normalized))
}

pub fn is_system_table(table: &str) -> bool {
    let lower = table.to_lowercase();
    lower.starts_with("sqlite_") || lower == "sysdiagrams"
}

/// Flat files of the static mapping that exist under `data_dir`.
pub fn discover_files(data_dir: &Path) -> Vec<(EntityKind, PathBuf)> {
    EntityKind::DEPENDENCY_ORDER
        .into_iter()
        .map(|kind| (kind, data_dir.join(kind.source_file())))
        .filter(|(_, path)| path.is_file())
        .collect()
}

// ==========================================
// Coffee ETL - domain types
// ==========================================
// Closed sets shared by every stage: entity kinds,
// provenance tags and the record shapes they select.
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// EntityKind
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Customer,
    Order,
    MenuItem,
    MenuCategory,
    Ingredient,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Customer,
        EntityKind::Order,
        EntityKind::MenuItem,
        EntityKind::MenuCategory,
        EntityKind::Ingredient,
    ];

    /// Referenced entities come before the entities that point at them.
    pub const DEPENDENCY_ORDER: [EntityKind; 5] = [
        EntityKind::MenuCategory,
        EntityKind::Customer,
        EntityKind::MenuItem,
        EntityKind::Ingredient,
        EntityKind::Order,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Customer => "customer",
            EntityKind::Order => "order",
            EntityKind::MenuItem => "menu_item",
            EntityKind::MenuCategory => "menu_category",
            EntityKind::Ingredient => "ingredient",
        }
    }

    /// Durable queue carrying this entity's messages.
    pub fn queue_name(&self) -> String {
        queue_name_for(self.as_str())
    }

    /// Flat file published for this entity by the static file mapping.
    pub fn source_file(&self) -> &'static str {
        match self {
            EntityKind::Customer => "khachhang.csv",
            EntityKind::Order => "dathang.csv",
            EntityKind::MenuItem => "tensanpham.csv",
            EntityKind::MenuCategory => "loaisanpham.csv",
            EntityKind::Ingredient => "nguyenlieu.csv",
        }
    }

    pub fn from_source_file(file_name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.source_file().eq_ignore_ascii_case(file_name))
    }
}

/// `queue_<name>` for any dataset name, mapped or not.
pub fn queue_name_for(name: &str) -> String {
    format!("queue_{}", name)
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "customer" => Ok(EntityKind::Customer),
            "order" => Ok(EntityKind::Order),
            "menu_item" => Ok(EntityKind::MenuItem),
            "menu_category" => Ok(EntityKind::MenuCategory),
            "ingredient" => Ok(EntityKind::Ingredient),
            other => Err(format!("unknown entity kind: {}", other)),
        }
    }
}

// ==========================================
// Provenance
// ==========================================
// Wire names: file <-> "csv", relational <-> "sql"
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Provenance {
    #[serde(rename = "csv")]
    File,
    #[serde(rename = "sql")]
    Relational,
}

impl Provenance {
    pub const ALL: [Provenance; 2] = [Provenance::File, Provenance::Relational];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::File => "csv",
            Provenance::Relational => "sql",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provenance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "csv" => Ok(Provenance::File),
            "sql" => Ok(Provenance::Relational),
            other => Err(format!("unknown provenance: {}", other)),
        }
    }
}

// ==========================================
// RecordShape
// ==========================================
// menu_item has two structurally different shapes; the
// provenance tag picks one, field presence never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordShape {
    Customer,
    Order,
    MenuItemFile,
    MenuItemRelational,
    MenuCategory,
    Ingredient,
}

impl RecordShape {
    pub fn resolve(kind: EntityKind, provenance: Provenance) -> Self {
        match (kind, provenance) {
            (EntityKind::Customer, _) => RecordShape::Customer,
            (EntityKind::Order, _) => RecordShape::Order,
            (EntityKind::MenuItem, Provenance::File) => RecordShape::MenuItemFile,
            (EntityKind::MenuItem, Provenance::Relational) => RecordShape::MenuItemRelational,
            (EntityKind::MenuCategory, _) => RecordShape::MenuCategory,
            (EntityKind::Ingredient, _) => RecordShape::Ingredient,
        }
    }

    pub fn entity(&self) -> EntityKind {
        match self {
            RecordShape::Customer => EntityKind::Customer,
            RecordShape::Order => EntityKind::Order,
            RecordShape::MenuItemFile | RecordShape::MenuItemRelational => EntityKind::MenuItem,
            RecordShape::MenuCategory => EntityKind::MenuCategory,
            RecordShape::Ingredient => EntityKind::Ingredient,
        }
    }

    /// Fields a record of this shape must carry.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            RecordShape::Customer => &["id", "ho_ten", "sdt", "thanh_pho", "email"],
            RecordShape::Order => &["id", "khach_hang_id", "mon_id", "so_luong", "ngay_dat", "trang_thai"],
            RecordShape::MenuItemFile => &["ten_san_pham", "gia", "loai"],
            RecordShape::MenuItemRelational => &["id", "ten_mon", "loai_id", "gia"],
            RecordShape::MenuCategory => &["id", "ten_loai"],
            RecordShape::Ingredient => &["id", "ten_nguyen_lieu", "so_luong", "don_vi"],
        }
    }
}

// ==========================================
// DatasetKey
// ==========================================
// One (entity, provenance) pair: one queue partition,
// one staging table, one zone file per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DatasetKey {
    pub entity: EntityKind,
    pub provenance: Provenance,
}

impl DatasetKey {
    pub fn new(entity: EntityKind, provenance: Provenance) -> Self {
        Self { entity, provenance }
    }

    pub fn shape(&self) -> RecordShape {
        RecordShape::resolve(self.entity, self.provenance)
    }

    /// `staging_<entity>_<csv|sql>`
    pub fn staging_table(&self) -> String {
        format!("staging_{}_{}", self.entity, self.provenance)
    }

    /// All ten datasets in dependency order, file before relational.
    pub fn all() -> Vec<DatasetKey> {
        EntityKind::DEPENDENCY_ORDER
            .into_iter()
            .flat_map(|e| Provenance::ALL.into_iter().map(move |p| DatasetKey::new(e, p)))
            .collect()
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.entity, self.provenance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_round_trip_through_str() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
        assert!("khach_hang".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_queue_and_file_names() {
        assert_eq!(EntityKind::MenuItem.queue_name(), "queue_menu_item");
        assert_eq!(EntityKind::Customer.source_file(), "khachhang.csv");
        assert_eq!(
            EntityKind::from_source_file("LOAISANPHAM.csv"),
            Some(EntityKind::MenuCategory)
        );
        assert_eq!(EntityKind::from_source_file("unknown.csv"), None);
    }

    #[test]
    fn test_provenance_wire_names() {
        assert_eq!(serde_json::to_string(&Provenance::File).unwrap(), "\"csv\"");
        assert_eq!(
            serde_json::from_str::<Provenance>("\"sql\"").unwrap(),
            Provenance::Relational
        );
    }

    #[test]
    fn test_menu_item_shape_follows_provenance() {
        assert_eq!(
            RecordShape::resolve(EntityKind::MenuItem, Provenance::File),
            RecordShape::MenuItemFile
        );
        assert_eq!(
            RecordShape::resolve(EntityKind::MenuItem, Provenance::Relational),
            RecordShape::MenuItemRelational
        );
        assert_eq!(
            RecordShape::resolve(EntityKind::Customer, Provenance::File),
            RecordShape::resolve(EntityKind::Customer, Provenance::Relational)
        );
    }

    #[test]
    fn test_dataset_key_names() {
        let key = DatasetKey::new(EntityKind::Order, Provenance::Relational);
        assert_eq!(key.to_string(), "order_sql");
        assert_eq!(key.staging_table(), "staging_order_sql");
        assert_eq!(DatasetKey::all().len(), 10);
        assert_eq!(DatasetKey::all()[0].entity, EntityKind::MenuCategory);
    }
}

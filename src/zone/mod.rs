// ==========================================
// Coffee ETL - zone artifacts (staged mode)
// ==========================================
// raw: as captured; clean: every rule passed;
// error: at least one violation, annotated with reasons.
// ==========================================

pub mod artifact;
pub mod error;
pub mod layout;

pub use artifact::{read_zone_file, ZoneRow, ZoneWriter};
pub use error::{ZoneError, ZoneResult};
pub use layout::{ZoneKind, ZoneLayout};

// ==========================================
// Coffee ETL - zone layout
// ==========================================
// <staging_root>/{raw,clean,error}/<entity>_<csv|sql>_<run_id>.csv
// ==========================================

use crate::domain::DatasetKey;
use crate::zone::error::ZoneResult;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneKind {
    Raw,
    Clean,
    Error,
}

impl ZoneKind {
    pub const ALL: [ZoneKind; 3] = [ZoneKind::Raw, ZoneKind::Clean, ZoneKind::Error];

    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneKind::Raw => "raw",
            ZoneKind::Clean => "clean",
            ZoneKind::Error => "error",
        }
    }
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneLayout {
    root: PathBuf,
}

impl ZoneLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn zone_dir(&self, kind: ZoneKind) -> PathBuf {
        self.root.join(kind.as_str())
    }

    pub fn file_path(&self, kind: ZoneKind, key: DatasetKey, run_id: &str) -> PathBuf {
        self.zone_dir(kind).join(format!("{}_{}.csv", key, run_id))
    }

    pub fn ensure_dirs(&self) -> ZoneResult<()> {
        for kind in ZoneKind::ALL {
            std::fs::create_dir_all(self.zone_dir(kind))?;
        }
        Ok(())
    }

    /// Existing artifacts of one zone for `run_id`, in dependency order.
    pub fn existing_files(&self, kind: ZoneKind, run_id: &str) -> Vec<(DatasetKey, PathBuf)> {
        DatasetKey::all()
            .into_iter()
            .map(|key| (key, self.file_path(kind, key, run_id)))
            .filter(|(_, path)| path.is_file())
            .collect()
    }
}

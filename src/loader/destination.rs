// ==========================================
// Coffee ETL - destination database
// ==========================================
// One SQLite file per run, `DB_<run_id>.sqlite`, under the
// destination directory. The Destination trait is the only
// surface the loader sees: parameterized query, DDL/DML
// execution and a transactional batch insert.
// ==========================================

use crate::db::{configure_sqlite_connection, open_sqlite_connection};
use crate::loader::error::{LoadError, LoadResult};
use crate::perf::install_sqlite_tracing;
use crate::retry::{retry_fixed, RetryPolicy};
use crate::transform::ColumnValue;
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

/// One result row keyed by column name.
pub type QueryRow = BTreeMap<String, ColumnValue>;

#[async_trait]
pub trait Destination: Send + Sync {
    async fn query(&self, sql: &str, params: &[ColumnValue]) -> LoadResult<Vec<QueryRow>>;

    /// DDL/DML; returns affected rows. Multiple statements are allowed without params.
    async fn execute(&self, sql: &str, params: &[ColumnValue]) -> LoadResult<usize>;

    /// Insert `rows` into `table` in one transaction. Any failure rolls the whole batch back.
    async fn insert_batch(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[Vec<ColumnValue>],
    ) -> LoadResult<usize>;
}

/// `DB_<run_id>`
pub fn database_name(run_id: &str) -> String {
    format!("DB_{}", run_id)
}

pub fn database_path(destination_dir: &Path, run_id: &str) -> PathBuf {
    destination_dir.join(format!("{}.sqlite", database_name(run_id)))
}

fn checked_identifier(name: &str) -> LoadResult<&str> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if ok {
        Ok(name)
    } else {
        Err(LoadError::InvalidTable(name.to_string()))
    }
}

fn to_column_value(value: ValueRef<'_>) -> ColumnValue {
    match value {
        ValueRef::Null => ColumnValue::Null,
        ValueRef::Integer(i) => ColumnValue::Integer(i),
        ValueRef::Real(f) => ColumnValue::Real(f),
        ValueRef::Text(t) => ColumnValue::Text(String::from_utf8_lossy(t).to_string()),
        ValueRef::Blob(b) => ColumnValue::Text(String::from_utf8_lossy(b).to_string()),
    }
}

pub struct SqliteDestination {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteDestination {
    /// Open (creating if missing) a destination file.
    pub fn open(path: &Path) -> LoadResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| LoadError::Connection(format!("{}: {}", parent.display(), e)))?;
            }
        }
        let mut conn = open_sqlite_connection(&path.to_string_lossy())
            .map_err(|e| LoadError::Connection(format!("{}: {}", path.display(), e)))?;
        install_sqlite_tracing(&mut conn);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// A fresh database for a new run. An existing `DB_<run_id>` is
    /// refused; replays go through `connect_for_run`.
    pub async fn create_for_run(
        destination_dir: &Path,
        run_id: &str,
        policy: &RetryPolicy,
    ) -> LoadResult<Self> {
        let path = database_path(destination_dir, run_id);
        if path.exists() {
            return Err(LoadError::DatabaseExists(path.display().to_string()));
        }
        Self::connect_for_run(destination_dir, run_id, policy).await
    }

    /// The run's database under `destination_dir`, with fixed-delay retries.
    pub async fn connect_for_run(
        destination_dir: &Path,
        run_id: &str,
        policy: &RetryPolicy,
    ) -> LoadResult<Self> {
        let path = database_path(destination_dir, run_id);
        let existed = path.exists();
        let dest = retry_fixed("destination_connect", policy, || async { Self::open(&path) }).await?;
        info!(
            database = %database_name(run_id),
            path = %path.display(),
            existed,
            "destination database ready"
        );
        Ok(dest)
    }

    pub fn from_connection(conn: Connection) -> LoadResult<Self> {
        configure_sqlite_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn get_conn(&self) -> LoadResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| LoadError::Lock(e.to_string()))
    }
}

#[async_trait]
impl Destination for SqliteDestination {
    async fn query(&self, sql: &str, params: &[ColumnValue]) -> LoadResult<Vec<QueryRow>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let mut rows = stmt.query(params_from_iter(params.iter()))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut map = QueryRow::new();
            for (i, name) in names.iter().enumerate() {
                map.insert(name.clone(), to_column_value(row.get_ref(i)?));
            }
            out.push(map);
        }
        Ok(out)
    }

    async fn execute(&self, sql: &str, params: &[ColumnValue]) -> LoadResult<usize> {
        let conn = self.get_conn()?;
        if params.is_empty() {
            let before = conn.total_changes();
            conn.execute_batch(sql)?;
            return Ok((conn.total_changes() - before) as usize);
        }
        Ok(conn.execute(sql, params_from_iter(params.iter()))?)
    }

    async fn insert_batch(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[Vec<ColumnValue>],
    ) -> LoadResult<usize> {
        let table = checked_identifier(table)?;
        for column in columns {
            checked_identifier(column)?;
        }
        let placeholders = (1..=columns.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders
        );

        let conn = self.get_conn()?;
        // dropped without commit on any early return: rollback
        let tx = conn.unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                if row.len() != columns.len() {
                    return Err(LoadError::ColumnMismatch {
                        table: table.to_string(),
                        expected: columns.len(),
                        actual: row.len(),
                    });
                }
                stmt.execute(params_from_iter(row.iter()))?;
                count += 1;
            }
        }
        tx.commit()?;
        Ok(count)
    }
}

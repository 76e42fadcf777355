// ==========================================
// Coffee ETL - relational source (SQLite)
// ==========================================
// list-tables-in-schema and read-all-rows-of-table.
// SQLite schemas are attached database names ("main" by default).
// ==========================================

use crate::db::open_sqlite_connection;
use crate::source::error::{SourceError, SourceResult};
use crate::source::{RelationalSource, SourceRow};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::{Number, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub struct SqliteSource {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSource {
    pub fn open(path: &Path) -> SourceResult<Self> {
        if !path.exists() {
            return Err(SourceError::FileNotFound(path.display().to_string()));
        }
        let conn = open_sqlite_connection(&path.to_string_lossy())?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn get_conn(&self) -> SourceResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SourceError::Lock(e.to_string()))
    }
}

/// Schema and table names are interpolated into SQL, so only plain identifiers pass.
fn checked_identifier(name: &str) -> SourceResult<&str> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == ' ');
    if ok {
        Ok(name)
    } else {
        Err(SourceError::InvalidIdentifier(name.to_string()))
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).to_string()),
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).to_string()),
    }
}

impl RelationalSource for SqliteSource {
    fn list_tables(&self, schema: &str) -> SourceResult<Vec<String>> {
        let schema = checked_identifier(schema)?;
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT name FROM \"{}\".sqlite_master WHERE type = 'table' ORDER BY name",
            schema
        );
        let mut stmt = conn.prepare(&sql)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn read_table(&self, schema: &str, table: &str) -> SourceResult<Vec<SourceRow>> {
        let schema = checked_identifier(schema)?;
        let table = checked_identifier(table)?;
        let conn = self.get_conn()?;

        let sql = format!("SELECT * FROM \"{}\".\"{}\"", schema, table);
        let mut stmt = conn.prepare(&sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut map = SourceRow::new();
            for (idx, name) in columns.iter().enumerate() {
                map.insert(name.clone(), to_json(row.get_ref(idx)?));
            }
            out.push(map);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SqliteSource {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE mon_tbl (id INTEGER, ten_mon TEXT, loai_id INTEGER, gia REAL);
            INSERT INTO mon_tbl VALUES (1, 'Bạc xỉu', 2, 29000.0);
            INSERT INTO mon_tbl VALUES (2, NULL, 2, 35000.5);
            CREATE TABLE "Khach Hang" (id INTEGER);
            "#,
        )
        .unwrap();
        SqliteSource::from_connection(conn)
    }

    #[test]
    fn test_list_tables() {
        let tables = source().list_tables("main").unwrap();
        assert_eq!(tables, vec!["Khach Hang".to_string(), "mon_tbl".to_string()]);
    }

    #[test]
    fn test_read_table_keeps_types() {
        let rows = source().read_table("main", "mon_tbl").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], Value::from(1));
        assert_eq!(rows[0]["ten_mon"], Value::from("Bạc xỉu"));
        assert_eq!(rows[1]["ten_mon"], Value::Null);
        assert_eq!(rows[1]["gia"], Value::from(35000.5));
    }

    #[test]
    fn test_rejects_injected_identifiers() {
        let err = source().read_table("main", "mon_tbl\"; DROP TABLE x; --").unwrap_err();
        assert!(matches!(err, SourceError::InvalidIdentifier(_)));
    }
}

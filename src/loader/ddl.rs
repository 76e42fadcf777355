// ==========================================
// Coffee ETL - destination DDL
// ==========================================
// Two staging tables per entity (one per provenance) plus the
// load batch ledger. All statements are CREATE IF NOT EXISTS.
// ==========================================

use crate::domain::DatasetKey;
use crate::transform::entity_columns;

pub const LOAD_LEDGER_TABLE: &str = "etl_load_batches";

pub const LOAD_LEDGER_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS etl_load_batches (
    batch_id TEXT PRIMARY KEY,
    table_name TEXT NOT NULL,
    row_count INTEGER NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('loaded', 'failed')),
    error TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)
"#;

/// `CREATE TABLE IF NOT EXISTS` for one staging table.
pub fn staging_table_ddl(key: DatasetKey) -> String {
    let mut lines = vec!["    id INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
    for column in entity_columns(key.entity) {
        let mut line = format!("    {} {}", column.name, column.sql_type.as_sql());
        if !column.nullable {
            line.push_str(" NOT NULL");
        }
        lines.push(line);
    }
    lines.push("    loaded_at TEXT NOT NULL DEFAULT (datetime('now'))".to_string());

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
        key.staging_table(),
        lines.join(",\n")
    )
}

/// DDL for every staging table and the ledger, in one batch.
pub fn full_schema_ddl() -> String {
    let mut statements: Vec<String> = DatasetKey::all().into_iter().map(staging_table_ddl).collect();
    statements.push(LOAD_LEDGER_DDL.trim().to_string());
    statements.join(";\n") + ";"
}

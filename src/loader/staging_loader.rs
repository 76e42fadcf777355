// ==========================================
// Coffee ETL - staging loader
// ==========================================
// Creates the staging schema and bulk-inserts transformed rows
// in fixed-size batches. A failing batch is rolled back and
// left out of the loaded count; later batches still run.
// Every batch, loaded or failed, gets a ledger row.
// ==========================================

use crate::domain::DatasetKey;
use crate::loader::ddl::{full_schema_ddl, LOAD_LEDGER_TABLE};
use crate::loader::destination::Destination;
use crate::loader::error::LoadResult;
use crate::perf::PerfGuard;
use crate::transform::{entity_columns, ColumnValue, TransformedRow};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

pub const DEFAULT_BATCH_SIZE: usize = 1_000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub table: String,
    pub attempted: usize,
    pub loaded: usize,
    pub batches: usize,
    pub failed_batches: usize,
}

pub struct StagingLoader {
    destination: Arc<dyn Destination>,
    batch_size: usize,
}

impl StagingLoader {
    pub fn new(destination: Arc<dyn Destination>, batch_size: usize) -> Self {
        Self {
            destination,
            batch_size: batch_size.max(1),
        }
    }

    pub fn destination(&self) -> &Arc<dyn Destination> {
        &self.destination
    }

    /// Idempotent: every staging table plus the batch ledger.
    pub async fn ensure_schema(&self) -> LoadResult<()> {
        self.destination.execute(&full_schema_ddl(), &[]).await?;
        info!(tables = DatasetKey::all().len(), "staging schema ensured");
        Ok(())
    }

    /// Insert one dataset's rows into its staging table.
    ///
    /// # Returns
    /// Per-dataset counts; batch failures are reported, not raised
    #[instrument(skip(self, rows), fields(dataset = %key, rows = rows.len()))]
    pub async fn load_dataset(&self, key: DatasetKey, rows: &[TransformedRow]) -> LoadResult<LoadReport> {
        let _perf = PerfGuard::new("load_dataset");
        let table = key.staging_table();
        let columns: Vec<&str> = entity_columns(key.entity).iter().map(|c| c.name).collect();
        let mut report = LoadReport {
            table: table.clone(),
            attempted: rows.len(),
            ..Default::default()
        };

        for chunk in rows.chunks(self.batch_size) {
            report.batches += 1;
            let values: Vec<Vec<ColumnValue>> = chunk.iter().map(|r| r.values.clone()).collect();
            match self.destination.insert_batch(&table, &columns, &values).await {
                Ok(n) => {
                    report.loaded += n;
                    self.record_batch(&table, n, None).await;
                }
                Err(e) => {
                    report.failed_batches += 1;
                    error!(
                        table = %table,
                        batch = report.batches,
                        size = chunk.len(),
                        error = %e,
                        "batch rolled back"
                    );
                    self.record_batch(&table, chunk.len(), Some(e.to_string())).await;
                }
            }
        }

        info!(
            table = %table,
            attempted = report.attempted,
            loaded = report.loaded,
            failed_batches = report.failed_batches,
            "dataset loaded"
        );
        Ok(report)
    }

    async fn record_batch(&self, table: &str, rows: usize, error: Option<String>) {
        let status = if error.is_some() { "failed" } else { "loaded" };
        let sql = format!(
            "INSERT INTO {} (batch_id, table_name, row_count, status, error) VALUES (?1, ?2, ?3, ?4, ?5)",
            LOAD_LEDGER_TABLE
        );
        let params = [
            ColumnValue::Text(Uuid::new_v4().to_string()),
            ColumnValue::Text(table.to_string()),
            ColumnValue::Integer(rows as i64),
            ColumnValue::Text(status.to_string()),
            error.map(ColumnValue::Text).unwrap_or(ColumnValue::Null),
        ];
        if let Err(e) = self.destination.execute(&sql, &params).await {
            warn!(table, error = %e, "failed to record load batch");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntityKind, Provenance};
    use crate::loader::destination::SqliteDestination;
    use rusqlite::Connection;

    fn category(id: i64) -> TransformedRow {
        TransformedRow {
            entity: EntityKind::MenuCategory,
            values: vec![
                ColumnValue::Integer(id),
                ColumnValue::Text(format!("Loại {}", id)),
                ColumnValue::Null,
                ColumnValue::Text("2025-01-01 00:00:00".into()),
            ],
        }
    }

    async fn loader(batch_size: usize) -> StagingLoader {
        let dest = SqliteDestination::from_connection(Connection::open_in_memory().unwrap()).unwrap();
        let loader = StagingLoader::new(Arc::new(dest), batch_size);
        loader.ensure_schema().await.unwrap();
        loader
    }

    #[tokio::test]
    async fn test_partial_batch_failure_continues() {
        let loader = loader(2).await;
        let mut bad = category(3);
        bad.values[1] = ColumnValue::Null; // ten_loai is NOT NULL
        let rows = vec![category(1), category(2), bad, category(4), category(5)];

        let key = DatasetKey::new(EntityKind::MenuCategory, Provenance::File);
        let report = loader.load_dataset(key, &rows).await.unwrap();

        assert_eq!(report.batches, 3);
        assert_eq!(report.failed_batches, 1);
        assert_eq!(report.loaded, 3);

        let stored = loader
            .destination()
            .query("SELECT COUNT(*) AS n FROM staging_menu_category_csv", &[])
            .await
            .unwrap();
        assert_eq!(stored[0]["n"], ColumnValue::Integer(3));

        let ledger = loader
            .destination()
            .query(
                "SELECT status, COUNT(*) AS n FROM etl_load_batches GROUP BY status ORDER BY status",
                &[],
            )
            .await
            .unwrap();
        assert_eq!(ledger[0]["status"], ColumnValue::Text("failed".into()));
        assert_eq!(ledger[0]["n"], ColumnValue::Integer(1));
        assert_eq!(ledger[1]["n"], ColumnValue::Integer(2));
    }

    #[tokio::test]
    async fn test_empty_dataset_loads_nothing() {
        let loader = loader(10).await;
        let key = DatasetKey::new(EntityKind::Order, Provenance::Relational);
        let report = loader.load_dataset(key, &[]).await.unwrap();
        assert_eq!(report.loaded, 0);
        assert_eq!(report.batches, 0);
        assert_eq!(report.table, "staging_order_sql");
    }
}

// ==========================================
// Coffee ETL - producer
// ==========================================
// Reads every source dataset, wraps each row with provenance
// and metadata, and publishes it to the entity's queue.
// A source that cannot be read is logged and skipped;
// transport failures abort the stage.
// ==========================================

use crate::broker::error::BrokerResult;
use crate::broker::MessageBroker;
use crate::domain::{DatasetKey, Message, MessageMetadata, Provenance};
use crate::source::{
    dataset_for_table, discover_files, is_system_table, DatasetName, FileSource, RelationalSource,
    SourceRow,
};
use chrono::Local;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// A source dataset that could not be read.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFailure {
    pub origin: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProduceReport {
    /// Messages published per mapped dataset.
    pub produced: BTreeMap<DatasetKey, usize>,
    /// Messages published for tables no entity claims, by normalized name.
    pub unmapped: BTreeMap<String, usize>,
    /// Messages published per queue, the settle target.
    pub queue_counts: BTreeMap<String, usize>,
    pub failures: Vec<SourceFailure>,
}

impl ProduceReport {
    pub fn total_published(&self) -> usize {
        self.queue_counts.values().sum()
    }

    pub fn merge(&mut self, other: ProduceReport) {
        for (k, v) in other.produced {
            *self.produced.entry(k).or_default() += v;
        }
        for (k, v) in other.unmapped {
            *self.unmapped.entry(k).or_default() += v;
        }
        for (k, v) in other.queue_counts {
            *self.queue_counts.entry(k).or_default() += v;
        }
        self.failures.extend(other.failures);
    }

    fn record(&mut self, dataset: &DatasetName, provenance: Provenance, count: usize) {
        match dataset {
            DatasetName::Known(kind) => {
                *self
                    .produced
                    .entry(DatasetKey::new(*kind, provenance))
                    .or_default() += count;
            }
            DatasetName::Unmapped(name) => {
                *self.unmapped.entry(name.clone()).or_default() += count;
            }
        }
        *self.queue_counts.entry(dataset.queue_name()).or_default() += count;
    }
}

pub struct Producer {
    broker: Arc<dyn MessageBroker>,
    run_id: String,
}

impl Producer {
    pub fn new(broker: Arc<dyn MessageBroker>, run_id: impl Into<String>) -> Self {
        Self {
            broker,
            run_id: run_id.into(),
        }
    }

    /// Publish one dataset's rows to its queue.
    ///
    /// # Returns
    /// Number of messages published
    pub async fn publish_rows(
        &self,
        dataset: &DatasetName,
        provenance: Provenance,
        origin: &str,
        rows: Vec<SourceRow>,
    ) -> BrokerResult<usize> {
        let queue = dataset.queue_name();
        self.broker.declare_queue(&queue).await?;

        let metadata = MessageMetadata {
            extract_time: Local::now().naive_local(),
            run_id: self.run_id.clone(),
            origin: origin.to_string(),
        };

        let mut published = 0;
        for data in rows {
            let message = Message {
                source: provenance,
                entity_type: dataset.as_str().to_string(),
                data,
                metadata: metadata.clone(),
            };
            self.broker.publish(&queue, &message.to_bytes()?).await?;
            published += 1;
        }

        info!(
            dataset = %dataset,
            source = %provenance,
            origin,
            queue = %queue,
            published,
            "dataset published"
        );
        Ok(published)
    }

    /// Flat files of the static mapping found under `data_dir`.
    #[instrument(skip(self, source))]
    pub async fn produce_files(
        &self,
        source: &dyn FileSource,
        data_dir: &Path,
    ) -> BrokerResult<ProduceReport> {
        let mut report = ProduceReport::default();
        let files = discover_files(data_dir);
        if files.is_empty() {
            warn!(data_dir = %data_dir.display(), "no source files found");
        }

        for (kind, path) in files {
            let origin = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());

            let rows = match source.read_rows(&path) {
                Ok(rows) => rows,
                Err(e) => {
                    error!(origin = %origin, error = %e, "failed to read source file, skipping");
                    report.failures.push(SourceFailure {
                        origin,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let dataset = DatasetName::Known(kind);
            let count = self
                .publish_rows(&dataset, Provenance::File, &origin, rows)
                .await?;
            report.record(&dataset, Provenance::File, count);
        }

        Ok(report)
    }

    /// Every non-system table of `schema`, mapped through the table-name lookup.
    #[instrument(skip(self, source))]
    pub async fn produce_relational(
        &self,
        source: &dyn RelationalSource,
        schema: &str,
    ) -> BrokerResult<ProduceReport> {
        let mut report = ProduceReport::default();

        let tables = match source.list_tables(schema) {
            Ok(tables) => tables,
            Err(e) => {
                error!(schema, error = %e, "failed to list source tables");
                report.failures.push(SourceFailure {
                    origin: schema.to_string(),
                    error: e.to_string(),
                });
                return Ok(report);
            }
        };

        for table in tables.iter().filter(|t| !is_system_table(t)) {
            let dataset = dataset_for_table(table);
            if let DatasetName::Unmapped(name) = &dataset {
                warn!(table = %table, queue_name = %name, "table not mapped to an entity, publishing as-is");
            }

            let rows = match source.read_table(schema, table) {
                Ok(rows) => rows,
                Err(e) => {
                    error!(table = %table, error = %e, "failed to read source table, skipping");
                    report.failures.push(SourceFailure {
                        origin: table.clone(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let count = self
                .publish_rows(&dataset, Provenance::Relational, table, rows)
                .await?;
            report.record(&dataset, Provenance::Relational, count);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::InMemoryBroker;
    use crate::domain::EntityKind;
    use crate::source::{SourceError, SourceResult};
    use serde_json::json;

    struct FakeTables;

    impl RelationalSource for FakeTables {
        fn list_tables(&self, _schema: &str) -> SourceResult<Vec<String>> {
            Ok(vec![
                "khach_hang_tbl".to_string(),
                "sqlite_sequence".to_string(),
                "Nha Cung Cap".to_string(),
                "broken".to_string(),
            ])
        }

        fn read_table(&self, _schema: &str, table: &str) -> SourceResult<Vec<SourceRow>> {
            match table {
                "broken" => Err(SourceError::Database("no such table".to_string())),
                _ => Ok(vec![
                    SourceRow::from([("id".to_string(), json!(1))]),
                    SourceRow::from([("id".to_string(), json!(2))]),
                ]),
            }
        }
    }

    #[tokio::test]
    async fn test_relational_discovery_and_failures() {
        let broker = Arc::new(InMemoryBroker::new());
        let producer = Producer::new(broker.clone(), "20250101_000000");

        let report = producer.produce_relational(&FakeTables, "main").await.unwrap();

        let customer = DatasetKey::new(EntityKind::Customer, Provenance::Relational);
        assert_eq!(report.produced.get(&customer), Some(&2));
        assert_eq!(report.unmapped.get("nha_cung_cap"), Some(&2));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].origin, "broken");
        assert_eq!(report.total_published(), 4);
        assert_eq!(broker.message_count("queue_customer").await.unwrap(), 2);
        assert_eq!(broker.message_count("queue_nha_cung_cap").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_published_message_carries_metadata() {
        let broker = Arc::new(InMemoryBroker::new());
        let producer = Producer::new(broker.clone(), "20250101_000000");
        producer
            .publish_rows(
                &DatasetName::Known(EntityKind::Order),
                Provenance::File,
                "dathang.csv",
                vec![SourceRow::from([("id".to_string(), json!("9"))])],
            )
            .await
            .unwrap();

        let delivery = broker.get("queue_order").await.unwrap().unwrap();
        let message = Message::from_bytes(&delivery.body).unwrap();
        assert_eq!(message.source, Provenance::File);
        assert_eq!(message.entity_type, "order");
        assert_eq!(message.metadata.run_id, "20250101_000000");
        assert_eq!(message.metadata.origin, "dathang.csv");
    }
}

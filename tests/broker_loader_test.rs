// ==========================================
// Broker and loader integration tests
// ==========================================
// Durable queue store on disk, producer -> drain round trip,
// settle barrier, batched loading into a run database.
// ==========================================


use coffee_etl::broker::{
    drain_queue, wait_for_depth, DrainOptions, MessageBroker, Producer, SettlePolicy, SqliteBroker,
};
use coffee_etl::domain::{DatasetKey, EntityKind, Message, Provenance};
use coffee_etl::loader::{database_path, Destination, SqliteDestination, StagingLoader};
use coffee_etl::retry::RetryPolicy;
use coffee_etl::source::{CsvFileSource, SqliteSource};
use coffee_etl::transform::{transform_row, ColumnValue};
use std::sync::Arc;
use std::time::Duration;
use test_helpers::{create_source_db, create_workspace, fixed_now, record, write_coffee_files, RUN_ID};

fn fast_drain() -> DrainOptions {
    DrainOptions {
        poll_interval: Duration::from_millis(5),
        deadline: Duration::from_millis(500),
    }
}

#[tokio::test]
async fn test_unacked_messages_survive_reopen() {
    let (_dir, settings) = create_workspace().expect("workspace");
    let queue = EntityKind::Customer.queue_name();

    {
        let broker = SqliteBroker::open(&settings.broker_path).expect("open");
        broker.declare_queue(&queue).await.expect("declare");
        broker.publish(&queue, b"first").await.expect("publish");
        broker.publish(&queue, b"second").await.expect("publish");

        let delivery = broker.get(&queue).await.expect("get").expect("message");
        assert_eq!(delivery.body, b"first".to_vec());
        assert_eq!(broker.message_count(&queue).await.expect("count"), 1);
        // dropped without ack
    }

    let broker = SqliteBroker::open(&settings.broker_path).expect("reopen");
    assert_eq!(broker.message_count(&queue).await.expect("count"), 2);
    let delivery = broker.get(&queue).await.expect("get").expect("message");
    assert_eq!(delivery.body, b"first".to_vec());
    broker.ack(delivery.tag).await.expect("ack");
    assert_eq!(broker.message_count(&queue).await.expect("count"), 1);
}

#[tokio::test]
async fn test_produce_then_drain_with_poison_message() {
    let (dir, settings) = create_workspace().expect("workspace");
    write_coffee_files(&settings.data_dir).expect("files");
    let source_path = dir.path().join("source.sqlite");
    create_source_db(&source_path).expect("source db");

    let broker: Arc<dyn MessageBroker> = Arc::new(SqliteBroker::open(&settings.broker_path).expect("open"));
    let producer = Producer::new(broker.clone(), RUN_ID);

    let mut report = producer
        .produce_files(&CsvFileSource, &settings.data_dir)
        .await
        .expect("files");
    let source = SqliteSource::open(&source_path).expect("source");
    report.merge(producer.produce_relational(&source, "main").await.expect("relational"));

    let customers = EntityKind::Customer.queue_name();
    assert_eq!(report.queue_counts.get(&customers), Some(&5));
    assert_eq!(
        report.produced.get(&DatasetKey::new(EntityKind::Customer, Provenance::Relational)),
        Some(&2)
    );
    assert_eq!(report.unmapped.get("nha_cung_cap"), Some(&1));
    assert!(report.failures.is_empty());

    broker.publish(&customers, b"{not json").await.expect("poison");

    let policy = SettlePolicy {
        initial_poll: Duration::from_millis(5),
        max_poll: Duration::from_millis(20),
        timeout: Duration::from_millis(500),
    };
    let depth = wait_for_depth(broker.as_ref(), &customers, 6, &policy).await.expect("settle");
    assert_eq!(depth, 6);

    let mut seen = Vec::new();
    let drained = drain_queue(broker.as_ref(), &customers, &fast_drain(), |message: Message| {
        assert_eq!(message.metadata.run_id, RUN_ID);
        seen.push((message.source, message.record().get("id").cloned().unwrap_or_default()));
        Ok::<(), String>(())
    })
    .await
    .expect("drain");

    assert_eq!(drained.expected, 6);
    assert_eq!(drained.consumed, 5);
    assert_eq!(drained.lost, 1);
    assert_eq!(broker.dead_letter_count(&customers).await.expect("dead letters"), 1);
    assert_eq!(broker.message_count(&customers).await.expect("count"), 0);

    // file rows first, in file order
    assert_eq!(seen[0], (Provenance::File, "1".to_string()));
    assert!(seen.contains(&(Provenance::Relational, "102".to_string())));
}

#[tokio::test]
async fn test_settle_times_out_on_short_queue() {
    let (_dir, settings) = create_workspace().expect("workspace");
    let broker = SqliteBroker::open(&settings.broker_path).expect("open");
    broker.declare_queue("queue_order").await.expect("declare");

    let policy = SettlePolicy {
        initial_poll: Duration::from_millis(2),
        max_poll: Duration::from_millis(5),
        timeout: Duration::from_millis(30),
    };
    assert!(wait_for_depth(&broker, "queue_order", 1, &policy).await.is_err());
}

#[tokio::test]
async fn test_loader_writes_run_database() {
    let (_dir, settings) = create_workspace().expect("workspace");
    let policy = RetryPolicy {
        attempts: 1,
        delay: Duration::from_millis(1),
    };
    let destination = SqliteDestination::connect_for_run(&settings.destination_dir, RUN_ID, &policy)
        .await
        .expect("destination");
    assert_eq!(
        destination.path(),
        Some(database_path(&settings.destination_dir, RUN_ID).as_path())
    );

    let destination: Arc<dyn Destination> = Arc::new(destination);
    let loader = StagingLoader::new(destination.clone(), 2);
    loader.ensure_schema().await.expect("schema");
    loader.ensure_schema().await.expect("schema is idempotent");

    let key = DatasetKey::new(EntityKind::Ingredient, Provenance::File);
    let rows: Vec<_> = ["1", "2", "3"]
        .iter()
        .map(|id| {
            let fields = record(&[
                ("id", id),
                ("ten_nguyen_lieu", "Sữa đặc"),
                ("so_luong", "10"),
                ("don_vi", "hộp"),
                ("nha_cung_cap", ""),
            ]);
            transform_row(key.shape(), &fields, fixed_now())
        })
        .collect();

    let report = loader.load_dataset(key, &rows).await.expect("load");
    assert_eq!(report.attempted, 3);
    assert_eq!(report.loaded, 3);
    assert_eq!(report.batches, 2);
    assert_eq!(report.failed_batches, 0);

    let stored = destination
        .query(
            "SELECT ma_nguyen_lieu, nha_cung_cap, extract_time FROM staging_ingredient_csv ORDER BY ma_nguyen_lieu",
            &[],
        )
        .await
        .expect("query");
    assert_eq!(stored.len(), 3);
    assert_eq!(stored[0].get("ma_nguyen_lieu"), Some(&ColumnValue::Integer(1)));
    assert_eq!(stored[0].get("nha_cung_cap"), Some(&ColumnValue::Null));
    assert_eq!(
        stored[2].get("extract_time"),
        Some(&ColumnValue::Text("2025-01-01 08:00:00".to_string()))
    );

    let ledger = destination
        .query("SELECT status FROM etl_load_batches WHERE status = 'loaded'", &[])
        .await
        .expect("ledger");
    assert_eq!(ledger.len(), 2);
}

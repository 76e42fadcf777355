// ==========================================
// Coffee ETL - message transport
// ==========================================
// Per-entity durable queues between the producer and raw
// capture. Delivery is at-least-once; consumers acknowledge
// each message after its local effect succeeded.
// ==========================================

pub mod consumer;
pub mod error;
pub mod memory;
pub mod producer;
pub mod settle;
pub mod sqlite_queue;

pub use consumer::{drain_queue, DrainOptions, DrainReport};
pub use error::{BrokerError, BrokerResult};
pub use memory::InMemoryBroker;
pub use producer::{ProduceReport, Producer, SourceFailure};
pub use settle::{settle_queues, wait_for_depth, SettlePolicy};
pub use sqlite_queue::SqliteBroker;

use async_trait::async_trait;

/// One message handed to a consumer, identified by its delivery tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub tag: u64,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Idempotent.
    async fn declare_queue(&self, queue: &str) -> BrokerResult<()>;

    /// Durable publish; does not wait for any consumer.
    async fn publish(&self, queue: &str, body: &[u8]) -> BrokerResult<()>;

    /// Messages ready for delivery (excludes unacknowledged ones).
    async fn message_count(&self, queue: &str) -> BrokerResult<usize>;

    /// Next ready message, if any. Prefetch is one.
    async fn get(&self, queue: &str) -> BrokerResult<Option<Delivery>>;

    async fn ack(&self, tag: u64) -> BrokerResult<()>;

    /// `requeue = false` dead-letters the message; it is never redelivered.
    async fn nack(&self, tag: u64, requeue: bool) -> BrokerResult<()>;

    async fn dead_letter_count(&self, queue: &str) -> BrokerResult<usize>;
}

// ==========================================
// Coffee ETL - transport errors
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("broker connection failed: {0}")]
    Connection(String),

    #[error("queue not declared: {0}")]
    QueueNotFound(String),

    #[error("unknown delivery tag: {0}")]
    UnknownDelivery(u64),

    #[error("message codec error: {0}")]
    Codec(String),

    #[error("drain of {queue} timed out after {waited_ms} ms ({handled}/{expected} messages handled)")]
    DrainTimeout {
        queue: String,
        expected: usize,
        handled: usize,
        waited_ms: u128,
    },

    #[error("queue {queue} did not reach depth {expected} within {waited_ms} ms (observed {observed})")]
    SettleTimeout {
        queue: String,
        expected: usize,
        observed: usize,
        waited_ms: u128,
    },

    #[error("broker storage error: {0}")]
    Storage(String),

    #[error("broker lock failed: {0}")]
    Lock(String),
}

impl From<rusqlite::Error> for BrokerError {
    fn from(err: rusqlite::Error) -> Self {
        BrokerError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(err: serde_json::Error) -> Self {
        BrokerError::Codec(err.to_string())
    }
}

pub type BrokerResult<T> = Result<T, BrokerError>;

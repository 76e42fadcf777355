// ==========================================
// Coffee ETL - durable queue store (SQLite)
// ==========================================
// Messages survive process restarts. A delivered message is
// marked `unacked`; reopening the store returns such messages
// to `ready` (at-least-once). Rejected messages without
// requeue move to `dead_letters` and are never redelivered.
// ==========================================

use crate::broker::error::{BrokerError, BrokerResult};
use crate::broker::{Delivery, MessageBroker};
use crate::db::open_sqlite_connection;
use crate::retry::{retry_fixed, RetryPolicy};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, instrument};

const QUEUE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS queues (
    name TEXT PRIMARY KEY,
    declared_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE TABLE IF NOT EXISTS queue_messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    queue TEXT NOT NULL REFERENCES queues(name),
    body BLOB NOT NULL,
    state TEXT NOT NULL DEFAULT 'ready' CHECK (state IN ('ready', 'unacked')),
    published_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_queue_messages_ready ON queue_messages(queue, state, id);
CREATE TABLE IF NOT EXISTS dead_letters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    queue TEXT NOT NULL,
    body BLOB NOT NULL,
    dead_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

pub struct SqliteBroker {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBroker {
    /// Open (or create) the queue store and recover unacknowledged messages.
    pub fn open(path: &Path) -> BrokerResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| BrokerError::Connection(format!("{}: {}", parent.display(), e)))?;
            }
        }
        let conn = open_sqlite_connection(&path.to_string_lossy())
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        Self::from_connection(conn)
    }

    /// `open` with fixed-delay retries.
    pub async fn connect(path: &Path, policy: &RetryPolicy) -> BrokerResult<Self> {
        retry_fixed("broker_connect", policy, || async { Self::open(path) }).await
    }

    pub fn from_connection(conn: Connection) -> BrokerResult<Self> {
        conn.execute_batch(QUEUE_SCHEMA)?;
        let recovered = conn.execute(
            "UPDATE queue_messages SET state = 'ready' WHERE state = 'unacked'",
            [],
        )?;
        if recovered > 0 {
            info!(recovered, "unacknowledged messages returned to their queues");
        }
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn get_conn(&self) -> BrokerResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| BrokerError::Lock(e.to_string()))
    }

    fn ensure_queue(conn: &Connection, queue: &str) -> BrokerResult<()> {
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM queues WHERE name = ?1", [queue], |row| row.get(0))
            .optional()?;
        match found {
            Some(_) => Ok(()),
            None => Err(BrokerError::QueueNotFound(queue.to_string())),
        }
    }
}

#[async_trait]
impl MessageBroker for SqliteBroker {
    async fn declare_queue(&self, queue: &str) -> BrokerResult<()> {
        let conn = self.get_conn()?;
        conn.execute("INSERT OR IGNORE INTO queues (name) VALUES (?1)", [queue])?;
        Ok(())
    }

    async fn publish(&self, queue: &str, body: &[u8]) -> BrokerResult<()> {
        let conn = self.get_conn()?;
        Self::ensure_queue(&conn, queue)?;
        conn.execute(
            "INSERT INTO queue_messages (queue, body) VALUES (?1, ?2)",
            params![queue, body],
        )?;
        Ok(())
    }

    async fn message_count(&self, queue: &str) -> BrokerResult<usize> {
        let conn = self.get_conn()?;
        Self::ensure_queue(&conn, queue)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM queue_messages WHERE queue = ?1 AND state = 'ready'",
            [queue],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    async fn get(&self, queue: &str) -> BrokerResult<Option<Delivery>> {
        let mut conn = self.get_conn()?;
        Self::ensure_queue(&conn, queue)?;
        let tx = conn.transaction()?;
        let next: Option<(i64, Vec<u8>)> = tx
            .query_row(
                "SELECT id, body FROM queue_messages
                 WHERE queue = ?1 AND state = 'ready'
                 ORDER BY id LIMIT 1",
                [queue],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((id, body)) = next else {
            return Ok(None);
        };
        tx.execute(
            "UPDATE queue_messages SET state = 'unacked' WHERE id = ?1",
            [id],
        )?;
        tx.commit()?;
        Ok(Some(Delivery {
            tag: id as u64,
            body,
        }))
    }

    async fn ack(&self, tag: u64) -> BrokerResult<()> {
        let conn = self.get_conn()?;
        let removed = conn.execute(
            "DELETE FROM queue_messages WHERE id = ?1 AND state = 'unacked'",
            [tag as i64],
        )?;
        if removed == 0 {
            return Err(BrokerError::UnknownDelivery(tag));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn nack(&self, tag: u64, requeue: bool) -> BrokerResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let row: Option<(String, Vec<u8>)> = tx
            .query_row(
                "SELECT queue, body FROM queue_messages WHERE id = ?1 AND state = 'unacked'",
                [tag as i64],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((queue, body)) = row else {
            return Err(BrokerError::UnknownDelivery(tag));
        };

        if requeue {
            tx.execute(
                "UPDATE queue_messages SET state = 'ready' WHERE id = ?1",
                [tag as i64],
            )?;
        } else {
            tx.execute(
                "INSERT INTO dead_letters (queue, body) VALUES (?1, ?2)",
                params![queue, body],
            )?;
            tx.execute("DELETE FROM queue_messages WHERE id = ?1", [tag as i64])?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn dead_letter_count(&self, queue: &str) -> BrokerResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM dead_letters WHERE queue = ?1",
            [queue],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_messages_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broker.sqlite");
        {
            let broker = SqliteBroker::open(&path).unwrap();
            broker.declare_queue("queue_order").await.unwrap();
            broker.publish("queue_order", b"1").await.unwrap();
            broker.publish("queue_order", b"2").await.unwrap();
        }
        let broker = SqliteBroker::open(&path).unwrap();
        assert_eq!(broker.message_count("queue_order").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unacked_messages_are_recovered_on_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broker.sqlite");
        {
            let broker = SqliteBroker::open(&path).unwrap();
            broker.declare_queue("q").await.unwrap();
            broker.publish("q", b"x").await.unwrap();
            let d = broker.get("q").await.unwrap().unwrap();
            assert_eq!(d.body, b"x");
            assert_eq!(broker.message_count("q").await.unwrap(), 0);
        }
        let broker = SqliteBroker::open(&path).unwrap();
        assert_eq!(broker.message_count("q").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_nack_without_requeue_dead_letters() {
        let broker = SqliteBroker::from_connection(Connection::open_in_memory().unwrap()).unwrap();
        broker.declare_queue("q").await.unwrap();
        broker.publish("q", b"poison").await.unwrap();

        let d = broker.get("q").await.unwrap().unwrap();
        broker.nack(d.tag, false).await.unwrap();

        assert_eq!(broker.dead_letter_count("q").await.unwrap(), 1);
        assert_eq!(broker.message_count("q").await.unwrap(), 0);
        assert!(broker.get("q").await.unwrap().is_none());
        assert!(matches!(
            broker.ack(d.tag).await,
            Err(BrokerError::UnknownDelivery(_))
        ));
    }

    #[tokio::test]
    async fn test_undeclared_queue() {
        let broker = SqliteBroker::from_connection(Connection::open_in_memory().unwrap()).unwrap();
        assert!(matches!(
            broker.publish("nope", b"x").await,
            Err(BrokerError::QueueNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_retries_then_fails() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let policy = RetryPolicy {
            attempts: 2,
            delay: std::time::Duration::from_millis(1),
        };
        let result = SqliteBroker::connect(&blocker.join("broker.sqlite"), &policy).await;
        assert!(matches!(result, Err(BrokerError::Connection(_))));
    }
}

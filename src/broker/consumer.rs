// ==========================================
// Coffee ETL - queue drain (raw capture side)
// ==========================================
// Snapshots the queue depth and drains exactly that many
// messages, bounded by a deadline. A message is acked only
// after the sink accepted it; a payload that does not decode
// or a sink failure is nacked without requeue and counted lost.
// ==========================================

use crate::broker::error::{BrokerError, BrokerResult};
use crate::broker::MessageBroker;
use crate::domain::Message;
use std::fmt::Display;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainOptions {
    /// Sleep between polls of an empty queue.
    pub poll_interval: Duration,
    /// Upper bound for the whole drain.
    pub deadline: Duration,
}

impl Default for DrainOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
            deadline: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub queue: String,
    /// Queue depth snapshotted at start.
    pub expected: usize,
    pub consumed: usize,
    pub lost: usize,
}

impl DrainReport {
    pub fn handled(&self) -> usize {
        self.consumed + self.lost
    }
}

/// Drain the messages present in `queue` when the call starts.
///
/// # Parameters
/// - sink: local effect for one decoded message; an `Err` rejects the message
///
/// # Returns
/// Consumed/lost counts, or `DrainTimeout` when the deadline passes first
#[instrument(skip(broker, options, sink))]
pub async fn drain_queue<F, E>(
    broker: &dyn MessageBroker,
    queue: &str,
    options: &DrainOptions,
    mut sink: F,
) -> BrokerResult<DrainReport>
where
    F: FnMut(Message) -> Result<(), E>,
    E: Display,
{
    let expected = broker.message_count(queue).await?;
    let mut report = DrainReport {
        queue: queue.to_string(),
        expected,
        ..Default::default()
    };
    let started = Instant::now();

    while report.handled() < expected {
        let Some(delivery) = broker.get(queue).await? else {
            if started.elapsed() >= options.deadline {
                return Err(BrokerError::DrainTimeout {
                    queue: queue.to_string(),
                    expected,
                    handled: report.handled(),
                    waited_ms: started.elapsed().as_millis(),
                });
            }
            tokio::time::sleep(options.poll_interval).await;
            continue;
        };

        let message = match Message::from_bytes(&delivery.body) {
            Ok(message) => message,
            Err(e) => {
                warn!(queue, tag = delivery.tag, error = %e, "undecodable message rejected");
                broker.nack(delivery.tag, false).await?;
                report.lost += 1;
                continue;
            }
        };

        match sink(message) {
            Ok(()) => {
                broker.ack(delivery.tag).await?;
                report.consumed += 1;
            }
            Err(e) => {
                warn!(queue, tag = delivery.tag, error = %e, "message rejected by sink");
                broker.nack(delivery.tag, false).await?;
                report.lost += 1;
            }
        }
    }

    info!(
        queue,
        expected,
        consumed = report.consumed,
        lost = report.lost,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "queue drained"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{Delivery, InMemoryBroker};
    use crate::domain::{MessageMetadata, Provenance};
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    fn body(id: &str) -> Vec<u8> {
        Message {
            source: Provenance::File,
            entity_type: "customer".to_string(),
            data: BTreeMap::from([("id".to_string(), serde_json::json!(id))]),
            metadata: MessageMetadata {
                extract_time: chrono::Local::now().naive_local(),
                run_id: "r".to_string(),
                origin: "khachhang.csv".to_string(),
            },
        }
        .to_bytes()
        .unwrap()
    }

    fn quick() -> DrainOptions {
        DrainOptions {
            poll_interval: Duration::from_millis(5),
            deadline: Duration::from_millis(100),
        }
    }

    #[tokio::test]
    async fn test_drain_acks_and_rejects_poison() {
        let broker = InMemoryBroker::new();
        broker.declare_queue("q").await.unwrap();
        broker.publish("q", &body("1")).await.unwrap();
        broker.publish("q", b"not json").await.unwrap();
        broker.publish("q", &body("2")).await.unwrap();
        broker.publish("q", &body("3")).await.unwrap();

        let mut seen = Vec::new();
        let report = drain_queue(&broker, "q", &quick(), |m: Message| {
            let id = m.record().get("id").cloned().unwrap_or_default();
            if id == "3" {
                return Err("disk full".to_string());
            }
            seen.push(id);
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(seen, vec!["1".to_string(), "2".to_string()]);
        assert_eq!(report.expected, 4);
        assert_eq!(report.consumed, 2);
        assert_eq!(report.lost, 2);
        assert_eq!(broker.dead_letter_count("q").await.unwrap(), 2);
        assert_eq!(broker.message_count("q").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_messages_published_after_snapshot_stay_queued() {
        let broker = InMemoryBroker::new();
        broker.declare_queue("q").await.unwrap();
        broker.publish("q", &body("1")).await.unwrap();

        let report = drain_queue(&broker, "q", &quick(), |_m: Message| Ok::<(), String>(()))
            .await
            .unwrap();
        assert_eq!(report.consumed, 1);

        broker.publish("q", &body("2")).await.unwrap();
        assert_eq!(broker.message_count("q").await.unwrap(), 1);
    }

    /// Reports a depth it never delivers.
    struct StuckBroker;

    #[async_trait]
    impl MessageBroker for StuckBroker {
        async fn declare_queue(&self, _queue: &str) -> BrokerResult<()> {
            Ok(())
        }
        async fn publish(&self, _queue: &str, _body: &[u8]) -> BrokerResult<()> {
            Ok(())
        }
        async fn message_count(&self, _queue: &str) -> BrokerResult<usize> {
            Ok(3)
        }
        async fn get(&self, _queue: &str) -> BrokerResult<Option<Delivery>> {
            Ok(None)
        }
        async fn ack(&self, _tag: u64) -> BrokerResult<()> {
            Ok(())
        }
        async fn nack(&self, _tag: u64, _requeue: bool) -> BrokerResult<()> {
            Ok(())
        }
        async fn dead_letter_count(&self, _queue: &str) -> BrokerResult<usize> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_stuck_drain_times_out() {
        let err = drain_queue(&StuckBroker, "q", &quick(), |_m: Message| Ok::<(), String>(()))
            .await
            .unwrap_err();
        match err {
            BrokerError::DrainTimeout {
                expected, handled, ..
            } => {
                assert_eq!(expected, 3);
                assert_eq!(handled, 0);
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}

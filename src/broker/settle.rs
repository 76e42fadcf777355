// ==========================================
// Coffee ETL - producer/consumer barrier
// ==========================================
// Raw capture starts only once every queue reports at least
// the number of messages the producer published into it.
// Polls back off exponentially up to a cap; a deadline turns
// a stuck queue into SettleTimeout.
// ==========================================

use crate::broker::error::{BrokerError, BrokerResult};
use crate::broker::MessageBroker;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlePolicy {
    pub initial_poll: Duration,
    pub max_poll: Duration,
    pub timeout: Duration,
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self {
            initial_poll: Duration::from_millis(50),
            max_poll: Duration::from_millis(1_000),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Wait until `queue` holds at least `expected` ready messages.
///
/// # Returns
/// The depth observed when the target was reached
pub async fn wait_for_depth(
    broker: &dyn MessageBroker,
    queue: &str,
    expected: usize,
    policy: &SettlePolicy,
) -> BrokerResult<usize> {
    let started = Instant::now();
    let mut poll = policy.initial_poll;

    loop {
        let observed = broker.message_count(queue).await?;
        if observed >= expected {
            debug!(queue, expected, observed, "queue settled");
            return Ok(observed);
        }
        if started.elapsed() >= policy.timeout {
            return Err(BrokerError::SettleTimeout {
                queue: queue.to_string(),
                expected,
                observed,
                waited_ms: started.elapsed().as_millis(),
            });
        }
        tokio::time::sleep(poll).await;
        poll = (poll * 2).min(policy.max_poll);
    }
}

/// `wait_for_depth` for every queue the producer published into.
pub async fn settle_queues(
    broker: &dyn MessageBroker,
    expected: &BTreeMap<String, usize>,
    policy: &SettlePolicy,
) -> BrokerResult<()> {
    let started = Instant::now();
    for (queue, count) in expected {
        wait_for_depth(broker, queue, *count, policy).await?;
    }
    info!(
        queues = expected.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "all queues settled"
    );
    Ok(())
}

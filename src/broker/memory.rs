// ==========================================
// Coffee ETL - in-process broker
// ==========================================
// Same contract as the durable broker without persistence;
// used by tests and by runs that do not need a queue file.
// ==========================================

use crate::broker::error::{BrokerError, BrokerResult};
use crate::broker::{Delivery, MessageBroker};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct State {
    queues: HashMap<String, VecDeque<(u64, Vec<u8>)>>,
    unacked: HashMap<u64, (String, Vec<u8>)>,
    dead_letters: HashMap<String, Vec<Vec<u8>>>,
    next_tag: u64,
}

#[derive(Default)]
pub struct InMemoryBroker {
    state: Mutex<State>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> BrokerResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| BrokerError::Lock(e.to_string()))
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn declare_queue(&self, queue: &str) -> BrokerResult<()> {
        self.lock()?.queues.entry(queue.to_string()).or_default();
        Ok(())
    }

    async fn publish(&self, queue: &str, body: &[u8]) -> BrokerResult<()> {
        let mut state = self.lock()?;
        state.next_tag += 1;
        let tag = state.next_tag;
        let q = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| BrokerError::QueueNotFound(queue.to_string()))?;
        q.push_back((tag, body.to_vec()));
        Ok(())
    }

    async fn message_count(&self, queue: &str) -> BrokerResult<usize> {
        self.lock()?
            .queues
            .get(queue)
            .map(VecDeque::len)
            .ok_or_else(|| BrokerError::QueueNotFound(queue.to_string()))
    }

    async fn get(&self, queue: &str) -> BrokerResult<Option<Delivery>> {
        let mut state = self.lock()?;
        let q = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| BrokerError::QueueNotFound(queue.to_string()))?;
        let Some((tag, body)) = q.pop_front() else {
            return Ok(None);
        };
        state.unacked.insert(tag, (queue.to_string(), body.clone()));
        Ok(Some(Delivery { tag, body }))
    }

    async fn ack(&self, tag: u64) -> BrokerResult<()> {
        self.lock()?
            .unacked
            .remove(&tag)
            .map(|_| ())
            .ok_or(BrokerError::UnknownDelivery(tag))
    }

    async fn nack(&self, tag: u64, requeue: bool) -> BrokerResult<()> {
        let mut state = self.lock()?;
        let (queue, body) = state
            .unacked
            .remove(&tag)
            .ok_or(BrokerError::UnknownDelivery(tag))?;
        if requeue {
            state.queues.entry(queue).or_default().push_front((tag, body));
        } else {
            state.dead_letters.entry(queue).or_default().push(body);
        }
        Ok(())
    }

    async fn dead_letter_count(&self, queue: &str) -> BrokerResult<usize> {
        Ok(self
            .lock()?
            .dead_letters
            .get(queue)
            .map(Vec::len)
            .unwrap_or(0))
    }
}

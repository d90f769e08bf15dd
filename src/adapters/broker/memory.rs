//! In-process broker with at-least-once delivery
//!
//! Used by tests and by single-process dry runs. Queues are FIFO. A delivery
//! that is nacked with `requeue`, or dropped without being settled, goes back
//! to the head of its queue and is redelivered. Subscriptions end once the
//! broker is closed and the queue has been drained.

use super::traits::{Acknowledger, Delivery, MessageBroker, MessageStream};
use crate::domain::errors::BrokerError;
use crate::domain::ids::ChannelId;
use crate::domain::Result;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Delivery counters, for assertions in tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStats {
    pub published: u64,
    pub delivered: u64,
    pub acked: u64,
    pub nacked: u64,
    /// Deliveries dropped without an ack or nack
    pub abandoned: u64,
    pub redelivered: u64,
}

impl BrokerStats {
    /// Deliveries handed out and still held by a consumer
    pub fn unsettled(&self) -> u64 {
        self.delivered - self.acked - self.nacked - self.abandoned
    }
}

#[derive(Debug, Default)]
struct Queue {
    ready: VecDeque<Vec<u8>>,
    notify: Arc<Notify>,
}

impl Queue {
    fn requeue(&mut self, payload: Vec<u8>) {
        self.ready.push_front(payload);
        self.notify.notify_one();
    }
}

#[derive(Debug, Default)]
struct State {
    queues: HashMap<String, Queue>,
    channels: usize,
    closed: bool,
    stats: BrokerStats,
}

type SharedState = Arc<Mutex<State>>;

// The lock is never held across an await, so a poisoned guard still holds
// consistent state.
fn lock(state: &SharedState) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Message broker held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    state: SharedState,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current delivery counters
    pub async fn stats(&self) -> BrokerStats {
        lock(&self.state).stats
    }

    /// Payloads waiting in the named queue, oldest first
    pub async fn queued(&self, queue: &str) -> Vec<Vec<u8>> {
        lock(&self.state)
            .queues
            .get(queue)
            .map(|q| q.ready.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Removes and returns everything waiting in the named queue
    pub async fn drain(&self, queue: &str) -> Vec<Vec<u8>> {
        lock(&self.state)
            .queues
            .get_mut(queue)
            .map(|q| q.ready.drain(..).collect())
            .unwrap_or_default()
    }

    fn check_channel(state: &State, channel: ChannelId) -> Result<()> {
        if state.closed {
            return Err(BrokerError::Channel("broker is closed".to_string()).into());
        }
        if channel.index() >= state.channels {
            return Err(BrokerError::Channel(format!(
                "no channel with the requested ID was found: {channel}"
            ))
            .into());
        }
        Ok(())
    }

    /// Next payload for `queue`, waiting for one to arrive; `None` once closed and empty
    async fn next_payload(state: &SharedState, queue: &str) -> Option<Vec<u8>> {
        loop {
            let notify = {
                let mut guard = lock(state);
                let st = &mut *guard;
                let q = st.queues.get_mut(queue)?;
                if let Some(payload) = q.ready.pop_front() {
                    st.stats.delivered += 1;
                    return Some(payload);
                }
                if st.closed {
                    return None;
                }
                Arc::clone(&q.notify)
            };
            notify.notified().await;
        }
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn create_channel(&self) -> Result<ChannelId> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(BrokerError::Channel(
                "connection must exist before creating a channel".to_string(),
            )
            .into());
        }
        state.channels += 1;
        Ok(ChannelId::new(state.channels - 1))
    }

    async fn set_prefetch(&self, channel: ChannelId, _count: u16) -> Result<()> {
        Self::check_channel(&lock(&self.state), channel)
    }

    async fn queue_exists(&self, channel: ChannelId, name: &str) -> Result<bool> {
        let state = lock(&self.state);
        Self::check_channel(&state, channel)?;
        Ok(state.queues.contains_key(name))
    }

    async fn declare_queue(&self, channel: ChannelId, name: &str) -> Result<()> {
        let mut state = lock(&self.state);
        Self::check_channel(&state, channel)?;
        state.queues.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn publish(&self, channel: ChannelId, queue: &str, payload: &[u8]) -> Result<()> {
        let mut state = lock(&self.state);
        Self::check_channel(&state, channel)?;
        let q = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| BrokerError::Publish(format!("queue {queue} does not exist")))?;
        q.ready.push_back(payload.to_vec());
        q.notify.notify_one();
        state.stats.published += 1;
        Ok(())
    }

    async fn consume(&self, channel: ChannelId, queue: &str) -> Result<MessageStream> {
        {
            let state = lock(&self.state);
            Self::check_channel(&state, channel)?;
            if !state.queues.contains_key(queue) {
                return Err(BrokerError::QueueNotFound(queue.to_string()).into());
            }
        }

        let state = Arc::clone(&self.state);
        let queue = queue.to_string();
        let stream = futures::stream::unfold((state, queue), |(state, queue)| async move {
            let payload = Self::next_payload(&state, &queue).await?;
            let acker = MemoryAcker {
                state: Arc::clone(&state),
                queue: queue.clone(),
                payload: Some(payload.clone()),
            };
            let delivery: Result<Delivery> = Ok(Delivery::new(payload, Box::new(acker)));
            Some((delivery, (state, queue)))
        });
        Ok(Box::pin(stream))
    }

    async fn close(&self) -> Result<()> {
        let mut state = lock(&self.state);
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        for q in state.queues.values() {
            q.notify.notify_waiters();
            q.notify.notify_one();
        }
        Ok(())
    }
}

/// Settlement handle for one delivery; `payload` is `None` once settled
struct MemoryAcker {
    state: SharedState,
    queue: String,
    payload: Option<Vec<u8>>,
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(self: Box<Self>) -> Result<()> {
        let mut acker = self;
        acker.payload = None;
        lock(&acker.state).stats.acked += 1;
        Ok(())
    }

    async fn nack(self: Box<Self>, requeue: bool) -> Result<()> {
        let mut acker = self;
        let payload = acker.payload.take();
        let mut state = lock(&acker.state);
        state.stats.nacked += 1;
        if let (true, Some(payload)) = (requeue, payload) {
            state.stats.redelivered += 1;
            if let Some(q) = state.queues.get_mut(&acker.queue) {
                q.requeue(payload);
            }
        }
        Ok(())
    }
}

impl Drop for MemoryAcker {
    fn drop(&mut self) {
        let Some(payload) = self.payload.take() else {
            return;
        };
        let mut state = lock(&self.state);
        state.stats.abandoned += 1;
        state.stats.redelivered += 1;
        if let Some(q) = state.queues.get_mut(&self.queue) {
            q.requeue(payload);
        }
    }
}

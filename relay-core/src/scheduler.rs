//! Order scheduler: holds submitted orders until due, then releases them to
//! the dispatcher in deadline order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::dispatch::Dispatcher;
use crate::error::{RelayError, Result};
use crate::events::{EngineEvent, EventSender};
use crate::record::Order;
use crate::time::TimeProvider;

/// Heap entry wrapper. Orders by earliest deadline first; ties break on
/// insertion sequence so equal timestamps release FIFO.
#[derive(Clone, Debug)]
struct PendingOrder {
    order: Order,
    seq: u64,
}

impl PartialEq for PendingOrder {
    fn eq(&self, other: &Self) -> bool {
        self.order.scheduled_at == other.order.scheduled_at && self.seq == other.seq
    }
}

impl Eq for PendingOrder {}

impl PartialOrd for PendingOrder {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingOrder {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: reverse so the earliest deadline (and for
        // ties, the earliest submission) surfaces at the head.
        match other.order.scheduled_at.cmp(&self.order.scheduled_at) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ordering => ordering,
        }
    }
}

#[derive(Debug, Default)]
struct SchedulerState {
    pending: BinaryHeap<PendingOrder>,
    next_seq: u64,
}

/// Time-ordered pending queue plus the release loop that drains it.
///
/// Submissions and the release loop share the queue through one mutex; a
/// notify wakes the loop early when a submission lands, so an order with an
/// earlier deadline than the current wait target is not stuck behind it.
pub struct OrderScheduler {
    state: Mutex<SchedulerState>,
    notify: Notify,
    dispatcher: Arc<Dispatcher>,
    clock: Arc<dyn TimeProvider>,
    poll_interval: Duration,
    events: EventSender,
}

impl fmt::Debug for OrderScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderScheduler")
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl OrderScheduler {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        clock: Arc<dyn TimeProvider>,
        poll_interval: Duration,
        events: EventSender,
    ) -> Self {
        Self {
            state: Mutex::new(SchedulerState::default()),
            notify: Notify::new(),
            dispatcher,
            clock,
            poll_interval,
            events,
        }
    }

    /// Accept an order into the pending queue. Past deadlines are admitted
    /// and release on the next poll.
    pub async fn submit(&self, name: &str, scheduled_at: DateTime<Utc>) -> Result<()> {
        if name.trim().is_empty() {
            return Err(RelayError::EmptyOrderName);
        }

        {
            let mut state = self.state.lock().await;
            let seq = state.next_seq;
            state.next_seq += 1;
            state.pending.push(PendingOrder {
                order: Order {
                    name: name.to_string(),
                    scheduled_at,
                },
                seq,
            });
        }

        info!(order = name, %scheduled_at, "order scheduled");
        self.events.emit(EngineEvent::OrderScheduled {
            name: name.to_string(),
            scheduled_at,
        });
        self.notify.notify_one();
        Ok(())
    }

    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Release loop. Runs until cancelled; an empty queue only parks the loop,
    /// it never terminates it.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!("order scheduler started");

        loop {
            let until_head = self.release_due().await;

            let wait = match until_head {
                Some(remaining) => remaining.min(self.poll_interval),
                None => self.poll_interval,
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.notify.notified() => {}
                _ = self.clock.sleep(wait) => {}
            }
        }

        info!("order scheduler stopped");
    }

    /// Pop and dispatch every due order, earliest deadline first. Returns the
    /// time remaining until the new head, if any.
    async fn release_due(&self) -> Option<Duration> {
        let now = self.clock.utc_now();

        let (due, until_head) = {
            let mut state = self.state.lock().await;
            let mut due = Vec::new();
            while state
                .pending
                .peek()
                .is_some_and(|head| head.order.scheduled_at <= now)
            {
                if let Some(entry) = state.pending.pop() {
                    due.push(entry.order);
                }
            }
            let until_head = state.pending.peek().map(|head| {
                (head.order.scheduled_at - now)
                    .to_std()
                    .unwrap_or(Duration::ZERO)
            });
            (due, until_head)
        };

        // Dispatch outside the queue lock; dispatch never blocks on
        // fulfillment, so due orders go out back to back in deadline order.
        for order in due {
            debug!(order = %order.name, "releasing due order");
            if let Err(error) = self.dispatcher.dispatch(&order.name).await {
                error!(order = %order.name, %error, "dispatch failed");
                self.events.emit(EngineEvent::DispatchFailed {
                    name: order.name,
                    reason: error.to_string(),
                });
            }
        }

        until_head
    }
}

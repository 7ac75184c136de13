//! Side-channel events emitted by the engine's components. Collaborators (and
//! tests) observe lifecycle progress here without polling the registry.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::record::{DispatchId, ProviderKind};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EngineEvent {
    /// An order was accepted into the scheduler's pending queue.
    OrderScheduled {
        name: String,
        scheduled_at: DateTime<Utc>,
    },
    /// A due order was released and assigned a provider.
    Dispatched {
        id: DispatchId,
        name: String,
        provider: ProviderKind,
    },
    /// A provider reported fulfillment.
    Finished { id: DispatchId, provider: ProviderKind },
    /// The sweeper promoted a finished record.
    Archived {
        id: DispatchId,
        archived_at: DateTime<Utc>,
    },
    /// The reaper deleted an expired archived record.
    Reaped { id: DispatchId },
    /// A provider could not complete; the record stays ongoing.
    ProviderFailed {
        id: DispatchId,
        provider: ProviderKind,
        reason: String,
    },
    /// Dispatch of a released order was aborted. Other orders are unaffected.
    DispatchFailed { name: String, reason: String },
}

/// Cheap cloneable handle around an optional event channel. Components emit
/// unconditionally; a missing or closed receiver drops the event.
#[derive(Clone, Debug, Default)]
pub struct EventSender {
    tx: Option<mpsc::UnboundedSender<EngineEvent>>,
}

impl EventSender {
    pub fn new(tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sender that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: EngineEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_reaches_receiver() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sender = EventSender::new(tx);
        sender.emit(EngineEvent::Reaped {
            id: DispatchId::new(),
        });
        assert!(matches!(rx.try_recv(), Ok(EngineEvent::Reaped { .. })));
    }

    #[test]
    fn disabled_sender_drops_events() {
        let sender = EventSender::disabled();
        sender.emit(EngineEvent::Reaped {
            id: DispatchId::new(),
        });
    }

    #[test]
    fn closed_receiver_does_not_panic() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let sender = EventSender::new(tx);
        sender.emit(EngineEvent::Reaped {
            id: DispatchId::new(),
        });
    }
}

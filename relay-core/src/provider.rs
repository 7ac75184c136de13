//! Delivery provider strategies. A provider models an external fulfillment
//! channel with its own latency profile: fulfillment runs as a detached task
//! and flips the record to `Finished` once its delay elapses.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::DelayRange;
use crate::error::Result;
use crate::events::{EngineEvent, EventSender};
use crate::record::{DeliveryStatus, DispatchId, ProviderKind};
use crate::registry::DeliveryRegistry;
use crate::time::TimeProvider;

/// Capability contract for fulfillment channels.
#[async_trait]
pub trait DeliveryProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Begin asynchronous fulfillment of a dispatched order. Returns once the
    /// work is handed off; completion is reported through the registry. A
    /// provider that cannot complete must leave the record `Ongoing` and emit
    /// [`EngineEvent::ProviderFailed`] instead.
    async fn fulfill(&self, id: DispatchId, registry: DeliveryRegistry) -> Result<()>;
}

/// Simulated fulfillment channel: sleeps a random delay drawn from its
/// configured range, then marks the record finished. Both built-in variants
/// (express and standard) are instances of this type with disjoint ranges.
pub struct SimulatedProvider {
    kind: ProviderKind,
    delay: DelayRange,
    clock: Arc<dyn TimeProvider>,
    events: EventSender,
}

impl SimulatedProvider {
    pub fn new(
        kind: ProviderKind,
        delay: DelayRange,
        clock: Arc<dyn TimeProvider>,
        events: EventSender,
    ) -> Self {
        Self {
            kind,
            delay,
            clock,
            events,
        }
    }
}

impl std::fmt::Debug for SimulatedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedProvider")
            .field("kind", &self.kind)
            .field("delay", &self.delay)
            .finish()
    }
}

#[async_trait]
impl DeliveryProvider for SimulatedProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn fulfill(&self, id: DispatchId, registry: DeliveryRegistry) -> Result<()> {
        let delay = self.delay.sample();
        let kind = self.kind;
        let clock = self.clock.clone();
        let events = self.events.clone();

        debug!(dispatch = %id, provider = %kind, ?delay, "fulfillment started");

        // Detached on purpose: shutdown does not cancel in-flight fulfillments.
        tokio::spawn(async move {
            clock.sleep(delay).await;
            match registry.advance_status(id, DeliveryStatus::Finished).await {
                Ok(()) => {
                    debug!(dispatch = %id, provider = %kind, "fulfillment finished");
                    events.emit(EngineEvent::Finished { id, provider: kind });
                }
                Err(error) => {
                    warn!(dispatch = %id, provider = %kind, %error, "fulfillment could not record completion");
                    events.emit(EngineEvent::ProviderFailed {
                        id,
                        provider: kind,
                        reason: error.to_string(),
                    });
                }
            }
        });

        Ok(())
    }
}

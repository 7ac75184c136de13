//! Status sweeper: promotes finished deliveries to archived and stamps the
//! transition time.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::events::{EngineEvent, EventSender};
use crate::record::DeliveryStatus;
use crate::registry::DeliveryRegistry;
use crate::time::TimeProvider;

pub struct StatusSweeper {
    registry: DeliveryRegistry,
    clock: Arc<dyn TimeProvider>,
    interval: Duration,
    events: EventSender,
}

impl fmt::Debug for StatusSweeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusSweeper")
            .field("interval", &self.interval)
            .finish()
    }
}

impl StatusSweeper {
    pub fn new(
        registry: DeliveryRegistry,
        clock: Arc<dyn TimeProvider>,
        interval: Duration,
        events: EventSender,
    ) -> Self {
        Self {
            registry,
            clock,
            interval,
            events,
        }
    }

    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!("status sweeper started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.clock.sleep(self.interval) => {}
            }
            self.sweep_once(self.clock.utc_now()).await;
        }

        info!("status sweeper stopped");
    }

    /// One sweep pass: archive every record that is finished as of the
    /// snapshot. Idempotent; the filter is on `Finished` only, so re-sweeping
    /// an archived record is a no-op. A failure on one record is logged and
    /// does not stop the pass.
    pub async fn sweep_once(&self, now: DateTime<Utc>) {
        let snapshot = self.registry.snapshot().await;
        for (id, record) in snapshot {
            if record.status != DeliveryStatus::Finished {
                continue;
            }
            match self.registry.mark_archived(id, now).await {
                Ok(true) => {
                    info!(dispatch = %id, archived_at = %now, "delivery archived");
                    self.events.emit(EngineEvent::Archived {
                        id,
                        archived_at: now,
                    });
                }
                Ok(false) => {}
                Err(error) => {
                    warn!(dispatch = %id, %error, "sweep skipped record");
                }
            }
        }
    }
}

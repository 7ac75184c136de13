//! Archive reaper: bounds registry memory by deleting archived records older
//! than the retention threshold.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::events::{EngineEvent, EventSender};
use crate::record::DeliveryStatus;
use crate::registry::DeliveryRegistry;
use crate::time::TimeProvider;

pub struct ArchiveReaper {
    registry: DeliveryRegistry,
    clock: Arc<dyn TimeProvider>,
    interval: Duration,
    retention: TimeDelta,
    events: EventSender,
}

impl fmt::Debug for ArchiveReaper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveReaper")
            .field("interval", &self.interval)
            .field("retention", &self.retention)
            .finish()
    }
}

impl ArchiveReaper {
    pub fn new(
        registry: DeliveryRegistry,
        clock: Arc<dyn TimeProvider>,
        interval: Duration,
        retention: Duration,
        events: EventSender,
    ) -> Self {
        Self {
            registry,
            clock,
            interval,
            retention: TimeDelta::from_std(retention).unwrap_or(TimeDelta::MAX),
            events,
        }
    }

    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!("archive reaper started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.clock.sleep(self.interval) => {}
            }
            self.reap_once(self.clock.utc_now()).await;
        }

        info!("archive reaper stopped");
    }

    /// One reap pass: delete every record archived longer ago than the
    /// retention threshold as of the snapshot. Younger records are left alone.
    pub async fn reap_once(&self, now: DateTime<Utc>) {
        let snapshot = self.registry.snapshot().await;
        for (id, record) in snapshot {
            if record.status != DeliveryStatus::Archived {
                continue;
            }
            let Some(archived_at) = record.archived_at else {
                // Unreachable by the registry's archival invariant.
                continue;
            };
            if now.signed_duration_since(archived_at) > self.retention {
                if self.registry.remove(id).await {
                    info!(dispatch = %id, "archived record reaped");
                    self.events.emit(EngineEvent::Reaped { id });
                }
            } else {
                debug!(dispatch = %id, "archived record still within retention");
            }
        }
    }
}

//! Engine assembly and the collaborator-facing surface: submit orders, query
//! dispatch status, shut down.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::EngineConfig;
use crate::dispatch::{Dispatcher, ProviderSelector, UniformSelector};
use crate::error::{RelayError, Result};
use crate::events::{EngineEvent, EventSender};
use crate::provider::{DeliveryProvider, SimulatedProvider};
use crate::record::{DeliveryStatus, DispatchId, ProviderKind};
use crate::registry::DeliveryRegistry;
use crate::reaper::ArchiveReaper;
use crate::scheduler::OrderScheduler;
use crate::sweeper::StatusSweeper;
use crate::time::{SystemTimeProvider, TimeProvider};

/// When a submitted order becomes due.
#[derive(Clone, Copy, Debug)]
pub enum OrderDeadline {
    /// Due after this much time from submission.
    Delay(Duration),
    /// Due at an absolute instant. Past instants release on the next poll.
    At(DateTime<Utc>),
}

/// Builds an engine, supplying defaults for everything not overridden:
/// system time, uniform provider selection, and the two simulated providers
/// configured from [`EngineConfig`].
pub struct EngineBuilder {
    config: EngineConfig,
    clock: Arc<dyn TimeProvider>,
    selector: Arc<dyn ProviderSelector>,
    providers: Vec<Arc<dyn DeliveryProvider>>,
    events: EventSender,
}

impl fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .field("provider_count", &self.providers.len())
            .finish()
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            clock: Arc::new(SystemTimeProvider),
            selector: Arc::new(UniformSelector),
            providers: Vec::new(),
            events: EventSender::disabled(),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    pub fn selector(mut self, selector: Arc<dyn ProviderSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Register a provider, replacing the built-in set.
    pub fn provider(mut self, provider: Arc<dyn DeliveryProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Forward engine events to this channel.
    pub fn events(mut self, tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        self.events = EventSender::new(tx);
        self
    }

    /// Wire everything together and spawn the scheduler, sweeper, and reaper
    /// loops.
    pub fn start(self) -> EngineHandle {
        let registry = DeliveryRegistry::new();

        let providers = if self.providers.is_empty() {
            vec![
                Arc::new(SimulatedProvider::new(
                    ProviderKind::Express,
                    self.config.express_delay,
                    self.clock.clone(),
                    self.events.clone(),
                )) as Arc<dyn DeliveryProvider>,
                Arc::new(SimulatedProvider::new(
                    ProviderKind::Standard,
                    self.config.standard_delay,
                    self.clock.clone(),
                    self.events.clone(),
                )) as Arc<dyn DeliveryProvider>,
            ]
        } else {
            self.providers
        };

        let dispatcher = Arc::new(Dispatcher::new(
            providers,
            self.selector,
            registry.clone(),
            self.events.clone(),
        ));

        let scheduler = Arc::new(OrderScheduler::new(
            dispatcher,
            self.clock.clone(),
            self.config.poll_interval,
            self.events.clone(),
        ));
        let sweeper = Arc::new(StatusSweeper::new(
            registry.clone(),
            self.clock.clone(),
            self.config.sweep_interval,
            self.events.clone(),
        ));
        let reaper = Arc::new(ArchiveReaper::new(
            registry.clone(),
            self.clock.clone(),
            self.config.reap_interval,
            self.config.retention,
            self.events.clone(),
        ));

        let cancel = CancellationToken::new();
        let tasks = vec![
            tokio::spawn(scheduler.clone().run(cancel.clone())),
            tokio::spawn(sweeper.run(cancel.clone())),
            tokio::spawn(reaper.run(cancel.clone())),
        ];

        info!("engine started");

        EngineHandle {
            scheduler,
            registry,
            clock: self.clock,
            cancel,
            tasks,
        }
    }
}

/// Running engine. Dropping the handle without calling
/// [`EngineHandle::shutdown`] leaves the background loops running until the
/// runtime itself stops.
pub struct EngineHandle {
    scheduler: Arc<OrderScheduler>,
    registry: DeliveryRegistry,
    clock: Arc<dyn TimeProvider>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("task_count", &self.tasks.len())
            .field("shutting_down", &self.cancel.is_cancelled())
            .finish()
    }
}

impl EngineHandle {
    /// Submit an order. Validation errors surface here synchronously and
    /// affect no other order.
    pub async fn submit_order(&self, name: &str, deadline: OrderDeadline) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(RelayError::ShuttingDown);
        }
        let scheduled_at = match deadline {
            OrderDeadline::Delay(delay) => {
                let delta = TimeDelta::from_std(delay).unwrap_or(TimeDelta::MAX);
                self.clock
                    .utc_now()
                    .checked_add_signed(delta)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC)
            }
            OrderDeadline::At(at) => at,
        };
        self.scheduler.submit(name, scheduled_at).await
    }

    /// Current status of a dispatch. `None` covers never-existed and
    /// already-reaped identifiers alike; the two are indistinguishable by
    /// design.
    pub async fn query_dispatch_status(&self, id: DispatchId) -> Option<DeliveryStatus> {
        self.registry.status(id).await
    }

    pub async fn pending_orders(&self) -> usize {
        self.scheduler.pending_len().await
    }

    pub fn registry(&self) -> &DeliveryRegistry {
        &self.registry
    }

    /// Signal the scheduler, sweeper, and reaper to exit and wait for them.
    /// In-flight provider fulfillments are detached and left to complete.
    pub async fn shutdown(self) {
        info!("engine shutting down");
        self.cancel.cancel();
        for task in self.tasks {
            let _ = task.await;
        }
        info!("engine stopped");
    }
}

//! Dispatcher: turns a released order into a registry record and kicks off
//! provider fulfillment.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rand::seq::IndexedRandom;
use tracing::info;

use crate::error::{RelayError, Result};
use crate::events::{EngineEvent, EventSender};
use crate::provider::DeliveryProvider;
use crate::record::{DeliveryRecord, DispatchId, ProviderKind};
use crate::registry::DeliveryRegistry;

/// Pluggable provider-selection policy. The default is uniform random; tests
/// swap in a deterministic policy.
pub trait ProviderSelector: Send + Sync {
    fn select(&self, kinds: &[ProviderKind]) -> Option<ProviderKind>;
}

/// Uniform random choice among the registered provider kinds.
#[derive(Clone, Copy, Debug, Default)]
pub struct UniformSelector;

impl ProviderSelector for UniformSelector {
    fn select(&self, kinds: &[ProviderKind]) -> Option<ProviderKind> {
        kinds.choose(&mut rand::rng()).copied()
    }
}

/// Always selects the same provider kind. Deterministic, for tests and for
/// callers that pin a channel.
#[derive(Clone, Copy, Debug)]
pub struct FixedSelector(pub ProviderKind);

impl ProviderSelector for FixedSelector {
    fn select(&self, _kinds: &[ProviderKind]) -> Option<ProviderKind> {
        Some(self.0)
    }
}

/// Source of fresh dispatch identifiers. Swapped out in tests to force
/// collisions.
type IdSource = dyn Fn() -> DispatchId + Send + Sync;

pub struct Dispatcher {
    providers: HashMap<ProviderKind, Arc<dyn DeliveryProvider>>,
    kinds: Vec<ProviderKind>,
    selector: Arc<dyn ProviderSelector>,
    registry: DeliveryRegistry,
    events: EventSender,
    ids: Arc<IdSource>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("kinds", &self.kinds)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(
        providers: Vec<Arc<dyn DeliveryProvider>>,
        selector: Arc<dyn ProviderSelector>,
        registry: DeliveryRegistry,
        events: EventSender,
    ) -> Self {
        let providers: HashMap<_, _> = providers
            .into_iter()
            .map(|provider| (provider.kind(), provider))
            .collect();
        let kinds = providers.keys().copied().collect();
        Self {
            providers,
            kinds,
            selector,
            registry,
            events,
            ids: Arc::new(DispatchId::new),
        }
    }

    /// Replace the identifier source.
    pub fn id_source(mut self, ids: impl Fn() -> DispatchId + Send + Sync + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    pub fn registry(&self) -> &DeliveryRegistry {
        &self.registry
    }

    /// Dispatch a released order: pick a provider, create the registry entry,
    /// and start fulfillment. Returns as soon as fulfillment is handed off.
    ///
    /// A selection outside the registered provider set aborts this order only;
    /// an identifier collision regenerates instead of overwriting.
    pub async fn dispatch(&self, order_name: &str) -> Result<DispatchId> {
        let kind = self
            .selector
            .select(&self.kinds)
            .ok_or(RelayError::NoProviders)?;
        let provider = self
            .providers
            .get(&kind)
            .ok_or(RelayError::UnknownProvider(kind))?;

        let mut id = (self.ids)();
        loop {
            match self.registry.insert(id, DeliveryRecord::ongoing(kind)).await {
                Ok(()) => break,
                Err(RelayError::DuplicateDispatch(_)) => {
                    id = (self.ids)();
                }
                Err(error) => return Err(error),
            }
        }

        provider.fulfill(id, self.registry.clone()).await?;

        info!(order = order_name, dispatch = %id, provider = %kind, "order dispatched");
        self.events.emit(EngineEvent::Dispatched {
            id,
            name: order_name.to_string(),
            provider: kind,
        });
        Ok(id)
    }
}

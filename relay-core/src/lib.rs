//! # Relay Core
//!
//! Delayed-order scheduling and dispatch engine. Relay accepts named work
//! items tagged with a future execution time, holds them until due, hands each
//! to one of several interchangeable fulfillment providers, tracks every
//! dispatched item through a short status lifecycle, and reclaims stale
//! records after a retention window.
//!
//! ## Overview
//!
//! - **Scheduler**: time-ordered pending queue with a background release loop
//! - **Dispatcher**: provider selection, identifier generation, record creation
//! - **Providers**: interchangeable fulfillment strategies with distinct
//!   latency profiles
//! - **Registry**: the single shared source of truth for dispatch state, safe
//!   under concurrent access
//! - **Sweeper / Reaper**: background promotion of finished records to
//!   archived, and deletion of archives past retention
//!
//! Status transitions only move forward: `Ongoing -> Finished -> Archived ->
//! (removed)`.
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//! use relay_core::{EngineBuilder, OrderDeadline};
//!
//! #[tokio::main]
//! async fn main() -> relay_core::Result<()> {
//!     let engine = EngineBuilder::new().start();
//!     engine
//!         .submit_order("pizza", OrderDeadline::Delay(Duration::from_secs(5)))
//!         .await?;
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```

/// Engine tuning knobs and provider delay ranges
pub mod config;
/// Dispatcher and provider-selection policies
pub mod dispatch;
/// Engine assembly and the collaborator-facing handle
pub mod engine;
/// Error types
pub mod error;
/// Side-channel engine events
pub mod events;
/// Delivery provider strategies
pub mod provider;
/// Archive reaper background process
pub mod reaper;
/// Dispatch records and status lifecycle
pub mod record;
/// Shared delivery registry
pub mod registry;
/// Order scheduler and release loop
pub mod scheduler;
/// Status sweeper background process
pub mod sweeper;
/// Time abstraction for production and tests
pub mod time;

pub use config::{DelayRange, EngineConfig};
pub use dispatch::{Dispatcher, FixedSelector, ProviderSelector, UniformSelector};
pub use engine::{EngineBuilder, EngineHandle, OrderDeadline};
pub use error::{RelayError, Result};
pub use events::{EngineEvent, EventSender};
pub use provider::{DeliveryProvider, SimulatedProvider};
pub use record::{DeliveryRecord, DeliveryStatus, DispatchId, Order, ProviderKind};
pub use registry::DeliveryRegistry;
pub use reaper::ArchiveReaper;
pub use scheduler::OrderScheduler;
pub use sweeper::StatusSweeper;
pub use time::{SystemTimeProvider, TimeProvider, VirtualTimeProvider};

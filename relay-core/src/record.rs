//! Core data model: dispatch identifiers, provider kinds, and the delivery
//! record lifecycle.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a dispatched order. Random 128-bit token, generated
/// by the dispatcher at release time and never reused.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct DispatchId(Uuid);

impl DispatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for DispatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DispatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Fulfillment channel a dispatch was assigned to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    /// Fast channel, short fulfillment delays.
    Express,
    /// Slow channel, longer fulfillment delays.
    Standard,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Express => write!(f, "express"),
            ProviderKind::Standard => write!(f, "standard"),
        }
    }
}

/// Lifecycle status of a dispatch. Transitions only move forward:
/// `Ongoing -> Finished -> Archived -> (removed)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Ongoing,
    Finished,
    Archived,
}

impl DeliveryStatus {
    /// The single status this one may advance to, if any.
    pub fn next(&self) -> Option<DeliveryStatus> {
        match self {
            DeliveryStatus::Ongoing => Some(DeliveryStatus::Finished),
            DeliveryStatus::Finished => Some(DeliveryStatus::Archived),
            DeliveryStatus::Archived => None,
        }
    }

    pub fn can_advance_to(&self, new: DeliveryStatus) -> bool {
        self.next() == Some(new)
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryStatus::Ongoing => write!(f, "ongoing"),
            DeliveryStatus::Finished => write!(f, "finished"),
            DeliveryStatus::Archived => write!(f, "archived"),
        }
    }
}

/// Runtime record for a released order, owned by the registry for its
/// lifetime. `archived_at` is `Some` if and only if the status is `Archived`;
/// it gates reaping and nothing else.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub provider: ProviderKind,
    pub status: DeliveryStatus,
    pub archived_at: Option<DateTime<Utc>>,
}

impl DeliveryRecord {
    pub fn ongoing(provider: ProviderKind) -> Self {
        Self {
            provider,
            status: DeliveryStatus::Ongoing,
            archived_at: None,
        }
    }
}

/// A submitted order waiting for release. Exists only inside the scheduler's
/// pending queue; it carries no status until released into a dispatch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Order {
    pub name: String,
    pub scheduled_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_only_advances_forward() {
        assert!(DeliveryStatus::Ongoing.can_advance_to(DeliveryStatus::Finished));
        assert!(DeliveryStatus::Finished.can_advance_to(DeliveryStatus::Archived));

        assert!(!DeliveryStatus::Ongoing.can_advance_to(DeliveryStatus::Archived));
        assert!(!DeliveryStatus::Finished.can_advance_to(DeliveryStatus::Ongoing));
        assert!(!DeliveryStatus::Archived.can_advance_to(DeliveryStatus::Ongoing));
        assert!(!DeliveryStatus::Archived.can_advance_to(DeliveryStatus::Finished));
    }

    #[test]
    fn archived_is_terminal() {
        assert_eq!(DeliveryStatus::Archived.next(), None);
    }

    #[test]
    fn dispatch_ids_are_unique() {
        let a = DispatchId::new();
        let b = DispatchId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn fresh_record_has_no_timestamp() {
        let record = DeliveryRecord::ongoing(ProviderKind::Express);
        assert_eq!(record.status, DeliveryStatus::Ongoing);
        assert!(record.archived_at.is_none());
    }
}

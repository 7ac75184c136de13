use std::time::Duration;

use thiserror::Error;

use crate::record::{DeliveryStatus, DispatchId, ProviderKind};

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("order name must not be empty")]
    EmptyOrderName,

    #[error("unknown delivery provider: {0}")]
    UnknownProvider(ProviderKind),

    #[error("no delivery providers registered")]
    NoProviders,

    #[error("dispatch {0} already exists in the registry")]
    DuplicateDispatch(DispatchId),

    #[error("dispatch {0} not found")]
    DispatchNotFound(DispatchId),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: DeliveryStatus,
        to: DeliveryStatus,
    },

    #[error("invalid delay range: min {min:?} exceeds max {max:?}")]
    InvalidDelayRange { min: Duration, max: Duration },

    #[error("engine is shutting down")]
    ShuttingDown,
}

pub type Result<T> = std::result::Result<T, RelayError>;

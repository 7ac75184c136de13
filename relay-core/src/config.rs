//! Engine tuning knobs. All fields carry defaults so callers only override
//! what they need; tests shrink every interval to milliseconds.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

/// Inclusive fulfillment delay range for a provider.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub fn new(min: Duration, max: Duration) -> Result<Self> {
        if min > max {
            return Err(RelayError::InvalidDelayRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// Draw a uniformly random delay from the range.
    pub fn sample(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        let mut rng = rand::rng();
        Duration::from_millis(rng.random_range(min..=max))
    }
}

/// Global knobs that tune engine behaviour.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on how long the scheduler waits between due-order checks.
    /// Release latency after an order's scheduled time is bounded by this.
    pub poll_interval: Duration,
    /// Cadence of the finished-to-archived sweep.
    pub sweep_interval: Duration,
    /// Cadence of the archive reap. Usually equal to or coarser than the sweep.
    pub reap_interval: Duration,
    /// Maximum time an archived record may remain before deletion.
    pub retention: Duration,
    /// Fulfillment delay range for the express provider.
    pub express_delay: DelayRange,
    /// Fulfillment delay range for the standard provider. Disjoint from the
    /// express range so provider selection stays observable.
    pub standard_delay: DelayRange,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            sweep_interval: Duration::from_millis(750),
            reap_interval: Duration::from_secs(2),
            retention: Duration::from_secs(60),
            express_delay: DelayRange {
                min: Duration::from_secs(1),
                max: Duration::from_secs(3),
            },
            standard_delay: DelayRange {
                min: Duration::from_secs(4),
                max: Duration::from_secs(8),
            },
        }
    }
}

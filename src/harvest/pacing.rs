//! Randomized inter-request delay.
//!
//! After every item except the last one in a pass, the loop waits a delay
//! drawn uniformly from `[min, max]`. An equal `min` and `max` gives a fixed
//! delay; zero disables pacing entirely (used by tests).

use std::time::Duration;

use rand::Rng;

use super::HarvestError;

/// Default lower bound of the inter-request delay (1.5 seconds).
pub const DEFAULT_DELAY_MIN: Duration = Duration::from_millis(1500);

/// Default upper bound of the inter-request delay (3.5 seconds).
pub const DEFAULT_DELAY_MAX: Duration = Duration::from_millis(3500);

/// Uniform jitter between two bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    min: Duration,
    max: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            min: DEFAULT_DELAY_MIN,
            max: DEFAULT_DELAY_MAX,
        }
    }
}

impl Pacing {
    /// Creates pacing with the given bounds.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::InvalidDelayRange`] if `min > max`.
    pub fn new(min: Duration, max: Duration) -> Result<Self, HarvestError> {
        if min > max {
            return Err(HarvestError::InvalidDelayRange {
                min: min.as_secs_f64(),
                max: max.as_secs_f64(),
            });
        }
        Ok(Self { min, max })
    }

    /// Creates pacing from bounds in seconds, as given on the command line.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::InvalidDelayRange`] for negative, non-finite or
    /// inverted bounds.
    pub fn from_secs_f64(min: f64, max: f64) -> Result<Self, HarvestError> {
        let invalid = || HarvestError::InvalidDelayRange { min, max };
        let min_duration = Duration::try_from_secs_f64(min).map_err(|_| invalid())?;
        let max_duration = Duration::try_from_secs_f64(max).map_err(|_| invalid())?;
        Self::new(min_duration, max_duration)
    }

    /// No delay between items.
    #[must_use]
    pub fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    /// Returns the lower bound.
    #[must_use]
    pub fn min(&self) -> Duration {
        self.min
    }

    /// Returns the upper bound.
    #[must_use]
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Draws the next delay.
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }
}

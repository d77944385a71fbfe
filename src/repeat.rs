//! The adaptive step-repeat controller.
//!
//! Every control call asks the remote to execute `repeat` simulation ticks
//! in one round trip. Batching more ticks per call hides network and render
//! latency; batching fewer keeps the session responsive. The controller
//! nudges `repeat` by at most one per completed call, comparing the call's
//! measured duration against a target cadence with a dead band on either
//! side so it does not oscillate. Plain hysteresis, no integral or
//! derivative term.

use std::time::Duration;

/// Default wall-clock cadence the controller converges toward per call.
const DEFAULT_TARGET: Duration = Duration::from_millis(55);

/// Fraction of the target below which the batch shrinks.
const DEFAULT_FAST_FACTOR: f64 = 0.75;

/// Fraction of the target above which the batch grows.
const DEFAULT_SLOW_FACTOR: f64 = 1.25;

/// Smallest batch: one tick per call. Also the value every (re)created
/// session starts from.
const MIN_REPEAT: u32 = 1;

/// Largest batch. Beyond this the session feels sluggish regardless of how
/// slow the link is.
const MAX_REPEAT: u32 = 6;

/// Tuning for [`RepeatController`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepeatConfig {
    /// Target duration of one control call.
    pub target: Duration,
    /// Calls faster than `target * fast_factor` shrink the batch.
    pub fast_factor: f64,
    /// Calls slower than `target * slow_factor` grow the batch.
    pub slow_factor: f64,
}

impl Default for RepeatConfig {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET,
            fast_factor: DEFAULT_FAST_FACTOR,
            slow_factor: DEFAULT_SLOW_FACTOR,
        }
    }
}

/// Decides how many simulation ticks to request per control call.
///
/// The judgment always uses the *requested* repeat (what the controller is
/// tuning), never the tick count the remote actually executed; the episode
/// ending mid-batch must not read as the link speeding up.
#[derive(Debug, Clone)]
pub struct RepeatController {
    repeat: u32,
    config: RepeatConfig,
}

impl Default for RepeatController {
    fn default() -> Self {
        Self::new(RepeatConfig::default())
    }
}

impl RepeatController {
    /// Creates a controller at the floor value.
    #[must_use]
    pub fn new(config: RepeatConfig) -> Self {
        Self {
            repeat: MIN_REPEAT,
            config,
        }
    }

    /// The number of ticks the next call should request.
    #[must_use]
    pub fn current(&self) -> u32 {
        self.repeat
    }

    /// Feeds one completed call's measured duration into the controller.
    ///
    /// Moves `repeat` by at most one step and clamps it to the fixed range.
    pub fn observe(&mut self, dt: Duration) {
        let dt = dt.as_secs_f64();
        let target = self.config.target.as_secs_f64();
        if dt > target * self.config.slow_factor {
            self.repeat = (self.repeat + 1).min(MAX_REPEAT);
        } else if dt < target * self.config.fast_factor {
            self.repeat = self.repeat.saturating_sub(1).max(MIN_REPEAT);
        }
    }

    /// Drops back to the floor value. Called on every session creation,
    /// recreation and reset.
    pub fn reset(&mut self) {
        self.repeat = MIN_REPEAT;
    }
}

/// Display-only throughput metric: simulation ticks per second achieved by
/// one call. Computed from the ticks the remote *actually executed*; it has
/// no feedback role.
#[must_use]
pub fn throughput(executed_ticks: u32, dt: Duration) -> f64 {
    let millis = dt.as_secs_f64() * 1000.0;
    if millis <= 0.0 {
        return 0.0;
    }
    f64::from(executed_ticks) * 1000.0 / millis
}

//! Configuration for the client core.

use std::time::Duration;

use crate::repeat::RepeatConfig;
use crate::wire::CreateRequest;

/// Environment the client targets unless configured otherwise.
pub const DEFAULT_ENV_ID: &str = "LunarLander-v3";

/// Default number of session creation attempts before giving up.
const DEFAULT_CREATE_ATTEMPTS: u32 = 4;

/// Default first backoff delay between creation attempts. Doubles on each
/// retry, so the default budget waits 250/500/1000 ms between the four
/// attempts, well under the transport deadline.
const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(250);

/// Default pause before retrying a step call that failed transiently.
const DEFAULT_STEP_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Retry budget for session creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Total attempts, including the first one. Must be at least 1.
    pub attempts: u32,
    /// Delay after the first failed attempt; doubles after each further
    /// failure.
    pub base_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_CREATE_ATTEMPTS,
            base_delay: DEFAULT_BACKOFF_BASE,
        }
    }
}

/// Everything the loops need to know that is not per-tick state.
#[derive(Debug, Clone, PartialEq)]
pub struct DriveConfig {
    /// Environment identifier passed on session creation.
    pub env_id: String,
    /// Requested render width, if the default is not wanted.
    pub render_w: Option<u32>,
    /// Requested render height, if the default is not wanted.
    pub render_h: Option<u32>,
    /// Pole-angle threshold override for environments that expose one.
    pub angle_deg: Option<f64>,
    /// Cart-position threshold override for environments that expose one.
    pub x_threshold: Option<f64>,
    /// Cap on episode length in ticks, if any.
    pub max_steps: Option<u32>,
    /// Tuning for the adaptive repeat controller.
    pub repeat: RepeatConfig,
    /// Retry budget for session creation and recovery.
    pub backoff: BackoffConfig,
    /// Pause before retrying after a transient step failure.
    pub step_retry_delay: Duration,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            env_id: DEFAULT_ENV_ID.to_owned(),
            render_w: None,
            render_h: None,
            angle_deg: None,
            x_threshold: None,
            max_steps: None,
            repeat: RepeatConfig::default(),
            backoff: BackoffConfig::default(),
            step_retry_delay: DEFAULT_STEP_RETRY_DELAY,
        }
    }
}

impl DriveConfig {
    /// Replaces the target environment.
    #[must_use]
    pub fn with_env_id(mut self, env_id: impl Into<String>) -> Self {
        self.env_id = env_id.into();
        self
    }

    /// Requests a specific render size from the remote.
    #[must_use]
    pub fn with_render_size(mut self, width: u32, height: u32) -> Self {
        self.render_w = Some(width);
        self.render_h = Some(height);
        self
    }

    /// Caps episode length.
    #[must_use]
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Builds the creation request for this configuration with an optional
    /// seed.
    #[must_use]
    pub fn create_request(&self, seed: Option<u64>) -> CreateRequest {
        CreateRequest {
            env_id: self.env_id.clone(),
            seed,
            angle_deg: self.angle_deg,
            x_threshold: self.x_threshold,
            max_steps: self.max_steps,
            render_w: self.render_w,
            render_h: self.render_h,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_the_lander() {
        let config = DriveConfig::default();
        assert_eq!(config.env_id, "LunarLander-v3");
        assert_eq!(config.backoff.attempts, 4);
    }

    #[test]
    fn create_request_reflects_config_and_seed() {
        let config = DriveConfig::default()
            .with_env_id("CartPole-v1")
            .with_render_size(400, 300)
            .with_max_steps(500);
        let req = config.create_request(Some(7));
        assert_eq!(req.env_id, "CartPole-v1");
        assert_eq!(req.seed, Some(7));
        assert_eq!(req.render_w, Some(400));
        assert_eq!(req.render_h, Some(300));
        assert_eq!(req.max_steps, Some(500));
    }
}

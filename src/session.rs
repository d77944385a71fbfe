//! Client-side session handles and the creation/recovery protocol.
//!
//! A [`SessionHandle`] tracks one remote simulation instance: its identity,
//! the freshest rendered frame, episode completion, and the reward
//! accumulators. Handles are created by [`create_session`] (with exponential
//! backoff) and destroyed implicitly, by being dropped when a new handle
//! replaces them in the same role. The observed remote contract has no
//! delete call.

use tracing::{debug, warn};

use crate::config::DriveConfig;
use crate::endpoint::Endpoint;
use crate::error::{DriveError, DriveResult};
use crate::wire::{CreateResponse, ResetResponse, StepResponse};
use crate::Role;

/// Opaque session identifier assigned by the remote endpoint at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps a raw identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier, as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-side record of one remote session.
///
/// Invariant: a handle whose episode is done never receives another step
/// call. It can only be reset in place or replaced by a fresh handle.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionHandle {
    id: SessionId,
    last_frame: String,
    done: bool,
    episode_reward: f64,
    last_step_reward: f64,
}

impl SessionHandle {
    /// Builds a handle from a successful creation response. Accumulators
    /// start at exactly zero.
    #[must_use]
    pub fn from_create(resp: CreateResponse) -> Self {
        Self {
            id: SessionId::new(resp.session_id),
            last_frame: resp.frame,
            done: resp.done,
            episode_reward: 0.0,
            last_step_reward: 0.0,
        }
    }

    /// The remote identity of this session.
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// The most recent rendered frame (base64-encoded image).
    #[must_use]
    pub fn last_frame(&self) -> &str {
        &self.last_frame
    }

    /// Whether the remote episode reported completion.
    #[must_use]
    pub fn done(&self) -> bool {
        self.done
    }

    /// Reward accumulated since the last creation or reset. Exact running
    /// addition of per-step rewards.
    #[must_use]
    pub fn episode_reward(&self) -> f64 {
        self.episode_reward
    }

    /// The most recent single-call reward (not accumulated).
    #[must_use]
    pub fn last_step_reward(&self) -> f64 {
        self.last_step_reward
    }

    /// Applies a successful step response: replaces the frame, records and
    /// accumulates the reward, and latches `done`.
    pub fn apply_step(&mut self, resp: &StepResponse) {
        self.last_frame.clone_from(&resp.frame);
        if let Some(reward) = resp.reward {
            self.last_step_reward = reward;
            self.episode_reward += reward;
        }
        if resp.done {
            self.done = true;
        }
    }

    /// Applies a successful reset response: fresh frame, accumulators back
    /// to exactly zero, episode no longer done. Identity is unchanged.
    pub fn apply_reset(&mut self, resp: &ResetResponse) {
        self.last_frame.clone_from(&resp.frame);
        self.done = resp.done;
        self.episode_reward = 0.0;
        self.last_step_reward = 0.0;
    }
}

/// Creates a session, retrying with exponential backoff.
///
/// Makes up to `config.backoff.attempts` attempts, sleeping between them
/// starting at `config.backoff.base_delay` and doubling each time.
///
/// # Errors
/// Returns [`DriveError::Initialization`] once the attempt budget is
/// exhausted. Callers surface this as status; it must never crash the loop.
pub async fn create_session<E>(
    endpoint: &E,
    config: &DriveConfig,
    seed: Option<u64>,
) -> DriveResult<SessionHandle>
where
    E: Endpoint + ?Sized,
{
    let attempts = config.backoff.attempts.max(1);
    let mut delay = config.backoff.base_delay;
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match endpoint.create(config.create_request(seed)).await {
            Ok(resp) => {
                debug!(session_id = %resp.session_id, ?seed, attempt, "session created");
                return Ok(SessionHandle::from_create(resp));
            }
            Err(err) => {
                warn!(attempt, attempts, %err, "session creation failed");
                last_error = err.to_string();
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    Err(DriveError::Initialization {
        attempts,
        context: last_error,
    })
}

/// Recreates a session for `role` after the remote reported it missing.
///
/// The stale handle must already have been discarded by the caller. Duel
/// loops pass the duel's shared seed so the recreated side stays on terrain
/// equivalent to the surviving one; single loops pass `None`.
///
/// # Errors
/// Returns [`DriveError::RecoveryFailed`], which aborts the calling loop.
pub async fn recover_session<E>(
    endpoint: &E,
    config: &DriveConfig,
    role: Role,
    seed: Option<u64>,
) -> DriveResult<SessionHandle>
where
    E: Endpoint + ?Sized,
{
    create_session(endpoint, config, seed)
        .await
        .map_err(|err| DriveError::RecoveryFailed {
            role,
            context: err.to_string(),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::wire::{CreateResponse, ResetResponse, StepResponse};

    fn created() -> SessionHandle {
        SessionHandle::from_create(CreateResponse {
            session_id: "sess-1".to_owned(),
            obs: vec![],
            frame: "f0".to_owned(),
            done: false,
        })
    }

    fn step(reward: Option<f64>, done: bool, frame: &str) -> StepResponse {
        StepResponse {
            obs: vec![],
            reward,
            done,
            frame: frame.to_owned(),
            action: None,
            steps: Some(1),
        }
    }

    #[test]
    fn creation_zeroes_accumulators() {
        let handle = created();
        assert_eq!(handle.episode_reward(), 0.0);
        assert_eq!(handle.last_step_reward(), 0.0);
        assert!(!handle.done());
        assert_eq!(handle.id().as_str(), "sess-1");
    }

    #[test]
    fn rewards_accumulate_by_exact_addition() {
        let mut handle = created();
        handle.apply_step(&step(Some(1.5), false, "f1"));
        handle.apply_step(&step(Some(-0.2), false, "f2"));
        handle.apply_step(&step(Some(3.0), false, "f3"));
        assert!((handle.episode_reward() - 4.3).abs() < 1e-12);
        assert_eq!(handle.last_step_reward(), 3.0);
        assert_eq!(handle.last_frame(), "f3");
    }

    #[test]
    fn missing_reward_leaves_accumulators_alone() {
        let mut handle = created();
        handle.apply_step(&step(Some(2.0), false, "f1"));
        handle.apply_step(&step(None, false, "f2"));
        assert_eq!(handle.episode_reward(), 2.0);
        assert_eq!(handle.last_step_reward(), 2.0);
        // Frame is still replaced.
        assert_eq!(handle.last_frame(), "f2");
    }

    #[test]
    fn done_latches() {
        let mut handle = created();
        handle.apply_step(&step(Some(1.0), true, "f1"));
        assert!(handle.done());
    }

    #[test]
    fn reset_zeroes_and_clears_done_without_changing_identity() {
        let mut handle = created();
        handle.apply_step(&step(Some(5.0), true, "f1"));
        handle.apply_reset(&ResetResponse {
            obs: vec![],
            frame: "fr".to_owned(),
            done: false,
        });
        assert_eq!(handle.id().as_str(), "sess-1");
        assert_eq!(handle.episode_reward(), 0.0);
        assert_eq!(handle.last_step_reward(), 0.0);
        assert!(!handle.done());
        assert_eq!(handle.last_frame(), "fr");
    }
}

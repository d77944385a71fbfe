//! The single control loop: one session, human- or agent-piloted.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, trace, warn};
use web_time::Instant;

use crate::config::DriveConfig;
use crate::endpoint::Endpoint;
use crate::error::{DriveError, DriveResult};
use crate::event::{DriveEvent, EventSink, Status};
use crate::input::SharedInput;
use crate::lifecycle::LoopToken;
use crate::repeat::{throughput, RepeatController};
use crate::session::{recover_session, SessionHandle};
use crate::wire::{AgentStepRequest, ResetRequest, StepRequest};
use crate::{LoopEnd, Role};

/// Drives one session until the episode completes, the loop is cancelled,
/// or a fatal error occurs.
///
/// Each tick computes an action from the current input state (human) or
/// defers to the server-side policy (agent), issues exactly one call, and
/// applies the result. The loop suspends only at that call and at the
/// transient-failure pause, and re-checks its [`LoopToken`] after every
/// suspension so cancellation is prompt and stale results are discarded.
pub struct SingleLoop<'a, E: ?Sized> {
    endpoint: &'a E,
    config: &'a DriveConfig,
    role: Role,
    input: SharedInput,
    auto_demo: &'a AtomicBool,
    events: EventSink,
    token: LoopToken,
    handle: SessionHandle,
    controller: RepeatController,
}

impl<'a, E: Endpoint + ?Sized> SingleLoop<'a, E> {
    /// Assembles a loop around an existing handle. The handle and controller
    /// come from the driver's slot so a halted episode (and its tuned
    /// repeat) survive mode switches.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        endpoint: &'a E,
        config: &'a DriveConfig,
        role: Role,
        handle: SessionHandle,
        controller: RepeatController,
        input: SharedInput,
        auto_demo: &'a AtomicBool,
        events: EventSink,
        token: LoopToken,
    ) -> Self {
        Self {
            endpoint,
            config,
            role,
            input,
            auto_demo,
            events,
            token,
            handle,
            controller,
        }
    }

    /// Releases the handle and controller, for parking back in the driver's
    /// slot.
    #[must_use]
    pub fn into_parts(self) -> (SessionHandle, RepeatController) {
        (self.handle, self.controller)
    }

    /// Runs the loop to its end.
    ///
    /// # Errors
    /// Returns [`DriveError::RecoveryFailed`] if automatic recovery of a
    /// vanished session fails; the matching [`Status::Failed`] has already
    /// been emitted. Transient step failures never escape, the loop pauses
    /// and retries them itself.
    pub async fn run(&mut self) -> DriveResult<LoopEnd> {
        loop {
            if self.token.is_stale() {
                debug!(role = %self.role, "single loop cancelled");
                return Ok(LoopEnd::Cancelled);
            }

            if self.handle.done() {
                if self.role == Role::Agent && self.auto_demo.load(Ordering::Relaxed) {
                    // Auto-demo: replay immediately instead of halting.
                    self.reset_in_place().await?;
                    continue;
                }
                debug!(role = %self.role, reward = self.handle.episode_reward(), "episode finished");
                self.events.send(DriveEvent::EpisodeFinished {
                    role: self.role,
                    episode_reward: self.handle.episode_reward(),
                });
                self.events.status(Status::EpisodeFinished);
                return Ok(LoopEnd::Finished);
            }

            let repeat = self.controller.current();
            let started = Instant::now();
            let result = match self.role {
                Role::Human => {
                    let action = self.input.snapshot().action();
                    self.endpoint
                        .step(StepRequest {
                            session_id: self.handle.id().as_str().to_owned(),
                            action: action.code(),
                            repeat,
                        })
                        .await
                }
                Role::Agent => {
                    self.endpoint
                        .agent_step(AgentStepRequest {
                            session_id: self.handle.id().as_str().to_owned(),
                            repeat,
                        })
                        .await
                }
            };
            let dt = started.elapsed();

            if self.token.is_stale() {
                trace!(role = %self.role, "discarding in-flight result after cancellation");
                return Ok(LoopEnd::Cancelled);
            }

            match result {
                Ok(step) => {
                    self.handle.apply_step(&step);
                    self.controller.observe(dt);
                    let executed = step.steps.unwrap_or(repeat);
                    trace!(
                        role = %self.role,
                        repeat,
                        executed,
                        dt_ms = dt.as_secs_f64() * 1000.0,
                        "tick applied"
                    );
                    self.events.send(DriveEvent::Frame {
                        role: self.role,
                        frame: self.handle.last_frame().to_owned(),
                        step_reward: self.handle.last_step_reward(),
                        episode_reward: self.handle.episode_reward(),
                        repeat,
                        ticks_per_second: throughput(executed, dt),
                    });
                }
                Err(err) if err.is_session_lost() => {
                    self.recover(&err.to_string()).await?;
                }
                Err(err) => {
                    warn!(role = %self.role, %err, "step failed, pausing before retry");
                    self.events.status(Status::Failed(DriveError::StepFailed {
                        context: err.to_string(),
                    }));
                    tokio::time::sleep(self.config.step_retry_delay).await;
                }
            }
        }
    }

    /// Recreates the session after the remote reported it missing. Single
    /// sessions are unseeded, so recovery is too.
    async fn recover(&mut self, detail: &str) -> DriveResult<()> {
        warn!(role = %self.role, detail, "remote session vanished, recovering");
        self.events.status(Status::Recovering { role: self.role });
        match recover_session(self.endpoint, self.config, self.role, None).await {
            Ok(handle) => {
                self.handle = handle;
                self.controller.reset();
                self.events.status(Status::Running);
                Ok(())
            }
            Err(err) => {
                error!(role = %self.role, %err, "recovery failed, halting loop");
                self.events.status(Status::Failed(err.clone()));
                Err(err)
            }
        }
    }

    /// Resets the episode for auto-demo replay. A vanished session here is
    /// recovered like any other; a transient failure just leaves `done` set
    /// so the next iteration tries again.
    async fn reset_in_place(&mut self) -> DriveResult<()> {
        let result = self
            .endpoint
            .reset(ResetRequest {
                session_id: self.handle.id().as_str().to_owned(),
            })
            .await;

        if self.token.is_stale() {
            return Ok(());
        }

        match result {
            Ok(resp) => {
                debug!(role = %self.role, "auto-demo reset");
                self.handle.apply_reset(&resp);
                self.controller.reset();
                Ok(())
            }
            Err(err) if err.is_session_lost() => self.recover(&err.to_string()).await,
            Err(err) => {
                warn!(role = %self.role, %err, "auto-demo reset failed, pausing before retry");
                self.events.status(Status::Failed(DriveError::StepFailed {
                    context: err.to_string(),
                }));
                tokio::time::sleep(self.config.step_retry_delay).await;
                Ok(())
            }
        }
    }
}

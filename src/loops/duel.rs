//! The duel loop: two sessions on identical terrain, driven in lockstep.

use tracing::{debug, error, trace, warn};
use web_time::Instant;

use crate::config::DriveConfig;
use crate::endpoint::{Endpoint, EndpointError};
use crate::error::{DriveError, DriveResult};
use crate::event::{DriveEvent, DuelOutcome, EventSink, Status};
use crate::input::SharedInput;
use crate::lifecycle::LoopToken;
use crate::repeat::{throughput, RepeatController};
use crate::rng::Pcg32;
use crate::session::{create_session, recover_session, SessionHandle};
use crate::wire::{AgentStepRequest, StepRequest, StepResponse};
use crate::{LoopEnd, Role};

/// Duel seeds are drawn uniformly from `[0, 1e9)`.
pub const DUEL_SEED_SPAN: u32 = 1_000_000_000;

/// Draws a fresh duel seed. Every duel start and restart gets its own.
#[must_use]
pub fn draw_seed() -> u64 {
    u64::from(Pcg32::from_entropy().gen_range(0..DUEL_SEED_SPAN))
}

/// Drives the human-piloted and agent-piloted sessions in lockstep until
/// both episodes complete.
///
/// Each tick fans out one request per side that is still alive and joins on
/// all of them before touching any state: neither side ever advances a tick
/// ahead of the other while both are alive, which keeps the two renders
/// visually synchronized and the reward comparison fair. A side that
/// completes drops out of subsequent ticks; the other continues alone.
///
/// Both sides share one [`RepeatController`], so both requests of a tick
/// always carry the same batch size.
pub struct DuelLoop<'a, E: ?Sized> {
    endpoint: &'a E,
    config: &'a DriveConfig,
    input: SharedInput,
    events: EventSink,
    token: LoopToken,
    seed: u64,
    human: SessionHandle,
    agent: SessionHandle,
    controller: RepeatController,
}

impl<'a, E: Endpoint + ?Sized> DuelLoop<'a, E> {
    /// Creates both sessions concurrently with the shared `seed` and
    /// assembles the loop.
    ///
    /// The loop only exists once both handles do; callers must not flip the
    /// active mode to duel before this returns, so the UI never observes a
    /// half-populated duel.
    ///
    /// # Errors
    /// Returns [`DriveError::Initialization`] if either creation exhausts
    /// its retry budget.
    pub async fn start(
        endpoint: &'a E,
        config: &'a DriveConfig,
        seed: u64,
        input: SharedInput,
        events: EventSink,
        token: LoopToken,
    ) -> DriveResult<Self> {
        debug!(seed, "starting duel");
        let (human, agent) = tokio::try_join!(
            create_session(endpoint, config, Some(seed)),
            create_session(endpoint, config, Some(seed)),
        )?;

        let duel = Self {
            endpoint,
            config,
            input,
            events,
            token,
            seed,
            human,
            agent,
            controller: RepeatController::new(config.repeat),
        };
        // Initial frames so the UI can paint both panes before the first tick.
        duel.emit_frame(Role::Human, duel.controller.current(), 0.0);
        duel.emit_frame(Role::Agent, duel.controller.current(), 0.0);
        Ok(duel)
    }

    /// The seed both sessions were created with.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The human side's handle.
    #[must_use]
    pub fn human(&self) -> &SessionHandle {
        &self.human
    }

    /// The agent side's handle.
    #[must_use]
    pub fn agent(&self) -> &SessionHandle {
        &self.agent
    }

    /// The verdict, once both sides have completed.
    #[must_use]
    pub fn outcome(&self) -> Option<DuelOutcome> {
        (self.human.done() && self.agent.done()).then(|| {
            DuelOutcome::new(self.human.episode_reward(), self.agent.episode_reward())
        })
    }

    /// Runs the duel to its end.
    ///
    /// # Errors
    /// Returns [`DriveError::RecoveryFailed`] if recreating a vanished side
    /// fails; the matching [`Status::Failed`] has already been emitted.
    pub async fn run(&mut self) -> DriveResult<LoopEnd> {
        self.events.status(Status::DuelRunning);
        loop {
            if self.token.is_stale() {
                debug!("duel loop cancelled");
                return Ok(LoopEnd::Cancelled);
            }

            if self.human.done() && self.agent.done() {
                let outcome =
                    DuelOutcome::new(self.human.episode_reward(), self.agent.episode_reward());
                debug!(winner = %outcome.winner, "duel finished");
                self.events.send(DriveEvent::DuelFinished(outcome));
                self.events.status(Status::DuelFinished);
                return Ok(LoopEnd::Finished);
            }

            let repeat = self.controller.current();
            let started = Instant::now();
            // Fan out only the live sides; the join is the per-tick barrier.
            let (human_result, agent_result) = match (!self.human.done(), !self.agent.done()) {
                (true, true) => {
                    let (h, a) =
                        tokio::join!(self.request_human(repeat), self.request_agent(repeat));
                    (Some(h), Some(a))
                }
                (true, false) => (Some(self.request_human(repeat).await), None),
                (false, true) => (None, Some(self.request_agent(repeat).await)),
                (false, false) => (None, None),
            };
            let dt = started.elapsed();

            if self.token.is_stale() {
                trace!("discarding in-flight duel results after cancellation");
                return Ok(LoopEnd::Cancelled);
            }

            // One latency observation per tick, shared by both sides, and
            // only when at least one call completed.
            let any_ok = human_result.as_ref().is_some_and(|r| r.is_ok())
                || agent_result.as_ref().is_some_and(|r| r.is_ok());
            if any_ok {
                self.controller.observe(dt);
            }

            let mut lost: Vec<(Role, String)> = Vec::new();
            let mut transient = false;
            if let Some(result) = human_result {
                self.apply(Role::Human, result, repeat, dt, &mut lost, &mut transient);
            }
            if let Some(result) = agent_result {
                self.apply(Role::Agent, result, repeat, dt, &mut lost, &mut transient);
            }

            for (role, detail) in lost {
                self.recover(role, &detail).await?;
            }
            if transient {
                tokio::time::sleep(self.config.step_retry_delay).await;
            }
        }
    }

    async fn request_human(&self, repeat: u32) -> Result<StepResponse, EndpointError> {
        let action = self.input.snapshot().action();
        self.endpoint
            .step(StepRequest {
                session_id: self.human.id().as_str().to_owned(),
                action: action.code(),
                repeat,
            })
            .await
    }

    async fn request_agent(&self, repeat: u32) -> Result<StepResponse, EndpointError> {
        self.endpoint
            .agent_step(AgentStepRequest {
                session_id: self.agent.id().as_str().to_owned(),
                repeat,
            })
            .await
    }

    /// Applies one side's result. Session-lost conditions are collected for
    /// recovery after both sides have been applied; transient failures set
    /// the shared pause flag.
    fn apply(
        &mut self,
        role: Role,
        result: Result<StepResponse, EndpointError>,
        repeat: u32,
        dt: std::time::Duration,
        lost: &mut Vec<(Role, String)>,
        transient: &mut bool,
    ) {
        match result {
            Ok(step) => {
                let executed = step.steps.unwrap_or(repeat);
                let (was_done, now_done, episode_reward) = {
                    let handle = self.handle_mut(role);
                    let was_done = handle.done();
                    handle.apply_step(&step);
                    (was_done, handle.done(), handle.episode_reward())
                };
                self.emit_frame(role, repeat, throughput(executed, dt));
                if !was_done && now_done {
                    debug!(%role, reward = episode_reward, "duel side finished");
                    self.events.send(DriveEvent::EpisodeFinished {
                        role,
                        episode_reward,
                    });
                }
            }
            Err(err) if err.is_session_lost() => {
                warn!(%role, %err, "duel side vanished");
                lost.push((role, err.to_string()));
            }
            Err(err) => {
                warn!(%role, %err, "duel step failed, pausing before retry");
                self.events.status(Status::Failed(DriveError::StepFailed {
                    context: err.to_string(),
                }));
                *transient = true;
            }
        }
    }

    /// Recreates one vanished side with the duel's shared seed so it stays
    /// on terrain equivalent to the surviving side, whose state is left
    /// untouched.
    async fn recover(&mut self, role: Role, detail: &str) -> DriveResult<()> {
        warn!(%role, detail, seed = self.seed, "recovering duel side");
        self.events.status(Status::Recovering { role });
        match recover_session(self.endpoint, self.config, role, Some(self.seed)).await {
            Ok(handle) => {
                *self.handle_mut(role) = handle;
                self.controller.reset();
                self.emit_frame(role, self.controller.current(), 0.0);
                self.events.status(Status::DuelRunning);
                Ok(())
            }
            Err(err) => {
                error!(%role, %err, "duel recovery failed, aborting duel");
                self.events.status(Status::Failed(err.clone()));
                Err(err)
            }
        }
    }

    fn handle_mut(&mut self, role: Role) -> &mut SessionHandle {
        match role {
            Role::Human => &mut self.human,
            Role::Agent => &mut self.agent,
        }
    }

    fn handle(&self, role: Role) -> &SessionHandle {
        match role {
            Role::Human => &self.human,
            Role::Agent => &self.agent,
        }
    }

    fn emit_frame(&self, role: Role, repeat: u32, ticks_per_second: f64) {
        let handle = self.handle(role);
        self.events.send(DriveEvent::Frame {
            role,
            frame: handle.last_frame().to_owned(),
            step_reward: handle.last_step_reward(),
            episode_reward: handle.episode_reward(),
            repeat,
            ticks_per_second,
        });
    }
}

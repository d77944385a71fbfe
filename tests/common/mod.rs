//! Scriptable in-memory endpoint for integration tests.
//!
//! Sessions advance one logical tick per control call regardless of the
//! requested repeat, which keeps call counts and episode lengths easy to
//! reason about. Failure injection covers the conditions the loops must
//! survive: creation failures, transient step failures, and vanished
//! sessions.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use lander_duel::endpoint::{Endpoint, EndpointError};
use lander_duel::wire::{
    AgentStepRequest, CreateRequest, CreateResponse, ResetRequest, ResetResponse, StepRequest,
    StepResponse,
};

type CancelHook = Box<dyn Fn() + Send + Sync>;

/// Drains every event currently buffered on the channel.
#[allow(dead_code)]
pub fn drain(
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<lander_duel::DriveEvent>,
) -> Vec<lander_duel::DriveEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[derive(Default)]
struct SessionScript {
    id: String,
    seed: Option<u64>,
    episode_len: u32,
    ticks: u32,
    lost: bool,
    lose_after: Option<u32>,
    ok_calls: u32,
    step_calls: u32,
    agent_calls: u32,
    reset_calls: u32,
    actions: Vec<u8>,
}

struct ScriptState {
    next_id: u32,
    default_episode_len: u32,
    episode_len_plan: VecDeque<u32>,
    create_failures: u32,
    create_calls: u32,
    rewards: VecDeque<f64>,
    fail_next_step: VecDeque<EndpointError>,
    sessions: Vec<SessionScript>,
    lose_plan: Vec<(usize, u32)>,
    total_calls: u64,
    cancel_at: Option<(u64, CancelHook)>,
    step_delay: Option<Duration>,
}

impl Default for ScriptState {
    fn default() -> Self {
        Self {
            next_id: 1,
            default_episode_len: 3,
            episode_len_plan: VecDeque::new(),
            create_failures: 0,
            create_calls: 0,
            rewards: VecDeque::new(),
            fail_next_step: VecDeque::new(),
            sessions: Vec::new(),
            lose_plan: Vec::new(),
            total_calls: 0,
            cancel_at: None,
            step_delay: None,
        }
    }
}

/// Clonable handle to the shared script state.
#[derive(Clone, Default)]
pub struct ScriptedEndpoint {
    state: Arc<Mutex<ScriptState>>,
}

#[allow(dead_code)] // each integration test binary uses a different subset
impl ScriptedEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Episode length applied to sessions without a planned length.
    pub fn set_default_episode_len(&self, len: u32) {
        self.state.lock().default_episode_len = len;
    }

    /// Queues per-session episode lengths, consumed in creation order.
    pub fn plan_episode_lens(&self, lens: &[u32]) {
        self.state.lock().episode_len_plan.extend(lens);
    }

    /// Makes the next `n` creation calls fail at the transport level.
    pub fn fail_creates(&self, n: u32) {
        self.state.lock().create_failures = n;
    }

    /// Queues per-tick rewards, consumed across all sessions in call order.
    /// Ticks beyond the queue yield 1.0.
    pub fn push_rewards(&self, rewards: &[f64]) {
        self.state.lock().rewards.extend(rewards);
    }

    /// Queues an error returned by the next step or agent-step call, before
    /// the session advances.
    pub fn fail_next_step(&self, err: EndpointError) {
        self.state.lock().fail_next_step.push_back(err);
    }

    /// Marks the `index`-th created session to vanish after `calls`
    /// successful control calls.
    pub fn lose_after(&self, index: usize, calls: u32) {
        self.state.lock().sessions[index].lose_after = Some(calls);
    }

    /// Like [`lose_after`](Self::lose_after), but recorded before the
    /// session exists and applied when creation reaches that index.
    pub fn plan_lose_after(&self, index: usize, calls: u32) {
        self.state.lock().lose_plan.push((index, calls));
    }

    /// Delays every step and agent-step call, giving concurrent tests a
    /// suspension point inside the loop.
    pub fn set_step_delay(&self, delay: Duration) {
        self.state.lock().step_delay = Some(delay);
    }

    /// Runs `hook` once, when the total endpoint call count reaches `n`.
    pub fn cancel_after_total_calls(&self, n: u64, hook: impl Fn() + Send + Sync + 'static) {
        self.state.lock().cancel_at = Some((n, Box::new(hook)));
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.state.lock().sessions.iter().map(|s| s.id.clone()).collect()
    }

    pub fn seeds(&self) -> Vec<Option<u64>> {
        self.state.lock().sessions.iter().map(|s| s.seed).collect()
    }

    pub fn create_calls(&self) -> u32 {
        self.state.lock().create_calls
    }

    pub fn step_calls(&self, index: usize) -> u32 {
        self.state.lock().sessions[index].step_calls
    }

    pub fn agent_calls(&self, index: usize) -> u32 {
        self.state.lock().sessions[index].agent_calls
    }

    pub fn reset_calls(&self, index: usize) -> u32 {
        self.state.lock().sessions[index].reset_calls
    }

    /// Actions the `index`-th session received, in order.
    pub fn actions(&self, index: usize) -> Vec<u8> {
        self.state.lock().sessions[index].actions.clone()
    }

    async fn maybe_delay(&self) {
        let delay = self.state.lock().step_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    /// Bumps the total call counter and returns the cancel hook if its
    /// threshold was just reached. The hook must run outside the state lock.
    fn note_call(state: &mut ScriptState) -> Option<CancelHook> {
        state.total_calls += 1;
        let reached = state
            .cancel_at
            .as_ref()
            .is_some_and(|(n, _)| state.total_calls >= *n);
        if reached {
            state.cancel_at.take().map(|(_, hook)| hook)
        } else {
            None
        }
    }

    fn lost_error() -> EndpointError {
        EndpointError::SessionNotFound {
            detail: "Session not found".to_owned(),
        }
    }

    /// Common path of step and agent-step: failure gates, then one tick.
    fn control_call(
        state: &mut ScriptState,
        session_id: &str,
        action: Option<u8>,
    ) -> Result<StepResponse, EndpointError> {
        if let Some(err) = state.fail_next_step.pop_front() {
            return Err(err);
        }
        let ScriptState {
            sessions, rewards, ..
        } = state;
        let session = sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(Self::lost_error)?;
        if session.lost {
            return Err(Self::lost_error());
        }
        if let Some(limit) = session.lose_after {
            if session.ok_calls >= limit {
                session.lost = true;
                return Err(Self::lost_error());
            }
        }

        let reward = rewards.pop_front().unwrap_or(1.0);
        session.ok_calls += 1;
        session.ticks += 1;
        match action {
            Some(code) => {
                session.step_calls += 1;
                session.actions.push(code);
            }
            None => session.agent_calls += 1,
        }
        Ok(StepResponse {
            obs: vec![],
            reward: Some(reward),
            done: session.ticks >= session.episode_len,
            frame: format!("{}-f{}", session.id, session.ticks),
            action,
            steps: Some(1),
        })
    }
}

#[async_trait]
impl Endpoint for ScriptedEndpoint {
    async fn create(&self, req: CreateRequest) -> Result<CreateResponse, EndpointError> {
        let (result, hook) = {
            let mut state = self.state.lock();
            let hook = Self::note_call(&mut state);
            state.create_calls += 1;
            let result = if state.create_failures > 0 {
                state.create_failures -= 1;
                Err(EndpointError::Transport {
                    context: "connection refused".to_owned(),
                })
            } else {
                let id = format!("sess-{}", state.next_id);
                state.next_id += 1;
                let episode_len = state
                    .episode_len_plan
                    .pop_front()
                    .unwrap_or(state.default_episode_len);
                let index = state.sessions.len();
                let lose_after = state
                    .lose_plan
                    .iter()
                    .find(|(i, _)| *i == index)
                    .map(|(_, calls)| *calls);
                state.sessions.push(SessionScript {
                    id: id.clone(),
                    seed: req.seed,
                    episode_len,
                    lose_after,
                    ..SessionScript::default()
                });
                Ok(CreateResponse {
                    session_id: id.clone(),
                    obs: vec![],
                    frame: format!("{id}-f0"),
                    done: false,
                })
            };
            (result, hook)
        };
        if let Some(hook) = hook {
            hook();
        }
        result
    }

    async fn step(&self, req: StepRequest) -> Result<StepResponse, EndpointError> {
        self.maybe_delay().await;
        let (result, hook) = {
            let mut state = self.state.lock();
            let hook = Self::note_call(&mut state);
            (
                Self::control_call(&mut state, &req.session_id, Some(req.action)),
                hook,
            )
        };
        if let Some(hook) = hook {
            hook();
        }
        result
    }

    async fn agent_step(&self, req: AgentStepRequest) -> Result<StepResponse, EndpointError> {
        self.maybe_delay().await;
        let (result, hook) = {
            let mut state = self.state.lock();
            let hook = Self::note_call(&mut state);
            (Self::control_call(&mut state, &req.session_id, None), hook)
        };
        if let Some(hook) = hook {
            hook();
        }
        result
    }

    async fn reset(&self, req: ResetRequest) -> Result<ResetResponse, EndpointError> {
        let (result, hook) = {
            let mut state = self.state.lock();
            let hook = Self::note_call(&mut state);
            let result = match state.sessions.iter_mut().find(|s| s.id == req.session_id) {
                Some(session) if !session.lost => {
                    session.ticks = 0;
                    session.reset_calls += 1;
                    Ok(ResetResponse {
                        obs: vec![],
                        frame: format!("{}-f0", session.id),
                        done: false,
                    })
                }
                _ => Err(Self::lost_error()),
            };
            (result, hook)
        };
        if let Some(hook) = hook {
            hook();
        }
        result
    }
}

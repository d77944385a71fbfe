//! Events and status surfaced to the UI layer, plus the duel verdict.
//!
//! The loops never touch a screen. Everything the embedding layer needs,
//! fresh frames, reward readouts, liveness, failures, flows through one
//! unbounded channel of [`DriveEvent`]s. A dropped receiver simply makes
//! sends no-ops; loops are cancelled through their tokens, not through the
//! channel.

use tokio::sync::mpsc;

use crate::error::DriveError;
use crate::Role;

/// Reward difference below which a duel is declared a tie.
pub const WINNER_EPSILON: f64 = 1e-6;

/// The verdict of a completed duel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    /// The human-piloted session accumulated more reward.
    Human,
    /// The agent-piloted session accumulated more reward.
    Agent,
    /// The accumulators differ by less than [`WINNER_EPSILON`].
    Tie,
}

impl std::fmt::Display for Winner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Winner::Human => f.write_str("Winner: Human"),
            Winner::Agent => f.write_str("Winner: Agent"),
            Winner::Tie => f.write_str("Tie!"),
        }
    }
}

/// Decides the duel winner from the two final accumulators.
///
/// Pure and idempotent: recomputable any number of times from the same two
/// numbers.
#[must_use]
pub fn decide_winner(human_reward: f64, agent_reward: f64) -> Winner {
    if (human_reward - agent_reward).abs() < WINNER_EPSILON {
        Winner::Tie
    } else if human_reward > agent_reward {
        Winner::Human
    } else {
        Winner::Agent
    }
}

/// Final scores of a duel, with the verdict baked in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuelOutcome {
    /// The verdict.
    pub winner: Winner,
    /// The human side's final accumulator.
    pub human_reward: f64,
    /// The agent side's final accumulator.
    pub agent_reward: f64,
}

impl DuelOutcome {
    /// Computes the outcome from the two final accumulators.
    #[must_use]
    pub fn new(human_reward: f64, agent_reward: f64) -> Self {
        Self {
            winner: decide_winner(human_reward, agent_reward),
            human_reward,
            agent_reward,
        }
    }
}

/// User-visible loop status. Rendered with `Display`; failures carry the
/// underlying error so the UI can show its text.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    /// A single session is being created.
    CreatingSession,
    /// The single session exists and the loop is about to run.
    Ready,
    /// The single loop is stepping.
    Running,
    /// The single episode completed; the loop has halted.
    EpisodeFinished,
    /// Both duel sessions are being created.
    CreatingDuel,
    /// Both duel sessions exist.
    DuelReady,
    /// At least one duel side is still stepping.
    DuelRunning,
    /// Both duel sides completed.
    DuelFinished,
    /// A vanished session is being recreated.
    Recovering {
        /// Which role is being recovered.
        role: Role,
    },
    /// Something failed; see the carried error. Fatal variants halt the
    /// loop, [`DriveError::StepFailed`] means a paused retry.
    Failed(DriveError),
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::CreatingSession => f.write_str("Creating session..."),
            Status::Ready => f.write_str("Ready"),
            Status::Running => f.write_str("Running..."),
            Status::EpisodeFinished => f.write_str("Episode finished"),
            Status::CreatingDuel => f.write_str("Creating duel sessions..."),
            Status::DuelReady => f.write_str("Duel ready"),
            Status::DuelRunning => f.write_str("Duel running..."),
            Status::DuelFinished => f.write_str("Duel finished"),
            Status::Recovering { role } => write!(f, "Recovering {} session...", role),
            Status::Failed(err) => write!(f, "{}", err),
        }
    }
}

/// One notification from a loop to the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum DriveEvent {
    /// A fresh frame with its reward readouts.
    Frame {
        /// Which session produced the frame.
        role: Role,
        /// The rendered frame, base64-encoded. Opaque to the core.
        frame: String,
        /// Reward of the call that produced this frame.
        step_reward: f64,
        /// Running episode accumulator.
        episode_reward: f64,
        /// The batch size the producing call requested.
        repeat: u32,
        /// Display-only throughput of the producing call, in ticks/second.
        ticks_per_second: f64,
    },
    /// Status change.
    Status(Status),
    /// One role's episode completed.
    EpisodeFinished {
        /// Which session completed.
        role: Role,
        /// Its final accumulator.
        episode_reward: f64,
    },
    /// Both duel sides completed.
    DuelFinished(DuelOutcome),
}

/// Sending half of the event channel, shared by driver and loops.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<DriveEvent>,
}

impl EventSink {
    /// Creates a sink and its receiving end.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DriveEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Sends an event. A closed receiver is not an error; the UI going away
    /// does not stop a loop, its token does.
    pub fn send(&self, event: DriveEvent) {
        let _ = self.tx.send(event);
    }

    /// Shorthand for sending a status change.
    pub fn status(&self, status: Status) {
        self.send(DriveEvent::Status(status));
    }
}

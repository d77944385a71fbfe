//! # Lander Duel
//!
//! A real-time client core that drives one or two remote, stateful simulation
//! sessions (a gym-style physics environment behind a request/response HTTP
//! service) by repeatedly sending control actions and consuming rendered
//! frames.
//!
//! Rendering is left to the embedding UI layer. The hard part this crate owns
//! is the control loop: keeping a live, low-latency interactive session over
//! a transport whose round-trip time varies and occasionally fails, without
//! desynchronizing state or leaking stale sessions.
//!
//! The crate provides:
//!
//! - [`Driver`]: the command surface the UI layer talks to (mode selection,
//!   restart, duel start, auto-demo toggle).
//! - [`SingleLoop`] and [`DuelLoop`]: the two loop variants. The single loop
//!   drives one session from the current input state (or lets the server-side
//!   agent pick actions); the duel loop drives a human-controlled and an
//!   agent-controlled session in lockstep on identical terrain.
//! - [`RepeatController`]: an adaptive batching controller that hides network
//!   latency by tuning how many simulation ticks each call requests.
//! - [`Endpoint`]: the trait seam over the remote service, with an HTTP
//!   implementation ([`HttpEndpoint`]) and structured classification of the
//!   "session not found" condition that drives transparent recovery.
//!
//! Loops are plain async functions that suspend only at the request await and
//! at pacing sleeps. Cancellation is cooperative: starting a loop captures a
//! generation token from a [`Lifecycle`], and the loop checks that its token
//! is still current after every suspension point, discarding stale in-flight
//! results.
//!
//! # Example
//!
//! ```no_run
//! use lander_duel::{Driver, DriveConfig, HttpEndpoint, Role};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let endpoint = HttpEndpoint::new("http://localhost:8000/api")?;
//! let (driver, mut events) = Driver::new(endpoint, DriveConfig::default());
//!
//! // The UI layer forwards keyboard state into driver.input() and renders
//! // the frames arriving on `events` while this future runs.
//! driver.run_single(Role::Human).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub use config::{BackoffConfig, DriveConfig, DEFAULT_ENV_ID};
pub use driver::Driver;
pub use endpoint::{Endpoint, EndpointError, HttpEndpoint};
pub use error::{DriveError, DriveResult};
pub use event::{decide_winner, DriveEvent, DuelOutcome, EventSink, Status, Winner};
pub use input::{Action, InputState, SharedInput};
pub use lifecycle::{BusyFlag, BusyGuard, Lifecycle, LoopToken};
pub use loops::duel::DuelLoop;
pub use loops::single::SingleLoop;
pub use repeat::{RepeatConfig, RepeatController};
pub use session::{SessionHandle, SessionId};

pub mod config;
pub mod driver;
pub mod endpoint;
pub mod error;
pub mod event;
pub mod input;
pub mod lifecycle;
pub mod prelude;
pub mod repeat;
pub mod rng;
pub mod session;
pub mod wire;
/// The two loop variants that make up the client core.
pub mod loops {
    pub mod duel;
    pub mod single;
}

/// Which side of a session a loop is driving.
///
/// In single mode the role selects the pilot: `Human` computes actions from
/// the current input state, `Agent` delegates action choice to the server-side
/// policy. In duel mode both roles run at once, one session each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Role {
    /// Session driven by the local player's input state.
    Human,
    /// Session driven by the server-side agent policy.
    Agent,
}

impl Role {
    /// A short lowercase label for logging and display.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Role::Human => "human",
            Role::Agent => "agent",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The active client mode.
///
/// Exactly one mode is active at a time. Switching modes cancels the loop
/// associated with the previous mode cooperatively (its in-flight request is
/// allowed to complete, but the result is discarded) before the new loop
/// starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// One session, human-piloted.
    Human,
    /// One session, agent-piloted.
    Agent,
    /// Two sessions in lockstep, one per [`Role`].
    Duel,
}

impl From<Role> for Mode {
    fn from(role: Role) -> Self {
        match role {
            Role::Human => Mode::Human,
            Role::Agent => Mode::Agent,
        }
    }
}

/// How a loop run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEnd {
    /// The episode (or duel) ran to completion and the loop halted.
    Finished,
    /// The loop observed a stale generation token and stopped, discarding any
    /// in-flight result.
    Cancelled,
    /// Another loop instance for the same role was already running; this call
    /// was a no-op.
    Busy,
}

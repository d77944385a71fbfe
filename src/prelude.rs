//! Convenient re-exports for common usage.
//!
//! ```rust
//! use lander_duel::prelude::*;
//! ```

pub use crate::config::{BackoffConfig, DriveConfig};
pub use crate::driver::Driver;
pub use crate::endpoint::{Endpoint, EndpointError, HttpEndpoint};
pub use crate::error::{DriveError, DriveResult};
pub use crate::event::{DriveEvent, DuelOutcome, Status, Winner};
pub use crate::input::{Action, InputState, SharedInput};
pub use crate::repeat::{RepeatConfig, RepeatController};
pub use crate::session::{SessionHandle, SessionId};
pub use crate::{LoopEnd, Mode, Role};

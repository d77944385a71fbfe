//! The crate's error taxonomy.

use std::error::Error;
use std::fmt;
use std::fmt::Display;

use crate::Role;

/// All failure conditions a control loop can surface. Loop entry points
/// generally return a [`Result<LoopEnd, DriveError>`].
///
/// Propagation policy: every failure is caught at the loop boundary and
/// converted to a user-visible [`Status`] before (or instead of) escaping.
/// Recovery and step-retry are the only automatic remediations; everything
/// else requires an explicit user restart.
///
/// [`Result<LoopEnd, DriveError>`]: std::result::Result
/// [`Status`]: crate::Status
#[derive(Debug, Clone, PartialEq)]
pub enum DriveError {
    /// Session creation exhausted its retry budget. Fatal to the loop until a
    /// manual restart.
    Initialization {
        /// How many creation attempts were made before giving up.
        attempts: u32,
        /// The last underlying endpoint error, rendered as text.
        context: String,
    },
    /// The remote reported that the session no longer exists. This condition
    /// is recovered automatically; the variant exists so recovery progress
    /// can be surfaced as status.
    SessionLost {
        /// Which role's session vanished.
        role: Role,
        /// The detail string the remote attached to the condition.
        detail: String,
    },
    /// Automatic recovery itself failed. Fatal to the loop; the stale handle
    /// has already been discarded.
    RecoveryFailed {
        /// Which role was being recovered.
        role: Role,
        /// A description of why recovery failed.
        context: String,
    },
    /// A step or agent-step call failed for a reason other than session loss.
    /// Non-fatal: the loop pauses briefly and retries the same session.
    StepFailed {
        /// A description of the failed call.
        context: String,
    },
}

/// Shorthand result type for loop operations.
pub type DriveResult<T> = Result<T, DriveError>;

impl Display for DriveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveError::Initialization { attempts, context } => {
                write!(
                    f,
                    "Init failed after {} attempts: {}",
                    attempts, context
                )
            }
            DriveError::SessionLost { role, detail } => {
                write!(f, "Session lost ({}): {}", role, detail)
            }
            DriveError::RecoveryFailed { role, context } => {
                write!(f, "Recovery failed ({}): {}", role, context)
            }
            DriveError::StepFailed { context } => {
                write!(f, "Step failed: {}", context)
            }
        }
    }
}

impl Error for DriveError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_user_readable() {
        let err = DriveError::Initialization {
            attempts: 4,
            context: "connection refused".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "Init failed after 4 attempts: connection refused"
        );

        let err = DriveError::RecoveryFailed {
            role: Role::Agent,
            context: "timed out".to_owned(),
        };
        assert_eq!(err.to_string(), "Recovery failed (agent): timed out");
    }
}

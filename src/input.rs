//! Input state and the action mapping.
//!
//! Keyboard capture lives in the UI layer; the loops only ever see the
//! *current input state*, a three-bit snapshot shared through an atomic.
//! The mapping from input state to discrete action is a fixed priority
//! order: main-thruster overrides left/right, and simultaneous left+right
//! cancels to neutral.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const BIT_LEFT: u8 = 1;
const BIT_RIGHT: u8 = 1 << 1;
const BIT_THRUST: u8 = 1 << 2;

/// The discrete action codes the remote environment understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Do nothing.
    Neutral,
    /// Fire the left orientation engine.
    Left,
    /// Fire the main thruster.
    Main,
    /// Fire the right orientation engine.
    Right,
}

impl Action {
    /// The wire code for this action.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Action::Neutral => 0,
            Action::Left => 1,
            Action::Main => 2,
            Action::Right => 3,
        }
    }
}

/// A snapshot of which controls are currently held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputState {
    /// Left control held.
    pub left: bool,
    /// Right control held.
    pub right: bool,
    /// Main-thruster control held.
    pub thrust: bool,
}

impl InputState {
    /// Maps the held controls to an action.
    ///
    /// Priority order: thrust wins outright, then a single held direction,
    /// and both directions together cancel to neutral.
    #[must_use]
    pub const fn action(self) -> Action {
        if self.thrust {
            Action::Main
        } else if self.right && !self.left {
            Action::Right
        } else if self.left && !self.right {
            Action::Left
        } else {
            Action::Neutral
        }
    }

    const fn to_bits(self) -> u8 {
        (self.left as u8 * BIT_LEFT)
            | (self.right as u8 * BIT_RIGHT)
            | (self.thrust as u8 * BIT_THRUST)
    }

    const fn from_bits(bits: u8) -> Self {
        Self {
            left: bits & BIT_LEFT != 0,
            right: bits & BIT_RIGHT != 0,
            thrust: bits & BIT_THRUST != 0,
        }
    }
}

/// Input state shared between the UI layer and the loops.
///
/// The UI writes whole snapshots; a loop reads one snapshot per tick. A
/// single atomic byte keeps the exchange lock-free and tear-free.
#[derive(Debug, Clone, Default)]
pub struct SharedInput {
    bits: Arc<AtomicU8>,
}

impl SharedInput {
    /// Creates a shared input with nothing held.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current input state.
    pub fn set(&self, state: InputState) {
        self.bits.store(state.to_bits(), Ordering::Relaxed);
    }

    /// Releases all controls.
    pub fn clear(&self) {
        self.bits.store(0, Ordering::Relaxed);
    }

    /// Reads the current input state.
    #[must_use]
    pub fn snapshot(&self) -> InputState {
        InputState::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

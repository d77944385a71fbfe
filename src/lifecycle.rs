//! Cooperative loop lifecycle: generation tokens and re-entrancy guards.
//!
//! Rather than closures over mutable "please stop" flags, each loop start
//! captures a [`LoopToken`] holding the generation it was born under. Any
//! later start (or an explicit cancel) bumps the shared generation, and the
//! running loop notices at its next suspension point, discarding whatever
//! in-flight result it was waiting on. There is no preemption: a request
//! already issued always completes at the transport level.
//!
//! [`BusyFlag`] is the companion guard: at most one loop instance per role
//! may run at a time, and starting a second is a no-op rather than an error.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Shared generation counter for a family of loops.
///
/// Clones observe the same generation.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    generation: Arc<AtomicU64>,
}

impl Lifecycle {
    /// Creates a lifecycle at generation zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new generation, cancelling every loop started earlier, and
    /// returns the token the new loop should carry.
    #[must_use]
    pub fn begin(&self) -> LoopToken {
        let mine = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        LoopToken {
            generation: Arc::clone(&self.generation),
            mine,
        }
    }

    /// Cancels every loop started so far without starting a new one.
    pub fn cancel_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// A loop's claim on the current generation.
#[derive(Debug)]
pub struct LoopToken {
    generation: Arc<AtomicU64>,
    mine: u64,
}

impl LoopToken {
    /// Whether this token's loop is still the current one.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.mine
    }

    /// Inverse of [`is_current`](Self::is_current), for readable loop exits.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        !self.is_current()
    }
}

/// Per-role re-entrancy guard.
///
/// Clones share the flag. Acquisition is strictly try-only: a second
/// concurrent loop start observes `None` and backs off.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag {
    busy: Arc<AtomicBool>,
}

impl BusyFlag {
    /// Creates an idle flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to mark the role busy. Returns a guard that releases the
    /// flag on drop, or `None` if a loop already holds it.
    #[must_use]
    pub fn try_acquire(&self) -> Option<BusyGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    /// Whether a loop currently holds the flag.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// RAII release for [`BusyFlag`].
#[derive(Debug)]
pub struct BusyGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

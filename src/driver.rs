//! The command surface the embedding UI layer talks to.
//!
//! A [`Driver`] owns the endpoint, the shared input state, and the
//! bookkeeping that lets loops be started, cancelled, and restarted without
//! stepping on each other: one [`Lifecycle`] whose generation tokens cancel
//! superseded loops, one [`BusyFlag`] per loop family so re-entrant starts
//! are no-ops, and a parking slot that lets a halted single episode (and its
//! tuned repeat) survive a switch between human and agent piloting.
//!
//! The driver never spawns. `run_single` and `run_duel` are plain futures;
//! the embedding layer decides where they execute and reads [`DriveEvent`]s
//! off the receiver returned by [`Driver::new`] while they run.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

use crate::config::DriveConfig;
use crate::endpoint::{Endpoint, EndpointError};
use crate::error::{DriveError, DriveResult};
use crate::event::{DriveEvent, EventSink, Status};
use crate::input::SharedInput;
use crate::lifecycle::{BusyFlag, Lifecycle};
use crate::loops::duel::{draw_seed, DuelLoop};
use crate::loops::single::SingleLoop;
use crate::repeat::RepeatController;
use crate::session::{create_session, SessionHandle};
use crate::wire::ResetRequest;
use crate::{LoopEnd, Mode, Role};

/// Parked state of a halted single loop.
struct SingleSlot {
    handle: SessionHandle,
    controller: RepeatController,
}

/// Owns the endpoint and coordinates the loops.
///
/// All command methods take `&self`; the driver is designed to sit behind an
/// `Arc` shared between the UI event handlers and the spawned loop futures.
pub struct Driver<E> {
    endpoint: E,
    config: DriveConfig,
    input: SharedInput,
    auto_demo: AtomicBool,
    lifecycle: Lifecycle,
    single_busy: BusyFlag,
    duel_busy: BusyFlag,
    single_slot: Mutex<Option<SingleSlot>>,
    mode: Mutex<Option<Mode>>,
    events: EventSink,
}

impl<E: Endpoint> Driver<E> {
    /// Creates a driver and the receiving end of its event channel.
    #[must_use]
    pub fn new(endpoint: E, config: DriveConfig) -> (Self, UnboundedReceiver<DriveEvent>) {
        let (events, rx) = EventSink::channel();
        (
            Self {
                endpoint,
                config,
                input: SharedInput::default(),
                auto_demo: AtomicBool::new(false),
                lifecycle: Lifecycle::new(),
                single_busy: BusyFlag::new(),
                duel_busy: BusyFlag::new(),
                single_slot: Mutex::new(None),
                mode: Mutex::new(None),
                events,
            },
            rx,
        )
    }

    /// The shared input state the UI layer writes keyboard changes into.
    #[must_use]
    pub fn input(&self) -> SharedInput {
        self.input.clone()
    }

    /// The configuration the driver was built with.
    #[must_use]
    pub fn config(&self) -> &DriveConfig {
        &self.config
    }

    /// The currently active mode, if any loop has been started.
    #[must_use]
    pub fn mode(&self) -> Option<Mode> {
        *self.mode.lock()
    }

    /// Whether agent episodes replay automatically instead of halting.
    #[must_use]
    pub fn auto_demo(&self) -> bool {
        self.auto_demo.load(Ordering::Relaxed)
    }

    /// Toggles automatic replay of finished agent episodes. Takes effect at
    /// the running loop's next episode boundary.
    pub fn set_auto_demo(&self, enabled: bool) {
        self.auto_demo.store(enabled, Ordering::Relaxed);
    }

    /// Cancels whatever loop is running. The loop notices at its next
    /// suspension point and discards any in-flight result.
    pub fn cancel(&self) {
        debug!("cancelling active loops");
        self.lifecycle.cancel_all();
        *self.mode.lock() = None;
    }

    /// Probes the remote service.
    ///
    /// # Errors
    /// Propagates the transport error if the probe itself could not be made.
    pub async fn check_health(&self) -> Result<bool, EndpointError> {
        self.endpoint.health().await
    }

    /// Drives one session with `role` as the pilot until the episode ends or
    /// the loop is cancelled.
    ///
    /// Reuses the parked session from the previous single run if there is
    /// one (switching pilots mid-episode keeps the episode), otherwise
    /// creates a fresh unseeded session. On a normal halt the session is
    /// parked again.
    ///
    /// # Errors
    /// Returns [`DriveError::Initialization`] if session creation exhausts
    /// its retry budget and [`DriveError::RecoveryFailed`] if mid-episode
    /// recovery fails. Both have already been surfaced as [`Status::Failed`].
    pub async fn run_single(&self, role: Role) -> DriveResult<LoopEnd> {
        let Some(_busy) = self.single_busy.try_acquire() else {
            debug!(%role, "single loop already running, ignoring start");
            return Ok(LoopEnd::Busy);
        };
        let token = self.lifecycle.begin();
        *self.mode.lock() = Some(Mode::from(role));

        // Take the parked state out before awaiting anything; the lock must
        // not be held across a suspension point.
        let parked = self.single_slot.lock().take();
        let (handle, controller) = match parked {
            Some(slot) => (slot.handle, slot.controller),
            None => {
                self.events.status(Status::CreatingSession);
                match create_session(&self.endpoint, &self.config, None).await {
                    Ok(handle) => {
                        self.events.status(Status::Ready);
                        (handle, RepeatController::new(self.config.repeat))
                    }
                    Err(err) => {
                        self.events.status(Status::Failed(err.clone()));
                        return Err(err);
                    }
                }
            }
        };

        if token.is_stale() {
            *self.single_slot.lock() = Some(SingleSlot { handle, controller });
            return Ok(LoopEnd::Cancelled);
        }

        // Initial frame so the UI can paint before the first tick lands.
        self.events.send(DriveEvent::Frame {
            role,
            frame: handle.last_frame().to_owned(),
            step_reward: handle.last_step_reward(),
            episode_reward: handle.episode_reward(),
            repeat: controller.current(),
            ticks_per_second: 0.0,
        });
        self.events.status(Status::Running);

        let mut single = SingleLoop::new(
            &self.endpoint,
            &self.config,
            role,
            handle,
            controller,
            self.input.clone(),
            &self.auto_demo,
            self.events.clone(),
            token,
        );
        let result = single.run().await;
        let (handle, controller) = single.into_parts();

        match result {
            Ok(end) => {
                // The session survives a halt; the next start resumes or
                // resets it.
                *self.single_slot.lock() = Some(SingleSlot { handle, controller });
                Ok(end)
            }
            Err(err) => {
                // Recovery failed, so there is no live remote session left
                // to park.
                Err(err)
            }
        }
    }

    /// Starts a fresh single episode with `role` as the pilot.
    ///
    /// Resets the parked session in place if one exists; if the remote has
    /// forgotten it, falls through to creating a new session. A running
    /// single loop makes this a no-op, cancel first.
    ///
    /// # Errors
    /// Same conditions as [`run_single`](Self::run_single), plus
    /// [`DriveError::StepFailed`] if the reset call fails transiently.
    pub async fn restart_single(&self, role: Role) -> DriveResult<LoopEnd> {
        if self.single_busy.is_busy() {
            debug!(%role, "single loop running, ignoring restart");
            return Ok(LoopEnd::Busy);
        }

        let parked = self.single_slot.lock().take();
        if let Some(mut slot) = parked {
            let request = ResetRequest {
                session_id: slot.handle.id().as_str().to_owned(),
            };
            match self.endpoint.reset(request).await {
                Ok(resp) => {
                    slot.handle.apply_reset(&resp);
                    slot.controller.reset();
                    *self.single_slot.lock() = Some(slot);
                }
                Err(err) if err.is_session_lost() => {
                    warn!(%err, "parked session vanished, creating a fresh one");
                }
                Err(err) => {
                    let err = DriveError::StepFailed {
                        context: err.to_string(),
                    };
                    self.events.status(Status::Failed(err.clone()));
                    return Err(err);
                }
            }
        }

        self.run_single(role).await
    }

    /// Runs a duel: two sessions on identically seeded terrain, one per
    /// role, stepped in lockstep until both episodes complete.
    ///
    /// Every call draws a fresh seed, so calling again after a finished duel
    /// is the restart path. The mode flips to [`Mode::Duel`] only once both
    /// sessions exist.
    ///
    /// # Errors
    /// Returns [`DriveError::Initialization`] if either session creation
    /// exhausts its budget and [`DriveError::RecoveryFailed`] if recreating
    /// a vanished side fails. Both have already been surfaced as
    /// [`Status::Failed`].
    pub async fn run_duel(&self) -> DriveResult<LoopEnd> {
        let Some(_busy) = self.duel_busy.try_acquire() else {
            debug!("duel loop already running, ignoring start");
            return Ok(LoopEnd::Busy);
        };
        let token = self.lifecycle.begin();
        self.events.status(Status::CreatingDuel);

        let seed = draw_seed();
        let mut duel = match DuelLoop::start(
            &self.endpoint,
            &self.config,
            seed,
            self.input.clone(),
            self.events.clone(),
            token,
        )
        .await
        {
            Ok(duel) => duel,
            Err(err) => {
                self.events.status(Status::Failed(err.clone()));
                return Err(err);
            }
        };

        *self.mode.lock() = Some(Mode::Duel);
        self.events.status(Status::DuelReady);
        duel.run().await
    }
}

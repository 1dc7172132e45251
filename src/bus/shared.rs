//! The one lock around the vital state.
//!
//! `SharedVitalState` is shared between the supervision loop and the bus
//! polling loop. Both hold the lock for a whole unit of work: the supervision
//! loop for one control step, the bus for one dispatch-and-publish phase. A
//! condition variable on the same mutex lets the bus wake the supervision
//! loop as soon as a telegram is queued instead of at the next tick.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use etcs_evc::bus::SharedVitalState;
//! use etcs_evc::config::Config;
//!
//! let shared = Arc::new(SharedVitalState::new(&Config::default()));
//!
//! shared.with_state(|state| state.update_speed_kmh(50.0));
//! let speed = shared.with_state(|state| state.train.speed_mps);
//! assert!(speed > 13.0);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::Instant;

use tracing::{debug, warn};

use crate::config::Config;
use crate::vital::VitalState;

/// Vital state behind the lock shared by the supervision and bus loops.
#[derive(Debug)]
pub struct SharedVitalState {
    /// Everything the two loops share.
    state: Mutex<VitalState>,

    /// Signalled when a telegram is queued.
    wake: Condvar,

    /// Time base for every `now_ms()` call.
    start_time: Instant,
}

impl SharedVitalState {
    /// Start-of-mission state.
    pub fn new(config: &Config) -> Self {
        Self::from_state(VitalState::new(config))
    }

    /// Wrap an existing state.
    pub fn from_state(state: VitalState) -> Self {
        Self {
            state: Mutex::new(state),
            wake: Condvar::new(),
            start_time: Instant::now(),
        }
    }

    /// Milliseconds since creation.
    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Acquire the lock.
    ///
    /// The state is plain data, so a lock poisoned by a panicking holder is
    /// recovered rather than propagated.
    pub fn lock(&self) -> MutexGuard<'_, VitalState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("vital state lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Acquire the lock if no one holds it.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, VitalState>> {
        match self.state.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => {
                warn!("vital state lock poisoned, recovering");
                Some(poisoned.into_inner())
            }
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Run `f` with exclusive access to the state.
    pub fn with_state<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut VitalState) -> R,
    {
        let mut guard = self.lock();
        f(&mut guard)
    }

    /// Wake a supervision loop waiting in [`Self::run_supervision`].
    pub fn notify(&self) {
        self.wake.notify_all();
    }

    /// Drive a fixed-step supervision loop until `shutdown` is raised.
    ///
    /// Each iteration runs [`VitalState::control_step`] followed by `step`
    /// under the lock, then sleeps for the rest of the configured cycle
    /// (`SupervisionConfig::cycle_ms`). The sleep ends early when a telegram
    /// is queued.
    pub fn run_supervision<F>(&self, shutdown: &AtomicBool, mut step: F)
    where
        F: FnMut(&mut VitalState, u64),
    {
        let cycle_ms = self.lock().config().cycle_ms;
        debug!(cycle_ms, "supervision loop started");
        while !shutdown.load(Ordering::SeqCst) {
            let started = Instant::now();
            let mut guard = self.lock();
            let period = guard.config().period();
            guard.control_step();
            step(&mut guard, self.now_ms());

            let remaining = period.saturating_sub(started.elapsed());
            let (guard, _) = self
                .wake
                .wait_timeout_while(guard, remaining, |state| {
                    !state.has_pending_telegrams() && !shutdown.load(Ordering::SeqCst)
                })
                .unwrap_or_else(PoisonError::into_inner);
            drop(guard);
        }
        debug!("supervision loop stopped");
    }
}

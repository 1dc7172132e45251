//! Parameter bus runner for any [`LineTransport`].
//!
//! One poll cycle:
//!
//! 1. wait up to `poll_timeout_ms` for inbound data, then service the transport
//! 2. under the vital state lock, apply every buffered line, signal the
//!    supervision loop if a telegram was queued, then write the outbound
//!    values that changed
//! 3. release the lock; a woken supervision loop runs from here
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use etcs_evc::bus::{standard_parameters, BusRunner, SharedVitalState};
//! use etcs_evc::config::Config;
//! use etcs_evc::hal::MockTransport;
//! use etcs_evc::traits::IgnoreCommands;
//!
//! let config = Config::default();
//! let state = Arc::new(SharedVitalState::new(&config));
//! let parameters = standard_parameters(&config.bus, IgnoreCommands).unwrap();
//!
//! let mut transport = MockTransport::new();
//! transport.queue_line("speed=72");
//!
//! let mut runner = BusRunner::new(state.clone(), transport, parameters, config.bus);
//! runner.register_parameters().unwrap();
//! runner.poll_once().unwrap();
//!
//! assert_eq!(runner.transport().last_value("etcs::supervision"), Some("NoS"));
//! ```

use core::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::BusConfig;
use crate::error::BusError;
use crate::traits::LineTransport;

use super::parameter::{format_registration, LineOutcome, ParameterManager};
use super::SharedVitalState;

/// Longest single sleep while waiting, so a shutdown request is seen promptly.
const SLEEP_SLICE_MS: u64 = 50;

fn transport_error<E: Display>(error: E) -> BusError {
    BusError::Transport(error.to_string())
}

/// Sleep for `ms`, returning early (with `false`) once `shutdown` is raised.
fn sleep_unless(shutdown: &AtomicBool, ms: u64) -> bool {
    let deadline = Instant::now() + Duration::from_millis(ms);
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return false;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return true;
        }
        thread::sleep(remaining.min(Duration::from_millis(SLEEP_SLICE_MS)));
    }
}

// ============================================================================
// Cycle report
// ============================================================================

/// What one poll cycle did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Lines read from the transport.
    pub received: usize,
    /// Lines a setter accepted.
    pub applied: usize,
    /// Lines a setter rejected.
    pub rejected: usize,
    /// Malformed lines and unknown names.
    pub ignored: usize,
    /// Outbound lines written.
    pub published: usize,
    /// The supervision loop was woken.
    pub woke_supervision: bool,
}

// ============================================================================
// Runner
// ============================================================================

/// Bus polling loop over a line transport.
pub struct BusRunner<T: LineTransport> {
    state: Arc<SharedVitalState>,
    transport: T,
    parameters: ParameterManager,
    config: BusConfig,
}

impl<T: LineTransport> BusRunner<T> {
    /// Create a runner. Nothing is sent until [`Self::register_parameters`]
    /// or [`Self::run`].
    pub fn new(
        state: Arc<SharedVitalState>,
        transport: T,
        parameters: ParameterManager,
        config: BusConfig,
    ) -> Self {
        Self {
            state,
            transport,
            parameters,
            config,
        }
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable transport, for scripting tests.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The parameter registry.
    pub fn parameters(&self) -> &ParameterManager {
        &self.parameters
    }

    /// Send `register(<name>)` for every inbound parameter.
    pub fn register_parameters(&mut self) -> Result<(), BusError> {
        let mut count = 0;
        for name in self.parameters.inbound_names() {
            self.transport
                .write_line(&format_registration(name))
                .map_err(transport_error)?;
            count += 1;
        }
        info!(client = self.config.client_name.as_str(), count, "bus parameters registered");
        Ok(())
    }

    /// Run one poll cycle.
    pub fn poll_once(&mut self) -> Result<CycleReport, BusError> {
        let timeout = Duration::from_millis(u64::from(self.config.poll_timeout_ms));
        self.transport.wait_readable(timeout).map_err(transport_error)?;
        self.transport.service().map_err(transport_error)?;

        let mut report = CycleReport::default();
        let now_ms = self.state.now_ms();
        {
            // held until the last outbound line is written
            let mut state = self.state.lock();
            while let Some(line) = self.transport.read_line() {
                report.received += 1;
                match self.parameters.apply_line(&mut state, &line, now_ms) {
                    LineOutcome::Applied => report.applied += 1,
                    LineOutcome::Rejected(_) => report.rejected += 1,
                    LineOutcome::Malformed | LineOutcome::Unknown => report.ignored += 1,
                }
            }
            report.woke_supervision = state.take_wake_request();
            if report.woke_supervision {
                self.state.notify();
            }

            let outbound = self.parameters.collect_outbound(&state);
            for line in &outbound {
                self.transport.write_line(line).map_err(transport_error)?;
            }
            report.published = outbound.len();
        }

        if report.received > 0 || report.published > 0 {
            debug!(
                received = report.received,
                applied = report.applied,
                rejected = report.rejected,
                published = report.published,
                "bus cycle"
            );
        }
        Ok(report)
    }

    /// Re-establish the connection with exponential backoff.
    ///
    /// On success every inbound parameter is registered again and every
    /// outbound value is republished on the next cycle. Returns `Ok(false)`
    /// if `shutdown` was raised while waiting.
    pub fn reconnect(&mut self, shutdown: &AtomicBool) -> Result<bool, BusError> {
        let policy = self.config.reconnect.clone();
        let mut attempts = 0;
        loop {
            if policy.exhausted(attempts) {
                warn!(attempts, "bus reconnect attempts exhausted");
                return Err(BusError::ReconnectExhausted { attempts });
            }
            attempts += 1;
            let backoff = policy.backoff_ms(attempts);
            debug!(attempt = attempts, backoff_ms = backoff, "bus reconnect scheduled");
            if !sleep_unless(shutdown, u64::from(backoff)) {
                return Ok(false);
            }
            match self.transport.reconnect() {
                Ok(()) => {
                    info!(attempts, "bus reconnected");
                    self.parameters.reset_last_sent();
                    self.register_parameters()?;
                    return Ok(true);
                }
                Err(error) => warn!(attempt = attempts, %error, "bus reconnect failed"),
            }
        }
    }

    /// Poll until `shutdown` is raised, reconnecting on transport errors.
    ///
    /// Waits `startup_delay_ms` first so the environment can come up.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<(), BusError> {
        if !sleep_unless(shutdown, u64::from(self.config.startup_delay_ms)) {
            return Ok(());
        }
        if let Err(error) = self.register_parameters() {
            if !self.recover(error, shutdown)? {
                return Ok(());
            }
        }
        while !shutdown.load(Ordering::SeqCst) {
            if let Err(error) = self.poll_once() {
                if !self.recover(error, shutdown)? {
                    break;
                }
            }
        }
        info!("bus runner stopped");
        Ok(())
    }

    fn recover(&mut self, error: BusError, shutdown: &AtomicBool) -> Result<bool, BusError> {
        match error {
            BusError::Transport(reason) => {
                warn!(%reason, "bus connection lost");
                self.reconnect(shutdown)
            }
            other => Err(other),
        }
    }
}

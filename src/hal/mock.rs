//! Mock implementations for testing without a simulator or train.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockTransport`] | [`LineTransport`] | Scripted inbound lines, captured outbound lines |
//! | [`MockInterpreter`] | [`CommandInterpreter`] | Records DMI feedback commands |
//!
//! # Example
//!
//! ```rust
//! use etcs_evc::hal::MockTransport;
//! use etcs_evc::traits::LineTransport;
//!
//! let mut transport = MockTransport::new();
//! transport.queue_line("speed=40");
//!
//! assert_eq!(transport.read_line().as_deref(), Some("speed=40"));
//! transport.write_line("register(speed)").unwrap();
//! assert_eq!(transport.registrations(), ["speed"]);
//! ```
//!
//! [`LineTransport`]: crate::traits::LineTransport
//! [`CommandInterpreter`]: crate::traits::CommandInterpreter

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;

use crate::traits::{CommandInterpreter, LineTransport};

// ============================================================================
// Transport Mock
// ============================================================================

/// Error returned by [`MockTransport`] while disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("mock transport disconnected")]
pub struct MockDisconnected;

/// Mock line transport.
///
/// Lines in `inbound` are readable at once. Each entry of `batches` is moved
/// into `inbound` by one `wait_readable` call, which lets a test script what
/// arrives in which poll cycle. Nothing ever sleeps.
#[derive(Debug, Default)]
pub struct MockTransport {
    /// Lines ready to be read.
    pub inbound: VecDeque<String>,
    /// Lines delivered one batch per wait.
    pub batches: VecDeque<Vec<String>>,
    /// Every line written, in order.
    pub written: Vec<String>,
    /// Whether the peer is connected.
    pub connected: bool,
    /// Reconnect attempts that fail before one succeeds.
    pub fail_reconnects: u32,
    /// Reconnect attempts made.
    pub reconnect_attempts: u32,
    /// Calls to `wait_readable`.
    pub wait_calls: u32,
    /// Calls to `service`.
    pub service_calls: u32,
    /// Timeout passed to the last wait.
    pub last_timeout: Option<Duration>,
    /// Drop the connection during this wait call (1-based).
    pub disconnect_on_wait: Option<u32>,
    shutdown: Option<(u32, Arc<AtomicBool>)>,
}

impl MockTransport {
    /// A connected transport with nothing queued.
    pub fn new() -> Self {
        Self {
            connected: true,
            ..Default::default()
        }
    }

    /// Raise `flag` during wait call `wait` (1-based), ending a runner loop
    /// after that cycle.
    pub fn with_shutdown_after(mut self, wait: u32, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some((wait, flag));
        self
    }

    /// Make a line readable now.
    pub fn queue_line(&mut self, line: impl Into<String>) {
        self.inbound.push_back(line.into());
    }

    /// Deliver `lines` on the next wait not yet scripted.
    pub fn queue_batch<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.batches
            .push_back(lines.into_iter().map(Into::into).collect());
    }

    /// Names sent in `register(<name>)` lines.
    pub fn registrations(&self) -> Vec<&str> {
        self.written
            .iter()
            .filter_map(|l| l.strip_prefix("register(")?.strip_suffix(')'))
            .collect()
    }

    /// Payloads written for parameter `name`, oldest first.
    pub fn values_for(&self, name: &str) -> Vec<&str> {
        self.written
            .iter()
            .filter_map(|l| {
                let (n, value) = l.split_once('=')?;
                (n == name).then_some(value)
            })
            .collect()
    }

    /// Latest payload written for parameter `name`.
    pub fn last_value(&self, name: &str) -> Option<&str> {
        self.values_for(name).last().copied()
    }

    /// Forget written lines.
    pub fn clear_written(&mut self) {
        self.written.clear();
    }
}

impl LineTransport for MockTransport {
    type Error = MockDisconnected;

    fn wait_readable(&mut self, timeout: Duration) -> Result<bool, MockDisconnected> {
        self.wait_calls += 1;
        self.last_timeout = Some(timeout);
        if let Some((wait, flag)) = &self.shutdown {
            if *wait == self.wait_calls {
                flag.store(true, Ordering::SeqCst);
            }
        }
        if self.disconnect_on_wait == Some(self.wait_calls) {
            self.connected = false;
        }
        if !self.connected {
            return Err(MockDisconnected);
        }
        if let Some(batch) = self.batches.pop_front() {
            self.inbound.extend(batch);
        }
        Ok(!self.inbound.is_empty())
    }

    fn service(&mut self) -> Result<(), MockDisconnected> {
        self.service_calls += 1;
        if self.connected {
            Ok(())
        } else {
            Err(MockDisconnected)
        }
    }

    fn read_line(&mut self) -> Option<String> {
        self.inbound.pop_front()
    }

    fn write_line(&mut self, line: &str) -> Result<(), MockDisconnected> {
        if !self.connected {
            return Err(MockDisconnected);
        }
        self.written.push(line.to_string());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn reconnect(&mut self) -> Result<(), MockDisconnected> {
        self.reconnect_attempts += 1;
        if self.fail_reconnects > 0 {
            self.fail_reconnects -= 1;
            return Err(MockDisconnected);
        }
        self.connected = true;
        Ok(())
    }
}

// ============================================================================
// Interpreter Mock
// ============================================================================

/// Records every command it receives.
///
/// Clones share the same record, so a test can keep one clone and hand the
/// other to the bus.
#[derive(Clone, Debug, Default)]
pub struct MockInterpreter {
    /// Commands received, oldest first.
    pub commands: Arc<Mutex<Vec<String>>>,
}

impl MockInterpreter {
    /// An interpreter with an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the commands received.
    pub fn received(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CommandInterpreter for MockInterpreter {
    fn interpret(&mut self, command: &str) {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command.to_string());
    }
}

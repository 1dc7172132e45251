//! Line transport to the train or simulation environment.
//!
//! The bus exchanges newline-delimited text with the environment:
//!
//! ```text
//! register(speed)           - core -> env: subscribe to an inbound parameter
//! speed=43.2                - env -> core: inbound value
//! etcs::vperm=160           - core -> env: outbound value
//! ```
//!
//! Socket, pipe or serial implementations live outside the core; the crate
//! ships [`crate::hal::MockTransport`] for tests.

use core::fmt::Display;
use std::time::Duration;

/// Newline-delimited, bidirectional text transport.
///
/// The polling loop relies on these properties:
///
/// - `wait_readable` returns after at most `timeout`, so a shutdown request is
///   noticed within one poll period
/// - `read_line` never blocks; `None` means no complete line is buffered
/// - lines are passed without their terminator
pub trait LineTransport {
    /// Error type for transport operations.
    type Error: Display;

    /// Wait until data may be readable or `timeout` elapses.
    ///
    /// Returns `Ok(true)` when data arrived.
    fn wait_readable(&mut self, timeout: Duration) -> Result<bool, Self::Error>;

    /// Transport housekeeping: move received bytes into the line buffer,
    /// flush pending writes, detect a closed peer.
    fn service(&mut self) -> Result<(), Self::Error>;

    /// Next complete inbound line, if one is buffered (non-blocking).
    fn read_line(&mut self) -> Option<String>;

    /// Send one line.
    fn write_line(&mut self, line: &str) -> Result<(), Self::Error>;

    /// True while the peer is connected.
    fn is_connected(&self) -> bool;

    /// Try to re-establish the connection once.
    fn reconnect(&mut self) -> Result<(), Self::Error>;
}

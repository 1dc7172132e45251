//! Trait definitions for the seams between the core and its environment.
//!
//! # Submodules
//!
//! - `transport`: line-oriented link to the train or simulator
//! - `interpreter`: consumer of DMI feedback commands
//!
//! Both are implemented outside the core; [`crate::hal`] provides mocks.

pub mod interpreter;
pub mod transport;

pub use interpreter::*;
pub use transport::*;

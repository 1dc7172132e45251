//! Implementations of the traits defined in [`crate::traits`].
//!
//! - `mock`: test doubles for desktop development and the test suite
//!
//! Production transports (TCP to a simulator, serial to a train interface)
//! are provided by the embedding application.

pub mod mock;

pub use mock::*;

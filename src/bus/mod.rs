//! Parameter synchronization bus.
//!
//! The core exchanges named values with the train or simulation environment
//! over a line transport. This module provides:
//!
//! - `parameter`: the [`Parameter`] registry and the `name=payload` grammar
//! - `catalogue`: the standard inbound and outbound parameters
//! - `shared`: [`SharedVitalState`], the lock shared with the supervision loop
//! - `runner`: [`BusRunner`], the polling loop with reconnect
//!
//! # Shared State Pattern
//!
//! ```ignore
//! use std::sync::Arc;
//! use etcs_evc::bus::{standard_parameters, BusRunner, SharedVitalState};
//!
//! let state = Arc::new(SharedVitalState::new(&config));
//!
//! // Supervision thread
//! let supervision = Arc::clone(&state);
//! thread::spawn(move || supervision.run_supervision(&shutdown, |_, _| {}));
//!
//! // Bus thread
//! let parameters = standard_parameters(&config.bus, interpreter)?;
//! BusRunner::new(state, transport, parameters, config.bus).run(&shutdown)?;
//! ```

pub mod catalogue;
pub mod parameter;
pub mod runner;
pub mod shared;

pub use catalogue::{register_inbound, register_outbound, standard_parameters, DMI_FEEDBACK, TELEGRAM};
pub use parameter::{
    format_registration, format_value, parse_line, Getter, LineOutcome, Parameter,
    ParameterManager, Setter,
};
pub use runner::{BusRunner, CycleReport};
pub use shared::SharedVitalState;

//! # etcs-evc
//!
//! The vital core of an ETCS onboard computer for simulation: it decodes
//! balise telegrams, keeps the mode profile of the movement authority, holds
//! trackside information until the train reaches the right level or mode, and
//! exchanges live values with the train environment over a text bus.
//!
//! ## Features
//!
//! - **Wire decoding**: bit strings from binary digits or base64, telegram
//!   headers and typed packets (mode profile, track conditions)
//! - **Mode profiles**: packet 80 turned into position-anchored segments with
//!   main/infill merging
//! - **Deferred information**: actions keyed on level and mode generations,
//!   re-evaluated once and then dropped when their source is invalidated
//! - **Parameter bus**: `name=payload` lines with change suppression, a
//!   supervision wake-up on telegram arrival, and reconnect with backoff
//!
//! ## Architecture
//!
//! - `bits`, `packets` - wire formats
//! - `position`, `mode`, `mode_profile`, `track` - the onboard model
//! - `deferred` - generation counters and the information dispatcher
//! - `vital` - the state shared by the supervision loop and the bus
//! - `bus` - parameter registry, catalogue, shared lock and polling loop
//! - `traits` - transport and command interpreter seams
//! - `hal` - mock implementations for testing
//!
//! ## Example
//!
//! ```rust
//! use etcs_evc::{
//!     bits::decode_binary_digits,
//!     packets::{MaMode, ModeProfile, ModeProfileElement, Packet, QDir, Telegram, TelegramHeader},
//!     position::Scale,
//!     VitalState,
//! };
//!
//! // A telegram announcing On Sight 100 m ahead for 500 m
//! let telegram = Telegram::new(TelegramHeader::default()).with_packet(Packet::ModeProfile(
//!     ModeProfile::new(QDir::Both, Scale::Metres1, ModeProfileElement::new(100, MaMode::OnSight, 500)),
//! ));
//! let wire = telegram.to_bits().to_binary_digits();
//!
//! let mut state = VitalState::default();
//! let decoded = Telegram::decode(&decode_binary_digits(&wire).unwrap()).unwrap();
//! state.enqueue_telegram(decoded, state.position(), 0);
//! state.control_step();
//!
//! let segment = &state.track.mode_profiles.segments()[0];
//! assert_eq!(segment.start.offset(), 100.0);
//! assert_eq!(segment.length, 500.0);
//! ```

#![warn(missing_docs)]

/// Bit strings, bit readers and writers, and the inbound text encodings.
pub mod bits;
/// Parameter bus: registry, standard catalogue, shared state and runner.
pub mod bus;
/// Configuration for the core and the bus.
pub mod config;
/// Generation counters and the deferred information dispatcher.
pub mod deferred;
/// Error types.
pub mod error;
/// Mock implementations of the traits for testing.
pub mod hal;
/// Modes, levels and supervision status.
pub mod mode;
/// Mode profile segments and their store.
pub mod mode_profile;
/// Telegram and packet decoding.
pub mod packets;
/// Direction-aware track positions.
pub mod position;
/// Track information consumed by the supervision.
pub mod track;
/// Transport and command interpreter traits.
pub mod traits;
/// The vital state shared by the supervision loop and the bus.
pub mod vital;

// Re-exports for convenience
pub use bus::{BusRunner, Parameter, ParameterManager, SharedVitalState};
pub use config::Config;
pub use deferred::{
    DeferredInformation, Generation, GenerationCounters, GenerationIndex, InformationDispatcher,
    Invalidation,
};
pub use error::{BusError, DecodeError, ParameterError, RegistryError};
pub use mode::{Level, Mode, SupervisionStatus};
pub use mode_profile::{ModeProfileSegment, ModeProfiles};
pub use position::{Orientation, Position, Scale};
pub use track::{SectionInfo, TrackInformation};
pub use traits::{CommandInterpreter, LineTransport};
pub use vital::VitalState;

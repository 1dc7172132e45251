//! Error types for wire decoding, parameter updates and the bus runner.
//!
//! Every failure on an inbound path is reported through one of these enums and
//! handled by discarding the offending update. None of them are fatal to the
//! process.

use thiserror::Error;

/// Failure while turning wire bits into typed telegram content.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A field needed more bits than remained in the input.
    #[error("truncated {field}: needed {needed} bits, {available} available")]
    Truncated {
        /// Name of the field being read.
        field: &'static str,
        /// Width of the field in bits.
        needed: usize,
        /// Bits left in the input when the read was attempted.
        available: usize,
    },

    /// A character outside the alphabet of the decoder in use.
    #[error("invalid character {ch:?} at index {index}")]
    InvalidCharacter {
        /// The offending character.
        ch: char,
        /// Byte index of the character in the input.
        index: usize,
    },

    /// A field decoded to a spare or reserved value.
    #[error("invalid {field} value {value}")]
    InvalidValue {
        /// Name of the field.
        field: &'static str,
        /// Raw value read from the wire.
        value: u64,
    },
}

/// Failure while applying an inbound parameter payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    /// The payload was expected to be numeric.
    #[error("invalid number {0:?}")]
    InvalidNumber(String),

    /// The payload parsed but is outside the accepted set of values.
    #[error("invalid value {0:?}")]
    InvalidValue(String),

    /// A telegram payload could not be decoded.
    #[error("telegram decode failed: {0}")]
    Telegram(#[from] DecodeError),
}

/// Failure while building the parameter registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A parameter must have at least one accessor.
    #[error("parameter {0} has neither a setter nor a getter")]
    NoAccessor(String),

    /// Parameter names are unique keys.
    #[error("parameter {0} is already registered")]
    Duplicate(String),
}

/// Failure of the parameter bus runner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The transport reported an error.
    #[error("bus transport error: {0}")]
    Transport(String),

    /// The transport could not be re-established.
    #[error("bus reconnect failed after {attempts} attempts")]
    ReconnectExhausted {
        /// Number of reconnect attempts made.
        attempts: u32,
    },

    /// The registry was rejected.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

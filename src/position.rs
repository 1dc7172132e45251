//! One-dimensional, direction-aware track positions.
//!
//! A [`Position`] is an offset in metres from an arbitrary odometric origin.
//! Offsets grow in the direction the train faced when the origin was set; the
//! [`Orientation`] records how that frame relates to the train, so a position
//! can be re-expressed after a change of cab or direction with
//! [`Position::negate`].
//!
//! Wire distances are integers scaled by `Q_SCALE`, see [`Scale`].
//!
//! # Example
//!
//! ```rust
//! use etcs_evc::position::{Orientation, Position, Scale};
//!
//! let reference = Position::new(0.0, Orientation::Nominal);
//! let ahead = reference.advance(100, Scale::Metres1, Orientation::Nominal);
//! let behind = reference.advance(100, Scale::Metres1, Orientation::Reverse);
//!
//! assert_eq!(ahead.offset(), 100.0);
//! assert_eq!(behind.offset(), -100.0);
//! assert!(behind < ahead);
//! ```

use core::cmp::Ordering;

use crate::error::DecodeError;

/// Orientation of a distance frame relative to the train.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Orientation {
    /// Same sense as the train's reference direction.
    #[default]
    Nominal,
    /// Opposite sense.
    Reverse,
}

impl Orientation {
    /// `+1.0` for nominal, `-1.0` for reverse.
    #[inline]
    pub const fn sign(self) -> f64 {
        match self {
            Orientation::Nominal => 1.0,
            Orientation::Reverse => -1.0,
        }
    }

    /// The opposite orientation.
    #[inline]
    pub const fn negate(self) -> Self {
        match self {
            Orientation::Nominal => Orientation::Reverse,
            Orientation::Reverse => Orientation::Nominal,
        }
    }

    /// Parse the integer encoding used on the parameter bus (`1` / `-1`).
    pub const fn from_wire(value: i32) -> Option<Self> {
        match value {
            1 => Some(Orientation::Nominal),
            -1 => Some(Orientation::Reverse),
            _ => None,
        }
    }

    /// Integer encoding used on the parameter bus.
    pub const fn as_wire(self) -> i32 {
        match self {
            Orientation::Nominal => 1,
            Orientation::Reverse => -1,
        }
    }
}

/// Distance resolution of a packet (`Q_SCALE`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scale {
    /// 10 cm per unit.
    Decimetres = 0,
    /// 1 m per unit.
    Metres1 = 1,
    /// 10 m per unit.
    Metres10 = 2,
}

impl Scale {
    /// Decode a 2-bit `Q_SCALE`. The value 3 is spare.
    pub fn from_wire(q_scale: u64) -> Result<Self, DecodeError> {
        match q_scale {
            0 => Ok(Scale::Decimetres),
            1 => Ok(Scale::Metres1),
            2 => Ok(Scale::Metres10),
            value => Err(DecodeError::InvalidValue {
                field: "Q_SCALE",
                value,
            }),
        }
    }

    /// Wire encoding of this scale.
    #[inline]
    pub const fn as_wire(self) -> u64 {
        self as u64
    }

    /// Metres per wire unit.
    #[inline]
    pub const fn factor(self) -> f64 {
        match self {
            Scale::Decimetres => 0.1,
            Scale::Metres1 => 1.0,
            Scale::Metres10 => 10.0,
        }
    }

    /// Convert a raw wire distance into metres.
    #[inline]
    pub fn apply(self, raw: u32) -> f64 {
        f64::from(raw) * self.factor()
    }
}

/// A location on the track, as an odometric offset with an orientation.
///
/// Equality and ordering only consider the offset, so two positions compare
/// equal when they name the same point in the same frame regardless of the
/// confidence attached to them.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    offset: f64,
    orientation: Orientation,
    confidence: f64,
}

impl Position {
    /// A position at `offset` metres in a frame with the given orientation.
    pub const fn new(offset: f64, orientation: Orientation) -> Self {
        Self {
            offset,
            orientation,
            confidence: 0.0,
        }
    }

    /// Attach an odometric confidence interval (metres, non-negative).
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.max(0.0);
        self
    }

    /// Offset from the origin in metres.
    #[inline]
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Orientation of the frame this position is expressed in.
    #[inline]
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Odometric confidence interval in metres.
    #[inline]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Move by a scaled wire distance.
    ///
    /// `towards` is relative to this position's frame: nominal moves ahead,
    /// reverse moves back.
    pub fn advance(self, raw: u32, scale: Scale, towards: Orientation) -> Self {
        self.offset_by(towards.sign() * scale.apply(raw))
    }

    /// Move by a signed number of metres within the same frame.
    pub fn offset_by(self, metres: f64) -> Self {
        Self {
            offset: self.offset + metres,
            ..self
        }
    }

    /// Signed distance from `self` to `other` in metres.
    #[inline]
    pub fn distance_to(&self, other: &Position) -> f64 {
        other.offset - self.offset
    }

    /// The same physical point expressed in the reversed frame.
    pub fn negate(self) -> Self {
        Self {
            offset: -self.offset,
            orientation: self.orientation.negate(),
            confidence: self.confidence,
        }
    }

    /// Total ordering along the frame.
    #[inline]
    pub fn compare(&self, other: &Position) -> Ordering {
        self.offset.total_cmp(&other.offset)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(0.0, Orientation::Nominal)
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

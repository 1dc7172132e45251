//! Typed trackside packets decoded from a balise telegram.
//!
//! Every packet except 255 starts with the same 23-bit prefix:
//!
//! ```text
//! NID_PACKET  8   packet identifier
//! Q_DIR       2   validity direction (0 reverse, 1 nominal, 2 both)
//! L_PACKET   13   total packet length in bits, prefix included
//! ```
//!
//! Packets the core interprets are decoded into their own types; anything
//! else is kept as [`Packet::Other`] with its raw body so a later consumer can
//! still read it. `L_PACKET` is used to step over every packet, so a short
//! typed decode never desynchronizes the telegram.

pub mod mode_profile;
pub mod telegram;
pub mod track_condition;

pub use mode_profile::{MaMode, MaModeSpeed, ModeProfile, ModeProfileElement};
pub use telegram::{BaliseGroupId, Telegram, TelegramHeader};
pub use track_condition::{TrackCondition, TrackConditionElement, TrackConditionKind};

use crate::bits::{BitReader, BitString, BitWriter};
use crate::error::DecodeError;
use crate::position::Orientation;

/// `NID_PACKET` of the end-of-information marker.
pub const END_OF_INFORMATION: u8 = 255;

/// `NID_PACKET` of the infill location reference. Packets that follow it in
/// the same telegram describe the next main balise group.
pub const INFILL_LOCATION_REFERENCE: u8 = 136;

/// Width of the common `NID_PACKET`/`Q_DIR`/`L_PACKET` prefix.
pub const PACKET_PREFIX_BITS: usize = 8 + 2 + 13;

/// Largest `L_PACKET` the 13-bit field can carry, prefix included.
pub const MAX_PACKET_BITS: usize = (1 << 13) - 1;

/// Direction a packet is valid for (`Q_DIR`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QDir {
    /// Valid against the nominal direction of the balise group.
    Reverse = 0,
    /// Valid in the nominal direction.
    Nominal = 1,
    /// Valid in both directions.
    Both = 2,
}

impl QDir {
    /// Decode a 2-bit `Q_DIR`. The value 3 is spare.
    pub fn from_wire(value: u64) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(QDir::Reverse),
            1 => Ok(QDir::Nominal),
            2 => Ok(QDir::Both),
            value => Err(DecodeError::InvalidValue {
                field: "Q_DIR",
                value,
            }),
        }
    }

    /// True if a packet with this `Q_DIR` applies to a train that passed the
    /// balise group in direction `passed`.
    pub fn applies_to(self, passed: Orientation) -> bool {
        match self {
            QDir::Both => true,
            QDir::Nominal => passed == Orientation::Nominal,
            QDir::Reverse => passed == Orientation::Reverse,
        }
    }
}

/// A decoded trackside packet.
#[derive(Clone, Debug, PartialEq)]
pub enum Packet {
    /// Packet 80, mode profile.
    ModeProfile(ModeProfile),
    /// Packet 68, track conditions.
    TrackCondition(TrackCondition),
    /// Any packet the core does not interpret.
    Other {
        /// Packet identifier.
        nid_packet: u8,
        /// Validity direction.
        q_dir: QDir,
        /// Packet body after the common prefix.
        body: BitString,
    },
}

impl Packet {
    /// Packet identifier.
    pub fn nid_packet(&self) -> u8 {
        match self {
            Packet::ModeProfile(_) => mode_profile::NID_PACKET,
            Packet::TrackCondition(_) => track_condition::NID_PACKET,
            Packet::Other { nid_packet, .. } => *nid_packet,
        }
    }

    /// Validity direction.
    pub fn q_dir(&self) -> QDir {
        match self {
            Packet::ModeProfile(p) => p.q_dir,
            Packet::TrackCondition(p) => p.q_dir,
            Packet::Other { q_dir, .. } => *q_dir,
        }
    }

    /// Decode the next packet. Returns `None` on the end-of-information marker.
    pub fn decode(reader: &mut BitReader<'_>) -> Result<Option<Packet>, DecodeError> {
        let nid_packet = reader.read("NID_PACKET", 8)? as u8;
        if nid_packet == END_OF_INFORMATION {
            return Ok(None);
        }
        let q_dir = QDir::from_wire(reader.read("Q_DIR", 2)?)?;
        let l_packet = reader.read("L_PACKET", 13)? as usize;
        if l_packet < PACKET_PREFIX_BITS {
            return Err(DecodeError::InvalidValue {
                field: "L_PACKET",
                value: l_packet as u64,
            });
        }
        let mut body = reader.take("packet body", l_packet - PACKET_PREFIX_BITS)?;

        let packet = match nid_packet {
            mode_profile::NID_PACKET => {
                Packet::ModeProfile(ModeProfile::decode(q_dir, &mut body)?)
            }
            track_condition::NID_PACKET => {
                Packet::TrackCondition(TrackCondition::decode(q_dir, &mut body)?)
            }
            _ => {
                let mut raw = BitString::new();
                while body.remaining() > 0 {
                    raw.push(body.read_flag("packet body")?);
                }
                Packet::Other {
                    nid_packet,
                    q_dir,
                    body: raw,
                }
            }
        };
        Ok(Some(packet))
    }

    /// Encode the packet, prefix included, with `L_PACKET` computed.
    ///
    /// Typed packets always fit; an opaque body must leave the packet within
    /// [`MAX_PACKET_BITS`].
    pub fn write(&self, writer: &mut BitWriter) {
        let mut body = BitWriter::new();
        match self {
            Packet::ModeProfile(p) => p.write_body(&mut body),
            Packet::TrackCondition(p) => p.write_body(&mut body),
            Packet::Other { body: raw, .. } => {
                body.extend(raw.as_slice());
            }
        }
        let l_packet = PACKET_PREFIX_BITS + body.len();
        debug_assert!(
            l_packet <= MAX_PACKET_BITS,
            "L_PACKET {l_packet} exceeds {MAX_PACKET_BITS} bits"
        );
        writer
            .write(u64::from(self.nid_packet()), 8)
            .write(self.q_dir() as u64, 2)
            .write(l_packet as u64, 13)
            .extend(body.finish().as_slice());
    }
}

//! Packet 68, track conditions.
//!
//! ```text
//! Q_SCALE       2
//! Q_TRACKINIT   1
//!   1: D_TRACKINIT 15                 (initial state resumes)
//!   0: D_TRACKCOND 15, L_TRACKCOND 15, M_TRACKCOND 4
//!      N_ITER 5, N_ITER x condition
//! ```

use heapless::Vec as HVec;

use crate::bits::{BitReader, BitWriter};
use crate::error::DecodeError;
use crate::position::Scale;

use super::QDir;

/// `NID_PACKET` of the track condition packet.
pub const NID_PACKET: u8 = 68;

/// Head condition plus up to 31 trailing ones.
pub const MAX_CONDITIONS: usize = 32;

/// Kind of track condition (`M_TRACKCOND`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrackConditionKind {
    /// Non stopping area, initial state is stopping permitted.
    NonStoppingArea,
    /// Tunnel stopping area, initial state is no tunnel stopping area.
    TunnelStoppingArea,
    /// Sound horn.
    SoundHorn,
    /// Powerless section, lower pantograph.
    LowerPantograph,
    /// Radio hole (stop supervising T_NVCONTACT).
    RadioHole,
    /// Air tightness.
    AirTightness,
    /// Switch off regenerative brake.
    NoRegenerativeBrake,
    /// Switch off eddy current brake for service brake.
    NoEddyCurrentServiceBrake,
    /// Switch off magnetic shoe brake.
    NoMagneticShoeBrake,
    /// Powerless section, switch off the main power switch.
    NeutralSection,
    /// Switch off eddy current brake for emergency brake.
    NoEddyCurrentEmergencyBrake,
}

impl TrackConditionKind {
    /// Decode a 4-bit `M_TRACKCOND`. Values 11 to 15 are spare.
    pub fn from_wire(value: u64) -> Result<Self, DecodeError> {
        use TrackConditionKind::*;
        Ok(match value {
            0 => NonStoppingArea,
            1 => TunnelStoppingArea,
            2 => SoundHorn,
            3 => LowerPantograph,
            4 => RadioHole,
            5 => AirTightness,
            6 => NoRegenerativeBrake,
            7 => NoEddyCurrentServiceBrake,
            8 => NoMagneticShoeBrake,
            9 => NeutralSection,
            10 => NoEddyCurrentEmergencyBrake,
            value => {
                return Err(DecodeError::InvalidValue {
                    field: "M_TRACKCOND",
                    value,
                })
            }
        })
    }

    /// Wire encoding.
    pub const fn as_wire(self) -> u64 {
        self as u64
    }
}

/// One track condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackConditionElement {
    /// Distance from the previous condition's start (or the reference).
    pub d_trackcond: u16,
    /// Length of the condition.
    pub l_trackcond: u16,
    /// Condition kind.
    pub m_trackcond: TrackConditionKind,
}

impl TrackConditionElement {
    /// A condition of `kind` starting `d` after the previous one, `l` long.
    pub const fn new(d: u16, l: u16, kind: TrackConditionKind) -> Self {
        Self {
            d_trackcond: d,
            l_trackcond: l,
            m_trackcond: kind,
        }
    }

    fn decode(reader: &mut BitReader<'_>) -> Result<Self, DecodeError> {
        let d_trackcond = reader.read("D_TRACKCOND", 15)? as u16;
        let l_trackcond = reader.read("L_TRACKCOND", 15)? as u16;
        let m_trackcond = TrackConditionKind::from_wire(reader.read("M_TRACKCOND", 4)?)?;
        Ok(Self {
            d_trackcond,
            l_trackcond,
            m_trackcond,
        })
    }

    fn write(&self, writer: &mut BitWriter) {
        writer
            .write(u64::from(self.d_trackcond), 15)
            .write(u64::from(self.l_trackcond), 15)
            .write(self.m_trackcond.as_wire(), 4);
    }
}

/// A decoded track condition packet.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackCondition {
    /// Validity direction.
    pub q_dir: QDir,
    /// Distance resolution.
    pub scale: Scale,
    /// `D_TRACKINIT` when the packet announces a return to the initial state.
    pub track_init: Option<u16>,
    /// Conditions in wire order, head first. Empty when `track_init` is set.
    pub conditions: HVec<TrackConditionElement, MAX_CONDITIONS>,
}

impl TrackCondition {
    /// A packet carrying a single condition.
    pub fn new(q_dir: QDir, scale: Scale, head: TrackConditionElement) -> Self {
        let mut conditions = HVec::new();
        // capacity is never zero
        let _ = conditions.push(head);
        Self {
            q_dir,
            scale,
            track_init: None,
            conditions,
        }
    }

    /// A packet announcing that the initial state resumes at `d_trackinit`.
    pub fn initial_state(q_dir: QDir, scale: Scale, d_trackinit: u16) -> Self {
        Self {
            q_dir,
            scale,
            track_init: Some(d_trackinit),
            conditions: HVec::new(),
        }
    }

    /// Append a condition. Hands it back when the packet is full.
    pub fn push(&mut self, condition: TrackConditionElement) -> Result<(), TrackConditionElement> {
        self.conditions.push(condition)
    }

    /// Decode the body that follows the common packet prefix.
    pub fn decode(q_dir: QDir, reader: &mut BitReader<'_>) -> Result<Self, DecodeError> {
        let scale = Scale::from_wire(reader.read("Q_SCALE", 2)?)?;
        if reader.read_flag("Q_TRACKINIT")? {
            let d_trackinit = reader.read("D_TRACKINIT", 15)? as u16;
            return Ok(Self::initial_state(q_dir, scale, d_trackinit));
        }

        let mut conditions = HVec::new();
        let head = TrackConditionElement::decode(reader)?;
        let _ = conditions.push(head);
        let n_iter = reader.read("N_ITER", 5)?;
        for _ in 0..n_iter {
            conditions
                .push(TrackConditionElement::decode(reader)?)
                .map_err(|_| DecodeError::InvalidValue {
                    field: "N_ITER",
                    value: n_iter,
                })?;
        }
        Ok(Self {
            q_dir,
            scale,
            track_init: None,
            conditions,
        })
    }

    pub(crate) fn write_body(&self, writer: &mut BitWriter) {
        writer.write(self.scale.as_wire(), 2);
        match (self.track_init, self.conditions.split_first()) {
            (None, Some((head, rest))) => {
                writer.write_flag(false);
                head.write(writer);
                writer.write(rest.len() as u64, 5);
                for condition in rest {
                    condition.write(writer);
                }
            }
            (d_trackinit, _) => {
                writer
                    .write_flag(true)
                    .write(u64::from(d_trackinit.unwrap_or(0)), 15);
            }
        }
    }
}

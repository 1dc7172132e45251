//! Packet 80, mode profile.
//!
//! ```text
//! Q_SCALE      2
//! D_MAMODE    15  ┐
//! M_MAMODE     2  │
//! V_MAMODE     7  │ head element
//! L_MAMODE    15  │
//! L_ACKMAMODE 15  │
//! Q_MAMODE     1  ┘
//! N_ITER       5
//! N_ITER x element
//! ```

use heapless::Vec as HVec;

use crate::bits::{BitReader, BitWriter};
use crate::config::NationalValues;
use crate::error::DecodeError;
use crate::position::Scale;

use super::QDir;

/// `NID_PACKET` of the mode profile.
pub const NID_PACKET: u8 = 80;

/// Largest `N_ITER` the 5-bit field can carry.
pub const MAX_TRAILING_ELEMENTS: usize = 31;

/// `V_MAMODE` resolution in km/h.
pub const V_MAMODE_STEP_KMH: u16 = 5;

/// `V_MAMODE` value meaning "use the national value".
pub const V_MAMODE_NATIONAL: u8 = 127;

/// Mode requested by a mode profile element (`M_MAMODE`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MaMode {
    /// On Sight.
    OnSight,
    /// Shunting.
    Shunting,
    /// Limited Supervision.
    LimitedSupervision,
}

impl MaMode {
    /// Decode a 2-bit `M_MAMODE`.
    pub fn from_wire(value: u64) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(MaMode::OnSight),
            1 => Ok(MaMode::Shunting),
            2 => Ok(MaMode::LimitedSupervision),
            value => Err(DecodeError::InvalidValue {
                field: "M_MAMODE",
                value,
            }),
        }
    }

    /// Wire encoding.
    pub const fn as_wire(self) -> u64 {
        match self {
            MaMode::OnSight => 0,
            MaMode::Shunting => 1,
            MaMode::LimitedSupervision => 2,
        }
    }
}

/// Speed limit of a mode profile element (`V_MAMODE`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaModeSpeed {
    /// Use the national value for the mode.
    NationalValue,
    /// Explicit limit in 5 km/h steps.
    Explicit(u8),
}

impl MaModeSpeed {
    /// Decode a 7-bit `V_MAMODE`. Values 121 to 126 are spare.
    pub fn from_wire(value: u64) -> Result<Self, DecodeError> {
        match value {
            127 => Ok(MaModeSpeed::NationalValue),
            0..=120 => Ok(MaModeSpeed::Explicit(value as u8)),
            value => Err(DecodeError::InvalidValue {
                field: "V_MAMODE",
                value,
            }),
        }
    }

    /// Explicit limit from km/h, rounded down to the wire resolution.
    pub fn from_kmh(kmh: u16) -> Self {
        MaModeSpeed::Explicit((kmh / V_MAMODE_STEP_KMH).min(120) as u8)
    }

    /// Wire encoding.
    pub const fn as_wire(self) -> u64 {
        match self {
            MaModeSpeed::NationalValue => V_MAMODE_NATIONAL as u64,
            MaModeSpeed::Explicit(steps) => steps as u64,
        }
    }

    /// Resolved limit in m/s for `mode`.
    pub fn resolve(self, mode: MaMode, national: &NationalValues) -> f64 {
        match self {
            MaModeSpeed::NationalValue => national.speed_for(mode),
            MaModeSpeed::Explicit(steps) => {
                f64::from(u16::from(steps) * V_MAMODE_STEP_KMH) / 3.6
            }
        }
    }
}

/// One element of a mode profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModeProfileElement {
    /// Distance from the previous element's start (or the reference).
    pub d_mamode: u16,
    /// Requested mode.
    pub m_mamode: MaMode,
    /// Speed limit.
    pub v_mamode: MaModeSpeed,
    /// Length of the mode section.
    pub l_mamode: u16,
    /// Length of the acknowledgement area in rear of the section.
    pub l_ackmamode: u16,
    /// The start of the section is a supervised location (`Q_MAMODE`).
    pub beginning_is_svl: bool,
}

impl ModeProfileElement {
    /// An element using the national speed value and no acknowledgement area.
    pub fn new(d_mamode: u16, m_mamode: MaMode, l_mamode: u16) -> Self {
        Self {
            d_mamode,
            m_mamode,
            v_mamode: MaModeSpeed::NationalValue,
            l_mamode,
            l_ackmamode: 0,
            beginning_is_svl: false,
        }
    }

    /// Set the speed limit.
    pub fn with_speed(mut self, speed: MaModeSpeed) -> Self {
        self.v_mamode = speed;
        self
    }

    /// Set the acknowledgement length.
    pub fn with_acknowledgement(mut self, l_ackmamode: u16) -> Self {
        self.l_ackmamode = l_ackmamode;
        self
    }

    /// Mark the start of the section as a supervised location.
    pub fn with_svl(mut self, svl: bool) -> Self {
        self.beginning_is_svl = svl;
        self
    }

    fn decode(reader: &mut BitReader<'_>) -> Result<Self, DecodeError> {
        let d_mamode = reader.read("D_MAMODE", 15)? as u16;
        let m_mamode = MaMode::from_wire(reader.read("M_MAMODE", 2)?)?;
        let v_mamode = MaModeSpeed::from_wire(reader.read("V_MAMODE", 7)?)?;
        let l_mamode = reader.read("L_MAMODE", 15)? as u16;
        let l_ackmamode = reader.read("L_ACKMAMODE", 15)? as u16;
        let beginning_is_svl = reader.read_flag("Q_MAMODE")?;
        Ok(Self {
            d_mamode,
            m_mamode,
            v_mamode,
            l_mamode,
            l_ackmamode,
            beginning_is_svl,
        })
    }

    fn write(&self, writer: &mut BitWriter) {
        writer
            .write(u64::from(self.d_mamode), 15)
            .write(self.m_mamode.as_wire(), 2)
            .write(self.v_mamode.as_wire(), 7)
            .write(u64::from(self.l_mamode), 15)
            .write(u64::from(self.l_ackmamode), 15)
            .write_flag(self.beginning_is_svl);
    }
}

/// A decoded mode profile packet.
#[derive(Clone, Debug, PartialEq)]
pub struct ModeProfile {
    /// Validity direction.
    pub q_dir: QDir,
    /// Distance resolution.
    pub scale: Scale,
    /// Head element.
    pub element: ModeProfileElement,
    /// Trailing elements, in wire order.
    pub elements: HVec<ModeProfileElement, MAX_TRAILING_ELEMENTS>,
}

impl ModeProfile {
    /// A profile with a single element.
    pub fn new(q_dir: QDir, scale: Scale, element: ModeProfileElement) -> Self {
        Self {
            q_dir,
            scale,
            element,
            elements: HVec::new(),
        }
    }

    /// Append a trailing element. Hands the element back when all 31 slots
    /// are in use.
    pub fn push(&mut self, element: ModeProfileElement) -> Result<(), ModeProfileElement> {
        self.elements.push(element)
    }

    /// Head and trailing elements in wire order.
    pub fn iter(&self) -> impl Iterator<Item = &ModeProfileElement> {
        core::iter::once(&self.element).chain(self.elements.iter())
    }

    /// Decode the body that follows the common packet prefix.
    pub fn decode(q_dir: QDir, reader: &mut BitReader<'_>) -> Result<Self, DecodeError> {
        let scale = Scale::from_wire(reader.read("Q_SCALE", 2)?)?;
        let element = ModeProfileElement::decode(reader)?;
        let n_iter = reader.read("N_ITER", 5)?;
        let mut elements = HVec::new();
        for _ in 0..n_iter {
            elements
                .push(ModeProfileElement::decode(reader)?)
                .map_err(|_| DecodeError::InvalidValue {
                    field: "N_ITER",
                    value: n_iter,
                })?;
        }
        Ok(Self {
            q_dir,
            scale,
            element,
            elements,
        })
    }

    pub(crate) fn write_body(&self, writer: &mut BitWriter) {
        writer.write(self.scale.as_wire(), 2);
        self.element.write(writer);
        writer.write(self.elements.len() as u64, 5);
        for element in &self.elements {
            element.write(writer);
        }
    }
}

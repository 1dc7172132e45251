//! ETCS operating modes, levels and supervision status.

use crate::packets::MaMode;

/// ETCS onboard operating mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    /// Full Supervision.
    FullSupervision,
    /// On Sight.
    OnSight,
    /// Staff Responsible.
    StaffResponsible,
    /// Shunting.
    Shunting,
    /// Unfitted.
    Unfitted,
    /// Passive Shunting.
    PassiveShunting,
    /// Sleeping.
    Sleeping,
    /// Stand By.
    #[default]
    StandBy,
    /// Trip.
    Trip,
    /// Post Trip.
    PostTrip,
    /// System Failure.
    SystemFailure,
    /// Isolation.
    Isolation,
    /// No Power.
    NoPower,
    /// Non Leading.
    NonLeading,
    /// Limited Supervision.
    LimitedSupervision,
    /// National System.
    NationalSystem,
    /// Reversing.
    Reversing,
}

impl Mode {
    /// Two-letter abbreviation used on the DMI and in logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Mode::FullSupervision => "FS",
            Mode::OnSight => "OS",
            Mode::StaffResponsible => "SR",
            Mode::Shunting => "SH",
            Mode::Unfitted => "UN",
            Mode::PassiveShunting => "PS",
            Mode::Sleeping => "SL",
            Mode::StandBy => "SB",
            Mode::Trip => "TR",
            Mode::PostTrip => "PT",
            Mode::SystemFailure => "SF",
            Mode::Isolation => "IS",
            Mode::NoPower => "NP",
            Mode::NonLeading => "NL",
            Mode::LimitedSupervision => "LS",
            Mode::NationalSystem => "SN",
            Mode::Reversing => "RV",
        }
    }
}

impl From<MaMode> for Mode {
    fn from(mode: MaMode) -> Self {
        match mode {
            MaMode::OnSight => Mode::OnSight,
            MaMode::Shunting => Mode::Shunting,
            MaMode::LimitedSupervision => Mode::LimitedSupervision,
        }
    }
}

/// ETCS application level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Level {
    /// Level 0.
    #[default]
    N0,
    /// Level NTC (national train control).
    Ntc,
    /// Level 1.
    N1,
    /// Level 2.
    N2,
    /// Level 3.
    N3,
}

impl Level {
    /// Display label.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Level::N0 => "0",
            Level::Ntc => "NTC",
            Level::N1 => "1",
            Level::N2 => "2",
            Level::N3 => "3",
        }
    }
}

/// Ceiling/target speed supervision status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SupervisionStatus {
    /// Normal status.
    #[default]
    Normal,
    /// Indication status.
    Indication,
    /// Overspeed status.
    Overspeed,
    /// Warning status.
    Warning,
    /// Intervention status.
    Intervention,
}

impl SupervisionStatus {
    /// Label published on `etcs::supervision`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            SupervisionStatus::Normal => "NoS",
            SupervisionStatus::Indication => "IndS",
            SupervisionStatus::Overspeed => "OvS",
            SupervisionStatus::Warning => "WaS",
            SupervisionStatus::Intervention => "IntS",
        }
    }
}

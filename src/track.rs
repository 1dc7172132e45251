//! Track-side information the supervision consumes.
//!
//! [`TrackInformation`] is what deferred actions mutate: the mode profile of
//! the active authority and the two powerless-section conditions that are
//! published to the train.

use tracing::debug;

use crate::config::NationalValues;
use crate::mode_profile::ModeProfiles;
use crate::packets::{Packet, TrackCondition, TrackConditionKind};
use crate::position::{Orientation, Position};

/// Start and end of an announced track section.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SectionInfo {
    /// Start, if announced.
    pub start: Option<Position>,
    /// End, if announced.
    pub end: Option<Position>,
    /// Direction of travel the section was announced for.
    pub direction: Orientation,
}

impl SectionInfo {
    /// A section from `start` to `end`, met while travelling nominally.
    pub fn new(start: Position, end: Position) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            direction: Orientation::Nominal,
        }
    }

    /// Set the direction of travel the section lies ahead in.
    pub fn with_direction(mut self, direction: Orientation) -> Self {
        self.direction = direction;
        self
    }

    /// True when neither bound is known.
    pub fn is_unset(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// `<start>;<end>` as distances in metres ahead of `train`, one decimal,
    /// leaving a field empty when that bound is unknown.
    pub fn format_relative(&self, train: &Position) -> String {
        let sign = self.direction.sign();
        let field = |bound: Option<Position>| {
            bound
                .map(|p| format!("{:.1}", sign * train.distance_to(&p)))
                .unwrap_or_default()
        };
        format!("{};{}", field(self.start), field(self.end))
    }
}

/// Information received from trackside and kept until superseded.
#[derive(Clone, Debug, Default)]
pub struct TrackInformation {
    /// Mode profile of the active movement authority.
    pub mode_profiles: ModeProfiles,
    /// Powerless section where the main power switch must be opened.
    pub neutral_section: SectionInfo,
    /// Powerless section where the pantographs must be lowered.
    pub lower_pantograph: SectionInfo,
    /// National values in use.
    pub national_values: NationalValues,
}

impl TrackInformation {
    /// Empty information with the given national values.
    pub fn new(national_values: NationalValues) -> Self {
        Self {
            national_values,
            ..Default::default()
        }
    }

    /// Apply one packet received at `reference` while travelling in
    /// `direction`.
    pub fn apply_packet(
        &mut self,
        packet: &Packet,
        reference: Position,
        direction: Orientation,
        infill: bool,
    ) {
        match packet {
            Packet::ModeProfile(profile) => {
                self.mode_profiles.set_mode_profile(
                    profile,
                    reference,
                    direction,
                    infill,
                    &self.national_values,
                );
            }
            Packet::TrackCondition(conditions) => {
                self.apply_track_condition(conditions, reference, direction)
            }
            Packet::Other { nid_packet, .. } => {
                debug!(nid_packet, "packet carries no track information");
            }
        }
    }

    /// Apply a track condition packet received at `reference`, distances
    /// counting ahead in `direction`.
    ///
    /// An initial-state announcement clears both sections.
    pub fn apply_track_condition(
        &mut self,
        packet: &TrackCondition,
        reference: Position,
        direction: Orientation,
    ) {
        if packet.track_init.is_some() {
            self.neutral_section = SectionInfo::default();
            self.lower_pantograph = SectionInfo::default();
            return;
        }
        let mut running = reference;
        for condition in &packet.conditions {
            running = running.advance(u32::from(condition.d_trackcond), packet.scale, direction);
            let end = running.advance(u32::from(condition.l_trackcond), packet.scale, direction);
            let target = match condition.m_trackcond {
                TrackConditionKind::NeutralSection => &mut self.neutral_section,
                TrackConditionKind::LowerPantograph => &mut self.lower_pantograph,
                other => {
                    debug!(?other, "track condition not surfaced");
                    continue;
                }
            };
            *target = SectionInfo::new(running, end).with_direction(direction);
        }
    }

    /// Forget everything received from trackside.
    pub fn clear(&mut self) {
        self.mode_profiles.clear();
        self.neutral_section = SectionInfo::default();
        self.lower_pantograph = SectionInfo::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packets::{QDir, TrackConditionElement};
    use crate::position::Scale;

    #[test]
    fn unset_section_formats_empty_fields() {
        let info = SectionInfo::default();
        assert!(info.is_unset());
        assert_eq!(info.format_relative(&Position::default()), ";");
    }

    #[test]
    fn section_formats_relative_to_train() {
        let info = SectionInfo::new(
            Position::new(300.0, Orientation::Nominal),
            Position::new(450.5, Orientation::Nominal),
        );
        let train = Position::new(100.0, Orientation::Nominal);
        assert_eq!(info.format_relative(&train), "200.0;350.5");
    }

    #[test]
    fn conditions_fill_sections() {
        let mut packet = TrackCondition::new(
            QDir::Both,
            Scale::Metres1,
            TrackConditionElement::new(100, 50, TrackConditionKind::NeutralSection),
        );
        packet
            .push(TrackConditionElement::new(20, 10, TrackConditionKind::SoundHorn))
            .unwrap();
        packet
            .push(TrackConditionElement::new(30, 40, TrackConditionKind::LowerPantograph))
            .unwrap();

        let mut info = TrackInformation::default();
        info.apply_track_condition(
            &packet,
            Position::new(1000.0, Orientation::Nominal),
            Orientation::Nominal,
        );

        assert_eq!(info.neutral_section.start.map(|p| p.offset()), Some(1100.0));
        assert_eq!(info.neutral_section.end.map(|p| p.offset()), Some(1150.0));
        assert_eq!(info.lower_pantograph.start.map(|p| p.offset()), Some(1150.0));
        assert_eq!(info.lower_pantograph.end.map(|p| p.offset()), Some(1190.0));
    }

    #[test]
    fn reverse_travel_announces_sections_ahead() {
        let packet = TrackCondition::new(
            QDir::Both,
            Scale::Metres1,
            TrackConditionElement::new(200, 100, TrackConditionKind::NeutralSection),
        );
        let mut info = TrackInformation::default();
        let reference = Position::new(900.0, Orientation::Nominal);
        info.apply_track_condition(&packet, reference, Orientation::Reverse);

        assert_eq!(info.neutral_section.start.map(|p| p.offset()), Some(700.0));
        assert_eq!(info.neutral_section.end.map(|p| p.offset()), Some(600.0));
        assert_eq!(info.neutral_section.format_relative(&reference), "200.0;300.0");

        let closer = Position::new(850.0, Orientation::Nominal);
        assert_eq!(info.neutral_section.format_relative(&closer), "150.0;250.0");
    }

    #[test]
    fn initial_state_clears_sections() {
        let mut info = TrackInformation::default();
        info.neutral_section = SectionInfo::new(Position::default(), Position::default());
        info.apply_track_condition(
            &TrackCondition::initial_state(QDir::Both, Scale::Metres1, 0),
            Position::default(),
            Orientation::Nominal,
        );
        assert!(info.neutral_section.is_unset());
    }
}

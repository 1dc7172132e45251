//! Mode profile segments derived from packet 80.
//!
//! Each element of a [`ModeProfile`] packet becomes a [`ModeProfileSegment`]
//! anchored at a track [`Position`]: the running position starts at the
//! reference of the balise group and advances by `D_MAMODE` for every
//! element, head first, in the direction the group was passed in.
//!
//! [`ModeProfiles`] keeps the segments of the active movement authority
//! sorted along the direction of travel and free of overlaps. Main and
//! infill information merge under these rules:
//!
//! - a main packet supersedes every segment from its first start onward,
//!   whatever channel that segment came from;
//! - an infill segment never replaces anything. It is dropped when its start
//!   already exists or when it ends inside the range covered by main
//!   segments, and trimmed to the end of that range when it straddles it.
//!
//! A profile received while travelling the other way replaces the stored
//! one; infill for the other direction is ignored.
//!
//! # Example
//!
//! ```rust
//! use etcs_evc::config::NationalValues;
//! use etcs_evc::mode_profile::ModeProfiles;
//! use etcs_evc::packets::{MaMode, ModeProfile, ModeProfileElement, QDir};
//! use etcs_evc::position::{Orientation, Position, Scale};
//!
//! let packet = ModeProfile::new(
//!     QDir::Both,
//!     Scale::Metres1,
//!     ModeProfileElement::new(100, MaMode::OnSight, 500),
//! );
//! let mut profiles = ModeProfiles::new();
//! profiles.set_mode_profile(
//!     &packet,
//!     Position::default(),
//!     Orientation::Nominal,
//!     false,
//!     &NationalValues::default(),
//! );
//!
//! let segment = &profiles.segments()[0];
//! assert_eq!(segment.start.offset(), 100.0);
//! assert_eq!(segment.length, 500.0);
//! ```

use tracing::debug;

use crate::config::NationalValues;
use crate::packets::{MaMode, ModeProfile};
use crate::position::{Orientation, Position};

/// Channel a segment was received on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProfileOrigin {
    /// Main balise group or radio message.
    Main,
    /// Infill information announcing the next main group.
    Infill,
}

/// One supervised mode section of the movement authority.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModeProfileSegment {
    /// Start of the section.
    pub start: Position,
    /// Length in metres.
    pub length: f64,
    /// Mode supervised inside the section.
    pub mode: MaMode,
    /// The start of the section is a supervised location.
    pub starts_supervised_location: bool,
    /// Speed limit in m/s.
    pub speed: f64,
    /// Length of the acknowledgement area in rear of the start, metres.
    pub acknowledgement_length: f64,
    /// Where the segment came from.
    pub origin: ProfileOrigin,
    /// Direction of travel the section extends towards from `start`.
    pub direction: Orientation,
}

impl ModeProfileSegment {
    /// Offset of the end of the section.
    #[inline]
    pub fn end(&self) -> f64 {
        self.start.offset() + self.direction.sign() * self.length
    }

    /// True if `position` lies inside `[start, end)` along the direction of
    /// travel.
    pub fn contains(&self, position: &Position) -> bool {
        let along = self.direction.sign() * self.start.distance_to(position);
        along >= 0.0 && along < self.length
    }
}

/// Turn a packet into segments, in element order.
///
/// `direction` is the sense of travel in the frame of `reference`; every
/// distance is measured ahead of the train in that sense.
pub fn build_segments(
    profile: &ModeProfile,
    reference: Position,
    direction: Orientation,
    origin: ProfileOrigin,
    national: &NationalValues,
) -> Vec<ModeProfileSegment> {
    let mut running = reference;
    profile
        .iter()
        .map(|element| {
            running = running.advance(u32::from(element.d_mamode), profile.scale, direction);
            ModeProfileSegment {
                start: running,
                length: profile.scale.apply(u32::from(element.l_mamode)),
                mode: element.m_mamode,
                starts_supervised_location: element.beginning_is_svl,
                speed: element.v_mamode.resolve(element.m_mamode, national),
                acknowledgement_length: profile.scale.apply(u32::from(element.l_ackmamode)),
                origin,
                direction,
            }
        })
        .collect()
}

/// Ordered, non-overlapping mode profile of the active movement authority.
#[derive(Clone, Debug, Default)]
pub struct ModeProfiles {
    segments: Vec<ModeProfileSegment>,
    direction: Orientation,
}

impl ModeProfiles {
    /// An empty profile.
    pub fn new() -> Self {
        Self::default()
    }

    /// Segments in the order the train meets them.
    pub fn segments(&self) -> &[ModeProfileSegment] {
        &self.segments
    }

    /// Direction of travel the stored segments were received for.
    pub fn direction(&self) -> Orientation {
        self.direction
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True when no segment is stored.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The segment covering `position`, if any.
    pub fn segment_at(&self, position: &Position) -> Option<&ModeProfileSegment> {
        self.segments.iter().find(|s| s.contains(position))
    }

    /// Furthest end covered by main segments, as an offset.
    pub fn main_coverage_end(&self) -> Option<f64> {
        self.main_coverage_along()
            .map(|along| along * self.direction.sign())
    }

    /// Distance along the direction of travel, from the frame origin.
    #[inline]
    fn along(&self, offset: f64) -> f64 {
        offset * self.direction.sign()
    }

    fn main_coverage_along(&self) -> Option<f64> {
        self.segments
            .iter()
            .filter(|s| s.origin == ProfileOrigin::Main)
            .map(|s| self.along(s.start.offset()) + s.length)
            .reduce(f64::max)
    }

    /// Merge a mode profile packet received at `reference` while travelling
    /// in `direction`.
    ///
    /// Returns the number of segments stored.
    pub fn set_mode_profile(
        &mut self,
        profile: &ModeProfile,
        reference: Position,
        direction: Orientation,
        infill: bool,
        national: &NationalValues,
    ) -> usize {
        let origin = if infill {
            ProfileOrigin::Infill
        } else {
            ProfileOrigin::Main
        };
        if direction != self.direction {
            if !self.segments.is_empty() {
                if infill {
                    debug!(?direction, "infill mode profile for the other direction ignored");
                    return 0;
                }
                debug!(
                    dropped = self.segments.len(),
                    ?direction,
                    "mode profile replaced after change of direction"
                );
                self.segments.clear();
            }
            self.direction = direction;
        }

        let segments = build_segments(profile, reference, direction, origin, national);
        if origin == ProfileOrigin::Main {
            if let Some(first) = segments.first() {
                let from = self.along(first.start.offset());
                let superseded = self.prune_from(from);
                if superseded > 0 {
                    debug!(superseded, "mode profile superseded by main information");
                }
            }
        }

        let mut stored = 0;
        for segment in segments {
            let accepted = match origin {
                ProfileOrigin::Main => {
                    self.insert_main(segment);
                    true
                }
                ProfileOrigin::Infill => self.insert_infill(segment),
            };
            if accepted {
                stored += 1;
            }
        }
        debug!(
            stored,
            infill,
            reference = reference.offset(),
            total = self.segments.len(),
            "mode profile merged"
        );
        stored
    }

    fn insert_main(&mut self, segment: ModeProfileSegment) {
        self.segments.retain(|s| s.start != segment.start);
        self.insert_sorted(segment);
    }

    fn insert_infill(&mut self, mut segment: ModeProfileSegment) -> bool {
        if let Some(covered) = self.main_coverage_along() {
            let start = self.along(segment.start.offset());
            let end = start + segment.length;
            if end <= covered {
                return false;
            }
            if start < covered {
                segment.start = segment.start.offset_by(self.along(covered - start));
                segment.length = end - covered;
                segment.starts_supervised_location = false;
            }
        }
        if self.segments.iter().any(|s| s.start == segment.start) {
            return false;
        }
        self.insert_sorted(segment);
        true
    }

    fn insert_sorted(&mut self, segment: ModeProfileSegment) {
        let start = self.along(segment.start.offset());
        let index = self
            .segments
            .partition_point(|s| self.along(s.start.offset()) < start);
        self.segments.insert(index, segment);
        if index > 0 {
            self.clip(index - 1);
        }
        self.clip(index);
    }

    /// Shorten the segment at `index` so it ends where its successor starts.
    fn clip(&mut self, index: usize) {
        let Some(next_start) = self
            .segments
            .get(index + 1)
            .map(|s| self.along(s.start.offset()))
        else {
            return;
        };
        let start = self.along(self.segments[index].start.offset());
        let segment = &mut self.segments[index];
        if start + segment.length > next_start {
            segment.length = (next_start - start).max(0.0);
        }
    }

    /// Drop segments starting at or beyond `along`.
    fn prune_from(&mut self, along: f64) -> usize {
        let before = self.segments.len();
        let sign = self.direction.sign();
        self.segments.retain(|s| s.start.offset() * sign < along);
        before - self.segments.len()
    }

    /// Drop segments starting beyond the end of a shortened authority.
    pub fn prune_beyond(&mut self, ma_end: Position) -> usize {
        let before = self.segments.len();
        let limit = self.along(ma_end.offset());
        let sign = self.direction.sign();
        self.segments.retain(|s| s.start.offset() * sign <= limit);
        before - self.segments.len()
    }

    /// Drop segments lying entirely behind `position`.
    pub fn prune_passed(&mut self, position: Position) -> usize {
        let before = self.segments.len();
        let train = self.along(position.offset());
        let sign = self.direction.sign();
        self.segments
            .retain(|s| s.start.offset() * sign + s.length > train);
        before - self.segments.len()
    }

    /// Forget every segment, as on withdrawal of the authority.
    pub fn clear(&mut self) {
        self.segments.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packets::{MaModeSpeed, ModeProfileElement, QDir};
    use crate::position::Scale;

    fn national() -> NationalValues {
        NationalValues::default()
    }

    fn packet(elements: &[ModeProfileElement]) -> ModeProfile {
        let mut profile = ModeProfile::new(QDir::Both, Scale::Metres1, elements[0]);
        for element in &elements[1..] {
            profile.push(*element).unwrap();
        }
        profile
    }

    fn build(p: &ModeProfile, reference: Position) -> Vec<ModeProfileSegment> {
        build_segments(p, reference, Orientation::Nominal, ProfileOrigin::Main, &national())
    }

    fn merge(profiles: &mut ModeProfiles, p: &ModeProfile, infill: bool) -> usize {
        profiles.set_mode_profile(p, Position::default(), Orientation::Nominal, infill, &national())
    }

    fn starts(profiles: &ModeProfiles) -> Vec<f64> {
        profiles.segments().iter().map(|s| s.start.offset()).collect()
    }

    // =========================================================================
    // Building
    // =========================================================================

    #[test]
    fn single_on_sight_element() {
        let p = packet(&[ModeProfileElement::new(100, MaMode::OnSight, 500)]);
        let segments = build(&p, Position::default());
        assert_eq!(segments.len(), 1);
        let s = &segments[0];
        assert_eq!(s.start.offset(), 100.0);
        assert_eq!(s.length, 500.0);
        assert_eq!(s.mode, MaMode::OnSight);
        assert!((s.speed - 30.0 / 3.6).abs() < 1e-9);
        assert!(!s.starts_supervised_location);
    }

    #[test]
    fn running_position_accumulates() {
        let p = packet(&[
            ModeProfileElement::new(10, MaMode::OnSight, 5),
            ModeProfileElement::new(20, MaMode::Shunting, 5)
                .with_speed(MaModeSpeed::from_kmh(15))
                .with_svl(true),
            ModeProfileElement::new(30, MaMode::LimitedSupervision, 5).with_acknowledgement(3),
        ]);
        let reference = Position::new(1000.0, Orientation::Nominal);
        let segments = build(&p, reference);
        let starts: Vec<_> = segments.iter().map(|s| s.start.offset()).collect();
        assert_eq!(starts, [1010.0, 1030.0, 1060.0]);
        assert!((segments[1].speed - 15.0 / 3.6).abs() < 1e-9);
        assert!(segments[1].starts_supervised_location);
        assert!((segments[2].speed - 100.0 / 3.6).abs() < 1e-9);
        assert_eq!(segments[2].acknowledgement_length, 3.0);
    }

    #[test]
    fn scale_applies_to_distances_and_lengths() {
        let mut p = packet(&[ModeProfileElement::new(7, MaMode::OnSight, 3)]);
        p.scale = Scale::Decimetres;
        let s = build(&p, Position::default())[0];
        assert!((s.start.offset() - 0.7).abs() < 1e-9);
        assert!((s.length - 0.3).abs() < 1e-9);
    }

    #[test]
    fn reverse_travel_counts_distances_backwards() {
        let p = packet(&[
            ModeProfileElement::new(10, MaMode::OnSight, 5),
            ModeProfileElement::new(20, MaMode::Shunting, 5),
        ]);
        let reference = Position::new(1000.0, Orientation::Nominal);
        let segments =
            build_segments(&p, reference, Orientation::Reverse, ProfileOrigin::Main, &national());
        let starts: Vec<_> = segments.iter().map(|s| s.start.offset()).collect();
        assert_eq!(starts, [990.0, 970.0]);
        assert_eq!(segments[0].end(), 985.0);
        assert!(segments[0].contains(&Position::new(986.0, Orientation::Nominal)));
        assert!(!segments[0].contains(&Position::new(991.0, Orientation::Nominal)));
    }

    // =========================================================================
    // Merging
    // =========================================================================

    #[test]
    fn overlapping_elements_are_clipped() {
        let p = packet(&[
            ModeProfileElement::new(0, MaMode::OnSight, 500),
            ModeProfileElement::new(200, MaMode::Shunting, 100),
        ]);
        let mut profiles = ModeProfiles::new();
        assert_eq!(merge(&mut profiles, &p, false), 2);
        let segs = profiles.segments();
        assert_eq!(segs[0].length, 200.0);
        assert_eq!(segs[1].start.offset(), 200.0);
    }

    #[test]
    fn zero_distance_trailing_element_replaces_head() {
        let p = packet(&[
            ModeProfileElement::new(50, MaMode::OnSight, 100),
            ModeProfileElement::new(0, MaMode::Shunting, 100),
        ]);
        let mut profiles = ModeProfiles::new();
        merge(&mut profiles, &p, false);
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles.segments()[0].mode, MaMode::Shunting);
    }

    #[test]
    fn main_replaces_same_start() {
        let mut profiles = ModeProfiles::new();
        let first = packet(&[ModeProfileElement::new(100, MaMode::OnSight, 100)]);
        let second = packet(&[ModeProfileElement::new(100, MaMode::LimitedSupervision, 300)]);
        merge(&mut profiles, &first, false);
        merge(&mut profiles, &second, false);
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles.segments()[0].mode, MaMode::LimitedSupervision);
    }

    #[test]
    fn infill_never_duplicates_main_start() {
        let mut profiles = ModeProfiles::new();
        let main = packet(&[ModeProfileElement::new(100, MaMode::OnSight, 100)]);
        merge(&mut profiles, &main, false);

        let infill = packet(&[ModeProfileElement::new(100, MaMode::Shunting, 1000)]);
        assert_eq!(
            merge(&mut profiles, &infill, true),
            1
        );
        assert_eq!(starts(&profiles), [100.0, 200.0]);
        assert_eq!(profiles.segments()[0].mode, MaMode::OnSight);
        let trimmed = profiles.segments()[1];
        assert_eq!(trimmed.origin, ProfileOrigin::Infill);
        assert_eq!(trimmed.end(), 1100.0);
        assert!(!trimmed.starts_supervised_location);
    }

    #[test]
    fn infill_inside_main_coverage_is_dropped() {
        let mut profiles = ModeProfiles::new();
        let main = packet(&[ModeProfileElement::new(0, MaMode::OnSight, 1000)]);
        merge(&mut profiles, &main, false);
        let infill = packet(&[ModeProfileElement::new(300, MaMode::Shunting, 200)]);
        assert_eq!(
            merge(&mut profiles, &infill, true),
            0
        );
        assert_eq!(profiles.len(), 1);
    }

    #[test]
    fn infill_beyond_coverage_is_kept_whole() {
        let mut profiles = ModeProfiles::new();
        let infill = packet(&[ModeProfileElement::new(2000, MaMode::OnSight, 200).with_svl(true)]);
        merge(&mut profiles, &infill, true);
        let s = profiles.segments()[0];
        assert_eq!(s.start.offset(), 2000.0);
        assert!(s.starts_supervised_location);
    }

    #[test]
    fn main_supersedes_previous_tail() {
        let mut profiles = ModeProfiles::new();
        let first = packet(&[
            ModeProfileElement::new(100, MaMode::OnSight, 100),
            ModeProfileElement::new(400, MaMode::Shunting, 100),
        ]);
        merge(&mut profiles, &first, false);
        assert_eq!(starts(&profiles), [100.0, 500.0]);

        let second = packet(&[ModeProfileElement::new(100, MaMode::LimitedSupervision, 200)]);
        merge(&mut profiles, &second, false);
        assert_eq!(starts(&profiles), [100.0]);
        assert_eq!(profiles.segments()[0].mode, MaMode::LimitedSupervision);
        assert_eq!(profiles.segments()[0].length, 200.0);
    }

    #[test]
    fn main_keeps_segments_before_its_first_start() {
        let mut profiles = ModeProfiles::new();
        merge(&mut profiles, &packet(&[ModeProfileElement::new(0, MaMode::OnSight, 500)]), false);
        merge(&mut profiles, &packet(&[ModeProfileElement::new(300, MaMode::Shunting, 100)]), false);
        assert_eq!(starts(&profiles), [0.0, 300.0]);
        assert_eq!(profiles.segments()[0].length, 300.0);
    }

    #[test]
    fn main_overrides_earlier_infill() {
        let mut profiles = ModeProfiles::new();
        let infill = packet(&[ModeProfileElement::new(2000, MaMode::Shunting, 500)]);
        merge(&mut profiles, &infill, true);

        let main = packet(&[ModeProfileElement::new(0, MaMode::OnSight, 3000)]);
        merge(&mut profiles, &main, false);

        assert_eq!(profiles.len(), 1);
        let s = profiles.segments()[0];
        assert_eq!(s.origin, ProfileOrigin::Main);
        assert_eq!(s.length, 3000.0);
    }

    #[test]
    fn main_clips_infill_starting_before_it() {
        let mut profiles = ModeProfiles::new();
        merge(&mut profiles, &packet(&[ModeProfileElement::new(2000, MaMode::Shunting, 500)]), true);
        merge(&mut profiles, &packet(&[ModeProfileElement::new(2100, MaMode::OnSight, 300)]), false);

        let segs = profiles.segments();
        assert_eq!(starts(&profiles), [2000.0, 2100.0]);
        assert_eq!(segs[0].length, 100.0);
        assert_eq!(segs[1].length, 300.0);
    }

    #[test]
    fn reverse_store_stays_ordered_along_travel() {
        let mut profiles = ModeProfiles::new();
        let reference = Position::new(1000.0, Orientation::Nominal);
        let p = packet(&[
            ModeProfileElement::new(100, MaMode::OnSight, 300),
            ModeProfileElement::new(200, MaMode::Shunting, 100),
        ]);
        profiles.set_mode_profile(&p, reference, Orientation::Reverse, false, &national());
        let infill = packet(&[ModeProfileElement::new(250, MaMode::LimitedSupervision, 200)]);
        assert_eq!(
            profiles.set_mode_profile(&infill, reference, Orientation::Reverse, true, &national()),
            1
        );

        assert_eq!(profiles.direction(), Orientation::Reverse);
        assert_eq!(starts(&profiles), [900.0, 700.0, 600.0]);
        let segs = profiles.segments();
        assert_eq!(segs[0].length, 200.0);
        assert_eq!(segs[2].origin, ProfileOrigin::Infill);
        assert_eq!(segs[2].length, 50.0);
        assert_eq!(profiles.main_coverage_end(), Some(600.0));

        let at = Position::new(650.0, Orientation::Nominal);
        assert_eq!(profiles.segment_at(&at).map(|s| s.mode), Some(MaMode::Shunting));

        assert_eq!(profiles.prune_passed(Position::new(690.0, Orientation::Nominal)), 1);
        assert_eq!(starts(&profiles), [700.0, 600.0]);
        assert_eq!(profiles.prune_beyond(Position::new(650.0, Orientation::Nominal)), 1);
        assert_eq!(starts(&profiles), [700.0]);
    }

    #[test]
    fn change_of_direction_replaces_profile() {
        let mut profiles = ModeProfiles::new();
        let p = packet(&[ModeProfileElement::new(100, MaMode::OnSight, 100)]);
        merge(&mut profiles, &p, false);

        let reference = Position::new(500.0, Orientation::Nominal);
        assert_eq!(
            profiles.set_mode_profile(&p, reference, Orientation::Reverse, true, &national()),
            0
        );
        assert_eq!(starts(&profiles), [100.0]);

        profiles.set_mode_profile(&p, reference, Orientation::Reverse, false, &national());
        assert_eq!(starts(&profiles), [400.0]);
        assert_eq!(profiles.direction(), Orientation::Reverse);
    }

    // =========================================================================
    // Pruning
    // =========================================================================

    #[test]
    fn prune_and_lookup() {
        let p = packet(&[
            ModeProfileElement::new(0, MaMode::OnSight, 100),
            ModeProfileElement::new(100, MaMode::Shunting, 100),
            ModeProfileElement::new(100, MaMode::OnSight, 100),
        ]);
        let mut profiles = ModeProfiles::new();
        merge(&mut profiles, &p, false);

        let at = Position::new(150.0, Orientation::Nominal);
        assert_eq!(profiles.segment_at(&at).map(|s| s.mode), Some(MaMode::Shunting));

        assert_eq!(profiles.prune_beyond(Position::new(150.0, Orientation::Nominal)), 1);
        assert_eq!(starts(&profiles), [0.0, 100.0]);

        assert_eq!(profiles.prune_passed(Position::new(100.0, Orientation::Nominal)), 1);
        assert_eq!(starts(&profiles), [100.0]);

        profiles.clear();
        assert!(profiles.is_empty());
        assert_eq!(profiles.main_coverage_end(), None);
    }
}

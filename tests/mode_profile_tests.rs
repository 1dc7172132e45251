//! Integration tests for mode profiles received through telegrams

use etcs_evc::{
    bits::{decode_binary_digits, BitString},
    packets::{
        BaliseGroupId, MaMode, ModeProfile, ModeProfileElement, Packet, QDir, Telegram,
        TelegramHeader, INFILL_LOCATION_REFERENCE,
    },
    mode_profile::ProfileOrigin,
    ModeProfiles, Orientation, Position, Scale, VitalState,
};

fn header(nid_bg: u16) -> TelegramHeader {
    TelegramHeader {
        group: BaliseGroupId::new(5, nid_bg),
        ..Default::default()
    }
}

fn profile(q_dir: QDir, scale: Scale, elements: &[ModeProfileElement]) -> Packet {
    let mut packet = ModeProfile::new(q_dir, scale, elements[0]);
    for element in &elements[1..] {
        packet.push(*element).unwrap();
    }
    Packet::ModeProfile(packet)
}

fn infill_marker() -> Packet {
    Packet::Other {
        nid_packet: INFILL_LOCATION_REFERENCE,
        q_dir: QDir::Both,
        body: BitString::from(vec![false; 30]),
    }
}

/// Send a telegram over the wire encoding and run one supervision step.
fn receive(state: &mut VitalState, telegram: &Telegram) {
    let wire = telegram.to_bits().to_binary_digits();
    let decoded = Telegram::decode(&decode_binary_digits(&wire).unwrap()).unwrap();
    let position = state.position();
    state.enqueue_telegram(decoded, position, 0);
    state.control_step();
}

/// Segments are met one after the other along the direction of travel.
fn assert_well_formed(profiles: &ModeProfiles) {
    let sign = profiles.direction().sign();
    let segments = profiles.segments();
    for segment in segments {
        assert!(segment.length >= 0.0, "negative length: {segment:?}");
        assert_eq!(segment.direction, profiles.direction());
    }
    for pair in segments.windows(2) {
        assert!(sign * pair[0].start.offset() < sign * pair[1].start.offset());
        assert!(sign * pair[0].end() <= sign * pair[1].start.offset() + 1e-9);
    }
}

// ============================================================================
// Main information
// ============================================================================

#[test]
fn on_sight_segment_from_wire() {
    let mut state = VitalState::default();
    receive(
        &mut state,
        &Telegram::new(header(1)).with_packet(profile(
            QDir::Both,
            Scale::Metres1,
            &[ModeProfileElement::new(100, MaMode::OnSight, 500)],
        )),
    );

    let segments = state.track.mode_profiles.segments();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].start.offset(), 100.0);
    assert_eq!(segments[0].length, 500.0);
    assert_eq!(segments[0].mode, MaMode::OnSight);
    assert!(state.dispatcher().is_empty());
}

#[test]
fn ten_metre_scale_and_train_offset() {
    let mut state = VitalState::default();
    state.odometry.update_distance(250.0);
    receive(
        &mut state,
        &Telegram::new(header(1)).with_packet(profile(
            QDir::Both,
            Scale::Metres10,
            &[
                ModeProfileElement::new(10, MaMode::Shunting, 20),
                ModeProfileElement::new(30, MaMode::OnSight, 5),
            ],
        )),
    );

    let starts: Vec<_> = state
        .track
        .mode_profiles
        .segments()
        .iter()
        .map(|s| (s.start.offset(), s.length))
        .collect();
    assert_eq!(starts, [(350.0, 200.0), (650.0, 50.0)]);
}

#[test]
fn packet_for_other_direction_is_ignored() {
    let mut state = VitalState::default();
    let telegram = Telegram::new(header(1)).with_packet(profile(
        QDir::Reverse,
        Scale::Metres1,
        &[ModeProfileElement::new(10, MaMode::OnSight, 50)],
    ));

    receive(&mut state, &telegram);
    assert!(state.track.mode_profiles.is_empty());

    // moving backwards, the same group is now passed in reverse
    state.odometry.update_distance(-5.0);
    assert_eq!(state.odometry.direction, Orientation::Reverse);
    receive(&mut state, &telegram);
    assert_eq!(state.track.mode_profiles.len(), 1);
}

#[test]
fn repeated_main_profiles_stay_sorted_and_disjoint() {
    let mut state = VitalState::default();
    let announcements: [(u16, u16); 6] = [(100, 500), (300, 50), (50, 1000), (700, 10), (300, 0), (0, 20)];
    for (i, (d, l)) in announcements.into_iter().enumerate() {
        receive(
            &mut state,
            &Telegram::new(header(i as u16 + 1)).with_packet(profile(
                QDir::Both,
                Scale::Metres1,
                &[
                    ModeProfileElement::new(d, MaMode::OnSight, l),
                    ModeProfileElement::new(40, MaMode::Shunting, l / 2),
                ],
            )),
        );
        assert_well_formed(&state.track.mode_profiles);
    }
}

#[test]
fn reverse_travel_places_profile_ahead() {
    let mut state = VitalState::default();
    state.odometry.update_distance(1000.0);
    state.odometry.update_distance(900.0);
    assert_eq!(state.odometry.direction, Orientation::Reverse);

    receive(
        &mut state,
        &Telegram::new(header(1)).with_packet(profile(
            QDir::Both,
            Scale::Metres1,
            &[
                ModeProfileElement::new(100, MaMode::OnSight, 300),
                ModeProfileElement::new(150, MaMode::Shunting, 100),
            ],
        )),
    );

    let segments = state.track.mode_profiles.segments();
    let starts: Vec<_> = segments.iter().map(|s| s.start.offset()).collect();
    assert_eq!(starts, [800.0, 650.0]);
    assert_eq!(segments[0].length, 150.0);
    assert_well_formed(&state.track.mode_profiles);

    // still ahead after the next supervision step
    state.odometry.update_distance(820.0);
    state.control_step();
    assert_eq!(state.track.mode_profiles.len(), 2);
    state.odometry.update_distance(640.0);
    state.control_step();
    assert_eq!(state.track.mode_profiles.len(), 1);
}

#[test]
fn repeated_reverse_profiles_stay_ordered() {
    let mut state = VitalState::default();
    state.odometry.update_distance(5000.0);
    state.odometry.update_distance(4990.0);
    let announcements: [(u16, u16); 5] = [(100, 500), (300, 50), (50, 1000), (700, 10), (0, 20)];
    for (i, (d, l)) in announcements.into_iter().enumerate() {
        receive(
            &mut state,
            &Telegram::new(header(i as u16 + 1)).with_packet(profile(
                QDir::Both,
                Scale::Metres1,
                &[
                    ModeProfileElement::new(d, MaMode::OnSight, l),
                    ModeProfileElement::new(40, MaMode::Shunting, l / 2),
                ],
            )),
        );
        assert_well_formed(&state.track.mode_profiles);
    }
}

#[test]
fn new_main_profile_drops_superseded_segments() {
    let mut state = VitalState::default();
    receive(
        &mut state,
        &Telegram::new(header(1)).with_packet(profile(
            QDir::Both,
            Scale::Metres1,
            &[
                ModeProfileElement::new(100, MaMode::OnSight, 100),
                ModeProfileElement::new(400, MaMode::Shunting, 100),
            ],
        )),
    );
    receive(
        &mut state,
        &Telegram::new(header(2)).with_packet(profile(
            QDir::Both,
            Scale::Metres1,
            &[ModeProfileElement::new(100, MaMode::LimitedSupervision, 200)],
        )),
    );

    let segments = state.track.mode_profiles.segments();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].mode, MaMode::LimitedSupervision);
    assert_eq!(segments[0].length, 200.0);
}

// ============================================================================
// Infill
// ============================================================================

#[test]
fn infill_straddling_main_coverage_is_trimmed() {
    let mut state = VitalState::default();
    receive(
        &mut state,
        &Telegram::new(header(1)).with_packet(profile(
            QDir::Both,
            Scale::Metres1,
            &[ModeProfileElement::new(100, MaMode::OnSight, 500)],
        )),
    );

    receive(
        &mut state,
        &Telegram::new(header(2))
            .with_packet(infill_marker())
            .with_packet(profile(
                QDir::Both,
                Scale::Metres1,
                &[ModeProfileElement::new(400, MaMode::Shunting, 400).with_svl(true)],
            )),
    );

    let segments = state.track.mode_profiles.segments();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[1].start.offset(), 600.0);
    assert_eq!(segments[1].length, 200.0);
    assert_eq!(segments[1].mode, MaMode::Shunting);
    assert!(!segments[1].starts_supervised_location);
    assert_well_formed(&state.track.mode_profiles);
}

#[test]
fn infill_inside_main_coverage_is_dropped() {
    let mut state = VitalState::default();
    receive(
        &mut state,
        &Telegram::new(header(1)).with_packet(profile(
            QDir::Both,
            Scale::Metres1,
            &[ModeProfileElement::new(100, MaMode::OnSight, 500)],
        )),
    );
    receive(
        &mut state,
        &Telegram::new(header(2))
            .with_packet(infill_marker())
            .with_packet(profile(
                QDir::Both,
                Scale::Metres1,
                &[ModeProfileElement::new(200, MaMode::Shunting, 100)],
            )),
    );

    assert_eq!(state.track.mode_profiles.len(), 1);
    assert_eq!(state.track.mode_profiles.segments()[0].mode, MaMode::OnSight);
}

#[test]
fn main_received_after_infill_takes_over() {
    let mut state = VitalState::default();
    receive(
        &mut state,
        &Telegram::new(header(1))
            .with_packet(infill_marker())
            .with_packet(profile(
                QDir::Both,
                Scale::Metres1,
                &[ModeProfileElement::new(2000, MaMode::Shunting, 500)],
            )),
    );
    receive(
        &mut state,
        &Telegram::new(header(2)).with_packet(profile(
            QDir::Both,
            Scale::Metres1,
            &[ModeProfileElement::new(0, MaMode::OnSight, 3000)],
        )),
    );

    let segments = state.track.mode_profiles.segments();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].mode, MaMode::OnSight);
    assert_eq!(segments[0].length, 3000.0);
    assert_eq!(segments[0].origin, ProfileOrigin::Main);
}

#[test]
fn passed_segments_are_forgotten() {
    let mut state = VitalState::default();
    receive(
        &mut state,
        &Telegram::new(header(1)).with_packet(profile(
            QDir::Both,
            Scale::Metres1,
            &[
                ModeProfileElement::new(10, MaMode::OnSight, 90),
                ModeProfileElement::new(90, MaMode::Shunting, 100),
            ],
        )),
    );
    assert_eq!(state.track.mode_profiles.len(), 2);

    state.odometry.update_distance(150.0);
    state.control_step();

    let segments = state.track.mode_profiles.segments();
    assert_eq!(segments.len(), 1);
    assert!(segments[0].contains(&Position::new(150.0, Orientation::Nominal)));
}

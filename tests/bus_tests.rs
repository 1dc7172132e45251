//! Integration tests for the parameter bus

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use etcs_evc::{
    bus::{standard_parameters, BusRunner, SharedVitalState},
    config::{BusConfig, Config, ReconnectConfig, SupervisionConfig},
    hal::{MockInterpreter, MockTransport},
    packets::{
        BaliseGroupId, MaMode, ModeProfile, ModeProfileElement, Packet, QDir, Telegram,
        TelegramHeader, TrackCondition, TrackConditionElement, TrackConditionKind,
    },
    traits::IgnoreCommands,
    Scale,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn bus_config() -> BusConfig {
    BusConfig::default()
        .with_startup_delay_ms(0)
        .with_poll_timeout_ms(10)
        .with_reconnect(ReconnectConfig::default().with_backoff_ms(0, 0))
}

fn setup() -> (Arc<SharedVitalState>, BusRunner<MockTransport>) {
    init_tracing();
    let state = Arc::new(SharedVitalState::new(&Config::default()));
    let bus = bus_config();
    let parameters = standard_parameters(&bus, IgnoreCommands).unwrap();
    let runner = BusRunner::new(Arc::clone(&state), MockTransport::new(), parameters, bus);
    (state, runner)
}

fn telegram_line(telegram: &Telegram) -> String {
    format!("etcs::telegram={}", telegram.to_bits().to_binary_digits())
}

fn neutral_section_telegram(d: u16, l: u16) -> Telegram {
    Telegram::new(TelegramHeader {
        group: BaliseGroupId::new(3, 17),
        ..Default::default()
    })
    .with_packet(Packet::TrackCondition(TrackCondition::new(
        QDir::Both,
        Scale::Metres1,
        TrackConditionElement::new(d, l, TrackConditionKind::NeutralSection),
    )))
}

// ============================================================================
// Inbound values
// ============================================================================

#[test]
fn speed_below_threshold_reports_standstill() {
    let (state, mut runner) = setup();

    runner.transport_mut().queue_line("speed=36");
    runner.poll_once().unwrap();
    assert!(!state.with_state(|s| s.report_reasons.standstill));

    runner.transport_mut().queue_line("speed=0.5");
    runner.poll_once().unwrap();
    state.with_state(|s| {
        assert_eq!(s.train.speed_mps, 0.0);
        assert_eq!(s.train.speed_uncertainty_mps, 0.0);
        assert!(s.report_reasons.standstill);
    });
}

#[test]
fn dmi_feedback_forwarded_verbatim() {
    init_tracing();
    let state = Arc::new(SharedVitalState::new(&Config::default()));
    let interpreter = MockInterpreter::new();
    let parameters = standard_parameters(&bus_config(), interpreter.clone()).unwrap();
    let mut transport = MockTransport::new();
    transport.queue_line("etcs::dmi::feedback=json:{\"ack\":true}");
    let mut runner = BusRunner::new(state, transport, parameters, bus_config());

    runner.poll_once().unwrap();

    assert_eq!(interpreter.received(), ["json:{\"ack\":true}"]);
}

// ============================================================================
// Telegrams
// ============================================================================

#[test]
fn telegram_is_queued_and_wakes_supervision() {
    init_tracing();
    // a cycle far longer than the test, so only the wake-up gets the telegram in
    let config =
        Config::default().with_supervision(SupervisionConfig::default().with_cycle_ms(3_600_000));
    let state = Arc::new(SharedVitalState::new(&config));
    let parameters = standard_parameters(&bus_config(), IgnoreCommands).unwrap();
    let mut runner = BusRunner::new(Arc::clone(&state), MockTransport::new(), parameters, bus_config());
    let shutdown = Arc::new(AtomicBool::new(false));

    let supervision = {
        let state = Arc::clone(&state);
        let shutdown = Arc::clone(&shutdown);
        thread::spawn(move || {
            state.run_supervision(&shutdown, |_, _| {});
        })
    };

    let telegram = Telegram::new(TelegramHeader::default()).with_packet(Packet::ModeProfile(
        ModeProfile::new(
            QDir::Both,
            Scale::Metres1,
            ModeProfileElement::new(100, MaMode::OnSight, 500),
        ),
    ));
    runner.transport_mut().queue_line(telegram_line(&telegram));
    let report = runner.poll_once().unwrap();
    assert_eq!(report.applied, 1);
    assert!(report.woke_supervision);

    let deadline = Instant::now() + Duration::from_secs(5);
    while state.with_state(|s| s.track.mode_profiles.is_empty()) {
        assert!(Instant::now() < deadline, "supervision never processed the telegram");
        thread::sleep(Duration::from_millis(5));
    }

    shutdown.store(true, Ordering::SeqCst);
    state.notify();
    supervision.join().unwrap();

    state.with_state(|s| {
        assert!(!s.has_pending_telegrams());
        let segments = s.track.mode_profiles.segments();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start.offset(), 100.0);
        assert_eq!(segments[0].length, 500.0);
        assert_eq!(segments[0].mode, MaMode::OnSight);
    });
}

#[test]
fn invalid_telegram_enqueues_nothing() {
    let (state, mut runner) = setup();
    runner.transport_mut().queue_line("etcs::telegram=0110201");
    runner.transport_mut().queue_line("etcs::telegram=0101");

    let report = runner.poll_once().unwrap();

    assert_eq!(report.rejected, 2);
    assert!(!report.woke_supervision);
    assert_eq!(state.with_state(|s| s.pending_telegrams().count()), 0);
}

#[test]
fn neutral_section_published_relative_to_train() {
    let (state, mut runner) = setup();
    runner.poll_once().unwrap();
    assert_eq!(runner.transport().last_value("etcs::neutral_section"), Some(";"));

    runner
        .transport_mut()
        .queue_line(telegram_line(&neutral_section_telegram(200, 100)));
    runner.poll_once().unwrap();
    state.with_state(|s| s.control_step());

    runner.poll_once().unwrap();
    assert_eq!(
        runner.transport().last_value("etcs::neutral_section"),
        Some("200.0;300.0")
    );

    runner.transport_mut().queue_line("distance=50");
    runner.poll_once().unwrap();
    assert_eq!(
        runner.transport().last_value("etcs::neutral_section"),
        Some("150.0;250.0")
    );
}

// ============================================================================
// Publishing
// ============================================================================

#[test]
fn only_changed_values_are_published() {
    let (state, mut runner) = setup();

    assert_eq!(runner.poll_once().unwrap().published, 10);
    runner.transport_mut().clear_written();

    assert_eq!(runner.poll_once().unwrap().published, 0);
    assert!(runner.transport().written.is_empty());

    state.with_state(|s| {
        s.supervision.v_perm = 25.0;
        s.supervision.traction_cutoff = true;
    });
    runner.poll_once().unwrap();
    assert_eq!(
        runner.transport().written,
        ["etcs::tractioncutoff=true", "etcs::vperm=90.0"]
    );
}

#[test]
fn publish_unchanged_sends_every_value_each_cycle() {
    init_tracing();
    let state = Arc::new(SharedVitalState::new(&Config::default()));
    let bus = bus_config().with_publish_unchanged(true);
    let parameters = standard_parameters(&bus, IgnoreCommands).unwrap();
    let mut runner = BusRunner::new(state, MockTransport::new(), parameters, bus);

    runner.poll_once().unwrap();
    runner.poll_once().unwrap();

    assert_eq!(runner.transport().values_for("etcs::supervision"), ["NoS", "NoS"]);
}

// ============================================================================
// Connection loss
// ============================================================================

#[test]
fn reconnect_registers_and_republishes() {
    init_tracing();
    let state = Arc::new(SharedVitalState::new(&Config::default()));
    let shutdown = Arc::new(AtomicBool::new(false));
    let bus = bus_config();
    let parameters = standard_parameters(&bus, IgnoreCommands).unwrap();
    let mut transport = MockTransport::new().with_shutdown_after(3, Arc::clone(&shutdown));
    transport.disconnect_on_wait = Some(2);
    transport.fail_reconnects = 1;
    transport.queue_batch(["speed=72"]);
    let mut runner = BusRunner::new(Arc::clone(&state), transport, parameters, bus);

    runner.run(&shutdown).unwrap();

    let transport = runner.transport();
    assert_eq!(transport.reconnect_attempts, 2);
    assert_eq!(transport.registrations().len(), 18);
    assert_eq!(transport.values_for("etcs::emergency"), ["false", "false"]);
    assert!(state.with_state(|s| (s.train.speed_mps - 20.0).abs() < 1e-9));
}

//! The vital state shared by the supervision loop and the parameter bus.
//!
//! [`VitalState`] gathers everything both activities touch: sensor inputs,
//! odometry, supervision outputs, the generation counters with their pending
//! deferred items, and the queue of telegrams waiting for the supervision
//! loop. It is plain data; [`crate::bus::SharedVitalState`] owns it behind
//! the one lock.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{Config, SupervisionConfig};
use crate::deferred::{
    DeferredInformation, GenerationCounters, GenerationIndex, InformationDispatcher,
    Invalidation, InvalidationOutcome,
};
use crate::mode::{Level, Mode, SupervisionStatus};
use crate::packets::{BaliseGroupId, Telegram};
use crate::position::{Orientation, Position};
use crate::track::TrackInformation;

/// km/h to m/s.
#[inline]
pub fn kmh_to_mps(kmh: f64) -> f64 {
    kmh / 3.6
}

/// m/s to km/h.
#[inline]
pub fn mps_to_kmh(mps: f64) -> f64 {
    mps * 3.6
}

// ============================================================================
// Inputs
// ============================================================================

/// Odometer readings.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Odometry {
    /// Absolute odometer distance in metres.
    pub value: f64,
    /// Odometer value at the origin of the position frame.
    pub reference: f64,
    /// Direction of the last odometer movement.
    pub direction: Orientation,
    /// Orientation of the train relative to the position frame.
    pub orientation: Orientation,
    /// Odometric confidence interval in metres.
    pub confidence: f64,
}

impl Odometry {
    /// Take a new absolute reading, deriving the direction from the change.
    /// An unchanged reading keeps the previous direction.
    pub fn update_distance(&mut self, value: f64) {
        if value < self.value {
            self.direction = Orientation::Reverse;
        } else if value > self.value {
            self.direction = Orientation::Nominal;
        }
        self.value = value;
    }

    /// Current position of the train in the position frame.
    pub fn position(&self) -> Position {
        Position::new(self.value - self.reference, self.orientation).with_confidence(self.confidence)
    }
}

/// Position of the driver's direction controller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReverserPosition {
    /// Backwards.
    Reverse,
    /// Neutral.
    #[default]
    Neutral,
    /// Forwards.
    Forward,
}

impl ReverserPosition {
    /// Parse the integer encoding (`-1`, `0`, `1`).
    pub const fn from_wire(value: i32) -> Option<Self> {
        match value {
            -1 => Some(ReverserPosition::Reverse),
            0 => Some(ReverserPosition::Neutral),
            1 => Some(ReverserPosition::Forward),
            _ => None,
        }
    }
}

/// Train-borne sensor and cab inputs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TrainInputs {
    /// Estimated speed, m/s.
    pub speed_mps: f64,
    /// Speed measurement uncertainty, m/s.
    pub speed_uncertainty_mps: f64,
    /// Estimated acceleration, m/s².
    pub acceleration: f64,
    /// Driver-selected cruise speed, m/s.
    pub cruise_speed_mps: f64,
    /// A cab desk is open.
    pub desk_open: bool,
    /// The sleeping input is active.
    pub sleep_signal: bool,
    /// Direction controller.
    pub reverser: ReverserPosition,
}

impl TrainInputs {
    /// Take a speed reading in km/h.
    ///
    /// Readings below the standstill threshold are clamped to zero together
    /// with their uncertainty. Returns true when the train just came to a
    /// standstill.
    pub fn update_speed_kmh(&mut self, kmh: f64, config: &SupervisionConfig) -> bool {
        let previous = self.speed_mps;
        self.speed_mps = kmh_to_mps(kmh);
        self.speed_uncertainty_mps = config.speed_uncertainty_ratio * self.speed_mps;
        if self.speed_mps < config.standstill_threshold_mps {
            self.speed_mps = 0.0;
            self.speed_uncertainty_mps = 0.0;
        }
        previous != 0.0 && self.speed_mps == 0.0
    }

    /// Open or close the cab desk. A closed desk raises the sleeping input.
    pub fn set_desk_open(&mut self, open: bool) {
        self.desk_open = open;
        self.sleep_signal = !open;
    }
}

// ============================================================================
// Outputs
// ============================================================================

/// Values computed by the speed and distance supervision.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SupervisionOutputs {
    /// Emergency brake commanded.
    pub emergency_brake: bool,
    /// Service brake commanded.
    pub service_brake: bool,
    /// Traction cut-off commanded.
    pub traction_cutoff: bool,
    /// Permitted speed, m/s.
    pub v_perm: f64,
    /// Target speed, m/s.
    pub v_target: f64,
    /// Service brake intervention speed, m/s.
    pub v_sbi: f64,
    /// Supervision status.
    pub status: SupervisionStatus,
}

impl SupervisionOutputs {
    /// Speed a driver-assist system may hold in Full Supervision, m/s.
    ///
    /// Permitted speed, or one m/s below it but not under the target speed
    /// while a target is being approached. `None` outside Full Supervision.
    pub fn assisted_speed(&self, mode: Mode) -> Option<f64> {
        if mode != Mode::FullSupervision {
            return None;
        }
        if self.v_target < self.v_perm {
            Some((self.v_perm - 1.0).max(self.v_target))
        } else {
            Some(self.v_perm)
        }
    }
}

/// Pending reasons for sending a position report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PositionReportReasons {
    /// The train came to a standstill.
    pub standstill: bool,
}

// ============================================================================
// Telegram queue
// ============================================================================

/// A telegram waiting for the supervision loop.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingTelegram {
    /// Decoded telegram.
    pub telegram: Telegram,
    /// Train position when it was received.
    pub position: Position,
    /// Reception time, ms since start-up.
    pub received_ms: u64,
}

// ============================================================================
// Vital state
// ============================================================================

/// All state shared between the supervision loop and the bus.
#[derive(Debug)]
pub struct VitalState {
    /// Odometer readings.
    pub odometry: Odometry,
    /// Sensor and cab inputs.
    pub train: TrainInputs,
    /// Supervision results.
    pub supervision: SupervisionOutputs,
    /// Pending position report reasons.
    pub report_reasons: PositionReportReasons,
    /// Track information received so far.
    pub track: TrackInformation,
    config: SupervisionConfig,
    mode: Mode,
    level: Level,
    counters: GenerationCounters,
    dispatcher: InformationDispatcher,
    pending_telegrams: VecDeque<PendingTelegram>,
    last_balise_group: Option<BaliseGroupId>,
    wake_requested: bool,
}

impl VitalState {
    /// Start-of-mission state.
    pub fn new(config: &Config) -> Self {
        Self {
            odometry: Odometry::default(),
            train: TrainInputs::default(),
            supervision: SupervisionOutputs::default(),
            report_reasons: PositionReportReasons::default(),
            track: TrackInformation::new(config.national_values.clone()),
            config: config.supervision.clone(),
            mode: Mode::default(),
            level: Level::default(),
            counters: GenerationCounters::new(),
            dispatcher: InformationDispatcher::new(),
            pending_telegrams: VecDeque::new(),
            last_balise_group: None,
            wake_requested: false,
        }
    }

    /// Supervision configuration in use.
    pub fn config(&self) -> &SupervisionConfig {
        &self.config
    }

    /// Current mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Current level.
    pub fn level(&self) -> Level {
        self.level
    }

    /// Live generation counters.
    pub fn counters(&self) -> &GenerationCounters {
        &self.counters
    }

    /// Pending deferred items.
    pub fn dispatcher(&self) -> &InformationDispatcher {
        &self.dispatcher
    }

    /// Originating group of the last accepted telegram.
    pub fn last_balise_group(&self) -> Option<BaliseGroupId> {
        self.last_balise_group
    }

    /// Current train position.
    pub fn position(&self) -> Position {
        self.odometry.position()
    }

    // ------------------------------------------------------------------
    // Inputs with side effects
    // ------------------------------------------------------------------

    /// Apply a speed reading in km/h, raising the standstill report reason
    /// when the train stops.
    pub fn update_speed_kmh(&mut self, kmh: f64) {
        if self.train.update_speed_kmh(kmh, &self.config) {
            self.report_reasons.standstill = true;
        }
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Switch mode. A change advances the mode generation and dispatches.
    pub fn set_mode(&mut self, mode: Mode) -> bool {
        if mode == self.mode {
            return false;
        }
        info!(from = self.mode.as_str(), to = mode.as_str(), "mode transition");
        self.mode = mode;
        self.counters.advance_mode();
        self.dispatch();
        true
    }

    /// Switch level. A change advances the level generation and dispatches.
    pub fn set_level(&mut self, level: Level) -> bool {
        if level == self.level {
            return false;
        }
        info!(from = self.level.as_str(), to = level.as_str(), "level transition");
        self.level = level;
        self.counters.advance_level();
        self.dispatch();
        true
    }

    // ------------------------------------------------------------------
    // Deferred information
    // ------------------------------------------------------------------

    /// Queue a deferred item and dispatch at once, in case it is already due.
    pub fn defer(&mut self, item: DeferredInformation) {
        self.dispatcher.insert(item);
        self.dispatch();
    }

    /// Fire due deferred items. Returns the number fired.
    pub fn dispatch(&mut self) -> usize {
        self.dispatcher.dispatch(&self.counters, &mut self.track)
    }

    /// Re-evaluate or drop the items depending on invalidated packets.
    pub fn invalidate(&mut self, cause: Invalidation) -> InvalidationOutcome {
        let outcome = self.dispatcher.invalidate(cause, &self.counters);
        if outcome != InvalidationOutcome::default() {
            debug!(?cause, ?outcome, "deferred information invalidated");
        }
        outcome
    }

    // ------------------------------------------------------------------
    // Telegrams
    // ------------------------------------------------------------------

    /// Queue a telegram for the supervision loop and request a wake-up.
    pub fn enqueue_telegram(&mut self, telegram: Telegram, position: Position, received_ms: u64) {
        self.pending_telegrams.push_back(PendingTelegram {
            telegram,
            position,
            received_ms,
        });
        self.wake_requested = true;
    }

    /// Consume the wake-up request.
    pub fn take_wake_request(&mut self) -> bool {
        core::mem::take(&mut self.wake_requested)
    }

    /// True if telegrams wait for processing.
    pub fn has_pending_telegrams(&self) -> bool {
        !self.pending_telegrams.is_empty()
    }

    /// Telegrams waiting for processing, oldest first.
    pub fn pending_telegrams(&self) -> impl Iterator<Item = &PendingTelegram> {
        self.pending_telegrams.iter()
    }

    /// Accept every queued telegram. Returns the number accepted.
    pub fn process_pending_telegrams(&mut self) -> usize {
        let mut accepted = 0;
        while let Some(pending) = self.pending_telegrams.pop_front() {
            self.accept_telegram(pending);
            accepted += 1;
        }
        accepted
    }

    /// Turn the packets of a telegram into deferred items.
    ///
    /// Packets apply at the current level whatever the mode, so they are
    /// normally due at once; those after an infill location reference are
    /// marked as infill. A telegram from a different group than the previous
    /// one re-evaluates the items still waiting on that previous group,
    /// which are the ones queued through [`Self::defer`] for a later level or
    /// mode.
    pub fn accept_telegram(&mut self, pending: PendingTelegram) {
        let group = pending.telegram.balise_group();
        if let Some(previous) = self.last_balise_group.filter(|g| *g != group) {
            self.invalidate(Invalidation::BaliseGroup(previous));
        }
        self.last_balise_group = Some(group);

        let direction = self.odometry.direction;
        let version = pending.telegram.header.m_version;
        let message = Arc::new(pending.telegram);
        let mut queued = 0;
        for (packet, infill) in message.applicable_packets(direction) {
            let item = DeferredInformation::new(
                GenerationIndex::Current,
                GenerationIndex::Any,
                &self.counters,
            )
            .with_timestamp_ms(pending.received_ms)
            .with_reference(pending.position)
            .with_infill(infill)
            .with_direction(direction)
            .with_balise_group(group)
            .with_version(version)
            .with_message(Arc::clone(&message))
            .link(Arc::new(packet.clone()));
            self.dispatcher.insert(item);
            queued += 1;
        }
        debug!(
            nid_c = group.nid_c,
            nid_bg = group.nid_bg,
            packets = queued,
            position = pending.position.offset(),
            "telegram accepted"
        );
        self.dispatch();
    }

    /// One supervision step: accept queued telegrams, fire due items and
    /// forget mode profile segments the train has passed.
    pub fn control_step(&mut self) {
        self.process_pending_telegrams();
        self.dispatch();
        let passed = self.track.mode_profiles.prune_passed(self.position());
        if passed > 0 {
            debug!(passed, "passed mode profile segments pruned");
        }
    }
}

impl Default for VitalState {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

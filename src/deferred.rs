//! Deferred information: trackside actions waiting for a level or mode.
//!
//! Trackside messages often carry information that only takes effect once the
//! onboard reaches a given level or mode. Each such action is stored as a
//! [`DeferredInformation`] keyed on two generation counters, one per axis,
//! that count level and mode transitions since start-up. The
//! [`InformationDispatcher`] fires an item once, the first time the live
//! counters match, and removes it.
//!
//! Counters only grow, so an item waiting for a generation already passed
//! can never fire and is dropped on the next dispatch.
//!
//! # Example
//!
//! ```rust
//! use etcs_evc::deferred::{
//!     DeferredInformation, GenerationCounters, GenerationIndex, InformationAction,
//!     InformationDispatcher,
//! };
//! use etcs_evc::track::TrackInformation;
//!
//! let mut counters = GenerationCounters::new();
//! let mut dispatcher = InformationDispatcher::new();
//! let mut track = TrackInformation::default();
//!
//! dispatcher.insert(
//!     DeferredInformation::new(GenerationIndex::Any, GenerationIndex::Next, &counters)
//!         .with_action(InformationAction::custom(|track| track.clear())),
//! );
//!
//! assert_eq!(dispatcher.dispatch(&counters, &mut track), 0);
//! counters.advance_mode();
//! assert_eq!(dispatcher.dispatch(&counters, &mut track), 1);
//! assert!(dispatcher.is_empty());
//! ```

use core::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::packets::{BaliseGroupId, Packet, Telegram};
use crate::position::{Orientation, Position};
use crate::track::TrackInformation;

// ============================================================================
// Generations
// ============================================================================

/// Generation an item waits for on one axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Generation {
    /// Matches every generation.
    Any,
    /// Matches exactly this generation.
    At(u64),
}

impl Generation {
    /// True if an item waiting for `self` may fire at `live`.
    #[inline]
    pub fn matches(self, live: u64) -> bool {
        match self {
            Generation::Any => true,
            Generation::At(n) => n == live,
        }
    }

    /// True if `live` has already moved past `self`.
    #[inline]
    pub fn is_stale(self, live: u64) -> bool {
        matches!(self, Generation::At(n) if n < live)
    }
}

/// Generation requested by a packet, relative to the counters at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GenerationIndex {
    /// Any generation.
    Any,
    /// The generation in effect now.
    Current,
    /// The generation after the next transition.
    Next,
    /// An absolute generation.
    Specific(u64),
}

impl GenerationIndex {
    /// Resolve against the live counter value.
    pub fn resolve(self, live: u64) -> Generation {
        match self {
            GenerationIndex::Any => Generation::Any,
            GenerationIndex::Current => Generation::At(live),
            GenerationIndex::Next => Generation::At(live.saturating_add(1)),
            GenerationIndex::Specific(n) => Generation::At(n),
        }
    }
}

/// Level and mode transition counters.
///
/// Both start at 0, the "unknown" generation before the first transition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GenerationCounters {
    level: u64,
    mode: u64,
}

impl GenerationCounters {
    /// Counters at the unknown generation.
    pub const fn new() -> Self {
        Self { level: 0, mode: 0 }
    }

    /// Current level generation.
    #[inline]
    pub fn level(&self) -> u64 {
        self.level
    }

    /// Current mode generation.
    #[inline]
    pub fn mode(&self) -> u64 {
        self.mode
    }

    /// Record a level transition, returning the new generation.
    pub fn advance_level(&mut self) -> u64 {
        self.level = self.level.saturating_add(1);
        self.level
    }

    /// Record a mode transition, returning the new generation.
    pub fn advance_mode(&mut self) -> u64 {
        self.mode = self.mode.saturating_add(1);
        self.mode
    }
}

// ============================================================================
// Items
// ============================================================================

/// Opaque identifier of a radio communication session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(pub u32);

/// Closure run by a [`InformationAction::Custom`] item.
pub type CustomAction = Box<dyn FnOnce(&mut TrackInformation) + Send>;

/// What a deferred item does when it fires.
pub enum InformationAction {
    /// Apply every linked packet at the item's reference position.
    Default,
    /// Run a closure against the track information.
    Custom(CustomAction),
}

impl InformationAction {
    /// Wrap a closure.
    pub fn custom<F>(f: F) -> Self
    where
        F: FnOnce(&mut TrackInformation) + Send + 'static,
    {
        InformationAction::Custom(Box::new(f))
    }
}

impl fmt::Debug for InformationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InformationAction::Default => f.write_str("Default"),
            InformationAction::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// An action waiting for a level and mode generation.
#[derive(Debug)]
pub struct DeferredInformation {
    level_index: GenerationIndex,
    mode_index: GenerationIndex,
    /// Level generation the item fires at.
    pub level_generation: Generation,
    /// Mode generation the item fires at.
    pub mode_generation: Generation,
    /// Action run on firing.
    pub action: InformationAction,
    /// Reception time in milliseconds since start-up.
    pub timestamp_ms: u64,
    /// Reference position of the originating balise group, in the
    /// odometric frame.
    pub reference: Position,
    /// Received as infill.
    pub infill: bool,
    /// Radio session the information arrived on.
    pub session: Option<SessionId>,
    /// Direction the balise group was passed in. Distances in the linked
    /// packets count ahead of the reference in this sense.
    pub direction: Orientation,
    /// Originating balise group.
    pub nid_bg: Option<BaliseGroupId>,
    /// `M_VERSION` of the originating message.
    pub version: u8,
    /// Already re-evaluated once.
    pub reevaluated: bool,
    /// Originating telegram.
    pub message: Option<Arc<Telegram>>,
    /// Packets the item depends on.
    pub linked_packets: Vec<Arc<Packet>>,
}

impl DeferredInformation {
    /// An item using the default action, resolved against `counters`.
    pub fn new(
        level_index: GenerationIndex,
        mode_index: GenerationIndex,
        counters: &GenerationCounters,
    ) -> Self {
        Self {
            level_index,
            mode_index,
            level_generation: level_index.resolve(counters.level()),
            mode_generation: mode_index.resolve(counters.mode()),
            action: InformationAction::Default,
            timestamp_ms: 0,
            reference: Position::default(),
            infill: false,
            session: None,
            direction: Orientation::Nominal,
            nid_bg: None,
            version: 0,
            reevaluated: false,
            message: None,
            linked_packets: Vec::new(),
        }
    }

    /// Set the action.
    pub fn with_action(mut self, action: InformationAction) -> Self {
        self.action = action;
        self
    }

    /// Set the reception time.
    pub fn with_timestamp_ms(mut self, ms: u64) -> Self {
        self.timestamp_ms = ms;
        self
    }

    /// Set the reference position.
    pub fn with_reference(mut self, reference: Position) -> Self {
        self.reference = reference;
        self
    }

    /// Mark as infill.
    pub fn with_infill(mut self, infill: bool) -> Self {
        self.infill = infill;
        self
    }

    /// Attach the owning radio session.
    pub fn with_session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }

    /// Set the passing direction.
    pub fn with_direction(mut self, direction: Orientation) -> Self {
        self.direction = direction;
        self
    }

    /// Set the originating balise group.
    pub fn with_balise_group(mut self, group: BaliseGroupId) -> Self {
        self.nid_bg = Some(group);
        self
    }

    /// Set the protocol version.
    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    /// Attach the originating telegram.
    pub fn with_message(mut self, message: Arc<Telegram>) -> Self {
        self.message = Some(message);
        self
    }

    /// Add a linked packet.
    pub fn link(mut self, packet: Arc<Packet>) -> Self {
        self.linked_packets.push(packet);
        self
    }

    /// True if both axes match the live counters.
    pub fn is_due(&self, counters: &GenerationCounters) -> bool {
        self.level_generation.matches(counters.level())
            && self.mode_generation.matches(counters.mode())
    }

    /// True if either axis can no longer match.
    pub fn is_stale(&self, counters: &GenerationCounters) -> bool {
        self.level_generation.is_stale(counters.level())
            || self.mode_generation.is_stale(counters.mode())
    }

    fn affected_by(&self, cause: &Invalidation) -> bool {
        match cause {
            Invalidation::BaliseGroup(group) => self.nid_bg == Some(*group),
            Invalidation::SessionLost(session) => self.session == Some(*session),
            Invalidation::DirectionReversal => true,
        }
    }

    fn reevaluate(&mut self, cause: &Invalidation, counters: &GenerationCounters) {
        self.level_generation = self.level_index.resolve(counters.level());
        self.mode_generation = self.mode_index.resolve(counters.mode());
        // the reference stays in the odometric frame, only the sense of
        // travel it is read in changes
        if *cause == Invalidation::DirectionReversal {
            self.direction = self.direction.negate();
        }
        self.reevaluated = true;
    }

    fn fire(self, track: &mut TrackInformation) {
        match self.action {
            InformationAction::Default => {
                for packet in &self.linked_packets {
                    track.apply_packet(packet, self.reference, self.direction, self.infill);
                }
            }
            InformationAction::Custom(action) => action(track),
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Event invalidating the packets some items depend on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Invalidation {
    /// A balise group was re-identified.
    BaliseGroup(BaliseGroupId),
    /// A radio session was lost.
    SessionLost(SessionId),
    /// The train reversed its direction.
    DirectionReversal,
}

/// Result of an invalidation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InvalidationOutcome {
    /// Items kept with `reevaluated` set.
    pub reevaluated: usize,
    /// Items dropped after their second invalidation.
    pub dropped: usize,
}

/// Pending deferred items.
#[derive(Debug, Default)]
pub struct InformationDispatcher {
    pending: Vec<DeferredInformation>,
}

impl InformationDispatcher {
    /// An empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an item.
    pub fn insert(&mut self, item: DeferredInformation) {
        debug!(
            level = ?item.level_generation,
            mode = ?item.mode_generation,
            packets = item.linked_packets.len(),
            "deferred information queued"
        );
        self.pending.push(item);
    }

    /// Number of pending items.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending items in insertion order.
    pub fn pending(&self) -> impl Iterator<Item = &DeferredInformation> {
        self.pending.iter()
    }

    /// Fire every due item, drop stale ones, keep the rest.
    ///
    /// Returns the number of items fired.
    pub fn dispatch(&mut self, counters: &GenerationCounters, track: &mut TrackInformation) -> usize {
        let mut fired = 0;
        for item in core::mem::take(&mut self.pending) {
            if item.is_due(counters) {
                item.fire(track);
                fired += 1;
            } else if item.is_stale(counters) {
                debug!(
                    level = ?item.level_generation,
                    mode = ?item.mode_generation,
                    live_level = counters.level(),
                    live_mode = counters.mode(),
                    "stale deferred information dropped"
                );
            } else {
                self.pending.push(item);
            }
        }
        fired
    }

    /// Re-evaluate or drop the items affected by `cause`.
    pub fn invalidate(
        &mut self,
        cause: Invalidation,
        counters: &GenerationCounters,
    ) -> InvalidationOutcome {
        let mut outcome = InvalidationOutcome::default();
        self.pending.retain_mut(|item| {
            if !item.affected_by(&cause) {
                return true;
            }
            if item.reevaluated {
                warn!(?cause, nid_bg = ?item.nid_bg, "deferred information invalidated twice, dropped");
                outcome.dropped += 1;
                return false;
            }
            item.reevaluate(&cause, counters);
            outcome.reevaluated += 1;
            true
        });
        outcome
    }

    /// Drop every pending item.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

//! Configuration for the vital core and its parameter bus.
//!
//! Identifiers use `heapless::String` so the tree is allocation free.
//!
//! # Example
//!
//! ```rust
//! use etcs_evc::config::{BusConfig, Config, NationalValues};
//!
//! // Use defaults
//! let config = Config::default();
//! assert_eq!(config.bus.poll_timeout_ms, 300);
//!
//! // Or customize
//! let config = Config::default()
//!     .with_bus(BusConfig::default().with_client_name("evc-test").with_publish_unchanged(true))
//!     .with_national_values(NationalValues::default().with_onsight_kmh(40));
//! assert!(config.bus.publish_unchanged);
//! ```

use core::time::Duration;

use heapless::String as HString;

use crate::packets::MaMode;

/// Maximum length for short config strings (client names)
pub const MAX_SHORT_STRING: usize = 64;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

// ============================================================================
// Helper for creating heapless strings
// ============================================================================

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    let mut hs = ShortString::new();
    for ch in s.chars() {
        if hs.push(ch).is_err() {
            break;
        }
    }
    hs
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete core configuration
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Parameter bus configuration
    pub bus: BusConfig,
    /// Supervision loop and odometry configuration
    pub supervision: SupervisionConfig,
    /// National default values
    pub national_values: NationalValues,
}

impl Config {
    /// Set bus configuration
    pub fn with_bus(mut self, bus: BusConfig) -> Self {
        self.bus = bus;
        self
    }

    /// Set supervision configuration
    pub fn with_supervision(mut self, supervision: SupervisionConfig) -> Self {
        self.supervision = supervision;
        self
    }

    /// Set national values
    pub fn with_national_values(mut self, national_values: NationalValues) -> Self {
        self.national_values = national_values;
        self
    }
}

// ============================================================================
// Bus Config
// ============================================================================

/// Parameter bus configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BusConfig {
    /// Name the core announces itself with in logs
    pub client_name: ShortString,
    /// Upper bound on one wait for inbound data, in milliseconds
    pub poll_timeout_ms: u32,
    /// Delay before the first poll, in milliseconds
    pub startup_delay_ms: u32,
    /// Publish every getter every cycle instead of only changed values
    pub publish_unchanged: bool,
    /// Reconnect policy
    pub reconnect: ReconnectConfig,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            client_name: short_string("evc"),
            poll_timeout_ms: 300,
            startup_delay_ms: 2000,
            publish_unchanged: false,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl BusConfig {
    /// Set the client name
    pub fn with_client_name(mut self, name: &str) -> Self {
        self.client_name = short_string(name);
        self
    }

    /// Set the poll timeout
    pub fn with_poll_timeout_ms(mut self, ms: u32) -> Self {
        self.poll_timeout_ms = ms;
        self
    }

    /// Set the startup delay
    pub fn with_startup_delay_ms(mut self, ms: u32) -> Self {
        self.startup_delay_ms = ms;
        self
    }

    /// Publish unchanged values every cycle
    pub fn with_publish_unchanged(mut self, publish: bool) -> Self {
        self.publish_unchanged = publish;
        self
    }

    /// Set the reconnect policy
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }
}

/// Reconnect policy with exponential backoff
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReconnectConfig {
    /// First backoff delay in milliseconds
    pub initial_backoff_ms: u32,
    /// Backoff ceiling in milliseconds
    pub max_backoff_ms: u32,
    /// Maximum reconnect attempts per outage (0 = unlimited)
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 500,
            max_backoff_ms: 8000,
            max_attempts: 0,
        }
    }
}

impl ReconnectConfig {
    /// Set the backoff range
    pub fn with_backoff_ms(mut self, initial: u32, max: u32) -> Self {
        self.initial_backoff_ms = initial;
        self.max_backoff_ms = max.max(initial);
        self
    }

    /// Set the maximum attempts
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Backoff before attempt `attempt` (1-based), doubling up to the ceiling.
    pub fn backoff_ms(&self, attempt: u32) -> u32 {
        let shift = attempt.saturating_sub(1).min(31);
        self.initial_backoff_ms
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff_ms)
    }

    /// True when `attempts` reached the configured maximum.
    pub fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts != 0 && attempts >= self.max_attempts
    }
}

// ============================================================================
// Supervision Config
// ============================================================================

/// Supervision loop and odometry configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SupervisionConfig {
    /// Fixed step of the supervision loop in milliseconds
    pub cycle_ms: u32,
    /// Speeds below this are treated as standstill, in m/s
    pub standstill_threshold_mps: f64,
    /// Speed measurement uncertainty as a fraction of the speed
    pub speed_uncertainty_ratio: f64,
}

impl Default for SupervisionConfig {
    fn default() -> Self {
        Self {
            cycle_ms: 50,
            standstill_threshold_mps: 0.2,
            speed_uncertainty_ratio: 0.007,
        }
    }
}

impl SupervisionConfig {
    /// Loop period as a `Duration`
    pub fn period(&self) -> Duration {
        Duration::from_millis(u64::from(self.cycle_ms.max(1)))
    }

    /// Set the loop period
    pub fn with_cycle_ms(mut self, ms: u32) -> Self {
        self.cycle_ms = ms.max(1);
        self
    }

    /// Set the standstill threshold
    pub fn with_standstill_threshold_mps(mut self, mps: f64) -> Self {
        self.standstill_threshold_mps = mps.max(0.0);
        self
    }

    /// Set the speed uncertainty ratio
    pub fn with_speed_uncertainty_ratio(mut self, ratio: f64) -> Self {
        self.speed_uncertainty_ratio = ratio.max(0.0);
        self
    }
}

// ============================================================================
// National Values
// ============================================================================

/// National default values used when trackside data defers to them
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NationalValues {
    /// `V_NVONSIGHT` in km/h
    pub v_nvonsight_kmh: u16,
    /// `V_NVLIMSUPERV` in km/h
    pub v_nvlimsuperv_kmh: u16,
    /// `V_NVSHUNT` in km/h
    pub v_nvshunt_kmh: u16,
}

impl Default for NationalValues {
    fn default() -> Self {
        Self {
            v_nvonsight_kmh: 30,
            v_nvlimsuperv_kmh: 100,
            v_nvshunt_kmh: 30,
        }
    }
}

impl NationalValues {
    /// Set the On Sight speed
    pub fn with_onsight_kmh(mut self, kmh: u16) -> Self {
        self.v_nvonsight_kmh = kmh;
        self
    }

    /// Set the Limited Supervision speed
    pub fn with_limited_supervision_kmh(mut self, kmh: u16) -> Self {
        self.v_nvlimsuperv_kmh = kmh;
        self
    }

    /// Set the Shunting speed
    pub fn with_shunting_kmh(mut self, kmh: u16) -> Self {
        self.v_nvshunt_kmh = kmh;
        self
    }

    /// National speed for `mode`, in m/s.
    pub fn speed_for(&self, mode: MaMode) -> f64 {
        let kmh = match mode {
            MaMode::OnSight => self.v_nvonsight_kmh,
            MaMode::Shunting => self.v_nvshunt_kmh,
            MaMode::LimitedSupervision => self.v_nvlimsuperv_kmh,
        };
        f64::from(kmh) / 3.6
    }
}

// ============================================================================
// Tests
// ============================================================================

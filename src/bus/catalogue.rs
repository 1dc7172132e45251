//! The parameters the core exchanges with the train environment.
//!
//! | Parameter | Dir | Payload |
//! |---|---|---|
//! | `distance` | in | odometer distance, m |
//! | `speed` | in | km/h |
//! | `acceleration` | in | m/s² |
//! | `master_key` | in | `1` when a cab desk is open |
//! | `controller::direction` | in | `-1`, `0`, `1` |
//! | `train_orientation` | in | `1` nominal, `-1` reverse |
//! | `etcs::telegram` | in | balise telegram as binary digits |
//! | `cruise_speed` | in | km/h |
//! | `etcs::dmi::feedback` | in | DMI command string |
//! | `etcs::emergency`, `etcs::fullbrake`, `etcs::tractioncutoff` | out | `true` / `false` |
//! | `etcs::neutral_section`, `etcs::lower_pantographs` | out | `<start>;<end>` |
//! | `etcs::atf` | out | assisted speed, m/s, `-1` outside Full Supervision |
//! | `etcs::vperm`, `etcs::vtarget`, `etcs::vsbi` | out | km/h |
//! | `etcs::supervision` | out | `NoS`, `IndS`, `OvS`, `WaS`, `IntS` |

use core::str::FromStr;

use tracing::debug;

use crate::bits::decode_binary_digits;
use crate::config::BusConfig;
use crate::deferred::Invalidation;
use crate::error::{ParameterError, RegistryError};
use crate::packets::Telegram;
use crate::position::Orientation;
use crate::traits::CommandInterpreter;
use crate::vital::{kmh_to_mps, mps_to_kmh, ReverserPosition};

use super::parameter::{Parameter, ParameterManager};

/// Name of the telegram parameter.
pub const TELEGRAM: &str = "etcs::telegram";

/// Name of the DMI feedback parameter.
pub const DMI_FEEDBACK: &str = "etcs::dmi::feedback";

fn parse_number<T: FromStr>(payload: &str) -> Result<T, ParameterError> {
    payload
        .trim()
        .parse()
        .map_err(|_| ParameterError::InvalidNumber(payload.to_string()))
}

fn parse_real(payload: &str) -> Result<f64, ParameterError> {
    let value: f64 = parse_number(payload)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ParameterError::InvalidNumber(payload.to_string()))
    }
}

fn speed_kmh(mps: f64) -> String {
    format!("{:.1}", mps_to_kmh(mps))
}

/// Register every inbound parameter.
pub fn register_inbound<I>(manager: &mut ParameterManager, mut interpreter: I) -> Result<(), RegistryError>
where
    I: CommandInterpreter + 'static,
{
    manager.register(Parameter::new("distance").with_setter(|state, payload, _| {
        state.odometry.update_distance(parse_real(payload)?);
        Ok(())
    }))?;

    manager.register(Parameter::new("speed").with_setter(|state, payload, _| {
        state.update_speed_kmh(parse_real(payload)?);
        Ok(())
    }))?;

    manager.register(Parameter::new("acceleration").with_setter(|state, payload, _| {
        state.train.acceleration = parse_real(payload)?;
        Ok(())
    }))?;

    manager.register(Parameter::new("master_key").with_setter(|state, payload, _| {
        state.train.set_desk_open(payload.trim() == "1");
        Ok(())
    }))?;

    manager.register(
        Parameter::new("controller::direction").with_setter(|state, payload, _| {
            let raw: i32 = parse_number(payload)?;
            state.train.reverser = ReverserPosition::from_wire(raw)
                .ok_or_else(|| ParameterError::InvalidValue(payload.to_string()))?;
            Ok(())
        }),
    )?;

    manager.register(
        Parameter::new("train_orientation").with_setter(|state, payload, _| {
            let raw: i32 = parse_number(payload)?;
            let orientation = Orientation::from_wire(raw)
                .ok_or_else(|| ParameterError::InvalidValue(payload.to_string()))?;
            if orientation != state.odometry.orientation {
                state.odometry.orientation = orientation;
                state.invalidate(Invalidation::DirectionReversal);
            }
            Ok(())
        }),
    )?;

    manager.register(Parameter::new(TELEGRAM).with_setter(|state, payload, now_ms| {
        let bits = decode_binary_digits(payload.trim())?;
        let telegram = Telegram::decode(&bits)?;
        let position = state.position();
        debug!(
            bits = bits.len(),
            packets = telegram.packets.len(),
            position = position.offset(),
            "telegram received"
        );
        state.enqueue_telegram(telegram, position, now_ms);
        Ok(())
    }))?;

    manager.register(Parameter::new("cruise_speed").with_setter(|state, payload, _| {
        state.train.cruise_speed_mps = kmh_to_mps(parse_real(payload)?);
        Ok(())
    }))?;

    manager.register(Parameter::new(DMI_FEEDBACK).with_setter(move |_, payload, _| {
        interpreter.interpret(payload);
        Ok(())
    }))?;

    Ok(())
}

/// Register every outbound parameter.
pub fn register_outbound(manager: &mut ParameterManager) -> Result<(), RegistryError> {
    manager.register(Parameter::new("etcs::emergency").with_getter(|state| {
        state.supervision.emergency_brake.to_string()
    }))?;

    manager.register(Parameter::new("etcs::fullbrake").with_getter(|state| {
        state.supervision.service_brake.to_string()
    }))?;

    manager.register(Parameter::new("etcs::tractioncutoff").with_getter(|state| {
        state.supervision.traction_cutoff.to_string()
    }))?;

    manager.register(Parameter::new("etcs::neutral_section").with_getter(|state| {
        state.track.neutral_section.format_relative(&state.position())
    }))?;

    manager.register(Parameter::new("etcs::lower_pantographs").with_getter(|state| {
        state.track.lower_pantograph.format_relative(&state.position())
    }))?;

    manager.register(Parameter::new("etcs::atf").with_getter(|state| {
        state
            .supervision
            .assisted_speed(state.mode())
            .map(|mps| format!("{mps:.2}"))
            .unwrap_or_else(|| "-1".to_string())
    }))?;

    manager.register(
        Parameter::new("etcs::vperm").with_getter(|state| speed_kmh(state.supervision.v_perm)),
    )?;

    manager.register(
        Parameter::new("etcs::vtarget").with_getter(|state| speed_kmh(state.supervision.v_target)),
    )?;

    manager.register(
        Parameter::new("etcs::vsbi").with_getter(|state| speed_kmh(state.supervision.v_sbi)),
    )?;

    manager.register(Parameter::new("etcs::supervision").with_getter(|state| {
        state.supervision.status.as_str().to_string()
    }))?;

    Ok(())
}

/// The full registry, inbound parameters first.
pub fn standard_parameters<I>(config: &BusConfig, interpreter: I) -> Result<ParameterManager, RegistryError>
where
    I: CommandInterpreter + 'static,
{
    let mut manager = ParameterManager::new(config.publish_unchanged);
    register_inbound(&mut manager, interpreter)?;
    register_outbound(&mut manager)?;
    Ok(manager)
}

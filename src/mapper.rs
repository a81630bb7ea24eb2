//! Translation between the flat shadow attribute set and the climate model.
//!
//! `to_climate_state` is total: missing attributes fall back to defaults and
//! out-of-range enum values land on `Unknown` sentinels, because the cloud
//! payload is not contractually versioned. `to_patch` emits only the fields
//! a command implies so unrelated desired state is never clobbered.

use serde_json::{Map, Value, json};

use crate::types::{
    AirQuality, ClimateState, Command, FanSpeed, FreshAir, FreshAirMode, HvacMode, SwingMode,
};

pub(crate) const ATTR_POWER_SWITCH: &str = "powerSwitch";
pub(crate) const ATTR_WORK_MODE: &str = "workMode";
pub(crate) const ATTR_TARGET_TEMPERATURE: &str = "targetTemperature";
pub(crate) const ATTR_CURRENT_TEMPERATURE: &str = "currentTemperature";
pub(crate) const ATTR_WIND_SPEED: &str = "windSpeed7Gear";
pub(crate) const ATTR_VERTICAL_DIRECTION: &str = "verticalDirection";
pub(crate) const ATTR_HORIZONTAL_DIRECTION: &str = "horizontalDirection";
pub(crate) const ATTR_ERROR_CODE: &str = "errorCode";
const ATTR_ECO: &str = "ECO";
const ATTR_SLEEP: &str = "sleep";
const ATTR_SELF_CLEAN: &str = "selfClean";
const ATTR_SCREEN: &str = "screen";
const ATTR_TVOC: &str = "sensorTVOC";
const ATTR_FRESH_SWITCH: &str = "newWindSwitch";
const ATTR_FRESH_MODE: &str = "newWindSetMode";
const ATTR_FRESH_STRENGTH: &str = "newWindStrength";
const ATTR_FRESH_AUTO: &str = "newWindAutoSwitch";

/// Louver axis position the unit parks at when not swinging.
const DIRECTION_PARKED: i64 = 8;
const DIRECTION_SWING: i64 = 1;

pub const MIN_TARGET_C: f64 = 16.0;
pub const MAX_TARGET_C: f64 = 31.0;
pub const TARGET_STEP_C: f64 = 0.5;

pub fn to_climate_state(attributes: &Map<String, Value>) -> ClimateState {
    let int = |key: &str, default: i64| -> i64 {
        attributes.get(key).and_then(Value::as_i64).unwrap_or(default)
    };
    let num = |key: &str, default: f64| -> f64 {
        attributes.get(key).and_then(Value::as_f64).unwrap_or(default)
    };
    let flag = |key: &str| -> bool { int(key, 0) != 0 };

    ClimateState {
        power: flag(ATTR_POWER_SWITCH),
        mode: HvacMode::from_work_mode(int(ATTR_WORK_MODE, 0)),
        target_temperature: num(ATTR_TARGET_TEMPERATURE, 26.0),
        current_temperature: num(ATTR_CURRENT_TEMPERATURE, 0.0),
        fan_speed: FanSpeed::from_gear(int(ATTR_WIND_SPEED, 0)),
        swing: SwingMode::from_axes(
            int(ATTR_VERTICAL_DIRECTION, DIRECTION_PARKED),
            int(ATTR_HORIZONTAL_DIRECTION, DIRECTION_PARKED),
        ),
        eco: flag(ATTR_ECO),
        sleep: flag(ATTR_SLEEP),
        self_clean: flag(ATTR_SELF_CLEAN),
        display: flag(ATTR_SCREEN),
        fresh_air: FreshAir {
            enabled: flag(ATTR_FRESH_SWITCH),
            mode: FreshAirMode::from_raw(int(ATTR_FRESH_MODE, 0)),
            strength: int(ATTR_FRESH_STRENGTH, 0).clamp(0, 3) as u8,
            auto_strength: flag(ATTR_FRESH_AUTO),
        },
        error_codes: error_codes(attributes.get(ATTR_ERROR_CODE)),
        tvoc: tvoc(attributes.get(ATTR_TVOC)),
    }
}

fn error_codes(value: Option<&Value>) -> Vec<i64> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_i64).collect(),
        Some(other) => other.as_i64().into_iter().collect(),
        None => Vec::new(),
    }
}

fn tvoc(value: Option<&Value>) -> Option<AirQuality> {
    let obj = value?.as_object()?;
    Some(AirQuality {
        level: obj.get("level").and_then(Value::as_i64)?,
        value: obj.get("value").and_then(Value::as_f64)?,
    })
}

/// Desired-state patch for one command. Total: an `Unknown` sentinel or an
/// all-`None` fresh-air request yields an empty patch, which callers treat
/// as nothing-to-send.
pub fn to_patch(command: &Command) -> Map<String, Value> {
    let mut patch = Map::new();
    match command {
        Command::Power(true) => {
            patch.insert(ATTR_POWER_SWITCH.to_string(), json!(1));
        }
        Command::Power(false) => {
            // Power-off also parks both louvers, matching the vendor app.
            patch.insert(ATTR_POWER_SWITCH.to_string(), json!(0));
            patch.insert(ATTR_VERTICAL_DIRECTION.to_string(), json!(DIRECTION_PARKED));
            patch.insert(ATTR_HORIZONTAL_DIRECTION.to_string(), json!(DIRECTION_PARKED));
        }
        Command::Mode(mode) => {
            if let Some(raw) = mode.work_mode() {
                patch.insert(ATTR_WORK_MODE.to_string(), json!(raw));
                patch.insert(ATTR_POWER_SWITCH.to_string(), json!(1));
            }
        }
        Command::TargetTemperature(celsius) => {
            patch.insert(ATTR_TARGET_TEMPERATURE.to_string(), json!(celsius));
        }
        Command::FanSpeed(speed) => {
            if let Some(gear) = speed.gear() {
                patch.insert(ATTR_WIND_SPEED.to_string(), json!(gear));
            }
        }
        Command::Swing(swing) => {
            patch.insert(
                ATTR_VERTICAL_DIRECTION.to_string(),
                json!(axis_value(swing.vertical_on())),
            );
            patch.insert(
                ATTR_HORIZONTAL_DIRECTION.to_string(),
                json!(axis_value(swing.horizontal_on())),
            );
        }
        Command::Eco(on) => {
            patch.insert(ATTR_ECO.to_string(), json!(*on as i64));
        }
        Command::Sleep(on) => {
            patch.insert(ATTR_SLEEP.to_string(), json!(*on as i64));
        }
        Command::SelfClean(on) => {
            patch.insert(ATTR_SELF_CLEAN.to_string(), json!(*on as i64));
        }
        Command::Display(on) => {
            patch.insert(ATTR_SCREEN.to_string(), json!(*on as i64));
        }
        Command::FreshAir { power, mode, strength, auto_strength } => {
            if let Some(on) = power {
                patch.insert(ATTR_FRESH_SWITCH.to_string(), json!(*on as i64));
            }
            // Mode and strength are dropped when explicitly switching off.
            if *power != Some(false) {
                if let Some(raw) = mode.as_ref().and_then(|m| m.raw()) {
                    patch.insert(ATTR_FRESH_MODE.to_string(), json!(raw));
                }
                if let Some(level) = strength {
                    patch.insert(ATTR_FRESH_STRENGTH.to_string(), json!(*level as i64));
                }
                match (auto_strength, strength) {
                    (Some(auto), _) => {
                        patch.insert(ATTR_FRESH_AUTO.to_string(), json!(*auto as i64));
                    }
                    (None, Some(_)) => {
                        // Manual strength implies auto off.
                        patch.insert(ATTR_FRESH_AUTO.to_string(), json!(0));
                    }
                    (None, None) => {}
                }
            }
        }
    }
    patch
}

fn axis_value(swinging: bool) -> i64 {
    if swinging { DIRECTION_SWING } else { DIRECTION_PARKED }
}

use serde_json::{Map, Value};

use crate::mapper::{
    ATTR_CURRENT_TEMPERATURE, ATTR_ERROR_CODE, ATTR_HORIZONTAL_DIRECTION, ATTR_POWER_SWITCH,
    ATTR_TARGET_TEMPERATURE, ATTR_VERTICAL_DIRECTION, ATTR_WIND_SPEED, ATTR_WORK_MODE,
};
use crate::types::{Event, FanSpeed, HvacMode, SwingMode};

/// Recursive JSON diff. Emits `(path, old, new)` for every leaf that changed
/// or appeared; dotted paths for nested values (`sensorTVOC.value`).
pub(crate) fn diff_values(
    previous: &Value,
    current: &Value,
    path_prefix: &str,
    changes: &mut Vec<(String, Value, Value)>,
) {
    match (previous, current) {
        (Value::Object(prev_map), Value::Object(curr_map)) => {
            for (key, curr_val) in curr_map {
                let path = if path_prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{path_prefix}.{key}")
                };
                match prev_map.get(key) {
                    Some(prev_val) => diff_values(prev_val, curr_val, &path, changes),
                    None if curr_val.is_object() => {
                        diff_values(&Value::Object(Map::new()), curr_val, &path, changes)
                    }
                    None => changes.push((path, Value::Null, curr_val.clone())),
                }
            }
        }
        (prev, curr) if prev != curr => {
            changes.push((path_prefix.to_string(), prev.clone(), curr.clone()));
        }
        _ => {}
    }
}

/// Fold attribute changes into typed events, with a generic fallback for
/// attributes the climate model does not interpret.
pub(crate) fn map_events(
    device_id: &str,
    changes: &[(String, Value, Value)],
    current: &Map<String, Value>,
) -> Vec<Event> {
    let mut events = Vec::new();
    let mut swing_emitted = false;

    for (path, _old, new_val) in changes {
        if let Some(event) = typed_event(device_id, path, new_val, current, &mut swing_emitted) {
            events.push(event);
        } else if !swing_emitted || (path != ATTR_VERTICAL_DIRECTION && path != ATTR_HORIZONTAL_DIRECTION)
        {
            events.push(Event::AttributeChanged {
                device_id: device_id.to_string(),
                field: path.clone(),
                value: new_val.clone(),
            });
        }
    }

    events
}

fn typed_event(
    device_id: &str,
    path: &str,
    new_val: &Value,
    current: &Map<String, Value>,
    swing_emitted: &mut bool,
) -> Option<Event> {
    let device_id = device_id.to_string();
    match path {
        ATTR_POWER_SWITCH => Some(Event::PowerChanged {
            device_id,
            on: new_val.as_i64()? != 0,
        }),
        ATTR_WORK_MODE => Some(Event::ModeChanged {
            device_id,
            mode: HvacMode::from_work_mode(new_val.as_i64()?),
        }),
        ATTR_TARGET_TEMPERATURE => Some(Event::TargetTemperatureChanged {
            device_id,
            celsius: new_val.as_f64()?,
        }),
        ATTR_CURRENT_TEMPERATURE => Some(Event::CurrentTemperatureChanged {
            device_id,
            celsius: new_val.as_f64()?,
        }),
        ATTR_WIND_SPEED => Some(Event::FanSpeedChanged {
            device_id,
            speed: FanSpeed::from_gear(new_val.as_i64()?),
        }),
        ATTR_VERTICAL_DIRECTION | ATTR_HORIZONTAL_DIRECTION => {
            // Both axes fold into one swing event even when both change.
            if *swing_emitted {
                return None;
            }
            *swing_emitted = true;
            let axis = |key: &str| current.get(key).and_then(Value::as_i64).unwrap_or(8);
            Some(Event::SwingChanged {
                device_id,
                swing: SwingMode::from_axes(
                    axis(ATTR_VERTICAL_DIRECTION),
                    axis(ATTR_HORIZONTAL_DIRECTION),
                ),
            })
        }
        ATTR_ERROR_CODE => {
            let codes = match new_val {
                Value::Array(items) => items.iter().filter_map(Value::as_i64).collect(),
                other => other.as_i64().into_iter().collect(),
            };
            Some(Event::ErrorCodesChanged { device_id, codes })
        }
        _ => None,
    }
}

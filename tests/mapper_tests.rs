use serde_json::{Map, Value, json};
use tcl_ac::{ClimateState, Command, FanSpeed, HvacAction, HvacMode, SwingMode, to_climate_state, to_patch};

fn attrs(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other:?}"),
    }
}

#[test]
fn product_fixture_maps_to_documented_values() {
    // Literal payload from the vendor app's logs.
    let state = to_climate_state(&attrs(json!({
        "powerSwitch": 1,
        "workMode": 0,
        "targetTemperature": 31,
        "currentTemperature": 25.1
    })));

    assert!(state.power);
    assert_eq!(state.mode, HvacMode::Cool);
    assert!((state.target_temperature - 31.0).abs() < 1e-9);
    assert!((state.current_temperature - 25.1).abs() < 1e-9);
    assert_eq!(state.hvac_action(), HvacAction::Cooling);
}

#[test]
fn mapping_is_total_over_arbitrary_documents() {
    // Missing, mistyped, and out-of-range attributes all land on defaults
    // or sentinels; nothing panics and nothing is left unset.
    let cases = [
        json!({}),
        json!({ "powerSwitch": "yes", "workMode": "cool" }),
        json!({ "workMode": 99, "windSpeed7Gear": -3 }),
        json!({ "targetTemperature": null, "sensorTVOC": 17 }),
        json!({ "errorCode": "E4", "verticalDirection": 1.5 }),
    ];

    for case in cases {
        let state = to_climate_state(&attrs(case.clone()));
        // Spot-check a few fields have concrete values.
        let _ = state.hvac_action();
        assert!(state.target_temperature.is_finite(), "case {case}");
        assert!(state.current_temperature.is_finite(), "case {case}");
    }

    let defaults = to_climate_state(&Map::new());
    assert_eq!(defaults, ClimateState::default());
}

#[test]
fn unknown_work_mode_maps_to_sentinel() {
    let state = to_climate_state(&attrs(json!({ "powerSwitch": 1, "workMode": 99 })));
    assert_eq!(state.mode, HvacMode::Unknown);
    assert_eq!(state.hvac_action(), HvacAction::Idle);
}

#[test]
fn round_trip_is_stable_for_mapper_controlled_fields() {
    let original = attrs(json!({
        "powerSwitch": 1,
        "workMode": 3,
        "targetTemperature": 22.5,
        "currentTemperature": 24.0,
        "windSpeed7Gear": 5,
        "ECO": 1
    }));
    let state = to_climate_state(&original);

    // Re-issue the state as commands and fold the patches back in.
    let mut patched = original.clone();
    for command in [
        Command::Power(state.power),
        Command::Mode(state.mode),
        Command::TargetTemperature(state.target_temperature),
        Command::FanSpeed(state.fan_speed),
    ] {
        for (key, value) in to_patch(&command) {
            patched.insert(key, value);
        }
    }

    let reread = to_climate_state(&patched);
    assert_eq!(reread.power, state.power);
    assert_eq!(reread.mode, state.mode);
    assert!((reread.target_temperature - state.target_temperature).abs() < 1e-9);
    assert_eq!(reread.fan_speed, state.fan_speed);
}

#[test]
fn round_trip_holds_for_powered_off_unit() {
    let original = attrs(json!({ "powerSwitch": 0, "targetTemperature": 26.0 }));
    let state = to_climate_state(&original);
    assert!(!state.power);

    let mut patched = original.clone();
    for (key, value) in to_patch(&Command::Power(state.power)) {
        patched.insert(key, value);
    }
    assert!(!to_climate_state(&patched).power);
}

#[test]
fn swing_state_survives_command_translation() {
    for swing in [SwingMode::Off, SwingMode::Vertical, SwingMode::Horizontal, SwingMode::Both] {
        let mut doc = Map::new();
        for (key, value) in to_patch(&Command::Swing(swing)) {
            doc.insert(key, value);
        }
        assert_eq!(to_climate_state(&doc).swing, swing, "{swing:?}");
    }
}

#[test]
fn fan_gears_survive_command_translation() {
    for speed in [FanSpeed::Auto, FanSpeed::Gear(1), FanSpeed::Gear(4), FanSpeed::Gear(7)] {
        let mut doc = Map::new();
        doc.insert("powerSwitch".to_string(), json!(1));
        for (key, value) in to_patch(&Command::FanSpeed(speed)) {
            doc.insert(key, value);
        }
        assert_eq!(to_climate_state(&doc).fan_speed, speed, "{speed:?}");
    }
}

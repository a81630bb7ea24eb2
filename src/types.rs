use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HvacMode {
    Cool,
    Heat,
    Auto,
    Dry,
    FanOnly,
    /// Sentinel for work-mode values the cloud payload may grow without
    /// notice. Mapping never fails on these.
    Unknown,
}

impl HvacMode {
    pub fn from_work_mode(raw: i64) -> Self {
        match raw {
            0 => HvacMode::Cool,
            1 => HvacMode::Heat,
            2 => HvacMode::Auto,
            3 => HvacMode::Dry,
            4 => HvacMode::FanOnly,
            _ => HvacMode::Unknown,
        }
    }

    /// Wire value, `None` for the sentinel.
    pub fn work_mode(&self) -> Option<i64> {
        match self {
            HvacMode::Cool => Some(0),
            HvacMode::Heat => Some(1),
            HvacMode::Auto => Some(2),
            HvacMode::Dry => Some(3),
            HvacMode::FanOnly => Some(4),
            HvacMode::Unknown => None,
        }
    }
}

/// What the unit is currently doing, derived from power and mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HvacAction {
    Off,
    Cooling,
    Heating,
    Drying,
    Fan,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanSpeed {
    Auto,
    /// Manual gear 1..=7.
    Gear(u8),
    Unknown,
}

impl FanSpeed {
    pub fn from_gear(raw: i64) -> Self {
        match raw {
            0 => FanSpeed::Auto,
            1..=7 => FanSpeed::Gear(raw as u8),
            _ => FanSpeed::Unknown,
        }
    }

    pub fn gear(&self) -> Option<i64> {
        match self {
            FanSpeed::Auto => Some(0),
            FanSpeed::Gear(g) => Some(*g as i64),
            FanSpeed::Unknown => None,
        }
    }
}

/// Louver sweep, folded from the two direction axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwingMode {
    #[default]
    Off,
    Vertical,
    Horizontal,
    Both,
}

impl SwingMode {
    /// Axis value 1 means the louver sweeps; any fixed position (the unit
    /// parks at 8) reads as not swinging.
    pub fn from_axes(vertical: i64, horizontal: i64) -> Self {
        match (vertical == 1, horizontal == 1) {
            (true, true) => SwingMode::Both,
            (true, false) => SwingMode::Vertical,
            (false, true) => SwingMode::Horizontal,
            (false, false) => SwingMode::Off,
        }
    }

    pub fn vertical_on(&self) -> bool {
        matches!(self, SwingMode::Vertical | SwingMode::Both)
    }

    pub fn horizontal_on(&self) -> bool {
        matches!(self, SwingMode::Horizontal | SwingMode::Both)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FreshAirMode {
    Fresh,
    Breathing,
    Exhaust,
    Purification,
    #[default]
    Unknown,
}

impl FreshAirMode {
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            1 => FreshAirMode::Fresh,
            2 => FreshAirMode::Breathing,
            3 => FreshAirMode::Exhaust,
            4 => FreshAirMode::Purification,
            _ => FreshAirMode::Unknown,
        }
    }

    pub fn raw(&self) -> Option<i64> {
        match self {
            FreshAirMode::Fresh => Some(1),
            FreshAirMode::Breathing => Some(2),
            FreshAirMode::Exhaust => Some(3),
            FreshAirMode::Purification => Some(4),
            FreshAirMode::Unknown => None,
        }
    }
}

/// Fresh-air subsystem state on units that have one.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FreshAir {
    pub enabled: bool,
    pub mode: FreshAirMode,
    /// Manual strength 1..=3; 0 when unset.
    pub strength: u8,
    pub auto_strength: bool,
}

/// Composite TVOC air-quality reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AirQuality {
    pub level: i64,
    pub value: f64,
}

/// Mapped snapshot of one unit. Every field has a default so mapping is
/// total over whatever subset of attributes the shadow carries.
#[derive(Debug, Clone, PartialEq)]
pub struct ClimateState {
    pub power: bool,
    pub mode: HvacMode,
    pub target_temperature: f64,
    pub current_temperature: f64,
    pub fan_speed: FanSpeed,
    pub swing: SwingMode,
    pub eco: bool,
    pub sleep: bool,
    pub self_clean: bool,
    pub display: bool,
    pub fresh_air: FreshAir,
    pub error_codes: Vec<i64>,
    pub tvoc: Option<AirQuality>,
}

impl Default for ClimateState {
    fn default() -> Self {
        Self {
            power: false,
            mode: HvacMode::Cool,
            target_temperature: 26.0,
            current_temperature: 0.0,
            fan_speed: FanSpeed::Auto,
            swing: SwingMode::Off,
            eco: false,
            sleep: false,
            self_clean: false,
            display: false,
            fresh_air: FreshAir::default(),
            error_codes: Vec::new(),
            tvoc: None,
        }
    }
}

impl ClimateState {
    pub fn hvac_action(&self) -> HvacAction {
        if !self.power {
            return HvacAction::Off;
        }
        match self.mode {
            HvacMode::Cool => HvacAction::Cooling,
            HvacMode::Heat => HvacAction::Heating,
            HvacMode::Dry => HvacAction::Drying,
            HvacMode::FanOnly => HvacAction::Fan,
            HvacMode::Auto | HvacMode::Unknown => HvacAction::Idle,
        }
    }

    pub fn has_error(&self) -> bool {
        !self.error_codes.is_empty()
    }
}

/// A device as listed by the account's thing inventory.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub device_id: String,
    #[serde(default)]
    pub nick_name: String,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub firmware_version: Option<String>,
}

/// A user-issued command, translated into a desired-state patch by the
/// mapper. Each variant patches only the fields it implies.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Power(bool),
    Mode(HvacMode),
    TargetTemperature(f64),
    FanSpeed(FanSpeed),
    Swing(SwingMode),
    Eco(bool),
    Sleep(bool),
    SelfClean(bool),
    Display(bool),
    FreshAir {
        power: Option<bool>,
        mode: Option<FreshAirMode>,
        strength: Option<u8>,
        auto_strength: Option<bool>,
    },
}

/// Per-device lifecycle while the monitor runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePhase {
    #[default]
    Uninitialized,
    Polling,
    Degraded,
}

/// Change notifications emitted when consecutive shadow documents differ.
#[derive(Debug, Clone)]
pub enum Event {
    PowerChanged { device_id: String, on: bool },
    ModeChanged { device_id: String, mode: HvacMode },
    TargetTemperatureChanged { device_id: String, celsius: f64 },
    CurrentTemperatureChanged { device_id: String, celsius: f64 },
    FanSpeedChanged { device_id: String, speed: FanSpeed },
    SwingChanged { device_id: String, swing: SwingMode },
    ErrorCodesChanged { device_id: String, codes: Vec<i64> },
    AvailabilityChanged { device_id: String, available: bool },
    AttributeChanged { device_id: String, field: String, value: Value },
}

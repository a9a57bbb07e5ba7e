use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HvacMode {
    Off,
    Heat,
    Cool,
    HeatCool,
    FanOnly,
}

impl HvacMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Heat => "heat",
            Self::Cool => "cool",
            Self::HeatCool => "heat_cool",
            Self::FanOnly => "fan_only",
        }
    }

    /// Case-insensitive parse of the wire name; unknown strings yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "off" => Some(Self::Off),
            "heat" => Some(Self::Heat),
            "cool" => Some(Self::Cool),
            "heat_cool" => Some(Self::HeatCool),
            "fan_only" => Some(Self::FanOnly),
            _ => None,
        }
    }

    pub fn calls_for_heat(self) -> bool {
        matches!(self, Self::Heat | Self::HeatCool)
    }

    pub fn calls_for_cool(self) -> bool {
        matches!(self, Self::Cool | Self::HeatCool)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HvacAction {
    Idle,
    Heating,
    Cooling,
    Fan,
}

impl HvacAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Heating => "heating",
            Self::Cooling => "cooling",
            Self::Fan => "fan",
        }
    }
}

/// Desired relay lines for one evaluation. Recomputed every cycle, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutputSet {
    pub fan: bool,
    pub heat1: bool,
    pub heat2: bool,
    pub compressor: bool,
}

impl OutputSet {
    pub fn all_off() -> Self {
        Self::default()
    }
}

/// Result of one control engine pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub outputs: OutputSet,
    pub action: HvacAction,
    /// A compressor call exists but a protection timer is withholding it.
    pub blocked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSignal {
    Off,
    LockoutAlert,
    Cooling,
    HeatStage1,
    HeatStage2,
    Fan,
    Idle,
}

impl StatusSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::LockoutAlert => "lockout-alert",
            Self::Cooling => "cooling",
            Self::HeatStage1 => "heat-stage-1",
            Self::HeatStage2 => "heat-stage-2",
            Self::Fan => "fan",
            Self::Idle => "idle",
        }
    }
}

/// Retained state document published after every evaluation. Carries the full
/// tunable set so an external observer can reconstruct the control context.
#[derive(Debug, Clone, Serialize)]
pub struct StatePayload {
    pub mode: &'static str,
    pub action: &'static str,
    pub current_temp: f32,
    pub target_temp: f32,
    pub humidity: f32,
    pub units: &'static str,
    pub min_on_s: u32,
    pub min_off_s: u32,
    pub deadband_f: f32,
    pub stage2_delta_f: f32,
    pub stage2_delay_s: u32,
    pub fan_with_heat: bool,
}

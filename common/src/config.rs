use serde::{Deserialize, Serialize};

/// Protection and behavior constants. All of these are live-tunable through the
/// command topic; none require a restart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlParams {
    /// Minimum compressor run time once energized, in seconds.
    pub min_on_s: u32,
    /// Minimum compressor rest time once de-energized, in seconds.
    pub min_off_s: u32,
    /// Comfort band width around the setpoint (half above, half below).
    pub deadband_f: f32,
    /// Setpoint shortfall that starts the stage-2 heat timer.
    pub stage2_delta_f: f32,
    /// Delay before stage-2 heat may engage after a large call begins.
    pub stage2_delay_s: u32,
    /// Energize the fan line with stage-1 heat (most furnaces manage their own
    /// blower, so this defaults off).
    pub fan_with_heat: bool,
}

impl Default for ControlParams {
    fn default() -> Self {
        Self {
            min_on_s: 300,
            min_off_s: 300,
            deadband_f: 0.8,
            stage2_delta_f: 2.0,
            stage2_delay_s: 600,
            fan_with_heat: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "192.168.1.100".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
        }
    }
}

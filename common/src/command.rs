use serde::Deserialize;
use thiserror::Error;

use crate::types::HvacMode;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Sparse ambient reading. Absent fields leave the stored value untouched.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TelemetryUpdate {
    #[serde(default)]
    pub temp_f: Option<f32>,
    #[serde(default)]
    pub humidity: Option<f32>,
}

/// Sparse command document. Every field is optional; absence means "no change".
/// Unrecognized mode strings are kept as raw text so the engine can ignore them
/// without failing the whole payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandUpdate {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub target_temp_f: Option<f32>,
    #[serde(default)]
    pub min_on_s: Option<u32>,
    #[serde(default)]
    pub min_off_s: Option<u32>,
    #[serde(default)]
    pub deadband_f: Option<f32>,
    #[serde(default)]
    pub stage2_delta_f: Option<f32>,
    #[serde(default)]
    pub stage2_delay_s: Option<u32>,
    #[serde(default)]
    pub fan_with_heat: Option<bool>,
    #[serde(default)]
    pub portal: Option<bool>,
    #[serde(default)]
    pub wifi_reset: Option<bool>,
}

impl CommandUpdate {
    pub fn parsed_mode(&self) -> Option<HvacMode> {
        self.mode.as_deref().and_then(HvacMode::parse)
    }
}

/// Administrative actions carried on the command topic. The control core only
/// surfaces these; provisioning and factory reset are the host's problem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdminRequests {
    pub open_portal: bool,
    pub wifi_reset: bool,
}

impl AdminRequests {
    pub fn any(self) -> bool {
        self.open_portal || self.wifi_reset
    }
}

pub fn parse_command(payload: &[u8]) -> Result<CommandUpdate, PayloadError> {
    Ok(serde_json::from_slice(payload)?)
}

pub fn parse_telemetry(payload: &[u8]) -> Result<TelemetryUpdate, PayloadError> {
    Ok(serde_json::from_slice(payload)?)
}

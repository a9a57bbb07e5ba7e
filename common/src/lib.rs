pub mod command;
pub mod config;
pub mod engine;
pub mod status;
pub mod topics;
pub mod types;

pub use command::{AdminRequests, CommandUpdate, PayloadError, TelemetryUpdate};
pub use config::{ControlParams, NetworkConfig};
pub use engine::ControlEngine;
pub use status::status_signal;
pub use topics::*;
pub use types::{Evaluation, HvacAction, HvacMode, OutputSet, StatePayload, StatusSignal};

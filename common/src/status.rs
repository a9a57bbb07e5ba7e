use crate::types::{Evaluation, HvacAction, HvacMode, StatusSignal};

/// Maps one evaluation onto the single status signal (the original hardware
/// drives an RGB LED with this). First match wins; re-derived every cycle.
pub fn status_signal(mode: HvacMode, eval: &Evaluation) -> StatusSignal {
    if mode == HvacMode::Off {
        return StatusSignal::Off;
    }
    if eval.blocked {
        return StatusSignal::LockoutAlert;
    }
    if eval.outputs.compressor || eval.action == HvacAction::Cooling {
        return StatusSignal::Cooling;
    }
    if eval.outputs.heat1 || eval.outputs.heat2 || eval.action == HvacAction::Heating {
        return if eval.outputs.heat2 {
            StatusSignal::HeatStage2
        } else {
            StatusSignal::HeatStage1
        };
    }
    if eval.action == HvacAction::Fan || (mode == HvacMode::FanOnly && eval.outputs.fan) {
        return StatusSignal::Fan;
    }
    StatusSignal::Idle
}

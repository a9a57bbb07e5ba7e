use crate::{
    command::{AdminRequests, CommandUpdate, TelemetryUpdate},
    config::ControlParams,
    types::{Evaluation, HvacAction, HvacMode, OutputSet, StatePayload},
};

/// Decision core of the controller. Owns the operating mode, setpoint, latest
/// ambient readings, tunable parameters, and the two protection timers
/// (compressor dwell, staged-heat delay). `evaluate` is the only place any of
/// the timer state changes.
///
/// All timing is injected as monotonic elapsed seconds, so tests drive the
/// clock directly.
#[derive(Debug, Clone)]
pub struct ControlEngine {
    params: ControlParams,

    mode: HvacMode,
    target_temp_f: f32,
    current_temp_f: f32,
    humidity: f32,

    compressor_on: bool,
    compressor_last_change_s: u64,

    heat1_on: bool,
    heat2_on: bool,
    heat_call_start_s: u64,

    last_action: HvacAction,
}

impl ControlEngine {
    pub fn new(params: ControlParams) -> Self {
        Self {
            params,
            mode: HvacMode::Off,
            target_temp_f: 72.0,
            current_temp_f: 72.0,
            humidity: 45.0,
            compressor_on: false,
            compressor_last_change_s: 0,
            heat1_on: false,
            heat2_on: false,
            heat_call_start_s: 0,
            last_action: HvacAction::Idle,
        }
    }

    pub fn mode(&self) -> HvacMode {
        self.mode
    }

    pub fn params(&self) -> &ControlParams {
        &self.params
    }

    pub fn target_temp_f(&self) -> f32 {
        self.target_temp_f
    }

    pub fn current_temp_f(&self) -> f32 {
        self.current_temp_f
    }

    pub fn humidity(&self) -> f32 {
        self.humidity
    }

    pub fn apply_telemetry(&mut self, update: &TelemetryUpdate) {
        if let Some(temp) = update.temp_f {
            self.current_temp_f = temp;
        }
        if let Some(humidity) = update.humidity {
            self.humidity = humidity;
        }
    }

    /// Applies a sparse command document field by field. An unrecognized mode
    /// string leaves the mode unchanged; absent fields never reset anything.
    /// Administrative flags pass straight through to the caller.
    pub fn apply_command(&mut self, update: &CommandUpdate) -> AdminRequests {
        if let Some(mode) = update.parsed_mode() {
            self.mode = mode;
        }
        if let Some(target) = update.target_temp_f {
            self.target_temp_f = target;
        }
        if let Some(value) = update.min_on_s {
            self.params.min_on_s = value;
        }
        if let Some(value) = update.min_off_s {
            self.params.min_off_s = value;
        }
        if let Some(value) = update.deadband_f {
            self.params.deadband_f = value;
        }
        if let Some(value) = update.stage2_delta_f {
            self.params.stage2_delta_f = value;
        }
        if let Some(value) = update.stage2_delay_s {
            self.params.stage2_delay_s = value;
        }
        if let Some(value) = update.fan_with_heat {
            self.params.fan_with_heat = value;
        }

        AdminRequests {
            open_portal: update.portal.unwrap_or(false),
            wifi_reset: update.wifi_reset.unwrap_or(false),
        }
    }

    pub fn evaluate(&mut self, now_s: u64) -> Evaluation {
        if self.mode == HvacMode::Off {
            // Unconditional shutdown: no timer is consulted. The guard
            // timestamp stays put so the next ON call is still gated by the
            // last real transition.
            self.compressor_on = false;
            self.heat1_on = false;
            self.heat2_on = false;
            self.heat_call_start_s = 0;
            self.last_action = HvacAction::Idle;
            return Evaluation {
                outputs: OutputSet::all_off(),
                action: HvacAction::Idle,
                blocked: false,
            };
        }

        let low = self.target_temp_f - self.params.deadband_f / 2.0;
        let high = self.target_temp_f + self.params.deadband_f / 2.0;

        let mut want = OutputSet::all_off();
        let mut action = HvacAction::Idle;
        let mut blocked = false;

        if self.mode.calls_for_cool() && self.current_temp_f > high {
            want.compressor = true;
            want.fan = true;
            action = HvacAction::Cooling;
        }

        if self.mode.calls_for_heat() && self.current_temp_f < low {
            want.heat1 = true;
            if self.params.fan_with_heat {
                want.fan = true;
            }
            if self.target_temp_f - self.current_temp_f >= self.params.stage2_delta_f {
                if self.heat_call_start_s == 0 {
                    self.heat_call_start_s = now_s;
                }
                if now_s.saturating_sub(self.heat_call_start_s)
                    >= u64::from(self.params.stage2_delay_s)
                {
                    want.heat2 = true;
                }
            } else if !self.heat1_on && !self.heat2_on {
                // A shrinking delta only clears the large-call timer while no
                // heat stage is running; otherwise the timer value is kept.
                self.heat_call_start_s = 0;
            }
            action = HvacAction::Heating;
        } else {
            self.heat_call_start_s = 0;
        }

        if self.mode == HvacMode::FanOnly {
            want.fan = true;
            action = HvacAction::Fan;
        }

        // Compressor dwell enforcement. Turning on requires the minimum rest
        // time; a request to turn off is overridden until the minimum run time
        // has elapsed.
        if want.compressor != self.compressor_on {
            let elapsed = now_s.saturating_sub(self.compressor_last_change_s);
            if want.compressor {
                if elapsed >= u64::from(self.params.min_off_s) {
                    self.compressor_on = true;
                    self.compressor_last_change_s = now_s;
                } else {
                    blocked = true;
                }
            } else if elapsed >= u64::from(self.params.min_on_s) {
                self.compressor_on = false;
                self.compressor_last_change_s = now_s;
            }
        }

        self.heat1_on = want.heat1;
        self.heat2_on = want.heat2;

        let outputs = OutputSet {
            // Cooling always runs the fan, even when fan_with_heat is off.
            fan: want.fan || self.compressor_on,
            heat1: self.heat1_on,
            heat2: self.heat2_on,
            compressor: self.compressor_on,
        };

        self.last_action = action;
        Evaluation {
            outputs,
            action,
            blocked,
        }
    }

    pub fn state_payload(&self) -> StatePayload {
        StatePayload {
            mode: self.mode.as_str(),
            action: self.last_action.as_str(),
            current_temp: self.current_temp_f,
            target_temp: self.target_temp_f,
            humidity: self.humidity,
            units: "F",
            min_on_s: self.params.min_on_s,
            min_off_s: self.params.min_off_s,
            deadband_f: self.params.deadband_f,
            stage2_delta_f: self.params.stage2_delta_f,
            stage2_delay_s: self.params.stage2_delay_s,
            fan_with_heat: self.params.fan_with_heat,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn engine_with(mode: HvacMode, target: f32, current: f32) -> ControlEngine {
        let mut engine = ControlEngine::new(ControlParams::default());
        engine.mode = mode;
        engine.target_temp_f = target;
        engine.current_temp_f = current;
        engine
    }

    #[test]
    fn cooling_starts_after_rest_time_elapsed() {
        // Band is 71.6..72.4, current well above, compressor rested 301s.
        let mut engine = engine_with(HvacMode::Cool, 72.0, 75.0);
        engine.compressor_last_change_s = 0;

        let eval = engine.evaluate(301);

        assert_eq!(eval.action, HvacAction::Cooling);
        assert!(!eval.blocked);
        assert!(eval.outputs.compressor);
        assert!(eval.outputs.fan);
        assert!(!eval.outputs.heat1);
        assert_eq!(engine.compressor_last_change_s, 301);
    }

    #[test]
    fn cooling_blocked_during_compressor_rest() {
        let mut engine = engine_with(HvacMode::Cool, 72.0, 75.0);
        engine.compressor_last_change_s = 0;

        let eval = engine.evaluate(100);

        assert!(eval.blocked);
        assert!(!eval.outputs.compressor);
        assert_eq!(eval.action, HvacAction::Cooling);
        // Timestamp untouched: the pending call stays gated by the original
        // transition, not by this refused attempt.
        assert_eq!(engine.compressor_last_change_s, 0);
    }

    #[test]
    fn blocked_call_unblocks_exactly_at_rest_deadline() {
        let mut engine = engine_with(HvacMode::Cool, 72.0, 75.0);
        engine.compressor_last_change_s = 500;

        assert!(engine.evaluate(799).blocked);
        let eval = engine.evaluate(800);
        assert!(!eval.blocked);
        assert!(eval.outputs.compressor);
    }

    #[test]
    fn minimum_run_overrides_shutoff_request() {
        let mut engine = engine_with(HvacMode::Cool, 72.0, 72.0);
        engine.compressor_on = true;
        engine.compressor_last_change_s = 1_000;

        // In band, so the call is gone, but only 100s of run time.
        let eval = engine.evaluate(1_100);
        assert!(eval.outputs.compressor);
        assert!(eval.outputs.fan);
        assert!(!eval.blocked);
        assert_eq!(eval.action, HvacAction::Idle);
        assert_eq!(engine.compressor_last_change_s, 1_000);

        // Min run satisfied: the compressor may release.
        let eval = engine.evaluate(1_300);
        assert!(!eval.outputs.compressor);
        assert!(!eval.outputs.fan);
        assert_eq!(engine.compressor_last_change_s, 1_300);
    }

    #[test]
    fn off_forces_shutdown_and_preserves_guard_timestamp() {
        let mut engine = engine_with(HvacMode::Cool, 72.0, 75.0);
        engine.compressor_on = true;
        engine.compressor_last_change_s = 500;
        engine.heat1_on = true;
        engine.heat_call_start_s = 400;

        engine.mode = HvacMode::Off;
        let eval = engine.evaluate(510);

        assert_eq!(eval.outputs, OutputSet::all_off());
        assert_eq!(eval.action, HvacAction::Idle);
        assert!(!eval.blocked);
        assert_eq!(engine.heat_call_start_s, 0);
        assert_eq!(engine.compressor_last_change_s, 500);

        // A cool call right after is still gated by the 500s transition.
        engine.mode = HvacMode::Cool;
        assert!(engine.evaluate(520).blocked);
        assert!(engine.evaluate(801).outputs.compressor);
    }

    #[test]
    fn stage2_engages_only_after_delay() {
        // Delta 6.0 >= stage2_delta 2.0, so the large-call timer starts.
        let mut engine = engine_with(HvacMode::Heat, 74.0, 68.0);

        let eval = engine.evaluate(100);
        assert_eq!(eval.action, HvacAction::Heating);
        assert!(eval.outputs.heat1);
        assert!(!eval.outputs.heat2);
        assert!(!eval.outputs.fan);
        assert_eq!(engine.heat_call_start_s, 100);

        let eval = engine.evaluate(699);
        assert!(!eval.outputs.heat2, "599s elapsed, delay is 600s");

        let eval = engine.evaluate(700);
        assert!(eval.outputs.heat2);
        assert!(eval.outputs.heat1);
    }

    #[test]
    fn fan_runs_with_heat_when_configured() {
        let mut engine = engine_with(HvacMode::Heat, 74.0, 68.0);
        engine.params.fan_with_heat = true;

        let eval = engine.evaluate(100);
        assert!(eval.outputs.heat1);
        assert!(eval.outputs.fan);
    }

    #[test]
    fn stage_timer_survives_delta_dip_while_heating() {
        let mut engine = engine_with(HvacMode::Heat, 74.0, 68.0);
        engine.evaluate(100);
        assert_eq!(engine.heat_call_start_s, 100);

        // Delta shrinks to 1.0 (still below the band edge 73.6, so demand
        // persists) with stage 1 running: timer is retained.
        engine.current_temp_f = 73.0;
        engine.evaluate(200);
        assert_eq!(engine.heat_call_start_s, 100);

        // Delta grows again; stage 2 fires against the original start.
        engine.current_temp_f = 68.0;
        let eval = engine.evaluate(700);
        assert!(eval.outputs.heat2);
    }

    #[test]
    fn stage_timer_resets_when_heat_demand_ends() {
        let mut engine = engine_with(HvacMode::Heat, 74.0, 68.0);
        engine.evaluate(100);
        assert_eq!(engine.heat_call_start_s, 100);

        engine.current_temp_f = 75.0;
        let eval = engine.evaluate(200);
        assert_eq!(eval.action, HvacAction::Idle);
        assert!(!eval.outputs.heat1);
        assert_eq!(engine.heat_call_start_s, 0);

        // A fresh large call measures its delay from its own start.
        engine.current_temp_f = 68.0;
        engine.evaluate(300);
        assert_eq!(engine.heat_call_start_s, 300);
        assert!(!engine.evaluate(899).outputs.heat2);
        assert!(engine.evaluate(900).outputs.heat2);
    }

    #[test]
    fn fan_only_runs_fan_and_nothing_else() {
        let mut engine = engine_with(HvacMode::FanOnly, 72.0, 80.0);
        let eval = engine.evaluate(1_000);

        assert_eq!(eval.action, HvacAction::Fan);
        assert!(eval.outputs.fan);
        assert!(!eval.outputs.compressor);
        assert!(!eval.outputs.heat1);
        assert!(!eval.blocked);
    }

    #[test]
    fn heat_cool_activates_one_branch_per_evaluation() {
        let mut engine = engine_with(HvacMode::HeatCool, 72.0, 75.0);
        engine.compressor_last_change_s = 0;

        let eval = engine.evaluate(400);
        assert_eq!(eval.action, HvacAction::Cooling);
        assert!(eval.outputs.compressor);
        assert!(!eval.outputs.heat1);

        // Swing cold: the compressor releases after min run, heat takes over.
        engine.current_temp_f = 68.0;
        let eval = engine.evaluate(800);
        assert_eq!(eval.action, HvacAction::Heating);
        assert!(eval.outputs.heat1);
        assert!(!eval.outputs.compressor);
    }

    #[test]
    fn evaluation_is_idempotent_at_fixed_time() {
        let mut engine = engine_with(HvacMode::Cool, 72.0, 75.0);
        engine.compressor_last_change_s = 0;

        let first = engine.evaluate(301);
        let second = engine.evaluate(301);
        assert_eq!(first, second);

        let mut idle = engine_with(HvacMode::Heat, 74.0, 74.0);
        assert_eq!(idle.evaluate(50), idle.evaluate(50));
    }

    #[test]
    fn within_band_is_idle() {
        let mut engine = engine_with(HvacMode::HeatCool, 72.0, 72.2);
        let eval = engine.evaluate(1_000);
        assert_eq!(eval.action, HvacAction::Idle);
        assert_eq!(eval.outputs, OutputSet::all_off());
    }

    #[test]
    fn command_updates_apply_sparsely() {
        let mut engine = engine_with(HvacMode::Heat, 70.0, 70.0);

        let admin = engine.apply_command(&CommandUpdate {
            target_temp_f: Some(68.0),
            min_off_s: Some(120),
            ..CommandUpdate::default()
        });

        assert_eq!(engine.mode(), HvacMode::Heat);
        assert_eq!(engine.target_temp_f(), 68.0);
        assert_eq!(engine.params().min_off_s, 120);
        assert_eq!(engine.params().min_on_s, 300);
        assert!(!admin.any());
    }

    #[test]
    fn unrecognized_mode_keeps_prior_mode() {
        let mut engine = engine_with(HvacMode::Cool, 72.0, 72.0);

        engine.apply_command(&CommandUpdate {
            mode: Some("turbo".to_string()),
            ..CommandUpdate::default()
        });
        assert_eq!(engine.mode(), HvacMode::Cool);

        engine.apply_command(&CommandUpdate {
            mode: Some("HEAT_COOL".to_string()),
            ..CommandUpdate::default()
        });
        assert_eq!(engine.mode(), HvacMode::HeatCool);
    }

    #[test]
    fn admin_flags_surface_without_touching_control_state() {
        let mut engine = engine_with(HvacMode::Heat, 70.0, 65.0);

        let admin = engine.apply_command(&CommandUpdate {
            portal: Some(true),
            wifi_reset: Some(true),
            ..CommandUpdate::default()
        });

        assert!(admin.open_portal);
        assert!(admin.wifi_reset);
        assert_eq!(engine.mode(), HvacMode::Heat);
        assert_eq!(engine.target_temp_f(), 70.0);
    }

    #[test]
    fn telemetry_fields_apply_independently() {
        let mut engine = engine_with(HvacMode::Off, 72.0, 72.0);

        engine.apply_telemetry(&TelemetryUpdate {
            temp_f: Some(68.5),
            humidity: None,
        });
        assert_eq!(engine.current_temp_f(), 68.5);
        assert_eq!(engine.humidity(), 45.0);

        engine.apply_telemetry(&TelemetryUpdate {
            temp_f: None,
            humidity: Some(51.0),
        });
        assert_eq!(engine.current_temp_f(), 68.5);
        assert_eq!(engine.humidity(), 51.0);
    }

    #[test]
    fn state_payload_reports_last_action_and_tunables() {
        let mut engine = engine_with(HvacMode::Cool, 72.0, 75.0);
        engine.compressor_last_change_s = 0;
        engine.evaluate(301);

        let payload = engine.state_payload();
        assert_eq!(payload.mode, "cool");
        assert_eq!(payload.action, "cooling");
        assert_eq!(payload.current_temp, 75.0);
        assert_eq!(payload.target_temp, 72.0);
        assert_eq!(payload.units, "F");
        assert_eq!(payload.min_off_s, 300);
        assert_eq!(payload.stage2_delay_s, 600);
    }
}

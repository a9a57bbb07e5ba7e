use hvac_common::OutputSet;
use tracing::info;

/// Host-side stand-in for the four relay lines (G fan, W1/W2 heat stages,
/// Y1 compressor). Tracks the applied state and logs transitions; the real
/// board drives GPIOs here.
#[derive(Debug, Default)]
pub struct RelayBank {
    applied: OutputSet,
}

impl RelayBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applied(&self) -> OutputSet {
        self.applied
    }

    pub fn apply(&mut self, outputs: OutputSet) {
        log_line("G", self.applied.fan, outputs.fan);
        log_line("W1", self.applied.heat1, outputs.heat1);
        log_line("W2", self.applied.heat2, outputs.heat2);
        log_line("Y1", self.applied.compressor, outputs.compressor);
        self.applied = outputs;
    }
}

fn log_line(line: &str, was: bool, now: bool) {
    if was != now {
        info!(line, on = now, "relay transition");
    }
}

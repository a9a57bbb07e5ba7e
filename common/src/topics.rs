pub const TOPIC_CMD: &str = "hvac/controller/cmd";
pub const TOPIC_AMBIENT: &str = "hvac/controller/ambient";
pub const TOPIC_STATE: &str = "hvac/controller/state";
pub const TOPIC_AVAILABILITY: &str = "hvac/controller/availability";

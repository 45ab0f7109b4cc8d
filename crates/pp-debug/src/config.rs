use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_SENTINEL_FUNCTION: &str = "debug::break";

/// Tunables for a debug session.
///
/// Every field has a default, so an empty object deserializes to a valid
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DebugConfig {
    /// Interval at which a parked evaluation re-checks for termination.
    pub poll_interval_ms: u64,
    /// How long the exit hook waits for the client to disconnect.
    pub exit_grace_period_ms: u64,
    /// Function name that always behaves as a function breakpoint.
    pub sentinel_function: String,
    /// Node kinds too coarse to be line breakpoint targets.
    pub excluded_node_kinds: Vec<String>,
    /// Identifier of the evaluation thread reported to the client.
    pub thread_id: i64,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 250,
            exit_grace_period_ms: 5000,
            sentinel_function: DEFAULT_SENTINEL_FUNCTION.to_string(),
            excluded_node_kinds: vec!["BlockExpression".to_string(), "HostClassDefinition".to_string()],
            thread_id: 1,
        }
    }
}

impl DebugConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn exit_grace_period(&self) -> Duration {
        Duration::from_millis(self.exit_grace_period_ms)
    }
}

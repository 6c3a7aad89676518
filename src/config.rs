//! Engine configuration: the protocol's fixed constants, made overridable.
//!
//! `Default` reproduces the original's hardcoded constants
//! (`STD_MAX_ERROR_COUNT`, `STD_HEARTBEAT_TIME`, the 100 ms receive timeout,
//! the queue's capacity of 10) so production callers get identical behavior
//! without passing anything; tests can shrink the timeouts to keep scenarios
//! fast.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Name of the SocketCAN interface to open, e.g. `"can0"`.
    pub interface: String,

    /// Applied to the transport at `init` whenever it is `Some`. The engine
    /// always sets a receive timeout; this default of 100ms matches the
    /// original's hardcoded behavior once its inverted `seconds < 0.0`
    /// branch is corrected (see DESIGN.md).
    pub receive_timeout: Duration,

    /// Period between heartbeat packets sent to the motion controller.
    pub heartbeat_period: Duration,

    /// Capacity of the outbound and inbound bounded queues.
    pub queue_capacity: usize,

    /// Number of consecutive receive (or send) failures tolerated before the
    /// engine stops itself.
    pub max_error_count: u32,
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig {
            interface: "can0".to_string(),
            receive_timeout: Duration::from_millis(100),
            heartbeat_period: Duration::from_millis(10),
            queue_capacity: 10,
            max_error_count: 3,
        }
    }
}

//! Shared tuning constants for the worker.

use std::time::Duration;

/// Maximum number of messages handled concurrently, process-wide.
pub const MAX_CONCURRENT_HANDLERS: usize = 50;

/// Maximum number of messages requested per queue poll.
pub const RECEIVE_BATCH_SIZE: i32 = 10;

/// Delay after a poll that returned no messages.
pub const EMPTY_POLL_DELAY: Duration = Duration::from_millis(500);

/// Idle delay in the dispatch loop when no channel is ready.
pub const RECEIVE_IDLE_DELAY: Duration = Duration::from_millis(100);

/// Visibility timeout applied to consumed messages.
pub const VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Long-poll wait window for the inbound queue.
pub const POLL_WAIT: Duration = Duration::from_secs(10);

/// Tick interval for the deployment and allocation monitors.
pub const MONITOR_INTERVAL: Duration = Duration::from_secs(1);

/// Default bound on deployment monitoring.
pub const DEFAULT_DEPLOYMENT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Initial interval of the reply/ack retry policy.
pub const BACKOFF_INITIAL_INTERVAL: Duration = Duration::from_secs(5);

/// Interval ceiling of the reply/ack retry policy.
pub const BACKOFF_MAX_INTERVAL: Duration = Duration::from_secs(10);

/// Total budget of the reply/ack retry policy.
pub const BACKOFF_MAX_ELAPSED: Duration = Duration::from_secs(300);

/// Request timeout for the object store, orchestrator and secret store clients.
pub const HTTP_CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

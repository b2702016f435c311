//! Global configuration surface.
//!
//! Spec §9: "constants in a config surface; never read from module-level
//! mutable state." Every interval, timeout, and backoff bound the core
//! depends on lives here as a `const`, never behind a mutable static.

use std::time::Duration;

/// Per-call timeout for ordinary session operations (§3).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-call timeout for long operations (§3).
pub const LONG_OP_TIMEOUT: Duration = Duration::from_secs(120);

/// Auth-status poller period (§4.E): initial poll is immediate.
pub const AUTH_POLL_PERIOD: Duration = Duration::from_secs(30);

/// Auth-watcher default period (§4.F).
pub const AUTH_WATCH_PERIOD: Duration = Duration::from_secs(10);

/// Auth-watcher exponential backoff bounds (§4.F, §8 invariant 6):
/// `min(1s * 2^(k-1), 5min)` after `k` consecutive failures.
pub const BACKOFF_MIN: Duration = Duration::from_secs(1);
pub const BACKOFF_MAX: Duration = Duration::from_secs(300);
pub const BACKOFF_FACTOR: u32 = 2;

/// Session notification queue capacity (§3, §5): drop-newest on
/// overflow per the Open Question resolved in DESIGN.md.
pub const NOTIFICATION_QUEUE_CAPACITY: usize = 10;

/// Background `wait_for_auth` timeout used by H's re-auth sub-state-machine
/// (§4.H), independent of the inbound request's own context.
pub const REAUTH_WAIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Wire protocol version exchanged on handshake (§6).
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Client info sent on handshake (§6).
pub mod client_info {
    pub const AGENT_NAME: &str = "muster-agent";
    pub const CLI_NAME: &str = "muster-cli";
    pub const VERSION: &str = "1.0.0";
}

/// Namespaced metadata key carrying the structured auth-required advisory
/// on wrapped tool results (§6).
pub const AUTH_METADATA_KEY: &str = "giantswarm.io/auth_required";

/// The one tool the pending-auth bootstrap server exposes (§4.G).
pub const PENDING_AUTH_TOOL_NAME: &str = "authenticate_muster";

/// The aggregator resource polled for auth status (§4.E, §6).
pub const AUTH_STATUS_RESOURCE_URI: &str = "auth://status";

/// The aggregator tool used for SSO token forwarding (§4.F, §6).
pub const SUBMIT_AUTH_TOKEN_TOOL: &str = "submit_auth_token";

//! muster-agent — an MCP aggregator client core.
//!
//! A long-running agent that holds exactly one connection to a single MCP
//! aggregator endpoint at a time, keeps its tool/resource/prompt catalogues
//! fresh, and brokers OAuth 2.1 authentication on the aggregator's behalf —
//! exposing a fixed meta-tool surface to a downstream client over stdio so
//! the client never talks to the aggregator's protocol directly.
//!
//! # Architecture
//!
//! - **Protocol layer** (`protocol`): JSON-RPC 2.0 + MCP message types.
//! - **Correlation layer** (`correlation`): request/response matching for
//!   transports that multiplex requests over a single stream.
//! - **Transport layer** (`transport`): the two outbound wire flavours
//!   (SSE, streamable HTTP) behind one `Transport` contract.
//! - **Integration layer** (`integration`): the session — one transport
//!   plus three catalogue caches (tools, resources, prompts).
//! - **Auth layer** (`auth`): token store, OAuth manager, and the
//!   status-poller/watcher pair that observe `auth://status`.
//! - **Server layer** (`server`): the stdio-facing meta-tool surface —
//!   the pending-auth bootstrap server and the full forwarding server.
//! - **Context layer** (`context`): the endpoint switcher.

pub mod auth;
pub mod config;
pub mod context;
pub mod correlation;
pub mod error;
pub mod integration;
pub mod protocol;
pub mod server;
pub mod transport;

pub use error::{AgentError, AgentResult};

pub use protocol::{
    Base64Data, ClientInfo, Content, JsonRpcMessage, JsonRpcMessageTrait,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, MimeType, ProtocolError, ProtocolResult,
    ProtocolVersion, RequestId, ServerInfo, Tool, Uri,
};

pub use correlation::{CorrelationConfig, CorrelationError, CorrelationManager, CorrelationResult};

pub use transport::{AnyTransport, Endpoint, HeaderMap, Transport, TransportError, TransportKind};

pub use integration::{
    CacheObserver, CatalogueCache, IntegrationError, IntegrationResult, Session, SessionConfig,
    SessionState,
};

pub use auth::{
    AuthError, AuthRequiredInfo, AuthResult, AuthState, AuthStatusPoller, AuthWatcher,
    InMemoryTokenStore, OAuthClientConfig, OAuthManager, OAuthToken, TokenStore,
};

pub use server::{MetaToolServer, PendingAuthServer, ReauthContext};

pub use context::ContextSwitcher;

/// Crate version, forwarded from `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the crate version as a string.
pub fn version() -> &'static str {
    VERSION
}

//! The stdio-facing side of the agent: the pending-auth bootstrap server
//! (Module G, §4.G) and the full meta-tool server (Module H, §4.H)
//! it hands off to once the first authentication completes.

pub mod advisory;
pub mod args;
pub mod error;
pub mod filter;
pub mod meta_tools;
pub mod pending_auth;

pub use advisory::wrap_with_advisory;
pub use args::{normalize_arguments, ArgsExt};
pub use error::{ServerError, ServerResult};
pub use filter::{filter_tools, list_core_tools, FilterOptions};
pub use meta_tools::{MetaToolServer, ReauthContext, META_TOOLS};
pub use pending_auth::PendingAuthServer;

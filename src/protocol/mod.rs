//! Protocol layer: JSON-RPC 2.0 framing plus the MCP message types the
//! core depends on (§6).
//!
//! - `message`: JSON-RPC 2.0 and MCP message types with trait-based serialization
//! - `types`: MCP protocol-specific types (tools, resources, prompts, capabilities)
//! - `constants`: wire method names and the protocol version string
//! - `errors`: the protocol-level error enum

pub mod constants;
pub mod errors;
pub mod message;
pub mod types;

pub use constants::*;
pub use errors::*;
pub use message::*;
pub use types::*;

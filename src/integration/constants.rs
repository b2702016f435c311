//! Re-exports the protocol-level constants for callers that only import
//! from `integration`.

pub use crate::protocol::constants::*;

//! Request/response correlation for bidirectional JSON-RPC communication.
//!
//! The SSE transport multiplexes many in-flight requests over one stream;
//! this is what matches a response (or a timeout) back to its caller.
//!
//! - `manager.rs` - Core CorrelationManager implementation
//! - `types.rs` - Type definitions for correlation system
//! - `error.rs` - Error types and result definitions
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use muster_agent::correlation::{CorrelationManager, CorrelationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut manager = CorrelationManager::new(CorrelationConfig::default());
//!     manager.start().await?;
//!     
//!     // Register a request
//!     let (id, receiver) = manager.register_request(
//!         serde_json::json!({"method": "ping"}),
//!         None
//!     ).await?;
//!     
//!     // Correlate response (would be done by transport layer)
//!     manager.correlate_response(id, serde_json::json!({"result": "pong"}))?;
//!     
//!     // Await the response
//!     let response = receiver.await??;
//!     println!("Response: {}", response);
//!     
//!     manager.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod manager;
pub mod types;

// Re-export main types for convenience
pub use error::{CorrelationError, CorrelationResult, RequestId};
pub use manager::{CorrelationConfig, CorrelationManager};
pub use types::{PendingRequest, RequestIdGenerator};

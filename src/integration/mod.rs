//! Integration layer: session management and catalogue caching over a
//! transport (§4.B, §4.C).

pub mod cache;
pub mod constants;
pub mod error;
pub mod session;

pub use cache::{CacheKind, CacheObserver, CatalogueCache, Diff};
pub use error::{IntegrationError, IntegrationResult};
pub use session::{Session, SessionConfig, SessionState};

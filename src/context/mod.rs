//! Context/endpoint switcher (§4.I).

pub mod error;
pub mod switcher;

pub use error::{ContextError, ContextResult};
pub use switcher::ContextSwitcher;

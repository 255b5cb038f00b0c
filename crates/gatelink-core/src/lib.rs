pub mod constants;
pub mod duration_ms;
pub mod error;
pub mod types;

pub use error::{Error, FramingError, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

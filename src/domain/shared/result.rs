//! Result type

use super::error::SrtpError;

/// Standard result type for secure transport operations
pub type Result<T> = std::result::Result<T, SrtpError>;

//! Shared kernel - error and result types used across all layers

pub mod error;
pub mod result;

pub use error::{ErrorKind, SrtpError};
pub use result::Result;

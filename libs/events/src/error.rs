//! Decoding errors for transport values.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    /// Not a dotted numeric version such as `0.23.0`.
    #[error("invalid version '{0}'")]
    InvalidVersion(String),
}

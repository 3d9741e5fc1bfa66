//! Error types for colour parsing and colour scale construction.

use thiserror::Error;

/// Result type alias using ColorError.
pub type ColorResult<T> = Result<T, ColorError>;

/// Errors raised while resolving configured colours.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ColorError {
    #[error("Invalid hex color: {0}")]
    InvalidHex(String),

    #[error("Unknown color name: {0}")]
    UnknownName(String),

    #[error("Color array must have 3 or 4 components, got {0}")]
    InvalidArray(usize),

    #[error("Unknown color scale: {0}")]
    UnknownScale(String),

    #[error("Invalid color scale: {0}")]
    InvalidScale(String),
}

impl ColorError {
    pub fn invalid_scale(msg: impl Into<String>) -> Self {
        Self::InvalidScale(msg.into())
    }
}

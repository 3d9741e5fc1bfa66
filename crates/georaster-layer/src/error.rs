//! Error types for the georaster layer.

use thiserror::Error;

/// Errors surfaced by layer construction and tile renders.
///
/// Samples outside the raster and unsupported band counts are not errors:
/// those cells are simply left unpainted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayerError {
    /// Malformed options or raster summary.
    #[error("layer initialization failed: {0}")]
    Initialization(String),

    /// The windowed raster read failed or returned the wrong shape.
    #[error("raster provider fetch failed: {0}")]
    ProviderFetch(String),

    /// A tile was requested from a layer whose initialization failed.
    #[error("layer is degraded: {0}")]
    Degraded(String),

    /// The render task panicked or was dropped before completing.
    #[error("tile render task failed: {0}")]
    TaskFailed(String),
}

impl LayerError {
    pub fn initialization(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }

    pub fn provider_fetch(msg: impl Into<String>) -> Self {
        Self::ProviderFetch(msg.into())
    }

    pub fn task_failed(msg: impl Into<String>) -> Self {
        Self::TaskFailed(msg.into())
    }
}

impl From<raster_common::ColorError> for LayerError {
    fn from(err: raster_common::ColorError) -> Self {
        Self::Initialization(err.to_string())
    }
}

impl From<serde_json::Error> for LayerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Initialization(format!("invalid JSON: {}", err))
    }
}

impl From<std::io::Error> for LayerError {
    fn from(err: std::io::Error) -> Self {
        Self::Initialization(err.to_string())
    }
}

/// Result type for layer operations.
pub type Result<T> = std::result::Result<T, LayerError>;

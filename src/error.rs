//! Error types for gesture-pilot

/// Result alias used across the library.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by capture, tracking, input and configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Camera error: {0}")]
    Camera(String),

    #[error("Landmark provider error: {0}")]
    Provider(String),

    #[error("Invalid landmark data: {0}")]
    Landmarks(String),

    #[error("Unknown key name: {0:?}")]
    InvalidKey(String),

    #[error("Input injection failed: {0}")]
    Input(String),

    #[error("Overlay error: {0}")]
    Overlay(String),

    #[error("{what} is not available in this build (enable the `{feature}` feature)")]
    FeatureDisabled {
        what: &'static str,
        feature: &'static str,
    },
}

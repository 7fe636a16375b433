//! Error types for the navigation environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    /// The user or platform refused access to location services
    #[error("Location permission denied")]
    PermissionDenied,

    /// Location services exist but cannot produce a fix
    #[error("Position unavailable: {0}")]
    PositionUnavailable(String),

    /// The routing or geocoding provider answered with an error
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// The request never reached the provider (network failure, closed channel)
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Provider payload could not be (de)serialized
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Coordinates outside the WGS84 range
    #[error("Invalid coordinate: lat={latitude}, lng={longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },
}

impl EnvError {
    /// Creates a provider error.
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::ProviderError(msg.into())
    }

    /// Creates a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportError(msg.into())
    }
}

impl From<serde_json::Error> for EnvError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

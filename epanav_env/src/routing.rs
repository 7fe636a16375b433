//! Routing and geocoding provider abstraction.
//!
//! The core never talks HTTP; it hands a [`DirectionsRequest`]-shaped query
//! to a [`RoutingProvider`] and receives the provider's JSON answer as a
//! [`DirectionsResponse`]. Polyline decoding is the engine's job.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EnvError;
use crate::types::GeoPoint;

/// Route optimisation preference passed to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutePreference {
    Fastest,
    /// The EPA default: slow vehicles gain little from fast roads
    #[default]
    Shortest,
    Recommended,
}

/// Turn-by-turn routing service.
///
/// # Implementations
///
/// - **Production**: hosted directions API client
/// - **Simulation**: `ScriptedRouter` with fault injection
#[async_trait]
pub trait RoutingProvider: Send + Sync + 'static {
    /// Computes a route between two points.
    ///
    /// # Returns
    /// * `Ok(response)` - Provider answered; `routes` may still be empty
    /// * `Err(EnvError::ProviderError)` - Provider rejected the request
    /// * `Err(EnvError::TransportError)` - Request never completed
    async fn compute_route(
        &self,
        from: GeoPoint,
        to: GeoPoint,
        preference: RoutePreference,
    ) -> Result<DirectionsResponse, EnvError>;
}

/// Address-to-coordinate lookup.
#[async_trait]
pub trait Geocoder: Send + Sync + 'static {
    /// Resolves a free-form address. `Ok(None)` for unknown addresses.
    async fn resolve(&self, address: &str) -> Result<Option<GeoPoint>, EnvError>;
}

/// Request body for the directions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionsRequest {
    /// `[lng, lat]` pairs, start first
    pub coordinates: Vec<[f64; 2]>,

    pub preference: RoutePreference,

    /// Turn instructions are never consumed
    pub instructions: bool,

    /// Always meters; the engine never converts units
    pub units: String,

    /// Extra per-route attributes to return
    pub attributes: Vec<String>,
}

impl DirectionsRequest {
    /// Builds the body for a point-to-point request.
    pub fn new(from: GeoPoint, to: GeoPoint, preference: RoutePreference) -> Self {
        Self {
            coordinates: vec![from.to_lng_lat(), to.to_lng_lat()],
            preference,
            instructions: false,
            units: "m".to_string(),
            attributes: vec![
                "avgspeed".to_string(),
                "detourfactor".to_string(),
                "percentage".to_string(),
            ],
        }
    }

    /// Serializes the body to JSON.
    pub fn to_json(&self) -> Result<String, EnvError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Provider answer: zero or more candidate routes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectionsResponse {
    #[serde(default)]
    pub routes: Vec<ProviderRoute>,
}

impl DirectionsResponse {
    /// Parses the provider JSON.
    pub fn from_json(json: &str) -> Result<Self, EnvError> {
        Ok(serde_json::from_str(json)?)
    }

    /// A response with no candidates.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The first (best) candidate, if any.
    pub fn primary(&self) -> Option<&ProviderRoute> {
        self.routes.first()
    }
}

/// A single candidate route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRoute {
    /// Encoded polyline (precision 5)
    pub geometry: String,

    #[serde(default)]
    pub summary: Option<RouteLegSummary>,

    #[serde(default)]
    pub segments: Vec<RouteLegSummary>,
}

/// Distance (meters) and duration (seconds) figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteLegSummary {
    #[serde(default)]
    pub distance: Option<f64>,

    #[serde(default)]
    pub duration: Option<f64>,
}

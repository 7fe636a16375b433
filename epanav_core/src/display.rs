//! Outputs consumed by the map display collaborator.
//!
//! The engine never renders. It pushes camera commands through
//! [`CameraController`] and exposes a [`NavigationFrame`] snapshot that the
//! UI draws from.

use epanav_env::GeoPoint;
use geo::Rect;
use serde::Serialize;
use std::sync::Arc;

use crate::position::PositionSample;
use crate::route::RouteModel;
use crate::session::SessionMode;

/// Camera operations implemented by the rendering collaborator.
pub trait CameraController: Send {
    /// Rotates the camera (and marker) to a compass heading in degrees.
    fn set_heading(&mut self, degrees: f64);

    /// Centers the camera on the current position, keeping the zoom.
    fn follow(&mut self, point: GeoPoint);

    /// Fits the camera to a freshly loaded route.
    fn fit_bounds(&mut self, bounds: Rect<f64>);
}

/// Camera that ignores every command (headless sessions).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCamera;

impl CameraController for NoopCamera {
    fn set_heading(&mut self, _degrees: f64) {}

    fn follow(&mut self, _point: GeoPoint) {}

    fn fit_bounds(&mut self, _bounds: Rect<f64>) {}
}

/// Everything the map needs to draw one frame.
#[derive(Debug, Clone, Serialize)]
pub struct NavigationFrame {
    /// Path to draw
    pub route: Arc<RouteModel>,

    /// Marker position
    pub position: Option<PositionSample>,

    /// Marker rotation
    pub heading_degrees: f64,

    pub mode: SessionMode,
}

//! Serialized access to the routing provider for reroutes.
//!
//! At most one request is in flight. A trigger that arrives while one is
//! pending is dropped, not queued; the next deviation cycle re-triggers if
//! the agent is still off route.

use epanav_env::{DirectionsResponse, EnvError, GeoPoint, NavContext, RoutePreference, RoutingProvider};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::RoutingConfig;
use crate::error::NavError;
use crate::route::RouteModel;

/// Identifies one dispatched reroute request.
pub type RerouteTicket = u64;

/// Outcome of [`RerouteCoordinator::request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RerouteDispatch {
    /// A request was sent to the provider
    Started(RerouteTicket),

    /// Another request was already in flight; this trigger was dropped
    Skipped,
}

type PendingRoute = Pin<Box<dyn Future<Output = Result<DirectionsResponse, EnvError>> + Send>>;

/// Single-flight reroute dispatcher.
pub struct RerouteCoordinator<R: RoutingProvider> {
    router: Arc<R>,
    preference: RoutePreference,
    vehicle_speed_kmh: f64,
    pending: Option<(RerouteTicket, PendingRoute)>,
    next_ticket: RerouteTicket,
}

impl<R: RoutingProvider> RerouteCoordinator<R> {
    pub fn new(router: Arc<R>, config: &RoutingConfig) -> Self {
        Self {
            router,
            preference: config.preference,
            vehicle_speed_kmh: config.vehicle_speed_kmh,
            pending: None,
            next_ticket: 1,
        }
    }

    pub fn router(&self) -> &Arc<R> {
        &self.router
    }

    /// True while a request awaits its response.
    pub fn in_flight(&self) -> bool {
        self.pending.is_some()
    }

    /// Dispatches a request unless one is already pending.
    ///
    /// The request makes progress only while [`response`](Self::response)
    /// is being awaited.
    pub fn request(&mut self, from: GeoPoint, to: GeoPoint) -> RerouteDispatch {
        if let Some((ticket, _)) = &self.pending {
            debug!("Reroute skipped: request #{} still in flight", ticket);
            return RerouteDispatch::Skipped;
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let router = Arc::clone(&self.router);
        let preference = self.preference;
        let future = async move { router.compute_route(from, to, preference).await };
        self.pending = Some((ticket, Box::pin(future)));

        info!("Reroute #{} requested: {} -> {}", ticket, from, to);
        RerouteDispatch::Started(ticket)
    }

    /// Waits for the in-flight request.
    ///
    /// Pends forever when nothing is in flight. Cancel-safe: dropping the
    /// returned future keeps the request pending.
    pub async fn response(&mut self) -> (RerouteTicket, Result<DirectionsResponse, EnvError>) {
        let Some((ticket, future)) = self.pending.as_mut() else {
            return std::future::pending().await;
        };
        let ticket = *ticket;
        let result = future.as_mut().await;
        self.pending = None;
        (ticket, result)
    }

    /// Turns a provider answer into the replacement route.
    pub fn complete(
        &self,
        result: Result<DirectionsResponse, EnvError>,
        created_at: Duration,
    ) -> Result<RouteModel, NavError> {
        let built = result
            .map_err(NavError::from_routing)
            .and_then(|response| RouteModel::from_response(&response, self.vehicle_speed_kmh, created_at));

        match &built {
            Ok(route) => debug!(
                "Reroute built: {} waypoints, {:.0}m",
                route.len(),
                route.distance_meters()
            ),
            Err(e) => warn!("Reroute failed: {}", e),
        }
        built
    }

    /// Requests a route and waits for it.
    ///
    /// If a request is already in flight, this trigger is dropped and the
    /// pending request's outcome is returned instead.
    pub async fn reroute<Ctx: NavContext>(
        &mut self,
        from: GeoPoint,
        to: GeoPoint,
        context: &Ctx,
    ) -> Result<RouteModel, NavError> {
        self.request(from, to);
        let (_, result) = self.response().await;
        self.complete(result, context.now())
    }

    /// Discards the in-flight request, if any.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some((ticket, _)) => {
                debug!("Reroute #{} cancelled", ticket);
                true
            }
            None => false,
        }
    }
}

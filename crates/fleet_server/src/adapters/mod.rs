//! Upstream adapters: the directions provider and the geocoder.
//!
//! Both are behind traits so the service and scheduler never know which
//! provider is configured, and tests can substitute canned responses.

mod geocode;
mod osrm;

pub use self::geocode::NominatimGeocoder;
pub use self::osrm::OsrmDirections;

use async_trait::async_trait;
use thiserror::Error;

use fleet_core::directions::Directions;
use fleet_core::geodesy::LatLon;
use fleet_core::trip::Address;

/// Errors from either upstream.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream rejected the request: {0}")]
    Api(String),
    #[error("no result for {0}")]
    NoResult(String),
}

/// Turns an ordered list of `[lon, lat]` waypoints into route geometry and
/// posted speeds.
#[async_trait]
pub trait DirectionsProvider: Send + Sync {
    async fn directions(&self, waypoints_lon_lat: &[[f64; 2]]) -> Result<Directions, AdapterError>;
}

/// Resolves a street address to a coordinate. Implementations are idempotent
/// for a given address.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &Address) -> Result<LatLon, AdapterError>;
}

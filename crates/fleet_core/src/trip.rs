//! Trip plans: ordered stops a vehicle drives through, and the criss-cross
//! pattern generator used to spawn fleets around a center point.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geodesy::{
    self, coordinate_at_bearing_and_range, normalize_deg, GeodesyError, LatLon,
};

/// `source` tag for addresses resolved by the geocoding adapter.
pub const SOURCE_GEOCODED: &str = "GeocodingService";
/// `source` tag for addresses entered directly as latitude/longitude.
pub const SOURCE_NUMERIC_ENTRY: &str = "NumericEntry";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TripPlanError {
    #[error("trip plan needs at least 2 stops, got {0}")]
    TooFewStops(usize),
    #[error(transparent)]
    InvalidCoordinate(#[from] GeodesyError),
    #[error("criss-cross vehicle count must be positive")]
    InvalidVehicleCount,
    #[error("criss-cross radius must be positive, got {0}")]
    InvalidRadius(f64),
}

/// A stop on a trip: either a street address awaiting geocoding or a
/// resolved coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Where the coordinate came from; empty until resolved.
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl Address {
    /// An address entered directly as a coordinate.
    pub fn from_lat_lon(lat: f64, lon: f64) -> Result<Self, GeodesyError> {
        geodesy::validate_lat_lon(lat, lon)?;
        Ok(Self {
            source: SOURCE_NUMERIC_ENTRY.to_string(),
            latitude: Some(lat),
            longitude: Some(lon),
            ..Self::default()
        })
    }

    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    pub fn coordinates(&self) -> Option<LatLon> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(LatLon { lat, lon }),
            _ => None,
        }
    }

    /// True when there is at least one street field a geocoder can resolve.
    pub fn is_geocodable(&self) -> bool {
        [&self.street, &self.city, &self.state, &self.zip_code]
            .iter()
            .any(|field| field.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }
}

/// An ordered sequence of at least two stops: origin, waypoints, destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TripPlan {
    pub addresses: Vec<Address>,
}

impl TripPlan {
    pub fn new(addresses: Vec<Address>) -> Self {
        Self { addresses }
    }

    /// Two-stop plan between resolved coordinates.
    pub fn between(start: LatLon, end: LatLon) -> Result<Self, GeodesyError> {
        Ok(Self::new(vec![
            Address::from_lat_lon(start.lat, start.lon)?,
            Address::from_lat_lon(end.lat, end.lon)?,
        ]))
    }

    /// Check stop count and the ranges of any resolved coordinates.
    pub fn validate(&self) -> Result<(), TripPlanError> {
        if self.addresses.len() < 2 {
            return Err(TripPlanError::TooFewStops(self.addresses.len()));
        }
        for address in &self.addresses {
            if let (Some(lat), Some(lon)) = (address.latitude, address.longitude) {
                geodesy::validate_lat_lon(lat, lon)?;
            }
        }
        Ok(())
    }

    /// Stop coordinates in travel order, `(lon, lat)` provider order.
    /// Fails if any stop is still unresolved.
    pub fn waypoints_lon_lat(&self) -> Option<Vec<[f64; 2]>> {
        self.addresses
            .iter()
            .map(|a| a.coordinates().map(|c| [c.lon, c.lat]))
            .collect()
    }
}

/// Spawn plan for a circular criss-cross pattern: `vehicle_count` trips whose
/// endpoints are antipodal points on a circle around `center`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrissCrossPlan {
    pub center_latitude: f64,
    pub center_longitude: f64,
    pub radius_km: f64,
    pub vehicle_count: usize,
}

impl CrissCrossPlan {
    /// Expand into one two-stop trip plan per vehicle.
    ///
    /// Start bearings are evenly spaced and offset by half an increment so
    /// no vehicle starts due north; each trip ends at the antipodal point
    /// across the center.
    pub fn expand(&self) -> Result<Vec<TripPlan>, TripPlanError> {
        if self.vehicle_count == 0 {
            return Err(TripPlanError::InvalidVehicleCount);
        }
        if self.radius_km <= 0.0 || !self.radius_km.is_finite() {
            return Err(TripPlanError::InvalidRadius(self.radius_km));
        }
        let center = LatLon::new(self.center_latitude, self.center_longitude)?;

        let increment = 360.0 / self.vehicle_count as f64;
        let mut plans = Vec::with_capacity(self.vehicle_count);
        for k in 0..self.vehicle_count {
            let bearing = increment / 2.0 + k as f64 * increment;
            let start = coordinate_at_bearing_and_range(center, self.radius_km, bearing)?;
            let end = coordinate_at_bearing_and_range(
                center,
                self.radius_km,
                normalize_deg(bearing + 180.0),
            )?;
            plans.push(TripPlan::between(start, end)?);
        }
        Ok(plans)
    }
}

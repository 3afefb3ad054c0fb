//! Geodesy: great-circle math, UTM zone handling, and unit conversions.
//!
//! This module provides:
//!
//! - **Great-circle operations**: destination point at bearing/range, initial
//!   bearing, haversine distance
//! - **UTM zone handling**: zone selection from longitude, zone-change
//!   detection, WGS84↔UTM transformers
//! - **Unit conversions**: mph/knots/m·s⁻¹ and meters/miles
//!
//! All angles are degrees unless a name says radians. Linear quantities are
//! meters except where a name says kilometers or miles.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Earth radius used by the spherical great-circle formulas, in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6378.14;

pub const METERS_PER_MILE: f64 = 1609.344;
pub const MPH_PER_METERS_PER_SECOND: f64 = 2.236_936;
pub const KNOTS_PER_METERS_PER_SECOND: f64 = 1.943_844;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeodesyError {
    #[error("latitude {0} outside [-90, 90]")]
    InvalidLatitude(f64),
    #[error("longitude {0} outside [-180, 180]")]
    InvalidLongitude(f64),
    #[error("UTM projection failed for zone {zone}")]
    Projection { zone: u8 },
}

/// A WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Result<Self, GeodesyError> {
        validate_lat_lon(lat, lon)?;
        Ok(Self { lat, lon })
    }
}

/// Reject non-finite or out-of-range coordinates.
pub fn validate_lat_lon(lat: f64, lon: f64) -> Result<(), GeodesyError> {
    if !lat.is_finite() || lat.abs() > 90.0 {
        return Err(GeodesyError::InvalidLatitude(lat));
    }
    if !lon.is_finite() || lon.abs() > 180.0 {
        return Err(GeodesyError::InvalidLongitude(lon));
    }
    Ok(())
}

/// Destination point at `km_range` along the great circle leaving `origin`
/// at `deg_bearing` (clockwise from north).
pub fn coordinate_at_bearing_and_range(
    origin: LatLon,
    km_range: f64,
    deg_bearing: f64,
) -> Result<LatLon, GeodesyError> {
    validate_lat_lon(origin.lat, origin.lon)?;

    let angular = km_range / EARTH_RADIUS_KM;
    let bearing = deg_bearing.to_radians();
    let lat1 = origin.lat.to_radians();
    let lon1 = origin.lon.to_radians();

    let lat2 =
        (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * angular.sin() * lat1.cos())
            .atan2(angular.cos() - lat1.sin() * lat2.sin());

    // Re-wrap longitude into [-180, 180].
    let lon2_deg = (lon2.to_degrees() + 540.0).rem_euclid(360.0) - 180.0;
    Ok(LatLon {
        lat: lat2.to_degrees(),
        lon: lon2_deg,
    })
}

/// Initial bearing of the shortest spherical path from `from` to `to`,
/// normalized to [0, 360).
pub fn initial_bearing_deg(from: LatLon, to: LatLon) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlon = (to.lon - from.lon).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    normalize_deg(y.atan2(x).to_degrees())
}

/// Haversine great-circle distance in kilometers.
pub fn haversine_km(a: LatLon, b: LatLon) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Normalize an angle in degrees into [0, 360).
pub fn normalize_deg(deg: f64) -> f64 {
    let n = deg.rem_euclid(360.0);
    if n == 360.0 {
        0.0
    } else {
        n
    }
}

/// UTM zone number (1..=60) covering the given longitude.
pub fn utm_zone_for(lon: f64) -> u8 {
    let zone = ((lon + 180.0) / 6.0).ceil();
    (zone.clamp(1.0, 60.0)) as u8
}

/// True iff the two longitudes fall in different UTM zones.
pub fn is_zone_change(lon_old: f64, lon_new: f64) -> bool {
    utm_zone_for(lon_old) != utm_zone_for(lon_new)
}

/// WGS84↔UTM transformer pair for a single zone.
///
/// The zone is chosen from a representative coordinate's longitude and the
/// hemisphere from its latitude; projections are only valid for coordinates
/// near that zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtmTransform {
    zone: u8,
    band: char,
}

impl UtmTransform {
    /// Build the transformer pair for the zone containing `coordinate`.
    pub fn for_coordinate(coordinate: LatLon) -> Result<Self, GeodesyError> {
        validate_lat_lon(coordinate.lat, coordinate.lon)?;
        let band = utm::lat_to_zone_letter(coordinate.lat)
            .unwrap_or(if coordinate.lat >= 0.0 { 'N' } else { 'M' });
        Ok(Self {
            zone: utm_zone_for(coordinate.lon),
            band,
        })
    }

    pub fn zone(&self) -> u8 {
        self.zone
    }

    /// Project WGS84 degrees to UTM meters: `(easting, northing)`.
    pub fn to_utm(&self, point: LatLon) -> (f64, f64) {
        let (northing, easting, _convergence) = utm::to_utm_wgs84(point.lat, point.lon, self.zone);
        (easting, northing)
    }

    /// Inverse projection from UTM meters back to WGS84 degrees.
    pub fn to_wgs84(&self, easting: f64, northing: f64) -> Result<LatLon, GeodesyError> {
        let (lat, lon) = utm::wsg84_utm_to_lat_lon(easting, northing, self.zone, self.band)
            .map_err(|_| GeodesyError::Projection { zone: self.zone })?;
        Ok(LatLon { lat, lon })
    }
}

pub fn meters_per_second_to_mph(mps: f64) -> f64 {
    mps * MPH_PER_METERS_PER_SECOND
}

pub fn mph_to_meters_per_second(mph: f64) -> f64 {
    mph / MPH_PER_METERS_PER_SECOND
}

pub fn meters_per_second_to_knots(mps: f64) -> f64 {
    mps * KNOTS_PER_METERS_PER_SECOND
}

pub fn meters_to_miles(meters: f64) -> f64 {
    meters / METERS_PER_MILE
}

pub fn miles_to_meters(miles: f64) -> f64 {
    miles * METERS_PER_MILE
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORT_WORTH: LatLon = LatLon {
        lat: 32.7507,
        lon: -97.3286,
    };

    #[test]
    fn destination_range_and_bearing_round_trip() {
        let dest = coordinate_at_bearing_and_range(FORT_WORTH, 50.0, 45.0).expect("valid origin");
        let back_km = haversine_km(FORT_WORTH, dest);
        assert!((back_km - 50.0).abs() < 0.05, "range came back as {back_km}");

        let bearing = initial_bearing_deg(FORT_WORTH, dest);
        assert!((bearing - 45.0).abs() < 0.5, "bearing came back as {bearing}");
    }

    #[test]
    fn destination_wraps_longitude_at_antimeridian() {
        let near_dateline = LatLon {
            lat: 10.0,
            lon: 179.9,
        };
        let dest = coordinate_at_bearing_and_range(near_dateline, 100.0, 90.0).expect("valid");
        assert!(dest.lon <= 180.0 && dest.lon >= -180.0);
        assert!(dest.lon < 0.0, "should have crossed into the west: {}", dest.lon);
    }

    #[test]
    fn zone_for_longitude_matches_six_degree_bands() {
        assert_eq!(utm_zone_for(-97.3286), 14);
        assert_eq!(utm_zone_for(0.1), 31);
        assert_eq!(utm_zone_for(-0.1), 30);
        assert_eq!(utm_zone_for(179.9), 60);
        assert_eq!(utm_zone_for(-180.0), 1);
    }

    #[test]
    fn zone_change_iff_zone_numbers_differ() {
        let samples = [-97.5, -96.1, -0.1, 0.1, 5.9, 6.1, 179.0];
        for &a in &samples {
            for &b in &samples {
                assert_eq!(
                    is_zone_change(a, b),
                    utm_zone_for(a) != utm_zone_for(b),
                    "a={a} b={b}"
                );
            }
        }
    }

    #[test]
    fn utm_projection_round_trips_within_tolerance() {
        let transform = UtmTransform::for_coordinate(FORT_WORTH).expect("valid coordinate");
        let (easting, northing) = transform.to_utm(FORT_WORTH);
        let back = transform.to_wgs84(easting, northing).expect("inverse");
        assert!((back.lat - FORT_WORTH.lat).abs() < 1e-6);
        assert!((back.lon - FORT_WORTH.lon).abs() < 1e-6);
    }

    #[test]
    fn utm_projection_round_trips_in_southern_hemisphere() {
        let sydney = LatLon {
            lat: -33.8688,
            lon: 151.2093,
        };
        let transform = UtmTransform::for_coordinate(sydney).expect("valid coordinate");
        let (easting, northing) = transform.to_utm(sydney);
        let back = transform.to_wgs84(easting, northing).expect("inverse");
        assert!((back.lat - sydney.lat).abs() < 1e-6);
        assert!((back.lon - sydney.lon).abs() < 1e-6);
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(matches!(
            validate_lat_lon(90.5, 0.0),
            Err(GeodesyError::InvalidLatitude(_))
        ));
        assert!(matches!(
            validate_lat_lon(0.0, -180.5),
            Err(GeodesyError::InvalidLongitude(_))
        ));
        assert!(matches!(
            validate_lat_lon(f64::NAN, 0.0),
            Err(GeodesyError::InvalidLatitude(_))
        ));
        assert!(validate_lat_lon(-90.0, 180.0).is_ok());
    }

    #[test]
    fn unit_conversions_invert() {
        assert!((mph_to_meters_per_second(meters_per_second_to_mph(13.4)) - 13.4).abs() < 1e-9);
        assert!((meters_to_miles(miles_to_meters(2.5)) - 2.5).abs() < 1e-9);
        assert!((meters_per_second_to_knots(10.0) - 19.43844).abs() < 1e-4);
    }

    #[test]
    fn bearing_normalization_stays_in_range() {
        assert_eq!(normalize_deg(360.0), 0.0);
        assert_eq!(normalize_deg(-90.0), 270.0);
        assert_eq!(normalize_deg(725.0), 5.0);
    }
}

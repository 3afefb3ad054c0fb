//! Wire model of a directions response.
//!
//! The shape follows the OSRM route service: one route with per-leg
//! `annotation` arrays (posted speed and distance per slice) and per-step
//! GeoJSON geometry in `[lon, lat]` order. The simulation core only depends
//! on the fields modeled here; everything else the provider returns is
//! dropped at decode time.

use serde::{Deserialize, Serialize};

use crate::geodesy::LatLon;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Directions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub waypoints: Vec<Waypoint>,
    #[serde(default)]
    pub routes: Vec<Route>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Waypoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `[longitude, latitude]`, provider order.
    pub location: [f64; 2],
}

impl Waypoint {
    pub fn lat_lon(&self) -> LatLon {
        LatLon {
            lat: self.location[1],
            lon: self.location[0],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    /// Total route distance in meters.
    pub distance: f64,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub legs: Vec<RouteLeg>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteLeg {
    #[serde(default)]
    pub distance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<LegAnnotation>,
    #[serde(default)]
    pub steps: Vec<RouteStep>,
}

/// Parallel arrays: `speed[i]` (m/s posted) applies over `distance[i]` meters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegAnnotation {
    #[serde(default)]
    pub speed: Vec<f64>,
    #[serde(default)]
    pub distance: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteStep {
    pub geometry: StepGeometry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepGeometry {
    /// Finely sampled polyline in `[lon, lat]` pairs.
    #[serde(default)]
    pub coordinates: Vec<[f64; 2]>,
}

impl Directions {
    /// The single route the simulation drives, if the provider returned one.
    pub fn primary_route(&self) -> Option<&Route> {
        self.routes.first()
    }

    /// Total primary-route distance in meters (0 when no route is present).
    pub fn route_distance(&self) -> f64 {
        self.primary_route().map(|r| r.distance).unwrap_or(0.0)
    }

    /// First requested stop.
    pub fn origin(&self) -> Option<LatLon> {
        self.waypoints.first().map(Waypoint::lat_lon)
    }

    /// Last requested stop.
    pub fn destination(&self) -> Option<LatLon> {
        self.waypoints.last().map(Waypoint::lat_lon)
    }

    /// Posted speed at the given meters-offset from the route start.
    ///
    /// Walks the legs' annotation slices accumulating distance and returns
    /// the speed of the first slice whose cumulative end reaches
    /// `meters_offset`. Offsets past the annotated length get the last
    /// slice's speed.
    pub fn posted_speed_at(&self, meters_offset: f64) -> Option<f64> {
        let route = self.primary_route()?;
        let mut cumulative = 0.0;
        let mut last_speed = None;
        for leg in &route.legs {
            let Some(annotation) = &leg.annotation else {
                continue;
            };
            for (speed, distance) in annotation.speed.iter().zip(&annotation.distance) {
                cumulative += distance;
                last_speed = Some(*speed);
                if cumulative >= meters_offset {
                    return Some(*speed);
                }
            }
        }
        last_speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_slice_directions() -> Directions {
        Directions {
            code: Some("Ok".into()),
            waypoints: vec![
                Waypoint {
                    name: None,
                    location: [-97.0, 32.0],
                },
                Waypoint {
                    name: None,
                    location: [-97.0, 32.01],
                },
            ],
            routes: vec![Route {
                distance: 300.0,
                duration: 30.0,
                legs: vec![RouteLeg {
                    distance: 300.0,
                    annotation: Some(LegAnnotation {
                        speed: vec![10.0, 20.0],
                        distance: vec![100.0, 200.0],
                    }),
                    steps: vec![],
                }],
            }],
        }
    }

    #[test]
    fn posted_speed_picks_first_slice_whose_end_covers_offset() {
        let directions = two_slice_directions();
        assert_eq!(directions.posted_speed_at(0.0), Some(10.0));
        assert_eq!(directions.posted_speed_at(99.9), Some(10.0));
        assert_eq!(directions.posted_speed_at(100.0), Some(10.0));
        assert_eq!(directions.posted_speed_at(100.1), Some(20.0));
        assert_eq!(directions.posted_speed_at(300.0), Some(20.0));
        // Past the annotated length: keep the last posted speed.
        assert_eq!(directions.posted_speed_at(301.0), Some(20.0));
    }

    #[test]
    fn posted_speed_is_none_without_annotations() {
        let mut directions = two_slice_directions();
        directions.routes[0].legs[0].annotation = None;
        assert_eq!(directions.posted_speed_at(50.0), None);
    }

    #[test]
    fn decodes_provider_json() {
        let raw = r#"{
            "code": "Ok",
            "waypoints": [{"location": [-97.3286, 32.7507]}, {"location": [-97.30, 32.76]}],
            "routes": [{
                "distance": 1000.0,
                "duration": 100.0,
                "legs": [{
                    "distance": 1000.0,
                    "annotation": {"speed": [10.0], "distance": [1000.0]},
                    "steps": [{"geometry": {"coordinates": [[-97.3286, 32.7507], [-97.30, 32.76]]}}]
                }]
            }]
        }"#;
        let directions: Directions = serde_json::from_str(raw).expect("decode");
        assert_eq!(directions.route_distance(), 1000.0);
        let origin = directions.origin().expect("origin");
        assert!((origin.lat - 32.7507).abs() < 1e-9);
        assert_eq!(directions.routes[0].legs[0].steps[0].geometry.coordinates.len(), 2);
    }
}

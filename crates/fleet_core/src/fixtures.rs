//! Synthetic directions for tests: straight routes with a constant posted
//! speed, sampled finely enough that the segment pipeline behaves like it
//! does on provider geometry.

use crate::directions::{
    Directions, LegAnnotation, Route, RouteLeg, RouteStep, StepGeometry, Waypoint,
};
use crate::geodesy::{coordinate_at_bearing_and_range, LatLon};

/// A single-leg route running `length_m` meters from `origin` along
/// `deg_bearing`, annotated with a constant posted speed.
///
/// `samples` evenly spaced geometry points are generated (minimum 2). A
/// non-positive `length_m` produces a degenerate route pinned at the origin
/// with no annotation slices.
pub fn straight_route(
    origin: LatLon,
    deg_bearing: f64,
    length_m: f64,
    posted_speed_ms: f64,
    samples: usize,
) -> Directions {
    let samples = samples.max(2);
    let mut coordinates = Vec::with_capacity(samples);
    for i in 0..samples {
        let along_m = if length_m > 0.0 {
            length_m * i as f64 / (samples - 1) as f64
        } else {
            0.0
        };
        let point = coordinate_at_bearing_and_range(origin, along_m / 1000.0, deg_bearing)
            .expect("fixture origin is valid");
        coordinates.push([point.lon, point.lat]);
    }

    let annotation = if length_m > 0.0 {
        let slices = samples - 1;
        Some(LegAnnotation {
            speed: vec![posted_speed_ms; slices],
            distance: vec![length_m / slices as f64; slices],
        })
    } else {
        None
    };

    let first = coordinates[0];
    let last = *coordinates.last().expect("at least two samples");
    Directions {
        code: Some("Ok".into()),
        waypoints: vec![
            Waypoint {
                name: None,
                location: first,
            },
            Waypoint {
                name: None,
                location: last,
            },
        ],
        routes: vec![Route {
            distance: length_m.max(0.0),
            duration: if posted_speed_ms > 0.0 {
                length_m / posted_speed_ms
            } else {
                0.0
            },
            legs: vec![RouteLeg {
                distance: length_m.max(0.0),
                annotation,
                steps: vec![RouteStep {
                    geometry: StepGeometry { coordinates },
                }],
            }],
        }],
    }
}

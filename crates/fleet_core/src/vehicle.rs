//! Vehicle kinematics: position, speed, and bearing tracking along a
//! preprocessed route.
//!
//! A vehicle's position is a meters-offset from the route start. Two
//! operations mutate it:
//!
//! - [`Vehicle::set_meters_offset`] resolves an arclength to WGS84 through
//!   the segment list, maintaining the validity/limited flags and the
//!   desired bearing and speed
//! - [`Vehicle::update`] advances the simulation by the wall-clock time
//!   since the last step, rate-limiting speed toward the posted speed and
//!   bearing toward the track
//!
//! Arrival is absorbing: once the vehicle sits at the route end with zero
//! speed, `update` reports no advance and mutates nothing.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::directions::Directions;
use crate::geodesy::{initial_bearing_deg, normalize_deg, GeodesyError, LatLon};
use crate::route::{segment_containing, LineSegmentData};

/// Peak speed change, m/s².
pub const DEFAULT_MSS_ACCELERATION: f64 = 2.0;
/// Peak turn rate, degrees/s.
pub const DEFAULT_DEGS_PER_SECOND_TURN: f64 = 120.0;

#[derive(Debug, Error)]
pub enum KinematicsError {
    #[error("directions carry no waypoints")]
    MissingWaypoints,
    #[error("no segment covers meters offset {0}")]
    NoSegmentForOffset(f64),
    #[error(transparent)]
    Geodesy(#[from] GeodesyError),
}

/// Persistent, serializable simulation state of one vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    /// Stable identity, assigned at creation.
    pub id: Uuid,
    /// Key of the stored trip plan this vehicle drives.
    pub trip_plan_ref: Uuid,
    pub meters_offset: f64,
    /// True iff the requested offset was clamped to a route endpoint.
    pub position_limited: bool,
    /// True iff the current position lies on the route.
    pub position_valid: bool,
    pub deg_latitude: f64,
    pub deg_longitude: f64,
    pub meters_per_second: f64,
    pub meters_per_second_desired: f64,
    pub mss_acceleration: f64,
    pub deg_bearing: f64,
    pub deg_bearing_desired: f64,
    pub degs_per_second_turn: f64,
    /// Stable display color, assigned once at creation.
    pub color_code: String,
    pub last_calculation_epoch_millis: i64,
    /// Instance that last computed this state.
    pub manager_host: String,
    /// Nanoseconds spent in the last kinematic step.
    pub last_ns_execution_time: u64,
}

impl Vehicle {
    /// Create a vehicle at the route origin, queued-at-rest.
    pub fn create(
        now_ms: i64,
        manager_host: &str,
        directions: &Directions,
        segments: &[LineSegmentData],
    ) -> Result<Self, KinematicsError> {
        let id = Uuid::new_v4();
        let mut vehicle = Self {
            id,
            trip_plan_ref: id,
            meters_offset: 0.0,
            position_limited: false,
            position_valid: false,
            deg_latitude: 0.0,
            deg_longitude: 0.0,
            meters_per_second: 0.0,
            meters_per_second_desired: 0.0,
            mss_acceleration: DEFAULT_MSS_ACCELERATION,
            deg_bearing: 0.0,
            deg_bearing_desired: 0.0,
            degs_per_second_turn: DEFAULT_DEGS_PER_SECOND_TURN,
            color_code: random_color_code(&mut rand::thread_rng()),
            last_calculation_epoch_millis: now_ms,
            manager_host: manager_host.to_string(),
            last_ns_execution_time: 0,
        };
        vehicle.set_meters_offset(0.0, directions, segments)?;
        Ok(vehicle)
    }

    /// Position the vehicle at arclength `meters` from the route start.
    ///
    /// Offsets outside `[0, route_distance]` clamp to the nearest endpoint
    /// and mark the position limited and off-route. Interior offsets resolve
    /// through the containing segment and steer the desired bearing along
    /// the track. Every call recomputes the posted (desired) speed at the
    /// final offset.
    pub fn set_meters_offset(
        &mut self,
        meters: f64,
        directions: &Directions,
        segments: &[LineSegmentData],
    ) -> Result<(), KinematicsError> {
        let route_distance = directions.route_distance();
        let origin = directions.origin().ok_or(KinematicsError::MissingWaypoints)?;
        let destination = directions
            .destination()
            .ok_or(KinematicsError::MissingWaypoints)?;

        if meters == 0.0 {
            self.apply_position(origin, 0.0, true, false);
        } else if meters == route_distance {
            self.apply_position(destination, route_distance, true, false);
        } else if meters < 0.0 {
            self.apply_position(origin, 0.0, false, true);
        } else if meters > route_distance {
            self.apply_position(destination, route_distance, false, true);
        } else {
            let segment = segment_containing(segments, meters)
                .ok_or(KinematicsError::NoSegmentForOffset(meters))?;
            let resolved = segment.point_at_offset(meters)?;
            let previous = LatLon {
                lat: self.deg_latitude,
                lon: self.deg_longitude,
            };
            if previous != resolved {
                self.deg_bearing_desired = initial_bearing_deg(previous, resolved);
            }
            self.apply_position(resolved, meters, true, false);
        }

        self.meters_per_second_desired =
            directions.posted_speed_at(self.meters_offset).unwrap_or(0.0);
        Ok(())
    }

    fn apply_position(&mut self, position: LatLon, meters: f64, valid: bool, limited: bool) {
        self.deg_latitude = position.lat;
        self.deg_longitude = position.lon;
        self.meters_offset = meters;
        self.position_valid = valid;
        self.position_limited = limited;
    }

    /// Advance the simulation to `now_ms`.
    ///
    /// Returns `true` iff state advanced; a `false` return leaves every
    /// field untouched. Elapsed time comes from the gap to
    /// `last_calculation_epoch_millis`.
    pub fn update(
        &mut self,
        now_ms: i64,
        directions: &Directions,
        segments: &[LineSegmentData],
    ) -> Result<bool, KinematicsError> {
        let elapsed_ms = now_ms - self.last_calculation_epoch_millis;
        if elapsed_ms <= 0 {
            return Ok(false);
        }
        let dt = elapsed_ms as f64 / 1000.0;
        let route_distance = directions.route_distance();

        // End of route: either the offset was clamped there, or the route is
        // degenerate and there is nowhere to go.
        let at_end = (self.position_limited && self.meters_offset > 0.0)
            || route_distance <= 0.0;
        if at_end {
            if self.meters_per_second == 0.0 {
                // Arrived steady state is absorbing.
                return Ok(false);
            }
            self.meters_per_second_desired = 0.0;
            self.meters_per_second =
                (self.meters_per_second - self.mss_acceleration * dt).max(0.0);
            if self.meters_per_second == 0.0 {
                tracing::info!(vehicle = %self.id, "arrived at destination");
            }
            self.last_calculation_epoch_millis = now_ms;
            return Ok(true);
        }

        // Speed chases the posted speed without overshoot.
        let speed_gap = self.meters_per_second_desired - self.meters_per_second;
        let max_speed_step = self.mss_acceleration * dt;
        self.meters_per_second += speed_gap.clamp(-max_speed_step, max_speed_step);

        // Position advances along the route; crossing the end parks the
        // vehicle on the destination while speed ramps out above.
        let target = self.meters_offset + self.meters_per_second * dt;
        if route_distance > 0.0 && target >= route_distance {
            self.set_meters_offset(route_distance, directions, segments)?;
            self.position_limited = true;
        } else {
            self.set_meters_offset(target, directions, segments)?;
        }

        // Bearing rotates along the shortest arc, rate-limited.
        self.deg_bearing = normalize_deg(self.deg_bearing);
        self.deg_bearing_desired = normalize_deg(self.deg_bearing_desired);
        let turn = shortest_angle_difference(self.deg_bearing, self.deg_bearing_desired);
        let max_turn = self.degs_per_second_turn * dt;
        self.deg_bearing = normalize_deg(self.deg_bearing + turn.clamp(-max_turn, max_turn));

        self.last_calculation_epoch_millis = now_ms;
        Ok(true)
    }

    /// True once the vehicle rests at the route end.
    pub fn has_arrived(&self) -> bool {
        self.position_limited && self.meters_offset > 0.0 && self.meters_per_second == 0.0
    }
}

/// Signed shortest rotation from `from` to `to`, in `(-180, 180]`.
pub fn shortest_angle_difference(from: f64, to: f64) -> f64 {
    let diff = (to - from).rem_euclid(360.0);
    if diff > 180.0 {
        diff - 360.0
    } else {
        diff
    }
}

/// Hex RGB from a random hue at saturation 0.9, brightness 1.0.
fn random_color_code(rng: &mut impl Rng) -> String {
    let (r, g, b) = hsb_to_rgb(rng.gen::<f64>(), 0.9, 1.0);
    format!("#{r:02X}{g:02X}{b:02X}")
}

fn hsb_to_rgb(hue: f64, saturation: f64, brightness: f64) -> (u8, u8, u8) {
    let h = (hue.rem_euclid(1.0)) * 6.0;
    let sector = h.floor() as u32 % 6;
    let f = h - h.floor();
    let p = brightness * (1.0 - saturation);
    let q = brightness * (1.0 - saturation * f);
    let t = brightness * (1.0 - saturation * (1.0 - f));
    let (r, g, b) = match sector {
        0 => (brightness, t, p),
        1 => (q, brightness, p),
        2 => (p, brightness, t),
        3 => (p, q, brightness),
        4 => (t, p, brightness),
        _ => (brightness, p, q),
    };
    (
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::straight_route;
    use crate::geodesy::haversine_km;
    use crate::route::build_segments;

    const ORIGIN: LatLon = LatLon {
        lat: 32.7507,
        lon: -97.3286,
    };

    fn vehicle_on_straight_route(
        length_m: f64,
        speed_ms: f64,
    ) -> (Vehicle, Directions, Vec<LineSegmentData>) {
        let directions = straight_route(ORIGIN, 0.0, length_m, speed_ms, 50);
        let segments = build_segments(&directions).expect("segments");
        let vehicle = Vehicle::create(0, "test-host", &directions, &segments).expect("vehicle");
        (vehicle, directions, segments)
    }

    #[test]
    fn creation_places_vehicle_at_origin_with_posted_speed_desired() {
        let (vehicle, _, _) = vehicle_on_straight_route(1000.0, 10.0);
        assert!((vehicle.deg_latitude - ORIGIN.lat).abs() < 1e-9);
        assert!((vehicle.deg_longitude - ORIGIN.lon).abs() < 1e-9);
        assert!(vehicle.position_valid);
        assert!(!vehicle.position_limited);
        assert_eq!(vehicle.meters_per_second, 0.0);
        assert_eq!(vehicle.meters_per_second_desired, 10.0);
        assert_eq!(vehicle.trip_plan_ref, vehicle.id);
        assert!(vehicle.color_code.starts_with('#') && vehicle.color_code.len() == 7);
    }

    #[test]
    fn offset_below_zero_clamps_to_origin_off_route() {
        let (mut vehicle, directions, segments) = vehicle_on_straight_route(1000.0, 10.0);
        vehicle
            .set_meters_offset(-10.0, &directions, &segments)
            .expect("offset");
        assert!(vehicle.position_limited);
        assert!(!vehicle.position_valid);
        assert_eq!(vehicle.meters_offset, 0.0);
        assert!((vehicle.deg_latitude - ORIGIN.lat).abs() < 1e-9);
        assert_eq!(vehicle.meters_per_second_desired, 10.0);
    }

    #[test]
    fn offset_past_end_clamps_to_destination_off_route() {
        let (mut vehicle, directions, segments) = vehicle_on_straight_route(1000.0, 10.0);
        let destination = directions.destination().unwrap();
        vehicle
            .set_meters_offset(1001.0, &directions, &segments)
            .expect("offset");
        assert!(vehicle.position_limited);
        assert!(!vehicle.position_valid);
        assert_eq!(vehicle.meters_offset, 1000.0);
        assert!(haversine_km(destination, LatLon {
            lat: vehicle.deg_latitude,
            lon: vehicle.deg_longitude,
        }) < 0.001);
    }

    #[test]
    fn interior_offset_sets_desired_bearing_along_track() {
        let (mut vehicle, directions, segments) = vehicle_on_straight_route(1000.0, 10.0);
        vehicle
            .set_meters_offset(500.0, &directions, &segments)
            .expect("offset");
        assert!(vehicle.position_valid);
        assert!(!vehicle.position_limited);
        // Route runs due north.
        let bearing = vehicle.deg_bearing_desired;
        assert!(bearing < 1.0 || bearing > 359.0, "bearing was {bearing}");
    }

    #[test]
    fn coincident_resolution_keeps_previous_desired_bearing() {
        let (mut vehicle, directions, segments) = vehicle_on_straight_route(1000.0, 10.0);
        vehicle
            .set_meters_offset(500.0, &directions, &segments)
            .expect("offset");
        vehicle.deg_bearing_desired = 77.0;
        vehicle
            .set_meters_offset(500.0, &directions, &segments)
            .expect("offset");
        assert_eq!(vehicle.deg_bearing_desired, 77.0);
    }

    #[test]
    fn speed_ramps_toward_desired_without_overshoot() {
        let (mut vehicle, directions, segments) = vehicle_on_straight_route(10_000.0, 10.0);
        vehicle.update(1000, &directions, &segments).expect("update");
        assert_eq!(vehicle.meters_per_second, 2.0);
        vehicle.update(2000, &directions, &segments).expect("update");
        assert_eq!(vehicle.meters_per_second, 4.0);
        // Long gap: clamp at desired, never past it.
        vehicle.update(60_000, &directions, &segments).expect("update");
        assert_eq!(vehicle.meters_per_second, 10.0);
    }

    #[test]
    fn bearing_rotates_shortest_way_at_bounded_rate() {
        // Posted speed 0 keeps the vehicle parked so the position step does
        // not re-steer the desired bearing.
        let (mut vehicle, directions, segments) = vehicle_on_straight_route(10_000.0, 0.0);
        vehicle.deg_bearing = 350.0;
        vehicle.deg_bearing_desired = 10.0;
        vehicle.degs_per_second_turn = 40.0;
        // 0.25 s → at most 10° of turn, crossing through north.
        vehicle.update(250, &directions, &segments).expect("update");
        assert!(
            (vehicle.deg_bearing - 0.0).abs() < 1e-6,
            "bearing was {}",
            vehicle.deg_bearing
        );
        vehicle.update(500, &directions, &segments).expect("update");
        assert!((vehicle.deg_bearing - 10.0).abs() < 1.0);
    }

    #[test]
    fn zero_elapsed_time_is_a_no_op() {
        let (mut vehicle, directions, segments) = vehicle_on_straight_route(1000.0, 10.0);
        let before = vehicle.clone();
        let advanced = vehicle.update(0, &directions, &segments).expect("update");
        assert!(!advanced);
        assert_eq!(vehicle.meters_offset, before.meters_offset);
        assert_eq!(vehicle.meters_per_second, before.meters_per_second);
        assert_eq!(
            vehicle.last_calculation_epoch_millis,
            before.last_calculation_epoch_millis
        );
    }

    #[test]
    fn drives_to_arrival_and_rests_at_destination() {
        let (mut vehicle, directions, segments) = vehicle_on_straight_route(1000.0, 10.0);
        let destination = directions.destination().unwrap();

        let mut now = 0;
        for _ in 0..(110_000 / 250) {
            now += 250;
            vehicle.update(now, &directions, &segments).expect("update");
        }

        assert_eq!(vehicle.meters_offset, 1000.0);
        assert!(vehicle.position_limited);
        assert!(vehicle.position_valid, "clamped onto the destination itself");
        assert_eq!(vehicle.meters_per_second, 0.0);
        assert!(haversine_km(destination, LatLon {
            lat: vehicle.deg_latitude,
            lon: vehicle.deg_longitude,
        }) < 0.001);
        assert!(vehicle.has_arrived());
    }

    #[test]
    fn arrival_is_absorbing() {
        let (mut vehicle, directions, segments) = vehicle_on_straight_route(1000.0, 10.0);
        let mut now = 0;
        while !vehicle.has_arrived() {
            now += 250;
            vehicle.update(now, &directions, &segments).expect("update");
            assert!(now < 200_000, "vehicle never arrived");
        }

        let settled = vehicle.clone();
        for _ in 0..5 {
            now += 250;
            let advanced = vehicle.update(now, &directions, &segments).expect("update");
            assert!(!advanced);
        }
        assert_eq!(vehicle.meters_offset, settled.meters_offset);
        assert_eq!(
            vehicle.last_calculation_epoch_millis,
            settled.last_calculation_epoch_millis
        );
    }

    #[test]
    fn zero_length_route_arrives_immediately() {
        let directions = straight_route(ORIGIN, 0.0, 0.0, 0.0, 2);
        let segments = build_segments(&directions).expect("segments");
        let mut vehicle = Vehicle::create(0, "test-host", &directions, &segments).expect("vehicle");
        let advanced = vehicle.update(250, &directions, &segments).expect("update");
        assert!(!advanced);
    }

    #[test]
    fn shortest_angle_difference_spans_the_seam() {
        assert_eq!(shortest_angle_difference(350.0, 10.0), 20.0);
        assert_eq!(shortest_angle_difference(10.0, 350.0), -20.0);
        assert_eq!(shortest_angle_difference(0.0, 180.0), 180.0);
        assert_eq!(shortest_angle_difference(90.0, 90.0), 0.0);
    }

    #[test]
    fn hsb_conversion_hits_primary_corners() {
        assert_eq!(hsb_to_rgb(0.0, 1.0, 1.0), (255, 0, 0));
        assert_eq!(hsb_to_rgb(1.0 / 3.0, 1.0, 1.0), (0, 255, 0));
        assert_eq!(hsb_to_rgb(2.0 / 3.0, 1.0, 1.0), (0, 0, 255));
    }

    #[test]
    fn vehicle_serializes_with_camel_case_keys() {
        let (vehicle, _, _) = vehicle_on_straight_route(1000.0, 10.0);
        let json = serde_json::to_value(&vehicle).expect("serialize");
        assert!(json.get("metersOffset").is_some());
        assert!(json.get("degBearingDesired").is_some());
        assert!(json.get("lastCalculationEpochMillis").is_some());
        let back: Vehicle = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back.id, vehicle.id);
    }
}

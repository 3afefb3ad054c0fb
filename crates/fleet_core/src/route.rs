//! Route preprocessing: converts directions geometry into an ordered list of
//! UTM-projected, length-indexed line segments.
//!
//! A route is split into one segment per UTM-zone-contiguous run of its
//! polyline. Each segment carries the cumulative meters-offset of its start,
//! a [`LengthIndexedLine`] in local UTM meters, and the transformer pair for
//! its zone, so any arclength along the route resolves to WGS84 through
//! exactly one segment.

use thiserror::Error;

use crate::directions::Directions;
use crate::geodesy::{is_zone_change, GeodesyError, LatLon, UtmTransform};

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("directions contain no route")]
    NoRoute,
    #[error("directions contain no waypoints")]
    NoWaypoints,
    #[error("route geometry has no coordinates")]
    EmptyGeometry,
    #[error(transparent)]
    Geodesy(#[from] GeodesyError),
}

/// A 2-D polyline parameterized by arclength.
///
/// Construction precomputes a cumulative-length table; [`point_at`] is then
/// an O(log K) binary search plus linear interpolation.
///
/// [`point_at`]: LengthIndexedLine::point_at
#[derive(Debug, Clone)]
pub struct LengthIndexedLine {
    points: Vec<(f64, f64)>,
    cumulative: Vec<f64>,
}

impl LengthIndexedLine {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        let mut cumulative = Vec::with_capacity(points.len());
        let mut total = 0.0;
        for (i, point) in points.iter().enumerate() {
            if i > 0 {
                let (px, py) = points[i - 1];
                total += ((point.0 - px).powi(2) + (point.1 - py).powi(2)).sqrt();
            }
            cumulative.push(total);
        }
        Self { points, cumulative }
    }

    /// Total arclength in the line's local units.
    pub fn length(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point at arclength `s`, clamped to `[0, length]`.
    pub fn point_at(&self, s: f64) -> Option<(f64, f64)> {
        if self.points.is_empty() {
            return None;
        }
        let s = s.clamp(0.0, self.length());
        let idx = self.cumulative.partition_point(|&c| c < s);
        if idx == 0 {
            return Some(self.points[0]);
        }
        let span = self.cumulative[idx] - self.cumulative[idx - 1];
        if span <= 0.0 {
            return Some(self.points[idx]);
        }
        let t = (s - self.cumulative[idx - 1]) / span;
        let (ax, ay) = self.points[idx - 1];
        let (bx, by) = self.points[idx];
        Some((ax + (bx - ax) * t, ay + (by - ay) * t))
    }
}

/// One UTM-zone-contiguous run of the route.
#[derive(Debug, Clone)]
pub struct LineSegmentData {
    /// Cumulative meters from the route start to this segment's start.
    pub meters_offset: f64,
    /// Polyline in local UTM meters, parameterized by arclength.
    pub line: LengthIndexedLine,
    /// Transformer pair valid for this segment's zone.
    pub transform: UtmTransform,
}

impl LineSegmentData {
    pub fn length(&self) -> f64 {
        self.line.length()
    }

    pub fn end_offset(&self) -> f64 {
        self.meters_offset + self.length()
    }

    /// Resolve a route-wide meters-offset to WGS84 through this segment.
    pub fn point_at_offset(&self, meters: f64) -> Result<LatLon, GeodesyError> {
        let local = meters - self.meters_offset;
        // The segment list construction guarantees at least one point here.
        let (easting, northing) = self
            .line
            .point_at(local)
            .expect("segment line has at least one point");
        self.transform.to_wgs84(easting, northing)
    }
}

/// Segment whose half-open offset range `[meters_offset, end_offset)`
/// contains `meters`: the one with the largest start offset not past
/// `meters`. A `meters` equal to the route's total length resolves to the
/// last segment.
pub fn segment_containing(segments: &[LineSegmentData], meters: f64) -> Option<&LineSegmentData> {
    let idx = segments.partition_point(|s| s.meters_offset <= meters);
    if idx == 0 {
        return None;
    }
    segments.get(idx - 1)
}

/// Build the ordered segment list for a directions response.
///
/// Walks every step's geometry in travel order, projecting into the current
/// UTM zone. The first coordinate of each step is checked against the running
/// reference longitude; a zone change finalizes the current segment and
/// restarts with transformers for the new zone.
pub fn build_segments(directions: &Directions) -> Result<Vec<LineSegmentData>, RouteError> {
    let route = directions.primary_route().ok_or(RouteError::NoRoute)?;
    let origin = directions.origin().ok_or(RouteError::NoWaypoints)?;

    let mut reference_lon = origin.lon;
    let mut transform = UtmTransform::for_coordinate(origin)?;
    let mut segments: Vec<LineSegmentData> = Vec::new();
    let mut meters_offset = 0.0;
    let mut points: Vec<(f64, f64)> = Vec::new();

    for leg in &route.legs {
        for step in &leg.steps {
            let coords = &step.geometry.coordinates;
            if let Some(first) = coords.first() {
                if is_zone_change(reference_lon, first[0]) {
                    if !points.is_empty() {
                        let line = LengthIndexedLine::new(std::mem::take(&mut points));
                        let length = line.length();
                        segments.push(LineSegmentData {
                            meters_offset,
                            line,
                            transform,
                        });
                        meters_offset += length;
                    }
                    let entry = LatLon::new(first[1], first[0])?;
                    transform = UtmTransform::for_coordinate(entry)?;
                    reference_lon = first[0];
                }
            }
            for coord in coords {
                let point = LatLon::new(coord[1], coord[0])?;
                let projected = transform.to_utm(point);
                // Step boundaries repeat coordinates; skip exact duplicates.
                if points.last() != Some(&projected) {
                    points.push(projected);
                }
            }
        }
    }

    if !points.is_empty() {
        let line = LengthIndexedLine::new(points);
        segments.push(LineSegmentData {
            meters_offset,
            line,
            transform,
        });
    }

    if segments.is_empty() {
        return Err(RouteError::EmptyGeometry);
    }
    Ok(segments)
}

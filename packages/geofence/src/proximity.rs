//! Closest approach of a trajectory to spatial features.

use geo::{Closest, ClosestPoint, CoordsIter, Geometry, Line, LineString, MultiLineString};
use serde::Serialize;
use trackwatch_geometry::{
    boundary_of, fraction_along, from_coord, haversine_meters, interpolate_time,
    segment_intersections, to_coord, to_point,
};
use trackwatch_geometry_models::{Fix, GeoPoint};
use trackwatch_trajectory::{Trajectory, TrajectorySegment};
use uuid::Uuid;

/// A named feature a subject should keep away from: a point, line or area.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialFeature {
    id: String,
    name: String,
    geometry: Geometry<f64>,
}

impl SpatialFeature {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, geometry: Geometry<f64>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            geometry,
        }
    }

    /// Stable feature id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Point, line or area geometry.
    #[must_use]
    pub const fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }
}

/// The closest a segment came to a feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProximityEvent {
    pub subject_id: Uuid,
    pub feature_id: String,
    pub feature_name: String,
    /// Zero when the segment touches or enters the feature.
    pub proximity_distance_meters: f64,
    /// Point on the segment nearest the feature, with an interpolated time.
    pub proximal_fix: Fix,
    pub subject_speed_kmhr: f64,
    pub subject_heading: f64,
}

/// Computes one [`ProximityEvent`] per segment and feature.
///
/// Distances are not thresholded here; callers keep the events they care
/// about.
#[must_use]
pub fn calc_proximity(
    features: &[SpatialFeature],
    trajectories: &[Trajectory],
) -> Vec<ProximityEvent> {
    let mut events = Vec::new();

    for trajectory in trajectories {
        for segment in trajectory.segments() {
            for feature in features {
                events.extend(proximity_event(trajectory.subject_id(), segment, feature));
            }
        }
    }

    events
}

fn proximity_event(
    subject_id: Uuid,
    segment: &TrajectorySegment,
    feature: &SpatialFeature,
) -> Option<ProximityEvent> {
    let (point, distance) = closest_approach(segment, feature.geometry())?;
    let fraction = fraction_along(segment.start_point(), point, segment.length_meters());
    let time = interpolate_time(segment.start().time, segment.end().time, fraction);

    Some(ProximityEvent {
        subject_id,
        feature_id: feature.id().to_string(),
        feature_name: feature.name().to_string(),
        proximity_distance_meters: distance,
        proximal_fix: Fix::new(point, time),
        subject_speed_kmhr: segment.speed_kmhr(),
        subject_heading: segment.heading(),
    })
}

/// Nearest point on the segment to `geometry` and its distance in meters.
///
/// Candidates are boundary crossings (distance zero), segment endpoints
/// against the geometry, and geometry vertices against the segment. The
/// first candidate with the smallest distance wins.
fn closest_approach(
    segment: &TrajectorySegment,
    geometry: &Geometry<f64>,
) -> Option<(GeoPoint, f64)> {
    let start = segment.start_point();
    let end = segment.end_point();

    let crossings = segment_intersections(start, end, &feature_lines(geometry));
    if let Some(first) = crossings.first() {
        return Some((*first, 0.0));
    }

    let mut best: Option<(GeoPoint, f64)> = None;
    let mut consider = |candidate: (GeoPoint, f64)| {
        if best.is_none_or(|(_, distance)| candidate.1 < distance) {
            best = Some(candidate);
        }
    };

    for endpoint in [start, end] {
        match geometry.closest_point(&to_point(endpoint)) {
            Closest::Intersection(_) => consider((endpoint, 0.0)),
            Closest::SinglePoint(p) => {
                consider((endpoint, haversine_meters(endpoint, from_coord(p.0))));
            }
            Closest::Indeterminate => {}
        }
    }

    let line = Line::new(to_coord(start), to_coord(end));
    for vertex in geometry.coords_iter() {
        let vertex = from_coord(vertex);
        match line.closest_point(&to_point(vertex)) {
            Closest::Intersection(p) | Closest::SinglePoint(p) => {
                let on_segment = from_coord(p.0);
                consider((on_segment, haversine_meters(on_segment, vertex)));
            }
            Closest::Indeterminate => {}
        }
    }

    best
}

/// Every line making up a geometry's outline. Points have none.
fn feature_lines(geometry: &Geometry<f64>) -> MultiLineString<f64> {
    let mut lines: Vec<LineString<f64>> = Vec::new();
    collect_lines(geometry, &mut lines);
    MultiLineString::new(lines)
}

fn collect_lines(geometry: &Geometry<f64>, lines: &mut Vec<LineString<f64>>) {
    match geometry {
        Geometry::Point(_) | Geometry::MultiPoint(_) => {}
        Geometry::Line(line) => lines.push(LineString::new(vec![line.start, line.end])),
        Geometry::LineString(line) => lines.push(line.clone()),
        Geometry::MultiLineString(multi) => lines.extend(multi.0.iter().cloned()),
        Geometry::Polygon(polygon) => lines.extend(boundary_of(polygon).0),
        Geometry::MultiPolygon(multi) => {
            for polygon in multi {
                lines.extend(boundary_of(polygon).0);
            }
        }
        Geometry::Rect(rect) => lines.extend(boundary_of(&rect.to_polygon()).0),
        Geometry::Triangle(triangle) => lines.extend(boundary_of(&triangle.to_polygon()).0),
        Geometry::GeometryCollection(collection) => {
            for inner in collection {
                collect_lines(inner, lines);
            }
        }
    }
}

//! Segment/boundary intersection.

use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo::{Line, MultiLineString};
use trackwatch_geometry_models::GeoPoint;

use crate::distance::haversine_meters;
use crate::{from_coord, to_coord};

/// Two intersection points closer than this (in degrees) are the same point.
/// Roughly 0.1 mm at the equator.
const SAME_POINT_TOLERANCE_DEG: f64 = 1e-9;

/// Intersects the segment `start -> end` with every edge of `boundary`.
///
/// Returns every distinct intersection point, ordered by distance from
/// `start`. A single intersection is a one-element `Vec`, no intersection is
/// an empty one.
///
/// * A segment passing exactly through a boundary vertex touches two
///   adjacent edges at the same coordinate; that point is reported once.
/// * A segment running along an edge contributes both ends of the shared
///   stretch.
/// * A zero-length segment never intersects anything.
#[must_use]
pub fn segment_intersections(
    start: GeoPoint,
    end: GeoPoint,
    boundary: &MultiLineString<f64>,
) -> Vec<GeoPoint> {
    if start == end {
        return Vec::new();
    }

    let segment = Line::new(to_coord(start), to_coord(end));
    let mut points: Vec<GeoPoint> = Vec::new();

    for ring in &boundary.0 {
        for edge in ring.lines() {
            match line_intersection(segment, edge) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    push_distinct(&mut points, from_coord(intersection));
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    log::trace!("Segment {start} -> {end} runs along a boundary edge");
                    push_distinct(&mut points, from_coord(intersection.start));
                    push_distinct(&mut points, from_coord(intersection.end));
                }
                None => {}
            }
        }
    }

    let dist = |p: &GeoPoint| haversine_meters(start, *p);
    points.sort_by(|a, b| dist(a).total_cmp(&dist(b)));
    points
}

fn push_distinct(points: &mut Vec<GeoPoint>, candidate: GeoPoint) {
    let duplicate = points.iter().any(|p| {
        (p.longitude - candidate.longitude).abs() < SAME_POINT_TOLERANCE_DEG
            && (p.latitude - candidate.latitude).abs() < SAME_POINT_TOLERANCE_DEG
    });
    if !duplicate {
        points.push(candidate);
    }
}

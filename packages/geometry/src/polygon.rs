//! Polygon construction, containment and boundary distance.

use geo::{Closest, ClosestPoint, Contains, LineString, MultiLineString, Polygon};
use trackwatch_geometry_models::GeoPoint;

use crate::distance::haversine_meters;
use crate::{GeometryError, from_coord, to_coord, to_point};

/// Builds a polygon from a ring of points.
///
/// The ring may be given open or closed; it is closed automatically.
///
/// # Errors
///
/// * [`GeometryError::InvalidCoordinate`] if any point is out of range.
/// * [`GeometryError::InvalidPolygon`] if the ring has fewer than three
///   distinct points.
pub fn polygon_from_points(points: &[GeoPoint]) -> Result<Polygon<f64>, GeometryError> {
    validate(points)?;

    let distinct = distinct_count(points);
    if distinct < 3 {
        return Err(GeometryError::InvalidPolygon { points: distinct });
    }

    let ring: LineString<f64> = points.iter().copied().map(to_coord).collect();
    Ok(Polygon::new(ring, vec![]))
}

/// Builds an open polyline (a "virtual fence" line).
///
/// # Errors
///
/// * [`GeometryError::InvalidCoordinate`] if any point is out of range.
/// * [`GeometryError::InvalidPolyline`] if there are fewer than two
///   distinct points.
pub fn polyline_from_points(points: &[GeoPoint]) -> Result<LineString<f64>, GeometryError> {
    validate(points)?;

    let distinct = distinct_count(points);
    if distinct < 2 {
        return Err(GeometryError::InvalidPolyline { points: distinct });
    }

    Ok(points.iter().copied().map(to_coord).collect())
}

/// The boundary of a polygon: its exterior ring followed by any holes.
#[must_use]
pub fn boundary_of(polygon: &Polygon<f64>) -> MultiLineString<f64> {
    let mut rings = Vec::with_capacity(1 + polygon.interiors().len());
    rings.push(polygon.exterior().clone());
    rings.extend(polygon.interiors().iter().cloned());
    MultiLineString::new(rings)
}

/// Whether `point` lies strictly inside `polygon`.
///
/// Points on the boundary are not contained.
#[must_use]
pub fn contains(polygon: &Polygon<f64>, point: GeoPoint) -> bool {
    polygon.contains(&to_point(point))
}

/// Distance in meters from a point outside `polygon` to the polygon.
///
/// The point is projected onto the nearest boundary ring and the
/// great-circle distance between the projection and the original point is
/// returned. Points inside or on the polygon are `0.0` away.
#[must_use]
pub fn distance_to_exterior_point(polygon: &Polygon<f64>, point: GeoPoint) -> f64 {
    if contains(polygon, point) {
        return 0.0;
    }

    boundary_of(polygon)
        .0
        .iter()
        .filter_map(|ring| closest_point(ring, point))
        .map(|projected| haversine_meters(projected, point))
        .min_by(f64::total_cmp)
        .unwrap_or(0.0)
}

/// The point on `geometry` closest to `point`, in degree space.
///
/// Returns `None` for empty geometry.
pub fn closest_point<G>(geometry: &G, point: GeoPoint) -> Option<GeoPoint>
where
    G: ClosestPoint<f64>,
{
    match geometry.closest_point(&to_point(point)) {
        Closest::Intersection(p) | Closest::SinglePoint(p) => Some(from_coord(p.0)),
        Closest::Indeterminate => None,
    }
}

fn validate(points: &[GeoPoint]) -> Result<(), GeometryError> {
    match points.iter().find(|p| !p.is_valid()) {
        Some(point) => Err(GeometryError::InvalidCoordinate { point: *point }),
        None => Ok(()),
    }
}

fn distinct_count(points: &[GeoPoint]) -> usize {
    let mut seen: Vec<GeoPoint> = Vec::with_capacity(points.len());
    for p in points {
        if !seen.contains(p) {
            seen.push(*p);
        }
    }
    seen.len()
}

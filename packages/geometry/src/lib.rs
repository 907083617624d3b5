#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Geometry primitives for trajectory analysis.
//!
//! Distances are great-circle (haversine) distances on a spherical Earth of
//! radius 6371 km. Intersection and containment tests are planar in degree
//! space via the `geo` crate, which matches how fences and regions are drawn
//! on a web map.

pub mod distance;
pub mod interpolate;
pub mod intersection;
pub mod polygon;

use geo::Coord;
use trackwatch_geometry_models::GeoPoint;

pub use distance::{EARTH_RADIUS_KM, bearing_degrees, haversine_km, haversine_meters};
pub use interpolate::{fraction_along, interpolate_fix, interpolate_time};
pub use intersection::segment_intersections;
pub use polygon::{
    boundary_of, closest_point, contains, distance_to_exterior_point, polygon_from_points,
    polyline_from_points,
};

/// Errors raised when building geometry from untrusted coordinates.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    /// A coordinate is non-finite or outside WGS84 bounds.
    #[error("Invalid coordinate {point}")]
    InvalidCoordinate {
        /// The offending point.
        point: GeoPoint,
    },

    /// A polygon ring has fewer than three distinct points.
    #[error("Polygon needs at least 3 distinct points, got {points}")]
    InvalidPolygon {
        /// Number of distinct points supplied.
        points: usize,
    },

    /// A polyline has fewer than two distinct points.
    #[error("Polyline needs at least 2 distinct points, got {points}")]
    InvalidPolyline {
        /// Number of distinct points supplied.
        points: usize,
    },
}

/// Converts a [`GeoPoint`] to a `geo` coordinate (`x` = longitude).
#[must_use]
pub const fn to_coord(point: GeoPoint) -> Coord<f64> {
    Coord {
        x: point.longitude,
        y: point.latitude,
    }
}

/// Converts a `geo` coordinate back to a [`GeoPoint`].
#[must_use]
pub const fn from_coord(coord: Coord<f64>) -> GeoPoint {
    GeoPoint::new(coord.x, coord.y)
}

/// Converts a [`GeoPoint`] to a `geo` point.
#[must_use]
pub fn to_point(point: GeoPoint) -> geo::Point<f64> {
    geo::Point::from(to_coord(point))
}

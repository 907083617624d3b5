#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Geofence crossing analysis.
//!
//! A [`Geofence`] is a polygon or polyline whose boundary a subject should
//! not cross. [`calc_crossings`] tests every trajectory segment against
//! every fence and applies the even-odd rule: a segment crosses a fence
//! only when it intersects the fence boundary an odd number of times.
//! Crossings report which containment [`Region`]s the subject was in at the
//! segment's start and end.
//!
//! [`calc_proximity`] measures how close each segment comes to a set of
//! [`SpatialFeature`]s.

pub mod containment;
pub mod crossing;
pub mod features;
pub mod proximity;

use geo::{Geometry, LineString, MultiLineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use trackwatch_geometry::{GeometryError, boundary_of, polygon_from_points, polyline_from_points};
use trackwatch_geometry_models::GeoPoint;

pub use containment::RegionIndex;
pub use crossing::{GeofenceAnalysisResult, GeofenceCrossing, calc_crossings};
pub use features::{load_geofences_geojson, load_regions_geojson, load_spatial_features_geojson};
pub use proximity::{ProximityEvent, SpatialFeature, calc_proximity};

/// Errors that can occur while building fences and regions.
#[derive(Debug, thiserror::Error)]
pub enum GeofenceError {
    /// Invalid fence or region geometry.
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// `GeoJSON` could not be parsed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] Box<geojson::Error>),

    /// `GeoJSON` input was not a feature or feature collection.
    #[error("Expected a GeoJSON Feature or FeatureCollection")]
    NotAFeatureCollection,

    /// A feature has no usable id.
    #[error("Feature at index {index} has no id")]
    MissingId {
        /// Position of the feature in the collection.
        index: usize,
    },

    /// A feature has no geometry.
    #[error("Feature {id} has no geometry")]
    MissingGeometry {
        /// Feature id.
        id: String,
    },

    /// A feature's geometry type cannot be used.
    #[error("Feature {id} has unsupported geometry type {kind}")]
    UnsupportedGeometry {
        /// Feature id.
        id: String,
        /// `GeoJSON` geometry type name.
        kind: String,
    },
}

/// Alert level attached to a fence.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum WarnLevel {
    /// Amber alert.
    Warning,
    /// Red alert.
    Critical,
}

/// A named fence with a stable id.
#[derive(Debug, Clone, PartialEq)]
pub struct Geofence {
    id: String,
    name: String,
    boundary: MultiLineString<f64>,
    warn_level: WarnLevel,
}

impl Geofence {
    /// A fence along the boundary of a polygon ring.
    ///
    /// # Errors
    ///
    /// Returns [`GeofenceError::Geometry`] if the ring is not a valid polygon.
    pub fn polygon(
        id: impl Into<String>,
        name: impl Into<String>,
        ring: &[GeoPoint],
        warn_level: WarnLevel,
    ) -> Result<Self, GeofenceError> {
        let boundary = boundary_of(&polygon_from_points(ring)?);
        Ok(Self::from_boundary(id, name, boundary, warn_level))
    }

    /// A fence along an open line.
    ///
    /// # Errors
    ///
    /// Returns [`GeofenceError::Geometry`] if the line has fewer than two
    /// distinct points.
    pub fn polyline(
        id: impl Into<String>,
        name: impl Into<String>,
        points: &[GeoPoint],
        warn_level: WarnLevel,
    ) -> Result<Self, GeofenceError> {
        let boundary = MultiLineString::new(vec![polyline_from_points(points)?]);
        Ok(Self::from_boundary(id, name, boundary, warn_level))
    }

    /// Fences along a feature's outline.
    ///
    /// A polygon fences its boundary, holes included. Each part of a
    /// `MultiPolygon` or `MultiLineString` becomes its own fence sharing the
    /// feature's id and name. A `LineString` is an open fence.
    ///
    /// # Errors
    ///
    /// * [`GeofenceError::Geometry`] for degenerate rings or lines.
    /// * [`GeofenceError::UnsupportedGeometry`] for points and collections.
    pub fn from_feature(
        feature: &SpatialFeature,
        warn_level: WarnLevel,
    ) -> Result<Vec<Self>, GeofenceError> {
        let fence =
            |boundary| Self::from_boundary(feature.id(), feature.name(), boundary, warn_level);

        match feature.geometry() {
            Geometry::Polygon(polygon) => {
                validate_polygon(polygon)?;
                Ok(vec![fence(boundary_of(polygon))])
            }
            Geometry::MultiPolygon(parts) => parts
                .iter()
                .map(|polygon| {
                    validate_polygon(polygon)?;
                    Ok::<_, GeofenceError>(fence(boundary_of(polygon)))
                })
                .collect(),
            Geometry::LineString(line) => {
                let line = polyline_from_points(&ring_points(line))?;
                Ok(vec![fence(MultiLineString::new(vec![line]))])
            }
            Geometry::MultiLineString(lines) => lines
                .iter()
                .map(|line| {
                    let line = polyline_from_points(&ring_points(line))?;
                    Ok::<_, GeofenceError>(fence(MultiLineString::new(vec![line])))
                })
                .collect(),
            other => Err(GeofenceError::UnsupportedGeometry {
                id: feature.id().to_string(),
                kind: features::geometry_kind(other).to_string(),
            }),
        }
    }

    /// A fence from pre-validated boundary lines.
    #[must_use]
    pub fn from_boundary(
        id: impl Into<String>,
        name: impl Into<String>,
        boundary: MultiLineString<f64>,
        warn_level: WarnLevel,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            boundary,
            warn_level,
        }
    }

    /// Stable fence id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lines a crossing is tested against.
    #[must_use]
    pub const fn boundary(&self) -> &MultiLineString<f64> {
        &self.boundary
    }

    /// Alert level of a crossing of this fence.
    #[must_use]
    pub const fn warn_level(&self) -> WarnLevel {
        self.warn_level
    }
}

/// A named containment area, used only to describe where a subject is.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    id: String,
    name: String,
    area: MultiPolygon<f64>,
}

impl Region {
    /// A region covering a single polygon ring.
    ///
    /// # Errors
    ///
    /// Returns [`GeofenceError::Geometry`] if the ring is not a valid polygon.
    pub fn polygon(
        id: impl Into<String>,
        name: impl Into<String>,
        ring: &[GeoPoint],
    ) -> Result<Self, GeofenceError> {
        let polygon = polygon_from_points(ring)?;
        Ok(Self::from_area(id, name, MultiPolygon::new(vec![polygon])))
    }

    /// A region covering a `Polygon` or `MultiPolygon` feature.
    ///
    /// # Errors
    ///
    /// * [`GeofenceError::Geometry`] for degenerate rings.
    /// * [`GeofenceError::UnsupportedGeometry`] for any other geometry type.
    pub fn from_feature(feature: &SpatialFeature) -> Result<Self, GeofenceError> {
        let area = match feature.geometry() {
            Geometry::Polygon(polygon) => MultiPolygon::new(vec![polygon.clone()]),
            Geometry::MultiPolygon(parts) => parts.clone(),
            other => {
                return Err(GeofenceError::UnsupportedGeometry {
                    id: feature.id().to_string(),
                    kind: features::geometry_kind(other).to_string(),
                });
            }
        };
        area.0.iter().try_for_each(validate_polygon)?;

        Ok(Self::from_area(feature.id(), feature.name(), area))
    }

    /// A region from pre-validated polygons.
    #[must_use]
    pub fn from_area(
        id: impl Into<String>,
        name: impl Into<String>,
        area: MultiPolygon<f64>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            area,
        }
    }

    /// Stable region id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Polygons making up the region.
    #[must_use]
    pub const fn area(&self) -> &MultiPolygon<f64> {
        &self.area
    }
}

/// Inputs to a crossing analysis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeofenceAnalysisParams {
    /// Fences tested for crossings.
    pub geofences: Vec<Geofence>,
    /// Regions used to describe containment before and after a crossing.
    pub regions: Vec<Region>,
}

impl GeofenceAnalysisParams {
    /// Bundles fences and regions.
    #[must_use]
    pub const fn new(geofences: Vec<Geofence>, regions: Vec<Region>) -> Self {
        Self { geofences, regions }
    }
}

/// Validates a polygon read from external data: every ring needs at least
/// three distinct in-range points.
fn validate_polygon(polygon: &Polygon<f64>) -> Result<(), GeometryError> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .try_for_each(|ring| polygon_from_points(&ring_points(ring)).map(|_| ()))
}

fn ring_points(line: &LineString<f64>) -> Vec<GeoPoint> {
    line.0.iter().map(|c| GeoPoint::new(c.x, c.y)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warn_level_string_forms() {
        assert_eq!(WarnLevel::Critical.to_string(), "CRITICAL");
        assert_eq!("WARNING".parse::<WarnLevel>().unwrap(), WarnLevel::Warning);
        assert!(WarnLevel::Warning < WarnLevel::Critical);
    }

    #[test]
    fn polygon_fence_rejects_degenerate_rings() {
        let err = Geofence::polygon(
            "f1",
            "Fence",
            &[GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 1.0)],
            WarnLevel::Warning,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            GeofenceError::Geometry(GeometryError::InvalidPolygon { points: 2 })
        ));
    }

    #[test]
    fn polygon_fence_boundary_is_closed_ring() {
        let fence = Geofence::polygon(
            "f1",
            "Fence",
            &[
                GeoPoint::new(0.0, 0.0),
                GeoPoint::new(0.0, 1.0),
                GeoPoint::new(1.0, 1.0),
            ],
            WarnLevel::Critical,
        )
        .unwrap();
        assert_eq!(fence.boundary().0.len(), 1);
        assert!(fence.boundary().0[0].is_closed());
        assert_eq!(fence.warn_level(), WarnLevel::Critical);
    }
}

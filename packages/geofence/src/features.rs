//! `GeoJSON` loading for fences and regions.

use geo::Geometry;
use geojson::{Feature, GeoJson, JsonValue, feature::Id};

use crate::{Geofence, GeofenceError, Region, SpatialFeature, WarnLevel};

/// Parses fences from a `GeoJSON` Feature or `FeatureCollection`.
///
/// See [`Geofence::from_feature`] for how each geometry type maps to fences.
///
/// # Errors
///
/// * [`GeofenceError::GeoJson`] if the text is not valid `GeoJSON`.
/// * [`GeofenceError::NotAFeatureCollection`] for a bare geometry.
/// * [`GeofenceError::MissingId`], [`GeofenceError::MissingGeometry`] or
///   [`GeofenceError::UnsupportedGeometry`] for an unusable feature.
/// * [`GeofenceError::Geometry`] for degenerate rings or lines.
pub fn load_geofences_geojson(
    geojson: &str,
    warn_level: WarnLevel,
) -> Result<Vec<Geofence>, GeofenceError> {
    let mut fences = Vec::new();
    for feature in load_spatial_features_geojson(geojson)? {
        fences.extend(Geofence::from_feature(&feature, warn_level)?);
    }

    log::info!("Loaded {} geofence(s) from GeoJSON", fences.len());
    Ok(fences)
}

/// Parses containment regions from a `GeoJSON` Feature or
/// `FeatureCollection`. Only `Polygon` and `MultiPolygon` features are
/// accepted.
///
/// # Errors
///
/// Same as [`load_geofences_geojson`].
pub fn load_regions_geojson(geojson: &str) -> Result<Vec<Region>, GeofenceError> {
    let regions = load_spatial_features_geojson(geojson)?
        .iter()
        .map(Region::from_feature)
        .collect::<Result<Vec<_>, _>>()?;

    log::info!("Loaded {} region(s) from GeoJSON", regions.len());
    Ok(regions)
}

/// Parses spatial features of any geometry type from a `GeoJSON` Feature or
/// `FeatureCollection`.
///
/// # Errors
///
/// Same as [`load_geofences_geojson`], except that no geometry type is
/// rejected.
pub fn load_spatial_features_geojson(
    geojson: &str,
) -> Result<Vec<SpatialFeature>, GeofenceError> {
    let features = parse_features(geojson)?
        .into_iter()
        .enumerate()
        .map(|(index, feature)| to_spatial_feature(index, feature))
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!("Parsed {} spatial feature(s) from GeoJSON", features.len());
    Ok(features)
}

fn parse_features(geojson: &str) -> Result<Vec<Feature>, GeofenceError> {
    let parsed: GeoJson = geojson.parse().map_err(Box::new)?;
    match parsed {
        GeoJson::FeatureCollection(collection) => Ok(collection.features),
        GeoJson::Feature(feature) => Ok(vec![feature]),
        GeoJson::Geometry(_) => Err(GeofenceError::NotAFeatureCollection),
    }
}

/// Resolves a feature's id, display name and geometry.
///
/// The id comes from the feature's own `id`, falling back to
/// `properties.id`. The name falls back to the id.
fn to_spatial_feature(index: usize, feature: Feature) -> Result<SpatialFeature, GeofenceError> {
    let property = |key: &str| {
        feature
            .properties
            .as_ref()
            .and_then(|props| props.get(key))
            .and_then(json_to_string)
    };

    let id = match &feature.id {
        Some(Id::String(id)) => Some(id.clone()),
        Some(Id::Number(id)) => Some(id.to_string()),
        None => property("id"),
    }
    .ok_or(GeofenceError::MissingId { index })?;

    let name = property("name").unwrap_or_else(|| id.clone());

    let Some(geometry) = feature.geometry else {
        return Err(GeofenceError::MissingGeometry { id });
    };
    let geometry: Geometry<f64> = geometry.try_into().map_err(Box::new)?;

    Ok(SpatialFeature::new(id, name, geometry))
}

fn json_to_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) const fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

#[cfg(test)]
mod tests {
    use trackwatch_geometry::GeometryError;

    use super::*;

    const FENCES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "id": "reserve",
                "properties": { "name": "North Reserve" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0, 0], [0, 1], [1, 1], [1, 0], [0, 0]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "id": 42 },
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[5, -1], [5, 1]]
                }
            },
            {
                "type": "Feature",
                "id": "islands",
                "properties": { "name": "Islands" },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[10, 10], [10, 11], [11, 11], [10, 10]]],
                        [[[20, 20], [20, 21], [21, 21], [20, 20]]]
                    ]
                }
            }
        ]
    }"#;

    #[test]
    fn loads_polygon_line_and_multipolygon_fences() {
        let fences = load_geofences_geojson(FENCES, WarnLevel::Warning).unwrap();
        let ids: Vec<_> = fences.iter().map(Geofence::id).collect();
        assert_eq!(ids, vec!["reserve", "42", "islands", "islands"]);
        assert_eq!(fences[0].name(), "North Reserve");
        assert_eq!(fences[1].name(), "42", "name falls back to id");
        assert!(fences[0].boundary().0[0].is_closed());
        assert!(!fences[1].boundary().0[0].is_closed());
        assert!(fences.iter().all(|f| f.warn_level() == WarnLevel::Warning));
    }

    #[test]
    fn regions_reject_lines() {
        let err = load_regions_geojson(FENCES).unwrap_err();
        let GeofenceError::UnsupportedGeometry { id, kind } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(id, "42");
        assert_eq!(kind, "LineString");
    }

    #[test]
    fn loads_single_feature_region() {
        let regions = load_regions_geojson(
            r#"{
                "type": "Feature",
                "id": 7,
                "properties": { "name": "Camp" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0, 0], [0, 2], [2, 2], [2, 0], [0, 0]]]
                }
            }"#,
        )
        .unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].id(), "7");
        assert_eq!(regions[0].name(), "Camp");
    }

    #[test]
    fn spatial_features_accept_any_geometry() {
        let features = load_spatial_features_geojson(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "id": "well", "properties": {"name": "Well"},
                 "geometry": {"type": "Point", "coordinates": [36.8, -1.3]}},
                {"type": "Feature", "id": "road", "geometry":
                    {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].name(), "Well");
        assert!(matches!(features[0].geometry(), Geometry::Point(_)));
        assert_eq!(features[1].name(), "road");
    }

    #[test]
    fn bare_geometry_is_rejected() {
        let json = r#"{"type": "Point", "coordinates": [0, 0]}"#;
        let err = load_regions_geojson(json).unwrap_err();
        assert!(matches!(err, GeofenceError::NotAFeatureCollection));
    }

    #[test]
    fn feature_without_id_is_rejected() {
        let err = load_geofences_geojson(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {}, "geometry":
                    {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}}
            ]}"#,
            WarnLevel::Critical,
        )
        .unwrap_err();
        assert!(matches!(err, GeofenceError::MissingId { index: 0 }));
    }

    #[test]
    fn degenerate_ring_is_rejected() {
        let err = load_geofences_geojson(
            r#"{"type": "Feature", "id": "bad", "geometry":
                {"type": "Polygon", "coordinates": [[[0, 0], [1, 1], [0, 0], [1, 1]]]}}"#,
            WarnLevel::Critical,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            GeofenceError::Geometry(GeometryError::InvalidPolygon { points: 2 })
        ));
    }

    #[test]
    fn malformed_json_is_a_geojson_error() {
        assert!(matches!(
            load_regions_geojson("{not json"),
            Err(GeofenceError::GeoJson(_))
        ));
    }
}

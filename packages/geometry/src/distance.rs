//! Great-circle distance and bearing.

use trackwatch_geometry_models::GeoPoint;

/// Mean Earth radius used for every distance in the workspace.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometers between two points given in decimal
/// degrees, using the haversine formula.
///
/// Symmetric in its arguments and exactly `0.0` for identical points.
#[must_use]
pub fn haversine_km(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (lon1, lat1, lon2, lat2) = (
        lon1.to_radians(),
        lat1.to_radians(),
        lon2.to_radians(),
        lat2.to_radians(),
    );

    let dlon = lon2 - lon1;
    let dlat = lat2 - lat1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    // Rounding can push `a` a hair above 1 for antipodal points.
    let c = 2.0 * a.clamp(0.0, 1.0).sqrt().asin();
    c * EARTH_RADIUS_KM
}

/// Great-circle distance in meters between two points.
#[must_use]
pub fn haversine_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    haversine_km(a.longitude, a.latitude, b.longitude, b.latitude) * 1000.0
}

/// Initial bearing from `from` to `to` in degrees clockwise from north,
/// normalized to `[0, 360)`.
///
/// Returns `0.0` for identical points.
#[must_use]
pub fn bearing_degrees(from: GeoPoint, to: GeoPoint) -> f64 {
    if from == to {
        return 0.0;
    }

    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlon = (to.longitude - from.longitude).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1
        .cos()
        .mul_add(lat2.sin(), -(lat1.sin() * lat2.cos() * dlon.cos()));

    let degrees = y.atan2(x).to_degrees();
    let normalized = (degrees + 360.0) % 360.0;
    if normalized >= 360.0 { 0.0 } else { normalized }
}

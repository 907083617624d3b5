//! Linear interpolation along a segment between two fixes.

use chrono::{DateTime, TimeDelta, Utc};
use trackwatch_geometry_models::{Fix, GeoPoint};

use crate::distance::haversine_meters;

/// Fraction of a segment's length covered between `start` and `point`.
///
/// Returns `0.0` when `segment_length_meters` is zero (or not positive),
/// so a zero-length segment never divides by zero.
#[must_use]
pub fn fraction_along(start: GeoPoint, point: GeoPoint, segment_length_meters: f64) -> f64 {
    if segment_length_meters <= 0.0 || !segment_length_meters.is_finite() {
        return 0.0;
    }
    haversine_meters(start, point) / segment_length_meters
}

/// Time at `fraction` of the way from `start` to `end`.
///
/// `fraction` is clamped to `[0, 1]`. Precision is one microsecond.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn interpolate_time(start: DateTime<Utc>, end: DateTime<Utc>, fraction: f64) -> DateTime<Utc> {
    let fraction = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };

    let elapsed = end - start;
    let elapsed_us = elapsed
        .num_microseconds()
        .unwrap_or_else(|| elapsed.num_milliseconds().saturating_mul(1000));

    let offset_us = (elapsed_us as f64 * fraction).round() as i64;
    start + TimeDelta::microseconds(offset_us)
}

/// Fix at `fraction` of the way from `start` to `end`, interpolating both
/// the coordinates (linearly in degree space) and the time.
#[must_use]
pub fn interpolate_fix(start: &Fix, end: &Fix, fraction: f64) -> Fix {
    let f = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };

    let dlon = end.point.longitude - start.point.longitude;
    let dlat = end.point.latitude - start.point.latitude;
    let point = GeoPoint::new(
        dlon.mul_add(f, start.point.longitude),
        dlat.mul_add(f, start.point.latitude),
    );

    Fix::new(point, interpolate_time(start.time, end.time, f))
}

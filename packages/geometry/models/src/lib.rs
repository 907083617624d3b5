#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geographic value types shared across the trackwatch workspace.
//!
//! A [`GeoPoint`] is a WGS84 longitude/latitude pair and a [`Fix`] is a
//! [`GeoPoint`] observed at a specific instant. Both are plain immutable
//! values; all geometry math lives in `trackwatch_geometry`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A WGS84 position in decimal degrees.
///
/// Equality is exact coordinate equality.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Longitude in degrees, `-180..=180`.
    pub longitude: f64,
    /// Latitude in degrees, `-90..=90`.
    pub latitude: f64,
}

impl GeoPoint {
    /// Creates a point from a longitude/latitude pair.
    #[must_use]
    pub const fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Whether both coordinates are finite and within WGS84 bounds.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.longitude.is_finite()
            && self.latitude.is_finite()
            && (-180.0..=180.0).contains(&self.longitude)
            && (-90.0..=90.0).contains(&self.latitude)
    }

    /// Whether this is the `(0, 0)` "null island" position that GPS
    /// collars report when they have no lock.
    #[must_use]
    pub fn is_null_island(self) -> bool {
        self.longitude == 0.0 && self.latitude == 0.0
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.longitude, self.latitude)
    }
}

/// A single timestamped position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    /// Where the subject was.
    pub point: GeoPoint,
    /// When the subject was there.
    pub time: DateTime<Utc>,
}

impl Fix {
    /// Creates a fix.
    #[must_use]
    pub const fn new(point: GeoPoint, time: DateTime<Utc>) -> Self {
        Self { point, time }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity_bounds() {
        assert!(GeoPoint::new(36.8, -1.3).is_valid());
        assert!(GeoPoint::new(180.0, 90.0).is_valid());
        assert!(!GeoPoint::new(181.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -90.5).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn null_island_detection() {
        assert!(GeoPoint::new(0.0, 0.0).is_null_island());
        assert!(!GeoPoint::new(0.0, 0.1).is_null_island());
    }

    #[test]
    fn serializes_with_full_field_names() {
        let json = serde_json::to_value(GeoPoint::new(1.5, -2.5)).unwrap();
        assert_eq!(json["longitude"], 1.5);
        assert_eq!(json["latitude"], -2.5);
    }
}

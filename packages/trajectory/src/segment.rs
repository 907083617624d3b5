//! A single leg between two consecutive fixes.

use trackwatch_geometry::{bearing_degrees, haversine_meters};
use trackwatch_geometry_models::{Fix, GeoPoint};

/// One leg of a trajectory with its derived measurements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectorySegment {
    start: Fix,
    end: Fix,
    length_meters: f64,
    speed_kmhr: f64,
    heading: f64,
}

impl TrajectorySegment {
    /// Builds a segment and computes its length, speed and heading.
    ///
    /// A segment with zero (or negative) elapsed time has speed `0`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(start: Fix, end: Fix) -> Self {
        let length_meters = haversine_meters(start.point, end.point);
        let elapsed_ms = (end.time - start.time).num_milliseconds();

        let speed_kmhr = if elapsed_ms > 0 {
            let hours = elapsed_ms as f64 / 3_600_000.0;
            (length_meters / 1000.0) / hours
        } else {
            0.0
        };

        Self {
            start,
            end,
            length_meters,
            speed_kmhr,
            heading: bearing_degrees(start.point, end.point),
        }
    }

    /// Earlier fix of the leg.
    #[must_use]
    pub const fn start(&self) -> Fix {
        self.start
    }

    /// Later fix of the leg.
    #[must_use]
    pub const fn end(&self) -> Fix {
        self.end
    }

    /// Position of the earlier fix.
    #[must_use]
    pub const fn start_point(&self) -> GeoPoint {
        self.start.point
    }

    /// Position of the later fix.
    #[must_use]
    pub const fn end_point(&self) -> GeoPoint {
        self.end.point
    }

    /// Great-circle length in meters.
    #[must_use]
    pub const fn length_meters(&self) -> f64 {
        self.length_meters
    }

    /// Average speed over the segment in km/h.
    #[must_use]
    pub const fn speed_kmhr(&self) -> f64 {
        self.speed_kmhr
    }

    /// Initial bearing from start to end, degrees in `[0, 360)`.
    #[must_use]
    pub const fn heading(&self) -> f64 {
        self.heading
    }

    /// Seconds between start and end.
    #[must_use]
    pub fn elapsed_seconds(&self) -> i64 {
        (self.end.time - self.start.time).num_seconds()
    }
}

//! Fix filtering applied before a trajectory is segmented.
//!
//! GPS collars regularly report junk: `(0, 0)` when they have no lock,
//! out-of-range coordinates, or positions implying an impossible jump. The
//! filter walks fixes in time order and drops any fix that is junk or
//! whose segment from the last kept fix breaks a configured limit.

use serde::{Deserialize, Serialize};
use trackwatch_geometry_models::Fix;

use crate::segment::TrajectorySegment;

/// Per-subject-type limits for trajectory segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryFilter {
    /// Drop fixes reached from the previous kept fix faster than this.
    pub max_speed_kmhr: Option<f64>,
    /// Drop fixes closer than this to the previous kept fix.
    pub min_length_meters: Option<f64>,
    /// Drop fixes with non-finite, out-of-range or `(0, 0)` coordinates.
    pub drop_invalid_coordinates: bool,
}

impl Default for TrajectoryFilter {
    fn default() -> Self {
        Self {
            max_speed_kmhr: None,
            min_length_meters: None,
            drop_invalid_coordinates: true,
        }
    }
}

impl TrajectoryFilter {
    /// A filter limited to the given speed, e.g. `7.0` for elephants.
    #[must_use]
    pub fn with_max_speed(max_speed_kmhr: f64) -> Self {
        Self {
            max_speed_kmhr: Some(max_speed_kmhr),
            ..Self::default()
        }
    }

    /// Returns the kept fixes in ascending time order.
    #[must_use]
    pub fn apply(&self, fixes: impl IntoIterator<Item = Fix>) -> Vec<Fix> {
        let mut fixes: Vec<Fix> = fixes.into_iter().collect();
        fixes.sort_by_key(|f| f.time);

        let mut kept: Vec<Fix> = Vec::with_capacity(fixes.len());
        for fix in fixes {
            let junk = !fix.point.is_valid() || fix.point.is_null_island();
            if self.drop_invalid_coordinates && junk {
                log::debug!("Dropping junk fix {} at {}", fix.point, fix.time);
                continue;
            }

            if let Some(last) = kept.last() {
                let segment = TrajectorySegment::new(*last, fix);

                if let Some(max) = self.max_speed_kmhr
                    && segment.speed_kmhr() > max
                {
                    log::debug!(
                        "Dropping fix at {}: {:.1} km/h exceeds {max} km/h",
                        fix.time,
                        segment.speed_kmhr()
                    );
                    continue;
                }

                if let Some(min) = self.min_length_meters
                    && segment.length_meters() < min
                {
                    continue;
                }
            }

            kept.push(fix);
        }

        kept
    }
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Trajectory construction.
//!
//! A [`Trajectory`] is the time-ordered chain of [`TrajectorySegment`]s
//! between consecutive fixes of one subject. Segment length, speed and
//! heading are computed once when the segment is built. Building a
//! trajectory never fails: empty input gives an empty trajectory and
//! duplicate timestamps give zero-duration segments with speed `0`.

pub mod filter;
pub mod segment;

use trackwatch_geometry_models::Fix;
use uuid::Uuid;

pub use filter::TrajectoryFilter;
pub use segment::TrajectorySegment;

/// Errors from trajectory-wide statistics.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrajectoryError {
    /// The statistic needs at least one segment.
    #[error("Insufficient data: {message}")]
    InsufficientData {
        /// What was being computed.
        message: String,
    },

    /// Percentile outside `0..=100`.
    #[error("Invalid percentile {value}: expected 0-100")]
    InvalidPercentile {
        /// The percentile requested.
        value: f64,
    },
}

/// The ordered path of one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    subject_id: Uuid,
    fixes: Vec<Fix>,
    segments: Vec<TrajectorySegment>,
}

impl Trajectory {
    /// Builds a trajectory from fixes in any order.
    ///
    /// Fixes are sorted ascending by time (stable, so fixes sharing a
    /// timestamp keep their input order) and every consecutive pair becomes
    /// a segment.
    #[must_use]
    pub fn build(subject_id: Uuid, fixes: impl IntoIterator<Item = Fix>) -> Self {
        let mut fixes: Vec<Fix> = fixes.into_iter().collect();
        fixes.sort_by_key(|f| f.time);

        let segments: Vec<TrajectorySegment> = fixes
            .windows(2)
            .map(|pair| TrajectorySegment::new(pair[0], pair[1]))
            .collect();

        log::trace!(
            "Built trajectory for subject {subject_id}: {} fixes, {} segments",
            fixes.len(),
            segments.len()
        );

        Self {
            subject_id,
            fixes,
            segments,
        }
    }

    /// Applies `filter` to the fixes, then builds the trajectory.
    #[must_use]
    pub fn build_filtered(
        subject_id: Uuid,
        fixes: impl IntoIterator<Item = Fix>,
        filter: &TrajectoryFilter,
    ) -> Self {
        Self::build(subject_id, filter.apply(fixes))
    }

    /// The subject this trajectory belongs to.
    #[must_use]
    pub const fn subject_id(&self) -> Uuid {
        self.subject_id
    }

    /// Fixes in ascending time order.
    #[must_use]
    pub fn fixes(&self) -> &[Fix] {
        &self.fixes
    }

    /// Segments in ascending time order.
    #[must_use]
    pub fn segments(&self) -> &[TrajectorySegment] {
        &self.segments
    }

    /// Number of fixes.
    #[must_use]
    pub fn fix_count(&self) -> usize {
        self.fixes.len()
    }

    /// Whether the trajectory has no segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Seconds between the first and last fix (`0` for fewer than two).
    #[must_use]
    pub fn timespan_seconds(&self) -> i64 {
        match (self.fixes.first(), self.fixes.last()) {
            (Some(first), Some(last)) => (last.time - first.time).num_seconds(),
            _ => 0,
        }
    }

    /// A trajectory made of only the last `n` fixes.
    #[must_use]
    pub fn tail(&self, n: usize) -> Self {
        let skip = self.fixes.len().saturating_sub(n);
        Self::build(self.subject_id, self.fixes[skip..].iter().copied())
    }

    /// Mean segment speed in km/h.
    ///
    /// # Errors
    ///
    /// Returns [`TrajectoryError::InsufficientData`] if there are no segments.
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_speed_kmhr(&self) -> Result<f64, TrajectoryError> {
        if self.segments.is_empty() {
            return Err(TrajectoryError::InsufficientData {
                message: "mean speed of a trajectory with no segments".to_string(),
            });
        }
        let total: f64 = self
            .segments
            .iter()
            .map(TrajectorySegment::speed_kmhr)
            .sum();
        Ok(total / self.segments.len() as f64)
    }

    /// Nearest-rank percentile of segment speeds in km/h.
    ///
    /// # Errors
    ///
    /// * [`TrajectoryError::InvalidPercentile`] if `percentile` is not in
    ///   `0..=100`.
    /// * [`TrajectoryError::InsufficientData`] if there are no segments.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn speed_percentile(&self, percentile: f64) -> Result<f64, TrajectoryError> {
        if !(0.0..=100.0).contains(&percentile) {
            return Err(TrajectoryError::InvalidPercentile { value: percentile });
        }
        if self.segments.is_empty() {
            return Err(TrajectoryError::InsufficientData {
                message: format!("no segments for speed percentile {percentile}"),
            });
        }

        let mut speeds: Vec<f64> = self
            .segments
            .iter()
            .map(TrajectorySegment::speed_kmhr)
            .collect();
        speeds.sort_by(f64::total_cmp);

        let n = speeds.len();
        let rank = ((percentile / 100.0) * n as f64).ceil() as usize;
        Ok(speeds[rank.clamp(1, n) - 1])
    }
}

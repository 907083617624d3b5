//! Even-odd crossing detection.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use trackwatch_geometry::{fraction_along, interpolate_time, segment_intersections};
use trackwatch_geometry_models::Fix;
use trackwatch_trajectory::{Trajectory, TrajectorySegment};
use uuid::Uuid;

use crate::{Geofence, GeofenceAnalysisParams, RegionIndex, WarnLevel};

/// One detected fence crossing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeofenceCrossing {
    pub subject_id: Uuid,
    pub subject_speed_kmhr: f64,
    pub subject_heading: f64,
    /// Intersection point with a time interpolated along the segment.
    pub estimated_cross_fix: Fix,
    /// Share of the segment's length before the crossing. `0.0` for a
    /// zero-length segment.
    pub fractional_distance: f64,
    pub geofence_id: String,
    pub geofence_name: String,
    pub warn_level: WarnLevel,
    /// Regions containing the segment's start fix.
    pub start_region_ids: BTreeSet<String>,
    /// Regions containing the segment's end fix.
    pub end_region_ids: BTreeSet<String>,
}

/// Every crossing found in one run, with wall-clock run bounds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeofenceAnalysisResult {
    pub crossings: Vec<GeofenceCrossing>,
    pub analysis_start: DateTime<Utc>,
    pub analysis_end: DateTime<Utc>,
}

/// Finds every fence crossing in `trajectories`.
///
/// A segment that meets a fence boundary an even number of times (including
/// zero) ends on the same side it started and is not a crossing. For an odd
/// count every intersection point is reported, in order along the segment.
#[must_use]
pub fn calc_crossings(
    params: &GeofenceAnalysisParams,
    trajectories: &[Trajectory],
) -> GeofenceAnalysisResult {
    let analysis_start = Utc::now();
    let regions = RegionIndex::new(&params.regions);
    let mut crossings = Vec::new();

    for trajectory in trajectories {
        for segment in trajectory.segments() {
            for fence in &params.geofences {
                crossings.extend(segment_crossings(
                    trajectory.subject_id(),
                    segment,
                    fence,
                    &regions,
                ));
            }
        }
    }

    log::debug!(
        "Found {} crossing(s) over {} trajector(ies) and {} fence(s)",
        crossings.len(),
        trajectories.len(),
        params.geofences.len()
    );

    GeofenceAnalysisResult {
        crossings,
        analysis_start,
        analysis_end: Utc::now(),
    }
}

fn segment_crossings(
    subject_id: Uuid,
    segment: &TrajectorySegment,
    fence: &Geofence,
    regions: &RegionIndex,
) -> Vec<GeofenceCrossing> {
    let start = segment.start_point();
    let points = segment_intersections(start, segment.end_point(), fence.boundary());
    if points.len() % 2 == 0 {
        return Vec::new();
    }

    let start_region_ids = regions.containing(start);
    let end_region_ids = regions.containing(segment.end_point());

    points
        .into_iter()
        .map(|point| {
            let fraction = fraction_along(start, point, segment.length_meters());
            let time = interpolate_time(segment.start().time, segment.end().time, fraction);

            GeofenceCrossing {
                subject_id,
                subject_speed_kmhr: segment.speed_kmhr(),
                subject_heading: segment.heading(),
                estimated_cross_fix: Fix::new(point, time),
                fractional_distance: fraction,
                geofence_id: fence.id().to_string(),
                geofence_name: fence.name().to_string(),
                warn_level: fence.warn_level(),
                start_region_ids: start_region_ids.clone(),
                end_region_ids: end_region_ids.clone(),
            }
        })
        .collect()
}

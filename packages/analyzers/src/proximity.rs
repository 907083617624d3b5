//! Feature proximity detection.

use std::slice;

use serde_json::Value;
use trackwatch_analyzers_models::{
    AnalyzerConfig, AnalyzerEvent, AnalyzerParams, AnalyzerResult, EventType, Level,
    ProximitySettings, Subject,
};
use trackwatch_geofence::{SpatialFeature, calc_proximity};
use trackwatch_trajectory::Trajectory;

use crate::catalog::FeatureCatalog;
use crate::observations::AnalysisWindow;
use crate::{AnalyzerBase, AnalyzerError, SubjectAnalyzer, values};

/// Raises a CRITICAL result when the subject's latest movement passes
/// within the threshold distance of a watched feature.
pub struct ProximityAnalyzer {
    base: AnalyzerBase,
    settings: ProximitySettings,
    features: Vec<SpatialFeature>,
}

impl ProximityAnalyzer {
    /// # Errors
    ///
    /// Returns [`AnalyzerError::Configuration`] for an inactive subject, a
    /// non-proximity configuration or an unknown feature group.
    pub fn new(
        subject: Subject,
        config: AnalyzerConfig,
        catalog: &FeatureCatalog,
    ) -> Result<Self, AnalyzerError> {
        let AnalyzerParams::Proximity(settings) = &config.params else {
            return Err(AnalyzerError::configuration(format!(
                "config {} is a {} configuration, not PROXIMITY",
                config.id,
                config.kind()
            )));
        };
        let settings = settings.clone();
        let features = catalog.group(&settings.spatial_feature_group)?.to_vec();

        Ok(Self {
            base: AnalyzerBase::new(subject, config)?,
            settings,
            features,
        })
    }
}

impl SubjectAnalyzer for ProximityAnalyzer {
    fn base(&self) -> &AnalyzerBase {
        &self.base
    }

    fn default_window(&self) -> AnalysisWindow {
        let hours = self.config().search_time_hours;
        AnalysisWindow::from_search_time_hours(hours).with_limit(2)
    }

    /// Only the last segment is examined.
    fn analyze_trajectory(
        &self,
        trajectory: &Trajectory,
    ) -> Result<Vec<AnalyzerResult>, AnalyzerError> {
        let last_segment = trajectory.tail(2);
        let name = &self.subject().name;
        let threshold = self.settings.threshold_dist_meters;

        let results = calc_proximity(&self.features, slice::from_ref(&last_segment))
            .into_iter()
            .filter(|event| event.proximity_distance_meters <= threshold)
            .map(|event| {
                let title = format!("{name} proximal to {}.", event.feature_name);
                let result = AnalyzerResult::new(
                    self.subject().id,
                    self.reference(),
                    event.proximal_fix.time,
                    Level::Critical,
                    title,
                )
                .with_location(event.proximal_fix.point)
                .with_values(values([
                    ("spatial_feature_name", Value::from(event.feature_name)),
                    ("proximity_dist_meters", Value::from(event.proximity_distance_meters)),
                    ("total_fix_count", Value::from(last_segment.fix_count())),
                    ("subject_speed_kmhr", Value::from(event.subject_speed_kmhr)),
                    ("subject_heading", Value::from(event.subject_heading)),
                ]));

                log::info!("{}", result.message);
                result
            })
            .collect();

        Ok(results)
    }

    fn should_record(&self, _last: Option<&AnalyzerResult>, this: &AnalyzerResult) -> bool {
        this.level.is_alerting()
    }

    fn build_event(
        &self,
        _last: Option<&AnalyzerResult>,
        this: &AnalyzerResult,
    ) -> Option<AnalyzerEvent> {
        this.level
            .is_alerting()
            .then(|| self.event_for(this, EventType::Proximity))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use geo::{Geometry, Point};
    use trackwatch_geometry_models::{Fix, GeoPoint};
    use uuid::Uuid;

    use super::*;
    use crate::test_support::{subject, t0};

    fn analyzer(threshold: f64) -> ProximityAnalyzer {
        let point = Geometry::Point(Point::new(36.5, -1.001));
        let well = SpatialFeature::new("w1", "Kilima well", point);
        let catalog = FeatureCatalog::new().with_group("wells", vec![well]);
        let config = AnalyzerConfig::new(
            Uuid::new_v4(),
            "wells",
            AnalyzerParams::Proximity(ProximitySettings {
                spatial_feature_group: "wells".to_string(),
                threshold_dist_meters: threshold,
            }),
        );
        ProximityAnalyzer::new(subject("Tembo"), config, &catalog)
            .unwrap()
    }

    fn fix(lon: f64, lat: f64, i: i64) -> Fix {
        Fix::new(GeoPoint::new(lon, lat), t0() + TimeDelta::minutes(10 * i))
    }

    fn track(points: &[(f64, f64)]) -> Trajectory {
        let fixes = points
            .iter()
            .zip(0..)
            .map(|(&(lon, lat), i)| fix(lon, lat, i));
        Trajectory::build(Uuid::nil(), fixes)
    }

    #[test]
    fn fires_inside_the_threshold() {
        // The well is about 111 m north of the last segment.
        let results = analyzer(500.0)
            .analyze_trajectory(&track(&[(30.0, -5.0), (36.0, -1.0), (37.0, -1.0)]))
            .unwrap();

        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.level, Level::Critical);
        assert_eq!(result.title, "Tembo proximal to Kilima well.");
        assert_eq!(result.values["spatial_feature_name"], "Kilima well");
        assert_eq!(result.values["total_fix_count"], 2);
        let distance = result.values["proximity_dist_meters"].as_f64().unwrap();
        assert!((distance - 111.2).abs() < 1.0, "distance {distance}");
        assert!((result.location().unwrap().longitude - 36.5).abs() < 1e-9);
    }

    #[test]
    fn quiet_outside_the_threshold() {
        let results = analyzer(100.0)
            .analyze_trajectory(&track(&[(36.0, -1.0), (37.0, -1.0)]))
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn earlier_segments_are_ignored() {
        // The first segment passes the well; the last one is far away.
        let results = analyzer(500.0)
            .analyze_trajectory(&track(&[(36.0, -1.0), (37.0, -1.0), (40.0, -1.0)]))
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn window_is_the_last_two_fixes() {
        assert_eq!(analyzer(1.0).default_window().limit, Some(2));
    }
}

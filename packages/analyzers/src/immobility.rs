//! Immobility detection.
//!
//! Walks a subject's fixes from newest to oldest, growing a cluster one fix
//! at a time. The subject is immobile when, at some cluster size, enough of
//! the cluster's fixes lie within the threshold radius of its centroid and
//! the cluster spans more than the threshold time.

use geo::{Centroid, MultiPoint};
use serde_json::Value;
use trackwatch_analyzers_models::{
    AnalyzerConfig, AnalyzerEvent, AnalyzerParams, AnalyzerResult, EventType, ImmobilitySettings,
    Level, Subject,
};
use trackwatch_geometry::{from_coord, haversine_meters, to_point};
use trackwatch_geometry_models::{Fix, GeoPoint};
use trackwatch_trajectory::Trajectory;

use crate::{
    AnalyzerBase, AnalyzerError, SubjectAnalyzer, is_alert_or_all_clear, is_all_clear, values,
};

pub struct ImmobilityAnalyzer {
    base: AnalyzerBase,
    settings: ImmobilitySettings,
}

impl ImmobilityAnalyzer {
    /// # Errors
    ///
    /// Returns [`AnalyzerError::Configuration`] if the subject is inactive
    /// or the configuration is not an immobility configuration.
    pub fn new(subject: Subject, config: AnalyzerConfig) -> Result<Self, AnalyzerError> {
        let AnalyzerParams::Immobility(settings) = &config.params else {
            return Err(AnalyzerError::configuration(format!(
                "config {} is a {} configuration, not IMMOBILITY",
                config.id,
                config.kind()
            )));
        };
        let settings = settings.clone();

        Ok(Self {
            base: AnalyzerBase::new(subject, config)?,
            settings,
        })
    }
}

struct ClusterStats {
    centroid: GeoPoint,
    inside_count: usize,
    probability: f64,
    radius_meters: f64,
    timespan_seconds: i64,
}

impl ClusterStats {
    /// `cluster` is newest first and never empty.
    #[allow(clippy::cast_precision_loss)]
    fn of(cluster: &[Fix], threshold_radius_meters: f64) -> Option<Self> {
        let points: MultiPoint<f64> = cluster.iter().map(|fix| to_point(fix.point)).collect();
        let centroid = from_coord(points.centroid()?.0);

        let distances: Vec<f64> = cluster
            .iter()
            .map(|fix| haversine_meters(centroid, fix.point))
            .collect();
        let inside_count = distances
            .iter()
            .filter(|d| **d <= threshold_radius_meters)
            .count();

        let newest = cluster.first()?.time;
        let oldest = cluster.last()?.time;

        Some(Self {
            centroid,
            inside_count,
            probability: inside_count as f64 / cluster.len() as f64,
            radius_meters: distances.iter().copied().fold(0.0, f64::max),
            timespan_seconds: (newest - oldest).num_seconds(),
        })
    }
}

impl SubjectAnalyzer for ImmobilityAnalyzer {
    fn base(&self) -> &AnalyzerBase {
        &self.base
    }

    fn analyze_trajectory(
        &self,
        trajectory: &Trajectory,
    ) -> Result<Vec<AnalyzerResult>, AnalyzerError> {
        let Some(latest) = trajectory.fixes().last() else {
            return Err(AnalyzerError::insufficient_data("no fixes to test"));
        };
        if trajectory.timespan_seconds() < self.settings.threshold_time_seconds {
            return Err(AnalyzerError::insufficient_data(format!(
                "fixes span {}s, immobility needs {}s",
                trajectory.timespan_seconds(),
                self.settings.threshold_time_seconds
            )));
        }

        let name = &self.subject().name;
        let mut result = AnalyzerResult::new(
            self.subject().id,
            self.reference(),
            latest.time,
            Level::Ok,
            format!("{name} is moving"),
        )
        .with_location(latest.point);

        let radius = self.settings.threshold_radius_meters;
        let mut cluster: Vec<Fix> = Vec::with_capacity(trajectory.fix_count());
        for fix in trajectory.fixes().iter().rev() {
            cluster.push(*fix);
            let Some(stats) = ClusterStats::of(&cluster, radius) else {
                continue;
            };

            if stats.probability >= self.settings.threshold_probability
                && stats.timespan_seconds > self.settings.threshold_time_seconds
            {
                let title = format!("{name} is immobile");
                result.level = Level::Critical;
                result.message.clone_from(&title);
                result.title = title;
                result.geometry = vec![stats.centroid];
                result.values = values([
                    ("probability_value", Value::from(stats.probability)),
                    ("cluster_radius", Value::from(stats.radius_meters)),
                    ("cluster_fix_count", Value::from(stats.inside_count)),
                    ("total_fix_count", Value::from(cluster.len())),
                    ("immobility_time", Value::from(stats.timespan_seconds)),
                ]);
            }
        }

        log::info!("{}", result.message);
        Ok(vec![result])
    }

    fn should_record(&self, last: Option<&AnalyzerResult>, this: &AnalyzerResult) -> bool {
        is_alert_or_all_clear(last, this)
    }

    fn build_event(
        &self,
        last: Option<&AnalyzerResult>,
        this: &AnalyzerResult,
    ) -> Option<AnalyzerEvent> {
        if this.level.is_alerting() {
            Some(self.event_for(this, EventType::Immobility))
        } else if is_all_clear(last, this) {
            Some(self.event_for(this, EventType::ImmobilityAllClear))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use trackwatch_analyzers_models::{EventPriority, ProximitySettings};
    use uuid::Uuid;

    use super::*;
    use crate::test_support::{immobility_config, result_at, subject, t0};

    fn fix(lon: f64, lat: f64, hours: i64) -> Fix {
        Fix::new(GeoPoint::new(lon, lat), t0() + TimeDelta::hours(hours))
    }

    fn hourly(points: &[(f64, f64)]) -> Trajectory {
        let fixes = points
            .iter()
            .zip(0..)
            .map(|(&(lon, lat), i)| fix(lon, lat, i));
        Trajectory::build(Uuid::nil(), fixes)
    }

    fn analyzer() -> ImmobilityAnalyzer {
        ImmobilityAnalyzer::new(subject("Tembo"), immobility_config())
            .unwrap()
    }

    #[test]
    fn stationary_subject_is_immobile() {
        // Seven hourly fixes within a couple of meters: six hours > 5h threshold.
        let trajectory = hourly(&[
            (36.80000, -1.30000),
            (36.80001, -1.30000),
            (36.80000, -1.30001),
            (36.80001, -1.30001),
            (36.80000, -1.30000),
            (36.80001, -1.30000),
            (36.80000, -1.30001),
        ]);
        let results = analyzer().analyze_trajectory(&trajectory).unwrap();

        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.level, Level::Critical);
        assert_eq!(result.title, "Tembo is immobile");
        assert_eq!(result.estimated_time, t0() + TimeDelta::hours(6));
        assert_eq!(result.values["cluster_fix_count"], 7);
        assert_eq!(result.values["total_fix_count"], 7);
        assert_eq!(result.values["immobility_time"], 21_600);
        assert_eq!(result.values["probability_value"], 1.0);
        let lon = result.location().unwrap().longitude;
        assert!((lon - 36.800_005).abs() < 1e-5, "centroid lon {lon}");
    }

    #[test]
    fn travelling_subject_is_ok() {
        let trajectory = hourly(&[
            (36.80, -1.30),
            (36.81, -1.30),
            (36.82, -1.30),
            (36.83, -1.30),
            (36.84, -1.30),
            (36.85, -1.30),
            (36.86, -1.30),
        ]);
        let results = analyzer().analyze_trajectory(&trajectory).unwrap();

        assert_eq!(results[0].level, Level::Ok);
        assert_eq!(results[0].title, "Tembo is moving");
        assert_eq!(results[0].location(), Some(GeoPoint::new(36.86, -1.30)));
        assert!(results[0].values.is_empty());
    }

    #[test]
    fn short_history_is_insufficient() {
        let trajectory = hourly(&[(36.8, -1.3), (36.8, -1.3), (36.8, -1.3)]);
        let err = analyzer().analyze_trajectory(&trajectory).unwrap_err();
        assert!(
            matches!(err, AnalyzerError::InsufficientData { .. }),
            "got {err}"
        );
    }

    #[test]
    fn empty_trajectory_is_insufficient() {
        let err = analyzer()
            .analyze_trajectory(&Trajectory::build(Uuid::nil(), Vec::new()))
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::InsufficientData { .. }));
    }

    #[test]
    fn events_escalate_and_clear() {
        let analyzer = analyzer();
        let config = immobility_config();
        let critical = result_at(Level::Critical, t0(), &config);
        let ok = result_at(Level::Ok, t0(), &config);

        let event = analyzer.build_event(None, &critical).unwrap();
        assert_eq!(event.event_type, EventType::Immobility);
        assert_eq!(event.priority, EventPriority::Urgent);

        let all_clear = analyzer.build_event(Some(&critical), &ok).unwrap();
        assert_eq!(all_clear.event_type, EventType::ImmobilityAllClear);
        assert_eq!(all_clear.priority, EventPriority::Reference);

        assert!(analyzer.build_event(Some(&ok), &ok).is_none());
        assert!(analyzer.build_event(None, &ok).is_none());

        assert!(analyzer.should_record(None, &critical));
        assert!(analyzer.should_record(Some(&critical), &ok));
        assert!(!analyzer.should_record(Some(&ok), &ok));
    }

    #[test]
    fn wrong_params_are_rejected() {
        let mut config = immobility_config();
        config.params = AnalyzerParams::Proximity(ProximitySettings {
            spatial_feature_group: "roads".to_string(),
            threshold_dist_meters: 100.0,
        });
        let err = ImmobilityAnalyzer::new(subject("Tembo"), config)
            .err()
            .unwrap();
        assert!(matches!(err, AnalyzerError::Configuration { .. }));
    }
}

//! Environmental exposure analysis.
//!
//! Samples a raster (for example a human-footprint index) along the
//! subject's recent fixes and raises a CRITICAL result when the mean value
//! exceeds the configured threshold.

use std::sync::Arc;

use serde_json::Value;
use trackwatch_analyzers_models::{
    AnalyzerConfig, AnalyzerEvent, AnalyzerParams, AnalyzerResult, EnvironmentalSettings, EventType,
    Level, Subject,
};
use trackwatch_geometry_models::Fix;
use trackwatch_trajectory::Trajectory;

use crate::{
    AnalyzerBase, AnalyzerError, Stage, StoreError, SubjectAnalyzer, is_alert_or_all_clear,
    is_all_clear, values,
};

/// Samples an environmental raster at a set of fixes.
pub trait EnvironmentalSampler: Send + Sync {
    /// Mean raster value over `fixes`, or `None` when the raster has no
    /// data there.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the raster service fails.
    fn mean_value(
        &self,
        fixes: &[Fix],
        settings: &EnvironmentalSettings,
    ) -> Result<Option<f64>, StoreError>;
}

pub struct EnvironmentalAnalyzer {
    base: AnalyzerBase,
    settings: EnvironmentalSettings,
    sampler: Arc<dyn EnvironmentalSampler>,
}

impl EnvironmentalAnalyzer {
    /// # Errors
    ///
    /// Returns [`AnalyzerError::Configuration`] if the subject is inactive
    /// or the configuration is not an environmental configuration.
    pub fn new(
        subject: Subject,
        config: AnalyzerConfig,
        sampler: Arc<dyn EnvironmentalSampler>,
    ) -> Result<Self, AnalyzerError> {
        let AnalyzerParams::Environmental(settings) = &config.params else {
            return Err(AnalyzerError::configuration(format!(
                "config {} is a {} configuration, not ENVIRONMENTAL",
                config.id,
                config.kind()
            )));
        };
        let settings = settings.clone();

        Ok(Self {
            base: AnalyzerBase::new(subject, config)?,
            settings,
            sampler,
        })
    }
}

impl SubjectAnalyzer for EnvironmentalAnalyzer {
    fn base(&self) -> &AnalyzerBase {
        &self.base
    }

    fn analyze_trajectory(
        &self,
        trajectory: &Trajectory,
    ) -> Result<Vec<AnalyzerResult>, AnalyzerError> {
        let Some(latest) = trajectory.fixes().last() else {
            return Err(AnalyzerError::insufficient_data("no fixes to sample"));
        };

        let name = &self.subject().name;
        let description = &self.settings.short_description;
        let mut result = AnalyzerResult::new(
            self.subject().id,
            self.reference(),
            latest.time,
            Level::Ok,
            format!("{name}: low {description}"),
        )
        .with_message(format!("{name} is in a low {description} area."))
        .with_location(latest.point);

        let mean = self
            .sampler
            .mean_value(trajectory.fixes(), &self.settings)
            .map_err(|e| AnalyzerError::collaborator(Stage::Sample, e))?;

        if let Some(mean) = mean {
            result.values = values([
                ("environmental_descriptor", Value::from(description.clone())),
                ("mean_value", Value::from(mean)),
                ("img_name", Value::from(self.settings.image_name.clone())),
                ("img_band_name", Value::from(self.settings.band_name.clone())),
                ("total_fix_count", Value::from(trajectory.fix_count())),
            ]);

            if mean > self.settings.threshold_value {
                result.level = Level::Critical;
                result.title = format!("{name}: high {description}");
                result.message = format!("{name} is in a high {description} area.");
            }
        } else {
            log::debug!("No {} data for {name}", self.settings.image_name);
        }

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
            // Repeat alerts only when something changed.
            let changed = last.is_none_or(|last| {
                last.level != this.level || this.estimated_time > last.estimated_time
            });
            changed.then(|| self.event_for(this, EventType::EnvironmentalValue))
        } else if is_all_clear(last, this) {
            Some(self.event_for(this, EventType::EnvironmentalAllClear))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use trackwatch_geometry_models::GeoPoint;
    use uuid::Uuid;

    use super::*;
    use crate::test_support::{result_at, subject, t0};

    struct FixedSampler(Option<f64>);

    impl EnvironmentalSampler for FixedSampler {
        fn mean_value(
            &self,
            _fixes: &[Fix],
            _settings: &EnvironmentalSettings,
        ) -> Result<Option<f64>, StoreError> {
            Ok(self.0)
        }
    }

    struct BrokenSampler;

    impl EnvironmentalSampler for BrokenSampler {
        fn mean_value(
            &self,
            _fixes: &[Fix],
            _settings: &EnvironmentalSettings,
        ) -> Result<Option<f64>, StoreError> {
            Err(StoreError::Unavailable {
                message: "raster service down".to_string(),
            })
        }
    }

    fn config() -> AnalyzerConfig {
        AnalyzerConfig::new(
            Uuid::new_v4(),
            "footprint",
            AnalyzerParams::Environmental(EnvironmentalSettings {
                image_name: "footprint-2020".to_string(),
                band_name: "b1".to_string(),
                scale_meters: 500.0,
                threshold_value: 20.0,
                short_description: "Human Footprint".to_string(),
            }),
        )
    }

    fn analyzer(sampler: impl EnvironmentalSampler + 'static) -> EnvironmentalAnalyzer {
        EnvironmentalAnalyzer::new(subject("Tembo"), config(), Arc::new(sampler))
            .unwrap()
    }

    fn results(mean: Option<f64>) -> Vec<AnalyzerResult> {
        analyzer(FixedSampler(mean))
            .analyze_trajectory(&trajectory())
            .unwrap()
    }

    fn trajectory() -> Trajectory {
        Trajectory::build(
            Uuid::nil(),
            vec![
                Fix::new(GeoPoint::new(36.8, -1.3), t0()),
                Fix::new(GeoPoint::new(36.9, -1.3), t0() + TimeDelta::hours(1)),
            ],
        )
    }

    #[test]
    fn mean_above_threshold_is_critical() {
        let results = results(Some(35.5));
        let result = &results[0];
        assert_eq!(result.level, Level::Critical);
        assert_eq!(result.title, "Tembo: high Human Footprint");
        assert_eq!(result.message, "Tembo is in a high Human Footprint area.");
        assert_eq!(result.values["mean_value"], 35.5);
        assert_eq!(result.values["total_fix_count"], 2);
        assert_eq!(result.estimated_time, t0() + TimeDelta::hours(1));
    }

    #[test]
    fn mean_at_threshold_is_ok() {
        let results = results(Some(20.0));
        assert_eq!(results[0].level, Level::Ok);
        assert_eq!(results[0].title, "Tembo: low Human Footprint");
    }

    #[test]
    fn no_raster_data_is_ok_without_values() {
        let results = results(None);
        assert_eq!(results[0].level, Level::Ok);
        assert!(results[0].values.is_empty());
    }

    #[test]
    fn sampler_failure_is_a_sample_stage_error() {
        let err = analyzer(BrokenSampler)
            .analyze_trajectory(&trajectory())
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Sample);
    }

    #[test]
    fn repeated_alerts_need_a_change() {
        let analyzer = analyzer(FixedSampler(None));
        let config = config();
        let earlier = result_at(Level::Critical, t0(), &config);
        let same_time = result_at(Level::Critical, t0(), &config);
        let later = result_at(Level::Critical, t0() + TimeDelta::minutes(5), &config);
        let warning = result_at(Level::Warning, t0(), &config);

        assert!(analyzer.build_event(None, &same_time).is_some());
        assert!(analyzer.build_event(Some(&earlier), &same_time).is_none());
        assert!(analyzer.build_event(Some(&earlier), &later).is_some());
        assert!(analyzer.build_event(Some(&earlier), &warning).is_some());
    }

    #[test]
    fn all_clear_after_alert() {
        let analyzer = analyzer(FixedSampler(None));
        let config = config();
        let critical = result_at(Level::Critical, t0(), &config);
        let ok = result_at(Level::Ok, t0() + TimeDelta::hours(1), &config);

        let event = analyzer.build_event(Some(&critical), &ok).unwrap();
        assert_eq!(event.event_type, EventType::EnvironmentalAllClear);
        assert!(analyzer.build_event(None, &ok).is_none());
    }
}

//! Geofence break detection.

use std::slice;

use serde_json::Value;
use trackwatch_analyzers_models::{
    AnalyzerConfig, AnalyzerEvent, AnalyzerParams, AnalyzerResult, EventType, Level, Subject,
};
use trackwatch_geofence::{
    Geofence, GeofenceAnalysisParams, GeofenceCrossing, Region, WarnLevel, calc_crossings,
};
use trackwatch_trajectory::Trajectory;

use crate::catalog::FeatureCatalog;
use crate::observations::AnalysisWindow;
use crate::{AnalyzerBase, AnalyzerError, SubjectAnalyzer, values};

pub struct GeofenceAnalyzer {
    base: AnalyzerBase,
    params: GeofenceAnalysisParams,
}

impl GeofenceAnalyzer {
    /// Builds fences from the configured critical and warning groups and
    /// regions from the containment group.
    ///
    /// # Errors
    ///
    /// * [`AnalyzerError::Configuration`] for an inactive subject, a
    ///   non-geofence configuration or an unknown group.
    /// * [`AnalyzerError::Geometry`] for a feature that cannot be a fence or
    ///   region.
    pub fn new(
        subject: Subject,
        config: AnalyzerConfig,
        catalog: &FeatureCatalog,
    ) -> Result<Self, AnalyzerError> {
        let AnalyzerParams::Geofence(settings) = &config.params else {
            return Err(AnalyzerError::configuration(format!(
                "config {} is a {} configuration, not GEOFENCE",
                config.id,
                config.kind()
            )));
        };

        let mut geofences = Vec::new();
        for (group, warn_level) in [
            (&settings.critical_geofence_group, WarnLevel::Critical),
            (&settings.warning_geofence_group, WarnLevel::Warning),
        ] {
            if let Some(group) = group {
                for feature in catalog.group(group)? {
                    geofences.extend(Geofence::from_feature(feature, warn_level)?);
                }
            }
        }

        let regions = match &settings.containment_regions_group {
            Some(group) => catalog
                .group(group)?
                .iter()
                .map(Region::from_feature)
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        if geofences.is_empty() {
            log::warn!("Geofence config {} has no fences", config.id);
        }

        Ok(Self {
            base: AnalyzerBase::new(subject, config)?,
            params: GeofenceAnalysisParams::new(geofences, regions),
        })
    }

    fn region_names(&self, crossing: &GeofenceCrossing) -> String {
        let names: Vec<&str> = crossing
            .end_region_ids
            .iter()
            .filter_map(|id| self.params.regions.iter().find(|r| r.id() == id))
            .map(Region::name)
            .collect();

        if names.is_empty() {
            "Unknown region".to_string()
        } else {
            names.join(",")
        }
    }
}

impl SubjectAnalyzer for GeofenceAnalyzer {
    fn base(&self) -> &AnalyzerBase {
        &self.base
    }

    /// Without a search window only the last segment is checked.
    fn default_window(&self) -> AnalysisWindow {
        let hours = self.config().search_time_hours;
        if hours > 0.0 {
            AnalysisWindow::last_hours(hours)
        } else {
            AnalysisWindow::all().with_limit(2)
        }
    }

    fn analyze_trajectory(
        &self,
        trajectory: &Trajectory,
    ) -> Result<Vec<AnalyzerResult>, AnalyzerError> {
        let crossings = calc_crossings(&self.params, slice::from_ref(trajectory));
        let name = &self.subject().name;

        let results = crossings
            .crossings
            .iter()
            .map(|crossing| {
                let level = match crossing.warn_level {
                    WarnLevel::Warning => Level::Warning,
                    WarnLevel::Critical => Level::Critical,
                };
                let fence_name = if crossing.geofence_name.is_empty() {
                    "Un-named Feature"
                } else {
                    crossing.geofence_name.as_str()
                };
                let regions = self.region_names(crossing);
                let title = format!("{name} crossed {fence_name}.");

                let result = AnalyzerResult::new(
                    self.subject().id,
                    self.reference(),
                    crossing.estimated_cross_fix.time,
                    level,
                    title.clone(),
                )
                .with_message(format!("{title} Subject now in: {regions}"))
                .with_location(crossing.estimated_cross_fix.point)
                .with_values(values([
                    ("geofence_name", Value::from(fence_name)),
                    ("contain_regions", Value::from(regions)),
                    ("total_fix_count", Value::from(trajectory.fix_count())),
                    ("subject_speed_kmhr", Value::from(crossing.subject_speed_kmhr)),
                    ("subject_heading", Value::from(crossing.subject_heading)),
                ]));

                log::info!("{}", result.message);
                result
            })
            .collect();

        Ok(results)
    }

    fn should_record(&self, last: Option<&AnalyzerResult>, this: &AnalyzerResult) -> bool {
        if last.is_some_and(|last| last.estimated_time == this.estimated_time) {
            log::info!("Calculated a duplicate result, so not saving it.");
            return false;
        }
        this.level.is_alerting()
    }

    fn build_event(
        &self,
        _last: Option<&AnalyzerResult>,
        this: &AnalyzerResult,
    ) -> Option<AnalyzerEvent> {
        this.level
            .is_alerting()
            .then(|| self.event_for(this, EventType::GeofenceBreak))
    }

    fn skip_existing_events(&self) -> bool {
        true
    }
}

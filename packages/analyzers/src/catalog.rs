//! Named feature groups and analyzer construction.

use std::collections::BTreeMap;
use std::sync::Arc;

use trackwatch_analyzers_models::{AnalyzerConfig, AnalyzerParams, Subject};
use trackwatch_geofence::SpatialFeature;

use crate::environmental::{EnvironmentalAnalyzer, EnvironmentalSampler};
use crate::geofence::GeofenceAnalyzer;
use crate::immobility::ImmobilityAnalyzer;
use crate::proximity::ProximityAnalyzer;
use crate::{AnalyzerError, SubjectAnalyzer};

/// Spatial features grouped by name. Analyzer configurations refer to
/// fences, regions and watched features by group name.
#[derive(Debug, Clone, Default)]
pub struct FeatureCatalog {
    groups: BTreeMap<String, Vec<SpatialFeature>>,
}

impl FeatureCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a group.
    pub fn insert_group(&mut self, name: impl Into<String>, features: Vec<SpatialFeature>) {
        self.groups.insert(name.into(), features);
    }

    /// Builder form of [`Self::insert_group`].
    #[must_use]
    pub fn with_group(mut self, name: impl Into<String>, features: Vec<SpatialFeature>) -> Self {
        self.insert_group(name, features);
        self
    }

    /// Features of the named group.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::Configuration`] if no group has this name.
    pub fn group(&self, name: &str) -> Result<&[SpatialFeature], AnalyzerError> {
        self.groups
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| unknown_group(name))
    }

    /// Group names in sorted order.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }
}

fn unknown_group(name: &str) -> AnalyzerError {
    AnalyzerError::configuration(format!("unknown feature group {name:?}"))
}

/// Everything analyzers may need beyond their subject and configuration.
#[derive(Default, Clone)]
pub struct AnalyzerContext {
    pub catalog: FeatureCatalog,
    /// Required by environmental analyzers.
    pub sampler: Option<Arc<dyn EnvironmentalSampler>>,
}

impl AnalyzerContext {
    #[must_use]
    pub fn new(catalog: FeatureCatalog) -> Self {
        Self {
            catalog,
            sampler: None,
        }
    }

    #[must_use]
    pub fn with_sampler(mut self, sampler: Arc<dyn EnvironmentalSampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }
}

/// Builds the analyzer a configuration describes.
///
/// # Errors
///
/// * [`AnalyzerError::Configuration`] for an inactive subject, an unknown
///   feature group, or an environmental configuration without a sampler.
/// * [`AnalyzerError::Geometry`] if a fence or region cannot be built.
pub fn build_analyzer(
    subject: &Subject,
    config: &AnalyzerConfig,
    context: &AnalyzerContext,
) -> Result<Box<dyn SubjectAnalyzer>, AnalyzerError> {
    let subject = subject.clone();
    let config = config.clone();

    Ok(match &config.params {
        AnalyzerParams::Geofence(_) => {
            Box::new(GeofenceAnalyzer::new(subject, config, &context.catalog)?)
        }
        AnalyzerParams::Immobility(_) => Box::new(ImmobilityAnalyzer::new(subject, config)?),
        AnalyzerParams::Proximity(_) => {
            Box::new(ProximityAnalyzer::new(subject, config, &context.catalog)?)
        }
        AnalyzerParams::Environmental(_) => {
            let Some(sampler) = context.sampler.clone() else {
                return Err(AnalyzerError::configuration(format!(
                    "environmental config {} needs a raster sampler",
                    config.id
                )));
            };
            Box::new(EnvironmentalAnalyzer::new(subject, config, sampler)?)
        }
    })
}

//! Analyzer configuration.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AnalyzerKind, AnalyzerRef};

/// One analyzer configuration applied to a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub id: Uuid,
    pub name: String,
    #[serde(default = "default_revision")]
    pub revision: u32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Look-back window for default observations. Zero or negative means
    /// "no window": the analyzer picks its own default.
    #[serde(default = "default_search_time_hours")]
    pub search_time_hours: f64,
    /// Suppress further analysis for this long after an event.
    #[serde(default)]
    pub quiet_period_seconds: Option<u64>,
    pub params: AnalyzerParams,
}

impl AnalyzerConfig {
    #[must_use]
    pub fn new(id: Uuid, name: impl Into<String>, params: AnalyzerParams) -> Self {
        Self {
            id,
            name: name.into(),
            revision: default_revision(),
            is_active: true,
            search_time_hours: default_search_time_hours(),
            quiet_period_seconds: None,
            params,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> AnalyzerKind {
        self.params.kind()
    }

    #[must_use]
    pub const fn reference(&self) -> AnalyzerRef {
        AnalyzerRef {
            kind: self.kind(),
            config_id: self.id,
            config_revision: self.revision,
        }
    }

    /// The quiet period, if one is configured and non-zero.
    #[must_use]
    pub fn quiet_period(&self) -> Option<TimeDelta> {
        self.quiet_period_seconds
            .filter(|seconds| *seconds > 0)
            .and_then(|seconds| i64::try_from(seconds).ok())
            .and_then(TimeDelta::try_seconds)
    }
}

const fn default_revision() -> u32 {
    1
}

const fn default_true() -> bool {
    true
}

const fn default_search_time_hours() -> f64 {
    24.0
}

/// Analyzer-specific parameters, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalyzerParams {
    Geofence(GeofenceSettings),
    Immobility(ImmobilitySettings),
    Proximity(ProximitySettings),
    Environmental(EnvironmentalSettings),
}

impl AnalyzerParams {
    #[must_use]
    pub const fn kind(&self) -> AnalyzerKind {
        match self {
            Self::Geofence(_) => AnalyzerKind::Geofence,
            Self::Immobility(_) => AnalyzerKind::Immobility,
            Self::Proximity(_) => AnalyzerKind::Proximity,
            Self::Environmental(_) => AnalyzerKind::Environmental,
        }
    }
}

/// Geofence analyzer parameters. Fences and regions are named feature
/// groups resolved by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeofenceSettings {
    pub critical_geofence_group: Option<String>,
    pub warning_geofence_group: Option<String>,
    pub containment_regions_group: Option<String>,
}

/// Immobility analyzer parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImmobilitySettings {
    /// Cluster radius in meters.
    pub threshold_radius_meters: f64,
    /// Minimum time, in seconds, a cluster must span.
    pub threshold_time_seconds: i64,
    /// Minimum share of fixes inside the cluster radius.
    pub threshold_probability: f64,
}

impl Default for ImmobilitySettings {
    fn default() -> Self {
        Self {
            threshold_radius_meters: 13.0,
            threshold_time_seconds: 18_000,
            threshold_probability: 0.8,
        }
    }
}

/// Feature proximity analyzer parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximitySettings {
    /// Named group of spatial features to watch.
    pub spatial_feature_group: String,
    #[serde(default = "default_threshold_dist_meters")]
    pub threshold_dist_meters: f64,
}

const fn default_threshold_dist_meters() -> f64 {
    500.0
}

/// Environmental analyzer parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalSettings {
    /// Raster image to sample.
    pub image_name: String,
    #[serde(default = "default_band_name")]
    pub band_name: String,
    /// Sampling scale in meters.
    #[serde(default = "default_scale_meters")]
    pub scale_meters: f64,
    /// Mean values strictly above this are CRITICAL.
    #[serde(default)]
    pub threshold_value: f64,
    /// Human label for the sampled quantity, e.g. `"Human Footprint"`.
    pub short_description: String,
}

fn default_band_name() -> String {
    "b1".to_string()
}

const fn default_scale_meters() -> f64 {
    500.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_immobility_config_with_defaults() {
        let config: AnalyzerConfig = toml::from_str(
            r#"
            id = "6f1c0f9e-8f34-4a55-9d1e-0c1a4c6f4f10"
            name = "Elephant immobility"
            quiet_period_seconds = 3600

            [params]
            kind = "IMMOBILITY"
            threshold_probability = 0.9
            "#,
        )
        .unwrap();

        assert_eq!(config.kind(), AnalyzerKind::Immobility);
        assert_eq!(config.revision, 1);
        assert!(config.is_active);
        assert!((config.search_time_hours - 24.0).abs() < f64::EPSILON);
        assert_eq!(config.quiet_period(), Some(TimeDelta::hours(1)));

        let AnalyzerParams::Immobility(settings) = &config.params else {
            panic!("expected immobility params, got {:?}", config.params);
        };
        let radius = settings.threshold_radius_meters;
        assert!((radius - 13.0).abs() < f64::EPSILON);
        assert_eq!(settings.threshold_time_seconds, 18_000);
        let probability = settings.threshold_probability;
        assert!((probability - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn parses_proximity_config() {
        let config: AnalyzerConfig = toml::from_str(
            r#"
            id = "00000000-0000-0000-0000-000000000001"
            name = "Road proximity"
            search_time_hours = 0.0

            [params]
            kind = "PROXIMITY"
            spatial_feature_group = "roads"
            "#,
        )
        .unwrap();

        let AnalyzerParams::Proximity(settings) = &config.params else {
            panic!("expected proximity params, got {:?}", config.params);
        };
        assert_eq!(settings.spatial_feature_group, "roads");
        let distance = settings.threshold_dist_meters;
        assert!((distance - 500.0).abs() < f64::EPSILON);
        assert!(config.search_time_hours <= 0.0);
        assert!(config.quiet_period().is_none());
    }

    #[test]
    fn zero_quiet_period_is_none() {
        let mut config = AnalyzerConfig::new(
            Uuid::nil(),
            "fence",
            AnalyzerParams::Geofence(GeofenceSettings {
                critical_geofence_group: Some("fences".to_string()),
                warning_geofence_group: None,
                containment_regions_group: None,
            }),
        );
        config.quiet_period_seconds = Some(0);
        assert!(config.quiet_period().is_none());
        assert_eq!(config.reference().kind, AnalyzerKind::Geofence);
    }
}

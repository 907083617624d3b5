//! `trackwatch.toml`: subjects, analyzer configurations and feature groups.
//!
//! ```toml
//! [feature_groups]
//! park_boundary = "fences/park.geojson"
//!
//! [subtype_filters.elephant]
//! max_speed_kmhr = 7.0
//!
//! [[analyzers]]
//! id = "5f0c6a52-8f1e-4b8e-9a43-2f5d1c1e7a10"
//! name = "park fence"
//! quiet_period_seconds = 3600
//! params = { kind = "GEOFENCE", critical_geofence_group = "park_boundary" }
//!
//! [[subjects]]
//! id = "0b9e4a8c-3c1d-4f6e-8d2a-7e5b9c1f3a20"
//! name = "Tembo"
//! subtype = "elephant"
//! analyzers = ["park fence"]
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use trackwatch_analyzers::{FeatureCatalog, SubjectJob};
use trackwatch_analyzers_models::{AnalyzerConfig, Subject};
use trackwatch_geofence::{GeofenceError, load_spatial_features_geojson};
use trackwatch_trajectory::TrajectoryFilter;
use uuid::Uuid;

/// Errors loading or resolving a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Feature group {group:?}: {source}")]
    FeatureGroup {
        group: String,
        #[source]
        source: GeofenceError,
    },

    #[error("Analyzer name {name:?} is used more than once")]
    DuplicateAnalyzer { name: String },

    #[error("Subject {subject:?} refers to unknown analyzer {name:?}")]
    UnknownAnalyzer { subject: String, name: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackwatchConfig {
    /// Group name to `GeoJSON` file, relative to the config file.
    #[serde(default)]
    pub feature_groups: BTreeMap<String, PathBuf>,
    /// Track filters by subject subtype.
    #[serde(default)]
    pub subtype_filters: BTreeMap<String, TrajectoryFilter>,
    #[serde(default)]
    pub analyzers: Vec<AnalyzerConfig>,
    #[serde(default)]
    pub subjects: Vec<SubjectEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubjectEntry {
    pub id: Uuid,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub subtype: Option<String>,
    /// Names of the analyzer configurations to run.
    #[serde(default)]
    pub analyzers: Vec<String>,
}

const fn default_true() -> bool {
    true
}

impl SubjectEntry {
    #[must_use]
    pub fn subject(&self) -> Subject {
        Subject {
            id: self.id,
            name: self.name.clone(),
            is_active: self.is_active,
            subtype: self.subtype.clone(),
        }
    }
}

impl TrackwatchConfig {
    /// # Errors
    ///
    /// * [`ConfigError::Io`] if the file cannot be read.
    /// * [`ConfigError::Toml`] if it is not a valid configuration.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if `contents` is not a valid
    /// configuration.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Pairs every subject with its analyzer configurations.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::DuplicateAnalyzer`] if two analyzers share a name.
    /// * [`ConfigError::UnknownAnalyzer`] if a subject names an analyzer
    ///   that is not defined.
    pub fn jobs(&self) -> Result<Vec<SubjectJob>, ConfigError> {
        let mut seen = BTreeSet::new();
        for config in &self.analyzers {
            if !seen.insert(config.name.as_str()) {
                return Err(ConfigError::DuplicateAnalyzer {
                    name: config.name.clone(),
                });
            }
        }

        self.subjects
            .iter()
            .map(|entry| {
                let configs = entry
                    .analyzers
                    .iter()
                    .map(|name| {
                        self.analyzers
                            .iter()
                            .find(|c| &c.name == name)
                            .cloned()
                            .ok_or_else(|| ConfigError::UnknownAnalyzer {
                                subject: entry.name.clone(),
                                name: name.clone(),
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SubjectJob::new(entry.subject(), configs))
            })
            .collect()
    }

    /// Loads every feature group. Relative paths resolve against `base_dir`.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::Io`] if a group file cannot be read.
    /// * [`ConfigError::FeatureGroup`] if a group file is not usable
    ///   `GeoJSON`.
    pub fn load_catalog(&self, base_dir: &Path) -> Result<FeatureCatalog, ConfigError> {
        let mut catalog = FeatureCatalog::new();
        for (group, path) in &self.feature_groups {
            let path = base_dir.join(path);
            let geojson = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            let features = load_spatial_features_geojson(&geojson)
                .map_err(|source| ConfigError::FeatureGroup {
                    group: group.clone(),
                    source,
                })?;

            log::info!(
                "Feature group {group}: {} feature(s) from {}",
                features.len(),
                path.display()
            );
            catalog.insert_group(group.clone(), features);
        }
        Ok(catalog)
    }
}

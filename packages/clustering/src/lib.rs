#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Density-based clustering of alert records.
//!
//! Satellite deforestation and fire feeds report many alerts for what is a
//! single incident on the ground. [`cluster_alerts`] groups alerts lying
//! within a radius of each other with [`dbscan`] and keeps one
//! representative per group, annotated with how many alerts it stands for.

pub mod alerts;
pub mod dbscan;

pub use alerts::{
    AlertRecord, NUM_CLUSTERED_ALERTS, alert_point, cluster_alerts, group_alerts, normalize_alert,
    parse_alerts,
};
pub use dbscan::{NOISE, dbscan};

/// Errors that can occur while clustering alerts.
#[derive(Debug, thiserror::Error)]
pub enum ClusteringError {
    /// The clustering radius is not a positive, finite distance.
    #[error("Invalid clustering radius {radius_km} km: expected a positive distance")]
    InvalidRadius {
        /// The rejected radius.
        radius_km: f64,
    },

    /// Alert input could not be parsed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Alert input was valid JSON but not an array of objects.
    #[error("Alert at index {index} is not a JSON object")]
    NotAnObject {
        /// Position of the offending element.
        index: usize,
    },
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Subject analyzers and their orchestration.
//!
//! A [`SubjectAnalyzer`] turns a subject's [`Trajectory`] into zero or more
//! [`AnalyzerResult`]s and decides which of them are recorded and which
//! become events. [`AnalysisRunner`] drives one analyzer through the
//! fetch, build, analyze, record and publish stages against injected
//! collaborators, and [`BatchRunner`] runs every configured analyzer for a
//! list of subjects, skipping analyzers that are in a quiet period and
//! isolating failures.

pub mod batch;
pub mod catalog;
pub mod clock;
pub mod environmental;
pub mod events;
pub mod geofence;
pub mod history;
pub mod immobility;
pub mod observations;
pub mod progress;
pub mod proximity;
pub mod quiet;
pub mod runner;

use serde_json::Value;
use strum_macros::{AsRefStr, Display};
use trackwatch_analyzers_models::{
    AnalyzerConfig, AnalyzerEvent, AnalyzerRef, AnalyzerResult, EventType, Level, Subject, Values,
};
use trackwatch_geofence::GeofenceError;
use trackwatch_trajectory::{Trajectory, TrajectoryError};

pub use batch::{BatchRunner, BatchSummary, CancellationToken, SubjectJob};
pub use catalog::{AnalyzerContext, FeatureCatalog, build_analyzer};
pub use clock::{Clock, ManualClock, SystemClock};
pub use environmental::{EnvironmentalAnalyzer, EnvironmentalSampler};
pub use events::{CollectingEventSink, EventSink};
pub use geofence::GeofenceAnalyzer;
pub use history::{InMemoryResultHistory, ResultHistory};
pub use immobility::ImmobilityAnalyzer;
pub use observations::{AnalysisWindow, InMemoryObservationSource, ObservationSource};
pub use progress::{NullProgress, ProgressCallback};
pub use proximity::ProximityAnalyzer;
pub use quiet::{InMemoryQuietPeriodStore, QuietPeriodStore, analyzer_key};
pub use runner::{AnalysisOutcome, AnalysisRunner};

/// Errors raised while analyzing a subject.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    /// The analyzer cannot run with this subject or configuration.
    #[error("Configuration error: {message}")]
    Configuration {
        /// What is wrong.
        message: String,
    },

    /// Not enough observations to reach a conclusion.
    #[error("Insufficient data: {message}")]
    InsufficientData {
        /// What is missing.
        message: String,
    },

    /// Observations or features are unusable.
    #[error("Invalid input data: {message}")]
    InputData {
        /// What is wrong.
        message: String,
    },

    /// Fence, region or feature geometry could not be built.
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeofenceError),

    /// Trajectory statistics failed.
    #[error("Trajectory error: {0}")]
    Trajectory(TrajectoryError),

    /// A collaborator (observation source, history, event sink, sampler)
    /// failed.
    #[error("{stage} failed: {source}")]
    Collaborator {
        /// The stage that called the collaborator.
        stage: Stage,
        /// The collaborator's error.
        #[source]
        source: StoreError,
    },
}

impl AnalyzerError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn insufficient_data(message: impl Into<String>) -> Self {
        Self::InsufficientData {
            message: message.into(),
        }
    }

    pub(crate) const fn collaborator(stage: Stage, source: StoreError) -> Self {
        Self::Collaborator { stage, source }
    }

    /// The stage a failure happened in.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Configuration { .. } | Self::Geometry(_) => Stage::Setup,
            Self::InsufficientData { .. } | Self::InputData { .. } | Self::Trajectory(_) => {
                Stage::Analyze
            }
            Self::Collaborator { stage, .. } => *stage,
        }
    }
}

impl From<TrajectoryError> for AnalyzerError {
    fn from(value: TrajectoryError) -> Self {
        match value {
            TrajectoryError::InsufficientData { message } => Self::InsufficientData { message },
            other => Self::Trajectory(other),
        }
    }
}

/// Stages of a single analyzer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Setup,
    FetchObservations,
    Analyze,
    Sample,
    LoadHistory,
    RecordResult,
    CreateEvent,
    QuietPeriod,
}

/// Errors reported by collaborator stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A lock guarding in-memory state was poisoned by a panicking writer.
    #[error("Store lock poisoned")]
    Poisoned,

    /// A duration reaches past the range of representable times.
    #[error("Duration of {seconds}s is out of range")]
    DurationOutOfRange {
        /// The rejected duration.
        seconds: i64,
    },

    /// The backing store could not be reached.
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Backend-specific detail.
        message: String,
    },
}

/// The subject and configuration an analyzer was built for.
///
/// Every concrete analyzer holds one. Construction fails for an inactive
/// subject.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerBase {
    subject: Subject,
    config: AnalyzerConfig,
}

impl AnalyzerBase {
    /// # Errors
    ///
    /// Returns [`AnalyzerError::Configuration`] if the subject is inactive.
    pub fn new(subject: Subject, config: AnalyzerConfig) -> Result<Self, AnalyzerError> {
        if !subject.is_active {
            return Err(AnalyzerError::configuration(format!(
                "subject {} ({}) is not active",
                subject.name, subject.id
            )));
        }
        Ok(Self { subject, config })
    }

    /// The analyzed subject.
    #[must_use]
    pub const fn subject(&self) -> &Subject {
        &self.subject
    }

    /// The configuration driving the analysis.
    #[must_use]
    pub const fn config(&self) -> &AnalyzerConfig {
        &self.config
    }
}

/// One kind of analysis for one subject under one configuration.
pub trait SubjectAnalyzer: Send + Sync {
    fn base(&self) -> &AnalyzerBase;

    fn subject(&self) -> &Subject {
        self.base().subject()
    }

    fn config(&self) -> &AnalyzerConfig {
        self.base().config()
    }

    fn reference(&self) -> AnalyzerRef {
        self.config().reference()
    }

    /// Observations to fetch when the caller supplies none.
    fn default_window(&self) -> AnalysisWindow {
        AnalysisWindow::from_search_time_hours(self.config().search_time_hours)
    }

    /// Evaluates the trajectory.
    ///
    /// # Errors
    ///
    /// * [`AnalyzerError::InsufficientData`] if the trajectory cannot
    ///   support a conclusion.
    /// * Any collaborator failure the analyzer depends on.
    fn analyze_trajectory(
        &self,
        trajectory: &Trajectory,
    ) -> Result<Vec<AnalyzerResult>, AnalyzerError>;

    /// Whether `this` should be added to the result history, given the
    /// latest recorded result.
    fn should_record(&self, last: Option<&AnalyzerResult>, this: &AnalyzerResult) -> bool;

    /// The event to publish for `this`, if any.
    fn build_event(
        &self,
        last: Option<&AnalyzerResult>,
        this: &AnalyzerResult,
    ) -> Option<AnalyzerEvent>;

    /// An event of `event_type` for this subject built from `result`.
    fn event_for(&self, result: &AnalyzerResult, event_type: EventType) -> AnalyzerEvent {
        AnalyzerEvent::from_result(result, self.subject(), event_type)
    }

    /// Whether events are checked against the sink before publishing, so an
    /// identical event is never published twice.
    fn skip_existing_events(&self) -> bool {
        false
    }
}

/// Records alerting results, plus the first OK after an alerting one.
pub(crate) fn is_alert_or_all_clear(last: Option<&AnalyzerResult>, this: &AnalyzerResult) -> bool {
    this.level.is_alerting() || is_all_clear(last, this)
}

/// An OK result following a WARNING or CRITICAL one.
pub(crate) fn is_all_clear(last: Option<&AnalyzerResult>, this: &AnalyzerResult) -> bool {
    this.level == Level::Ok && last.is_some_and(|last| last.level.is_alerting())
}

pub(crate) fn values<const N: usize>(pairs: [(&str, Value); N]) -> Values {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use trackwatch_analyzers_models::{AnalyzerParams, ImmobilitySettings, Observation};
    use uuid::Uuid;

    use super::*;

    pub fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    pub fn subject(name: &str) -> Subject {
        Subject::new(Uuid::new_v4(), name)
    }

    pub fn immobility_config() -> AnalyzerConfig {
        AnalyzerConfig::new(
            Uuid::new_v4(),
            "immobility",
            AnalyzerParams::Immobility(ImmobilitySettings::default()),
        )
    }

    /// One observation every `step_minutes`, starting at [`t0`].
    pub fn observations(
        subject: &Subject,
        points: &[(f64, f64)],
        step_minutes: i64,
    ) -> Vec<Observation> {
        points
            .iter()
            .zip(0..)
            .map(|(&(lon, lat), i)| Observation {
                subject_id: subject.id,
                recorded_at: t0() + TimeDelta::minutes(i * step_minutes),
                latitude: lat,
                longitude: lon,
            })
            .collect()
    }

    pub fn result_at(level: Level, time: DateTime<Utc>, config: &AnalyzerConfig) -> AnalyzerResult {
        AnalyzerResult::new(Uuid::nil(), config.reference(), time, level, "result")
    }
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Analyzer configuration, result and event types.
//!
//! These are the values that cross the boundary between the analyzers and
//! whatever stores results, publishes events and supplies observations.

pub mod config;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::{AsRefStr, Display, EnumString};
use trackwatch_geometry_models::{Fix, GeoPoint};
use uuid::Uuid;

pub use config::{
    AnalyzerConfig, AnalyzerParams, EnvironmentalSettings, GeofenceSettings, ImmobilitySettings,
    ProximitySettings,
};

/// Free-form analyzer values and event details.
pub type Values = Map<String, Value>;

/// Severity of an analyzer result.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    Ok = 10,
    Warning = 20,
    Critical = 30,
    Error = 40,
}

impl Level {
    /// Returns the numeric value of this level.
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Creates a level from its numeric value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not 10, 20, 30 or 40.
    pub const fn from_value(value: u8) -> Result<Self, InvalidLevelError> {
        match value {
            10 => Ok(Self::Ok),
            20 => Ok(Self::Warning),
            30 => Ok(Self::Critical),
            40 => Ok(Self::Error),
            _ => Err(InvalidLevelError { value }),
        }
    }

    /// Whether this level warrants an alert (WARNING or CRITICAL).
    #[must_use]
    pub const fn is_alerting(self) -> bool {
        matches!(self, Self::Warning | Self::Critical)
    }
}

/// Error returned when creating a [`Level`] from an unknown numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidLevelError {
    /// The value that was provided.
    pub value: u8,
}

impl std::fmt::Display for InvalidLevelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid level value {}: expected 10, 20, 30 or 40",
            self.value
        )
    }
}

impl std::error::Error for InvalidLevelError {}

/// The kind of analyzer that produced a result.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalyzerKind {
    Geofence,
    Immobility,
    Proximity,
    Environmental,
}

/// Event type handed to the event boundary.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventType {
    GeofenceBreak,
    Immobility,
    ImmobilityAllClear,
    Proximity,
    EnvironmentalValue,
    EnvironmentalAllClear,
}

/// Event priority, derived from the result level.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPriority {
    Reference = 100,
    Important = 200,
    Urgent = 300,
}

impl EventPriority {
    #[must_use]
    pub const fn value(self) -> u16 {
        self as u16
    }
}

impl From<Level> for EventPriority {
    fn from(level: Level) -> Self {
        match level {
            Level::Ok => Self::Reference,
            Level::Warning => Self::Important,
            Level::Critical | Level::Error => Self::Urgent,
        }
    }
}

/// A tracked subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: Uuid,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Subject subtype (e.g. `"elephant"`, `"ranger"`), used to pick a
    /// default track filter.
    #[serde(default)]
    pub subtype: Option<String>,
}

impl Subject {
    #[must_use]
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            is_active: true,
            subtype: None,
        }
    }
}

const fn default_true() -> bool {
    true
}

/// Identifies the analyzer configuration that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalyzerRef {
    pub kind: AnalyzerKind,
    pub config_id: Uuid,
    pub config_revision: u32,
}

/// One evaluation outcome for one subject under one analyzer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerResult {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub analyzer: AnalyzerRef,
    pub analyzer_revision: u32,
    pub estimated_time: DateTime<Utc>,
    pub level: Level,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub values: Values,
    /// Triggering geometry. The first point is the result's location.
    #[serde(default)]
    pub geometry: Vec<GeoPoint>,
}

impl AnalyzerResult {
    /// A result with a fresh id, the title doubling as the message, and no
    /// values or geometry.
    #[must_use]
    pub fn new(
        subject_id: Uuid,
        analyzer: AnalyzerRef,
        estimated_time: DateTime<Utc>,
        level: Level,
        title: impl Into<String>,
    ) -> Self {
        let title = title.into();
        Self {
            id: Uuid::new_v4(),
            subject_id,
            analyzer,
            analyzer_revision: 1,
            estimated_time,
            level,
            message: title.clone(),
            title,
            values: Values::new(),
            geometry: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub fn with_values(mut self, values: Values) -> Self {
        self.values = values;
        self
    }

    #[must_use]
    pub fn with_location(mut self, point: GeoPoint) -> Self {
        self.geometry = vec![point];
        self
    }

    #[must_use]
    pub fn location(&self) -> Option<GeoPoint> {
        self.geometry.first().copied()
    }
}

/// An event handed to the external "create event" boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerEvent {
    pub id: Uuid,
    pub title: String,
    pub event_type: EventType,
    pub priority: EventPriority,
    pub event_time: DateTime<Utc>,
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub event_details: Values,
    pub related_subject_ids: Vec<Uuid>,
}

impl AnalyzerEvent {
    /// Builds an event from a result. Details are the subject's name
    /// followed by the result's values.
    #[must_use]
    pub fn from_result(result: &AnalyzerResult, subject: &Subject, event_type: EventType) -> Self {
        let mut event_details = Values::new();
        event_details.insert("name".to_string(), Value::from(subject.name.clone()));
        event_details.extend(result.values.clone());

        Self {
            id: Uuid::new_v4(),
            title: result.title.clone(),
            event_type,
            priority: result.level.into(),
            event_time: result.estimated_time,
            location: result.location(),
            event_details,
            related_subject_ids: vec![subject.id],
        }
    }
}

/// One raw position report for a subject.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub subject_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
}

impl Observation {
    /// The report as a timestamped `(longitude, latitude)` fix.
    #[must_use]
    pub const fn to_fix(&self) -> Fix {
        let point = GeoPoint::new(self.longitude, self.latitude);
        Fix::new(point, self.recorded_at)
    }
}

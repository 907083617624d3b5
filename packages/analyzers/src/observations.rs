//! Observation lookup for subjects.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, Utc};
use trackwatch_analyzers_models::{Observation, Subject};
use trackwatch_trajectory::TrajectoryFilter;
use uuid::Uuid;

use crate::StoreError;
use crate::clock::{Clock, SystemClock};

/// Which observations an analyzer wants when the caller supplies none.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnalysisWindow {
    /// Only observations recorded within this many hours before now.
    pub hours: Option<f64>,
    /// Only the newest `limit` observations.
    pub limit: Option<usize>,
}

impl AnalysisWindow {
    /// Every observation.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            hours: None,
            limit: None,
        }
    }

    /// Observations from the last `hours` hours.
    #[must_use]
    pub const fn last_hours(hours: f64) -> Self {
        Self {
            hours: Some(hours),
            limit: None,
        }
    }

    /// A positive search time is a look-back window; zero or negative means
    /// no window.
    #[must_use]
    pub fn from_search_time_hours(hours: f64) -> Self {
        if hours > 0.0 {
            Self::last_hours(hours)
        } else {
            Self::all()
        }
    }

    /// Keeps only the newest `limit` observations.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Supplies subjects' observations and their default track filters.
pub trait ObservationSource: Send + Sync {
    /// Observations for `subject` inside `window`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if observations cannot be read.
    fn observations(
        &self,
        subject: &Subject,
        window: AnalysisWindow,
    ) -> Result<Vec<Observation>, StoreError>;

    /// The filter applied when the caller supplies none. `None` keeps every
    /// usable fix.
    fn default_filter(&self, subject: &Subject) -> Option<TrajectoryFilter>;
}

/// Process-local [`ObservationSource`].
///
/// Default filters are looked up by subject subtype.
pub struct InMemoryObservationSource {
    clock: Arc<dyn Clock>,
    observations: Mutex<BTreeMap<Uuid, Vec<Observation>>>,
    subtype_filters: BTreeMap<String, TrajectoryFilter>,
}

impl InMemoryObservationSource {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// A source whose look-back windows end at `clock.now()`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            observations: Mutex::new(BTreeMap::new()),
            subtype_filters: BTreeMap::new(),
        }
    }

    /// Registers the default filter for subjects of `subtype`.
    #[must_use]
    pub fn with_subtype_filter(
        mut self,
        subtype: impl Into<String>,
        filter: TrajectoryFilter,
    ) -> Self {
        self.subtype_filters.insert(subtype.into(), filter);
        self
    }

    /// Adds observations, grouped by their subject id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if a writer panicked.
    pub fn extend(
        &self,
        observations: impl IntoIterator<Item = Observation>,
    ) -> Result<(), StoreError> {
        let mut by_subject = self.observations.lock().map_err(|_| StoreError::Poisoned)?;
        for observation in observations {
            by_subject
                .entry(observation.subject_id)
                .or_default()
                .push(observation);
        }
        Ok(())
    }
}

impl Default for InMemoryObservationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservationSource for InMemoryObservationSource {
    fn observations(
        &self,
        subject: &Subject,
        window: AnalysisWindow,
    ) -> Result<Vec<Observation>, StoreError> {
        let by_subject = self.observations.lock().map_err(|_| StoreError::Poisoned)?;
        let mut selected: Vec<Observation> = by_subject
            .get(&subject.id)
            .cloned()
            .unwrap_or_default();

        if let Some(since) = window
            .hours
            .and_then(|hours| window_start(self.clock.now(), hours))
        {
            selected.retain(|o| o.recorded_at >= since);
        }

        selected.sort_by_key(|o| o.recorded_at);

        if let Some(limit) = window.limit {
            let skip = selected.len().saturating_sub(limit);
            selected.drain(..skip);
        }

        Ok(selected)
    }

    fn default_filter(&self, subject: &Subject) -> Option<TrajectoryFilter> {
        subject
            .subtype
            .as_ref()
            .and_then(|subtype| self.subtype_filters.get(subtype))
            .cloned()
    }
}

/// The earliest time inside a look-back of `hours` from `now`, or `None`
/// when the look-back reaches past the earliest representable time.
#[allow(clippy::cast_possible_truncation)]
fn window_start(now: DateTime<Utc>, hours: f64) -> Option<DateTime<Utc>> {
    TimeDelta::try_milliseconds((hours * 3_600_000.0) as i64)
        .and_then(|lookback| now.checked_sub_signed(lookback))
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::clock::ManualClock;
    use crate::test_support::{observations, subject, t0};

    fn source_at_end_of_day() -> InMemoryObservationSource {
        let clock = ManualClock::new(t0() + TimeDelta::hours(24));
        InMemoryObservationSource::with_clock(Arc::new(clock))
    }

    #[test]
    fn window_keeps_recent_observations_oldest_first() {
        let tembo = subject("Tembo");
        let source = source_at_end_of_day();
        // Every 6 hours: t0, +6h, +12h, +18h, +24h.
        let points = [(0.0, 0.0), (0.1, 0.0), (0.2, 0.0), (0.3, 0.0), (0.4, 0.0)];
        let mut obs = observations(&tembo, &points, 360);
        obs.reverse();
        source.extend(obs).unwrap();

        let window = AnalysisWindow::last_hours(12.0);
        let recent = source.observations(&tembo, window).unwrap();
        let hours: Vec<i64> = recent
            .iter()
            .map(|o| (o.recorded_at - t0()).num_hours())
            .collect();
        assert_eq!(hours, vec![12, 18, 24]);
    }

    #[test]
    fn window_longer_than_recorded_time_keeps_everything() {
        let tembo = subject("Tembo");
        let source = source_at_end_of_day();
        source
            .extend(observations(&tembo, &[(0.0, 0.0), (0.1, 0.0)], 60))
            .unwrap();

        let all = source
            .observations(&tembo, AnalysisWindow::last_hours(1e15))
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn limit_keeps_the_newest() {
        let tembo = subject("Tembo");
        let source = source_at_end_of_day();
        let points = [(0.0, 0.0), (0.1, 0.0), (0.2, 0.0)];
        source.extend(observations(&tembo, &points, 60)).unwrap();

        let window = AnalysisWindow::all().with_limit(2);
        let last_two = source.observations(&tembo, window).unwrap();
        assert_eq!(last_two.len(), 2);
        assert!((last_two[1].longitude - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn other_subjects_are_not_returned() {
        let tembo = subject("Tembo");
        let source = source_at_end_of_day();
        source
            .extend(observations(&tembo, &[(0.0, 0.0)], 60))
            .unwrap();

        let kali = subject("Kali");
        let none = source.observations(&kali, AnalysisWindow::all()).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn search_time_window() {
        let window = AnalysisWindow::from_search_time_hours;
        assert_eq!(window(0.0), AnalysisWindow::all());
        assert_eq!(window(-1.0), AnalysisWindow::all());
        assert_eq!(window(6.0).hours, Some(6.0));
    }

    #[test]
    fn default_filter_by_subtype() {
        let source = InMemoryObservationSource::new()
            .with_subtype_filter("elephant", TrajectoryFilter::with_max_speed(7.0));
        let mut tembo = subject("Tembo");
        assert!(source.default_filter(&tembo).is_none());

        tembo.subtype = Some("elephant".to_string());
        let filter = source.default_filter(&tembo).unwrap();
        assert_eq!(filter.max_speed_kmhr, Some(7.0));
    }
}

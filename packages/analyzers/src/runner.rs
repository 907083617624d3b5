//! Single-analyzer orchestration.

use std::sync::Arc;

use trackwatch_analyzers_models::{AnalyzerEvent, AnalyzerResult, Observation};
use trackwatch_trajectory::{Trajectory, TrajectoryFilter};

use crate::events::EventSink;
use crate::history::ResultHistory;
use crate::observations::ObservationSource;
use crate::quiet::{QuietPeriodStore, analyzer_key};
use crate::{AnalyzerError, Stage, SubjectAnalyzer};

/// One analyzer result and the event it produced, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub result: AnalyzerResult,
    pub event: Option<AnalyzerEvent>,
}

/// Runs analyzers against shared collaborators.
#[derive(Clone)]
pub struct AnalysisRunner {
    source: Arc<dyn ObservationSource>,
    history: Arc<dyn ResultHistory>,
    sink: Arc<dyn EventSink>,
    quiet: Arc<dyn QuietPeriodStore>,
}

impl AnalysisRunner {
    #[must_use]
    pub fn new(
        source: Arc<dyn ObservationSource>,
        history: Arc<dyn ResultHistory>,
        sink: Arc<dyn EventSink>,
        quiet: Arc<dyn QuietPeriodStore>,
    ) -> Self {
        Self {
            source,
            history,
            sink,
            quiet,
        }
    }

    /// Runs one analyzer for its subject.
    ///
    /// 1. Uses `observations` when non-empty, otherwise fetches the
    ///    analyzer's default window from the source.
    /// 2. Builds a trajectory, filtered by `filter` or the subject's default.
    /// 3. Analyzes it.
    /// 4. For each result, compares against the latest recorded result,
    ///    records it if the analyzer says so, and publishes its event.
    /// 5. Starts the configured quiet period once an event is published.
    ///
    /// The quiet period is not checked here; see [`Self::is_quiet`].
    ///
    /// # Errors
    ///
    /// Returns the first [`AnalyzerError`] from any stage. Results and events
    /// handled before the failure stay recorded and published.
    pub fn analyze(
        &self,
        analyzer: &dyn SubjectAnalyzer,
        observations: Option<Vec<Observation>>,
        filter: Option<TrajectoryFilter>,
    ) -> Result<Vec<AnalysisOutcome>, AnalyzerError> {
        let subject = analyzer.subject();
        let config = analyzer.config();

        let observations = match observations {
            Some(observations) if !observations.is_empty() => observations,
            _ => self
                .source
                .observations(subject, analyzer.default_window())
                .map_err(|e| AnalyzerError::collaborator(Stage::FetchObservations, e))?,
        };

        let filter = filter
            .or_else(|| self.source.default_filter(subject))
            .unwrap_or_default();

        let fixes = observations
            .iter()
            .filter(|o| o.subject_id == subject.id)
            .map(Observation::to_fix);
        let trajectory = Trajectory::build_filtered(subject.id, fixes, &filter);
        log::debug!(
            "Analyzing {} ({}) with {} config {}: {} fix(es)",
            subject.name,
            subject.id,
            config.kind(),
            config.id,
            trajectory.fix_count()
        );

        let results = analyzer.analyze_trajectory(&trajectory)?;
        let quiet_key = config
            .quiet_period()
            .map(|ttl| (analyzer_key(config.id, subject.id), ttl));

        let mut outcomes = Vec::with_capacity(results.len());
        for result in results {
            let last = self
                .history
                .latest(subject.id, config.id)
                .map_err(|e| AnalyzerError::collaborator(Stage::LoadHistory, e))?;

            if analyzer.should_record(last.as_ref(), &result) {
                self.history
                    .record(&result)
                    .map_err(|e| AnalyzerError::collaborator(Stage::RecordResult, e))?;
            }

            let event = match analyzer.build_event(last.as_ref(), &result) {
                Some(event) if analyzer.skip_existing_events() && self.event_exists(&event)? => {
                    log::info!("This event is already recorded, so skipping it now.");
                    None
                }
                other => other,
            };

            if let Some(event) = &event {
                self.sink
                    .create_event(event)
                    .map_err(|e| AnalyzerError::collaborator(Stage::CreateEvent, e))?;

                if let Some((key, ttl)) = &quiet_key {
                    log::info!("Pausing analyzer with id={}", config.id);
                    if let Err(e) = self.quiet.set(key, *ttl) {
                        log::warn!("Failed to start quiet period {key}: {e}");
                    }
                }
            }

            outcomes.push(AnalysisOutcome { result, event });
        }

        Ok(outcomes)
    }

    /// Whether the analyzer is in a quiet period for its subject.
    ///
    /// A store failure is logged and treated as "not quiet".
    #[must_use]
    pub fn is_quiet(&self, analyzer: &dyn SubjectAnalyzer) -> bool {
        let config = analyzer.config();
        if config.quiet_period().is_none() {
            return false;
        }

        let key = analyzer_key(config.id, analyzer.subject().id);
        match self.quiet.is_set(&key) {
            Ok(quiet) => quiet,
            Err(e) => {
                log::warn!("Quiet-period lookup for {key} failed, running anyway: {e}");
                false
            }
        }
    }

    fn event_exists(&self, event: &AnalyzerEvent) -> Result<bool, AnalyzerError> {
        self.sink
            .exists(event)
            .map_err(|e| AnalyzerError::collaborator(Stage::CreateEvent, e))
    }
}

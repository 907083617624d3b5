//! Runs every configured analyzer for a list of subjects.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use trackwatch_analyzers_models::{AnalyzerConfig, Subject};

use crate::catalog::{AnalyzerContext, build_analyzer};
use crate::progress::ProgressCallback;
use crate::runner::AnalysisRunner;
use crate::{AnalyzerError, SubjectAnalyzer};

/// Shared flag asking a batch to stop at the next subject boundary.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A subject and the analyzer configurations to run for it.
#[derive(Debug, Clone)]
pub struct SubjectJob {
    pub subject: Subject,
    pub configs: Vec<AnalyzerConfig>,
}

impl SubjectJob {
    #[must_use]
    pub const fn new(subject: Subject, configs: Vec<AnalyzerConfig>) -> Self {
        Self { subject, configs }
    }
}

/// Counts from one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub subjects: usize,
    pub analyzers_run: usize,
    pub quiet_skipped: usize,
    pub insufficient_data: usize,
    pub failures: usize,
    pub results: usize,
    pub events: usize,
    pub cancelled: bool,
}

/// Runs [`SubjectJob`]s through an [`AnalysisRunner`].
///
/// A failing analyzer never stops the batch: insufficient data is logged as
/// a warning, anything else as an error naming the subject, configuration
/// and stage.
pub struct BatchRunner {
    runner: AnalysisRunner,
    context: AnalyzerContext,
}

impl BatchRunner {
    #[must_use]
    pub const fn new(runner: AnalysisRunner, context: AnalyzerContext) -> Self {
        Self { runner, context }
    }

    /// The runner shared by every job.
    #[must_use]
    pub const fn runner(&self) -> &AnalysisRunner {
        &self.runner
    }

    pub fn run(
        &self,
        jobs: &[SubjectJob],
        cancel: &CancellationToken,
        progress: &dyn ProgressCallback,
    ) -> BatchSummary {
        let mut summary = BatchSummary::default();
        progress.set_total(jobs.len() as u64);

        for job in jobs {
            if cancel.is_cancelled() {
                log::warn!(
                    "Batch cancelled after {} of {} subject(s)",
                    summary.subjects,
                    jobs.len()
                );
                summary.cancelled = true;
                break;
            }

            progress.set_message(job.subject.name.clone());
            self.run_subject(job, &mut summary);
            summary.subjects += 1;
            progress.inc(1);
        }

        progress.finish(format!(
            "{} subject(s), {} analyzer run(s), {} event(s), {} failure(s)",
            summary.subjects, summary.analyzers_run, summary.events, summary.failures
        ));
        summary
    }

    fn run_subject(&self, job: &SubjectJob, summary: &mut BatchSummary) {
        let subject = &job.subject;
        if !subject.is_active {
            log::debug!(
                "Skipping inactive subject {} ({})",
                subject.name,
                subject.id
            );
            return;
        }

        for config in job.configs.iter().filter(|c| c.is_active) {
            let analyzer = match build_analyzer(subject, config, &self.context) {
                Ok(analyzer) => analyzer,
                Err(e) => {
                    Self::report_failure(subject, config, &e, summary);
                    continue;
                }
            };

            if self.runner.is_quiet(analyzer.as_ref()) {
                log::info!(
                    "Skipping {} analyzer {} for {}: quiet period active",
                    config.kind(),
                    config.id,
                    subject.name
                );
                summary.quiet_skipped += 1;
                continue;
            }

            summary.analyzers_run += 1;
            match self.run_analyzer(analyzer.as_ref()) {
                Ok((results, events)) => {
                    summary.results += results;
                    summary.events += events;
                }
                Err(e) => Self::report_failure(subject, config, &e, summary),
            }
        }
    }

    fn run_analyzer(
        &self,
        analyzer: &dyn SubjectAnalyzer,
    ) -> Result<(usize, usize), AnalyzerError> {
        let outcomes = self.runner.analyze(analyzer, None, None)?;
        let events = outcomes.iter().filter(|o| o.event.is_some()).count();
        Ok((outcomes.len(), events))
    }

    fn report_failure(
        subject: &Subject,
        config: &AnalyzerConfig,
        error: &AnalyzerError,
        summary: &mut BatchSummary,
    ) {
        if let AnalyzerError::InsufficientData { message } = error {
            log::warn!(
                "Insufficient data for {} ({}) with config {}: {message}",
                subject.name,
                subject.id,
                config.id
            );
            summary.insufficient_data += 1;
        } else {
            log::error!(
                "Analyzer failed for subject {} config {} at {}: {error}",
                subject.id,
                config.id,
                error.stage()
            );
            summary.failures += 1;
        }
    }
}

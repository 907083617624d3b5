//! Latest-result lookup and result recording.

use std::sync::Mutex;

use trackwatch_analyzers_models::AnalyzerResult;
use uuid::Uuid;

use crate::StoreError;

/// Where recorded analyzer results live.
pub trait ResultHistory: Send + Sync {
    /// The recorded result with the latest `estimated_time` for this subject
    /// and analyzer configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the history cannot be read.
    fn latest(
        &self,
        subject_id: Uuid,
        config_id: Uuid,
    ) -> Result<Option<AnalyzerResult>, StoreError>;

    /// Records a result.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the history cannot be written.
    fn record(&self, result: &AnalyzerResult) -> Result<(), StoreError>;
}

/// Process-local [`ResultHistory`].
#[derive(Debug, Default)]
pub struct InMemoryResultHistory {
    results: Mutex<Vec<AnalyzerResult>>,
}

impl InMemoryResultHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded result, in recording order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if a writer panicked.
    pub fn results(&self) -> Result<Vec<AnalyzerResult>, StoreError> {
        let results = self.results.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(results.clone())
    }
}

impl ResultHistory for InMemoryResultHistory {
    fn latest(
        &self,
        subject_id: Uuid,
        config_id: Uuid,
    ) -> Result<Option<AnalyzerResult>, StoreError> {
        let results = self.results.lock().map_err(|_| StoreError::Poisoned)?;

        // On equal times the most recently recorded wins.
        Ok(results
            .iter()
            .filter(|r| r.subject_id == subject_id)
            .filter(|r| r.analyzer.config_id == config_id)
            .max_by_key(|r| r.estimated_time)
            .cloned())
    }

    fn record(&self, result: &AnalyzerResult) -> Result<(), StoreError> {
        self.results
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .push(result.clone());
        Ok(())
    }
}

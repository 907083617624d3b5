//! The "create event" boundary.

use std::sync::Mutex;

use trackwatch_analyzers_models::AnalyzerEvent;

use crate::StoreError;

/// Receives analyzer events.
pub trait EventSink: Send + Sync {
    /// Publishes an event.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the event cannot be stored.
    fn create_event(&self, event: &AnalyzerEvent) -> Result<(), StoreError>;

    /// Whether an event with the same type, time, location and related
    /// subjects was already published.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if existing events cannot be read.
    fn exists(&self, event: &AnalyzerEvent) -> Result<bool, StoreError>;
}

/// An [`EventSink`] that keeps every event in memory.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<AnalyzerEvent>>,
}

impl CollectingEventSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event published so far, in publishing order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if a writer panicked.
    pub fn events(&self) -> Result<Vec<AnalyzerEvent>, StoreError> {
        let events = self.events.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(events.clone())
    }
}

impl EventSink for CollectingEventSink {
    fn create_event(&self, event: &AnalyzerEvent) -> Result<(), StoreError> {
        log::debug!("Publishing {} event: {}", event.event_type, event.title);
        self.events
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .push(event.clone());
        Ok(())
    }

    fn exists(&self, event: &AnalyzerEvent) -> Result<bool, StoreError> {
        let events = self.events.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(events.iter().any(|existing| {
            existing.event_type == event.event_type
                && existing.event_time == event.event_time
                && existing.location == event.location
                && existing.related_subject_ids == event.related_subject_ids
        }))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use trackwatch_analyzers_models::{EventType, Level};
    use trackwatch_geometry_models::GeoPoint;

    use super::*;
    use crate::test_support::{immobility_config, result_at, subject, t0};

    #[test]
    fn exists_matches_type_time_location_and_subjects() {
        let subject = subject("Tembo");
        let result = result_at(Level::Critical, t0(), &immobility_config())
            .with_location(GeoPoint::new(1.0, 2.0));
        let event = AnalyzerEvent::from_result(&result, &subject, EventType::GeofenceBreak);

        let sink = CollectingEventSink::new();
        assert!(!sink.exists(&event).unwrap());
        sink.create_event(&event).unwrap();
        assert!(sink.exists(&event).unwrap());

        let mut later = event.clone();
        later.event_time = t0() + TimeDelta::seconds(1);
        assert!(!sink.exists(&later).unwrap());

        let mut other_type = event;
        other_type.event_type = EventType::Immobility;
        assert!(!sink.exists(&other_type).unwrap());

        assert_eq!(sink.events().unwrap().len(), 1);
    }
}

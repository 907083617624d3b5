//! Quiet-period suppression.
//!
//! After an analyzer publishes an event for a subject, a key is stored with
//! the configured quiet period as its time-to-live. While the key exists the
//! batch runner skips that analyzer for that subject. Keys are never deleted
//! early; they only expire.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use crate::StoreError;
use crate::clock::{Clock, SystemClock};

/// A key/value cache with expiry, reduced to what quiet periods need.
pub trait QuietPeriodStore: Send + Sync {
    /// Whether `key` is present and unexpired.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store cannot be read.
    fn is_set(&self, key: &str) -> Result<bool, StoreError>;

    /// Stores `key` for `ttl`. Setting an existing key restarts its TTL.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store cannot be written.
    fn set(&self, key: &str, ttl: TimeDelta) -> Result<(), StoreError>;
}

/// The quiet-period key for an analyzer configuration and subject.
#[must_use]
pub fn analyzer_key(config_id: Uuid, subject_id: Uuid) -> String {
    format!("analyzer_silent__{config_id}__{subject_id}")
}

/// Process-local [`QuietPeriodStore`].
pub struct InMemoryQuietPeriodStore {
    clock: Arc<dyn Clock>,
    expires_at: Mutex<BTreeMap<String, DateTime<Utc>>>,
}

impl InMemoryQuietPeriodStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            expires_at: Mutex::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryQuietPeriodStore {
    fn default() -> Self {
        Self::new()
    }
}

impl QuietPeriodStore for InMemoryQuietPeriodStore {
    fn is_set(&self, key: &str) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let mut entries = self.expires_at.lock().map_err(|_| StoreError::Poisoned)?;

        match entries.get(key) {
            Some(expires_at) if *expires_at > now => Ok(true),
            Some(_) => {
                entries.remove(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    fn set(&self, key: &str, ttl: TimeDelta) -> Result<(), StoreError> {
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(ttl)
            .ok_or(StoreError::DurationOutOfRange {
                seconds: ttl.num_seconds(),
            })?;
        self.expires_at
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .insert(key.to_string(), expires_at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::clock::ManualClock;

    fn store() -> (Arc<ManualClock>, InMemoryQuietPeriodStore) {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let store = InMemoryQuietPeriodStore::with_clock(clock.clone());
        (clock, store)
    }

    #[test]
    fn key_format() {
        let config = Uuid::from_u128(1);
        let subject = Uuid::from_u128(2);
        let expected = concat!(
            "analyzer_silent__",
            "00000000-0000-0000-0000-000000000001",
            "__",
            "00000000-0000-0000-0000-000000000002",
        );
        assert_eq!(analyzer_key(config, subject), expected);
    }

    #[test]
    fn key_is_set_until_ttl_elapses() {
        let (clock, store) = store();
        store.set("k", TimeDelta::minutes(30)).unwrap();

        assert!(store.is_set("k").unwrap());
        clock.advance(TimeDelta::minutes(29));
        assert!(store.is_set("k").unwrap(), "still quiet before the TTL");
        clock.advance(TimeDelta::minutes(1));
        assert!(!store.is_set("k").unwrap(), "expired exactly at the TTL");
    }

    #[test]
    fn unknown_key_is_not_set() {
        let (_clock, store) = store();
        assert!(!store.is_set("missing").unwrap());
    }

    #[test]
    fn ttl_past_the_end_of_time_is_rejected() {
        let (_clock, store) = store();
        let ttl = TimeDelta::try_seconds(100_000_000_000_000).unwrap();

        assert!(matches!(
            store.set("k", ttl),
            Err(StoreError::DurationOutOfRange { seconds }) if seconds == 100_000_000_000_000
        ));
        assert!(!store.is_set("k").unwrap());
    }

    #[test]
    fn setting_again_restarts_the_ttl() {
        let (clock, store) = store();
        store.set("k", TimeDelta::minutes(10)).unwrap();
        clock.advance(TimeDelta::minutes(8));
        store.set("k", TimeDelta::minutes(10)).unwrap();
        clock.advance(TimeDelta::minutes(8));
        assert!(store.is_set("k").unwrap());
    }
}

//! Persistence seam for timers, the denylist and the error log.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;

use crate::denylist::Denylist;
use crate::discovery::DiscoveryLog;
use crate::timers::TimerStore;

/// Which per-village record set a timer lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerSet {
    /// Troop and merchant movements.
    Travel,
    /// Builds and festivals.
    Construction,
}

/// One line of the durable error log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl ErrorRecord {
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            message: message.into(),
        }
    }
}

/// Trait for abstracting durable scheduler state.
/// The bot provides a JSON file implementation.
pub trait StateStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load a village's timers; a village never seen before has none.
    ///
    /// # Errors
    ///
    /// Returns an error if stored timers exist but cannot be read.
    fn load_timers(&self, village: &str, set: TimerSet) -> Result<TimerStore, Self::Error>;

    /// Replace a village's timers.
    ///
    /// # Errors
    ///
    /// Returns an error if the timers cannot be written.
    fn save_timers(&mut self, village: &str, set: TimerSet, timers: &TimerStore) -> Result<(), Self::Error>;

    /// Load the process-wide denylist.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored denylist exists but cannot be read.
    fn load_denylist(&self) -> Result<Denylist, Self::Error>;

    /// Replace the process-wide denylist.
    ///
    /// # Errors
    ///
    /// Returns an error if the denylist cannot be written.
    fn save_denylist(&mut self, denylist: &Denylist) -> Result<(), Self::Error>;

    /// Append to the durable error log.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be written.
    fn append_error(&mut self, record: ErrorRecord) -> Result<(), Self::Error>;

    /// Load oasis-scan progress.
    ///
    /// # Errors
    ///
    /// Returns an error if stored progress exists but cannot be read.
    fn load_discovery(&self) -> Result<DiscoveryLog, Self::Error>;

    /// Replace oasis-scan progress.
    ///
    /// # Errors
    ///
    /// Returns an error if the progress cannot be written.
    fn save_discovery(&mut self, log: &DiscoveryLog) -> Result<(), Self::Error>;
}

/// In-memory store for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    timers: HashMap<(String, TimerSet), TimerStore>,
    denylist: Denylist,
    errors: Vec<ErrorRecord>,
    discovery: DiscoveryLog,
}

impl MemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    #[must_use]
    pub fn timers(&self, village: &str, set: TimerSet) -> TimerStore {
        self.timers
            .get(&(village.to_string(), set))
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub const fn denylist(&self) -> &Denylist {
        &self.denylist
    }
}

impl StateStore for MemoryStateStore {
    type Error = Infallible;

    fn load_timers(&self, village: &str, set: TimerSet) -> Result<TimerStore, Self::Error> {
        Ok(self.timers(village, set))
    }

    fn save_timers(&mut self, village: &str, set: TimerSet, timers: &TimerStore) -> Result<(), Self::Error> {
        self.timers.insert((village.to_string(), set), timers.clone());
        Ok(())
    }

    fn load_denylist(&self) -> Result<Denylist, Self::Error> {
        Ok(self.denylist.clone())
    }

    fn save_denylist(&mut self, denylist: &Denylist) -> Result<(), Self::Error> {
        self.denylist = denylist.clone();
        Ok(())
    }

    fn append_error(&mut self, record: ErrorRecord) -> Result<(), Self::Error> {
        self.errors.push(record);
        Ok(())
    }

    fn load_discovery(&self) -> Result<DiscoveryLog, Self::Error> {
        Ok(self.discovery.clone())
    }

    fn save_discovery(&mut self, log: &DiscoveryLog) -> Result<(), Self::Error> {
        self.discovery = log.clone();
        Ok(())
    }
}

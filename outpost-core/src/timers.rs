//! Durable per-village action timers.
//!
//! A [`TimerStore`] belongs to one village and maps a [`TimerKey`] (what was
//! done, to what) to the time it was last dispatched and the duration the
//! game reported for it. The cooldown policy decides from these records
//! whether the action may be repeated.
use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use crate::coords::Coordinate;
use crate::cooldown::CooldownPolicy;

/// Kind of timed action a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Raid,
    Attack,
    Trade,
    Build,
    Festival,
}

impl ActionKind {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Raid => "raid",
            Self::Attack => "attack",
            Self::Trade => "trade",
            Self::Build => "build",
            Self::Festival => "festival",
        }
    }
}

/// Identifies one timer inside a village's store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerKey {
    pub kind: ActionKind,
    pub subject: String,
}

impl TimerKey {
    #[must_use]
    pub fn new(kind: ActionKind, subject: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
        }
    }

    #[must_use]
    pub fn target(kind: ActionKind, target: Coordinate) -> Self {
        Self::new(kind, target.to_string())
    }
}

impl fmt::Display for TimerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.key(), self.subject)
    }
}

/// When an action last went out and how long the game said it would take.
///
/// The duration is kept exactly as scraped; parsing happens when the
/// cooldown is evaluated so malformed values stay visible in the files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerRecord {
    pub last_executed_at: DateTime<Utc>,
    #[serde(default)]
    pub reported_duration: String,
}

impl TimerRecord {
    #[must_use]
    pub fn new(last_executed_at: DateTime<Utc>, reported_duration: impl Into<String>) -> Self {
        Self {
            last_executed_at,
            reported_duration: reported_duration.into(),
        }
    }
}

/// Timers of a single village, serialized as `{"raid:[1|2]": {...}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerStore {
    records: BTreeMap<String, TimerRecord>,
}

impl TimerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &TimerKey) -> Option<&TimerRecord> {
        self.records.get(&key.to_string())
    }

    /// Stores the record, replacing any earlier dispatch for the same key.
    pub fn set(&mut self, key: &TimerKey, record: TimerRecord) {
        self.records.insert(key.to_string(), record);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether any record of `kind` is still cooling down under `policy`.
    #[must_use]
    pub fn any_pending(&self, kind: ActionKind, policy: CooldownPolicy, now: DateTime<Utc>) -> bool {
        let prefix = format!("{}:", kind.key());
        self.records
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .any(|(_, record)| !policy.may_run(Some(record), now))
    }
}

fn duration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+):(\d{1,2}):(\d{1,2})").expect("valid duration regex"))
}

/// Parses the first `H:MM:SS` group in a game-reported duration such as
/// `"in 1:05:09 hrs."`. Hours are not capped at 24.
#[must_use]
pub fn parse_duration(text: &str) -> Option<TimeDelta> {
    let caps = duration_pattern().captures(text)?;
    let hours: i64 = caps[1].parse().ok()?;
    let minutes: i64 = caps[2].parse().ok()?;
    let seconds: i64 = caps[3].parse().ok()?;
    let total = hours
        .checked_mul(3600)?
        .checked_add(minutes * 60)?
        .checked_add(seconds)?;
    TimeDelta::try_seconds(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_embedded_durations() {
        assert_eq!(parse_duration("in 1:05:09 hrs."), TimeDelta::try_seconds(3909));
        assert_eq!(parse_duration("0:00:30"), TimeDelta::try_seconds(30));
        assert_eq!(parse_duration("27:00:00"), TimeDelta::try_seconds(97_200));
    }

    #[test]
    fn rejects_text_without_duration() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration("12:30"), None);
    }

    #[test]
    fn set_overwrites_previous_dispatch() {
        let mut store = TimerStore::new();
        let key = TimerKey::target(ActionKind::Raid, Coordinate::new(4, 5));
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        store.set(&key, TimerRecord::new(first, "0:10:00"));
        store.set(&key, TimerRecord::new(second, "0:20:00"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&key).map(|r| r.last_executed_at), Some(second));
    }

    #[test]
    fn keys_serialize_with_kind_prefix() {
        let mut store = TimerStore::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        store.set(
            &TimerKey::target(ActionKind::Attack, Coordinate::new(-1, 2)),
            TimerRecord::new(now, "0:01:00"),
        );
        let json = serde_json::to_string(&store).unwrap();
        assert!(json.contains("\"attack:[-1|2]\""));
        let back: TimerStore = serde_json::from_str(&json).unwrap();
        assert_eq!(back, store);
    }

    #[test]
    fn any_pending_only_considers_matching_kind() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut store = TimerStore::new();
        store.set(
            &TimerKey::new(ActionKind::Festival, "large"),
            TimerRecord::new(now, "5:00:00"),
        );
        assert!(!store.any_pending(ActionKind::Build, CooldownPolicy::CONSTRUCTION, now));
        assert!(store.any_pending(ActionKind::Festival, CooldownPolicy::CONSTRUCTION, now));
    }
}

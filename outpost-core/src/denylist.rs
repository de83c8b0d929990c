//! Targets the game has definitively rejected.
//!
//! Entries never expire. An operator curates `denylist.json` by hand when a
//! rejection turns out to have been temporary.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coords::Coordinate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenylistEntry {
    #[serde(alias = "targetMapId")]
    pub target: Coordinate,
    #[serde(default, alias = "errorMessage")]
    pub reason: String,
    /// Absent for entries written by hand.
    #[serde(default)]
    pub added_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Denylist {
    entries: Vec<DenylistEntry>,
}

impl Denylist {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_blocked(&self, target: Coordinate) -> bool {
        self.entries.iter().any(|entry| entry.target == target)
    }

    /// Adds `target` unless it is already present. Returns whether an entry
    /// was inserted.
    pub fn record(&mut self, target: Coordinate, reason: impl Into<String>, now: DateTime<Utc>) -> bool {
        if self.is_blocked(target) {
            return false;
        }
        self.entries.push(DenylistEntry {
            target,
            reason: reason.into(),
            added_at: Some(now),
        });
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &DenylistEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn record_is_idempotent() {
        let now = Utc.with_ymd_and_hms(2024, 2, 2, 2, 2, 2).unwrap();
        let mut denylist = Denylist::new();
        let target = Coordinate::new(10, -20);
        assert!(denylist.record(target, "village does not exist", now));
        assert!(!denylist.record(target, "different message", now));
        assert_eq!(denylist.len(), 1);
        assert!(denylist.is_blocked(target));
        assert!(!denylist.is_blocked(Coordinate::new(-20, 10)));
    }

    #[test]
    fn reads_hand_written_entries() {
        let json = r#"[
            {"targetMapId": [3, 4], "errorMessage": "banned"},
            {"target": {"x": 5, "y": 6}}
        ]"#;
        let denylist: Denylist = serde_json::from_str(json).unwrap();
        assert_eq!(denylist.len(), 2);
        assert!(denylist.is_blocked(Coordinate::new(3, 4)));
        assert!(denylist.is_blocked(Coordinate::new(5, 6)));
        assert_eq!(denylist.entries().next().map(|e| e.reason.as_str()), Some("banned"));
    }
}

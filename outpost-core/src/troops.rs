//! Unit types and troop counts.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Troop slot as the game numbers them, `t1` through `t10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitType {
    T1,
    T2,
    T3,
    T4,
    T5,
    T6,
    T7,
    T8,
    T9,
    T10,
}

/// Building that trains a given unit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingBuilding {
    Barracks,
    Stable,
    Workshop,
}

impl UnitType {
    pub const ALL: [Self; 10] = [
        Self::T1,
        Self::T2,
        Self::T3,
        Self::T4,
        Self::T5,
        Self::T6,
        Self::T7,
        Self::T8,
        Self::T9,
        Self::T10,
    ];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::T1 => "t1",
            Self::T2 => "t2",
            Self::T3 => "t3",
            Self::T4 => "t4",
            Self::T5 => "t5",
            Self::T6 => "t6",
            Self::T7 => "t7",
            Self::T8 => "t8",
            Self::T9 => "t9",
            Self::T10 => "t10",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|unit| unit.key() == key)
    }

    #[must_use]
    pub const fn training_building(self) -> TrainingBuilding {
        match self {
            Self::T1 | Self::T2 | Self::T3 => TrainingBuilding::Barracks,
            Self::T7 | Self::T8 => TrainingBuilding::Workshop,
            _ => TrainingBuilding::Stable,
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Number of units per type. Zero entries are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TroopCounts(BTreeMap<UnitType, u32>);

impl TroopCounts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, unit: UnitType) -> u32 {
        self.0.get(&unit).copied().unwrap_or(0)
    }

    pub fn set(&mut self, unit: UnitType, count: u32) {
        if count == 0 {
            self.0.remove(&unit);
        } else {
            self.0.insert(unit, count);
        }
    }

    #[must_use]
    pub fn with(mut self, unit: UnitType, count: u32) -> Self {
        self.set(unit, count);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.values().map(|count| u64::from(*count)).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (UnitType, u32)> + '_ {
        self.0.iter().map(|(unit, count)| (*unit, *count))
    }
}

impl FromIterator<(UnitType, u32)> for TroopCounts {
    fn from_iter<I: IntoIterator<Item = (UnitType, u32)>>(iter: I) -> Self {
        let mut counts = Self::new();
        for (unit, count) in iter {
            counts.set(unit, count);
        }
        counts
    }
}

impl fmt::Display for TroopCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("no units");
        }
        let parts: Vec<String> = self
            .iter()
            .map(|(unit, count)| format!("{count} {unit}"))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

//! Cooldown policy: may a timed action run again?
use chrono::{DateTime, TimeDelta, Utc};

use crate::timers::{TimerRecord, parse_duration};

/// Reported travel times are one-way; doubling covers the return leg.
pub const SAFETY_MULTIPLIER: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownPolicy {
    multiplier: i32,
}

impl CooldownPolicy {
    /// Troop and merchant movements.
    pub const TRAVEL: Self = Self {
        multiplier: SAFETY_MULTIPLIER,
    };
    /// Builds and festivals, where the game reports the exact remaining time.
    pub const CONSTRUCTION: Self = Self { multiplier: 1 };

    #[must_use]
    pub const fn multiplier(self) -> i32 {
        self.multiplier
    }

    /// Earliest instant the action behind `record` may be dispatched again.
    ///
    /// An unparsable duration counts as zero so the action is never stuck.
    #[must_use]
    pub fn ready_at(self, record: &TimerRecord) -> DateTime<Utc> {
        let duration = parse_duration(&record.reported_duration).unwrap_or_else(|| {
            log::warn!(
                "unparsable reported duration {:?}; treating as zero",
                record.reported_duration
            );
            TimeDelta::zero()
        });
        let wait = duration
            .checked_mul(self.multiplier)
            .unwrap_or(TimeDelta::MAX);
        record
            .last_executed_at
            .checked_add_signed(wait)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    #[must_use]
    pub fn may_run(self, record: Option<&TimerRecord>, now: DateTime<Utc>) -> bool {
        record.is_none_or(|record| now >= self.ready_at(record))
    }
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self::TRAVEL
    }
}

/// Travel cooldown check: true with no record, otherwise true once
/// `last_executed_at + 2 × reported_duration` has passed.
#[must_use]
pub fn may_run(record: Option<&TimerRecord>, now: DateTime<Utc>) -> bool {
    CooldownPolicy::TRAVEL.may_run(record, now)
}

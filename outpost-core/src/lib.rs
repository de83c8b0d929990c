//! Outpost Scheduling Core
//!
//! Platform-agnostic decision logic for the Outpost village automation bot.
//! This crate owns the configuration model, durable timer and denylist state,
//! the cooldown policy and the resource/troop heuristics. It knows nothing
//! about browsers, pages or selectors; those live behind the action executor
//! in `outpost-bot`.

pub mod config;
pub mod cooldown;
pub mod coords;
pub mod denylist;
pub mod discovery;
pub mod heuristics;
pub mod resources;
pub mod storage;
pub mod targets;
pub mod timers;
pub mod troops;

// Re-export commonly used types
pub use config::{
    BotConfig, ConfigError, DiscoveryConfig, FestivalVariant, FieldId, Task, Village,
};
pub use cooldown::{CooldownPolicy, SAFETY_MULTIPLIER, may_run};
pub use coords::Coordinate;
pub use denylist::{Denylist, DenylistEntry};
pub use discovery::{DiscoveryLog, MAP_RADIUS, surrounding_coordinates};
pub use heuristics::{
    CarrierPlan, FieldSlot, OffensivePlan, PackingError, least_resource, lowest_level_field,
    pack_carriers, plan_offensive, select_raid_unit, troop_amount_for_population,
};
pub use resources::{Resource, ResourceAmounts};
pub use storage::{ErrorRecord, MemoryStateStore, StateStore, TimerSet};
pub use targets::{TargetCandidate, TargetFeed};
pub use timers::{ActionKind, TimerKey, TimerRecord, TimerStore, parse_duration};
pub use troops::{TrainingBuilding, TroopCounts, UnitType};

//! The seam between scheduling decisions and the game.
//!
//! The scheduler only decides; everything that touches the game goes through
//! [`ActionExecutor`]. Probes read a screen, [`ActionExecutor::execute`]
//! changes something.
use async_trait::async_trait;
use outpost_core::{
    BotConfig, Coordinate, FestivalVariant, FieldId, FieldSlot, Resource, ResourceAmounts,
    TroopCounts, UnitType, Village,
};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// One UI-level change to the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SelectHeroProduction {
        resource: Resource,
    },
    Train {
        unit: UnitType,
        count: u32,
    },
    /// A raid-mode troop movement.
    SendTroops {
        target: Coordinate,
        troops: TroopCounts,
    },
    SendResources {
        target: Coordinate,
        amounts: ResourceAmounts,
    },
    UpgradeField {
        field: FieldId,
    },
    StartFestival {
        variant: FestivalVariant,
    },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelectHeroProduction { resource } => {
                write!(f, "hero production -> {}", resource.key())
            }
            Self::Train { unit, count } => write!(f, "train {count} x {}", unit.key()),
            Self::SendTroops { target, troops } => write!(f, "send {troops} to {target}"),
            Self::SendResources { target, amounts } => write!(f, "ship {amounts} to {target}"),
            Self::UpgradeField { field } => write!(f, "upgrade field {field}"),
            Self::StartFestival { variant } => write!(f, "start {} festival", variant.key()),
        }
    }
}

/// Outcome of [`ActionExecutor::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    /// The game accepted the action. Travel and build screens report how long
    /// it takes as `H:MM:SS`.
    Success { extracted_duration: Option<String> },
    /// The target can never be acted on.
    InvalidTarget { reason: String },
    /// Not enough resources or units right now.
    InsufficientResource,
    TransientFailure { error: String },
}

impl ActionResult {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Failure of a probe or session step, using the same taxonomy as
/// [`ActionResult`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    #[error("target rejected: {reason}")]
    InvalidTarget { reason: String },
    #[error("not enough resources or units")]
    InsufficientResource,
    #[error("{0}")]
    Transient(String),
}

impl From<ExecutorError> for ActionResult {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::InvalidTarget { reason } => Self::InvalidTarget { reason },
            ExecutorError::InsufficientResource => Self::InsufficientResource,
            ExecutorError::Transient(error) => Self::TransientFailure { error },
        }
    }
}

impl From<thirtyfour::error::WebDriverError> for ExecutorError {
    fn from(err: thirtyfour::error::WebDriverError) -> Self {
        Self::Transient(err.to_string())
    }
}

/// An attack row from the village overview.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct IncomingAttack {
    pub count: String,
    pub arrives_in: String,
}

/// What the marketplace can ship right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marketplace {
    /// Resources one merchant carries.
    pub capacity: u64,
    pub available_carriers: u32,
    pub stock: ResourceAmounts,
}

/// Units at home, read from the rally point aimed at a target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RallyPoint {
    pub available: TroopCounts,
}

/// What the map says about an oasis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OasisStatus {
    Free,
    /// Animals are guarding it.
    Occupied,
    /// Not an oasis, or not reachable.
    Invalid { reason: String },
}

/// Performs game actions for the scheduler.
#[async_trait]
pub trait ActionExecutor: Send {
    /// Session bootstrap before the first village of a cycle.
    async fn begin_cycle(&mut self, _config: &BotConfig) -> Result<(), ExecutorError> {
        Ok(())
    }

    /// Makes `village` the one later calls act on.
    async fn switch_context(&mut self, village: &Village) -> Result<(), ExecutorError>;

    async fn incoming_attacks(&mut self) -> Result<Vec<IncomingAttack>, ExecutorError>;

    /// Resources stored by the hero.
    async fn hero_resources(&mut self) -> Result<ResourceAmounts, ExecutorError>;

    async fn marketplace(&mut self, target: Coordinate) -> Result<Marketplace, ExecutorError>;

    async fn rally_point(&mut self, target: Coordinate) -> Result<RallyPoint, ExecutorError>;

    /// Upgradable fields and, when `preference` is non-empty, building slots.
    async fn resource_fields(
        &mut self,
        preference: &[FieldId],
    ) -> Result<Vec<FieldSlot>, ExecutorError>;

    async fn inspect_oasis(&mut self, target: Coordinate) -> Result<OasisStatus, ExecutorError>;

    /// Whether a map tile is a free oasis. Used by discovery.
    async fn inspect_tile(&mut self, tile: Coordinate) -> Result<bool, ExecutorError>;

    async fn execute(&mut self, action: &Action) -> ActionResult;

    /// Dumps whatever helps explain `error_chain` into `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifacts cannot be written.
    async fn capture_diagnostics(&mut self, _dir: &Path, _error_chain: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executor_errors_map_onto_results() {
        let invalid: ActionResult = ExecutorError::InvalidTarget {
            reason: "no village".into(),
        }
        .into();
        assert_eq!(
            invalid,
            ActionResult::InvalidTarget {
                reason: "no village".into()
            }
        );
        let short: ActionResult = ExecutorError::InsufficientResource.into();
        assert_eq!(short, ActionResult::InsufficientResource);
        let flaky: ActionResult = ExecutorError::Transient("timeout".into()).into();
        assert!(!flaky.is_success());
    }

    #[test]
    fn actions_describe_themselves() {
        let action = Action::SendTroops {
            target: Coordinate::new(3, -4),
            troops: TroopCounts::new().with(UnitType::T1, 10),
        };
        assert_eq!(action.to_string(), "send 10 t1 to [3|-4]");
        let festival = Action::StartFestival {
            variant: FestivalVariant::Large,
        };
        assert_eq!(festival.to_string(), "start large festival");
    }
}

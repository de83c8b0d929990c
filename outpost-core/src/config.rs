//! Bot configuration: the villages to manage and the tasks each one runs.
//!
//! The document is re-read at the start of every cycle, so edits take effect
//! without a restart. Field names accept the aliases used by older
//! hand-written configs (`aldeas`, `newdid`, `ruta`, `task`, ...).
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::coords::Coordinate;
use crate::troops::UnitType;

/// Slot number of a resource field or building (`data-aid` in the game).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct FieldId(pub u32);

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for FieldId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = StringOrNumber::deserialize(deserializer)?;
        let text = raw.into_string();
        text.trim()
            .parse()
            .map(FieldId)
            .map_err(|_| serde::de::Error::custom(format!("invalid field id {text:?}")))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Text(String),
    Number(u64),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(number) => number.to_string(),
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    StringOrNumber::deserialize(deserializer).map(StringOrNumber::into_string)
}

/// A `target` coordinate, or the `targetX` / `targetY` pair older configs
/// use for offensives. Always written back as `target`.
mod split_target {
    use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

    use crate::coords::Coordinate;

    #[derive(Deserialize)]
    struct Split {
        target: Option<Coordinate>,
        #[serde(rename = "targetX")]
        target_x: Option<i32>,
        #[serde(rename = "targetY")]
        target_y: Option<i32>,
    }

    #[derive(Serialize)]
    struct Joined<'a> {
        target: &'a Coordinate,
    }

    pub fn serialize<S: Serializer>(target: &Coordinate, serializer: S) -> Result<S::Ok, S::Error> {
        Joined { target }.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Coordinate, D::Error> {
        match Split::deserialize(deserializer)? {
            Split {
                target: Some(target),
                ..
            } => Ok(target),
            Split {
                target_x: Some(x),
                target_y: Some(y),
                ..
            } => Ok(Coordinate::new(x, y)),
            _ => Err(de::Error::missing_field("target")),
        }
    }
}

/// Festival size. The game knows two; anything else falls back to small.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FestivalVariant {
    #[default]
    Small,
    Large,
}

impl FestivalVariant {
    /// Value of the game's `do=` parameter.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Small => 1,
            Self::Large => 2,
        }
    }

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Large => "large",
        }
    }
}

impl<'de> Deserialize<'de> for FestivalVariant {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = string_or_number(deserializer)?;
        Ok(match raw.trim() {
            "2" | "large" => Self::Large,
            _ => Self::Small,
        })
    }
}

/// Work a village performs every cycle, in configured order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Task {
    #[serde(alias = "balanceResources")]
    BalanceResources,
    #[serde(alias = "createTroops")]
    TrainTroops {
        #[serde(alias = "troopType")]
        unit_types: Vec<UnitType>,
        #[serde(default = "Task::default_batch")]
        batch: u32,
    },
    #[serde(alias = "processTroopConfig")]
    SendConfiguredTroops,
    #[serde(alias = "upgradeResourceField")]
    UpgradeField {
        #[serde(default)]
        preference: Vec<FieldId>,
    },
    #[serde(alias = "sendResources")]
    SendResources {
        #[serde(alias = "targetVillage")]
        target: Coordinate,
    },
    #[serde(alias = "sendOffensiveTroops")]
    SendOffensiveTroops {
        #[serde(flatten, with = "split_target")]
        target: Coordinate,
        #[serde(default = "Task::default_siege_cap")]
        siege_cap: u32,
    },
    #[serde(alias = "celebrateFestival")]
    CelebrateFestival {
        #[serde(default, alias = "tipo")]
        variant: FestivalVariant,
    },
    #[serde(alias = "attackOasis")]
    AttackFreeTargets {
        #[serde(default = "Task::default_raid_size")]
        raid_size: u32,
    },
}

impl Task {
    const fn default_batch() -> u32 {
        200
    }

    const fn default_siege_cap() -> u32 {
        100
    }

    const fn default_raid_size() -> u32 {
        2
    }

    /// Tasks that spend the resources a festival needs.
    #[must_use]
    pub const fn is_resource_consuming(&self) -> bool {
        matches!(
            self,
            Self::TrainTroops { .. } | Self::UpgradeField { .. } | Self::SendResources { .. }
        )
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::BalanceResources => "balance-resources",
            Self::TrainTroops { .. } => "train-troops",
            Self::SendConfiguredTroops => "send-configured-troops",
            Self::UpgradeField { .. } => "upgrade-field",
            Self::SendResources { .. } => "send-resources",
            Self::SendOffensiveTroops { .. } => "send-offensive-troops",
            Self::CelebrateFestival { .. } => "celebrate-festival",
            Self::AttackFreeTargets { .. } => "attack-free-targets",
        }
    }
}

/// One managed village.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Village {
    pub name: String,
    /// Id the game uses to switch the active village (`newdid`).
    #[serde(alias = "newdid", deserialize_with = "string_or_number")]
    pub reference: String,
    #[serde(alias = "ruta")]
    pub coordinate: Coordinate,
    #[serde(default, alias = "task")]
    pub tasks: Vec<Task>,
    /// Village that receives this village's resources when it is attacked.
    #[serde(default, alias = "fallback")]
    pub emergency_receiver: Option<String>,
}

impl Village {
    #[must_use]
    pub fn festival(&self) -> Option<FestivalVariant> {
        self.tasks.iter().find_map(|task| match task {
            Task::CelebrateFestival { variant } => Some(*variant),
            _ => None,
        })
    }
}

/// Area searched for free oases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    pub center: Coordinate,
    pub radius: u32,
    #[serde(default = "DiscoveryConfig::default_max_tiles")]
    pub max_tiles: usize,
}

impl DiscoveryConfig {
    const fn default_max_tiles() -> usize {
        50
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "BotConfig::default_login_path", alias = "loginUrl")]
    pub login_path: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(alias = "aldeas")]
    pub villages: Vec<Village>,
    #[serde(default)]
    pub discovery: Option<DiscoveryConfig>,
}

/// Errors raised when a configuration document is unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("village names must not be empty")]
    EmptyName,
    #[error("village {0:?} is configured more than once")]
    DuplicateVillage(String),
    #[error("village {village:?} names unknown emergency receiver {receiver:?}")]
    UnknownReceiver { village: String, receiver: String },
    #[error("village {0:?} cannot be its own emergency receiver")]
    SelfReceiver(String),
    #[error("village {0:?} trains troops without listing any unit types")]
    NoUnitTypes(String),
}

impl BotConfig {
    fn default_login_path() -> String {
        "/login.php".to_string()
    }

    /// Parses and validates a configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or violates a
    /// cross-village rule (see [`BotConfig::validate`]).
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the rules serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for village in &self.villages {
            if village.name.trim().is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if !seen.insert(village.name.as_str()) {
                return Err(ConfigError::DuplicateVillage(village.name.clone()));
            }
            let empty_training = village
                .tasks
                .iter()
                .any(|task| matches!(task, Task::TrainTroops { unit_types, .. } if unit_types.is_empty()));
            if empty_training {
                return Err(ConfigError::NoUnitTypes(village.name.clone()));
            }
        }

        for village in &self.villages {
            let Some(receiver) = village.emergency_receiver.as_deref() else {
                continue;
            };
            if receiver == village.name {
                return Err(ConfigError::SelfReceiver(village.name.clone()));
            }
            if self.village(receiver).is_none() {
                return Err(ConfigError::UnknownReceiver {
                    village: village.name.clone(),
                    receiver: receiver.to_string(),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn village(&self, name: &str) -> Option<&Village> {
        self.villages.iter().find(|village| village.name == name)
    }

    /// Coordinate resources are evacuated to when `village` is attacked.
    #[must_use]
    pub fn emergency_target(&self, village: &Village) -> Option<Coordinate> {
        village
            .emergency_receiver
            .as_deref()
            .and_then(|name| self.village(name))
            .map(|receiver| receiver.coordinate)
    }
}

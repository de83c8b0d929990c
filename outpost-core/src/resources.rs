//! The four village resources and quantity bundles over them.
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Wood,
    Clay,
    Iron,
    Crop,
}

impl Resource {
    /// Canonical order. Tie-breaks and carrier filling both follow it.
    pub const ALL: [Self; 4] = [Self::Wood, Self::Clay, Self::Iron, Self::Crop];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Wood => "wood",
            Self::Clay => "clay",
            Self::Iron => "iron",
            Self::Crop => "crop",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Quantities of each resource, e.g. a warehouse stock or a shipment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAmounts {
    #[serde(default)]
    pub wood: u64,
    #[serde(default)]
    pub clay: u64,
    #[serde(default)]
    pub iron: u64,
    #[serde(default)]
    pub crop: u64,
}

impl ResourceAmounts {
    #[must_use]
    pub const fn new(wood: u64, clay: u64, iron: u64, crop: u64) -> Self {
        Self {
            wood,
            clay,
            iron,
            crop,
        }
    }

    #[must_use]
    pub const fn get(&self, resource: Resource) -> u64 {
        match resource {
            Resource::Wood => self.wood,
            Resource::Clay => self.clay,
            Resource::Iron => self.iron,
            Resource::Crop => self.crop,
        }
    }

    pub fn set(&mut self, resource: Resource, amount: u64) {
        match resource {
            Resource::Wood => self.wood = amount,
            Resource::Clay => self.clay = amount,
            Resource::Iron => self.iron = amount,
            Resource::Crop => self.crop = amount,
        }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        Resource::ALL
            .iter()
            .map(|resource| self.get(*resource))
            .fold(0u64, u64::saturating_add)
    }

    /// Values in canonical order.
    #[must_use]
    pub const fn to_array(&self) -> [u64; 4] {
        [self.wood, self.clay, self.iron, self.crop]
    }
}

impl From<[u64; 4]> for ResourceAmounts {
    fn from([wood, clay, iron, crop]: [u64; 4]) -> Self {
        Self::new(wood, clay, iron, crop)
    }
}

impl fmt::Display for ResourceAmounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "wood {} clay {} iron {} crop {}",
            self.wood, self.clay, self.iron, self.crop
        )
    }
}

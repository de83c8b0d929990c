//! Geometry and bookkeeping for the daily free-oasis scan.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::coords::Coordinate;

/// The world map spans `-MAP_RADIUS..=MAP_RADIUS` on both axes.
pub const MAP_RADIUS: i32 = 200;

/// Tiles in the square of `radius` around `center`, nearest first.
///
/// Tiles off the map are dropped. Equal distances keep x-major scan order.
#[must_use]
pub fn surrounding_coordinates(center: Coordinate, radius: u32) -> Vec<Coordinate> {
    let radius = i32::try_from(radius).unwrap_or(MAP_RADIUS).min(2 * MAP_RADIUS);
    let mut tiles = Vec::new();
    for x in center.x - radius..=center.x + radius {
        for y in center.y - radius..=center.y + radius {
            if (-MAP_RADIUS..=MAP_RADIUS).contains(&x) && (-MAP_RADIUS..=MAP_RADIUS).contains(&y) {
                tiles.push(Coordinate::new(x, y));
            }
        }
    }
    tiles.sort_by_key(|tile| center.distance_squared(*tile));
    tiles
}

/// Persisted progress of the oasis scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryLog {
    #[serde(default)]
    pub last_run: Option<NaiveDate>,
    #[serde(default)]
    pub scanned: BTreeSet<Coordinate>,
}

impl DiscoveryLog {
    /// Discovery runs at most once per calendar day.
    #[must_use]
    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.last_run != Some(today)
    }

    pub fn mark_run(&mut self, today: NaiveDate) {
        self.last_run = Some(today);
    }

    /// Remembers a tile; returns false if it had been scanned before.
    pub fn mark_scanned(&mut self, tile: Coordinate) -> bool {
        self.scanned.insert(tile)
    }

    #[must_use]
    pub fn was_scanned(&self, tile: Coordinate) -> bool {
        self.scanned.contains(&tile)
    }
}

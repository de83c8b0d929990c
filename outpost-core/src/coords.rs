//! Map coordinates shared by configuration, targets, timers and the denylist.
use serde::{Deserialize, Serialize};
use std::fmt;

/// A position on the world map.
///
/// Accepts both `[x, y]` and `{ "x": .., "y": .. }` on input and always
/// writes the `[x, y]` form, so every file the bot touches agrees on one
/// shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "CoordinateRepr", into = "[i32; 2]")]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
}

impl Coordinate {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance; ordering-equivalent to the real distance
    /// without leaving integer arithmetic.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> i64 {
        let dx = i64::from(other.x) - i64::from(self.x);
        let dy = i64::from(other.y) - i64::from(self.y);
        dx * dx + dy * dy
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}|{}]", self.x, self.y)
    }
}

impl From<Coordinate> for [i32; 2] {
    fn from(value: Coordinate) -> Self {
        [value.x, value.y]
    }
}

impl From<[i32; 2]> for Coordinate {
    fn from([x, y]: [i32; 2]) -> Self {
        Self { x, y }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CoordinateRepr {
    Pair([i32; 2]),
    Named { x: i32, y: i32 },
}

impl From<CoordinateRepr> for Coordinate {
    fn from(value: CoordinateRepr) -> Self {
        match value {
            CoordinateRepr::Pair(pair) => pair.into(),
            CoordinateRepr::Named { x, y } => Self { x, y },
        }
    }
}

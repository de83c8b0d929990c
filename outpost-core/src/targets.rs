//! Read-only target feeds produced by the discovery side of the bot.
use serde::{Deserialize, Serialize};

use crate::coords::Coordinate;

/// A village or site worth raiding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetCandidate {
    #[serde(alias = "targetMapId")]
    pub coordinate: Coordinate,
    /// Population for inactive villages; zero when unknown.
    #[serde(default, alias = "strength")]
    pub population: u32,
    #[serde(default)]
    pub player: Option<String>,
    /// Managed villages allowed to raid this target.
    #[serde(default, alias = "aldeas")]
    pub source_entities: Vec<String>,
}

impl TargetCandidate {
    #[must_use]
    pub fn eligible_for(&self, village: &str) -> bool {
        self.source_entities.iter().any(|name| name == village)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct OasisFile {
    #[serde(default)]
    oasis: Vec<Coordinate>,
}

/// Everything the scheduler may target during one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetFeed {
    /// Inactive villages, raided by `SendConfiguredTroops`.
    pub inactive: Vec<TargetCandidate>,
    /// Free oases, raided by `AttackFreeTargets`.
    pub oases: Vec<Coordinate>,
}

impl TargetFeed {
    /// Parses an inactive-village list.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a list of candidates.
    pub fn parse_inactive(json: &str) -> Result<Vec<TargetCandidate>, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Parses an `{"oasis": [...]}` document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not have that shape.
    pub fn parse_oases(json: &str) -> Result<Vec<Coordinate>, serde_json::Error> {
        serde_json::from_str::<OasisFile>(json).map(|file| file.oasis)
    }

    /// Serializes oases in the same shape [`TargetFeed::parse_oases`] reads.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn oases_to_json(oases: &[Coordinate]) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&OasisFile {
            oasis: oases.to_vec(),
        })
    }

    /// Inactive villages `village` is allowed to raid, in feed order.
    pub fn inactive_for<'a>(&'a self, village: &'a str) -> impl Iterator<Item = &'a TargetCandidate> + 'a {
        self.inactive
            .iter()
            .filter(move |candidate| candidate.eligible_for(village))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scraped_inactive_list() {
        let json = r#"[
            {"targetMapId": [12, 3], "population": 45, "player": "idle", "aldeas": ["North"]},
            {"coordinate": {"x": 1, "y": 1}, "strength": 8, "source_entities": ["South"]}
        ]"#;
        let inactive = TargetFeed::parse_inactive(json).unwrap();
        let feed = TargetFeed {
            inactive,
            oases: Vec::new(),
        };
        let north: Vec<_> = feed.inactive_for("North").collect();
        assert_eq!(north.len(), 1);
        assert_eq!(north[0].coordinate, Coordinate::new(12, 3));
        assert_eq!(north[0].population, 45);
        assert_eq!(feed.inactive_for("Nowhere").count(), 0);
    }

    #[test]
    fn oasis_documents_round_trip() {
        let json = r#"{"oasis": [{"x": 4, "y": -2}, [7, 7]]}"#;
        let oases = TargetFeed::parse_oases(json).unwrap();
        assert_eq!(oases, vec![Coordinate::new(4, -2), Coordinate::new(7, 7)]);
        let written = TargetFeed::oases_to_json(&oases).unwrap();
        assert_eq!(TargetFeed::parse_oases(&written).unwrap(), oases);
        assert!(TargetFeed::parse_oases("{}").unwrap().is_empty());
    }
}

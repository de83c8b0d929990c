//! Scripted executor and clock for scheduler and run loop tests.
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use outpost_core::{
    BotConfig, Coordinate, FieldId, FieldSlot, ResourceAmounts, TroopCounts, Village,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use crate::executor::{
    Action, ActionExecutor, ActionResult, ExecutorError, IncomingAttack, Marketplace,
    OasisStatus, RallyPoint,
};
use crate::scheduler::Clock;

pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new() -> Self {
        Self(Mutex::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()))
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

pub fn attack() -> IncomingAttack {
    IncomingAttack {
        count: "1".into(),
        arrives_in: "0:14:00".into(),
    }
}

/// Answers probes from fixed data and `execute` from a queue, falling back
/// to success with `duration`.
pub struct ScriptedExecutor {
    pub attacks: VecDeque<Vec<IncomingAttack>>,
    pub hero: ResourceAmounts,
    pub market: Result<Marketplace, ExecutorError>,
    pub troops: TroopCounts,
    pub rally_errors: HashMap<Coordinate, ExecutorError>,
    pub fields: Vec<FieldSlot>,
    pub oases: HashMap<Coordinate, OasisStatus>,
    pub free_tiles: HashSet<Coordinate>,
    pub results: VecDeque<ActionResult>,
    pub duration: String,
    pub fail_switch: bool,
    pub fail_login: bool,
    pub executed: Vec<Action>,
    pub rally_probes: Vec<Coordinate>,
    pub inspected_tiles: Vec<Coordinate>,
    pub switched: Vec<String>,
}

impl Default for ScriptedExecutor {
    fn default() -> Self {
        Self {
            attacks: VecDeque::new(),
            hero: ResourceAmounts::new(500, 500, 500, 500),
            market: Ok(Marketplace {
                capacity: 500,
                available_carriers: 3,
                stock: ResourceAmounts::new(400, 400, 400, 400),
            }),
            troops: TroopCounts::new(),
            rally_errors: HashMap::new(),
            fields: vec![
                FieldSlot {
                    id: FieldId(1),
                    level: Some(2),
                },
                FieldSlot {
                    id: FieldId(2),
                    level: Some(1),
                },
            ],
            oases: HashMap::new(),
            free_tiles: HashSet::new(),
            results: VecDeque::new(),
            duration: "0:10:00".into(),
            fail_switch: false,
            fail_login: false,
            executed: Vec::new(),
            rally_probes: Vec::new(),
            inspected_tiles: Vec::new(),
            switched: Vec::new(),
        }
    }
}

impl ScriptedExecutor {
    pub fn sent_troops(&self) -> Vec<(Coordinate, TroopCounts)> {
        self.executed
            .iter()
            .filter_map(|action| match action {
                Action::SendTroops { target, troops } => Some((*target, troops.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn shipments(&self) -> Vec<(Coordinate, ResourceAmounts)> {
        self.executed
            .iter()
            .filter_map(|action| match action {
                Action::SendResources { target, amounts } => Some((*target, *amounts)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ActionExecutor for ScriptedExecutor {
    async fn begin_cycle(&mut self, _config: &BotConfig) -> Result<(), ExecutorError> {
        if self.fail_login {
            return Err(ExecutorError::Transient("login page did not load".into()));
        }
        Ok(())
    }

    async fn switch_context(&mut self, village: &Village) -> Result<(), ExecutorError> {
        if self.fail_switch {
            return Err(ExecutorError::Transient("village list missing".into()));
        }
        self.switched.push(village.name.clone());
        Ok(())
    }

    async fn incoming_attacks(&mut self) -> Result<Vec<IncomingAttack>, ExecutorError> {
        Ok(self.attacks.pop_front().unwrap_or_default())
    }

    async fn hero_resources(&mut self) -> Result<ResourceAmounts, ExecutorError> {
        Ok(self.hero)
    }

    async fn marketplace(&mut self, _target: Coordinate) -> Result<Marketplace, ExecutorError> {
        self.market.clone()
    }

    async fn rally_point(&mut self, target: Coordinate) -> Result<RallyPoint, ExecutorError> {
        self.rally_probes.push(target);
        if let Some(err) = self.rally_errors.get(&target) {
            return Err(err.clone());
        }
        Ok(RallyPoint {
            available: self.troops.clone(),
        })
    }

    async fn resource_fields(
        &mut self,
        _preference: &[FieldId],
    ) -> Result<Vec<FieldSlot>, ExecutorError> {
        Ok(self.fields.clone())
    }

    async fn inspect_oasis(&mut self, target: Coordinate) -> Result<OasisStatus, ExecutorError> {
        Ok(self
            .oases
            .get(&target)
            .cloned()
            .unwrap_or(OasisStatus::Free))
    }

    async fn inspect_tile(&mut self, tile: Coordinate) -> Result<bool, ExecutorError> {
        self.inspected_tiles.push(tile);
        Ok(self.free_tiles.contains(&tile))
    }

    async fn execute(&mut self, action: &Action) -> ActionResult {
        self.executed.push(action.clone());
        self.results
            .pop_front()
            .unwrap_or_else(|| ActionResult::Success {
                extracted_duration: Some(self.duration.clone()),
            })
    }
}

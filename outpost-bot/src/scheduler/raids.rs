//! Troop movements: raids on inactive villages and free oases, offensives.
use anyhow::Result;
use log::{info, warn};
use outpost_core::{
    ActionKind, Coordinate, StateStore, TimerKey, TroopCounts, Village, plan_offensive,
    select_raid_unit, troop_amount_for_population,
};

use super::{EntityReport, EntityScheduler, Settled, VillageState};
use crate::executor::{Action, ActionExecutor, OasisStatus};

impl<E, S> EntityScheduler<'_, E, S>
where
    E: ActionExecutor + ?Sized,
    S: StateStore,
{
    /// Raids every inactive village this village may target, sized by the
    /// target's population.
    pub(super) async fn raid_inactive(
        &mut self,
        village: &Village,
        state: &mut VillageState,
        report: &mut EntityReport,
    ) -> Result<()> {
        let feed = self.feed;
        for candidate in feed.inactive_for(&village.name) {
            let target = candidate.coordinate;
            let key = TimerKey::target(ActionKind::Raid, target);
            if !self.target_cleared(village, target, &key, &state.travel, report) {
                continue;
            }
            let required = troop_amount_for_population(candidate.population);
            if self
                .send_raid(village, target, &key, required, state, report)
                .await?
                == Settled::Exhausted
            {
                info!("{}: stopping inactive raids for this cycle", village.name);
                break;
            }
        }
        Ok(())
    }

    /// Raids free oases with a fixed number of units. Oases with animals are
    /// left alone without being denylisted.
    pub(super) async fn raid_oases(
        &mut self,
        village: &Village,
        raid_size: u32,
        state: &mut VillageState,
        report: &mut EntityReport,
    ) -> Result<()> {
        let feed = self.feed;
        for &target in &feed.oases {
            let key = TimerKey::target(ActionKind::Raid, target);
            if !self.target_cleared(village, target, &key, &state.travel, report) {
                continue;
            }
            match self.executor.inspect_oasis(target).await {
                Ok(OasisStatus::Free) => {}
                Ok(OasisStatus::Occupied) => {
                    info!("{}: oasis {target} has animals, skipping", village.name);
                    report.skipped += 1;
                    continue;
                }
                Ok(OasisStatus::Invalid { reason }) => {
                    info!("{}: skipping {target}: {reason}", village.name);
                    report.skipped += 1;
                    continue;
                }
                Err(err) => {
                    self.record_failure(
                        report,
                        format!("{}: inspecting oasis {target}: {err}", village.name),
                    )?;
                    continue;
                }
            }
            if self
                .send_raid(village, target, &key, raid_size, state, report)
                .await?
                == Settled::Exhausted
            {
                info!("{}: stopping oasis raids for this cycle", village.name);
                break;
            }
        }
        Ok(())
    }

    /// Rally point protocol shared by both raid tasks. Returns
    /// [`Settled::Exhausted`] when no unit type has `required` units home.
    async fn send_raid(
        &mut self,
        village: &Village,
        target: Coordinate,
        key: &TimerKey,
        required: u32,
        state: &mut VillageState,
        report: &mut EntityReport,
    ) -> Result<Settled> {
        let rally = match self.executor.rally_point(target).await {
            Ok(rally) => rally,
            Err(err) => return self.settle_target(village, target, key, err.into(), state, report),
        };
        let Some(unit) = select_raid_unit(&rally.available, required) else {
            info!(
                "{}: no unit type has {required} units home for {target}",
                village.name
            );
            return Ok(Settled::Exhausted);
        };
        let action = Action::SendTroops {
            target,
            troops: TroopCounts::new().with(unit, required),
        };
        info!("⚔️  {}: {action}", village.name);
        let result = self.executor.execute(&action).await;
        self.settle_target(village, target, key, result, state, report)
    }

    /// Sends every offensive unit at `target`, then escorted follow-up waves
    /// for siege units beyond `siege_cap`.
    pub(super) async fn send_offensive(
        &mut self,
        village: &Village,
        target: Coordinate,
        siege_cap: u32,
        state: &mut VillageState,
        report: &mut EntityReport,
    ) -> Result<()> {
        let key = TimerKey::target(ActionKind::Attack, target);
        if !self.target_cleared(village, target, &key, &state.travel, report) {
            return Ok(());
        }
        let rally = match self.executor.rally_point(target).await {
            Ok(rally) => rally,
            Err(err) => {
                self.settle_target(village, target, &key, err.into(), state, report)?;
                return Ok(());
            }
        };

        let plan = plan_offensive(&rally.available, siege_cap);
        if plan.is_empty() {
            info!("{}: no offensive units home for {target}", village.name);
            report.skipped += 1;
            return Ok(());
        }
        if plan.abandoned_siege > 0 {
            warn!(
                "{}: {} siege units stay home, not enough escort",
                village.name, plan.abandoned_siege
            );
        }

        let waves = (!plan.main_wave.is_empty())
            .then_some(plan.main_wave)
            .into_iter()
            .chain(plan.follow_ups);
        for troops in waves {
            let action = Action::SendTroops { target, troops };
            info!("🔥 {}: {action}", village.name);
            let result = self.executor.execute(&action).await;
            if self.settle_target(village, target, &key, result, state, report)?
                != Settled::Dispatched
            {
                info!("{}: holding back remaining waves on {target}", village.name);
                break;
            }
        }
        Ok(())
    }
}

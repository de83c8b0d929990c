//! Economy tasks: hero production, training, upgrades, shipments and
//! festivals.
use anyhow::Result;
use log::info;
use outpost_core::{
    ActionKind, Coordinate, CooldownPolicy, FestivalVariant, FieldId, StateStore, TimerKey,
    TimerRecord, UnitType, Village, least_resource, lowest_level_field, pack_carriers,
};

use super::{EntityReport, EntityScheduler, Settled, VillageState};
use crate::executor::{Action, ActionExecutor, ActionResult};

impl<E, S> EntityScheduler<'_, E, S>
where
    E: ActionExecutor + ?Sized,
    S: StateStore,
{
    /// Points hero production at the scarcest resource.
    pub(super) async fn balance_resources(
        &mut self,
        village: &Village,
        report: &mut EntityReport,
    ) -> Result<()> {
        let stock = match self.executor.hero_resources().await {
            Ok(stock) => stock,
            Err(err) => {
                self.settle_local(village, "read hero resources", err.into(), report)?;
                return Ok(());
            }
        };
        let resource = least_resource(&stock);
        let action = Action::SelectHeroProduction { resource };
        let result = self.executor.execute(&action).await;
        self.settle_local(village, &action.to_string(), result, report)?;
        Ok(())
    }

    pub(super) async fn train_troops(
        &mut self,
        village: &Village,
        unit_types: &[UnitType],
        batch: u32,
        report: &mut EntityReport,
    ) -> Result<()> {
        for &unit in unit_types {
            let action = Action::Train { unit, count: batch };
            let result = self.executor.execute(&action).await;
            if self.settle_local(village, &action.to_string(), result, report)? == Settled::Exhausted
            {
                break;
            }
        }
        Ok(())
    }

    /// Upgrades the lowest field unless a build is still running.
    pub(super) async fn upgrade_field(
        &mut self,
        village: &Village,
        preference: &[FieldId],
        state: &mut VillageState,
        report: &mut EntityReport,
    ) -> Result<()> {
        let now = self.clock.now();
        if state
            .construction
            .any_pending(ActionKind::Build, CooldownPolicy::CONSTRUCTION, now)
        {
            info!("{}: a build is still in progress", village.name);
            report.skipped += 1;
            return Ok(());
        }

        let fields = match self.executor.resource_fields(preference).await {
            Ok(fields) => fields,
            Err(err) => {
                self.settle_local(village, "read resource fields", err.into(), report)?;
                return Ok(());
            }
        };
        let Some(slot) = lowest_level_field(&fields, preference) else {
            info!("{}: nothing to upgrade right now", village.name);
            report.skipped += 1;
            return Ok(());
        };

        let action = Action::UpgradeField { field: slot.id };
        let result = self.executor.execute(&action).await;
        let duration = match &result {
            ActionResult::Success { extracted_duration } => extracted_duration.clone(),
            _ => None,
        };
        if self.settle_local(village, &action.to_string(), result, report)? == Settled::Dispatched {
            let key = TimerKey::new(ActionKind::Build, slot.id.to_string());
            state.construction.set(
                &key,
                TimerRecord::new(self.clock.now(), duration.unwrap_or_default()),
            );
            self.save_construction(village, state)?;
        }
        Ok(())
    }

    /// Ships as many full merchants as the stock allows to `target`.
    pub(super) async fn send_resources(
        &mut self,
        village: &Village,
        target: Coordinate,
        state: &mut VillageState,
        report: &mut EntityReport,
    ) -> Result<()> {
        let key = TimerKey::target(ActionKind::Trade, target);
        if !self.target_cleared(village, target, &key, &state.travel, report) {
            return Ok(());
        }
        let market = match self.executor.marketplace(target).await {
            Ok(market) => market,
            Err(err) => {
                self.settle_target(village, target, &key, err.into(), state, report)?;
                return Ok(());
            }
        };
        let plan = match pack_carriers(&market.stock, market.capacity, market.available_carriers) {
            Ok(plan) => plan,
            Err(reason) => {
                info!("{}: not shipping to {target}: {reason}", village.name);
                report.skipped += 1;
                return Ok(());
            }
        };
        let action = Action::SendResources {
            target,
            amounts: plan.amounts,
        };
        info!(
            "🐪 {}: {action} with {} merchants",
            village.name, plan.carriers
        );
        let result = self.executor.execute(&action).await;
        self.settle_target(village, target, &key, result, state, report)?;
        Ok(())
    }

    /// Evacuates resources to `receiver` ahead of an attack. Ignores the
    /// festival gate, cooldowns and the denylist, and records no timer.
    pub(super) async fn emergency_transfer(
        &mut self,
        village: &Village,
        receiver: Coordinate,
        report: &mut EntityReport,
    ) -> Result<()> {
        let market = match self.executor.marketplace(receiver).await {
            Ok(market) => market,
            Err(err) => {
                self.settle_local(village, "read marketplace for evacuation", err.into(), report)?;
                return Ok(());
            }
        };
        let plan = match pack_carriers(&market.stock, market.capacity, market.available_carriers) {
            Ok(plan) => plan,
            Err(reason) => {
                info!("{}: cannot evacuate to {receiver}: {reason}", village.name);
                return Ok(());
            }
        };
        let action = Action::SendResources {
            target: receiver,
            amounts: plan.amounts,
        };
        info!("🚨 {}: evacuating, {action}", village.name);
        let result = self.executor.execute(&action).await;
        if self.settle_local(village, &action.to_string(), result, report)? == Settled::Dispatched {
            report.emergency_transfers += 1;
        }
        Ok(())
    }

    /// Tries to start the configured festival. Returns whether one is running:
    /// either this attempt succeeded or an earlier festival's timer is still
    /// pending.
    pub(super) async fn start_festival(
        &mut self,
        village: &Village,
        variant: FestivalVariant,
        state: &mut VillageState,
        report: &mut EntityReport,
    ) -> Result<bool> {
        let action = Action::StartFestival { variant };
        let result = self.executor.execute(&action).await;
        let duration = match &result {
            ActionResult::Success { extracted_duration } => extracted_duration.clone(),
            _ => None,
        };
        if self.settle_local(village, &action.to_string(), result, report)? != Settled::Dispatched {
            let running = state.construction.any_pending(
                ActionKind::Festival,
                CooldownPolicy::CONSTRUCTION,
                self.clock.now(),
            );
            if running {
                info!("{}: earlier festival still running", village.name);
            }
            return Ok(running);
        }
        if let Some(duration) = duration {
            let key = TimerKey::new(ActionKind::Festival, variant.key());
            state
                .construction
                .set(&key, TimerRecord::new(self.clock.now(), duration));
            self.save_construction(village, state)?;
        }
        Ok(true)
    }
}

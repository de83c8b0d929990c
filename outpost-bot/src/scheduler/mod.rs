//! Per-village scheduling: gates, task dispatch and result bookkeeping.
//!
//! A cycle visits every configured village in order. For each one the
//! scheduler switches context, tries to start the configured festival and
//! then walks the task list, probing for incoming attacks before every task.
//! Timer and denylist changes are written through to the [`StateStore`] as
//! soon as they happen.
mod economy;
mod raids;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use outpost_core::{
    BotConfig, Coordinate, Denylist, ErrorRecord, StateStore, TargetFeed, Task,
    TimerKey, TimerRecord, TimerSet, TimerStore, Village, may_run,
};

use crate::executor::{ActionExecutor, ActionResult};

/// Source of the current instant, injectable for tests.
pub trait Clock: Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// What happened to one village during a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityReport {
    pub village: String,
    pub dispatched: u32,
    pub skipped: u32,
    pub denylisted: u32,
    pub failures: u32,
    pub attacks_detected: u32,
    pub emergency_transfers: u32,
    pub festival_active: bool,
}

impl EntityReport {
    fn new(village: &str) -> Self {
        Self {
            village: village.to_string(),
            ..Self::default()
        }
    }
}

/// Reports of every village visited in one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub villages: Vec<EntityReport>,
    pub oases_discovered: usize,
}

impl CycleSummary {
    #[must_use]
    pub fn dispatched(&self) -> u32 {
        self.villages.iter().map(|report| report.dispatched).sum()
    }

    #[must_use]
    pub fn failures(&self) -> u32 {
        self.villages.iter().map(|report| report.failures).sum()
    }
}

/// How an action or probe outcome was absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settled {
    Dispatched,
    Rejected,
    Exhausted,
    Failed,
}

/// Timers of the village currently being processed.
#[derive(Debug, Default)]
struct VillageState {
    travel: TimerStore,
    construction: TimerStore,
}

/// Runs the task lists of configured villages against an executor.
pub struct EntityScheduler<'a, E: ?Sized, S> {
    executor: &'a mut E,
    store: &'a mut S,
    clock: &'a dyn Clock,
    config: &'a BotConfig,
    feed: &'a TargetFeed,
    denylist: Denylist,
}

impl<'a, E, S> EntityScheduler<'a, E, S>
where
    E: ActionExecutor + ?Sized,
    S: StateStore,
{
    /// # Errors
    ///
    /// Returns an error if the denylist cannot be loaded.
    pub fn new(
        executor: &'a mut E,
        store: &'a mut S,
        clock: &'a dyn Clock,
        config: &'a BotConfig,
        feed: &'a TargetFeed,
    ) -> Result<Self> {
        let denylist = store.load_denylist().context("loading denylist")?;
        Ok(Self {
            executor,
            store,
            clock,
            config,
            feed,
            denylist,
        })
    }

    /// Processes one village.
    ///
    /// Task-level failures are logged and counted; only state persistence
    /// errors escape.
    ///
    /// # Errors
    ///
    /// Returns an error if timers, the denylist or the error log cannot be
    /// persisted.
    pub async fn run_village(&mut self, village: &Village) -> Result<EntityReport> {
        let mut report = EntityReport::new(&village.name);
        info!("🏰 processing {}", village.name);

        if let Err(err) = self.executor.switch_context(village).await {
            self.record_failure(&mut report, format!("switching to {}: {err}", village.name))?;
            return Ok(report);
        }

        let mut state = VillageState {
            travel: self
                .store
                .load_timers(&village.name, TimerSet::Travel)
                .with_context(|| format!("loading timers of {}", village.name))?,
            construction: self
                .store
                .load_timers(&village.name, TimerSet::Construction)
                .with_context(|| format!("loading construction timers of {}", village.name))?,
        };

        let festival = village.festival();
        if let Some(variant) = festival {
            report.festival_active = self
                .start_festival(village, variant, &mut state, &mut report)
                .await?;
        }
        let receiver = self.config.emergency_target(village);

        for task in &village.tasks {
            self.attack_gate(village, receiver, &mut report).await?;
            if task.is_resource_consuming() && festival.is_some() && !report.festival_active {
                info!(
                    "{}: {} waits until a festival is running",
                    village.name,
                    task.label()
                );
                report.skipped += 1;
                continue;
            }
            debug!("{}: running {}", village.name, task.label());
            self.run_task(village, task, &mut state, &mut report).await?;
        }

        Ok(report)
    }

    async fn run_task(
        &mut self,
        village: &Village,
        task: &Task,
        state: &mut VillageState,
        report: &mut EntityReport,
    ) -> Result<()> {
        match task {
            Task::BalanceResources => self.balance_resources(village, report).await,
            Task::TrainTroops { unit_types, batch } => {
                self.train_troops(village, unit_types, *batch, report).await
            }
            Task::SendConfiguredTroops => self.raid_inactive(village, state, report).await,
            Task::UpgradeField { preference } => {
                self.upgrade_field(village, preference, state, report).await
            }
            Task::SendResources { target } => {
                self.send_resources(village, *target, state, report).await
            }
            Task::SendOffensiveTroops { target, siege_cap } => {
                self.send_offensive(village, *target, *siege_cap, state, report)
                    .await
            }
            // started by the festival gate
            Task::CelebrateFestival { .. } => Ok(()),
            Task::AttackFreeTargets { raid_size } => {
                self.raid_oases(village, *raid_size, state, report).await
            }
        }
    }

    /// Evacuates resources once per check that sees incoming attacks.
    async fn attack_gate(
        &mut self,
        village: &Village,
        receiver: Option<Coordinate>,
        report: &mut EntityReport,
    ) -> Result<()> {
        let attacks = match self.executor.incoming_attacks().await {
            Ok(attacks) => attacks,
            Err(err) => {
                self.record_failure(
                    report,
                    format!("{}: checking for incoming attacks: {err}", village.name),
                )?;
                return Ok(());
            }
        };
        if attacks.is_empty() {
            return Ok(());
        }

        report.attacks_detected += 1;
        for attack in &attacks {
            warn!(
                "⚔️  {}: {} incoming, arriving in {}",
                village.name, attack.count, attack.arrives_in
            );
        }
        let Some(target) = receiver else {
            warn!(
                "{}: under attack but no emergency receiver is configured",
                village.name
            );
            return Ok(());
        };
        self.emergency_transfer(village, target, report).await
    }

    /// Whether `target` may be acted on: not denylisted and cooled down.
    fn target_cleared(
        &self,
        village: &Village,
        target: Coordinate,
        key: &TimerKey,
        timers: &TimerStore,
        report: &mut EntityReport,
    ) -> bool {
        if self.denylist.is_blocked(target) {
            debug!("{}: {target} is denylisted", village.name);
            report.skipped += 1;
            return false;
        }
        if !may_run(timers.get(key), self.clock.now()) {
            info!("{}: {key} still cooling down", village.name);
            report.skipped += 1;
            return false;
        }
        true
    }

    /// Books the outcome of an action aimed at `target`.
    ///
    /// Successes overwrite the travel timer under `key`; rejections go on the
    /// denylist.
    fn settle_target(
        &mut self,
        village: &Village,
        target: Coordinate,
        key: &TimerKey,
        result: ActionResult,
        state: &mut VillageState,
        report: &mut EntityReport,
    ) -> Result<Settled> {
        match result {
            ActionResult::Success { extracted_duration } => {
                let duration = extracted_duration.unwrap_or_default();
                info!(
                    "✅ {}: {key} dispatched, travel time {:?}",
                    village.name, duration
                );
                state
                    .travel
                    .set(key, TimerRecord::new(self.clock.now(), duration));
                self.store
                    .save_timers(&village.name, TimerSet::Travel, &state.travel)
                    .with_context(|| format!("saving timers of {}", village.name))?;
                report.dispatched += 1;
                Ok(Settled::Dispatched)
            }
            ActionResult::InvalidTarget { reason } => {
                self.deny(village, target, &reason, report)?;
                Ok(Settled::Rejected)
            }
            ActionResult::InsufficientResource => {
                info!("{}: not enough for {key}", village.name);
                Ok(Settled::Exhausted)
            }
            ActionResult::TransientFailure { error } => {
                self.record_failure(report, format!("{}: {key}: {error}", village.name))?;
                Ok(Settled::Failed)
            }
        }
    }

    /// Books the outcome of an action with no map target.
    fn settle_local(
        &mut self,
        village: &Village,
        what: &str,
        result: ActionResult,
        report: &mut EntityReport,
    ) -> Result<Settled> {
        match result {
            ActionResult::Success { .. } => {
                info!("✅ {}: {what}", village.name);
                report.dispatched += 1;
                Ok(Settled::Dispatched)
            }
            ActionResult::InvalidTarget { reason } => {
                warn!("{}: {what} rejected: {reason}", village.name);
                report.skipped += 1;
                Ok(Settled::Rejected)
            }
            ActionResult::InsufficientResource => {
                info!("{}: not enough resources to {what}", village.name);
                report.skipped += 1;
                Ok(Settled::Exhausted)
            }
            ActionResult::TransientFailure { error } => {
                self.record_failure(report, format!("{}: {what}: {error}", village.name))?;
                Ok(Settled::Failed)
            }
        }
    }

    fn deny(
        &mut self,
        village: &Village,
        target: Coordinate,
        reason: &str,
        report: &mut EntityReport,
    ) -> Result<()> {
        if self.denylist.record(target, reason, self.clock.now()) {
            warn!("🚫 {}: denylisting {target}: {reason}", village.name);
            self.store
                .save_denylist(&self.denylist)
                .context("saving denylist")?;
            report.denylisted += 1;
        }
        Ok(())
    }

    fn record_failure(&mut self, report: &mut EntityReport, message: String) -> Result<()> {
        error!("{message}");
        report.failures += 1;
        self.store
            .append_error(ErrorRecord::new(self.clock.now(), message))
            .context("appending to error log")
    }

    fn save_construction(&mut self, village: &Village, state: &VillageState) -> Result<()> {
        self.store
            .save_timers(&village.name, TimerSet::Construction, &state.construction)
            .with_context(|| format!("saving construction timers of {}", village.name))
    }
}

/// Runs every configured village once.
///
/// # Errors
///
/// Returns an error if the session cannot be started or state cannot be
/// persisted; the run loop treats either as a failed cycle.
pub async fn run_cycle<E, S>(
    executor: &mut E,
    store: &mut S,
    clock: &dyn Clock,
    config: &BotConfig,
    feed: &TargetFeed,
) -> Result<CycleSummary>
where
    E: ActionExecutor + ?Sized,
    S: StateStore,
{
    executor
        .begin_cycle(config)
        .await
        .context("starting game session")?;
    let mut scheduler = EntityScheduler::new(executor, store, clock, config, feed)?;
    let mut summary = CycleSummary::default();
    for village in &config.villages {
        summary.villages.push(scheduler.run_village(village).await?);
    }
    Ok(summary)
}

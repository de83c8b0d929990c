//! The outer loop: cycles, pauses, retries.
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use log::{error, info, warn};
use outpost_core::{BotConfig, ErrorRecord, StateStore};
use rand::Rng;
use std::path::PathBuf;
use std::time::Duration;

use crate::common::{artifacts_dir, print_cycle_summary};
use crate::discovery::scan_for_oases;
use crate::executor::ActionExecutor;
use crate::scheduler::{Clock, CycleSummary, SystemClock, run_cycle};
use crate::store::JsonStateStore;

pub const DEFAULT_MAX_FAILURES: u32 = 5;

/// Timing of the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSettings {
    pub min_pause: Duration,
    pub max_pause: Duration,
    pub retry_backoff: Duration,
    pub max_consecutive_failures: u32,
    /// Stop after this many attempts; `None` runs until the budget is spent.
    pub max_cycles: Option<u64>,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            min_pause: Duration::from_secs(60),
            max_pause: Duration::from_secs(300),
            retry_backoff: Duration::from_secs(50),
            max_consecutive_failures: DEFAULT_MAX_FAILURES,
            max_cycles: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { attempt: u32, backoff: Duration },
    GiveUp { failures: u32 },
}

/// Counts consecutive failed cycles. Only a successful cycle resets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryBudget {
    max_failures: u32,
    consecutive: u32,
    backoff: Duration,
}

impl RetryBudget {
    #[must_use]
    pub const fn new(max_failures: u32, backoff: Duration) -> Self {
        Self {
            max_failures,
            consecutive: 0,
            backoff,
        }
    }

    pub const fn record_success(&mut self) {
        self.consecutive = 0;
    }

    pub const fn record_failure(&mut self) -> RetryDecision {
        self.consecutive = self.consecutive.saturating_add(1);
        if self.consecutive >= self.max_failures {
            RetryDecision::GiveUp {
                failures: self.consecutive,
            }
        } else {
            RetryDecision::Retry {
                attempt: self.consecutive,
                backoff: self.backoff,
            }
        }
    }

    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive
    }
}

/// How the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// `max_cycles` reached. `failing` is set when the last cycle failed.
    Finished { cycles: u64, failing: bool },
    GaveUp { failures: u32 },
}

/// Random pause in `[min, max]`, millisecond resolution.
pub fn pause_between<R: Rng>(rng: &mut R, min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let low = u64::try_from(min.as_millis()).unwrap_or(u64::MAX);
    let high = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(rng.gen_range(low..=high))
}

/// One cycle of work plus what to do when it fails.
#[async_trait]
pub trait CycleRunner: Send {
    async fn run_cycle(&mut self) -> Result<CycleSummary>;

    async fn on_failure(&mut self, _err: &anyhow::Error) {}
}

/// Runs cycles until `max_cycles` or the retry budget is exhausted.
pub async fn run_loop<R, G>(runner: &mut R, settings: &LoopSettings, rng: &mut G) -> LoopExit
where
    R: CycleRunner + ?Sized,
    G: Rng,
{
    let mut budget = RetryBudget::new(settings.max_consecutive_failures, settings.retry_backoff);
    let mut cycles: u64 = 0;
    loop {
        cycles += 1;
        let wait = match runner.run_cycle().await {
            Ok(summary) => {
                budget.record_success();
                print_cycle_summary(cycles, &summary);
                if settings.max_cycles.is_some_and(|max| cycles >= max) {
                    return LoopExit::Finished {
                        cycles,
                        failing: false,
                    };
                }
                pause_between(rng, settings.min_pause, settings.max_pause)
            }
            Err(err) => {
                error!("❌ cycle {cycles} failed: {err:#}");
                runner.on_failure(&err).await;
                match budget.record_failure() {
                    RetryDecision::GiveUp { failures } => {
                        error!("giving up after {failures} consecutive failed cycles");
                        return LoopExit::GaveUp { failures };
                    }
                    RetryDecision::Retry { attempt, backoff } => {
                        if settings.max_cycles.is_some_and(|max| cycles >= max) {
                            return LoopExit::Finished {
                                cycles,
                                failing: true,
                            };
                        }
                        warn!(
                            "{attempt} failed cycle(s) in a row, retrying in {}s",
                            backoff.as_secs()
                        );
                        backoff
                    }
                }
            }
        };
        info!("💤 next cycle in {}s", wait.as_secs());
        tokio::time::sleep(wait).await;
    }
}

/// Credentials from the environment, applied over the config file.
#[derive(Debug, Clone, Default)]
pub struct CredentialOverrides {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Reads and validates the configuration file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid config.
pub fn load_config(path: &std::path::Path, overrides: &CredentialOverrides) -> Result<BotConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let mut config = BotConfig::from_json(&text)
        .with_context(|| format!("parsing config {}", path.display()))?;
    if let Some(username) = &overrides.username {
        config.username.clone_from(username);
    }
    if let Some(password) = &overrides.password {
        config.password.clone_from(password);
    }
    Ok(config)
}

/// Production cycle: reload config, read feeds, visit villages, scan for
/// oases.
pub struct BotRunner<E> {
    executor: E,
    store: JsonStateStore,
    clock: SystemClock,
    config_path: PathBuf,
    overrides: CredentialOverrides,
    artifacts_base: PathBuf,
}

impl<E: ActionExecutor> BotRunner<E> {
    pub fn new(
        executor: E,
        store: JsonStateStore,
        config_path: PathBuf,
        overrides: CredentialOverrides,
        artifacts_base: PathBuf,
    ) -> Self {
        Self {
            executor,
            store,
            clock: SystemClock,
            config_path,
            overrides,
            artifacts_base,
        }
    }

    pub fn into_executor(self) -> E {
        self.executor
    }

    async fn discover(&mut self, config: &BotConfig) -> Result<usize> {
        let Some(settings) = &config.discovery else {
            return Ok(0);
        };
        let mut log = self.store.load_discovery().context("loading discovery log")?;
        let today = self.clock.now().date_naive();
        if !log.is_due(today) {
            return Ok(0);
        }
        let known = self.store.load_feed().context("loading target feeds")?.oases;
        let run = scan_for_oases(&mut self.executor, &mut log, settings, &known, today).await;
        self.store
            .save_discovery(&log)
            .context("saving discovery log")?;
        let added = self
            .store
            .append_oases(&run.found)
            .context("saving discovered oases")?;
        Ok(added)
    }
}

#[async_trait]
impl<E: ActionExecutor> CycleRunner for BotRunner<E> {
    async fn run_cycle(&mut self) -> Result<CycleSummary> {
        let config = load_config(&self.config_path, &self.overrides)?;
        let feed = self.store.load_feed().context("loading target feeds")?;
        let mut summary = run_cycle(
            &mut self.executor,
            &mut self.store,
            &self.clock,
            &config,
            &feed,
        )
        .await?;
        summary.oases_discovered = self.discover(&config).await?;
        Ok(summary)
    }

    async fn on_failure(&mut self, err: &anyhow::Error) {
        let chain = format!("{err:#}");
        if let Err(log_err) = self.store.append_error(ErrorRecord::new(Utc::now(), chain.clone())) {
            warn!("could not append to error log: {log_err}");
        }
        let dir = artifacts_dir(&self.artifacts_base, "cycle");
        match self.executor.capture_diagnostics(&dir, &chain).await {
            Ok(()) => info!("artifacts written to {}", dir.display()),
            Err(capture_err) => warn!("could not capture artifacts: {capture_err:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::VecDeque;

    struct Scripted {
        outcomes: VecDeque<bool>,
        attempts: u32,
        failures_seen: u32,
    }

    impl Scripted {
        fn new(outcomes: &[bool]) -> Self {
            Self {
                outcomes: outcomes.iter().copied().collect(),
                attempts: 0,
                failures_seen: 0,
            }
        }
    }

    #[async_trait]
    impl CycleRunner for Scripted {
        async fn run_cycle(&mut self) -> Result<CycleSummary> {
            self.attempts += 1;
            if self.outcomes.pop_front().unwrap_or(false) {
                Ok(CycleSummary::default())
            } else {
                Err(anyhow!("page did not load"))
            }
        }

        async fn on_failure(&mut self, _err: &anyhow::Error) {
            self.failures_seen += 1;
        }
    }

    fn instant_settings(max_cycles: Option<u64>) -> LoopSettings {
        LoopSettings {
            min_pause: Duration::ZERO,
            max_pause: Duration::ZERO,
            retry_backoff: Duration::ZERO,
            max_consecutive_failures: 5,
            max_cycles,
        }
    }

    #[test]
    fn budget_gives_up_on_fifth_consecutive_failure() {
        let mut budget = RetryBudget::new(5, Duration::from_secs(50));
        for attempt in 1..5 {
            assert_eq!(
                budget.record_failure(),
                RetryDecision::Retry {
                    attempt,
                    backoff: Duration::from_secs(50)
                }
            );
        }
        assert_eq!(
            budget.record_failure(),
            RetryDecision::GiveUp { failures: 5 }
        );
    }

    #[test]
    fn budget_resets_only_on_success() {
        let mut budget = RetryBudget::new(5, Duration::ZERO);
        budget.record_failure();
        budget.record_failure();
        assert_eq!(budget.consecutive_failures(), 2);
        budget.record_success();
        assert_eq!(budget.consecutive_failures(), 0);
    }

    #[test]
    fn loop_stops_after_five_failures_in_a_row() {
        let mut runner = Scripted::new(&[]);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let exit = tokio_test::block_on(run_loop(&mut runner, &instant_settings(None), &mut rng));
        assert_eq!(exit, LoopExit::GaveUp { failures: 5 });
        assert_eq!(runner.attempts, 5);
        assert_eq!(runner.failures_seen, 5);
    }

    #[test]
    fn success_in_between_resets_the_count() {
        let mut runner = Scripted::new(&[false, false, false, false, true]);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let exit = tokio_test::block_on(run_loop(&mut runner, &instant_settings(None), &mut rng));
        assert_eq!(exit, LoopExit::GaveUp { failures: 5 });
        assert_eq!(runner.attempts, 10);
    }

    #[test]
    fn single_cycle_mode_reports_outcome() {
        let mut ok = Scripted::new(&[true]);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let exit = tokio_test::block_on(run_loop(&mut ok, &instant_settings(Some(1)), &mut rng));
        assert_eq!(
            exit,
            LoopExit::Finished {
                cycles: 1,
                failing: false
            }
        );

        let mut failing = Scripted::new(&[false]);
        let exit =
            tokio_test::block_on(run_loop(&mut failing, &instant_settings(Some(1)), &mut rng));
        assert_eq!(
            exit,
            LoopExit::Finished {
                cycles: 1,
                failing: true
            }
        );
    }

    #[test]
    fn pauses_stay_within_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let min = Duration::from_secs(60);
        let max = Duration::from_secs(300);
        for _ in 0..200 {
            let pause = pause_between(&mut rng, min, max);
            assert!(pause >= min && pause <= max);
        }
        assert_eq!(pause_between(&mut rng, max, min), max);
    }

    #[test]
    fn config_overrides_apply_credentials() {
        let path = std::env::temp_dir().join(format!(
            "outpost-config-{}.json",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        std::fs::write(
            &path,
            r#"{"username": "file", "password": "file", "villages": []}"#,
        )
        .unwrap();
        let overrides = CredentialOverrides {
            username: Some("env-user".into()),
            password: None,
        };
        let config = load_config(&path, &overrides).unwrap();
        assert_eq!(config.username, "env-user");
        assert_eq!(config.password, "file");
        assert!(load_config(&path.with_extension("missing"), &overrides).is_err());
    }
}

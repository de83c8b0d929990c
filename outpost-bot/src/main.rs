mod browser;
mod common;
mod discovery;
mod executor;
mod run_loop;
mod scheduler;
mod store;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use log::warn;
use outpost_core::BotConfig;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use std::time::Duration;

use browser::{BrowserConfig, BrowserKind, PageLabels, WebDriverExecutor, new_session};
use run_loop::{
    BotRunner, CredentialOverrides, DEFAULT_MAX_FAILURES, LoopExit, LoopSettings, load_config,
    run_loop,
};
use store::JsonStateStore;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum HeadlessMode {
    /// Run the browser without a window
    Headless,
    /// Run the browser with a visible window
    Windowed,
}

impl HeadlessMode {
    const fn is_headless(self) -> bool {
        matches!(self, Self::Headless)
    }
}

#[derive(Debug, Parser)]
#[command(name = "outpost", version)]
#[command(about = "Runs village tasks against the game's web UI on a jittered schedule")]
struct Args {
    /// Village and task configuration (JSON)
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Directory holding timers, the denylist, target feeds and the error log
    #[arg(long, default_value = "state")]
    state_dir: PathBuf,

    /// Validate the configuration, print an overview and exit
    #[arg(long)]
    check_config: bool,

    /// Game server URL, e.g. https://ts1.example.com
    #[arg(long, env = "OUTPOST_BASE_URL")]
    base_url: Option<String>,

    /// Account name, overrides the config file
    #[arg(long, env = "OUTPOST_USERNAME")]
    username: Option<String>,

    /// Account password, overrides the config file
    #[arg(long, env = "OUTPOST_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Browser to drive
    #[arg(long, value_enum, default_value_t = BrowserKind::Chrome)]
    browser: BrowserKind,

    /// Run headless where supported
    #[arg(long, value_enum, default_value_t = HeadlessMode::Headless)]
    headless: HeadlessMode,

    /// Connect to a Selenium Grid/Appium hub instead of local drivers
    #[arg(long)]
    hub: Option<String>,

    /// How long element lookups keep retrying, in seconds
    #[arg(long, default_value_t = 3)]
    implicit_wait_secs: u64,

    /// How long a page may take to load, in seconds
    #[arg(long, default_value_t = 60)]
    page_load_secs: u64,

    /// Artifacts directory for screenshots and page dumps of failed cycles
    #[arg(long, default_value = "target/outpost-artifacts")]
    artifacts_dir: PathBuf,

    /// Run a single cycle and exit (non-zero if it failed)
    #[arg(long)]
    once: bool,

    /// Shortest pause between cycles, in seconds
    #[arg(long, default_value_t = 60)]
    min_pause_secs: u64,

    /// Longest pause between cycles, in seconds
    #[arg(long, default_value_t = 300)]
    max_pause_secs: u64,

    /// Wait before retrying a failed cycle, in seconds
    #[arg(long, default_value_t = 50)]
    retry_backoff_secs: u64,

    /// Consecutive failed cycles before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_FAILURES)]
    max_failures: u32,

    /// Seed for the pause jitter (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Map tile title of an unoccupied oasis
    #[arg(long)]
    free_oasis_label: Option<String>,

    /// Oasis troop table text when no animals are present
    #[arg(long)]
    no_animals_label: Option<String>,

    /// Text of a field's upgrade button
    #[arg(long)]
    upgrade_label: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let overrides = credential_overrides(&args);
    let config = load_config(&args.config, &overrides)?;
    if args.check_config {
        print_config_overview(&config);
        return Ok(());
    }

    announce_banner();

    let base_url = args
        .base_url
        .clone()
        .context("--base-url (or OUTPOST_BASE_URL) is required to run")?;
    let store = JsonStateStore::new(&args.state_dir);
    let driver = new_session(args.browser, &build_browser_config(&args))
        .await
        .with_context(|| format!("starting {:?} session", args.browser))?;
    let executor = WebDriverExecutor::new(driver, &base_url, page_labels(&args));
    let mut runner = BotRunner::new(
        executor,
        store,
        args.config.clone(),
        overrides,
        args.artifacts_dir.clone(),
    );

    let settings = loop_settings(&args);
    let mut rng = args
        .seed
        .map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64);
    let exit = run_loop(&mut runner, &settings, &mut rng).await;

    if let Err(err) = runner.into_executor().quit().await {
        warn!("could not close browser session: {err}");
    }

    match exit {
        LoopExit::Finished { cycles, failing } => {
            if failing {
                eprintln!("❌ last cycle failed");
                std::process::exit(1);
            }
            println!("✅ {cycles} cycle(s) completed");
        }
        LoopExit::GaveUp { failures } => {
            eprintln!("❌ stopped after {failures} consecutive failed cycles");
            std::process::exit(1);
        }
    }
    Ok(())
}

fn announce_banner() {
    println!("{}", "🏰 Outpost Village Scheduler".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn credential_overrides(args: &Args) -> CredentialOverrides {
    CredentialOverrides {
        username: args.username.clone(),
        password: args.password.clone(),
    }
}

fn build_browser_config(args: &Args) -> BrowserConfig {
    BrowserConfig {
        headless: args.headless.is_headless(),
        implicit_wait: Duration::from_secs(args.implicit_wait_secs),
        page_load: Duration::from_secs(args.page_load_secs),
        remote_hub: args.hub.clone(),
    }
}

fn page_labels(args: &Args) -> PageLabels {
    let defaults = PageLabels::default();
    PageLabels {
        free_oasis: args
            .free_oasis_label
            .clone()
            .unwrap_or(defaults.free_oasis),
        no_animals: args
            .no_animals_label
            .clone()
            .unwrap_or(defaults.no_animals),
        upgrade: args.upgrade_label.clone().unwrap_or(defaults.upgrade),
    }
}

fn loop_settings(args: &Args) -> LoopSettings {
    LoopSettings {
        min_pause: Duration::from_secs(args.min_pause_secs),
        max_pause: Duration::from_secs(args.max_pause_secs.max(args.min_pause_secs)),
        retry_backoff: Duration::from_secs(args.retry_backoff_secs),
        max_consecutive_failures: args.max_failures.max(1),
        max_cycles: args.once.then_some(1),
    }
}

fn print_config_overview(config: &BotConfig) {
    println!("{}", "🏰 Outpost configuration".bright_cyan().bold());
    println!("{}", "========================".cyan());
    println!("Villages: {}", config.villages.len());
    for village in &config.villages {
        let tasks: Vec<&str> = village.tasks.iter().map(|task| task.label()).collect();
        println!(
            "  {} {} (newdid {}) → {}",
            village.name.bold(),
            village.coordinate,
            village.reference,
            if tasks.is_empty() {
                "no tasks".to_string()
            } else {
                tasks.join(", ")
            }
        );
        if let Some(receiver) = &village.emergency_receiver {
            println!("    evacuates to {receiver}");
        }
    }
    if let Some(discovery) = &config.discovery {
        println!(
            "Oasis discovery: radius {} around {}, {} tiles per cycle",
            discovery.radius, discovery.center, discovery.max_tiles
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            config: PathBuf::from("config.json"),
            state_dir: PathBuf::from("state"),
            check_config: false,
            base_url: None,
            username: None,
            password: None,
            browser: BrowserKind::Chrome,
            headless: HeadlessMode::Headless,
            hub: None,
            implicit_wait_secs: 3,
            page_load_secs: 60,
            artifacts_dir: PathBuf::from("target/outpost-artifacts"),
            once: false,
            min_pause_secs: 60,
            max_pause_secs: 300,
            retry_backoff_secs: 50,
            max_failures: DEFAULT_MAX_FAILURES,
            seed: None,
            free_oasis_label: None,
            no_animals_label: None,
            upgrade_label: None,
        }
    }

    #[test]
    fn default_flags_match_loop_defaults() {
        assert_eq!(loop_settings(&base_args()), LoopSettings::default());
    }

    #[test]
    fn once_limits_the_loop_to_one_cycle() {
        let mut args = base_args();
        args.once = true;
        args.min_pause_secs = 400;
        let settings = loop_settings(&args);
        assert_eq!(settings.max_cycles, Some(1));
        assert_eq!(settings.max_pause, Duration::from_secs(400));
    }

    #[test]
    fn label_overrides_replace_defaults() {
        let mut args = base_args();
        args.no_animals_label = Some("none".to_string());
        let labels = page_labels(&args);
        assert_eq!(labels.no_animals, "none");
        assert_eq!(labels.free_oasis, PageLabels::default().free_oasis);
    }

    #[test]
    fn browser_config_follows_flags() {
        let mut args = base_args();
        args.headless = HeadlessMode::Windowed;
        args.hub = Some("http://grid:4444".to_string());
        let cfg = build_browser_config(&args);
        assert!(!cfg.headless);
        assert_eq!(cfg.remote_hub.as_deref(), Some("http://grid:4444"));
        assert_eq!(cfg.implicit_wait, Duration::from_secs(3));
        assert_eq!(cfg.page_load, Duration::from_secs(60));
    }

    #[test]
    fn slow_servers_get_longer_timeouts() {
        let args = Args::try_parse_from([
            "outpost",
            "--implicit-wait-secs",
            "10",
            "--page-load-secs",
            "120",
        ])
        .unwrap();
        let cfg = build_browser_config(&args);
        assert_eq!(cfg.implicit_wait, Duration::from_secs(10));
        assert_eq!(cfg.page_load, Duration::from_secs(120));
    }

    #[test]
    fn cli_parses_credentials_and_seed() {
        let args = Args::try_parse_from([
            "outpost",
            "--username",
            "chief",
            "--seed",
            "9",
            "--browser",
            "firefox",
        ])
        .unwrap();
        assert_eq!(credential_overrides(&args).username.as_deref(), Some("chief"));
        assert_eq!(args.seed, Some(9));
        assert_eq!(args.browser, BrowserKind::Firefox);
    }
}

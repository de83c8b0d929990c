use std::time::Duration;
use thirtyfour::Capabilities;
use thirtyfour::prelude::*;

/// Browsers the game screens are driven with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BrowserKind {
    Chrome,
    Firefox,
}

impl BrowserKind {
    /// Where a locally started driver listens by default (`chromedriver`,
    /// `geckodriver`).
    #[must_use]
    pub const fn local_driver_url(self) -> &'static str {
        match self {
            Self::Chrome => "http://localhost:9515",
            Self::Firefox => "http://localhost:4444",
        }
    }

    fn capabilities(self, headless: bool) -> WebDriverResult<Capabilities> {
        Ok(match self {
            Self::Chrome => {
                let mut caps = DesiredCapabilities::chrome();
                if headless {
                    caps.set_headless()?;
                }
                caps.into()
            }
            Self::Firefox => {
                let mut caps = DesiredCapabilities::firefox();
                if headless {
                    caps.set_headless()?;
                }
                caps.into()
            }
        })
    }
}

/// How the session is opened and how patient it is with slow pages.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub headless: bool,
    /// How long element lookups keep retrying before failing.
    pub implicit_wait: Duration,
    /// How long a navigation may take before the cycle fails.
    pub page_load: Duration,
    pub remote_hub: Option<String>,
}

impl BrowserConfig {
    /// The hub when one is configured, otherwise the local driver.
    #[must_use]
    pub fn driver_url(&self, kind: BrowserKind) -> &str {
        self.remote_hub
            .as_deref()
            .unwrap_or_else(|| kind.local_driver_url())
    }
}

pub async fn new_session(kind: BrowserKind, cfg: &BrowserConfig) -> WebDriverResult<WebDriver> {
    let caps = kind.capabilities(cfg.headless)?;
    let driver = WebDriver::new(cfg.driver_url(kind), caps).await?;
    driver.set_implicit_wait_timeout(cfg.implicit_wait).await?;
    driver.set_page_load_timeout(cfg.page_load).await?;
    Ok(driver)
}

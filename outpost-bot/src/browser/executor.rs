use async_trait::async_trait;
use log::{debug, info};
use outpost_core::{
    BotConfig, Coordinate, FestivalVariant, FieldId, FieldSlot, Resource, ResourceAmounts,
    TroopCounts, UnitType, Village,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use thirtyfour::prelude::*;

use super::pages;
use crate::common::capture_artifacts;
use crate::executor::{
    Action, ActionExecutor, ActionResult, ExecutorError, IncomingAttack, Marketplace,
    OasisStatus, RallyPoint,
};

const LOGIN_POLL: Duration = Duration::from_secs(1);
const LOGIN_ATTEMPTS: u32 = 30;
const MARKET_SETTLE: Duration = Duration::from_secs(2);

/// Localized texts the pages are recognized by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLabels {
    /// Title of a map tile holding an unoccupied oasis.
    pub free_oasis: String,
    /// Shown in an oasis' troop table when no animals guard it.
    pub no_animals: String,
    /// Part of the value of a field's upgrade button.
    pub upgrade: String,
}

impl Default for PageLabels {
    fn default() -> Self {
        Self {
            free_oasis: "Oasis libre".to_string(),
            no_animals: "ninguno".to_string(),
            upgrade: "Mejora al nivel".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TroopRow {
    unit: String,
    available: String,
}

#[derive(Debug, Deserialize)]
struct FieldRow {
    id: Option<String>,
    level: String,
}

#[derive(Debug, Deserialize)]
struct UpgradeOutcome {
    found: bool,
    duration: Option<String>,
}

/// Drives the game's web UI through a WebDriver session.
pub struct WebDriverExecutor {
    driver: WebDriver,
    base_url: String,
    labels: PageLabels,
}

impl WebDriverExecutor {
    pub fn new(driver: WebDriver, base_url: &str, labels: PageLabels) -> Self {
        Self {
            driver,
            base_url: base_url.trim_end_matches('/').to_string(),
            labels,
        }
    }

    /// Ends the browser session.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver refuses to close the session.
    pub async fn quit(self) -> WebDriverResult<()> {
        self.driver.quit().await
    }

    async fn open(&self, url: &str) -> Result<(), ExecutorError> {
        debug!("opening {url}");
        self.driver.goto(url).await?;
        Ok(())
    }

    async fn script<T: DeserializeOwned>(
        &self,
        script: &str,
        args: Vec<Value>,
    ) -> Result<T, ExecutorError> {
        let ret = self.driver.execute(script, args).await?;
        serde_json::from_value(ret.json().clone())
            .map_err(|err| ExecutorError::Transient(format!("unexpected page data: {err}")))
    }

    async fn text_of(&self, selector: &str) -> Result<Option<String>, ExecutorError> {
        self.script(pages::TEXT_OF_SCRIPT, vec![selector.into()])
            .await
    }

    async fn texts_of(&self, selector: &str) -> Result<Vec<String>, ExecutorError> {
        self.script(pages::TEXTS_OF_SCRIPT, vec![selector.into()])
            .await
    }

    async fn set_input(&self, selector: &str, value: String) -> Result<bool, ExecutorError> {
        self.script(pages::SET_INPUT_SCRIPT, vec![selector.into(), value.into()])
            .await
    }

    async fn click(&self, selector: &str) -> Result<(), ExecutorError> {
        self.driver.find(By::Css(selector)).await?.click().await?;
        Ok(())
    }

    /// Fails with `InvalidTarget` when the page shows a game error.
    async fn reject_on_page_error(&self) -> Result<(), ExecutorError> {
        match self.text_of(pages::ERROR_SELECTOR).await? {
            Some(reason) => Err(ExecutorError::InvalidTarget { reason }),
            None => Ok(()),
        }
    }

    async fn login(&self, config: &BotConfig) -> Result<(), ExecutorError> {
        self.open(&pages::login_url(&self.base_url, &config.login_path))
            .await?;
        if self.text_of(pages::LOGIN_NAME_INPUT).await?.is_none() {
            debug!("session still logged in");
            return Ok(());
        }
        if config.username.is_empty() {
            return Err(ExecutorError::Transient(
                "login form shown but no username configured".to_string(),
            ));
        }

        let name = self.driver.find(By::Css(pages::LOGIN_NAME_INPUT)).await?;
        name.clear().await?;
        name.send_keys(config.username.as_str()).await?;
        let password = self
            .driver
            .find(By::Css(pages::LOGIN_PASSWORD_INPUT))
            .await?;
        password.clear().await?;
        password.send_keys(config.password.as_str()).await?;
        self.click(pages::LOGIN_SUBMIT).await?;

        for _ in 0..LOGIN_ATTEMPTS {
            tokio::time::sleep(LOGIN_POLL).await;
            if self.text_of(pages::LOGIN_NAME_INPUT).await?.is_none() {
                info!("🔑 logged in as {}", config.username);
                return Ok(());
            }
        }
        Err(ExecutorError::Transient(
            "login form still shown after submitting credentials".to_string(),
        ))
    }

    async fn read_marketplace(&self, target: Coordinate) -> Result<Marketplace, ExecutorError> {
        self.open(&pages::marketplace_url(&self.base_url, target))
            .await?;
        let capacity = self
            .text_of(pages::MERCHANT_CAPACITY)
            .await?
            .as_deref()
            .and_then(pages::parse_count)
            .ok_or_else(|| ExecutorError::Transient("merchant capacity not shown".to_string()))?;
        let available_carriers = self
            .text_of(pages::MERCHANTS_AVAILABLE)
            .await?
            .as_deref()
            .and_then(pages::parse_ratio)
            .map_or(0, |(available, _)| available);
        let stock = amounts_from(&self.texts_of(pages::MARKET_STOCK).await?)
            .ok_or_else(|| ExecutorError::Transient("market stock not shown".to_string()))?;
        Ok(Marketplace {
            capacity,
            available_carriers,
            stock,
        })
    }

    async fn select_hero_production(&self, resource: Resource) -> Result<ActionResult, ExecutorError> {
        self.open(&pages::hero_url(&self.base_url)).await?;
        let state: Option<String> = self
            .script(
                pages::HERO_PRODUCTION_SCRIPT,
                vec![pages::hero_icon(resource).into()],
            )
            .await?;
        match state.as_deref() {
            Some("active") => debug!("hero already produces {resource}"),
            Some(_) => info!("hero now produces {resource}"),
            None => {
                return Err(ExecutorError::Transient(format!(
                    "no hero production button for {resource}"
                )));
            }
        }
        Ok(ActionResult::Success {
            extracted_duration: None,
        })
    }

    async fn train(&self, unit: UnitType, count: u32) -> Result<ActionResult, ExecutorError> {
        self.open(&pages::training_url(&self.base_url, unit.training_building()))
            .await?;
        let input = format!("input[name='{}']", unit.key());
        if !self.set_input(&input, count.to_string()).await? {
            return Err(ExecutorError::InvalidTarget {
                reason: format!("{} cannot be trained here", unit.key()),
            });
        }
        self.click(pages::TRAINING_SUBMIT).await?;
        Ok(ActionResult::Success {
            extracted_duration: None,
        })
    }

    async fn send_troops(
        &self,
        target: Coordinate,
        troops: &TroopCounts,
    ) -> Result<ActionResult, ExecutorError> {
        self.open(&pages::rally_point_url(&self.base_url, target))
            .await?;
        self.reject_on_page_error().await?;
        for (unit, count) in troops.iter() {
            let input = format!("input[name='troop[{}]']", unit.key());
            if !self.set_input(&input, count.to_string()).await? {
                return Err(ExecutorError::InsufficientResource);
            }
        }
        self.click(pages::RAID_RADIO).await?;
        self.click(pages::TROOPS_SUBMIT).await?;
        self.reject_on_page_error().await?;

        let arrival = self.text_of(pages::ARRIVAL_TIME).await?;
        self.click(pages::TROOPS_CONFIRM).await?;
        Ok(ActionResult::Success {
            extracted_duration: arrival,
        })
    }

    async fn send_resources(
        &self,
        target: Coordinate,
        amounts: &ResourceAmounts,
    ) -> Result<ActionResult, ExecutorError> {
        self.open(&pages::marketplace_url(&self.base_url, target))
            .await?;
        for resource in Resource::ALL {
            let amount = amounts.get(resource);
            if amount == 0 {
                continue;
            }
            if !self
                .set_input(pages::market_input(resource), amount.to_string())
                .await?
            {
                return Err(ExecutorError::Transient(format!(
                    "no market input for {resource}"
                )));
            }
        }
        self.click(pages::MARKET_SEND).await?;
        tokio::time::sleep(MARKET_SETTLE).await;
        self.reject_on_page_error().await?;
        Ok(ActionResult::Success {
            extracted_duration: None,
        })
    }

    async fn upgrade_field(&self, field: FieldId) -> Result<ActionResult, ExecutorError> {
        self.open(&pages::field_url(&self.base_url, field)).await?;
        let outcome: UpgradeOutcome = self
            .script(pages::UPGRADE_SCRIPT, vec![self.labels.upgrade.as_str().into()])
            .await?;
        if !outcome.found {
            return Err(ExecutorError::InsufficientResource);
        }
        Ok(ActionResult::Success {
            extracted_duration: outcome.duration,
        })
    }

    async fn start_festival(&self, variant: FestivalVariant) -> Result<ActionResult, ExecutorError> {
        self.open(&pages::festival_url(&self.base_url, variant))
            .await?;
        let running: Option<String> = self.script(pages::FESTIVAL_SCRIPT, vec![]).await?;
        match running {
            Some(duration) => Ok(ActionResult::Success {
                extracted_duration: Some(duration).filter(|d| !d.is_empty()),
            }),
            None => Err(ExecutorError::InsufficientResource),
        }
    }

    async fn perform(&self, action: &Action) -> Result<ActionResult, ExecutorError> {
        match action {
            Action::SelectHeroProduction { resource } => self.select_hero_production(*resource).await,
            Action::Train { unit, count } => self.train(*unit, *count).await,
            Action::SendTroops { target, troops } => self.send_troops(*target, troops).await,
            Action::SendResources { target, amounts } => {
                self.send_resources(*target, amounts).await
            }
            Action::UpgradeField { field } => self.upgrade_field(*field).await,
            Action::StartFestival { variant } => self.start_festival(*variant).await,
        }
    }
}

#[async_trait]
impl ActionExecutor for WebDriverExecutor {
    async fn begin_cycle(&mut self, config: &BotConfig) -> Result<(), ExecutorError> {
        self.login(config).await
    }

    async fn switch_context(&mut self, village: &Village) -> Result<(), ExecutorError> {
        self.open(&pages::village_url(&self.base_url, &village.reference))
            .await?;
        self.reject_on_page_error().await
    }

    async fn incoming_attacks(&mut self) -> Result<Vec<IncomingAttack>, ExecutorError> {
        self.open(&pages::overview_url(&self.base_url)).await?;
        self.script(pages::ATTACKS_SCRIPT, vec![]).await
    }

    async fn hero_resources(&mut self) -> Result<ResourceAmounts, ExecutorError> {
        self.open(&pages::hero_url(&self.base_url)).await?;
        amounts_from(&self.texts_of(pages::HERO_STOCK).await?)
            .ok_or_else(|| ExecutorError::Transient("hero inventory not shown".to_string()))
    }

    async fn marketplace(&mut self, target: Coordinate) -> Result<Marketplace, ExecutorError> {
        self.read_marketplace(target).await
    }

    async fn rally_point(&mut self, target: Coordinate) -> Result<RallyPoint, ExecutorError> {
        self.open(&pages::rally_point_url(&self.base_url, target))
            .await?;
        self.reject_on_page_error().await?;
        let rows: Vec<TroopRow> = self.script(pages::RALLY_TROOPS_SCRIPT, vec![]).await?;
        Ok(RallyPoint {
            available: troops_from(&rows),
        })
    }

    async fn resource_fields(
        &mut self,
        preference: &[FieldId],
    ) -> Result<Vec<FieldSlot>, ExecutorError> {
        self.open(&pages::overview_url(&self.base_url)).await?;
        let mut rows: Vec<FieldRow> = self
            .script(
                pages::FIELDS_SCRIPT,
                vec![pages::RESOURCE_FIELDS.into(), false.into()],
            )
            .await?;
        if !preference.is_empty() {
            self.open(&pages::buildings_url(&self.base_url)).await?;
            let buildings: Vec<FieldRow> = self
                .script(
                    pages::FIELDS_SCRIPT,
                    vec![pages::BUILDING_SLOTS.into(), true.into()],
                )
                .await?;
            rows.extend(buildings);
        }
        Ok(fields_from(&rows))
    }

    async fn inspect_oasis(&mut self, target: Coordinate) -> Result<OasisStatus, ExecutorError> {
        self.open(&pages::map_tile_url(&self.base_url, target))
            .await?;
        if let Some(reason) = self.text_of(pages::ERROR_SELECTOR).await? {
            return Ok(OasisStatus::Invalid { reason });
        }
        let status = match self.text_of(pages::OASIS_TROOPS).await? {
            None => OasisStatus::Invalid {
                reason: "not an oasis".to_string(),
            },
            Some(troops) if troops.contains(&self.labels.no_animals) => OasisStatus::Free,
            Some(_) => OasisStatus::Occupied,
        };
        Ok(status)
    }

    async fn inspect_tile(&mut self, tile: Coordinate) -> Result<bool, ExecutorError> {
        self.open(&pages::map_tile_url(&self.base_url, tile)).await?;
        Ok(self
            .text_of(pages::TILE_TITLE)
            .await?
            .is_some_and(|title| title.contains(&self.labels.free_oasis)))
    }

    async fn execute(&mut self, action: &Action) -> ActionResult {
        self.perform(action).await.unwrap_or_else(ActionResult::from)
    }

    async fn capture_diagnostics(&mut self, dir: &Path, error_chain: &str) -> anyhow::Result<()> {
        capture_artifacts(&self.driver, dir, error_chain).await
    }
}

/// Four numbers in wood, clay, iron, crop order.
fn amounts_from(texts: &[String]) -> Option<ResourceAmounts> {
    let values: Vec<u64> = texts
        .iter()
        .take(4)
        .map(|text| pages::parse_count(text))
        .collect::<Option<_>>()?;
    match values.as_slice() {
        [wood, clay, iron, crop] => Some(ResourceAmounts::new(*wood, *clay, *iron, *crop)),
        _ => None,
    }
}

fn troops_from(rows: &[TroopRow]) -> TroopCounts {
    let mut troops = TroopCounts::new();
    for row in rows {
        let Some(unit) = UnitType::from_key(&row.unit) else {
            continue;
        };
        let count = pages::parse_count(&row.available)
            .and_then(|count| u32::try_from(count).ok())
            .unwrap_or(0);
        troops.set(unit, count);
    }
    troops
}

fn fields_from(rows: &[FieldRow]) -> Vec<FieldSlot> {
    rows.iter()
        .filter_map(|row| {
            let id = row.id.as_deref()?.trim().parse().ok()?;
            Some(FieldSlot {
                id: FieldId(id),
                level: pages::parse_first_number(&row.level),
            })
        })
        .collect()
}

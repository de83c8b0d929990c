//! Game screens: URLs, selectors, extraction scripts and text parsing.
use outpost_core::{Coordinate, FestivalVariant, FieldId, Resource, TrainingBuilding};
use regex::Regex;
use std::sync::OnceLock;

pub const ERROR_SELECTOR: &str = "p.error";
pub const LOGIN_NAME_INPUT: &str = "input[name='name']";
pub const LOGIN_PASSWORD_INPUT: &str = "input[name='password']";
pub const LOGIN_SUBMIT: &str = "button[type='submit']";

pub const MERCHANT_CAPACITY: &str = ".merchantCarryInfo strong";
pub const MERCHANTS_AVAILABLE: &str = ".available .value";
pub const MARKET_SEND: &str = ".actionButtons .send";

pub const RAID_RADIO: &str = "input[type='radio'][name='eventType'][value='4']";
pub const TROOPS_SUBMIT: &str = "button[type='submit'][name='ok']";
pub const ARRIVAL_TIME: &str = "#in";
pub const TROOPS_CONFIRM: &str = "#confirmSendTroops";

pub const TRAINING_SUBMIT: &str = "button[name='s1'].startTraining";
pub const OASIS_TROOPS: &str = "#troop_info";
pub const TILE_TITLE: &str = "#tileDetails h1.titleInHeader";

pub const RESOURCE_FIELDS: &str = "#resourceFieldContainer a.good";
pub const BUILDING_SLOTS: &str = "#villageContent .buildingSlot a.level.colorLayer.good";

/// Text of the first element matching `arguments[0]`, or null.
pub const TEXT_OF_SCRIPT: &str = r"
const el = document.querySelector(arguments[0]);
return el ? el.textContent.trim() : null;
";

/// Texts of every element matching `arguments[0]`.
pub const TEXTS_OF_SCRIPT: &str = r"
return Array.from(document.querySelectorAll(arguments[0])).map(el => el.textContent.trim());
";

/// Sets an input's value and fires `input`; false when it does not exist.
pub const SET_INPUT_SCRIPT: &str = r"
const input = document.querySelector(arguments[0]);
if (!input) return false;
input.value = '';
input.value = arguments[1];
input.dispatchEvent(new Event('input', { bubbles: true }));
return true;
";

pub const ATTACKS_SCRIPT: &str = r"
return Array.from(document.querySelectorAll('#movements tr'))
  .filter(row => row.querySelector('img.att1'))
  .map(row => ({
    count: (row.querySelector('span.a1')?.textContent || '').trim(),
    arrives_in: (row.querySelector('span.timer')?.textContent || '').trim(),
  }));
";

pub const RALLY_TROOPS_SCRIPT: &str = r#"
return Array.from(document.querySelectorAll('input[name^="troop[t"]')).map(input => {
  const unit = (input.name.match(/troop\[(t\d+)\]/) || [])[1] || '';
  const shown = input.parentElement?.querySelector('a, span.none');
  return { unit, available: shown ? shown.textContent.trim() : '0' };
});
"#;

/// Field rows; `arguments[1]` reads the id from the enclosing building slot.
pub const FIELDS_SCRIPT: &str = r"
return Array.from(document.querySelectorAll(arguments[0])).map(el => {
  const holder = arguments[1] ? el.closest('.buildingSlot') : el;
  const label = el.querySelector('.labelLayer');
  return {
    id: holder ? holder.getAttribute('data-aid') : null,
    level: label ? label.textContent.trim() : '',
  };
});
";

/// Clicks the hero production button for `arguments[0]` unless active.
pub const HERO_PRODUCTION_SCRIPT: &str = r"
const icon = document.querySelector('button i.' + arguments[0]);
if (!icon) return null;
const button = icon.closest('button');
if (button.classList.contains('active')) return 'active';
button.click();
return 'clicked';
";

/// Reads the build duration and clicks the button whose value contains
/// `arguments[0]`.
pub const UPGRADE_SCRIPT: &str = r"
const button = Array.from(document.querySelectorAll('button'))
  .find(b => (b.getAttribute('value') || '').includes(arguments[0]));
if (!button) return { found: false, duration: null };
const duration = document.querySelector('.inlineIcon.duration span.value');
const text = duration ? duration.textContent.trim() : null;
button.click();
return { found: true, duration: text };
";

pub const FESTIVAL_SCRIPT: &str = r"
const table = document.querySelector('table.under_progress');
if (!table) return null;
const timer = table.querySelector('tbody tr:last-child td.dur span.timer');
return timer ? timer.textContent.trim() : '';
";

pub fn login_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!("{base}/{}", path.trim_start_matches('/'))
}

pub fn village_url(base: &str, reference: &str) -> String {
    format!("{base}/dorf1.php?newdid={reference}")
}

pub fn overview_url(base: &str) -> String {
    format!("{base}/dorf1.php")
}

pub fn buildings_url(base: &str) -> String {
    format!("{base}/dorf2.php")
}

pub fn hero_url(base: &str) -> String {
    format!("{base}/hero/attributes")
}

pub fn marketplace_url(base: &str, target: Coordinate) -> String {
    format!("{base}/build.php?gid=17&t=5&x={}&y={}", target.x, target.y)
}

pub fn rally_point_url(base: &str, target: Coordinate) -> String {
    format!(
        "{base}/build.php?id=39&gid=16&tt=2&x={}&y={}",
        target.x, target.y
    )
}

pub fn map_tile_url(base: &str, tile: Coordinate) -> String {
    format!("{base}/karte.php?x={}&y={}", tile.x, tile.y)
}

pub fn field_url(base: &str, field: FieldId) -> String {
    format!("{base}/build.php?id={field}")
}

pub fn training_url(base: &str, building: TrainingBuilding) -> String {
    let gid = match building {
        TrainingBuilding::Barracks => 19,
        TrainingBuilding::Stable => 20,
        TrainingBuilding::Workshop => 21,
    };
    format!("{base}/build.php?gid={gid}")
}

pub fn festival_url(base: &str, variant: FestivalVariant) -> String {
    format!(
        "{base}/build.php?gid=24&action=celebration&do={}&t=1",
        variant.code()
    )
}

/// Icon class of a hero production button.
pub const fn hero_icon(resource: Resource) -> &'static str {
    match resource {
        Resource::Wood => "lumber_small",
        Resource::Clay => "clay_small",
        Resource::Iron => "iron_small",
        Resource::Crop => "crop_small",
    }
}

/// Market form field for a resource.
pub const fn market_input(resource: Resource) -> &'static str {
    match resource {
        Resource::Wood => ".resourceSelector input[name='lumber']",
        Resource::Clay => ".resourceSelector input[name='clay']",
        Resource::Iron => ".resourceSelector input[name='iron']",
        Resource::Crop => ".resourceSelector input[name='crop']",
    }
}

pub const MARKET_STOCK: &str = ".resourceSelector .inputRatio .denominator";
pub const HERO_STOCK: &str = ".stockBarButton .value";

fn digits() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+").expect("valid digits regex"))
}

/// Number shown on a page, ignoring separators and bidi marks
/// (`"\u{202d}1.234\u{202c}"` → 1234). None when there are no digits.
pub fn parse_count(text: &str) -> Option<u64> {
    let joined: String = digits()
        .find_iter(text)
        .map(|found| found.as_str())
        .collect();
    joined.parse().ok()
}

/// First number in the text, for labels like `"12 units"`.
pub fn parse_first_number(text: &str) -> Option<u32> {
    digits().find(text).and_then(|found| found.as_str().parse().ok())
}

/// `"3/5"` → `(3, 5)`.
pub fn parse_ratio(text: &str) -> Option<(u32, u32)> {
    let (available, total) = text.split_once('/')?;
    Some((
        u32::try_from(parse_count(available)?).ok()?,
        u32::try_from(parse_count(total)?).ok()?,
    ))
}

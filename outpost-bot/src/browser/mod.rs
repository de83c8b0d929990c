mod executor;
mod pages;
mod session;

pub use executor::{PageLabels, WebDriverExecutor};
pub use session::{BrowserConfig, BrowserKind, new_session};

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use thirtyfour::prelude::*;

/// Timestamped directory for one failure's artifacts.
pub fn artifacts_dir(base: &Path, label: &str) -> PathBuf {
    let ts = Utc::now().format("%Y%m%dT%H%M%S");
    base.join(label).join(ts.to_string())
}

/// Saves a screenshot, the page source and the error chain.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub async fn capture_artifacts(driver: &WebDriver, dir: &Path, error_chain: &str) -> Result<()> {
    let screenshot = driver.screenshot_as_png().await.ok();
    let source = driver.source().await.ok();
    let url = driver.current_url().await.ok().map(|url| url.to_string());

    write_artifact_files(
        dir,
        screenshot.as_deref(),
        source.as_deref(),
        url.as_deref(),
        error_chain,
    )
}

fn write_artifact_files(
    dir: &Path,
    screenshot: Option<&[u8]>,
    source: Option<&str>,
    url: Option<&str>,
    error_chain: &str,
) -> Result<()> {
    fs::create_dir_all(dir).context("creating artifacts dir")?;

    if let Some(png) = screenshot {
        let _ = fs::write(dir.join("screenshot.png"), png);
    }

    if let Some(src) = source {
        let _ = fs::write(dir.join("dom.html"), src);
    }

    if let Some(url) = url {
        let _ = fs::write(dir.join("url.txt"), url);
    }

    let _ = fs::write(dir.join("error.txt"), error_chain);

    Ok(())
}

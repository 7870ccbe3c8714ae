//! Starting a Chromium for a live harvest.
//!
//! The harvester needs one page, driven over CDP, in a window large enough
//! for a data grid to render a useful number of rows per viewport. Nothing
//! here knows about tables; `ChromiumSurface` wraps the page this hands out.

use crate::core::config::chrome_executable_override;
use anyhow::{anyhow, Context, Result};
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use rand::seq::IndexedRandom;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Tall enough that grids render a few dozen rows per window.
const WINDOW: (u32, u32) = (1920, 1080);

const DESKTOP_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
];

const PATH_NAMES: &[&str] = &["google-chrome", "chromium", "chromium-browser", "chrome", "brave-browser"];

#[cfg(target_os = "linux")]
const INSTALL_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
];

#[cfg(target_os = "macos")]
const INSTALL_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

#[cfg(target_os = "windows")]
const INSTALL_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
];

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const INSTALL_PATHS: &[&str] = &[];

/// Container-safe flags; the last one keeps `navigator.webdriver` unset.
const LAUNCH_FLAGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-extensions",
    "--disable-background-networking",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-blink-features=AutomationControlled",
];

pub fn random_user_agent() -> &'static str {
    DESKTOP_USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(DESKTOP_USER_AGENTS[0])
}

/// `CHROME_EXECUTABLE`, then `PATH`, then the usual install locations.
pub fn find_chrome_executable() -> Option<PathBuf> {
    if let Some(exe) = chrome_executable_override() {
        return Some(PathBuf::from(exe));
    }
    let on_path = std::env::var_os("PATH")
        .map(|p| std::env::split_paths(&p).collect::<Vec<_>>())
        .unwrap_or_default();
    on_path
        .iter()
        .flat_map(|dir| PATH_NAMES.iter().map(move |name| dir.join(name)))
        .chain(INSTALL_PATHS.iter().map(|p| PathBuf::from(*p)))
        .find(|candidate| candidate.is_file())
}

fn browser_config(exe: &Path, headless: bool) -> Result<BrowserConfig> {
    let (width, height) = WINDOW;
    let mut builder = BrowserConfig::builder()
        .chrome_executable(exe)
        .viewport(Viewport {
            width,
            height,
            device_scale_factor: Some(1.0),
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .window_size(width, height)
        .args(LAUNCH_FLAGS.iter().copied())
        .arg(format!("--user-agent={}", random_user_agent()));
    if !headless {
        builder = builder.with_head();
    }
    builder.build().map_err(|e| anyhow!("invalid browser config: {}", e))
}

/// A running browser and the task draining its CDP events. The task must
/// outlive every CDP call made through the session.
pub struct BrowserSession {
    pub browser: Browser,
    events: JoinHandle<()>,
}

impl BrowserSession {
    pub async fn open_page(&self, url: &str) -> Result<Page> {
        self.browser
            .new_page(url)
            .await
            .map_err(|e| anyhow!("opening {}: {}", url, e))
    }

    /// Best effort: a browser that refuses to close is only logged.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("browser did not close cleanly: {}", e);
        }
        self.events.abort();
        info!("🛑 Browser closed");
    }
}

pub async fn launch_browser(headless: bool) -> Result<BrowserSession> {
    let exe = find_chrome_executable()
        .context("no Chromium-family browser found; install one or set CHROME_EXECUTABLE")?;
    info!("🚀 Launching {} (headless: {})", exe.display(), headless);

    let (browser, mut handler) = Browser::launch(browser_config(&exe, headless)?)
        .await
        .map_err(|e| anyhow!("launching {}: {}", exe.display(), e))?;
    let events = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                debug!("CDP event error: {}", e);
            }
        }
    });

    Ok(BrowserSession { browser, events })
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Deserialize)]
struct LoadState {
    complete: bool,
    resources: u64,
}

async fn load_state(page: &Page) -> LoadState {
    const JS: &str = r#"({
        complete: document.readyState === "complete",
        resources: performance.getEntriesByType("resource").length
    })"#;
    match page.evaluate(JS).await {
        Ok(v) => v.into_value().unwrap_or_default(),
        Err(e) => {
            debug!("load state unavailable: {}", e);
            LoadState::default()
        }
    }
}

/// Before the first harvest attempt: wait for the document to finish loading
/// and for the resource count to hold still for `quiet_ms`. Gives up quietly
/// after `timeout_ms`, since many grids keep polling forever.
pub async fn wait_until_stable(page: &Page, quiet_ms: u64, timeout_ms: u64) {
    let quiet = Duration::from_millis(quiet_ms);
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    let mut previous = LoadState::default();
    let mut quiet_since = Instant::now();

    while Instant::now() < deadline {
        let state = load_state(page).await;
        if !state.complete || state != previous {
            previous = state;
            quiet_since = Instant::now();
        } else if quiet_since.elapsed() >= quiet {
            info!("page settled with {} resources loaded", state.resources);
            return;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    info!("page still loading after {}ms; harvesting anyway", timeout_ms);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_comes_from_pool() {
        assert!(DESKTOP_USER_AGENTS.contains(&random_user_agent()));
    }

    #[test]
    fn install_paths_are_absolute() {
        assert!(INSTALL_PATHS.iter().all(|p| Path::new(p).is_absolute()));
    }

    #[test]
    fn load_state_reads_evaluation_json() {
        let state: LoadState =
            serde_json::from_value(serde_json::json!({ "complete": true, "resources": 12 })).unwrap();
        assert_eq!(state, LoadState { complete: true, resources: 12 });
    }
}

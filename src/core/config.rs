use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// ---------------------------------------------------------------------------
// HarvestConfig: file-based config loader (table-harvest.json) with env-var fallback
// ---------------------------------------------------------------------------

pub const ENV_CONFIG_PATH: &str = "TABLE_HARVEST_CONFIG";
pub const ENV_CHROME_EXECUTABLE: &str = "CHROME_EXECUTABLE";

/// How a row's dedup key is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    /// First field, else all fields joined, else raw text.
    #[default]
    Content,
    /// Renderer-provided row identity when present, else `Content`.
    PreferIdentity,
}

impl FromStr for KeyStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "content" => Ok(KeyStrategy::Content),
            "prefer_identity" | "identity" => Ok(KeyStrategy::PreferIdentity),
            other => Err(format!("unknown key strategy '{}'", other)),
        }
    }
}

/// Mirrors `table-harvest.json`. Every key is optional; see the `resolve_*`
/// methods for the env-var names and defaults.
#[derive(Deserialize, Default, Clone, Debug)]
pub struct HarvestConfig {
    pub attempt_ceiling: Option<u64>,
    pub wall_clock_ceiling_secs: Option<u64>,
    pub settle_ms: Option<u64>,
    pub no_progress_stop_threshold: Option<u32>,
    /// Must stay below the stop threshold to have any effect.
    pub escalate_threshold: Option<u32>,
    pub row_wait_timeout_ms: Option<u64>,
    pub loading_timeout_ms: Option<u64>,
    pub page_settle_ms: Option<u64>,
    pub page_ceiling: Option<u32>,
    pub paginate: Option<bool>,
    pub wheel_delta: Option<f64>,
    pub key_strategy: Option<KeyStrategy>,
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    let v = std::env::var(key).ok()?;
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl HarvestConfig {
    /// Attempt ceiling: JSON field → `TABLE_HARVEST_ATTEMPT_CEILING` → 20000.
    pub fn resolve_attempt_ceiling(&self) -> u64 {
        self.attempt_ceiling
            .or_else(|| env_parse("TABLE_HARVEST_ATTEMPT_CEILING"))
            .unwrap_or(20_000)
    }

    /// Wall-clock ceiling: JSON field → `TABLE_HARVEST_WALL_CLOCK_SECS` → 45 minutes.
    pub fn resolve_wall_clock_ceiling(&self) -> Duration {
        let secs = self
            .wall_clock_ceiling_secs
            .or_else(|| env_parse("TABLE_HARVEST_WALL_CLOCK_SECS"))
            .unwrap_or(45 * 60);
        Duration::from_secs(secs)
    }

    /// Settle pause after each advance: JSON field → `TABLE_HARVEST_SETTLE_MS` → 200 ms.
    pub fn resolve_settle(&self) -> Duration {
        let ms = self
            .settle_ms
            .or_else(|| env_parse("TABLE_HARVEST_SETTLE_MS"))
            .unwrap_or(200);
        Duration::from_millis(ms)
    }

    /// JSON field → `TABLE_HARVEST_STOP_THRESHOLD` → 5.
    pub fn resolve_no_progress_stop_threshold(&self) -> u32 {
        self.no_progress_stop_threshold
            .or_else(|| env_parse("TABLE_HARVEST_STOP_THRESHOLD"))
            .unwrap_or(5)
            .max(1)
    }

    /// JSON field → `TABLE_HARVEST_ESCALATE_THRESHOLD` → 3.
    pub fn resolve_escalate_threshold(&self) -> u32 {
        self.escalate_threshold
            .or_else(|| env_parse("TABLE_HARVEST_ESCALATE_THRESHOLD"))
            .unwrap_or(3)
            .max(1)
    }

    /// JSON field → `TABLE_HARVEST_ROW_WAIT_MS` → 5000 ms.
    pub fn resolve_row_wait_timeout(&self) -> Duration {
        let ms = self
            .row_wait_timeout_ms
            .or_else(|| env_parse("TABLE_HARVEST_ROW_WAIT_MS"))
            .unwrap_or(5_000);
        Duration::from_millis(ms)
    }

    /// JSON field → `TABLE_HARVEST_LOADING_TIMEOUT_MS` → 15000 ms.
    pub fn resolve_loading_timeout(&self) -> Duration {
        let ms = self
            .loading_timeout_ms
            .or_else(|| env_parse("TABLE_HARVEST_LOADING_TIMEOUT_MS"))
            .unwrap_or(15_000);
        Duration::from_millis(ms)
    }

    /// JSON field → `TABLE_HARVEST_PAGE_SETTLE_MS` → 2000 ms.
    pub fn resolve_page_settle(&self) -> Duration {
        let ms = self
            .page_settle_ms
            .or_else(|| env_parse("TABLE_HARVEST_PAGE_SETTLE_MS"))
            .unwrap_or(2_000);
        Duration::from_millis(ms)
    }

    /// JSON field → `TABLE_HARVEST_PAGE_CEILING` → 50.
    pub fn resolve_page_ceiling(&self) -> u32 {
        self.page_ceiling
            .or_else(|| env_parse("TABLE_HARVEST_PAGE_CEILING"))
            .unwrap_or(50)
    }

    /// JSON field → `TABLE_HARVEST_PAGINATE` (set to "0" to disable) → `true`.
    pub fn resolve_paginate(&self) -> bool {
        self.paginate
            .or_else(|| env_flag("TABLE_HARVEST_PAGINATE"))
            .unwrap_or(true)
    }

    /// JSON field → `TABLE_HARVEST_WHEEL_DELTA` → 1000 px.
    pub fn resolve_wheel_delta(&self) -> f64 {
        self.wheel_delta
            .or_else(|| env_parse("TABLE_HARVEST_WHEEL_DELTA"))
            .unwrap_or(1000.0)
    }

    /// JSON field → `TABLE_HARVEST_KEY_STRATEGY` → `content`.
    pub fn resolve_key_strategy(&self) -> KeyStrategy {
        self.key_strategy
            .or_else(|| env_parse("TABLE_HARVEST_KEY_STRATEGY"))
            .unwrap_or_default()
    }

    pub fn resolve(&self) -> HarvestSettings {
        HarvestSettings {
            attempt_ceiling: self.resolve_attempt_ceiling(),
            wall_clock_ceiling: self.resolve_wall_clock_ceiling(),
            settle: self.resolve_settle(),
            no_progress_stop_threshold: self.resolve_no_progress_stop_threshold(),
            escalate_threshold: self.resolve_escalate_threshold(),
            row_wait_timeout: self.resolve_row_wait_timeout(),
            loading_timeout: self.resolve_loading_timeout(),
            page_settle: self.resolve_page_settle(),
            page_ceiling: self.resolve_page_ceiling(),
            paginate: self.resolve_paginate(),
            wheel_delta: self.resolve_wheel_delta(),
            key_strategy: self.resolve_key_strategy(),
        }
    }
}

/// Fully resolved knobs consumed by the harvester.
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestSettings {
    pub attempt_ceiling: u64,
    pub wall_clock_ceiling: Duration,
    pub settle: Duration,
    pub no_progress_stop_threshold: u32,
    pub escalate_threshold: u32,
    pub row_wait_timeout: Duration,
    pub loading_timeout: Duration,
    pub page_settle: Duration,
    pub page_ceiling: u32,
    pub paginate: bool,
    pub wheel_delta: f64,
    pub key_strategy: KeyStrategy,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            attempt_ceiling: 20_000,
            wall_clock_ceiling: Duration::from_secs(45 * 60),
            settle: Duration::from_millis(200),
            no_progress_stop_threshold: 5,
            escalate_threshold: 3,
            row_wait_timeout: Duration::from_millis(5_000),
            loading_timeout: Duration::from_millis(15_000),
            page_settle: Duration::from_millis(2_000),
            page_ceiling: 50,
            paginate: true,
            wheel_delta: 1000.0,
            key_strategy: KeyStrategy::Content,
        }
    }
}

/// Load `table-harvest.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `TABLE_HARVEST_CONFIG` env var path
/// 2. `./table-harvest.json`
/// 3. `~/.table-harvest/config.json`
///
/// Missing file → `HarvestConfig::default()` (all env-var fallbacks apply).
/// Parse error → log a warning, return `HarvestConfig::default()`.
pub fn load_harvest_config() -> HarvestConfig {
    let mut candidates: Vec<PathBuf> = vec![PathBuf::from("table-harvest.json")];
    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        candidates.insert(0, PathBuf::from(env_path));
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".table-harvest").join("config.json"));
    }

    for path in &candidates {
        let Ok(contents) = std::fs::read_to_string(path) else {
            continue;
        };
        return match serde_json::from_str::<HarvestConfig>(&contents) {
            Ok(cfg) => {
                tracing::info!("config loaded from {}", path.display());
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    "config parse error at {}: {}, using defaults",
                    path.display(),
                    e
                );
                HarvestConfig::default()
            }
        };
    }

    HarvestConfig::default()
}

/// Optional override for the Chromium-family browser executable.
/// Only returns a value when `CHROME_EXECUTABLE` points at an existing path.
pub fn chrome_executable_override() -> Option<String> {
    let p = std::env::var(ENV_CHROME_EXECUTABLE).ok()?;
    let p = p.trim();
    if p.is_empty() || !std::path::Path::new(p).exists() {
        return None;
    }
    Some(p.to_string())
}

// Configuration type definitions

use std::path::PathBuf;

use serde::Deserialize;

/// Log level used when RUST_LOG is not set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,
}

/// Persistent store configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file; defaults to `<data dir>/formfill/suggestions.db`
    pub path: Option<PathBuf>,
    /// Upper bound for a single store job, in milliseconds
    pub io_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            path: None,
            io_timeout_ms: 2000,
        }
    }
}

/// Suggestion ranking configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SuggestionsConfig {
    pub limit: usize,
    /// Below this many same-site results, history from other sites is merged in
    pub min_scoped_results: usize,
    pub live_query_debounce_ms: u64,
    /// Live queries start once the trimmed value is longer than this
    pub live_query_min_chars: usize,
}

impl Default for SuggestionsConfig {
    fn default() -> Self {
        SuggestionsConfig {
            limit: 15,
            min_scoped_results: 5,
            live_query_debounce_ms: 200,
            live_query_min_chars: 2,
        }
    }
}

/// Keyboard visibility configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeyboardConfig {
    pub throttle_ms: u64,
    /// Fraction of the total height the keyboard must exceed to count as visible
    pub visibility_ratio: f32,
    pub height_change_px: u32,
    pub hide_recheck_ms: u64,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        KeyboardConfig {
            throttle_ms: 100,
            visibility_ratio: 0.05,
            height_change_px: 50,
            hide_recheck_ms: 200,
        }
    }
}

/// Lower bound for the observer's URL poll period, in milliseconds
pub const MIN_URL_POLL_INTERVAL_MS: u64 = 100;

/// Bridge injection configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Name of the host object the observer posts messages to
    pub channel: String,
    /// Delay between injection and the presence check
    pub verify_delay_ms: u64,
    /// Delay before the single re-injection attempt
    pub retry_delay_ms: u64,
    /// URL change polling period; values below 100 ms are raised to 100
    pub url_poll_interval_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            channel: "formfillBridge".to_string(),
            verify_delay_ms: 300,
            retry_delay_ms: 1000,
            url_poll_interval_ms: 500,
        }
    }
}

impl BridgeConfig {
    pub fn url_poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.url_poll_interval_ms.max(MIN_URL_POLL_INTERVAL_MS))
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub suggestions: SuggestionsConfig,
    #[serde(default)]
    pub keyboard: KeyboardConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub log: LogConfig,
}

// =============================================================================
// Runtime Configuration — engine settings with atomic save
// =============================================================================
//
// Every tunable parameter of the signal gate lives here: the instrument
// universe, cycle cadence, scoring threshold, risk limits, the candle feed and
// the paper account.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash. All fields carry serde defaults so that adding new fields never
// breaks loading an older config file.
//
// =============================================================================

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::binance::client::DEFAULT_BASE_URL;
use crate::risk::RiskConfig;
use crate::types::TradingMode;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_trading_mode() -> TradingMode {
    TradingMode::Live
}

fn default_symbols() -> Vec<String> {
    vec![
        "BTCUSDT".to_string(),
        "ETHUSDT".to_string(),
        "SOLUSDT".to_string(),
        "DOGEUSDT".to_string(),
    ]
}

fn default_timeframe() -> String {
    "5m".to_string()
}

fn default_lookback_periods() -> usize {
    100
}

fn default_signal_interval_secs() -> u64 {
    120
}

fn default_call_timeout_secs() -> u64 {
    10
}

fn default_min_confidence() -> u32 {
    60
}

fn default_journal_dir() -> String {
    "signals".to_string()
}

fn default_binance_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_replay_warmup() -> usize {
    100
}

fn default_starting_balance() -> f64 {
    10_000.0
}

fn default_leverage() -> f64 {
    100.0
}

// =============================================================================
// Feed
// =============================================================================

/// Where the paper broker gets its candles from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FeedConfig {
    /// Public Binance klines.
    Binance {
        #[serde(default = "default_binance_base_url")]
        base_url: String,
    },
    /// Candles replayed from a JSON file.
    Replay {
        path: String,
        /// Reveal one more bar per fetch instead of serving the whole file.
        #[serde(default)]
        stepping: bool,
        /// Bars visible on the first fetch in stepping mode.
        #[serde(default = "default_replay_warmup")]
        warmup: usize,
    },
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self::Binance {
            base_url: default_binance_base_url(),
        }
    }
}

// =============================================================================
// Paper account
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperParams {
    #[serde(default = "default_starting_balance")]
    pub starting_balance: f64,

    #[serde(default = "default_leverage")]
    pub leverage: f64,
}

impl Default for PaperParams {
    fn default() -> Self {
        Self {
            starting_balance: default_starting_balance(),
            leverage: default_leverage(),
        }
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Operational mode ---------------------------------------------------

    /// Live places orders, Paused only scores and journals, Killed stops
    /// the cycle loop.
    #[serde(default = "default_trading_mode")]
    pub trading_mode: TradingMode,

    // --- Universe & cadence -------------------------------------------------

    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Candle timeframe passed to the feed, e.g. "5m".
    #[serde(default = "default_timeframe")]
    pub timeframe: String,

    /// Candles fetched and kept per instrument.
    #[serde(default = "default_lookback_periods")]
    pub lookback_periods: usize,

    /// Seconds between the end of one cycle and the start of the next.
    #[serde(default = "default_signal_interval_secs")]
    pub signal_interval_secs: u64,

    /// Upper bound on any single broker call.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    // --- Scoring -------------------------------------------------------------

    /// Minimum winning score for a buy / sell decision.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: u32,

    /// Log every instrument's scores and near misses.
    #[serde(default = "default_true")]
    pub verbose_mode: bool,

    // --- Risk ----------------------------------------------------------------

    #[serde(default)]
    pub risk: RiskConfig,

    // --- Venue ---------------------------------------------------------------

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub paper: PaperParams,

    /// Directory for `latest.json` and timestamped cycle snapshots.
    #[serde(default = "default_journal_dir")]
    pub journal_dir: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            trading_mode: default_trading_mode(),
            symbols: default_symbols(),
            timeframe: default_timeframe(),
            lookback_periods: default_lookback_periods(),
            signal_interval_secs: default_signal_interval_secs(),
            call_timeout_secs: default_call_timeout_secs(),
            min_confidence: default_min_confidence(),
            verbose_mode: true,
            risk: RiskConfig::default(),
            feed: FeedConfig::default(),
            paper: PaperParams::default(),
            journal_dir: default_journal_dir(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("invalid runtime config in {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            trading_mode = %config.trading_mode,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self).context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.timeframe.trim().is_empty() {
            bail!("timeframe must not be empty");
        }
        if self.lookback_periods == 0 {
            bail!("lookback_periods must be at least 1");
        }
        if self.signal_interval_secs == 0 {
            bail!("signal_interval_secs must be at least 1");
        }
        if self.min_confidence > 100 {
            bail!("min_confidence must be within 0..=100, got {}", self.min_confidence);
        }
        let risk = &self.risk;
        if !(risk.risk_per_trade > 0.0 && risk.risk_per_trade < 1.0) {
            bail!("risk.risk_per_trade must be within (0, 1), got {}", risk.risk_per_trade);
        }
        if !(risk.max_daily_loss > 0.0 && risk.max_daily_loss <= 1.0) {
            bail!("risk.max_daily_loss must be within (0, 1], got {}", risk.max_daily_loss);
        }
        if risk.margin_buffer < 0.0 {
            bail!("risk.margin_buffer must not be negative");
        }
        if let Some(cap) = risk.max_volume {
            if cap <= 0.0 {
                bail!("risk.max_volume must be positive when set, got {cap}");
            }
        }
        if self.paper.starting_balance <= 0.0 {
            bail!("paper.starting_balance must be positive");
        }
        Ok(())
    }
}

/// Parse a comma separated instrument list, e.g. from an env var.
pub fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.trading_mode, TradingMode::Live);
        assert_eq!(cfg.symbols.len(), 4);
        assert_eq!(cfg.symbols[0], "BTCUSDT");
        assert_eq!(cfg.timeframe, "5m");
        assert_eq!(cfg.lookback_periods, 100);
        assert_eq!(cfg.signal_interval_secs, 120);
        assert_eq!(cfg.min_confidence, 60);
        assert!(cfg.verbose_mode);
        assert!((cfg.risk.risk_per_trade - 0.02).abs() < f64::EPSILON);
        assert!((cfg.risk.max_daily_loss - 0.05).abs() < f64::EPSILON);
        assert_eq!(cfg.risk.max_open_trades, 5);
        assert_eq!(cfg.risk.max_volume, None);
        assert!(!cfg.risk.auto_daily_rollover);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.trading_mode, TradingMode::Live);
        assert_eq!(cfg.feed, FeedConfig::default());
        assert_eq!(cfg.paper, PaperParams::default());
        assert_eq!(cfg.risk, RiskConfig::default());
        assert_eq!(cfg.journal_dir, "signals");
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{
            "trading_mode": "Paused",
            "symbols": ["ETHUSDT"],
            "risk": { "max_open_trades": 2, "max_volume": 1.5 },
            "feed": { "kind": "replay", "path": "data/replay.json", "stepping": true }
        }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.trading_mode, TradingMode::Paused);
        assert_eq!(cfg.symbols, vec!["ETHUSDT"]);
        assert_eq!(cfg.risk.max_open_trades, 2);
        assert_eq!(cfg.risk.max_volume, Some(1.5));
        assert!((cfg.risk.margin_buffer - 0.2).abs() < f64::EPSILON);
        assert_eq!(
            cfg.feed,
            FeedConfig::Replay {
                path: "data/replay.json".to_string(),
                stepping: true,
                warmup: 100,
            }
        );
    }

    #[test]
    fn save_then_load() {
        let path = std::env::temp_dir().join(format!("runtime_config_{}.json", uuid::Uuid::new_v4()));
        let mut cfg = RuntimeConfig::default();
        cfg.min_confidence = 75;
        cfg.save(&path).unwrap();

        let loaded = RuntimeConfig::load(&path).unwrap();
        assert_eq!(loaded.min_confidence, 75);
        assert_eq!(loaded.symbols, cfg.symbols);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = RuntimeConfig::default();
        cfg.min_confidence = 101;
        assert!(cfg.validate().is_err());

        let mut cfg = RuntimeConfig::default();
        cfg.lookback_periods = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = RuntimeConfig::default();
        cfg.risk.risk_per_trade = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = RuntimeConfig::default();
        cfg.risk.max_volume = Some(0.0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn symbols_from_env_string() {
        assert_eq!(parse_symbols(" btcusdt, ETHUSDT ,,sol "), vec!["BTCUSDT", "ETHUSDT", "SOL"]);
        assert!(parse_symbols("").is_empty());
    }
}

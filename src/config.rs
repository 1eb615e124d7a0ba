//! Configuration types for strike-edge

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    pub feed: FeedConfig,
    pub market: MarketConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    pub series: SeriesTable,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Evaluation loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Evaluation tick interval per series (milliseconds)
    #[serde(default = "default_loop_interval_ms")]
    pub loop_interval_ms: u64,
}

fn default_loop_interval_ms() -> u64 {
    1000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            loop_interval_ms: 1000,
        }
    }
}

/// Reference spot feed configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub symbol: String,
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
    /// Spot poll interval (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Quote older than this is reported as unavailable (seconds)
    #[serde(default = "default_unavailable_after_secs")]
    pub unavailable_after_secs: u64,
}

fn default_rest_url() -> String {
    "https://api.binance.com".to_string()
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_unavailable_after_secs() -> u64 {
    10
}

/// Market discovery configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    #[serde(default = "default_gamma_api_url")]
    pub gamma_api_url: String,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

fn default_gamma_api_url() -> String {
    "https://gamma-api.polymarket.com".to_string()
}
fn default_refresh_interval_secs() -> u64 {
    5
}

/// Contract YES-price stream configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Subscribed but no update within this window means the quote is stale (seconds)
    #[serde(default = "default_stream_stale_after_secs")]
    pub stale_after_secs: u64,
}

fn default_ws_url() -> String {
    "wss://ws-subscriptions-clob.polymarket.com/ws/market".to_string()
}
fn default_initial_backoff_ms() -> u64 {
    1000
}
fn default_max_backoff_ms() -> u64 {
    30_000
}
fn default_stream_stale_after_secs() -> u64 {
    10
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            stale_after_secs: default_stream_stale_after_secs(),
        }
    }
}

/// Probability model selection
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Log-distance to strike normalized by annualized volatility
    #[default]
    Lognormal,
    /// Step function on spot vs strike
    Threshold,
}

/// Probability model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub kind: ModelKind,
    #[serde(default = "default_sigma_annual")]
    pub sigma_annual: f64,
}

fn default_sigma_annual() -> f64 {
    0.8
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::Lognormal,
            sigma_annual: 0.8,
        }
    }
}

/// Signal generation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SignalConfig {
    #[serde(default = "default_edge_threshold_bps")]
    pub edge_threshold_bps: Decimal,
    /// Minimum seconds between approved opens per series
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

fn default_edge_threshold_bps() -> Decimal {
    dec!(800)
}
fn default_cooldown_secs() -> u64 {
    20
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            edge_threshold_bps: dec!(800),
            cooldown_secs: 20,
        }
    }
}

/// Risk management configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_stop_loss_usd")]
    pub stop_loss_usd: Decimal,
    #[serde(default = "default_take_profit_usd")]
    pub take_profit_usd: Decimal,
    /// Cumulative realized loss across all series that trips the kill switch
    #[serde(default = "default_max_cumulative_loss_usd")]
    pub max_cumulative_loss_usd: Decimal,
    /// A feed down for longer than this trips the kill switch (seconds)
    #[serde(default = "default_fatal_staleness_secs")]
    pub fatal_staleness_secs: u64,
    /// Reject rate above this trips the kill switch
    #[serde(default = "default_max_reject_rate")]
    pub max_reject_rate: f64,
    /// Minimum decisions before the reject-rate alert is armed
    #[serde(default = "default_alert_min_decisions")]
    pub alert_min_decisions: u64,
}

fn default_stop_loss_usd() -> Decimal {
    dec!(12)
}
fn default_take_profit_usd() -> Decimal {
    dec!(18)
}
fn default_max_cumulative_loss_usd() -> Decimal {
    dec!(100)
}
fn default_fatal_staleness_secs() -> u64 {
    30
}
fn default_max_reject_rate() -> f64 {
    0.1
}
fn default_alert_min_decisions() -> u64 {
    10
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            stop_loss_usd: dec!(12),
            take_profit_usd: dec!(18),
            max_cumulative_loss_usd: dec!(100),
            fatal_staleness_secs: 30,
            max_reject_rate: 0.1,
            alert_min_decisions: 10,
        }
    }
}

/// Paper execution configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Fixed USD notional per paper position
    #[serde(default = "default_position_size_usd")]
    pub position_size_usd: Decimal,
}

fn default_position_size_usd() -> Decimal {
    dec!(25)
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            position_size_usd: dec!(25),
        }
    }
}

/// Per-series discovery and hold parameters
#[derive(Debug, Clone, Deserialize)]
pub struct SeriesConfig {
    pub slug_prefix: String,
    pub seed_slug: String,
    pub min_hold_secs: u64,
}

/// Both tracked series
#[derive(Debug, Clone, Deserialize)]
pub struct SeriesTable {
    pub five_min: SeriesConfig,
    pub fifteen_min: SeriesConfig,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_audit_dir")]
    pub audit_dir: PathBuf,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_audit_dir() -> PathBuf {
    PathBuf::from("runs/telemetry")
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            audit_dir: PathBuf::from("runs/telemetry"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file and validate it
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration; everything downstream assumes this passed
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.app.loop_interval_ms == 0 {
            anyhow::bail!("app.loop_interval_ms must be > 0");
        }
        if self.feed.symbol.is_empty() {
            anyhow::bail!("feed.symbol must be set");
        }
        if self.feed.poll_interval_ms == 0 {
            anyhow::bail!("feed.poll_interval_ms must be > 0");
        }
        if self.market.refresh_interval_secs == 0 {
            anyhow::bail!("market.refresh_interval_secs must be > 0");
        }
        if self.stream.ws_url.is_empty() {
            anyhow::bail!("stream.ws_url must be set");
        }
        if self.stream.initial_backoff_ms == 0 {
            anyhow::bail!("stream.initial_backoff_ms must be > 0");
        }
        if self.stream.max_backoff_ms < self.stream.initial_backoff_ms {
            anyhow::bail!("stream.max_backoff_ms must be >= stream.initial_backoff_ms");
        }
        if self.model.sigma_annual <= 0.0 {
            anyhow::bail!("model.sigma_annual must be > 0");
        }
        if self.signal.edge_threshold_bps <= Decimal::ZERO {
            anyhow::bail!("signal.edge_threshold_bps must be > 0");
        }
        if self.risk.stop_loss_usd <= Decimal::ZERO {
            anyhow::bail!("risk.stop_loss_usd must be > 0");
        }
        if self.risk.take_profit_usd <= Decimal::ZERO {
            anyhow::bail!("risk.take_profit_usd must be > 0");
        }
        if self.risk.max_cumulative_loss_usd <= Decimal::ZERO {
            anyhow::bail!("risk.max_cumulative_loss_usd must be > 0");
        }
        if self.execution.position_size_usd <= Decimal::ZERO {
            anyhow::bail!("execution.position_size_usd must be > 0");
        }
        for (name, series) in [
            ("series.five_min", &self.series.five_min),
            ("series.fifteen_min", &self.series.fifteen_min),
        ] {
            if series.slug_prefix.is_empty() {
                anyhow::bail!("{name}.slug_prefix must be set");
            }
            if series.seed_slug.is_empty() {
                anyhow::bail!("{name}.seed_slug must be set");
            }
        }
        Ok(())
    }
}

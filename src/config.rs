use anyhow::{ensure, Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::collections::HashSet;

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Top-level application configuration, loaded once at startup
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub strategy: StrategyConfig,
    pub windows: WindowConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    pub assets: Vec<AssetConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    /// Breakout multiplier applied to the volatility range
    pub k: f64,
    /// Smallest order notional the exchange accepts, in KRW
    #[serde(default = "default_min_order_krw")]
    pub min_order_krw: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    pub mode: WindowMode,
    /// Single mode: minutes reserved for liquidation before the next open
    #[serde(default = "default_liquidation_margin")]
    pub liquidation_margin_minutes: i64,
    /// Four-window mode: phase boundaries as minutes after the daily open
    #[serde(default = "default_offsets")]
    pub offsets_minutes: [i64; 3],
}

/// Window policy, which also fixes the breakout horizon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowMode {
    /// One buy window, liquidation at the tail, daily-range target
    Single,
    /// Alternating buy/sell windows on a 12-hour breakout horizon
    FourWindow,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub confirmation: ConfirmationPolicy,
}

/// What to do when fill confirmation attempts run out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfirmationPolicy {
    /// Treat the order as failed and terminate
    #[default]
    Strict,
    /// Record the requested volume/price instead, with a warning
    Lenient,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyConfig {
    /// Discord-compatible webhook; empty disables delivery
    #[serde(default)]
    pub webhook_url: String,
}

impl NotifyConfig {
    pub fn webhook(&self) -> Option<String> {
        let trimmed = self.webhook_url.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetConfig {
    /// Base currency symbol, e.g. "ETH"
    pub symbol: String,
    /// Fraction of the remaining balance allocated on a breakout
    pub weight: f64,
}

impl AssetConfig {
    /// Upbit market code in the KRW quote market
    pub fn market(&self) -> String {
        format!("KRW-{}", self.symbol)
    }
}

fn default_min_order_krw() -> f64 {
    5_000.0
}

fn default_liquidation_margin() -> i64 {
    20
}

// 11:40, 12:00 and 23:40 after the daily open
fn default_offsets() -> [i64; 3] {
    [700, 720, 1420]
}

impl AppConfig {
    /// Load from a TOML file with `BOT_`-prefixed environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(path))
            .add_source(config::Environment::with_prefix("BOT").separator("__"))
            .build()
            .context("Failed to load configuration")?;

        let app: AppConfig = settings
            .try_deserialize()
            .context("Invalid configuration format")?;
        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.assets.is_empty(),
            "At least one asset must be configured"
        );

        let mut seen = HashSet::new();
        for asset in &self.assets {
            ensure!(
                !asset.symbol.trim().is_empty(),
                "Asset symbol cannot be empty"
            );
            ensure!(
                seen.insert(asset.symbol.clone()),
                "Duplicate asset symbol: {}",
                asset.symbol
            );
            ensure!(
                asset.weight > 0.0 && asset.weight <= 1.0,
                "Asset {} weight must be in (0, 1], got {}",
                asset.symbol,
                asset.weight
            );
        }

        ensure!(
            self.strategy.k > 0.0,
            "Breakout multiplier k must be positive, got {}",
            self.strategy.k
        );
        ensure!(
            self.strategy.min_order_krw > 0.0,
            "Minimum order notional must be positive"
        );

        let margin = self.windows.liquidation_margin_minutes;
        ensure!(
            margin > 0 && margin < MINUTES_PER_DAY,
            "Liquidation margin must fall inside the trading day, got {} minutes",
            margin
        );

        let offsets = self.windows.offsets_minutes;
        ensure!(
            offsets[0] > 0 && offsets[2] < MINUTES_PER_DAY,
            "Window offsets must fall inside the trading day"
        );
        ensure!(
            offsets[0] < offsets[1] && offsets[1] < offsets[2],
            "Window offsets must be strictly increasing, got {:?}",
            offsets
        );

        Ok(())
    }
}

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::api::ExchangeApi;
use crate::config::{AppConfig, AssetConfig};
use crate::execution::{DayLedger, OrderExecutor};
use crate::models::{Fill, TradeSide};
use crate::notify::Notifier;
use crate::report;
use crate::schedule::{phase_at, ResetSchedule, TradePhase, WindowPlan};
use crate::strategy::breakout;
use crate::{BotError, Result};

pub const QUOTE_CURRENCY: &str = "KRW";

const CYCLE_DELAY: Duration = Duration::from_secs(1);
const ERROR_BACKOFF: Duration = Duration::from_secs(10);

/// Top-level driver: one cycle per second, resets before trading,
/// transient errors back off, anything else ends the process.
pub struct TradingEngine<E: ExchangeApi> {
    exchange: E,
    notifier: Notifier,
    executor: OrderExecutor,
    plan: WindowPlan,
    schedule: ResetSchedule,
    assets: Vec<AssetConfig>,
    k: f64,
    min_order_krw: f64,
    ledger: DayLedger,
}

impl<E: ExchangeApi> TradingEngine<E> {
    /// Seed the ledger from the live balance and announce startup
    pub async fn new(exchange: E, notifier: Notifier, config: &AppConfig) -> Result<Self> {
        let starting_balance = exchange.balance(QUOTE_CURRENCY).await?;

        let plan = WindowPlan::from_config(&config.windows);
        let schedule = ResetSchedule::new(plan.has_midday_reset());
        let symbols: Vec<String> = config.assets.iter().map(|a| a.symbol.clone()).collect();
        let ledger = DayLedger::new(&symbols, starting_balance);

        let engine = Self {
            exchange,
            notifier,
            executor: OrderExecutor::new(config.execution.confirmation),
            plan,
            schedule,
            assets: config.assets.clone(),
            k: config.strategy.k,
            min_order_krw: config.strategy.min_order_krw,
            ledger,
        };

        tracing::info!(
            "💰 Starting balance: {} KRW",
            report::format_krw(starting_balance)
        );
        engine
            .notifier
            .send(&format!(
                "🔔 Breakout bot started | balance {} KRW",
                report::format_krw(starting_balance)
            ))
            .await;

        Ok(engine)
    }

    /// Current day state (tests and diagnostics)
    pub fn ledger(&self) -> &DayLedger {
        &self.ledger
    }

    /// Run until a fatal error. Transient errors back off and resume with
    /// state intact; the returned error is always fatal.
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!("🚀 Trading loop started");

        loop {
            match self.run_cycle().await {
                Ok(()) => {}
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        "⚠️ Transient error: {} - backing off {}s",
                        e,
                        ERROR_BACKOFF.as_secs()
                    );
                    self.notifier
                        .send(&format!(
                            "⚠️ Transient error: {e} - retrying in {}s",
                            ERROR_BACKOFF.as_secs()
                        ))
                        .await;
                    tokio::time::sleep(ERROR_BACKOFF).await;
                    continue;
                }
                Err(e) => {
                    tracing::error!("❌ Fatal error: {} - shutting down", e);
                    self.notifier
                        .send(&format!("❌ Fatal error: {e} - shutting down"))
                        .await;
                    return Err(e);
                }
            }

            tokio::time::sleep(CYCLE_DELAY).await;
        }
    }

    async fn run_cycle(&mut self) -> Result<()> {
        self.run_cycle_at(Utc::now()).await
    }

    /// One cycle against an explicit instant (tests inject time here)
    pub async fn run_cycle_at(&mut self, now: DateTime<Utc>) -> Result<()> {
        let day_start = self.fetch_day_start().await?;

        // A due reset completes before any trading logic sees the cycle
        if let Some(boundary) = self.schedule.due(now, day_start) {
            self.perform_reset().await?;
            self.schedule.mark_fired(boundary);
        }

        match phase_at(now, day_start, &self.plan) {
            TradePhase::Buy => self.scan_buy_phase().await,
            TradePhase::Sell => self.scan_sell_phase().await,
        }
    }

    /// Open of the exchange's current trading day, from the daily candle
    async fn fetch_day_start(&self) -> Result<DateTime<Utc>> {
        let market = self.primary_market()?;
        let candles = self.exchange.daily_candles(&market, 1).await?;

        candles
            .first()
            .map(|c| c.timestamp)
            .ok_or_else(|| BotError::Transient(format!("no daily candle for {market}")))
    }

    async fn scan_buy_phase(&mut self) -> Result<()> {
        if self.ledger.remaining_quote() <= self.min_order_krw {
            return Ok(());
        }

        for asset in self.assets.clone() {
            if self.ledger.is_bought(&asset.symbol) {
                continue;
            }

            let market = asset.market();
            let target = self.breakout_target(&market).await?;
            let ask = self.exchange.best_ask(&market).await?;
            if !breakout::breakout_triggered(ask, target) {
                continue;
            }

            tracing::info!(
                "📈 Breakout on {}: ask {} > target {}",
                market,
                report::format_krw(ask),
                report::format_krw(target)
            );

            let allocation = self.ledger.allocation(asset.weight);
            if allocation < self.min_order_krw {
                let warning = format!(
                    "⚠️ {} allocation {} KRW below minimum {} KRW, skipping for today",
                    asset.symbol,
                    report::format_krw(allocation),
                    report::format_krw(self.min_order_krw)
                );
                tracing::warn!("{}", warning);
                self.notifier.send(&warning).await;
                self.ledger.mark_bought_skipped(&asset.symbol)?;
                continue;
            }

            let fill = self
                .executor
                .execute_buy(&self.exchange, &market, allocation, ask)
                .await?;
            self.ledger.record_buy(&asset.symbol, fill.clone())?;
            self.announce_fill(TradeSide::Buy, &market, &fill).await;
        }

        Ok(())
    }

    async fn scan_sell_phase(&mut self) -> Result<()> {
        for asset in self.assets.clone() {
            if self.ledger.is_sold(&asset.symbol) {
                continue;
            }

            let balance = self.exchange.balance(&asset.symbol).await?;
            if balance <= 0.0 {
                continue;
            }

            let market = asset.market();
            let fill = self
                .executor
                .execute_sell(&self.exchange, &market, balance)
                .await?;
            self.ledger.record_sell(&asset.symbol, fill.clone())?;
            self.announce_fill(TradeSide::Sell, &market, &fill).await;
        }

        Ok(())
    }

    /// Day-boundary sequence: summary of the outgoing day, fresh ledger
    /// seeded from the live balance, then a start-of-day report.
    async fn perform_reset(&mut self) -> Result<()> {
        tracing::info!("🔄 Day boundary reached, resetting");

        let symbols = self.symbols();
        let summary = report::daily_summary(&self.ledger, &symbols);
        tracing::info!("{}", summary);
        self.notifier.send(&summary).await;

        // Refresh before the swap: a failed fetch leaves the old ledger
        // intact and the boundary unmarked, so the reset retries
        let fresh_balance = self.exchange.balance(QUOTE_CURRENCY).await?;
        self.ledger = DayLedger::new(&symbols, fresh_balance);

        match self.start_of_day_report().await {
            Ok(opening) => {
                tracing::info!("{}", opening);
                self.notifier.send(&opening).await;
            }
            // Informational only; the reset itself already completed
            Err(e) => tracing::warn!("Start-of-day report failed: {}", e),
        }

        self.notifier.send("🔄 Daily flags reset").await;
        Ok(())
    }

    async fn start_of_day_report(&self) -> Result<String> {
        let mut targets = Vec::new();
        for asset in &self.assets {
            let target = self.breakout_target(&asset.market()).await?;
            targets.push((asset.symbol.clone(), target));
        }

        Ok(report::start_of_day(
            self.ledger.day_start_balance(),
            &targets,
        ))
    }

    /// Target for the configured horizon; candle counts include the
    /// in-progress candle the calculators discard
    async fn breakout_target(&self, market: &str) -> Result<f64> {
        match &self.plan {
            WindowPlan::SingleDaily { .. } => {
                let candles = self
                    .exchange
                    .daily_candles(market, breakout::DAILY_FETCH_COUNT)
                    .await?;
                breakout::daily_target(&candles, self.k)
            }
            WindowPlan::FourWindow { .. } => {
                let candles = self
                    .exchange
                    .hourly_candles(market, breakout::HALF_DAY_FETCH_COUNT)
                    .await?;
                breakout::half_day_target(&candles, self.k)
            }
        }
    }

    async fn announce_fill(&self, side: TradeSide, market: &str, fill: &Fill) {
        let message = format!(
            "✅ {side} | {market} | volume: {:.6} | avg price: {} KRW",
            fill.volume,
            report::format_krw(fill.average_price)
        );
        tracing::info!("{}", message);
        self.notifier.send(&message).await;
    }

    fn symbols(&self) -> Vec<String> {
        self.assets.iter().map(|a| a.symbol.clone()).collect()
    }

    fn primary_market(&self) -> Result<String> {
        self.assets
            .first()
            .map(AssetConfig::market)
            .ok_or_else(|| BotError::Unexpected("no assets configured".to_string()))
    }
}

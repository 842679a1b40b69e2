pub mod upbit;

pub use upbit::UpbitClient;

use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{Candle, OrderReceipt, OrderUpdate};
use crate::Result;

/// Venue operations the trading engine depends on.
///
/// Candle queries return data newest first: element 0 is the candle still
/// accumulating and must not feed breakout targets.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Available balance per currency symbol
    async fn balances(&self) -> Result<HashMap<String, f64>>;

    /// Available balance for one currency, zero when the account lacks it
    async fn balance(&self, currency: &str) -> Result<f64> {
        Ok(self
            .balances()
            .await?
            .get(currency)
            .copied()
            .unwrap_or(0.0))
    }

    /// Lowest ask currently quoted for the market
    async fn best_ask(&self, market: &str) -> Result<f64>;

    /// Most recent daily candles, newest first
    async fn daily_candles(&self, market: &str, count: u32) -> Result<Vec<Candle>>;

    /// Most recent 60-minute candles, newest first
    async fn hourly_candles(&self, market: &str, count: u32) -> Result<Vec<Candle>>;

    /// Market buy spending `quote_amount` of the quote currency
    async fn submit_market_buy(&self, market: &str, quote_amount: f64) -> Result<OrderReceipt>;

    /// Market sell of `volume` base-asset units
    async fn submit_market_sell(&self, market: &str, volume: f64) -> Result<OrderReceipt>;

    /// Execution state of a previously submitted order
    async fn order_status(&self, order_id: &Uuid) -> Result<OrderUpdate>;
}

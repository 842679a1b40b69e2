use std::collections::HashMap;

use crate::models::Fill;
use crate::{BotError, Result};

/// Buy/sell fills recorded for one asset on one trading day
#[derive(Debug, Clone, Default)]
pub struct TradeLogEntry {
    pub buy: Option<Fill>,
    pub sell: Option<Fill>,
}

#[derive(Debug, Clone, Default)]
struct AssetDayState {
    bought: bool, // true once the buy side was attempted or skipped today
    sold: bool,
    log: TradeLogEntry,
}

/// Trading state for a single exchange day.
///
/// Owned by the engine and replaced wholesale at every reset boundary;
/// nothing in here survives the day. Buys consume the remaining quote
/// balance; sell proceeds surface in the next day's balance refresh.
#[derive(Debug, Clone)]
pub struct DayLedger {
    day_start_balance: f64, // snapshot at reset, ROI denominator
    remaining_quote: f64,
    assets: HashMap<String, AssetDayState>,
}

impl DayLedger {
    /// Fresh ledger seeded from the live quote balance
    pub fn new(symbols: &[String], starting_balance: f64) -> Self {
        let assets = symbols
            .iter()
            .map(|s| (s.clone(), AssetDayState::default()))
            .collect();

        Self {
            day_start_balance: starting_balance,
            remaining_quote: starting_balance,
            assets,
        }
    }

    pub fn day_start_balance(&self) -> f64 {
        self.day_start_balance
    }

    pub fn remaining_quote(&self) -> f64 {
        self.remaining_quote
    }

    /// Quote amount a breakout may spend for an asset with `weight`.
    /// Never exceeds the remaining balance.
    pub fn allocation(&self, weight: f64) -> f64 {
        (self.remaining_quote * weight).min(self.remaining_quote)
    }

    pub fn is_bought(&self, symbol: &str) -> bool {
        self.assets.get(symbol).map(|s| s.bought).unwrap_or(false)
    }

    pub fn is_sold(&self, symbol: &str) -> bool {
        self.assets.get(symbol).map(|s| s.sold).unwrap_or(false)
    }

    /// Fills recorded today for an asset
    pub fn entry(&self, symbol: &str) -> Option<&TradeLogEntry> {
        self.assets.get(symbol).map(|s| &s.log)
    }

    /// Record a confirmed buy: flips the flag and deducts the notional
    pub fn record_buy(&mut self, symbol: &str, fill: Fill) -> Result<()> {
        let cost = fill.notional();

        let state = self.state_mut(symbol)?;
        if state.bought {
            return Err(BotError::Unexpected(format!(
                "duplicate buy recorded for {symbol}"
            )));
        }
        state.bought = true;
        state.log.buy = Some(fill);

        self.remaining_quote -= cost;
        if self.remaining_quote < 0.0 {
            tracing::warn!(
                "Remaining balance went negative after {} buy ({:.2} KRW), clamping to 0",
                symbol,
                self.remaining_quote
            );
            self.remaining_quote = 0.0;
        }

        Ok(())
    }

    /// Record a confirmed sell. Proceeds are not credited back; they show
    /// up in the next day's balance refresh.
    pub fn record_sell(&mut self, symbol: &str, fill: Fill) -> Result<()> {
        let state = self.state_mut(symbol)?;
        if state.sold {
            return Err(BotError::Unexpected(format!(
                "duplicate sell recorded for {symbol}"
            )));
        }
        state.sold = true;
        state.log.sell = Some(fill);

        Ok(())
    }

    /// Mark an asset bought without a trade (allocation below the minimum).
    /// It will not be retried until the next reset.
    pub fn mark_bought_skipped(&mut self, symbol: &str) -> Result<()> {
        let state = self.state_mut(symbol)?;
        if state.bought {
            return Err(BotError::Unexpected(format!(
                "duplicate buy mark for {symbol}"
            )));
        }
        state.bought = true;

        Ok(())
    }

    fn state_mut(&mut self, symbol: &str) -> Result<&mut AssetDayState> {
        self.assets
            .get_mut(symbol)
            .ok_or_else(|| BotError::Unexpected(format!("unknown asset: {symbol}")))
    }
}

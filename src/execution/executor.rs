use chrono::Utc;
use std::time::Duration;

use crate::api::ExchangeApi;
use crate::config::ConfirmationPolicy;
use crate::models::{Fill, OrderReceipt, TradeSide};
use crate::{BotError, Result};

/// Fraction of the requested amount actually submitted, leaving room for
/// fees so the order is not rejected for overspending
const ORDER_HAIRCUT: f64 = 0.9995;
/// Status polls before the confirmation policy decides
const CONFIRM_ATTEMPTS: u32 = 3;
const CONFIRM_DELAY: Duration = Duration::from_secs(1);

/// Submits market orders and produces confirmed fills.
///
/// Holds no state between calls; the caller updates the day ledger from
/// the returned fill.
pub struct OrderExecutor {
    policy: ConfirmationPolicy,
    confirm_delay: Duration,
}

impl OrderExecutor {
    pub fn new(policy: ConfirmationPolicy) -> Self {
        Self {
            policy,
            confirm_delay: CONFIRM_DELAY,
        }
    }

    /// Override the poll delay (tests)
    pub fn with_confirm_delay(mut self, delay: Duration) -> Self {
        self.confirm_delay = delay;
        self
    }

    /// Market buy spending `quote_amount` KRW, haircut applied here.
    /// `ask` is the quote observed at signal time; it prices the lenient
    /// fallback when no poll confirms the fill.
    pub async fn execute_buy<E: ExchangeApi>(
        &self,
        exchange: &E,
        market: &str,
        quote_amount: f64,
        ask: f64,
    ) -> Result<Fill> {
        let adjusted = quote_amount * ORDER_HAIRCUT;
        tracing::info!("Submitting market buy: {} for {:.0} KRW", market, adjusted);

        let receipt = exchange.submit_market_buy(market, adjusted).await?;
        self.confirm(exchange, market, TradeSide::Buy, &receipt, Some(ask))
            .await
    }

    /// Market sell of `volume` base units, haircut applied here
    pub async fn execute_sell<E: ExchangeApi>(
        &self,
        exchange: &E,
        market: &str,
        volume: f64,
    ) -> Result<Fill> {
        let adjusted = volume * ORDER_HAIRCUT;
        tracing::info!("Submitting market sell: {} volume {:.8}", market, adjusted);

        let receipt = exchange.submit_market_sell(market, adjusted).await?;
        self.confirm(exchange, market, TradeSide::Sell, &receipt, None)
            .await
    }

    async fn confirm<E: ExchangeApi>(
        &self,
        exchange: &E,
        market: &str,
        side: TradeSide,
        receipt: &OrderReceipt,
        ask_hint: Option<f64>,
    ) -> Result<Fill> {
        for attempt in 1..=CONFIRM_ATTEMPTS {
            match exchange.order_status(&receipt.uuid).await {
                Ok(update) => {
                    if let Some(fill) = update.as_fill(Utc::now()) {
                        tracing::info!(
                            "{} {} confirmed: volume {:.8} @ {:.2} KRW",
                            side,
                            market,
                            fill.volume,
                            fill.average_price
                        );
                        return Ok(fill);
                    }
                    tracing::debug!(
                        "{} {} not filled yet (attempt {}/{})",
                        side,
                        market,
                        attempt,
                        CONFIRM_ATTEMPTS
                    );
                }
                // The order is live on the book; aborting the cycle here
                // would let a later cycle trade the same side twice. A
                // dropped poll just consumes an attempt.
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        "{} {} status poll failed (attempt {}/{}): {}",
                        side,
                        market,
                        attempt,
                        CONFIRM_ATTEMPTS,
                        e
                    );
                }
                Err(e) => return Err(e),
            }

            if attempt < CONFIRM_ATTEMPTS {
                tokio::time::sleep(self.confirm_delay).await;
            }
        }

        match self.policy {
            ConfirmationPolicy::Strict => Err(BotError::ConfirmationFailed(receipt.uuid)),
            ConfirmationPolicy::Lenient => {
                tracing::warn!(
                    "{} {} unconfirmed after {} attempts, recording requested values (lenient policy)",
                    side,
                    market,
                    CONFIRM_ATTEMPTS
                );
                // A buy receipt carries the notional with no volume, so
                // reconstruct the volume at the signal-time ask; the ledger
                // then deducts the amount actually sent to the venue
                let fill = match (side, ask_hint) {
                    (TradeSide::Buy, Some(ask)) if ask > 0.0 => Fill {
                        volume: receipt.requested_price.unwrap_or(0.0) / ask,
                        average_price: ask,
                        timestamp: Utc::now(),
                    },
                    _ => Fill {
                        volume: receipt.requested_volume.unwrap_or(0.0),
                        average_price: receipt.requested_price.unwrap_or(0.0),
                        timestamp: Utc::now(),
                    },
                };
                Ok(fill)
            }
        }
    }
}

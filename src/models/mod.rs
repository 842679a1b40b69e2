use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// OHLC candle as served by the exchange
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    /// High-low span of the candle
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Confirmed execution of a market order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub volume: f64,
    pub average_price: f64,
    pub timestamp: DateTime<Utc>,
}

impl Fill {
    /// Quote currency spent (buys) or base value moved (sells)
    pub fn notional(&self) -> f64 {
        self.volume * self.average_price
    }
}

/// Acknowledgement returned when the exchange accepts an order.
///
/// The requested fields echo what was submitted: market sells carry a
/// volume, market buys carry the quote notional as `requested_price`.
/// They only matter to the lenient confirmation fallback.
#[derive(Debug, Clone)]
pub struct OrderReceipt {
    pub uuid: Uuid,
    pub requested_volume: Option<f64>,
    pub requested_price: Option<f64>,
}

/// Execution state of a submitted order at one point in time
#[derive(Debug, Clone, Default)]
pub struct OrderUpdate {
    pub executed_volume: Option<f64>,
    pub average_price: Option<f64>,
}

impl OrderUpdate {
    /// A usable fill once both volume and average price are reported
    pub fn as_fill(&self, now: DateTime<Utc>) -> Option<Fill> {
        match (self.executed_volume, self.average_price) {
            (Some(volume), Some(average_price)) if volume > 0.0 && average_price > 0.0 => {
                Some(Fill {
                    volume,
                    average_price,
                    timestamp: now,
                })
            }
            _ => None,
        }
    }
}

use crate::models::Candle;
use crate::{BotError, Result};

/// Completed hourly candles feeding the rolling half-day target
pub const HALF_DAY_WINDOW: usize = 12;

/// Daily mode fetch: the in-progress candle plus two completed ones
pub const DAILY_FETCH_COUNT: u32 = 3;
/// Half-day mode fetch: the in-progress candle plus twelve completed ones
pub const HALF_DAY_FETCH_COUNT: u32 = HALF_DAY_WINDOW as u32 + 1;

/// Breakout target from the last fully closed daily candle.
///
/// `candles` is newest first; element 0 is still accumulating and is
/// ignored. Target = previous close + k * previous range.
pub fn daily_target(candles: &[Candle], k: f64) -> Result<f64> {
    let prev = candles.get(1).ok_or_else(|| {
        BotError::Transient(format!(
            "daily target needs 2 candles, got {}",
            candles.len()
        ))
    })?;

    finalize_target(prev.close + k * prev.range())
}

/// Breakout target over the last twelve fully closed hourly candles.
///
/// `candles` is newest first; element 0 is still accumulating and is
/// ignored. Target = close of the oldest completed candle + k * sum of
/// the twelve completed ranges.
pub fn half_day_target(candles: &[Candle], k: f64) -> Result<f64> {
    if candles.len() < HALF_DAY_WINDOW + 1 {
        return Err(BotError::Transient(format!(
            "half-day target needs {} candles, got {}",
            HALF_DAY_WINDOW + 1,
            candles.len()
        )));
    }

    let completed = &candles[1..=HALF_DAY_WINDOW];
    let base = completed[HALF_DAY_WINDOW - 1].close;
    let range_sum: f64 = completed.iter().map(Candle::range).sum();

    finalize_target(base + k * range_sum)
}

/// A breakout fires only when the ask strictly exceeds the target
pub fn breakout_triggered(ask: f64, target: f64) -> bool {
    ask > target
}

fn finalize_target(target: f64) -> Result<f64> {
    if target.is_finite() && target > 0.0 {
        Ok(target)
    } else {
        Err(BotError::Transient(format!(
            "breakout target not positive: {target}"
        )))
    }
}

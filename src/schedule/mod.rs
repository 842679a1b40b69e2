use chrono::{DateTime, Duration, Utc};

use crate::config::{WindowConfig, WindowMode};

/// Which side of the market the current window allows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradePhase {
    Buy,
    Sell,
}

/// Resolved window layout for one trading day
#[derive(Debug, Clone)]
pub enum WindowPlan {
    /// Buy all day, liquidate in the final margin before the next open
    SingleDaily { liquidation_margin: Duration },
    /// Buy/sell/buy/sell at fixed offsets from the daily open
    FourWindow { offsets: [Duration; 3] },
}

impl WindowPlan {
    pub fn from_config(cfg: &WindowConfig) -> Self {
        match cfg.mode {
            WindowMode::Single => WindowPlan::SingleDaily {
                liquidation_margin: Duration::minutes(cfg.liquidation_margin_minutes),
            },
            WindowMode::FourWindow => WindowPlan::FourWindow {
                offsets: cfg.offsets_minutes.map(Duration::minutes),
            },
        }
    }

    /// Four-window deployments also reset at the half-day boundary
    pub fn has_midday_reset(&self) -> bool {
        matches!(self, WindowPlan::FourWindow { .. })
    }
}

/// Phase of `now` within the day that opened at `day_start`.
///
/// Intervals are half-open, lower-inclusive: an instant exactly on a
/// boundary belongs to the later phase.
pub fn phase_at(now: DateTime<Utc>, day_start: DateTime<Utc>, plan: &WindowPlan) -> TradePhase {
    let elapsed = now - day_start;

    match plan {
        WindowPlan::SingleDaily { liquidation_margin } => {
            if elapsed >= Duration::days(1) - *liquidation_margin {
                TradePhase::Sell
            } else {
                TradePhase::Buy
            }
        }
        WindowPlan::FourWindow { offsets } => {
            if elapsed < offsets[0] {
                TradePhase::Buy
            } else if elapsed < offsets[1] {
                TradePhase::Sell
            } else if elapsed < offsets[2] {
                TradePhase::Buy
            } else {
                TradePhase::Sell
            }
        }
    }
}

/// Tracks which reset boundary fired last so each fires exactly once.
///
/// `due` arms itself on the first observation without firing. The caller
/// marks a boundary only after the reset completed, so a reset that fails
/// midway is retried on the next cycle.
#[derive(Debug)]
pub struct ResetSchedule {
    midday_reset: bool,
    last_fired: Option<DateTime<Utc>>,
}

impl ResetSchedule {
    pub fn new(midday_reset: bool) -> Self {
        Self {
            midday_reset,
            last_fired: None,
        }
    }

    /// Latest boundary at or before `now` that has not fired yet
    pub fn due(&mut self, now: DateTime<Utc>, day_start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let boundary = self.latest_boundary(now, day_start);

        match self.last_fired {
            None => {
                // First observation after startup: adopt without firing
                self.last_fired = Some(boundary);
                None
            }
            Some(prev) if boundary > prev => Some(boundary),
            Some(_) => None,
        }
    }

    pub fn mark_fired(&mut self, boundary: DateTime<Utc>) {
        self.last_fired = Some(boundary);
    }

    fn latest_boundary(&self, now: DateTime<Utc>, day_start: DateTime<Utc>) -> DateTime<Utc> {
        let midday = day_start + Duration::hours(12);
        if self.midday_reset && now >= midday {
            midday
        } else {
            day_start
        }
    }
}

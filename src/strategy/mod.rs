// Volatility-breakout signal math
pub mod breakout;

pub use breakout::{breakout_triggered, daily_target, half_day_target};

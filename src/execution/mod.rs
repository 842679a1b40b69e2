// Order execution and day-ledger state
pub mod executor;
pub mod ledger;

pub use executor::OrderExecutor;
pub use ledger::{DayLedger, TradeLogEntry};

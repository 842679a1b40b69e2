use chrono::FixedOffset;

use crate::execution::DayLedger;
use crate::models::Fill;

/// Exchange trading timezone (KST) used for operator-facing timestamps
fn trading_tz() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).unwrap()
}

/// Profit over the day as a percentage of the starting balance.
/// A zero or unset starting balance reports 0 instead of dividing by zero.
pub fn roi_pct(start_balance: f64, end_balance: f64) -> f64 {
    if start_balance <= 0.0 {
        0.0
    } else {
        (end_balance - start_balance) / start_balance * 100.0
    }
}

/// KRW amount with thousands separators, rounded to whole won
pub fn format_krw(amount: f64) -> String {
    let negative = amount < 0.0;
    let digits = format!("{:.0}", amount.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if negative {
        format!("-{grouped}")
    } else {
        grouped
    }
}

fn format_fill(fill: &Fill) -> String {
    let local = fill.timestamp.with_timezone(&trading_tz());
    format!(
        "{:.6} @ {} KRW ({})",
        fill.volume,
        format_krw(fill.average_price),
        local.format("%Y-%m-%d %H:%M:%S")
    )
}

/// Day-end summary, rendered from the outgoing ledger before it is replaced
pub fn daily_summary(ledger: &DayLedger, symbols: &[String]) -> String {
    let mut lines = vec!["📊 Daily trade summary".to_string()];

    for symbol in symbols {
        let entry = ledger.entry(symbol);
        let buy = entry
            .and_then(|e| e.buy.as_ref())
            .map(format_fill)
            .unwrap_or_else(|| "none".to_string());
        let sell = entry
            .and_then(|e| e.sell.as_ref())
            .map(format_fill)
            .unwrap_or_else(|| "none".to_string());
        lines.push(format!("{symbol} | buy: {buy} | sell: {sell}"));
    }

    let start = ledger.day_start_balance();
    let end = ledger.remaining_quote();
    let profit = end - start;
    lines.push(format!("Start balance: {} KRW", format_krw(start)));
    lines.push(format!("End balance: {} KRW", format_krw(end)));
    lines.push(format!(
        "Profit: {} KRW (ROI {:.2}%)",
        format_krw(profit),
        roi_pct(start, end)
    ));

    lines.join("\n")
}

/// Start-of-day report with the fresh balance and breakout targets
pub fn start_of_day(balance: f64, targets: &[(String, f64)]) -> String {
    let mut lines = vec![
        "🌅 New trading day".to_string(),
        format!("Balance: {} KRW", format_krw(balance)),
    ];

    for (symbol, target) in targets {
        lines.push(format!("{symbol} target: {} KRW", format_krw(*target)));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_roi_basic() {
        let roi = roi_pct(1_000_000.0, 1_050_000.0);
        assert!((roi - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_roi_zero_start_reports_zero() {
        assert_eq!(roi_pct(0.0, 1_050_000.0), 0.0);
    }

    #[test]
    fn test_roi_loss_is_negative() {
        let roi = roi_pct(100_000.0, 90_000.0);
        assert!((roi + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_format_krw_groups_thousands() {
        assert_eq!(format_krw(0.0), "0");
        assert_eq!(format_krw(999.0), "999");
        assert_eq!(format_krw(1_200.0), "1,200");
        assert_eq!(format_krw(1_234_567.4), "1,234,567");
        assert_eq!(format_krw(-52_000.0), "-52,000");
    }

    #[test]
    fn test_summary_lists_fills_and_balances() {
        let symbols = vec!["ETH".to_string(), "BTC".to_string()];
        let mut ledger = DayLedger::new(&symbols, 1_000_000.0);
        ledger
            .record_buy(
                "ETH",
                Fill {
                    volume: 1.9,
                    average_price: 52_000.0,
                    timestamp: Utc.with_ymd_and_hms(2026, 8, 21, 0, 30, 0).unwrap(),
                },
            )
            .unwrap();

        let summary = daily_summary(&ledger, &symbols);

        assert!(summary.contains("ETH | buy: 1.900000 @ 52,000 KRW"));
        // Submitted 00:30 UTC renders as 09:30 KST
        assert!(summary.contains("09:30:00"));
        assert!(summary.contains("sell: none"));
        assert!(summary.contains("BTC | buy: none | sell: none"));
        assert!(summary.contains("Start balance: 1,000,000 KRW"));
        assert!(summary.contains("End balance: 901,200 KRW"));
        assert!(summary.contains("Profit: -98,800 KRW"));
    }

    #[test]
    fn test_summary_roi_line_for_flat_day() {
        let symbols = vec!["ETH".to_string()];
        let ledger = DayLedger::new(&symbols, 500_000.0);

        let summary = daily_summary(&ledger, &symbols);
        assert!(summary.contains("ROI 0.00%"));
    }

    #[test]
    fn test_start_of_day_lists_targets() {
        let targets = vec![("ETH".to_string(), 50_000.0), ("BTC".to_string(), 81_500_000.0)];
        let report = start_of_day(1_200.0, &targets);

        assert!(report.contains("Balance: 1,200 KRW"));
        assert!(report.contains("ETH target: 50,000 KRW"));
        assert!(report.contains("BTC target: 81,500,000 KRW"));
    }
}

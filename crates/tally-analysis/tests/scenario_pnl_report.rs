//! Realized P&L report over a small multi-month book.
//!
//! # Invariants under test
//! - by_symbol is P&L descending with ties broken by symbol.
//! - A symbol's P&L lands in the month of its first closing event.
//! - Month trade counts include closing exchange trades only.
//! - Inconsistencies are attached to the symbol and to the report.

use chrono::{NaiveDate, NaiveDateTime};
use tally_analysis::{analyze_pnl, analyze_pnl_with, DateRange, EngineOptions, YearMonth};
use tally_ledger::TradeEvent;

fn at(month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, month, day)
        .unwrap()
        .and_hms_opt(14, 30, 0)
        .unwrap()
}

fn ym(month: u32) -> YearMonth {
    YearMonth { year: 2024, month }
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

fn book() -> Vec<TradeEvent> {
    vec![
        TradeEvent::exchange("AAPL", at(1, 5), 10.0, -1000.0, -1.0),
        TradeEvent::exchange("AAPL", at(2, 10), -10.0, 1200.0, -1.0),
        TradeEvent::exchange("TSLA", at(1, 20), -5.0, 1000.0, -1.0),
        TradeEvent::exchange("TSLA", at(3, 1), 5.0, -1100.0, -1.0),
        TradeEvent::exchange("OPT", at(2, 1), -1.0, 300.0, -1.0),
        TradeEvent::expiration("OPT", at(3, 15), 1.0),
        TradeEvent::exchange("HOLD", at(3, 2), 3.0, -150.0, -1.0),
        TradeEvent::expiration("GHOST", at(3, 20), 1.0),
    ]
}

#[test]
fn scenario_symbol_totals_and_win_rate() {
    let r = analyze_pnl(&book(), &DateRange::unbounded());

    let order: Vec<&str> = r.by_symbol.iter().map(|s| s.symbol.as_str()).collect();
    assert_eq!(order, vec!["OPT", "AAPL", "GHOST", "HOLD", "TSLA"]);

    assert!(approx(r.symbol("AAPL").unwrap().realized_pnl, 198.0));
    assert!(approx(r.symbol("TSLA").unwrap().realized_pnl, -102.0));
    assert!(approx(r.symbol("OPT").unwrap().realized_pnl, 299.0));

    let hold = r.symbol("HOLD").unwrap();
    assert_eq!(hold.trades, 0);
    assert!(approx(hold.commission, -1.0));

    assert!(approx(r.total_pnl, 395.0));
    assert_eq!(r.total_trades, 3);
    assert!(approx(r.win_rate, 200.0 / 3.0));
    assert!(approx(r.total_commission, -6.0));

    assert!(r.symbol("AAPL").unwrap().is_win());
    assert!(!r.symbol("TSLA").unwrap().is_win());
}

#[test]
fn scenario_month_buckets() {
    let r = analyze_pnl(&book(), &DateRange::unbounded());

    let periods: Vec<String> = r.by_month.iter().map(|m| m.period.to_string()).collect();
    assert_eq!(periods, vec!["2024-01", "2024-02"]);

    // TSLA's short opened in January, so its loss is booked there.
    let jan = r.month(ym(1)).unwrap();
    assert_eq!(jan.trades, 1);
    assert!(approx(jan.realized_pnl, -102.0));
    assert!(approx(jan.commission, -1.0));

    let feb = r.month(ym(2)).unwrap();
    assert_eq!(feb.trades, 2);
    assert!(approx(feb.realized_pnl, 497.0));
    assert!(approx(feb.commission, -2.0));
}

#[test]
fn scenario_inconsistency_is_attached_not_fatal() {
    let r = analyze_pnl(&book(), &DateRange::unbounded());
    assert_eq!(r.inconsistencies.len(), 1);
    let ghost = r.symbol("GHOST").unwrap();
    assert_eq!(ghost.warnings.len(), 1);
    assert_eq!(ghost.realized_pnl, 0.0);
    assert!(r.symbol("AAPL").unwrap().warnings.is_empty());
}

#[test]
fn scenario_window_only_sees_its_trades() {
    let feb = DateRange::parse("20240201", "2024-02-29").unwrap();
    let r = analyze_pnl(&book(), &feb);

    // both February trades open new shorts inside the window
    assert_eq!(r.by_symbol.len(), 2);
    assert_eq!(r.total_trades, 0);
    assert_eq!(r.win_rate, 0.0);
    assert!(approx(r.total_commission, -2.0));
    assert_eq!(r.by_month.len(), 1);
    assert_eq!(r.by_month[0].trades, 2);
    assert_eq!(r.by_month[0].realized_pnl, 0.0);
}

#[test]
fn scenario_parallel_report_matches_sequential() {
    let seq = analyze_pnl(&book(), &DateRange::unbounded());
    let par = analyze_pnl_with(
        &book(),
        &DateRange::unbounded(),
        &EngineOptions {
            parallel: true,
            ..EngineOptions::default()
        },
    );
    assert_eq!(seq, par);
}

#[test]
fn scenario_report_serializes_periods_as_strings() {
    let r = analyze_pnl(&book(), &DateRange::unbounded());
    let v = serde_json::to_value(&r).unwrap();
    assert_eq!(v["by_month"][0]["period"], "2024-01");
    assert_eq!(v["by_symbol"][0]["symbol"], "OPT");
    assert_eq!(v["inconsistencies"][0]["kind"], "expiration_exceeds_open");
}

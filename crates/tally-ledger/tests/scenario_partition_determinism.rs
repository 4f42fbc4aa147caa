use chrono::{Duration, NaiveDate};
use tally_ledger::{partition_by_symbol, run, run_partitioned, run_with_epsilon, Emit, TradeEvent};

fn book() -> Vec<TradeEvent> {
    let base = NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    let symbols = ["AAPL", "MSFT", "TSLA", "SPY 240315C500", "NVDA"];
    let mut out = Vec::new();
    for i in 0..200i64 {
        let sym = symbols[(i as usize * 7) % symbols.len()];
        let qty = ((i % 9) - 4) as f64;
        let price = 50.0 + (i % 13) as f64;
        let ts = base + Duration::minutes(i * 17);
        if i % 41 == 40 {
            out.push(TradeEvent::expiration(sym, ts, qty.abs() + 1.0));
        } else {
            out.push(TradeEvent::exchange(sym, ts, qty, -qty * price, -1.0));
        }
    }
    out
}

#[test]
fn scenario_parallel_matches_sequential_for_both_views() {
    let trades = book();
    for emit in [Emit::RealizedPnl, Emit::ResidualCost] {
        let seq = run(&trades, emit);
        let par = run_partitioned(&trades, emit);
        assert_eq!(seq, par, "{emit:?}");
    }
}

#[test]
fn scenario_runs_are_idempotent() {
    let trades = book();
    let a = run(&trades, Emit::RealizedPnl);
    let b = run(&trades, Emit::RealizedPnl);
    assert_eq!(a, b);
}

#[test]
fn scenario_partition_preserves_per_symbol_order() {
    let mut trades = book();
    trades.reverse();
    let parts = partition_by_symbol(&trades);
    assert_eq!(parts.len(), 5);
    for (sym, part) in &parts {
        assert!(part.iter().all(|t| &t.symbol == sym));
        assert!(tally_ledger::is_chronological(part));
    }
}

#[test]
fn scenario_wide_epsilon_absorbs_residue() {
    let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    let trades = vec![
        TradeEvent::exchange("ETH", ts, 1.0, -100.0, 0.0),
        TradeEvent::exchange("ETH", ts + Duration::hours(1), -0.9999, 110.0, 0.0),
    ];
    let loose = run_with_epsilon(&trades, Emit::ResidualCost, 1e-3);
    assert!(loose.values.is_empty(), "residue below epsilon is dropped");
    assert_eq!(loose.status_counts.tolerable_drift, 1);

    let strict = run(&trades, Emit::ResidualCost);
    assert!(strict.value("ETH").is_some());
}

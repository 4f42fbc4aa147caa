//! Trade ordering policy.
//!
//! FIFO matching is order-sensitive, so every path into the engine goes
//! through this module first.
//!
//! # Sort key
//!
//! `timestamp` ascending, nothing else. Trades with equal timestamps keep the
//! order they arrived in (the sort is stable). Statements merged with
//! [`merge_statements`] are concatenated in the order given before sorting, so
//! a tie across two statements resolves to the earlier statement.
//!
//! Amounts are never touched here.

use crate::TradeEvent;

/// Sort `trades` chronologically **in place**. Stable on ties.
pub fn sort_trades_chronological(trades: &mut [TradeEvent]) {
    trades.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
}

/// Chronologically sorted copy of `trades`.
pub fn sorted_chronological(trades: &[TradeEvent]) -> Vec<TradeEvent> {
    let mut out = trades.to_vec();
    sort_trades_chronological(&mut out);
    out
}

/// Concatenate several statements' trades and sort the result.
pub fn merge_statements<I, T>(statements: I) -> Vec<TradeEvent>
where
    I: IntoIterator<Item = T>,
    T: IntoIterator<Item = TradeEvent>,
{
    let mut out: Vec<TradeEvent> = statements.into_iter().flatten().collect();
    sort_trades_chronological(&mut out);
    out
}

/// `true` when no trade precedes its predecessor.
pub fn is_chronological(trades: &[TradeEvent]) -> bool {
    trades.windows(2).all(|w| w[0].timestamp <= w[1].timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(day: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(9, minute, 0)
            .unwrap()
    }

    fn t(sym: &str, at: NaiveDateTime, qty: f64) -> TradeEvent {
        TradeEvent::exchange(sym, at, qty, -qty * 10.0, -1.0)
    }

    #[test]
    fn sorts_by_timestamp() {
        let mut v = vec![t("A", ts(3, 0), 1.0), t("B", ts(1, 0), 2.0), t("C", ts(2, 0), 3.0)];
        sort_trades_chronological(&mut v);
        let syms: Vec<&str> = v.iter().map(|x| x.symbol.as_str()).collect();
        assert_eq!(syms, vec!["B", "C", "A"]);
        assert!(is_chronological(&v));
    }

    #[test]
    fn ties_keep_input_order() {
        let at = ts(5, 30);
        let mut v = vec![t("Z", at, 1.0), t("A", at, 2.0), t("M", at, 3.0)];
        sort_trades_chronological(&mut v);
        let syms: Vec<&str> = v.iter().map(|x| x.symbol.as_str()).collect();
        assert_eq!(syms, vec!["Z", "A", "M"]);
    }

    #[test]
    fn merge_breaks_cross_statement_ties_by_statement_order() {
        let at = ts(2, 0);
        let first = vec![t("X", ts(4, 0), 1.0), t("FIRST", at, 1.0)];
        let second = vec![t("SECOND", at, 1.0), t("Y", ts(1, 0), 1.0)];
        let merged = merge_statements(vec![first, second]);
        let syms: Vec<&str> = merged.iter().map(|x| x.symbol.as_str()).collect();
        assert_eq!(syms, vec!["Y", "FIRST", "SECOND", "X"]);
    }

    #[test]
    fn amounts_are_untouched() {
        let original = vec![t("A", ts(2, 0), 7.0), t("A", ts(1, 0), -3.0)];
        let sorted = sorted_chronological(&original);
        assert_eq!(sorted[0], original[1]);
        assert_eq!(sorted[1], original[0]);
    }
}

//! FIFO matching engine.
//!
//! One [`MatchingEngine`] owns one [`SymbolLedger`] per symbol and consumes
//! trade events one at a time:
//!
//! - `Expiration`: closes lots from the front regardless of side at zero
//!   proceeds (short lot keeps its premium, long lot loses its cost).
//! - `Exchange`, quantity > 0: covers short lots FIFO, leftover opens a long
//!   lot at the trade's average unit cost.
//! - `Exchange`, quantity < 0: reduces long lots FIFO, leftover opens a short
//!   lot at the trade's average unit proceeds.
//!
//! The same automaton backs both the realized-P&L view and the residual
//! cost-basis view; [`Emit`] only selects which map [`MatchingEngine::finish`]
//! hands back.
//!
//! The engine never aborts. Closing more than is open is recorded as an
//! [`Inconsistency`] on the affected symbol and processing continues.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    ledger::{ConsumedLot, SymbolLedger},
    ordering::sorted_chronological,
    types::{Inconsistency, InconsistencyKind, Lot, LotSide, TradeEvent, TradeKind, TradeStatus},
    QTY_EPSILON,
};

/// Which per-symbol value a run reports.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Emit {
    /// symbol -> accumulated realized P&L.
    RealizedPnl,
    /// symbol -> Σ remaining × unit cost over open long lots.
    ResidualCost,
}

/// Result of applying a single trade.
#[derive(Clone, Debug, PartialEq)]
pub struct TradeOutcome {
    pub symbol: String,
    /// Realized P&L contributed by this trade (0 when it only opened).
    pub realized: f64,
    /// Quantity matched against existing lots.
    pub matched_qty: f64,
    /// Lot appended to the ledger by this trade, if any.
    pub opened: Option<Lot>,
    /// Quantity dropped because nothing was left to close.
    pub unmatched_qty: f64,
    pub status: TradeStatus,
}

impl TradeOutcome {
    fn noop(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            realized: 0.0,
            matched_qty: 0.0,
            opened: None,
            unmatched_qty: 0.0,
            status: TradeStatus::Valid,
        }
    }
}

/// Per-status trade counters for a run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub valid: usize,
    pub tolerable_drift: usize,
    pub inconsistent: usize,
}

impl StatusCounts {
    fn record(&mut self, status: TradeStatus) {
        match status {
            TradeStatus::Valid => self.valid += 1,
            TradeStatus::TolerableDrift => self.tolerable_drift += 1,
            TradeStatus::Inconsistent => self.inconsistent += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.valid + self.tolerable_drift + self.inconsistent
    }

    pub(crate) fn merge(&mut self, other: &StatusCounts) {
        self.valid += other.valid;
        self.tolerable_drift += other.tolerable_drift;
        self.inconsistent += other.inconsistent;
    }
}

/// Output of a complete pass over a trade stream.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LedgerRun {
    pub emit: Emit,
    /// RealizedPnl: symbol -> realized P&L (present once the symbol matched anything).
    /// ResidualCost: symbol -> open long cost (present only when > 0).
    pub values: BTreeMap<String, f64>,
    /// Ordered by (timestamp, symbol).
    pub inconsistencies: Vec<Inconsistency>,
    pub status_counts: StatusCounts,
}

impl LedgerRun {
    pub fn value(&self, symbol: &str) -> Option<f64> {
        self.values.get(symbol).copied()
    }

    pub fn inconsistencies_for<'a>(
        &'a self,
        symbol: &'a str,
    ) -> impl Iterator<Item = &'a Inconsistency> + 'a {
        self.inconsistencies.iter().filter(move |i| i.symbol == symbol)
    }

    pub fn total(&self) -> f64 {
        self.values.values().sum()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct MatchingEngine {
    epsilon: f64,
    ledgers: BTreeMap<String, SymbolLedger>,
    realized: BTreeMap<String, f64>,
    inconsistencies: Vec<Inconsistency>,
    status_counts: StatusCounts,
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchingEngine {
    pub fn new() -> Self {
        Self::with_epsilon(QTY_EPSILON)
    }

    pub fn with_epsilon(epsilon: f64) -> Self {
        Self {
            epsilon,
            ledgers: BTreeMap::new(),
            realized: BTreeMap::new(),
            inconsistencies: Vec::new(),
            status_counts: StatusCounts::default(),
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Open lots for a symbol (`None` once flat).
    pub fn ledger(&self, symbol: &str) -> Option<&SymbolLedger> {
        self.ledgers.get(symbol)
    }

    pub fn ledgers(&self) -> impl Iterator<Item = &SymbolLedger> {
        self.ledgers.values()
    }

    pub fn realized_pnl(&self) -> &BTreeMap<String, f64> {
        &self.realized
    }

    /// Cost of long lots still open, per symbol. Symbols with no positive long
    /// cost are absent.
    pub fn residual_cost_basis(&self) -> BTreeMap<String, f64> {
        self.ledgers
            .iter()
            .filter_map(|(sym, ledger)| {
                let cost = ledger.long_cost();
                (cost > 0.0).then(|| (sym.clone(), cost))
            })
            .collect()
    }

    pub fn inconsistencies(&self) -> &[Inconsistency] {
        &self.inconsistencies
    }

    /// Apply one trade. Callers feed trades in chronological order.
    pub fn apply(&mut self, trade: &TradeEvent) -> TradeOutcome {
        let eps = self.epsilon;
        let ledger = self
            .ledgers
            .entry(trade.symbol.clone())
            .or_insert_with(|| SymbolLedger::new(trade.symbol.clone()));

        let (outcome, inconsistency) = match trade.kind {
            TradeKind::Expiration => expire(ledger, trade, eps),
            TradeKind::Exchange if trade.quantity > 0.0 => acquire(ledger, trade, eps),
            TradeKind::Exchange if trade.quantity < 0.0 => dispose(ledger, trade, eps),
            TradeKind::Exchange => (TradeOutcome::noop(&trade.symbol), None),
        };

        if ledger.is_empty() {
            self.ledgers.remove(&trade.symbol);
        }

        if outcome.matched_qty > 0.0 {
            *self.realized.entry(trade.symbol.clone()).or_insert(0.0) += outcome.realized;
        }

        if let Some(inc) = inconsistency {
            warn!(
                symbol = %inc.symbol,
                timestamp = %inc.timestamp,
                requested = inc.requested_qty,
                unmatched = inc.unmatched_qty,
                kind = ?inc.kind,
                "ledger inconsistency"
            );
            self.inconsistencies.push(inc);
        }

        self.status_counts.record(outcome.status);
        outcome
    }

    /// Consume the engine and report the selected view.
    pub fn finish(mut self, emit: Emit) -> LedgerRun {
        let values = match emit {
            Emit::RealizedPnl => std::mem::take(&mut self.realized),
            Emit::ResidualCost => self.residual_cost_basis(),
        };
        let mut inconsistencies = self.inconsistencies;
        inconsistencies.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        LedgerRun {
            emit,
            values,
            inconsistencies,
            status_counts: self.status_counts,
        }
    }
}

// ---------------------------------------------------------------------------
// Matching rules
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Closing {
    realized: f64,
    matched: f64,
    drift: bool,
}

/// Consume up to `want` from the ledger front while the front lot is on
/// `closable` (any side when `None`). Returns the closing tally and the
/// quantity left over.
fn close_from_front<F>(
    ledger: &mut SymbolLedger,
    want: f64,
    eps: f64,
    closable: Option<LotSide>,
    pnl_per_unit: F,
) -> (Closing, f64)
where
    F: Fn(&ConsumedLot) -> f64,
{
    let mut closing = Closing::default();
    let mut left = want;

    while left > eps {
        let take = match ledger.front() {
            Some(front) if closable.map_or(true, |side| front.side == side) => {
                front.remaining_qty.min(left)
            }
            _ => break,
        };
        let consumed = match ledger.consume_front(take, eps) {
            Ok(c) => c,
            Err(err) => {
                warn!(symbol = ledger.symbol(), %err, "front consume refused");
                break;
            }
        };
        closing.realized += consumed.qty * pnl_per_unit(&consumed);
        closing.matched += consumed.qty;
        closing.drift |= consumed.dust > 0.0;
        left -= consumed.qty;
    }

    if left > 0.0 && left <= eps {
        closing.drift = true;
    }

    (closing, left)
}

fn status_of(closing: &Closing) -> TradeStatus {
    if closing.drift {
        TradeStatus::TolerableDrift
    } else {
        TradeStatus::Valid
    }
}

/// Expiration/assignment: side-agnostic front consumption at zero proceeds.
fn expire(
    ledger: &mut SymbolLedger,
    trade: &TradeEvent,
    eps: f64,
) -> (TradeOutcome, Option<Inconsistency>) {
    let want = trade.quantity.abs();
    let (closing, left) = close_from_front(ledger, want, eps, None, |lot| match lot.side {
        LotSide::Short => lot.unit_price,
        LotSide::Long => -lot.unit_price,
    });

    let mut outcome = TradeOutcome {
        symbol: trade.symbol.clone(),
        realized: closing.realized,
        matched_qty: closing.matched,
        opened: None,
        unmatched_qty: 0.0,
        status: status_of(&closing),
    };

    if left > eps {
        outcome.unmatched_qty = left;
        outcome.status = TradeStatus::Inconsistent;
        let inc = Inconsistency {
            symbol: trade.symbol.clone(),
            timestamp: trade.timestamp,
            kind: InconsistencyKind::ExpirationExceedsOpen,
            requested_qty: want,
            unmatched_qty: left,
        };
        return (outcome, Some(inc));
    }

    (outcome, None)
}

/// Buy: cover shorts FIFO, then open a long lot with the leftover.
fn acquire(
    ledger: &mut SymbolLedger,
    trade: &TradeEvent,
    eps: f64,
) -> (TradeOutcome, Option<Inconsistency>) {
    let qty = trade.quantity;
    let unit_cost = -trade.net_cash() / qty;
    let (closing, left) = close_from_front(ledger, qty, eps, Some(LotSide::Short), |short| {
        short.unit_price - unit_cost
    });

    let opened = (left > eps).then(|| Lot::long(left, unit_cost));
    finish_exchange(ledger, trade, closing, opened, qty)
}

/// Sell: reduce longs FIFO, then open a short lot with the leftover.
fn dispose(
    ledger: &mut SymbolLedger,
    trade: &TradeEvent,
    eps: f64,
) -> (TradeOutcome, Option<Inconsistency>) {
    let sell_qty = -trade.quantity;
    let unit_proceeds = trade.net_cash() / sell_qty;
    let (closing, left) = close_from_front(ledger, sell_qty, eps, Some(LotSide::Long), |long| {
        unit_proceeds - long.unit_price
    });

    let opened = (left > eps).then(|| Lot::short(left, unit_proceeds));
    finish_exchange(ledger, trade, closing, opened, sell_qty)
}

fn finish_exchange(
    ledger: &mut SymbolLedger,
    trade: &TradeEvent,
    closing: Closing,
    opened: Option<Lot>,
    requested: f64,
) -> (TradeOutcome, Option<Inconsistency>) {
    let mut outcome = TradeOutcome {
        symbol: trade.symbol.clone(),
        realized: closing.realized,
        matched_qty: closing.matched,
        opened: None,
        unmatched_qty: 0.0,
        status: status_of(&closing),
    };

    let Some(lot) = opened else {
        return (outcome, None);
    };

    debug!(
        symbol = %trade.symbol,
        side = ?lot.side,
        qty = lot.remaining_qty,
        unit_price = lot.unit_price,
        "open lot"
    );

    let inconsistency = trade.is_close_hint().then(|| {
        outcome.status = TradeStatus::Inconsistent;
        Inconsistency {
            symbol: trade.symbol.clone(),
            timestamp: trade.timestamp,
            kind: InconsistencyKind::CloseOpensPosition,
            requested_qty: requested,
            unmatched_qty: lot.remaining_qty,
        }
    });

    ledger.push_back(lot.clone());
    outcome.opened = Some(lot);
    (outcome, inconsistency)
}

// ---------------------------------------------------------------------------
// Whole-stream runs
// ---------------------------------------------------------------------------

/// Sort `trades` chronologically (stable) and run them through a fresh engine.
pub fn run(trades: &[TradeEvent], emit: Emit) -> LedgerRun {
    run_with_epsilon(trades, emit, QTY_EPSILON)
}

pub fn run_with_epsilon(trades: &[TradeEvent], emit: Emit, epsilon: f64) -> LedgerRun {
    let mut engine = MatchingEngine::with_epsilon(epsilon);
    for trade in &sorted_chronological(trades) {
        engine.apply(trade);
    }
    engine.finish(emit)
}

/// Realized P&L per symbol.
pub fn compute_realized_pnl(trades: &[TradeEvent]) -> LedgerRun {
    run(trades, Emit::RealizedPnl)
}

/// Residual long-lot cost per symbol. Feed the full, unfiltered history.
pub fn project_cost_basis(trades: &[TradeEvent]) -> LedgerRun {
    run(trades, Emit::ResidualCost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn buy_opens_long_lot_at_average_cost() {
        let mut e = MatchingEngine::new();
        let out = e.apply(&TradeEvent::exchange("AAPL", ts(1, 10), 10.0, -1000.0, -2.0));
        assert_eq!(out.matched_qty, 0.0);
        assert_eq!(out.realized, 0.0);
        let lot = out.opened.unwrap();
        assert!(lot.is_long());
        assert!(approx(lot.unit_price, 100.2));
        assert!(e.realized_pnl().is_empty(), "opening never realizes");
    }

    #[test]
    fn sell_reduces_long_then_opens_short() {
        let mut e = MatchingEngine::new();
        e.apply(&TradeEvent::exchange("AAPL", ts(1, 10), 10.0, -1000.0, 0.0));
        let out = e.apply(&TradeEvent::exchange("AAPL", ts(2, 10), -15.0, 1650.0, 0.0));

        // unit proceeds = 110; 10 closed at +10 each, 5 open short at 110
        assert!(approx(out.realized, 100.0));
        assert!(approx(out.matched_qty, 10.0));
        let short = out.opened.unwrap();
        assert!(short.is_short());
        assert!(approx(short.remaining_qty, 5.0));
        assert!(approx(short.unit_price, 110.0));
        assert_eq!(e.ledger("AAPL").unwrap().len(), 1);
    }

    #[test]
    fn flat_symbol_drops_its_ledger() {
        let mut e = MatchingEngine::new();
        e.apply(&TradeEvent::exchange("MSFT", ts(1, 10), 5.0, -500.0, 0.0));
        e.apply(&TradeEvent::exchange("MSFT", ts(1, 11), -5.0, 450.0, 0.0));
        assert!(e.ledger("MSFT").is_none());
        assert!(approx(e.realized_pnl()["MSFT"], -50.0));
    }

    #[test]
    fn zero_quantity_exchange_is_noop() {
        let mut e = MatchingEngine::new();
        let out = e.apply(&TradeEvent::exchange("X", ts(1, 10), 0.0, 0.0, -1.0));
        assert_eq!(out.status, TradeStatus::Valid);
        assert!(out.opened.is_none());
        assert!(e.ledger("X").is_none());
    }

    #[test]
    fn expiration_keeps_short_premium() {
        let mut e = MatchingEngine::new();
        e.apply(&TradeEvent::exchange("SPY 240315P", ts(1, 10), -2.0, 300.0, -2.0));
        let out = e.apply(&TradeEvent::expiration("SPY 240315P", ts(15, 16), 2.0));
        assert!(approx(out.realized, 298.0));
        assert_eq!(out.status, TradeStatus::Valid);
        assert!(e.ledger("SPY 240315P").is_none());
    }

    #[test]
    fn expiration_beyond_open_is_inconsistent_but_not_fatal() {
        let mut e = MatchingEngine::new();
        e.apply(&TradeEvent::exchange("OPT", ts(1, 10), 1.0, -50.0, 0.0));
        let out = e.apply(&TradeEvent::expiration("OPT", ts(2, 16), -3.0));
        assert_eq!(out.status, TradeStatus::Inconsistent);
        assert!(approx(out.unmatched_qty, 2.0));
        assert!(approx(out.realized, -50.0));

        let incs = e.inconsistencies();
        assert_eq!(incs.len(), 1);
        assert_eq!(incs[0].kind, InconsistencyKind::ExpirationExceedsOpen);
        assert!(approx(incs[0].requested_qty, 3.0));

        // other symbols keep processing
        e.apply(&TradeEvent::exchange("OTHER", ts(3, 10), 1.0, -10.0, 0.0));
        assert!(e.ledger("OTHER").is_some());
    }

    #[test]
    fn close_hint_opening_a_lot_is_flagged() {
        let mut e = MatchingEngine::new();
        let out = e.apply(
            &TradeEvent::exchange("TSLA", ts(1, 10), -4.0, 800.0, 0.0)
                .with_open_close(crate::OpenClose::Close),
        );
        assert_eq!(out.status, TradeStatus::Inconsistent);
        assert!(out.opened.as_ref().unwrap().is_short(), "lot still opened");
        assert_eq!(
            e.inconsistencies()[0].kind,
            InconsistencyKind::CloseOpensPosition
        );
    }

    #[test]
    fn drift_in_repeated_partial_sells_is_tolerated() {
        let mut e = MatchingEngine::new();
        e.apply(&TradeEvent::exchange("BTC", ts(1, 10), 0.3, -30.0, 0.0));
        let mut last = TradeStatus::Valid;
        for h in 0..3 {
            last = e
                .apply(&TradeEvent::exchange("BTC", ts(2, h), -0.1, 11.0, 0.0))
                .status;
        }
        assert_ne!(last, TradeStatus::Inconsistent);
        assert!(e.ledger("BTC").is_none(), "no dust lot survives");
        assert!(approx(e.realized_pnl()["BTC"], 3.0));
    }

    #[test]
    fn emit_selects_view_over_same_state() {
        let trades = vec![
            TradeEvent::exchange("A", ts(1, 10), 10.0, -100.0, 0.0),
            TradeEvent::exchange("A", ts(2, 10), -4.0, 60.0, 0.0),
            TradeEvent::exchange("B", ts(1, 11), -3.0, 30.0, 0.0),
        ];
        let pnl = run(&trades, Emit::RealizedPnl);
        let cost = run(&trades, Emit::ResidualCost);
        assert!(approx(pnl.value("A").unwrap(), 20.0));
        assert_eq!(pnl.value("B"), None);
        assert!(approx(cost.value("A").unwrap(), 60.0));
        assert_eq!(cost.value("B"), None, "short lots carry no cost basis");
    }
}

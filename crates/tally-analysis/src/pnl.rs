//! Realized P&L report.
//!
//! Trade counting follows the statement convention: a symbol with non-zero
//! realized P&L counts as one round trip (`trades = 1`) and one win when the
//! P&L is positive. Month buckets count closing exchange executions and their
//! commission; a symbol's realized P&L lands in the month of its first
//! closing event in the window.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Serialize, Serializer};
use tracing::info;

use tally_ledger::{Emit, Inconsistency, TradeEvent, TradeKind};

use crate::{range::DateRange, EngineOptions};

/// Symbols whose realized P&L is below this are treated as still held.
const PNL_EPSILON: f64 = 1e-6;

/// Calendar month, displayed and serialized as `YYYY-MM`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SymbolPnl {
    pub symbol: String,
    pub realized_pnl: f64,
    pub trades: usize,
    pub wins: usize,
    pub commission: f64,
    pub warnings: Vec<Inconsistency>,
}

impl SymbolPnl {
    fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            ..Self::default()
        }
    }

    pub fn is_win(&self) -> bool {
        self.wins > 0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MonthPnl {
    pub period: YearMonth,
    pub realized_pnl: f64,
    pub trades: usize,
    pub commission: f64,
}

impl MonthPnl {
    fn new(period: YearMonth) -> Self {
        Self {
            period,
            realized_pnl: 0.0,
            trades: 0,
            commission: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PnlReport {
    /// Realized P&L descending, ties by symbol.
    pub by_symbol: Vec<SymbolPnl>,
    /// Chronological.
    pub by_month: Vec<MonthPnl>,
    pub total_pnl: f64,
    /// Symbols with non-zero realized P&L.
    pub total_trades: usize,
    /// Percent of `total_trades` that were wins (0 when none).
    pub win_rate: f64,
    pub total_commission: f64,
    pub inconsistencies: Vec<Inconsistency>,
}

impl PnlReport {
    pub fn symbol(&self, symbol: &str) -> Option<&SymbolPnl> {
        self.by_symbol.iter().find(|s| s.symbol == symbol)
    }

    pub fn month(&self, period: YearMonth) -> Option<&MonthPnl> {
        self.by_month.iter().find(|m| m.period == period)
    }
}

fn closes_on_exchange(trade: &TradeEvent) -> bool {
    trade.kind == TradeKind::Exchange && (trade.quantity < 0.0 || trade.is_close_hint())
}

fn is_closing_event(trade: &TradeEvent) -> bool {
    trade.quantity < 0.0 || trade.is_expiration() || trade.is_close_hint()
}

/// Realized P&L over trades whose trade date falls inside `range`.
pub fn analyze_pnl(trades: &[TradeEvent], range: &DateRange) -> PnlReport {
    analyze_pnl_with(trades, range, &EngineOptions::default())
}

pub fn analyze_pnl_with(
    trades: &[TradeEvent],
    range: &DateRange,
    options: &EngineOptions,
) -> PnlReport {
    let filtered = tally_ledger::sorted_chronological(&range.filter(trades));
    let run = options.run(&filtered, Emit::RealizedPnl);

    let mut symbols: BTreeMap<String, SymbolPnl> = BTreeMap::new();
    let mut months: BTreeMap<YearMonth, MonthPnl> = BTreeMap::new();
    let mut total_commission = 0.0;

    for t in &filtered {
        total_commission += t.commission;
        symbols
            .entry(t.symbol.clone())
            .or_insert_with(|| SymbolPnl::new(&t.symbol))
            .commission += t.commission;

        if closes_on_exchange(t) {
            let period = YearMonth::of(t.trade_date);
            let month = months.entry(period).or_insert_with(|| MonthPnl::new(period));
            month.trades += 1;
            month.commission += t.commission;
        }
    }

    let mut total_pnl = 0.0;
    let mut total_trades = 0;
    let mut wins = 0;

    for (symbol, &pnl) in &run.values {
        if pnl.abs() < PNL_EPSILON {
            continue;
        }
        let entry = symbols
            .entry(symbol.clone())
            .or_insert_with(|| SymbolPnl::new(symbol));
        entry.realized_pnl = pnl;
        entry.trades = 1;
        if pnl > 0.0 {
            entry.wins = 1;
            wins += 1;
        }
        total_trades += 1;
        total_pnl += pnl;

        if let Some(first_close) = filtered
            .iter()
            .find(|t| &t.symbol == symbol && is_closing_event(t))
        {
            let period = YearMonth::of(first_close.trade_date);
            months
                .entry(period)
                .or_insert_with(|| MonthPnl::new(period))
                .realized_pnl += pnl;
        }
    }

    for inc in &run.inconsistencies {
        if let Some(entry) = symbols.get_mut(&inc.symbol) {
            entry.warnings.push(inc.clone());
        }
    }

    let win_rate = if total_trades > 0 {
        wins as f64 / total_trades as f64 * 100.0
    } else {
        0.0
    };

    let mut by_symbol: Vec<SymbolPnl> = symbols.into_values().collect();
    by_symbol.sort_by(|a, b| {
        b.realized_pnl
            .total_cmp(&a.realized_pnl)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });

    info!(
        trades = filtered.len(),
        symbols = by_symbol.len(),
        total_pnl,
        inconsistencies = run.inconsistencies.len(),
        "pnl analysed"
    );

    PnlReport {
        by_symbol,
        by_month: months.into_values().collect(),
        total_pnl,
        total_trades,
        win_rate,
        total_commission,
        inconsistencies: run.inconsistencies,
    }
}

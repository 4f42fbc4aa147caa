use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use tally_ledger::TradeEvent;

use crate::range::DateRange;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SymbolCommission {
    pub symbol: String,
    /// Asset category of the first trade seen for the symbol.
    pub category: String,
    pub commission: f64,
    pub trades: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CommissionReport {
    /// Commission ascending (commissions are negative, so largest spend first).
    pub by_symbol: Vec<SymbolCommission>,
    pub by_category: BTreeMap<String, f64>,
    pub total_commission: f64,
    pub total_trades: usize,
}

impl CommissionReport {
    /// Mean commission per trade (0 with no trades).
    pub fn average_per_trade(&self) -> f64 {
        if self.total_trades == 0 {
            0.0
        } else {
            self.total_commission / self.total_trades as f64
        }
    }
}

pub fn analyze_commissions(trades: &[TradeEvent], range: &DateRange) -> CommissionReport {
    let mut symbols: BTreeMap<String, SymbolCommission> = BTreeMap::new();
    let mut by_category: BTreeMap<String, f64> = BTreeMap::new();
    let mut total_commission = 0.0;
    let mut total_trades = 0;

    for t in trades.iter().filter(|t| range.contains(t.trade_date)) {
        total_commission += t.commission;
        total_trades += 1;
        *by_category.entry(t.asset_category.clone()).or_insert(0.0) += t.commission;

        let entry = symbols
            .entry(t.symbol.clone())
            .or_insert_with(|| SymbolCommission {
                symbol: t.symbol.clone(),
                category: t.asset_category.clone(),
                commission: 0.0,
                trades: 0,
            });
        entry.commission += t.commission;
        entry.trades += 1;
    }

    let mut by_symbol: Vec<SymbolCommission> = symbols.into_values().collect();
    by_symbol.sort_by(|a, b| {
        a.commission
            .total_cmp(&b.commission)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });

    info!(
        symbols = by_symbol.len(),
        total_trades, total_commission, "commissions analysed"
    );

    CommissionReport {
        by_symbol,
        by_category,
        total_commission,
        total_trades,
    }
}

//! Open-position summary with FIFO-projected cost basis.
//!
//! Broker exports sometimes leave `cost_basis_price` and `unrealized_pnl` at
//! zero. When that happens the residual long cost from the ledger fills the
//! gap. Realized P&L for the same window rides along as a single total.

use serde::{Deserialize, Serialize};
use tracing::debug;

use tally_ledger::{Emit, LedgerRun};

use crate::pnl::PnlReport;

/// One open-position row from a statement.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub symbol: String,
    #[serde(default)]
    pub asset_category: String,
    #[serde(default)]
    pub currency: String,
    pub position: f64,
    #[serde(default)]
    pub mark_price: f64,
    #[serde(default)]
    pub cost_basis_price: f64,
    #[serde(default)]
    pub position_value: f64,
    #[serde(default)]
    pub unrealized_pnl: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PositionSummary {
    pub symbol: String,
    pub asset_category: String,
    pub currency: String,
    pub position: f64,
    pub mark_price: f64,
    pub cost_basis_price: f64,
    pub position_value: f64,
    pub unrealized_pnl: f64,
    /// `true` when `cost_basis_price` came from the ledger projection.
    pub projected: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PositionsReport {
    /// Position value descending, ties by symbol.
    pub positions: Vec<PositionSummary>,
    pub total_value: f64,
    pub total_unrealized_pnl: f64,
    /// `total_pnl` of the range-filtered P&L report.
    pub total_realized_pnl: f64,
}

/// `residual` must be a [`Emit::ResidualCost`] run over the full trade history;
/// `realized` is the P&L report for the requested window.
pub fn summarize_positions(
    positions: &[OpenPosition],
    residual: &LedgerRun,
    realized: &PnlReport,
) -> PositionsReport {
    debug_assert_eq!(residual.emit, Emit::ResidualCost);

    let mut rows = Vec::with_capacity(positions.len());
    let mut total_value = 0.0;
    let mut total_unrealized_pnl = 0.0;

    for op in positions {
        let mut cost_basis_price = op.cost_basis_price;
        let mut projected = false;
        if cost_basis_price == 0.0 && op.position > 0.0 {
            if let Some(total_cost) = residual.value(&op.symbol) {
                cost_basis_price = total_cost / op.position;
                projected = true;
                debug!(symbol = %op.symbol, cost_basis_price, "projected cost basis");
            }
        }

        let mut unrealized_pnl = op.unrealized_pnl;
        if unrealized_pnl == 0.0 && cost_basis_price > 0.0 {
            unrealized_pnl = op.position_value - cost_basis_price * op.position;
        }

        total_value += op.position_value;
        total_unrealized_pnl += unrealized_pnl;
        rows.push(PositionSummary {
            symbol: op.symbol.clone(),
            asset_category: op.asset_category.clone(),
            currency: op.currency.clone(),
            position: op.position,
            mark_price: op.mark_price,
            cost_basis_price,
            position_value: op.position_value,
            unrealized_pnl,
            projected,
        });
    }

    rows.sort_by(|a, b| {
        b.position_value
            .total_cmp(&a.position_value)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });

    PositionsReport {
        positions: rows,
        total_value,
        total_unrealized_pnl,
        total_realized_pnl: realized.total_pnl,
    }
}

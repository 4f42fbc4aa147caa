//! tally-analysis
//!
//! Statement-level reports built on top of the FIFO ledger:
//! - realized P&L per symbol and per month ([`analyze_pnl`])
//! - commission spend ([`analyze_commissions`])
//! - dividend income net of withholding ([`analyze_dividends`])
//! - open positions with projected cost basis ([`summarize_positions`])
//!
//! Pure functions over slices of statement rows; no IO.

mod commissions;
mod dividends;
mod pnl;
mod positions;
mod range;

pub use commissions::{analyze_commissions, CommissionReport, SymbolCommission};
pub use dividends::{analyze_dividends, CashKind, CashTransaction, DividendReport, SymbolDividend};
pub use pnl::{analyze_pnl, analyze_pnl_with, MonthPnl, PnlReport, SymbolPnl, YearMonth};
pub use positions::{summarize_positions, OpenPosition, PositionSummary, PositionsReport};
pub use range::{parse_date, DateRange, RangeError};

use tally_ledger::{Emit, LedgerRun, TradeEvent, QTY_EPSILON};

/// How the ledger pass behind a report is executed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineOptions {
    pub qty_epsilon: f64,
    /// Run one rayon task per symbol instead of a single sequential pass.
    pub parallel: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            qty_epsilon: QTY_EPSILON,
            parallel: false,
        }
    }
}

impl EngineOptions {
    pub fn run(&self, trades: &[TradeEvent], emit: Emit) -> LedgerRun {
        if self.parallel {
            tally_ledger::run_partitioned_with_epsilon(trades, emit, self.qty_epsilon)
        } else {
            tally_ledger::run_with_epsilon(trades, emit, self.qty_epsilon)
        }
    }
}

//! tally-ledger
//!
//! FIFO lot-matching ledger for broker trade statements.
//! - One explicit lot queue per symbol, oldest lot closes first
//! - Long and short lots; option expiration/assignment closes at zero proceeds
//! - Realized P&L and residual cost basis come from the same automaton
//! - Over-closing is reported per symbol, never fatal
//! - Pure deterministic logic (no IO, no clock, no broker wiring)

mod types;

pub mod engine;
pub mod ledger;
pub mod ordering;
pub mod partition;

pub use engine::{
    compute_realized_pnl, project_cost_basis, run, run_with_epsilon, Emit, LedgerRun,
    MatchingEngine, StatusCounts, TradeOutcome,
};
pub use ledger::{ConsumedLot, LedgerError, SymbolLedger};
pub use ordering::{
    is_chronological, merge_statements, sort_trades_chronological, sorted_chronological,
};
pub use partition::{partition_by_symbol, run_partitioned, run_partitioned_with_epsilon};
pub use types::{
    Inconsistency, InconsistencyKind, Lot, LotSide, OpenClose, TradeEvent, TradeKind, TradeStatus,
};

/// Quantity tolerance for every lot comparison.
pub const QTY_EPSILON: f64 = 1e-9;

//! Per-symbol parallel runs.
//!
//! Ledgers never share state across symbols, so the sorted trade stream can be
//! split by symbol and each partition matched on its own worker. Per-symbol
//! order is preserved by partitioning after the chronological sort; the merge
//! step only ever inserts disjoint keys.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::debug;

use crate::{
    engine::{Emit, LedgerRun, MatchingEngine, StatusCounts},
    ordering::sorted_chronological,
    TradeEvent, QTY_EPSILON,
};

/// Split a chronologically sorted copy of `trades` by symbol.
pub fn partition_by_symbol(trades: &[TradeEvent]) -> BTreeMap<String, Vec<TradeEvent>> {
    let mut parts: BTreeMap<String, Vec<TradeEvent>> = BTreeMap::new();
    for trade in sorted_chronological(trades) {
        parts.entry(trade.symbol.clone()).or_default().push(trade);
    }
    parts
}

/// Same result as [`crate::run`], computed one symbol per rayon task.
pub fn run_partitioned(trades: &[TradeEvent], emit: Emit) -> LedgerRun {
    run_partitioned_with_epsilon(trades, emit, QTY_EPSILON)
}

pub fn run_partitioned_with_epsilon(trades: &[TradeEvent], emit: Emit, epsilon: f64) -> LedgerRun {
    let parts: Vec<(String, Vec<TradeEvent>)> = partition_by_symbol(trades).into_iter().collect();
    debug!(partitions = parts.len(), "partitioned run");

    let runs: Vec<LedgerRun> = parts
        .into_par_iter()
        .map(|(_, symbol_trades)| {
            let mut engine = MatchingEngine::with_epsilon(epsilon);
            for trade in &symbol_trades {
                engine.apply(trade);
            }
            engine.finish(emit)
        })
        .collect();

    let mut values = BTreeMap::new();
    let mut inconsistencies = Vec::new();
    let mut status_counts = StatusCounts::default();
    for run in runs {
        values.extend(run.values);
        inconsistencies.extend(run.inconsistencies);
        status_counts.merge(&run.status_counts);
    }
    inconsistencies.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });

    LedgerRun {
        emit,
        values,
        inconsistencies,
        status_counts,
    }
}

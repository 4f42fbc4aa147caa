//! Per-symbol FIFO lot queue.
//!
//! A [`SymbolLedger`] is the only mutable state in the matching pipeline.
//! It is an explicit queue: lots enter at the back, and are consumed only from
//! the front. Nothing else can reorder or reach into the middle of it, so the
//! "oldest lot closes first" rule is visible at the type boundary.
//!
//! The ledger knows nothing about prices or P&L; the matching engine decides
//! how much to consume and what the consumption is worth.

use std::collections::VecDeque;

use serde::Serialize;

use crate::types::{Lot, LotSide};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// `consume_front` called with no lots queued.
    EmptyLedger { symbol: String },
    /// Requested more than the front lot holds.
    OverConsume { requested: f64, remaining: f64 },
    /// Consumption quantity must be strictly positive.
    NonPositiveQty { qty: f64 },
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyLedger { symbol } => {
                write!(f, "ledger {symbol}: no open lots to consume")
            }
            Self::OverConsume {
                requested,
                remaining,
            } => write!(
                f,
                "ledger invariant: requested {requested} exceeds front lot remaining {remaining}"
            ),
            Self::NonPositiveQty { qty } => {
                write!(f, "ledger invariant: consume qty must be > 0, got {qty}")
            }
        }
    }
}

impl std::error::Error for LedgerError {}

// ---------------------------------------------------------------------------
// ConsumedLot
// ---------------------------------------------------------------------------

/// What a single `consume_front` call took from the queue.
#[derive(Clone, Debug, PartialEq)]
pub struct ConsumedLot {
    pub qty: f64,
    pub unit_price: f64,
    pub side: LotSide,
    /// The lot fell below epsilon and was removed.
    pub exhausted: bool,
    /// Non-zero sub-epsilon quantity discarded with the lot.
    pub dust: f64,
}

// ---------------------------------------------------------------------------
// SymbolLedger
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SymbolLedger {
    symbol: String,
    lots: VecDeque<Lot>,
}

impl SymbolLedger {
    pub fn new<S: Into<String>>(symbol: S) -> Self {
        Self {
            symbol: symbol.into(),
            lots: VecDeque::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lots.len()
    }

    /// Lots oldest-first.
    pub fn lots(&self) -> impl Iterator<Item = &Lot> {
        self.lots.iter()
    }

    pub fn front(&self) -> Option<&Lot> {
        self.lots.front()
    }

    /// Append a newly opened lot. Queue order is insertion order.
    pub fn push_back(&mut self, lot: Lot) {
        self.lots.push_back(lot);
    }

    /// Take `qty` from the front lot.
    ///
    /// The lot is removed once its remaining quantity drops below `epsilon`.
    /// Requests within `epsilon` above the remaining quantity are clamped to it.
    ///
    /// # Errors
    /// [`LedgerError::EmptyLedger`] if no lot is queued,
    /// [`LedgerError::OverConsume`] if `qty` exceeds the front lot by more than
    /// `epsilon`. The ledger is not mutated on error.
    pub fn consume_front(&mut self, qty: f64, epsilon: f64) -> Result<ConsumedLot, LedgerError> {
        if !(qty > 0.0) {
            return Err(LedgerError::NonPositiveQty { qty });
        }
        let lot = self.lots.front_mut().ok_or_else(|| LedgerError::EmptyLedger {
            symbol: self.symbol.clone(),
        })?;
        if qty > lot.remaining_qty + epsilon {
            return Err(LedgerError::OverConsume {
                requested: qty,
                remaining: lot.remaining_qty,
            });
        }

        let taken = qty.min(lot.remaining_qty);
        lot.remaining_qty -= taken;

        let mut consumed = ConsumedLot {
            qty: taken,
            unit_price: lot.unit_price,
            side: lot.side,
            exhausted: false,
            dust: 0.0,
        };

        if lot.remaining_qty < epsilon {
            consumed.exhausted = true;
            consumed.dust = lot.remaining_qty;
            self.lots.pop_front();
        }

        Ok(consumed)
    }

    /// Total remaining quantity on one side.
    pub fn open_quantity(&self, side: LotSide) -> f64 {
        self.lots
            .iter()
            .filter(|l| l.side == side)
            .map(|l| l.remaining_qty)
            .sum()
    }

    /// Σ remaining × unit cost over long lots. Short lots contribute nothing.
    pub fn long_cost(&self) -> f64 {
        self.lots.iter().filter(|l| l.is_long()).map(Lot::notional).sum()
    }
}

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// How a trade event reaches the ledger.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeKind {
    /// Ordinary exchange execution (buy or sell with cash proceeds).
    Exchange,
    /// Option expiration or assignment: closes lots at zero proceeds.
    Expiration,
}

/// Broker-supplied open/close indicator. Advisory only; the matching rules
/// never depend on it, but a `Close` that ends up opening a lot is reported.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenClose {
    Open,
    Close,
}

/// A single trade execution from a broker statement (the matching atom).
///
/// quantity is signed: +qty acquires, -qty disposes.
/// proceeds is signed cash (negative when paying for a buy).
/// commission is signed and conventionally negative.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub trade_date: NaiveDate,
    pub quantity: f64,
    pub proceeds: f64,
    pub commission: f64,
    pub kind: TradeKind,
    #[serde(default)]
    pub open_close: Option<OpenClose>,
    #[serde(default)]
    pub asset_category: String,
}

impl TradeEvent {
    /// Exchange trade whose trade date is the date of `timestamp`.
    pub fn exchange<S: Into<String>>(
        symbol: S,
        timestamp: NaiveDateTime,
        quantity: f64,
        proceeds: f64,
        commission: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            trade_date: timestamp.date(),
            quantity,
            proceeds,
            commission,
            kind: TradeKind::Exchange,
            open_close: None,
            asset_category: String::new(),
        }
    }

    /// Expiration/assignment event. Carries no proceeds.
    pub fn expiration<S: Into<String>>(symbol: S, timestamp: NaiveDateTime, quantity: f64) -> Self {
        Self {
            kind: TradeKind::Expiration,
            ..Self::exchange(symbol, timestamp, quantity, 0.0, 0.0)
        }
    }

    pub fn with_open_close(mut self, hint: OpenClose) -> Self {
        self.open_close = Some(hint);
        self
    }

    pub fn with_asset_category<S: Into<String>>(mut self, category: S) -> Self {
        self.asset_category = category.into();
        self
    }

    pub fn with_trade_date(mut self, trade_date: NaiveDate) -> Self {
        self.trade_date = trade_date;
        self
    }

    /// Cash that actually moved: proceeds plus (negative) commission.
    pub fn net_cash(&self) -> f64 {
        self.proceeds + self.commission
    }

    pub fn is_expiration(&self) -> bool {
        self.kind == TradeKind::Expiration
    }

    pub fn is_close_hint(&self) -> bool {
        self.open_close == Some(OpenClose::Close)
    }
}

/// Which side of the book a lot sits on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotSide {
    Long,
    Short,
}

/// A FIFO lot.
///
/// unit_price is cost paid per unit for a long lot and premium received per
/// unit for a short lot. remaining_qty is always positive; direction lives in
/// `side`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub remaining_qty: f64,
    pub unit_price: f64,
    pub side: LotSide,
}

impl Lot {
    pub fn long(qty: f64, unit_cost: f64) -> Self {
        debug_assert!(qty > 0.0);
        Self {
            remaining_qty: qty,
            unit_price: unit_cost,
            side: LotSide::Long,
        }
    }

    pub fn short(qty: f64, unit_premium: f64) -> Self {
        debug_assert!(qty > 0.0);
        Self {
            remaining_qty: qty,
            unit_price: unit_premium,
            side: LotSide::Short,
        }
    }

    pub fn is_long(&self) -> bool {
        self.side == LotSide::Long
    }

    pub fn is_short(&self) -> bool {
        self.side == LotSide::Short
    }

    /// remaining_qty × unit_price.
    pub fn notional(&self) -> f64 {
        self.remaining_qty * self.unit_price
    }
}

/// Per-trade classification of how cleanly it matched.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Valid,
    /// A sub-epsilon residue was absorbed (lot dust removed or remainder ignored).
    TolerableDrift,
    /// The trade closed more than the ledger tracked as open.
    Inconsistent,
}

/// Structural inconsistency categories.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InconsistencyKind {
    /// Expiration/assignment requested more units than were open; the excess was dropped.
    ExpirationExceedsOpen,
    /// Trade flagged as a close had no (or too few) opposite lots and opened a new lot.
    CloseOpensPosition,
}

/// Non-fatal warning attached to a symbol's result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Inconsistency {
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub kind: InconsistencyKind,
    /// Absolute quantity the trade asked to close.
    pub requested_qty: f64,
    /// Quantity that found no opposite lot.
    pub unmatched_qty: f64,
}

impl std::fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let what = match self.kind {
            InconsistencyKind::ExpirationExceedsOpen => "expiration exceeds open lots",
            InconsistencyKind::CloseOpensPosition => "close opens a new lot",
        };
        write!(
            f,
            "{} at {}: {what} (requested={}, unmatched={})",
            self.symbol, self.timestamp, self.requested_qty, self.unmatched_qty
        )
    }
}

use chrono::NaiveDate;
use serde::Serialize;
use tally_ledger::TradeEvent;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RangeError {
    BadDate { input: String },
    Inverted { from: NaiveDate, to: NaiveDate },
}

impl std::fmt::Display for RangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RangeError::BadDate { input } => {
                write!(f, "invalid date '{input}' (expected YYYYMMDD or YYYY-MM-DD)")
            }
            RangeError::Inverted { from, to } => {
                write!(f, "date range is inverted: from {from} is after to {to}")
            }
        }
    }
}

impl std::error::Error for RangeError {}

/// Parse `YYYYMMDD` or `YYYY-MM-DD`.
pub fn parse_date(input: &str) -> Result<NaiveDate, RangeError> {
    let s = input.trim();
    NaiveDate::parse_from_str(s, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .map_err(|_| RangeError::BadDate {
            input: input.to_string(),
        })
}

/// Inclusive trade-date window. A missing bound is open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Self, RangeError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(RangeError::Inverted { from, to });
            }
        }
        Ok(Self { from, to })
    }

    /// Empty strings leave the bound open.
    pub fn parse(from: &str, to: &str) -> Result<Self, RangeError> {
        let bound = |s: &str| -> Result<Option<NaiveDate>, RangeError> {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                parse_date(s).map(Some)
            }
        };
        Self::new(bound(from)?, bound(to)?)
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }

    /// Trades whose trade date falls inside the window, input order kept.
    pub fn filter(&self, trades: &[TradeEvent]) -> Vec<TradeEvent> {
        trades
            .iter()
            .filter(|t| self.contains(t.trade_date))
            .cloned()
            .collect()
    }
}

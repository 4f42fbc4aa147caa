//! Statement CSV readers.
//!
//! Headers are matched case-insensitively and surrounding whitespace is
//! trimmed. Unknown columns are ignored so full broker exports can be fed in
//! as-is.

use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use serde::Deserialize;
use tracing::debug;

use tally_analysis::{parse_date, CashKind, CashTransaction, OpenPosition};
use tally_ledger::{OpenClose, TradeEvent, TradeKind};

const DATE_TIME_FORMATS: &[&str] = &["%Y%m%d;%H%M%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Deserialize)]
struct TradeRow {
    symbol: String,
    date_time: String,
    #[serde(default)]
    trade_date: String,
    quantity: f64,
    #[serde(default)]
    proceeds: Option<f64>,
    #[serde(default)]
    commission: Option<f64>,
    #[serde(default)]
    transaction_type: String,
    #[serde(default)]
    open_close: String,
    #[serde(default)]
    asset_category: String,
}

#[derive(Debug, Deserialize)]
struct PositionRow {
    symbol: String,
    #[serde(default)]
    asset_category: String,
    #[serde(default)]
    currency: String,
    position: f64,
    #[serde(default)]
    mark_price: Option<f64>,
    #[serde(default)]
    cost_basis_price: Option<f64>,
    #[serde(default)]
    position_value: Option<f64>,
    #[serde(default)]
    unrealized_pnl: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CashRow {
    #[serde(default)]
    symbol: String,
    #[serde(rename = "type")]
    kind: String,
    amount: f64,
    #[serde(default)]
    currency: String,
    #[serde(default, alias = "settle_date")]
    trade_date: String,
    #[serde(default)]
    date_time: String,
}

/// `YYYYMMDD;HHMMSS`, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`, or a bare
/// date (midnight).
pub fn parse_date_time(raw: &str) -> Result<NaiveDateTime> {
    let s = raw.trim();
    for fmt in DATE_TIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ts);
        }
    }
    let date: NaiveDate = parse_date(s).with_context(|| format!("invalid date_time '{raw}'"))?;
    Ok(date.and_time(chrono::NaiveTime::MIN))
}

fn trade_kind(transaction_type: &str) -> TradeKind {
    match transaction_type.trim().to_ascii_lowercase().as_str() {
        "booktrade" | "expiration" | "assignment" => TradeKind::Expiration,
        _ => TradeKind::Exchange,
    }
}

fn open_close(raw: &str) -> Result<Option<OpenClose>> {
    match raw.trim().trim_end_matches(';').to_ascii_uppercase().as_str() {
        "" => Ok(None),
        "C" => Ok(Some(OpenClose::Close)),
        "O" => Ok(Some(OpenClose::Open)),
        other => bail!("invalid open_close '{other}' (expected O, C or empty)"),
    }
}

impl TradeRow {
    fn into_event(self) -> Result<TradeEvent> {
        if self.symbol.trim().is_empty() {
            bail!("empty symbol");
        }
        if !self.quantity.is_finite() {
            bail!("non-finite quantity");
        }
        let timestamp = parse_date_time(&self.date_time)?;
        let trade_date = if self.trade_date.trim().is_empty() {
            timestamp.date()
        } else {
            parse_date(&self.trade_date)
                .with_context(|| format!("invalid trade_date '{}'", self.trade_date))?
        };

        let mut event = TradeEvent::exchange(
            self.symbol.trim(),
            timestamp,
            self.quantity,
            self.proceeds.unwrap_or(0.0),
            self.commission.unwrap_or(0.0),
        )
        .with_trade_date(trade_date)
        .with_asset_category(self.asset_category.trim());
        event.kind = trade_kind(&self.transaction_type);
        event.open_close = open_close(&self.open_close)?;
        Ok(event)
    }
}

impl PositionRow {
    fn into_position(self) -> OpenPosition {
        OpenPosition {
            symbol: self.symbol.trim().to_string(),
            asset_category: self.asset_category.trim().to_string(),
            currency: self.currency.trim().to_string(),
            position: self.position,
            mark_price: self.mark_price.unwrap_or(0.0),
            cost_basis_price: self.cost_basis_price.unwrap_or(0.0),
            position_value: self.position_value.unwrap_or(0.0),
            unrealized_pnl: self.unrealized_pnl.unwrap_or(0.0),
        }
    }
}

impl CashRow {
    fn into_transaction(self) -> Result<CashTransaction> {
        if !self.amount.is_finite() {
            bail!("non-finite amount");
        }
        let trade_date = if !self.trade_date.trim().is_empty() {
            parse_date(&self.trade_date)
                .with_context(|| format!("invalid trade_date '{}'", self.trade_date))?
        } else if !self.date_time.trim().is_empty() {
            parse_date_time(&self.date_time)?.date()
        } else {
            bail!("cash row has neither trade_date nor date_time");
        };
        Ok(CashTransaction {
            symbol: self.symbol.trim().to_string(),
            kind: CashKind::from_statement_type(&self.kind),
            amount: self.amount,
            currency: self.currency.trim().to_string(),
            trade_date,
        })
    }
}

/// Deserialize every record of `reader` with lower-cased headers.
fn read_rows<R, T, F, O>(reader: R, source: &str, mut convert: F) -> Result<Vec<O>>
where
    R: Read,
    T: for<'de> Deserialize<'de>,
    F: FnMut(T) -> Result<O>,
{
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers: StringRecord = rdr
        .headers()
        .with_context(|| format!("{source}: missing header row"))?
        .iter()
        .map(|h| h.to_ascii_lowercase())
        .collect();

    let mut out = Vec::new();
    for record in rdr.records() {
        let record = record.with_context(|| format!("{source}: unreadable record"))?;
        let line = record.position().map_or(0, |p| p.line());
        let row: T = record
            .deserialize(Some(&headers))
            .with_context(|| format!("{source}:{line}: malformed row"))?;
        out.push(convert(row).with_context(|| format!("{source}:{line}"))?);
    }
    Ok(out)
}

pub fn read_trades<R: Read>(reader: R, source: &str) -> Result<Vec<TradeEvent>> {
    read_rows(reader, source, TradeRow::into_event)
}

pub fn read_positions<R: Read>(reader: R, source: &str) -> Result<Vec<OpenPosition>> {
    read_rows(reader, source, |row: PositionRow| Ok(row.into_position()))
}

pub fn read_cash<R: Read>(reader: R, source: &str) -> Result<Vec<CashTransaction>> {
    read_rows(reader, source, CashRow::into_transaction)
}

/// Load and merge several statements; the result is chronologically sorted.
pub fn load_trade_files(paths: &[String]) -> Result<Vec<TradeEvent>> {
    let mut statements = Vec::with_capacity(paths.len());
    for path in paths {
        let file = std::fs::File::open(Path::new(path))
            .with_context(|| format!("failed to open trades csv: {path}"))?;
        let trades = read_trades(file, path)?;
        debug!(path = %path, trades = trades.len(), "loaded trades");
        statements.push(trades);
    }
    Ok(tally_ledger::merge_statements(statements))
}

pub fn load_position_files(paths: &[String]) -> Result<Vec<OpenPosition>> {
    let mut out = Vec::new();
    for path in paths {
        let file = std::fs::File::open(Path::new(path))
            .with_context(|| format!("failed to open positions csv: {path}"))?;
        let positions = read_positions(file, path)?;
        debug!(path = %path, positions = positions.len(), "loaded positions");
        out.extend(positions);
    }
    Ok(out)
}

pub fn load_cash_files(paths: &[String]) -> Result<Vec<CashTransaction>> {
    let mut out = Vec::new();
    for path in paths {
        let file = std::fs::File::open(Path::new(path))
            .with_context(|| format!("failed to open cash csv: {path}"))?;
        let cash = read_cash(file, path)?;
        debug!(path = %path, rows = cash.len(), "loaded cash transactions");
        out.extend(cash);
    }
    Ok(out)
}

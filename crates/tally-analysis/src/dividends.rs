//! Dividend income from the cash-transaction section of a statement.
//!
//! Payments in lieu count as dividends. Withholding tax is booked against the
//! same symbol and is normally negative, so `net = gross + withholding`.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::range::DateRange;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CashKind {
    Dividend,
    PaymentInLieu,
    WithholdingTax,
    /// Deposits, interest, fees: read but not part of this report.
    Other(String),
}

impl CashKind {
    /// Map a statement `type` column, case-insensitively.
    pub fn from_statement_type(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dividends" | "dividend" => CashKind::Dividend,
            "payment in lieu of dividends" => CashKind::PaymentInLieu,
            "withholding tax" => CashKind::WithholdingTax,
            _ => CashKind::Other(raw.trim().to_string()),
        }
    }
}

/// One cash-transaction row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CashTransaction {
    pub symbol: String,
    pub kind: CashKind,
    pub amount: f64,
    pub currency: String,
    /// Settlement date; the date range filters on it.
    pub trade_date: NaiveDate,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SymbolDividend {
    pub symbol: String,
    pub gross: f64,
    pub withholding: f64,
    pub net: f64,
    /// Dividend payments only; withholding rows are not counted.
    pub payments: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DividendReport {
    /// Net descending, ties by symbol.
    pub by_symbol: Vec<SymbolDividend>,
    pub total_gross: f64,
    pub total_withholding: f64,
    pub total_net: f64,
    pub total_payments: usize,
}

pub fn analyze_dividends(cash: &[CashTransaction], range: &DateRange) -> DividendReport {
    let mut symbols: BTreeMap<String, SymbolDividend> = BTreeMap::new();
    let mut total_gross = 0.0;
    let mut total_withholding = 0.0;
    let mut total_payments = 0;

    for ct in cash.iter().filter(|ct| range.contains(ct.trade_date)) {
        let entry = match ct.kind {
            CashKind::Other(_) => continue,
            _ => symbols
                .entry(ct.symbol.clone())
                .or_insert_with(|| SymbolDividend {
                    symbol: ct.symbol.clone(),
                    ..SymbolDividend::default()
                }),
        };
        if ct.kind == CashKind::WithholdingTax {
            entry.withholding += ct.amount;
            total_withholding += ct.amount;
        } else {
            entry.gross += ct.amount;
            entry.payments += 1;
            total_gross += ct.amount;
            total_payments += 1;
        }
    }

    let mut by_symbol: Vec<SymbolDividend> = symbols
        .into_values()
        .map(|mut s| {
            s.net = s.gross + s.withholding;
            s
        })
        .collect();
    by_symbol.sort_by(|a, b| b.net.total_cmp(&a.net).then_with(|| a.symbol.cmp(&b.symbol)));

    let total_net = total_gross + total_withholding;
    info!(
        symbols = by_symbol.len(),
        total_payments, total_net, "dividends analysed"
    );

    DividendReport {
        by_symbol,
        total_gross,
        total_withholding,
        total_net,
        total_payments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_types_map_case_insensitively() {
        assert_eq!(CashKind::from_statement_type("Dividends"), CashKind::Dividend);
        assert_eq!(
            CashKind::from_statement_type("Payment In Lieu Of Dividends"),
            CashKind::PaymentInLieu
        );
        assert_eq!(
            CashKind::from_statement_type(" WITHHOLDING TAX "),
            CashKind::WithholdingTax
        );
        assert_eq!(
            CashKind::from_statement_type("Deposits/Withdrawals"),
            CashKind::Other("Deposits/Withdrawals".to_string())
        );
    }

    #[test]
    fn withholding_only_symbol_still_listed() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let cash = vec![CashTransaction {
            symbol: "KO".to_string(),
            kind: CashKind::WithholdingTax,
            amount: -1.5,
            currency: "USD".to_string(),
            trade_date: day,
        }];
        let r = analyze_dividends(&cash, &DateRange::unbounded());
        assert_eq!(r.by_symbol.len(), 1);
        assert_eq!(r.by_symbol[0].payments, 0);
        assert_eq!(r.by_symbol[0].net, -1.5);
        assert_eq!(r.total_payments, 0);
    }
}

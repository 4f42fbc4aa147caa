use std::fmt::Write as _;

use anyhow::Result;
use serde::Serialize;
use tally_config::OutputFormat;
use tally_ledger::{Emit, Inconsistency, LedgerRun, TradeEvent};

use super::{money, render_json, CommandContext};

/// Residual long cost per symbol over the full history.
#[derive(Debug, Serialize)]
pub struct CostBasisReport<'a> {
    pub cost_basis: &'a std::collections::BTreeMap<String, f64>,
    pub total_cost_basis: f64,
    pub inconsistencies: &'a [Inconsistency],
}

impl<'a> CostBasisReport<'a> {
    pub fn from_run(run: &'a LedgerRun) -> Self {
        Self {
            cost_basis: &run.values,
            total_cost_basis: run.total(),
            inconsistencies: &run.inconsistencies,
        }
    }
}

pub fn run(
    ctx: &CommandContext,
    trades: &[TradeEvent],
    format: Option<OutputFormat>,
    parallel: bool,
) -> Result<String> {
    let residual = ctx.engine(parallel).run(trades, Emit::ResidualCost);
    let report = CostBasisReport::from_run(&residual);
    match ctx.format(format) {
        OutputFormat::Json => render_json(&ctx.config_hash, &report),
        OutputFormat::Kv => Ok(render_kv(&ctx.config_hash, &report)),
    }
}

pub fn render_kv(config_hash: &str, r: &CostBasisReport<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "config_hash={config_hash}");
    let _ = writeln!(out, "total_cost_basis={}", money(r.total_cost_basis));
    for (symbol, cost) in r.cost_basis {
        let _ = writeln!(out, "symbol={symbol} cost_basis={}", money(*cost));
    }
    for inc in r.inconsistencies {
        let _ = writeln!(out, "inconsistency={inc}");
    }
    out
}

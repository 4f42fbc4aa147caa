use std::fmt::Write as _;

use anyhow::Result;
use tally_analysis::{analyze_pnl_with, summarize_positions, OpenPosition, PositionsReport};
use tally_config::OutputFormat;
use tally_ledger::{Emit, TradeEvent};

use super::{money, render_json, CommandContext};

pub struct PositionsArgs<'a> {
    pub from: Option<&'a str>,
    pub to: Option<&'a str>,
    pub format: Option<OutputFormat>,
    pub parallel: bool,
}

/// `trades` must be the full history. The date range only narrows the
/// realized total; the cost-basis projection always sees every trade.
pub fn run(
    ctx: &CommandContext,
    trades: &[TradeEvent],
    positions: &[OpenPosition],
    args: &PositionsArgs<'_>,
) -> Result<String> {
    let range = ctx.range(args.from, args.to)?;
    let engine = ctx.engine(args.parallel);
    let residual = engine.run(trades, Emit::ResidualCost);
    let realized = analyze_pnl_with(trades, &range, &engine);
    let report = summarize_positions(positions, &residual, &realized);
    match ctx.format(args.format) {
        OutputFormat::Json => render_json(&ctx.config_hash, &report),
        OutputFormat::Kv => Ok(render_kv(&ctx.config_hash, &report)),
    }
}

pub fn render_kv(config_hash: &str, r: &PositionsReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "config_hash={config_hash}");
    let _ = writeln!(out, "total_value={}", money(r.total_value));
    let _ = writeln!(out, "total_unrealized_pnl={}", money(r.total_unrealized_pnl));
    let _ = writeln!(out, "total_realized_pnl={}", money(r.total_realized_pnl));
    for p in &r.positions {
        let _ = writeln!(
            out,
            "symbol={} position={} mark_price={} cost_basis_price={} position_value={} unrealized_pnl={} projected={}",
            p.symbol,
            p.position,
            money(p.mark_price),
            money(p.cost_basis_price),
            money(p.position_value),
            money(p.unrealized_pnl),
            p.projected
        );
    }
    out
}

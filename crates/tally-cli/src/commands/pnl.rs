use std::fmt::Write as _;

use anyhow::Result;
use tally_analysis::{analyze_pnl_with, DateRange, PnlReport};
use tally_config::OutputFormat;
use tally_ledger::TradeEvent;

use super::{money, render_json, CommandContext};

pub struct PnlArgs<'a> {
    pub from: Option<&'a str>,
    pub to: Option<&'a str>,
    pub format: Option<OutputFormat>,
    pub parallel: bool,
}

pub fn run(ctx: &CommandContext, trades: &[TradeEvent], args: &PnlArgs<'_>) -> Result<String> {
    let range: DateRange = ctx.range(args.from, args.to)?;
    let report = analyze_pnl_with(trades, &range, &ctx.engine(args.parallel));
    match ctx.format(args.format) {
        OutputFormat::Json => render_json(&ctx.config_hash, &report),
        OutputFormat::Kv => Ok(render_kv(&ctx.config_hash, &report)),
    }
}

pub fn render_kv(config_hash: &str, r: &PnlReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "config_hash={config_hash}");
    let _ = writeln!(out, "total_pnl={}", money(r.total_pnl));
    let _ = writeln!(out, "total_trades={}", r.total_trades);
    let _ = writeln!(out, "win_rate={:.2}", r.win_rate);
    let _ = writeln!(out, "total_commission={}", money(r.total_commission));
    for s in &r.by_symbol {
        let _ = writeln!(
            out,
            "symbol={} realized_pnl={} trades={} wins={} commission={} warnings={}",
            s.symbol,
            money(s.realized_pnl),
            s.trades,
            s.wins,
            money(s.commission),
            s.warnings.len()
        );
    }
    for m in &r.by_month {
        let _ = writeln!(
            out,
            "month={} realized_pnl={} trades={} commission={}",
            m.period,
            money(m.realized_pnl),
            m.trades,
            money(m.commission)
        );
    }
    for inc in &r.inconsistencies {
        let _ = writeln!(out, "inconsistency={inc}");
    }
    out
}

use std::fmt::Write as _;

use anyhow::Result;
use tally_analysis::{analyze_commissions, CommissionReport};
use tally_config::OutputFormat;
use tally_ledger::TradeEvent;

use super::{money, render_json, CommandContext};

pub fn run(
    ctx: &CommandContext,
    trades: &[TradeEvent],
    from: Option<&str>,
    to: Option<&str>,
    format: Option<OutputFormat>,
) -> Result<String> {
    let range = ctx.range(from, to)?;
    let report = analyze_commissions(trades, &range);
    match ctx.format(format) {
        OutputFormat::Json => render_json(&ctx.config_hash, &report),
        OutputFormat::Kv => Ok(render_kv(&ctx.config_hash, &report)),
    }
}

pub fn render_kv(config_hash: &str, r: &CommissionReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "config_hash={config_hash}");
    let _ = writeln!(out, "total_commission={}", money(r.total_commission));
    let _ = writeln!(out, "total_trades={}", r.total_trades);
    let _ = writeln!(out, "average_commission={}", money(r.average_per_trade()));
    for (category, commission) in &r.by_category {
        let _ = writeln!(out, "category={category} commission={}", money(*commission));
    }
    for s in &r.by_symbol {
        let _ = writeln!(
            out,
            "symbol={} category={} commission={} trades={}",
            s.symbol,
            s.category,
            money(s.commission),
            s.trades
        );
    }
    out
}

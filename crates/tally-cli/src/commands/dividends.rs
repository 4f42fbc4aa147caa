use std::fmt::Write as _;

use anyhow::Result;
use tally_analysis::{analyze_dividends, CashTransaction, DividendReport};
use tally_config::OutputFormat;

use super::{money, render_json, CommandContext};

pub fn run(
    ctx: &CommandContext,
    cash: &[CashTransaction],
    from: Option<&str>,
    to: Option<&str>,
    format: Option<OutputFormat>,
) -> Result<String> {
    let range = ctx.range(from, to)?;
    let report = analyze_dividends(cash, &range);
    match ctx.format(format) {
        OutputFormat::Json => render_json(&ctx.config_hash, &report),
        OutputFormat::Kv => Ok(render_kv(&ctx.config_hash, &report)),
    }
}

pub fn render_kv(config_hash: &str, r: &DividendReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "config_hash={config_hash}");
    let _ = writeln!(out, "total_gross={}", money(r.total_gross));
    let _ = writeln!(out, "total_withholding={}", money(r.total_withholding));
    let _ = writeln!(out, "total_net={}", money(r.total_net));
    let _ = writeln!(out, "total_payments={}", r.total_payments);
    for s in &r.by_symbol {
        let _ = writeln!(
            out,
            "symbol={} gross={} withholding={} net={} payments={}",
            s.symbol,
            money(s.gross),
            money(s.withholding),
            money(s.net),
            s.payments
        );
    }
    out
}

//! Command handlers for the tally CLI.
//!
//! Shared plumbing (config resolution, flag precedence, output helpers) lives
//! here. Each submodule computes one report and renders it.

pub mod commissions;
pub mod cost_basis;
pub mod dividends;
pub mod pnl;
pub mod positions;

use anyhow::{Context, Result};
use serde::Serialize;
use tally_analysis::{DateRange, EngineOptions};
use tally_config::{
    report_unused_keys, ConfigMode, LoadedConfig, OutputFormat, TallyConfig, UnusedKeyPolicy,
};
use tracing::{info, warn};

/// Effective configuration for one command invocation.
pub struct CommandContext {
    pub config_hash: String,
    pub settings: TallyConfig,
}

impl CommandContext {
    /// Load the layered config (defaults when no paths) and warn on keys the
    /// command never reads.
    pub fn load(config_paths: &[String], mode: ConfigMode) -> Result<Self> {
        let loaded = if config_paths.is_empty() {
            LoadedConfig::empty()?
        } else {
            let refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
            tally_config::load_layered_yaml(&refs)?
        };

        let report = report_unused_keys(mode, &loaded.config_json, UnusedKeyPolicy::Warn)?;
        for pointer in &report.unused_leaf_pointers {
            warn!(mode = %report.mode, key = %pointer, "unused config key");
        }

        let settings = loaded.settings()?;
        info!(mode = mode.as_str(), config_hash = %loaded.config_hash, "config loaded");
        Ok(Self {
            config_hash: loaded.config_hash,
            settings,
        })
    }

    /// Flags win over config values, per bound.
    pub fn range(&self, from: Option<&str>, to: Option<&str>) -> Result<DateRange> {
        let from = from.or(self.settings.range.from.as_deref()).unwrap_or("");
        let to = to.or(self.settings.range.to.as_deref()).unwrap_or("");
        DateRange::parse(from, to).context("invalid --from/--to date range")
    }

    pub fn format(&self, flag: Option<OutputFormat>) -> OutputFormat {
        flag.unwrap_or(self.settings.output.format)
    }

    /// `--parallel` can only switch parallelism on.
    pub fn engine(&self, parallel_flag: bool) -> EngineOptions {
        EngineOptions {
            qty_epsilon: self.settings.engine.qty_epsilon,
            parallel: parallel_flag || self.settings.engine.parallel,
        }
    }
}

/// JSON envelope: the report plus the hash of the config that produced it.
#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    config_hash: &'a str,
    report: &'a T,
}

pub fn render_json<T: Serialize>(config_hash: &str, report: &T) -> Result<String> {
    let mut out = serde_json::to_string_pretty(&Envelope {
        config_hash,
        report,
    })
    .context("report json serialize failed")?;
    out.push('\n');
    Ok(out)
}

/// Money and prices in kv output.
pub(crate) fn money(v: f64) -> String {
    format!("{v:.2}")
}

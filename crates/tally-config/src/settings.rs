use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Quantity tolerance used when the config does not set one.
pub const DEFAULT_QTY_EPSILON: f64 = tally_ledger::QTY_EPSILON;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One `key=value` line per fact.
    #[default]
    Kv,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kv" => Ok(OutputFormat::Kv),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{other}' (expected kv|json)")),
        }
    }
}

/// Trade-date window. Strings are parsed by the caller (`YYYYMMDD` or `YYYY-MM-DD`).
///
/// An unquoted `20240301` reaches us as a YAML integer and is kept as its digits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeSettings {
    #[serde(default, deserialize_with = "date_bound")]
    pub from: Option<String>,
    #[serde(default, deserialize_with = "date_bound")]
    pub to: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DateBound {
    Text(String),
    Digits(u64),
}

fn date_bound<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(
        Option::<DateBound>::deserialize(deserializer)?.map(|bound| match bound {
            DateBound::Text(s) => s,
            DateBound::Digits(n) => n.to_string(),
        }),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub qty_epsilon: f64,
    pub parallel: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            qty_epsilon: DEFAULT_QTY_EPSILON,
            parallel: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub format: OutputFormat,
}

/// Typed view of the effective (merged) config.
///
/// ```yaml
/// range:
///   from: "2024-01-01"
///   to: "20241231"
/// engine:
///   qty_epsilon: 1.0e-9
///   parallel: true
/// output:
///   format: json
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TallyConfig {
    pub range: RangeSettings,
    pub engine: EngineSettings,
    pub output: OutputSettings,
}

impl TallyConfig {
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let cfg: TallyConfig = serde_json::from_value(config_json.clone())
            .context("config does not match the expected shape")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let eps = self.engine.qty_epsilon;
        if !eps.is_finite() || eps <= 0.0 || eps >= 1.0 {
            bail!("CONFIG_INVALID engine.qty_epsilon must be in (0, 1), got {eps}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let cfg = TallyConfig::from_json(&serde_json::json!({"engine": {"parallel": true}}))
            .unwrap();
        assert!(cfg.engine.parallel);
        assert_eq!(cfg.engine.qty_epsilon, DEFAULT_QTY_EPSILON);
        assert_eq!(cfg.output.format, OutputFormat::Kv);
        assert_eq!(cfg.range, RangeSettings::default());
    }

    #[test]
    fn unquoted_yyyymmdd_bounds_are_accepted() {
        let yaml = "range:\n  from: 20240301\n  to: \"2024-12-31\"\n";
        let cfg = crate::load_layered_yaml_from_strings(&[yaml])
            .unwrap()
            .settings()
            .unwrap();
        assert_eq!(cfg.range.from.as_deref(), Some("20240301"));
        assert_eq!(cfg.range.to.as_deref(), Some("2024-12-31"));
    }

    #[test]
    fn null_bound_stays_open() {
        let cfg = TallyConfig::from_json(&serde_json::json!({"range": {"from": null}})).unwrap();
        assert_eq!(cfg.range.from, None);
    }

    #[test]
    fn non_positive_epsilon_is_rejected() {
        let err = TallyConfig::from_json(&serde_json::json!({"engine": {"qty_epsilon": 0.0}}))
            .unwrap_err();
        assert!(err.to_string().contains("qty_epsilon"));
    }

    #[test]
    fn output_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}

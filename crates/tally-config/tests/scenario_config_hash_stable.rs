//! Config hash stability.
//!
//! GREEN when:
//! - the same inputs always hash the same
//! - key order inside YAML does not change the hash
//! - different values hash differently
//! - overlays override the base and the result is stable

use tally_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
range:
  from: "2024-01-01"
  to: "2024-12-31"
engine:
  qty_epsilon: 1.0e-9
  parallel: false
output:
  format: kv
"#;

const BASE_YAML_REORDERED: &str = r#"
output:
  format: kv
engine:
  parallel: false
  qty_epsilon: 1.0e-9
range:
  to: "2024-12-31"
  from: "2024-01-01"
"#;

const OVERLAY_YAML: &str = r#"
engine:
  parallel: true
output:
  format: json
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let original = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let reordered = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(
        original.config_hash, reordered.config_hash,
        "key order in YAML must not change the hash"
    );
}

#[test]
fn different_values_produce_different_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_overrides_base() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    let cfg = loaded.settings().unwrap();
    assert!(cfg.engine.parallel);
    assert_eq!(cfg.output.format, tally_config::OutputFormat::Json);
    assert_eq!(cfg.range.from.as_deref(), Some("2024-01-01"));
    assert!((cfg.engine.qty_epsilon - 1e-9).abs() < 1e-18);
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn no_documents_equals_empty_document() {
    let a = tally_config::LoadedConfig::empty().unwrap();
    let b = load_layered_yaml_from_strings(&["{}"]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.settings().unwrap(), tally_config::TallyConfig::default());
}

//! Scenario: desk config hash stability.
//!
//! GREEN when:
//! - Loading the same layers twice yields the same hash.
//! - Reordering keys inside a layer does not change the hash.
//! - Changing a value does change it.
//! - The built-in desk layer is part of the hash: an empty overlay hashes
//!   the same as no overlay at all.

use rdk_config::{load_desk_config_from_strings, load_layered_yaml_from_strings, BUILTIN_DESK_YAML};

const OVERLAY: &str = r#"
desk:
  debounce_ms: 250
oracle:
  kind: approve
  latency_ms: 10
"#;

const OVERLAY_REORDERED: &str = r#"
oracle:
  latency_ms: 10
  kind: approve
desk:
  debounce_ms: 250
"#;

#[test]
fn same_input_same_hash() {
    let a = load_desk_config_from_strings(&[OVERLAY]).unwrap();
    let b = load_desk_config_from_strings(&[OVERLAY]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn key_order_does_not_matter() {
    let a = load_desk_config_from_strings(&[OVERLAY]).unwrap();
    let b = load_desk_config_from_strings(&[OVERLAY_REORDERED]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
}

#[test]
fn different_value_different_hash() {
    let a = load_desk_config_from_strings(&[OVERLAY]).unwrap();
    let b = load_desk_config_from_strings(&["desk: { debounce_ms: 251 }"]).unwrap();
    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn builtin_layer_is_hashed() {
    let bare = load_desk_config_from_strings(&[]).unwrap();
    let empty = load_desk_config_from_strings(&[""]).unwrap();
    let raw = load_layered_yaml_from_strings(&[BUILTIN_DESK_YAML]).unwrap();
    assert_eq!(bare.config_hash, empty.config_hash);
    assert_eq!(bare.config_hash, raw.config_hash);
}

#[test]
fn overlay_values_reach_typed_config() {
    let loaded = load_desk_config_from_strings(&[OVERLAY]).unwrap();
    assert_eq!(loaded.desk.desk.debounce_ms, 250);
    assert_eq!(loaded.desk.desk.notification_capacity, 1024);
    assert_eq!(loaded.desk.oracle.latency_ms, 10);
    // Untouched sections come from the built-in layer.
    assert_eq!(loaded.desk.rates.len(), 5);
}

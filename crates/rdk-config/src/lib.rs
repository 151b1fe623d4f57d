//! rdk-config
//!
//! Layered YAML configuration.
//!
//! Documents are merged in order (later overrides earlier, maps merge
//! recursively, everything else is replaced wholesale), canonicalised to JSON
//! and hashed with SHA-256. The hash identifies the effective configuration a
//! desk was started with. [`load_desk_config`] layers caller documents over
//! [`BUILTIN_DESK_YAML`] and decodes the result into a validated
//! [`DeskConfig`].

mod desk;

pub use desk::{
    DeskConfig, DeskSection, NewOrdersSection, OracleKind, OracleSection, OrderEntry, RateEntry,
    BUILTIN_DESK_YAML,
};

use anyhow::{Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

/// Effective desk configuration plus the identity of the merged document.
#[derive(Debug, Clone)]
pub struct LoadedDeskConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub desk: DeskConfig,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let docs = read_docs(paths)?;
    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    // Merge YAML docs in order: earlier docs are base, later docs override.
    let mut merged = serde_json::json!({});
    for (i, raw) in yaml_docs.iter().enumerate() {
        let v_yaml: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("invalid yaml (layer {i})"))?;
        // An empty document is a no-op layer.
        if v_yaml.is_null() {
            continue;
        }
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Layer the files at `paths` over the built-in desk and decode the result.
pub fn load_desk_config(paths: &[&str]) -> Result<LoadedDeskConfig> {
    let docs = read_docs(paths)?;
    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_desk_config_from_strings(&doc_refs)
}

/// As [`load_desk_config`], for in-memory overlays.
pub fn load_desk_config_from_strings(overlays: &[&str]) -> Result<LoadedDeskConfig> {
    let mut layers = Vec::with_capacity(overlays.len() + 1);
    layers.push(BUILTIN_DESK_YAML);
    layers.extend_from_slice(overlays);

    let loaded = load_layered_yaml_from_strings(&layers)?;
    let desk = DeskConfig::from_json(&loaded.config_json)?;
    Ok(LoadedDeskConfig {
        config_hash: loaded.config_hash,
        canonical_json: loaded.canonical_json,
        desk,
    })
}

fn read_docs(paths: &[&str]) -> Result<Vec<String>> {
    paths
        .iter()
        .map(|p| fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}")))
        .collect()
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn canonicalize_json(v: &Value) -> Result<String> {
    // serde_json's default Map is ordered by key, so the compact form is
    // independent of source key order.
    let s = serde_json::to_string(v).context("canonical json serialize failed")?;
    Ok(s)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let out = hasher.finalize();
    hex::encode(out)
}

//! Scenario: config files on disk are layered in argument order.
//!
//! GREEN when the later file wins on overlapping keys and a file with an
//! invalid document fails with its path in the error chain.

use std::fs;
use std::path::PathBuf;

use rdk_config::load_desk_config;

fn scratch(name: &str, body: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rdk-config-{}-{}", std::process::id(), name));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("desk.yaml");
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn later_file_overrides_earlier() {
    let a = scratch("a", "desk: { debounce_ms: 300 }\n");
    let b = scratch("b", "desk: { debounce_ms: 700 }\n");
    let loaded = load_desk_config(&[a.to_str().unwrap(), b.to_str().unwrap()]).unwrap();
    assert_eq!(loaded.desk.desk.debounce_ms, 700);

    let flipped = load_desk_config(&[b.to_str().unwrap(), a.to_str().unwrap()]).unwrap();
    assert_eq!(flipped.desk.desk.debounce_ms, 300);
    assert_ne!(loaded.config_hash, flipped.config_hash);
}

#[test]
fn invalid_yaml_is_reported() {
    let bad = scratch("bad", "desk: [unterminated\n");
    let err = load_desk_config(&[bad.to_str().unwrap()]).unwrap_err();
    assert!(format!("{err:#}").contains("invalid yaml"));
}

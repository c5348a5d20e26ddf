//! Shared test helpers for sdls integration tests.
//!
//! All tests use temp directories. Each test gets its own game directory via
//! [`setup_game_dir`], with molds under `molds/` and mods under `addon/`.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

/// Category molds written by [`setup_game_dir`].
pub const CATEGORY_MOLDS: [(&str, &str); 5] = [
    (
        "qualities",
        r#"{"Id": -1, "Name": "", "Description": "", "Nature": 1, "Enhancements": []}"#,
    ),
    (
        "events",
        r#"{"Id": -1, "Name": "", "QualitiesRequired": [], "ChildBranches": []}"#,
    ),
    ("Tiles", r#"{"Name": "", "Tiles": []}"#),
    ("combatconstants", r#"{"Foo": 0, "Bar": 1}"#),
    ("areas", "$ref: qualities"),
];

/// Component molds written by [`setup_game_dir`].
pub const COMPONENT_MOLDS: [(&str, &str); 5] = [
    ("Enhancements", r#"{"Id": -1, "Level": 0}"#),
    ("QualitiesRequired", r#"{"Id": -1, "MinLevel": null}"#),
    ("ChildBranches", r#"{"Id": -1, "Name": "", "QualitiesRequired": []}"#),
    ("Tiles", r#"{"Id": -1, "Weight": 0}"#),
    ("Tiles.Tiles", r#"{"Name": "", "Weight": 1}"#),
];

/// Create a game directory with molds, an empty `addon/`, and `sdls.toml`
/// containing `config`.
pub fn setup_game_dir(config: &str) -> TempDir {
    let dir = TempDir::new().expect("failed to create temp dir");
    for (name, text) in CATEGORY_MOLDS {
        write(&dir.path().join("molds/default").join(format!("{name}.json")), text);
    }
    for (name, text) in COMPONENT_MOLDS {
        write(
            &dir.path().join("molds/defaultComponents").join(format!("{name}.json")),
            text,
        );
    }
    fs::create_dir_all(dir.path().join("addon")).unwrap();
    write(&dir.path().join("sdls.toml"), config);
    dir
}

/// Write `text` to `path`, creating parents.
pub fn write(path: &Path, text: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

/// Write a mod input document, e.g. `write_mod(dir, "m1", "entities/qualities.sdls", ...)`.
pub fn write_mod(dir: &Path, mod_name: &str, file: &str, text: &str) {
    write(&dir.join("addon").join(mod_name).join(file), text);
}

/// Path of a normalized output.
pub fn normalized_output(dir: &Path, mod_name: &str, category: &str) -> PathBuf {
    dir.join("addon").join(mod_name).join(format!("{category}.json"))
}

/// Path of a merged output.
pub fn merged_output(dir: &Path, category: &str) -> PathBuf {
    dir.join("addon/SDLS_MERGED").join(format!("{category}.json"))
}

/// Parse a JSON file.
pub fn read_json(path: &Path) -> Value {
    let text = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()));
    serde_json::from_str(&text)
        .unwrap_or_else(|e| panic!("{} is not JSON: {e}\n{text}", path.display()))
}

/// Load the test config from `dir/sdls.toml`.
pub fn load_config(dir: &Path) -> sdls::SdlsConfig {
    sdls::SdlsConfig::load(&dir.join("sdls.toml")).expect("test config should load")
}

/// Run the sdls binary in `dir`.
pub fn sdls_in(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sdls"))
        .args(args)
        .current_dir(dir)
        .env_remove("SDLS_CONFIG")
        .env("SDLS_LOG", "warn")
        .output()
        .expect("failed to execute sdls")
}

/// Run sdls and assert it succeeds. Returns stdout as string.
pub fn sdls_ok(dir: &Path, args: &[&str]) -> String {
    let out = sdls_in(dir, args);
    let stderr = String::from_utf8_lossy(&out.stderr);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        out.status.success(),
        "sdls {} failed:\nstdout: {stdout}\nstderr: {stderr}",
        args.join(" ")
    );
    stdout.to_string()
}

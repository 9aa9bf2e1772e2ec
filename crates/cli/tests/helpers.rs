use std::fs;

use dockzoom::{canonicalize_or_current, load_settings_or_default, load_yaml, sha256_file};
use dockzoom_core::settings::RawSettings;
use dockzoom_core::visual::TaskbarLayout;
use tempfile::tempdir;

#[test]
fn canonicalize_or_current_keeps_existing_absolute_path() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("layout.yaml");
    fs::write(&path, "icons: []").expect("write layout");

    let result = canonicalize_or_current(path.to_str().expect("utf8 path")).expect("canonicalize");
    assert_eq!(result, path.canonicalize().expect("canonicalize path"));
}

#[test]
fn canonicalize_or_current_joins_missing_relative_path_to_cwd() {
    let cwd = std::env::current_dir().expect("cwd");
    let result = canonicalize_or_current("does/not/exist.json").expect("canonicalize");
    assert_eq!(result, cwd.join("does/not/exist.json"));
}

#[test]
fn sha256_file_hashes_contents() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("module.bin");
    fs::write(&path, b"abc").expect("write module");

    assert_eq!(
        sha256_file(&path).expect("hash"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn missing_config_means_defaults() {
    assert_eq!(load_settings_or_default(None).expect("defaults"), RawSettings::default());
}

#[test]
fn config_file_overrides_defaults() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("settings.json");
    fs::write(&path, r#"{"zoomRange": 5}"#).expect("write settings");

    let raw = load_settings_or_default(path.to_str()).expect("load");
    assert_eq!(raw.zoom_range, 5);
    assert_eq!(raw.zoom_percentage, RawSettings::default().zoom_percentage);
}

#[test]
fn load_yaml_reads_layouts_and_reports_bad_documents() {
    let tmp = tempdir().expect("tempdir");
    let good = tmp.path().join("layout.yaml");
    fs::write(&good, "repeater_x: 12\nicons:\n  - width: 48\n  - width: 48\n    x: 60\n")
        .expect("write layout");
    let layout: TaskbarLayout = load_yaml(good.to_str().expect("utf8"), "layout").expect("parse");
    assert_eq!(layout.repeater_x, 12.0);
    assert_eq!(layout.icons.len(), 2);
    assert_eq!(layout.icons[1].x, Some(60.0));

    let bad = tmp.path().join("broken.yaml");
    fs::write(&bad, "icons: [width: ").expect("write broken");
    let err = load_yaml::<TaskbarLayout>(bad.to_str().expect("utf8"), "layout")
        .expect_err("broken yaml");
    assert!(err.to_string().contains("Failed to parse layout YAML"));
}

use dockzoom_core::settings::{EffectiveSettings, RawSettings};
use dockzoom_core::version;

#[test]
fn version_is_non_empty() {
    let v = version();
    assert!(!v.is_empty());
}

#[test]
fn settings_file_round_trips_through_effective_settings() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");
    std::fs::write(&path, r#"{ "zoomPercentage": 175, "taskbarFrameClass": "Shell.DockFrame" }"#)
        .expect("write settings");

    let raw = dockzoom_core::settings::load_settings(&path).expect("load settings");
    let effective = EffectiveSettings::from_raw(&raw);

    assert_eq!(raw.zoom_range, RawSettings::default().zoom_range);
    assert_eq!(effective.zoom_percentage, 175);
    assert_eq!(effective.namespace, "Shell");
    assert_eq!(effective.class, "DockFrame");
}

#[test]
fn malformed_settings_file_is_an_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");
    std::fs::write(&path, "{ zoomPercentage: ").expect("write settings");

    let err = dockzoom_core::settings::load_settings(&path).expect_err("bad json");
    assert!(err.to_string().contains("Failed to parse settings JSON"));
}

use anyhow::Result;
use dockzoom_core::settings::{EffectiveSettings, RawSettings};
use serde::Serialize;

use crate::load_settings_or_default;

#[derive(Debug, Serialize)]
pub struct SettingsReport {
    /// Settings file read, or `defaults`.
    pub source: String,
    pub raw: RawSettings,
    pub effective: EffectiveSettings,
}

pub fn settings_report(config: Option<&str>) -> Result<SettingsReport> {
    let raw = load_settings_or_default(config)?;
    let effective = EffectiveSettings::from_raw(&raw);
    Ok(SettingsReport {
        source: config.unwrap_or("defaults").to_string(),
        raw,
        effective,
    })
}

/// Show the settings as stored and as they will be applied.
pub fn settings_command(config: Option<&str>, json: bool) -> Result<()> {
    let report = settings_report(config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let effective = &report.effective;
    println!("Settings ({})", report.source);
    println!("  Zoom percentage: {}", effective.zoom_percentage);
    println!("  Zoom range: {} icon widths", effective.zoom_range);
    println!(
        "  Frame class: {} (namespace: {}, class: {})",
        effective.frame_class, effective.namespace, effective.class
    );
    if report.raw.zoom_percentage != i64::from(effective.zoom_percentage)
        || report.raw.zoom_range != i64::from(effective.zoom_range)
        || report.raw.taskbar_frame_class.trim() != effective.frame_class
    {
        println!("  (some stored values were out of range and replaced with defaults)");
    }

    Ok(())
}

use anyhow::Result;
use dockzoom_core::hooks::{FrameSignatures, LOADER_MODULE, LOAD_LIBRARY_SIGNATURES};
use dockzoom_core::settings::EffectiveSettings;
use dockzoom_core::watcher::{FALLBACK_MODULE, PRIMARY_MODULE};
use serde::Serialize;

use crate::load_settings_or_default;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureReport {
    pub frame_class: String,
    /// Modules searched for the handlers, in order.
    pub modules: Vec<String>,
    pub pointer_moved: String,
    pub pointer_exited: String,
    pub loader_module: String,
    pub loader_signatures: Vec<String>,
}

pub fn signature_report(config: Option<&str>) -> Result<SignatureReport> {
    let settings = EffectiveSettings::from_raw(&load_settings_or_default(config)?);
    let rendered = FrameSignatures::default().render(&settings);
    Ok(SignatureReport {
        frame_class: settings.frame_class,
        modules: vec![PRIMARY_MODULE.to_string(), FALLBACK_MODULE.to_string()],
        pointer_moved: rendered.pointer_moved,
        pointer_exited: rendered.pointer_exited,
        loader_module: LOADER_MODULE.to_string(),
        loader_signatures: LOAD_LIBRARY_SIGNATURES.iter().map(|s| s.to_string()).collect(),
    })
}

/// Print the exact signatures the hooks will look up.
pub fn signatures_command(config: Option<&str>, json: bool) -> Result<()> {
    let report = signature_report(config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Frame class: {}", report.frame_class);
    println!("Modules: {}", report.modules.join(", "));
    println!("OnPointerMoved:");
    println!("  {}", report.pointer_moved);
    println!("OnPointerExited:");
    println!("  {}", report.pointer_exited);
    println!("Loader ({}): {}", report.loader_module, report.loader_signatures.join(" | "));

    Ok(())
}

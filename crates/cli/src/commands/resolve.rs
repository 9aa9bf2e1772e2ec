use anyhow::{anyhow, Context, Result};
use dockzoom_core::hooks::{FrameSignatures, SymbolResolver};
use dockzoom_core::settings::EffectiveSettings;
use dockzoom_core::symbols::{ModuleFormat, ModuleSymbols};
use serde::Serialize;

use crate::{canonicalize_or_current, load_settings_or_default, sha256_file};

#[derive(Debug, Serialize)]
pub struct HandlerResolution {
    pub name: String,
    pub signature: String,
    /// Hex address inside the module, if the signature was found.
    pub address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResolveReport {
    pub module: String,
    pub sha256: String,
    pub format: ModuleFormat,
    pub symbols: usize,
    pub handlers: Vec<HandlerResolution>,
}

impl ResolveReport {
    pub fn all_resolved(&self) -> bool {
        self.handlers.iter().all(|h| h.address.is_some())
    }
}

pub fn resolve_report(module: &str, config: Option<&str>) -> Result<ResolveReport> {
    let path = canonicalize_or_current(module)?;
    if !path.exists() {
        return Err(anyhow!("Module file does not exist: {}", path.display()));
    }

    let settings = EffectiveSettings::from_raw(&load_settings_or_default(config)?);
    let rendered = FrameSignatures::default().render(&settings);
    let symbols = ModuleSymbols::from_path(&path)
        .with_context(|| format!("Failed to read symbols from {}", path.display()))?;

    let handlers = [
        ("OnPointerMoved", rendered.pointer_moved),
        ("OnPointerExited", rendered.pointer_exited),
    ]
    .into_iter()
    .map(|(name, signature)| HandlerResolution {
        name: name.to_string(),
        address: symbols.resolve(&signature).map(|a| format!("0x{a:X}")),
        signature,
    })
    .collect();

    Ok(ResolveReport {
        module: path.display().to_string(),
        sha256: sha256_file(&path)?,
        format: symbols.format(),
        symbols: symbols.len(),
        handlers,
    })
}

/// Check an on-disk module for the handlers the hooks need.
///
/// Fails when any handler is missing, after printing the report.
pub fn resolve_command(module: &str, config: Option<&str>, json: bool) -> Result<()> {
    let report = resolve_report(module, config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Module: {}", report.module);
        println!("  SHA-256: {}", report.sha256);
        println!("  Format: {:?} ({} function symbols)", report.format, report.symbols);
        for handler in &report.handlers {
            let address = handler.address.as_deref().unwrap_or("(not found)");
            println!("  {}: {}", handler.name, address);
        }
    }

    if !report.all_resolved() {
        let missing: Vec<&str> = report
            .handlers
            .iter()
            .filter(|h| h.address.is_none())
            .map(|h| h.name.as_str())
            .collect();
        return Err(anyhow!("Unresolved handler signatures: {}", missing.join(", ")));
    }

    Ok(())
}

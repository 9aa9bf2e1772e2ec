//! User-facing settings and the effective values derived from them.
//!
//! Raw settings arrive from the host's settings store (or a JSON file for the
//! CLI) using the store's camelCase keys. `EffectiveSettings` is the validated,
//! read-mostly view the rest of the crate consumes; it is rebuilt wholesale
//! whenever the source changes and never mutated mid-session.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default maximum magnification, in percent.
pub const DEFAULT_ZOOM_PERCENTAGE: i64 = 150;

/// Default number of icon widths that receive some magnification.
pub const DEFAULT_ZOOM_RANGE: i64 = 3;

/// Default owning type of the hooked pointer handlers.
pub const DEFAULT_FRAME_CLASS: &str = "Taskbar.TaskbarFrame";

/// Namespace half of [`DEFAULT_FRAME_CLASS`].
pub const DEFAULT_FRAME_NAMESPACE: &str = "Taskbar";

/// Class half of [`DEFAULT_FRAME_CLASS`].
pub const DEFAULT_FRAME_CLASS_NAME: &str = "TaskbarFrame";

/// Settings exactly as stored by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSettings {
    #[serde(default = "default_zoom_percentage")]
    pub zoom_percentage: i64,
    #[serde(default = "default_zoom_range")]
    pub zoom_range: i64,
    #[serde(default = "default_frame_class")]
    pub taskbar_frame_class: String,
}

fn default_zoom_percentage() -> i64 {
    DEFAULT_ZOOM_PERCENTAGE
}

fn default_zoom_range() -> i64 {
    DEFAULT_ZOOM_RANGE
}

fn default_frame_class() -> String {
    DEFAULT_FRAME_CLASS.to_string()
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            zoom_percentage: DEFAULT_ZOOM_PERCENTAGE,
            zoom_range: DEFAULT_ZOOM_RANGE,
            taskbar_frame_class: DEFAULT_FRAME_CLASS.to_string(),
        }
    }
}

/// Validated settings used by the hook installer and the magnification engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveSettings {
    /// Maximum magnification in percent; always above 100.
    pub zoom_percentage: u32,
    /// Influence radius measured in average icon widths; always at least 1.
    pub zoom_range: u32,
    /// Dotted `Namespace.Class` name of the frame whose handlers are hooked.
    pub frame_class: String,
    /// Namespace part of `frame_class`.
    pub namespace: String,
    /// Class part of `frame_class`.
    pub class: String,
}

impl EffectiveSettings {
    /// Derive effective settings, replacing out-of-range values with defaults.
    pub fn from_raw(raw: &RawSettings) -> Self {
        let zoom_percentage = if raw.zoom_percentage > 100 && raw.zoom_percentage <= i64::from(u32::MAX) {
            raw.zoom_percentage as u32
        } else {
            warn!(
                value = raw.zoom_percentage,
                fallback = DEFAULT_ZOOM_PERCENTAGE,
                "zoomPercentage must be greater than 100; using default"
            );
            DEFAULT_ZOOM_PERCENTAGE as u32
        };

        let zoom_range = if raw.zoom_range >= 1 && raw.zoom_range <= i64::from(u32::MAX) {
            raw.zoom_range as u32
        } else {
            warn!(
                value = raw.zoom_range,
                fallback = DEFAULT_ZOOM_RANGE,
                "zoomRange must be at least 1; using default"
            );
            DEFAULT_ZOOM_RANGE as u32
        };

        let (frame_class, namespace, class) = match split_frame_class(&raw.taskbar_frame_class) {
            Some((namespace, class)) => {
                (raw.taskbar_frame_class.trim().to_string(), namespace, class)
            }
            None => {
                if !raw.taskbar_frame_class.trim().is_empty() {
                    warn!(
                        value = %raw.taskbar_frame_class,
                        fallback = DEFAULT_FRAME_CLASS,
                        "taskbarFrameClass is not of the form Namespace.Class; using default"
                    );
                }
                (
                    DEFAULT_FRAME_CLASS.to_string(),
                    DEFAULT_FRAME_NAMESPACE.to_string(),
                    DEFAULT_FRAME_CLASS_NAME.to_string(),
                )
            }
        };

        Self { zoom_percentage, zoom_range, frame_class, namespace, class }
    }

    /// Scale factor applied to an icon directly under the pointer.
    pub fn max_zoom(&self) -> f64 {
        f64::from(self.zoom_percentage) / 100.0
    }
}

impl Default for EffectiveSettings {
    fn default() -> Self {
        Self::from_raw(&RawSettings::default())
    }
}

/// Split a dotted type name on its first `.` into namespace and class.
///
/// Returns `None` when there is no dot or either side is empty.
pub fn split_frame_class(frame_class: &str) -> Option<(String, String)> {
    let (namespace, class) = frame_class.trim().split_once('.')?;
    if namespace.is_empty() || class.is_empty() {
        return None;
    }
    Some((namespace.to_string(), class.to_string()))
}

/// Load raw settings from a JSON file. Missing keys take their defaults.
pub fn load_settings(path: &Path) -> Result<RawSettings> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings at {}", path.display()))?;
    let raw: RawSettings = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse settings JSON at {}", path.display()))?;
    Ok(raw)
}

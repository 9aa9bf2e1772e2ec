//! Geometry snapshot of the taskbar icon row.
//!
//! The map is built once when a hover session starts and then read on every
//! pointer move. Building walks the frame's visual subtree, so it is the
//! expensive path and must never run per move.

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::visual::{ElementError, ElementHandle, VisualHost};

/// Name of the frame's root container.
pub const ROOT_GRID_NAME: &str = "RootGrid";

/// Name of the container whose direct children are the icons.
pub const ICON_REPEATER_NAME: &str = "TaskbarFrameRepeater";

/// Children of the repeater that are never icons (the widgets entry point).
pub const NON_ICON_WIDGETS: &[&str] = &["AugmentedEntryPointButton"];

/// Icons laid out left of this X are in a transient state and ignored.
pub const MIN_ICON_X: f64 = -100.0;

/// Icons laid out right of this X are in a transient state and ignored.
pub const MAX_ICON_X: f64 = 10_000.0;

/// Reasons a hover session cannot start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// An expected container is missing from the frame's subtree.
    #[error("couldn't find {missing} under the expected hierarchy frame > RootGrid > TaskbarFrameRepeater")]
    StructureNotFound { missing: &'static str },

    /// The containers exist but no child qualified as an icon.
    #[error("no usable icons under frame > RootGrid > TaskbarFrameRepeater")]
    EmptyGeometry,

    /// The frame or a container was torn down while being walked.
    #[error(transparent)]
    Element(#[from] ElementError),
}

/// Geometry of one icon, in the repeater's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IconInfo {
    pub element: ElementHandle,
    pub left_x: f64,
    pub right_x: f64,
    pub center_x: f64,
    pub width: f64,
    /// Position among the repeater's children, in traversal order.
    pub index: usize,
}

impl IconInfo {
    pub fn new(element: ElementHandle, left_x: f64, width: f64, index: usize) -> Self {
        Self {
            element,
            left_x,
            right_x: left_x + width,
            center_x: left_x + width / 2.0,
            width,
            index,
        }
    }
}

/// Icons of the current hover session and the X envelope they cover.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpatialMap {
    icons: Vec<IconInfo>,
    range_left: f64,
    range_right: f64,
}

impl SpatialMap {
    /// Build a map from already-measured icons; `None` when `icons` is empty.
    pub fn from_icons(icons: Vec<IconInfo>) -> Option<Self> {
        let first = icons.first()?;
        let (mut range_left, mut range_right) = (first.left_x, first.right_x);
        for icon in &icons[1..] {
            range_left = range_left.min(icon.left_x);
            range_right = range_right.max(icon.right_x);
        }
        Some(Self { icons, range_left, range_right })
    }

    pub fn icons(&self) -> &[IconInfo] {
        &self.icons
    }

    pub fn len(&self) -> usize {
        self.icons.len()
    }

    /// Always false for a successfully built map.
    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }

    /// `(left, right)` envelope over all icons.
    pub fn range(&self) -> (f64, f64) {
        (self.range_left, self.range_right)
    }

    /// Whether `x` lies inside the envelope widened by `tolerance` on both sides.
    pub fn contains_x(&self, x: f64, tolerance: f64) -> bool {
        x >= self.range_left - tolerance && x <= self.range_right + tolerance
    }
}

/// Walk `frame > RootGrid > TaskbarFrameRepeater` and measure every icon.
pub fn build_spatial_map<H: VisualHost + ?Sized>(
    host: &H,
    frame: ElementHandle,
) -> Result<SpatialMap, SessionError> {
    let root_grid = host
        .find_child_by_name(frame, ROOT_GRID_NAME)?
        .ok_or(SessionError::StructureNotFound { missing: ROOT_GRID_NAME })?;
    let repeater = host
        .find_child_by_name(root_grid, ICON_REPEATER_NAME)?
        .ok_or(SessionError::StructureNotFound { missing: ICON_REPEATER_NAME })?;

    let mut icons = Vec::new();
    for (index, child) in host.children(repeater)?.into_iter().enumerate() {
        match measure_icon(host, repeater, child, index) {
            Ok(Some(info)) => icons.push(info),
            Ok(None) => {}
            Err(err) => debug!(%err, index, "skipping icon that vanished while mapping"),
        }
    }

    let map = SpatialMap::from_icons(icons).ok_or(SessionError::EmptyGeometry)?;
    debug!(icons = map.len(), range = ?map.range(), "built icon spatial map");
    Ok(map)
}

fn measure_icon<H: VisualHost + ?Sized>(
    host: &H,
    repeater: ElementHandle,
    child: ElementHandle,
    index: usize,
) -> Result<Option<IconInfo>, ElementError> {
    let name = host.name(child)?;
    if NON_ICON_WIDGETS.contains(&name.as_str()) {
        return Ok(None);
    }

    let position = host.offset_in(child, repeater)?;
    let width = host.actual_width(child)?;
    if width <= 0.0 || !(MIN_ICON_X..=MAX_ICON_X).contains(&position.x) {
        debug!(index, x = position.x, width, "skipping icon with unusable geometry");
        return Ok(None);
    }

    Ok(Some(IconInfo::new(child, position.x, width, index)))
}

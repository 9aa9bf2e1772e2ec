//! Distance-based falloff from pointer X to per-icon scale and stacking.
//!
//! Everything here is a pure function of the spatial map, the pointer and the
//! settings, so it can run on every processed move.

use serde::Serialize;

use crate::settings::EffectiveSettings;
use crate::spatial::SpatialMap;
use crate::visual::ElementHandle;

/// Width assumed for icons when the map has no positive widths.
pub const FALLBACK_ICON_WIDTH: f64 = 68.0;

/// Scales at or below this are treated as baseline.
pub const AFFECTED_THRESHOLD: f64 = 1.01;

/// Scales above this draw over their neighbours.
pub const ELEVATED_STACKING_THRESHOLD: f64 = 1.1;

/// Lowest stacking value given to an elevated icon.
pub const ELEVATED_STACKING_BASE: i32 = 100;

/// Computed effect for one icon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IconScale {
    pub element: ElementHandle,
    pub scale: f64,
    pub z_index: i32,
}

impl IconScale {
    pub fn new(element: ElementHandle, scale: f64) -> Self {
        Self { element, scale, z_index: stacking_value(scale) }
    }

    /// Whether the icon is visibly magnified and must be reset later.
    pub fn is_affected(&self) -> bool {
        self.scale > AFFECTED_THRESHOLD
    }
}

/// Mean width over icons with a positive width.
pub fn average_icon_width(map: &SpatialMap) -> f64 {
    let (total, count) = map
        .icons()
        .iter()
        .filter(|icon| icon.width > 0.0)
        .fold((0.0, 0usize), |(total, count), icon| (total + icon.width, count + 1));
    if count == 0 {
        FALLBACK_ICON_WIDTH
    } else {
        total / count as f64
    }
}

/// Furthest pointer-to-center distance that still magnifies an icon.
pub fn influence_distance(map: &SpatialMap, settings: &EffectiveSettings) -> f64 {
    f64::from(settings.zoom_range) * average_icon_width(map)
}

/// Scale for an icon whose center is `distance` away from the pointer.
pub fn falloff_scale(distance: f64, half_width: f64, max_influence: f64, max_zoom: f64) -> f64 {
    if distance > max_influence {
        return 1.0;
    }
    if distance <= half_width {
        return max_zoom;
    }
    let span = max_influence - half_width;
    if span <= 0.0 {
        return 1.0;
    }
    let ratio = ((distance - half_width) / span).clamp(0.0, 1.0);
    (max_zoom - (max_zoom - 1.0) * ratio).max(1.0)
}

/// Stacking value for a scale: larger scales always stack higher.
pub fn stacking_value(scale: f64) -> i32 {
    if scale > ELEVATED_STACKING_THRESHOLD {
        ELEVATED_STACKING_BASE + ((scale - 1.0) * 100.0).floor() as i32
    } else {
        0
    }
}

/// Scale and stacking for every icon in the map, in map order.
pub fn compute_scales(
    map: &SpatialMap,
    pointer_x: f64,
    settings: &EffectiveSettings,
) -> Vec<IconScale> {
    let max_zoom = settings.max_zoom();
    let max_influence = influence_distance(map, settings);

    map.icons()
        .iter()
        .map(|icon| {
            let distance = (icon.center_x - pointer_x).abs();
            let scale = falloff_scale(distance, icon.width / 2.0, max_influence, max_zoom);
            IconScale::new(icon.element, scale)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::IconInfo;

    fn row(count: usize, width: f64) -> SpatialMap {
        let icons = (0..count)
            .map(|i| IconInfo::new(ElementHandle(i as u64), i as f64 * width, width, i))
            .collect();
        SpatialMap::from_icons(icons).unwrap()
    }

    #[test]
    fn five_icon_row_matches_expected_profile() {
        let map = row(5, 68.0);
        let scales = compute_scales(&map, 34.0, &EffectiveSettings::default());

        assert_eq!(scales[0].scale, 1.5);
        assert!(scales[1].scale > 1.0 && scales[1].scale < 1.5, "got {}", scales[1].scale);
        // Icon 3 sits exactly on the influence boundary (204).
        assert_eq!(scales[3].scale, 1.0);
        assert_eq!(scales[4].scale, 1.0);
    }

    #[test]
    fn pointer_inside_half_width_band_gives_full_zoom() {
        let map = row(5, 68.0);
        let settings = EffectiveSettings::default();
        for x in [68.0, 80.0, 102.0, 120.0, 136.0] {
            let scales = compute_scales(&map, x, &settings);
            assert_eq!(scales[1].scale, settings.max_zoom(), "pointer at {x}");
        }
    }

    #[test]
    fn beyond_influence_is_exactly_identity() {
        let map = row(10, 50.0);
        let settings = EffectiveSettings::default();
        let max_influence = influence_distance(&map, &settings);
        let scales = compute_scales(&map, 0.0, &settings);
        for (icon, scale) in map.icons().iter().zip(&scales) {
            if icon.center_x > max_influence {
                assert_eq!(scale.scale, 1.0);
                assert_eq!(scale.z_index, 0);
            }
        }
    }

    #[test]
    fn falloff_is_monotonic_in_distance() {
        let mut previous = f64::INFINITY;
        let mut distance = 34.5;
        while distance <= 204.0 {
            let scale = falloff_scale(distance, 34.0, 204.0, 1.5);
            assert!(scale <= previous, "scale rose at distance {distance}");
            assert!((1.0..=1.5).contains(&scale));
            previous = scale;
            distance += 0.5;
        }
    }

    #[test]
    fn stacking_orders_by_scale() {
        assert_eq!(stacking_value(1.0), 0);
        assert_eq!(stacking_value(1.1), 0);
        assert_eq!(stacking_value(1.25), 125);
        assert_eq!(stacking_value(1.5), 150);
        assert!(stacking_value(1.4) > stacking_value(1.2));
    }

    #[test]
    fn degenerate_widths_fall_back_to_typical_icon() {
        let map = SpatialMap::from_icons(vec![IconInfo::new(ElementHandle(0), 0.0, 0.0, 0)]).unwrap();
        assert_eq!(average_icon_width(&map), FALLBACK_ICON_WIDTH);
    }

    #[test]
    fn affected_threshold_ignores_imperceptible_scales() {
        assert!(!IconScale::new(ElementHandle(0), 1.005).is_affected());
        assert!(IconScale::new(ElementHandle(0), 1.02).is_affected());
    }
}

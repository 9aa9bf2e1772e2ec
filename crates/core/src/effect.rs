//! The only code that writes scale, origin and stacking onto host elements.
//!
//! `EffectApplier` tracks which elements currently carry a visible
//! magnification so they can be returned to baseline when they leave the
//! pointer's influence or the session ends. Elements that vanished from the
//! host tree are skipped one by one; a batch never aborts halfway.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::magnify::{IconScale, AFFECTED_THRESHOLD};
use crate::visual::{ElementError, ElementHandle, Point, VisualHost};

/// Origin used while magnified: icons grow upward from the taskbar baseline.
pub const GROW_ORIGIN: Point = Point::new(0.5, 1.0);

/// Origin used at baseline.
pub const CENTER_ORIGIN: Point = Point::new(0.5, 0.5);

/// An element currently magnified above baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AffectedIcon {
    pub element: ElementHandle,
    pub scale: f64,
}

#[derive(Debug, Default)]
pub struct EffectApplier {
    affected: Vec<AffectedIcon>,
}

impl EffectApplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn affected(&self) -> &[AffectedIcon] {
        &self.affected
    }

    /// Write every scale in `scales` and rebuild the affected set.
    ///
    /// Elements that were affected before but are not written at baseline in
    /// this pass are reset explicitly before they leave the set.
    pub fn apply<H: VisualHost + ?Sized>(&mut self, host: &H, scales: &[IconScale]) {
        let mut next = Vec::new();
        let mut at_baseline = HashSet::new();

        for icon in scales {
            match apply_one(host, icon) {
                Ok(()) if icon.is_affected() => {
                    next.push(AffectedIcon { element: icon.element, scale: icon.scale })
                }
                Ok(()) => {
                    at_baseline.insert(icon.element);
                }
                Err(err) => debug!(%err, "skipping magnification of a detached icon"),
            }
        }

        let stale: Vec<ElementHandle> = self
            .affected
            .iter()
            .map(|a| a.element)
            .filter(|e| !at_baseline.contains(e) && !next.iter().any(|n| n.element == *e))
            .collect();
        reset_elements(host, &stale);

        self.affected = next;
    }

    /// Return every affected element to baseline and empty the set.
    pub fn reset_all<H: VisualHost + ?Sized>(&mut self, host: &H) {
        let elements: Vec<ElementHandle> = self.affected.drain(..).map(|a| a.element).collect();
        reset_elements(host, &elements);
    }
}

/// Force each element carrying a scale transform back to identity.
///
/// Returns how many elements were actually reset. Never fails: detached
/// elements are skipped.
pub fn reset_elements<H: VisualHost + ?Sized>(host: &H, elements: &[ElementHandle]) -> usize {
    let mut reset = 0;
    for &element in elements {
        match reset_one(host, element) {
            Ok(true) => reset += 1,
            Ok(false) => {}
            Err(err) => debug!(%err, "skipping reset of a detached icon"),
        }
    }
    reset
}

fn apply_one<H: VisualHost + ?Sized>(host: &H, icon: &IconScale) -> Result<(), ElementError> {
    if host.scale_transform(icon.element)?.is_none() {
        host.attach_scale_transform(icon.element)?;
    }
    let origin = if icon.scale > AFFECTED_THRESHOLD { GROW_ORIGIN } else { CENTER_ORIGIN };
    host.set_transform_origin(icon.element, origin)?;
    host.set_scale(icon.element, icon.scale, icon.scale)?;
    host.set_z_index(icon.element, icon.z_index)
}

fn reset_one<H: VisualHost + ?Sized>(host: &H, element: ElementHandle) -> Result<bool, ElementError> {
    if host.scale_transform(element)?.is_none() {
        return Ok(false);
    }
    host.set_scale(element, 1.0, 1.0)?;
    host.set_transform_origin(element, CENTER_ORIGIN)?;
    host.set_z_index(element, 0)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visual::{ScaleTransform, TaskbarLayout};

    #[test]
    fn apply_then_reset_restores_baseline() {
        let (tree, scene) = TaskbarLayout::uniform(2, 40.0).build();
        let mut applier = EffectApplier::new();
        applier.apply(&tree, &[IconScale::new(scene.icons[0], 1.25)]);

        assert_eq!(tree.scale_of(scene.icons[0]).unwrap().scale_x, 1.25);
        assert_eq!(tree.origin_of(scene.icons[0]), GROW_ORIGIN);
        assert_eq!(tree.z_index_of(scene.icons[0]), 125);

        applier.reset_all(&tree);
        assert_eq!(tree.scale_of(scene.icons[0]), Some(ScaleTransform::IDENTITY));
        assert_eq!(tree.z_index_of(scene.icons[0]), 0);
        assert_eq!(tree.origin_of(scene.icons[0]), CENTER_ORIGIN);
        assert!(applier.affected().is_empty());
    }

    #[test]
    fn reset_twice_is_harmless() {
        let (tree, scene) = TaskbarLayout::uniform(2, 40.0).build();
        let mut applier = EffectApplier::new();
        applier.apply(&tree, &[IconScale::new(scene.icons[1], 1.5)]);

        assert_eq!(reset_elements(&tree, &scene.icons[1..]), 1);
        assert_eq!(reset_elements(&tree, &scene.icons[1..]), 1);
        assert_eq!(tree.scale_of(scene.icons[1]), Some(ScaleTransform::IDENTITY));
    }

    #[test]
    fn detached_elements_do_not_stop_the_batch() {
        let (tree, scene) = TaskbarLayout::uniform(3, 40.0).build();
        tree.detach(scene.icons[0]);
        let mut applier = EffectApplier::new();

        applier.apply(
            &tree,
            &[
                IconScale::new(scene.icons[0], 1.5),
                IconScale::new(scene.icons[1], 1.5),
                IconScale::new(scene.icons[2], 1.0),
            ],
        );

        assert_eq!(applier.affected().len(), 1);
        assert_eq!(applier.affected()[0].element, scene.icons[1]);
        assert_eq!(tree.z_index_of(scene.icons[2]), 0);
        assert!(tree.scale_of(scene.icons[2]).is_some());
    }

    #[test]
    fn elements_without_transform_are_left_alone_on_reset() {
        let (tree, scene) = TaskbarLayout::uniform(1, 40.0).build();
        assert_eq!(reset_elements(&tree, &scene.icons), 0);
        assert_eq!(tree.property_writes(), 0);
    }
}

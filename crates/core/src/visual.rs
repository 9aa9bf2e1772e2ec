//! Host visual tree abstraction.
//!
//! The shell owns every visual element; this crate only ever holds
//! [`ElementHandle`]s, which are lookup keys and never keep an element alive.
//! Every operation on the [`VisualHost`] is fallible because an element can be
//! torn down by the host between two calls.
//!
//! [`SceneTree`] is an in-memory host used by the simulator and the tests.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::settings::DEFAULT_FRAME_CLASS;
use crate::spatial::{ICON_REPEATER_NAME, ROOT_GRID_NAME};

/// Non-owning reference to a host visual element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementHandle(pub u64);

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element#{}", self.0)
    }
}

/// Opaque reference to the pointer event arguments passed to a hooked handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventArgsHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Visible,
    Collapsed,
}

/// Scale component of an element's render transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleTransform {
    pub scale_x: f64,
    pub scale_y: f64,
}

impl ScaleTransform {
    pub const IDENTITY: ScaleTransform = ScaleTransform { scale_x: 1.0, scale_y: 1.0 };

    pub fn is_identity(&self) -> bool {
        self.scale_x == 1.0 && self.scale_y == 1.0
    }
}

/// Failure to reach a host element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ElementError {
    /// The element was removed from the host tree (or never existed).
    #[error("{0} is no longer attached to the visual tree")]
    Detached(ElementHandle),
}

/// Operations the shell's visual tree offers to the magnification logic.
pub trait VisualHost {
    /// Direct children, in the host's traversal order.
    fn children(&self, element: ElementHandle) -> Result<Vec<ElementHandle>, ElementError>;

    /// The element's `Name` property (may be empty).
    fn name(&self, element: ElementHandle) -> Result<String, ElementError>;

    /// Runtime class name, e.g. `Taskbar.TaskbarFrame`.
    fn class_name(&self, element: ElementHandle) -> Result<String, ElementError>;

    /// Position of the element's origin in `ancestor`'s coordinate space.
    fn offset_in(
        &self,
        element: ElementHandle,
        ancestor: ElementHandle,
    ) -> Result<Point, ElementError>;

    fn actual_width(&self, element: ElementHandle) -> Result<f64, ElementError>;

    fn visibility(&self, element: ElementHandle) -> Result<Visibility, ElementError>;

    /// Current render transform, if it is a scale transform.
    fn scale_transform(
        &self,
        element: ElementHandle,
    ) -> Result<Option<ScaleTransform>, ElementError>;

    /// Install an identity scale transform as the element's render transform.
    fn attach_scale_transform(&self, element: ElementHandle) -> Result<(), ElementError>;

    fn set_scale(
        &self,
        element: ElementHandle,
        scale_x: f64,
        scale_y: f64,
    ) -> Result<(), ElementError>;

    /// Render transform origin in relative units (0..1 on each axis).
    fn set_transform_origin(&self, element: ElementHandle, origin: Point)
        -> Result<(), ElementError>;

    /// Stacking (z-order) value among siblings.
    fn set_z_index(&self, element: ElementHandle, z_index: i32) -> Result<(), ElementError>;

    /// Pointer position carried by `args`, relative to `relative_to`.
    fn pointer_position(&self, args: EventArgsHandle, relative_to: ElementHandle) -> Option<Point>;

    /// First direct child whose name equals `name`.
    fn find_child_by_name(
        &self,
        parent: ElementHandle,
        name: &str,
    ) -> Result<Option<ElementHandle>, ElementError> {
        for child in self.children(parent)? {
            // A sibling vanishing mid-walk does not invalidate the search.
            if matches!(self.name(child), Ok(child_name) if child_name == name) {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }
}

/// Description of a node to add to a [`SceneTree`].
#[derive(Debug, Clone, Default)]
pub struct NodeSpec {
    pub name: String,
    pub class_name: String,
    /// Offset from the parent's origin.
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub visibility: Visibility,
}

impl NodeSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }

    pub fn at(mut self, x: f64, width: f64) -> Self {
        self.x = x;
        self.width = width;
        self
    }
}

#[derive(Debug, Clone)]
struct SceneNode {
    spec: NodeSpec,
    parent: Option<ElementHandle>,
    children: Vec<ElementHandle>,
    attached: bool,
    transform: Option<ScaleTransform>,
    origin: Point,
    z_index: i32,
}

/// In-memory visual tree implementing [`VisualHost`].
#[derive(Debug, Default)]
pub struct SceneTree {
    nodes: RefCell<Vec<SceneNode>>,
    pointers: RefCell<HashMap<EventArgsHandle, Point>>,
    property_writes: Cell<u64>,
}

impl SceneTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node under `parent` (or as a root) and return its handle.
    pub fn add(&self, parent: Option<ElementHandle>, spec: NodeSpec) -> ElementHandle {
        let mut nodes = self.nodes.borrow_mut();
        let handle = ElementHandle(nodes.len() as u64);
        nodes.push(SceneNode {
            spec,
            parent,
            children: Vec::new(),
            attached: true,
            transform: None,
            origin: Point::new(0.5, 0.5),
            z_index: 0,
        });
        if let Some(parent) = parent {
            if let Some(node) = nodes.get_mut(parent.0 as usize) {
                node.children.push(handle);
            }
        }
        handle
    }

    /// Remove an element (and implicitly its subtree) from the tree.
    pub fn detach(&self, element: ElementHandle) {
        if let Some(node) = self.nodes.borrow_mut().get_mut(element.0 as usize) {
            node.attached = false;
        }
    }

    pub fn set_visibility(&self, element: ElementHandle, visibility: Visibility) {
        if let Some(node) = self.nodes.borrow_mut().get_mut(element.0 as usize) {
            node.spec.visibility = visibility;
        }
    }

    pub fn set_layout(&self, element: ElementHandle, x: f64, width: f64) {
        if let Some(node) = self.nodes.borrow_mut().get_mut(element.0 as usize) {
            node.spec.x = x;
            node.spec.width = width;
        }
    }

    /// Record the pointer position (in root coordinates) carried by `args`.
    pub fn set_pointer(&self, args: EventArgsHandle, position: Point) {
        self.pointers.borrow_mut().insert(args, position);
    }

    /// Current scale transform, if any, ignoring attachment.
    pub fn scale_of(&self, element: ElementHandle) -> Option<ScaleTransform> {
        self.nodes.borrow().get(element.0 as usize).and_then(|n| n.transform)
    }

    pub fn z_index_of(&self, element: ElementHandle) -> i32 {
        self.nodes.borrow().get(element.0 as usize).map(|n| n.z_index).unwrap_or(0)
    }

    pub fn origin_of(&self, element: ElementHandle) -> Point {
        self.nodes.borrow().get(element.0 as usize).map(|n| n.origin).unwrap_or_default()
    }

    /// Number of property writes (transform, scale, origin, stacking) so far.
    pub fn property_writes(&self) -> u64 {
        self.property_writes.get()
    }

    fn with_node<T>(
        &self,
        element: ElementHandle,
        f: impl FnOnce(&SceneNode) -> T,
    ) -> Result<T, ElementError> {
        let nodes = self.nodes.borrow();
        match nodes.get(element.0 as usize) {
            Some(node) if node.attached => Ok(f(node)),
            _ => Err(ElementError::Detached(element)),
        }
    }

    fn with_node_mut<T>(
        &self,
        element: ElementHandle,
        f: impl FnOnce(&mut SceneNode) -> T,
    ) -> Result<T, ElementError> {
        let mut nodes = self.nodes.borrow_mut();
        match nodes.get_mut(element.0 as usize) {
            Some(node) if node.attached => {
                self.property_writes.set(self.property_writes.get() + 1);
                Ok(f(node))
            }
            _ => Err(ElementError::Detached(element)),
        }
    }

    /// Offset of `element` from the root of its tree.
    fn absolute_offset(&self, element: ElementHandle) -> Result<Point, ElementError> {
        let nodes = self.nodes.borrow();
        let mut offset = Point::default();
        let mut current = Some(element);
        while let Some(handle) = current {
            let node = nodes
                .get(handle.0 as usize)
                .filter(|n| n.attached)
                .ok_or(ElementError::Detached(handle))?;
            offset.x += node.spec.x;
            offset.y += node.spec.y;
            current = node.parent;
        }
        Ok(offset)
    }
}

impl VisualHost for SceneTree {
    fn children(&self, element: ElementHandle) -> Result<Vec<ElementHandle>, ElementError> {
        let children = self.with_node(element, |n| n.children.clone())?;
        let nodes = self.nodes.borrow();
        Ok(children
            .into_iter()
            .filter(|c| nodes.get(c.0 as usize).is_some_and(|n| n.attached))
            .collect())
    }

    fn name(&self, element: ElementHandle) -> Result<String, ElementError> {
        self.with_node(element, |n| n.spec.name.clone())
    }

    fn class_name(&self, element: ElementHandle) -> Result<String, ElementError> {
        self.with_node(element, |n| n.spec.class_name.clone())
    }

    fn offset_in(
        &self,
        element: ElementHandle,
        ancestor: ElementHandle,
    ) -> Result<Point, ElementError> {
        let own = self.absolute_offset(element)?;
        let base = self.absolute_offset(ancestor)?;
        Ok(Point::new(own.x - base.x, own.y - base.y))
    }

    fn actual_width(&self, element: ElementHandle) -> Result<f64, ElementError> {
        self.with_node(element, |n| n.spec.width)
    }

    fn visibility(&self, element: ElementHandle) -> Result<Visibility, ElementError> {
        self.with_node(element, |n| n.spec.visibility)
    }

    fn scale_transform(
        &self,
        element: ElementHandle,
    ) -> Result<Option<ScaleTransform>, ElementError> {
        self.with_node(element, |n| n.transform)
    }

    fn attach_scale_transform(&self, element: ElementHandle) -> Result<(), ElementError> {
        self.with_node_mut(element, |n| n.transform = Some(ScaleTransform::IDENTITY))
    }

    fn set_scale(
        &self,
        element: ElementHandle,
        scale_x: f64,
        scale_y: f64,
    ) -> Result<(), ElementError> {
        self.with_node_mut(element, |n| {
            n.transform = Some(ScaleTransform { scale_x, scale_y });
        })
    }

    fn set_transform_origin(
        &self,
        element: ElementHandle,
        origin: Point,
    ) -> Result<(), ElementError> {
        self.with_node_mut(element, |n| n.origin = origin)
    }

    fn set_z_index(&self, element: ElementHandle, z_index: i32) -> Result<(), ElementError> {
        self.with_node_mut(element, |n| n.z_index = z_index)
    }

    fn pointer_position(&self, args: EventArgsHandle, relative_to: ElementHandle) -> Option<Point> {
        let pointer = *self.pointers.borrow().get(&args)?;
        let base = self.absolute_offset(relative_to).ok()?;
        Some(Point::new(pointer.x - base.x, pointer.y - base.y))
    }
}

/// One icon slot in a [`TaskbarLayout`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IconSpec {
    #[serde(default)]
    pub name: Option<String>,
    /// Explicit X offset within the repeater; defaults to directly after the
    /// previous icon.
    #[serde(default)]
    pub x: Option<f64>,
    pub width: f64,
    #[serde(default)]
    pub visibility: Visibility,
}

impl IconSpec {
    pub fn new(width: f64) -> Self {
        Self { name: None, x: None, width, visibility: Visibility::Visible }
    }
}

/// Declarative description of a taskbar frame and its icon row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskbarLayout {
    #[serde(default = "default_layout_class")]
    pub frame_class: String,
    /// X offset of the icon repeater inside the frame.
    #[serde(default)]
    pub repeater_x: f64,
    pub icons: Vec<IconSpec>,
}

fn default_layout_class() -> String {
    DEFAULT_FRAME_CLASS.to_string()
}

/// Handles of the interesting nodes of a built [`TaskbarLayout`].
#[derive(Debug, Clone)]
pub struct TaskbarScene {
    pub frame: ElementHandle,
    pub root_grid: ElementHandle,
    pub repeater: ElementHandle,
    pub icons: Vec<ElementHandle>,
}

impl TaskbarLayout {
    /// `count` contiguous icons of equal width starting at X=0.
    pub fn uniform(count: usize, width: f64) -> Self {
        Self {
            frame_class: default_layout_class(),
            repeater_x: 0.0,
            icons: (0..count).map(|_| IconSpec::new(width)).collect(),
        }
    }

    /// Materialize the layout as frame > RootGrid > TaskbarFrameRepeater > icons.
    pub fn build(&self) -> (SceneTree, TaskbarScene) {
        let tree = SceneTree::new();
        let frame = tree.add(None, NodeSpec::named("").with_class(self.frame_class.clone()));
        let root_grid = tree.add(Some(frame), NodeSpec::named(ROOT_GRID_NAME));
        let repeater = tree.add(
            Some(root_grid),
            NodeSpec { x: self.repeater_x, ..NodeSpec::named(ICON_REPEATER_NAME) },
        );

        let mut next_x = 0.0;
        let mut icons = Vec::with_capacity(self.icons.len());
        for (i, icon) in self.icons.iter().enumerate() {
            let x = icon.x.unwrap_or(next_x);
            next_x = x + icon.width;
            let name = icon.name.clone().unwrap_or_else(|| format!("TaskListButton{i}"));
            let handle = tree.add(
                Some(repeater),
                NodeSpec { visibility: icon.visibility, ..NodeSpec::named(name).at(x, icon.width) },
            );
            icons.push(handle);
        }

        (tree, TaskbarScene { frame, root_grid, repeater, icons })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_relative_to_the_requested_ancestor() {
        let layout = TaskbarLayout { repeater_x: 20.0, ..TaskbarLayout::uniform(3, 40.0) };
        let (tree, scene) = layout.build();
        let in_repeater = tree.offset_in(scene.icons[2], scene.repeater).unwrap();
        let in_frame = tree.offset_in(scene.icons[2], scene.frame).unwrap();
        assert_eq!(in_repeater.x, 80.0);
        assert_eq!(in_frame.x, 100.0);
    }

    #[test]
    fn detached_elements_report_errors_and_vanish_from_children() {
        let (tree, scene) = TaskbarLayout::uniform(2, 40.0).build();
        tree.detach(scene.icons[0]);
        assert_eq!(tree.actual_width(scene.icons[0]), Err(ElementError::Detached(scene.icons[0])));
        assert_eq!(tree.children(scene.repeater).unwrap(), vec![scene.icons[1]]);
    }

    #[test]
    fn find_child_by_name_walks_direct_children_only() {
        let (tree, scene) = TaskbarLayout::uniform(1, 40.0).build();
        assert_eq!(tree.find_child_by_name(scene.frame, ROOT_GRID_NAME).unwrap(), Some(scene.root_grid));
        assert_eq!(tree.find_child_by_name(scene.frame, ICON_REPEATER_NAME).unwrap(), None);
    }

    #[test]
    fn pointer_position_is_translated_into_element_space() {
        let (tree, scene) = TaskbarLayout { repeater_x: 10.0, ..TaskbarLayout::uniform(1, 40.0) }.build();
        let args = EventArgsHandle(7);
        tree.set_pointer(args, Point::new(55.0, 3.0));
        assert_eq!(tree.pointer_position(args, scene.repeater), Some(Point::new(45.0, 3.0)));
        assert_eq!(tree.pointer_position(EventArgsHandle(8), scene.frame), None);
    }
}

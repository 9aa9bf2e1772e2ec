use std::cell::RefCell;

use dockzoom_core::effect::{CENTER_ORIGIN, GROW_ORIGIN};
use dockzoom_core::hover::{HoverMachine, HoverOutcome, HoverPhase, ResetReason};
use dockzoom_core::settings::EffectiveSettings;
use dockzoom_core::spatial::{ICON_REPEATER_NAME, ROOT_GRID_NAME};
use dockzoom_core::visual::{
    ElementError, ElementHandle, EventArgsHandle, IconSpec, NodeSpec, Point, ScaleTransform,
    SceneTree, TaskbarLayout, Visibility, VisualHost,
};

fn five_icons() -> (SceneTree, dockzoom_core::visual::TaskbarScene) {
    TaskbarLayout::uniform(5, 68.0).build()
}

fn scale_x(tree: &SceneTree, element: ElementHandle) -> f64 {
    tree.scale_of(element).map(|t| t.scale_x).unwrap_or(1.0)
}

#[test]
fn first_move_builds_map_and_magnifies_hovered_icon() {
    let (tree, scene) = five_icons();
    let machine = HoverMachine::new();
    let settings = EffectiveSettings::default();

    let outcome = machine.handle_move(&tree, scene.frame, 34.0, &settings, 1_000);

    assert!(matches!(outcome, HoverOutcome::Updated { affected } if affected == 3));
    assert_eq!(machine.phase(), HoverPhase::Active);
    assert_eq!(scale_x(&tree, scene.icons[0]), 1.5);
    assert_eq!(tree.origin_of(scene.icons[0]), GROW_ORIGIN);
    assert_eq!(tree.z_index_of(scene.icons[0]), 150);
    assert!(scale_x(&tree, scene.icons[1]) > 1.0);
    assert_eq!(scale_x(&tree, scene.icons[3]), 1.0);
    assert_eq!(tree.z_index_of(scene.icons[3]), 0);
    assert_eq!(tree.origin_of(scene.icons[3]), CENTER_ORIGIN);

    let mapped = machine.with_session(|s| s.map().len()).expect("session is live");
    assert_eq!(mapped, 5);
}

#[test]
fn moves_too_close_in_time_or_space_are_debounced() {
    let (tree, scene) = five_icons();
    let machine = HoverMachine::new();
    let settings = EffectiveSettings::default();

    machine.handle_move(&tree, scene.frame, 100.0, &settings, 1_000);
    let writes = tree.property_writes();

    assert_eq!(
        machine.handle_move(&tree, scene.frame, 102.0, &settings, 1_005),
        HoverOutcome::Debounced
    );
    assert_eq!(tree.property_writes(), writes, "debounced moves write nothing");

    assert!(matches!(
        machine.handle_move(&tree, scene.frame, 102.0, &settings, 1_020),
        HoverOutcome::Updated { .. }
    ));
    assert_eq!(
        machine.handle_move(&tree, scene.frame, 102.5, &settings, 1_060),
        HoverOutcome::Debounced
    );
}

#[test]
fn map_is_built_once_per_session() {
    let (tree, scene) = five_icons();
    let machine = HoverMachine::new();
    let settings = EffectiveSettings::default();

    machine.handle_move(&tree, scene.frame, 34.0, &settings, 0);
    tree.set_layout(scene.icons[0], 0.0, 200.0);
    machine.handle_move(&tree, scene.frame, 40.0, &settings, 100);

    let width = machine.with_session(|s| s.map().icons()[0].width).expect("session is live");
    assert_eq!(width, 68.0);

    machine.handle_exit(&tree);
    machine.handle_move(&tree, scene.frame, 40.0, &settings, 200);
    let width = machine.with_session(|s| s.map().icons()[0].width).expect("session is live");
    assert_eq!(width, 200.0, "a new session measures again");
}

#[test]
fn leaving_the_icon_envelope_resets_everything() {
    let (tree, scene) = five_icons();
    let machine = HoverMachine::new();
    let settings = EffectiveSettings::default();

    // Envelope is [0, 340]; the tolerance keeps 380 inside.
    assert!(matches!(
        machine.handle_move(&tree, scene.frame, 380.0, &settings, 0),
        HoverOutcome::Updated { .. }
    ));
    assert!(scale_x(&tree, scene.icons[4]) > 1.0);

    assert_eq!(
        machine.handle_move(&tree, scene.frame, 400.0, &settings, 100),
        HoverOutcome::Reset { reason: ResetReason::OutOfRange }
    );
    assert_eq!(machine.phase(), HoverPhase::Idle);
    assert!(machine.affected().is_empty());
    for icon in &scene.icons {
        assert_eq!(scale_x(&tree, *icon), 1.0);
        assert_eq!(tree.z_index_of(*icon), 0);
    }
}

#[test]
fn pointer_exit_restores_baseline() {
    let (tree, scene) = five_icons();
    let machine = HoverMachine::new();
    let settings = EffectiveSettings::default();

    machine.handle_move(&tree, scene.frame, 170.0, &settings, 0);
    assert!(!machine.affected().is_empty());

    assert_eq!(
        machine.handle_exit(&tree),
        HoverOutcome::Reset { reason: ResetReason::PointerExited }
    );
    assert_eq!(machine.phase(), HoverPhase::Idle);
    for icon in &scene.icons {
        assert_eq!(tree.scale_of(*icon), Some(ScaleTransform::IDENTITY));
        assert_eq!(tree.origin_of(*icon), CENTER_ORIGIN);
    }

    // A second exit has nothing left to do.
    let writes = tree.property_writes();
    machine.handle_exit(&tree);
    assert_eq!(tree.property_writes(), writes);
}

#[test]
fn missing_repeater_fails_closed() {
    let tree = SceneTree::new();
    let frame = tree.add(None, NodeSpec::named("").with_class("Taskbar.TaskbarFrame"));
    tree.add(Some(frame), NodeSpec::named(ROOT_GRID_NAME));
    let machine = HoverMachine::new();

    let outcome = machine.handle_move(&tree, frame, 10.0, &EffectiveSettings::default(), 0);

    assert_eq!(outcome, HoverOutcome::Reset { reason: ResetReason::MapFailed });
    assert_eq!(machine.phase(), HoverPhase::Idle);
    assert_eq!(tree.property_writes(), 0);
    assert!(machine.with_session(|_| ()).is_none());
}

#[test]
fn repeater_without_usable_icons_fails_closed() {
    let tree = SceneTree::new();
    let frame = tree.add(None, NodeSpec::named("").with_class("Taskbar.TaskbarFrame"));
    let grid = tree.add(Some(frame), NodeSpec::named(ROOT_GRID_NAME));
    let repeater = tree.add(Some(grid), NodeSpec::named(ICON_REPEATER_NAME));
    tree.add(Some(repeater), NodeSpec::named("AugmentedEntryPointButton").at(0.0, 90.0));
    tree.add(Some(repeater), NodeSpec::named("Collapsed").at(90.0, 0.0));
    tree.add(Some(repeater), NodeSpec::named("FarAway").at(20_000.0, 40.0));
    let machine = HoverMachine::new();

    let outcome = machine.handle_move(&tree, frame, 10.0, &EffectiveSettings::default(), 0);

    assert_eq!(outcome, HoverOutcome::Reset { reason: ResetReason::MapFailed });
    assert_eq!(tree.property_writes(), 0);
}

#[test]
fn hidden_and_oversized_icons_are_not_written() {
    let layout = TaskbarLayout {
        icons: vec![
            IconSpec::new(68.0),
            IconSpec { visibility: Visibility::Collapsed, ..IconSpec::new(68.0) },
            IconSpec::new(68.0),
            IconSpec::new(68.0),
        ],
        ..TaskbarLayout::uniform(0, 68.0)
    };
    let (tree, scene) = layout.build();
    let machine = HoverMachine::new();
    let settings = EffectiveSettings::default();

    machine.handle_move(&tree, scene.frame, 102.0, &settings, 0);
    assert!(tree.scale_of(scene.icons[1]).is_none());
    assert!(tree.scale_of(scene.icons[0]).is_some());

    // Mid-animation width after the map was taken.
    tree.set_layout(scene.icons[3], 204.0, 1_500.0);
    machine.handle_move(&tree, scene.frame, 238.0, &settings, 100);
    assert_eq!(scale_x(&tree, scene.icons[3]), 1.0);
    assert!(scale_x(&tree, scene.icons[2]) > 1.0);
}

#[test]
fn icon_detached_mid_session_is_skipped() {
    let (tree, scene) = five_icons();
    let machine = HoverMachine::new();
    let settings = EffectiveSettings::default();

    machine.handle_move(&tree, scene.frame, 34.0, &settings, 0);
    tree.detach(scene.icons[1]);

    let outcome = machine.handle_move(&tree, scene.frame, 102.0, &settings, 100);

    assert!(matches!(outcome, HoverOutcome::Updated { .. }));
    assert!(machine.affected().iter().all(|a| a.element != scene.icons[1]));
    assert!(scale_x(&tree, scene.icons[2]) > 1.0);
    assert_eq!(machine.handle_exit(&tree), HoverOutcome::Reset { reason: ResetReason::PointerExited });
}

#[test]
fn icons_leaving_influence_are_returned_to_baseline() {
    let (tree, scene) = TaskbarLayout::uniform(8, 68.0).build();
    let machine = HoverMachine::new();
    let settings = EffectiveSettings::default();

    machine.handle_move(&tree, scene.frame, 34.0, &settings, 0);
    assert!(scale_x(&tree, scene.icons[0]) > 1.0);

    machine.handle_move(&tree, scene.frame, 510.0, &settings, 100);
    assert_eq!(scale_x(&tree, scene.icons[0]), 1.0);
    assert_eq!(tree.z_index_of(scene.icons[0]), 0);
    assert!(scale_x(&tree, scene.icons[7]) > 1.0);
}

/// What the host does to the machine from inside a scale write.
#[derive(Clone, Copy)]
enum Reentry {
    MoveThenExit,
    Move,
    TeardownThenMove,
}

/// Host whose property writes synchronously re-enter the machine, like a
/// relayout raising pointer events on the same thread.
struct ReentrantHost<'a> {
    tree: &'a SceneTree,
    machine: &'a HoverMachine,
    frame: ElementHandle,
    settings: &'a EffectiveSettings,
    reentry: Reentry,
    nested: RefCell<Vec<HoverOutcome>>,
}

impl<'a> ReentrantHost<'a> {
    fn new(
        tree: &'a SceneTree,
        machine: &'a HoverMachine,
        frame: ElementHandle,
        settings: &'a EffectiveSettings,
        reentry: Reentry,
    ) -> Self {
        Self { tree, machine, frame, settings, reentry, nested: RefCell::new(Vec::new()) }
    }
}

impl VisualHost for ReentrantHost<'_> {
    fn children(&self, element: ElementHandle) -> Result<Vec<ElementHandle>, ElementError> {
        self.tree.children(element)
    }

    fn name(&self, element: ElementHandle) -> Result<String, ElementError> {
        self.tree.name(element)
    }

    fn class_name(&self, element: ElementHandle) -> Result<String, ElementError> {
        self.tree.class_name(element)
    }

    fn offset_in(
        &self,
        element: ElementHandle,
        ancestor: ElementHandle,
    ) -> Result<Point, ElementError> {
        self.tree.offset_in(element, ancestor)
    }

    fn actual_width(&self, element: ElementHandle) -> Result<f64, ElementError> {
        self.tree.actual_width(element)
    }

    fn visibility(&self, element: ElementHandle) -> Result<Visibility, ElementError> {
        self.tree.visibility(element)
    }

    fn scale_transform(
        &self,
        element: ElementHandle,
    ) -> Result<Option<ScaleTransform>, ElementError> {
        self.tree.scale_transform(element)
    }

    fn attach_scale_transform(&self, element: ElementHandle) -> Result<(), ElementError> {
        self.tree.attach_scale_transform(element)
    }

    fn set_scale(&self, element: ElementHandle, x: f64, y: f64) -> Result<(), ElementError> {
        let outcomes = match self.reentry {
            Reentry::MoveThenExit => vec![
                self.machine.handle_move(self, self.frame, 300.0, self.settings, 10_000),
                self.machine.handle_exit(self),
            ],
            Reentry::Move => {
                vec![self.machine.handle_move(self, self.frame, 300.0, self.settings, 10_000)]
            }
            Reentry::TeardownThenMove => vec![
                self.machine.reset(self, ResetReason::Teardown),
                self.machine.handle_move(self, self.frame, 200.0, self.settings, 20_000),
            ],
        };
        self.nested.borrow_mut().extend(outcomes);
        self.tree.set_scale(element, x, y)
    }

    fn set_transform_origin(&self, element: ElementHandle, origin: Point) -> Result<(), ElementError> {
        self.tree.set_transform_origin(element, origin)
    }

    fn set_z_index(&self, element: ElementHandle, z_index: i32) -> Result<(), ElementError> {
        self.tree.set_z_index(element, z_index)
    }

    fn pointer_position(&self, args: EventArgsHandle, relative_to: ElementHandle) -> Option<Point> {
        self.tree.pointer_position(args, relative_to)
    }
}

#[test]
fn reentrant_events_during_apply_are_dropped() {
    let (tree, scene) = five_icons();
    let machine = HoverMachine::new();
    let settings = EffectiveSettings::default();
    let host = ReentrantHost::new(&tree, &machine, scene.frame, &settings, Reentry::MoveThenExit);

    let outcome = machine.handle_move(&host, scene.frame, 34.0, &settings, 0);

    assert!(matches!(outcome, HoverOutcome::Updated { .. }));
    let nested = host.nested.borrow();
    assert!(!nested.is_empty());
    assert!(nested.iter().all(|o| *o == HoverOutcome::Ignored));
    assert_eq!(machine.phase(), HoverPhase::Active);
    assert!(!machine.is_applying());
    assert_eq!(scale_x(&tree, scene.icons[0]), 1.5);
}

#[test]
fn moves_raised_while_exiting_do_not_restart_the_session() {
    let (tree, scene) = five_icons();
    let machine = HoverMachine::new();
    let settings = EffectiveSettings::default();
    machine.handle_move(&tree, scene.frame, 34.0, &settings, 0);
    let host = ReentrantHost::new(&tree, &machine, scene.frame, &settings, Reentry::Move);

    let outcome = machine.handle_exit(&host);

    assert_eq!(outcome, HoverOutcome::Reset { reason: ResetReason::PointerExited });
    let nested = host.nested.borrow();
    assert!(!nested.is_empty());
    assert!(nested.iter().all(|o| *o == HoverOutcome::Ignored));
    assert_eq!(machine.phase(), HoverPhase::Idle);
    assert!(machine.with_session(|_| ()).is_none());
    assert!(!machine.is_applying());
    for &icon in &scene.icons {
        assert_eq!(scale_x(&tree, icon), 1.0);
        assert_eq!(tree.z_index_of(icon), 0);
    }
}

#[test]
fn teardown_during_apply_runs_once_the_move_is_written() {
    let (tree, scene) = five_icons();
    let machine = HoverMachine::new();
    let settings = EffectiveSettings::default();
    let host =
        ReentrantHost::new(&tree, &machine, scene.frame, &settings, Reentry::TeardownThenMove);

    let outcome = machine.handle_move(&host, scene.frame, 34.0, &settings, 0);

    assert_eq!(outcome, HoverOutcome::Reset { reason: ResetReason::Teardown });
    assert!(host.nested.borrow().iter().all(|o| !matches!(o, HoverOutcome::Updated { .. })));
    assert_eq!(machine.phase(), HoverPhase::Idle);
    assert!(machine.with_session(|_| ()).is_none());
    assert!(!machine.is_applying());
    for &icon in &scene.icons {
        assert_eq!(scale_x(&tree, icon), 1.0);
        assert_eq!(tree.z_index_of(icon), 0);
    }

    let next = machine.handle_move(&tree, scene.frame, 34.0, &settings, 40_000);
    assert!(matches!(next, HoverOutcome::Updated { affected: 3 }));
}

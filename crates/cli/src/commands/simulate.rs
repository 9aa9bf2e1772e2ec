use anyhow::{anyhow, Context, Result};
use dockzoom_core::clock::ManualClock;
use dockzoom_core::hooks::{Address, FrameSignatures, RedirectTable, StaticSymbols, LOADER_MODULE};
use dockzoom_core::hover::{HoverOutcome, HoverPhase};
use dockzoom_core::runtime::{DockZoom, InitStatus, ShimAddresses};
use dockzoom_core::settings::{EffectiveSettings, RawSettings};
use dockzoom_core::visual::{
    ElementHandle, EventArgsHandle, Point, SceneTree, TaskbarLayout, VisualHost,
};
use dockzoom_core::watcher::{ModuleHandle, StaticModules, PRIMARY_MODULE};
use serde::{Deserialize, Serialize};

use crate::{load_settings_or_default, load_yaml};

/// Spacing of the moves generated from `--pointer` values.
pub const POINTER_STEP_MS: u64 = 20;

const FRAME_MODULE: ModuleHandle = ModuleHandle(0x7FFA_0000_0000);
const LOADER_HANDLE: ModuleHandle = ModuleHandle(0x7FFB_0000_0000);
const POINTER_MOVED_ADDR: Address = 0x7FFA_0001_2340;
const POINTER_EXITED_ADDR: Address = 0x7FFA_0001_2680;
const LOAD_LIBRARY_ADDR: Address = 0x7FFB_0002_1000;
const SHIMS: ShimAddresses = ShimAddresses {
    pointer_moved: 0x1_0000_1000,
    pointer_exited: 0x1_0000_1100,
    load_library: 0x1_0000_1200,
};

/// One replayed event, as written in a trace file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceEvent {
    /// Pointer moved to `x` in frame coordinates.
    Move { at_ms: u64, x: f64 },
    Exit { at_ms: u64 },
    /// The host pushed new settings.
    Settings { at_ms: u64, settings: RawSettings },
}

impl TraceEvent {
    pub fn at_ms(&self) -> u64 {
        match self {
            TraceEvent::Move { at_ms, .. }
            | TraceEvent::Exit { at_ms }
            | TraceEvent::Settings { at_ms, .. } => *at_ms,
        }
    }
}

/// Moves to each of `xs`, [`POINTER_STEP_MS`] apart.
pub fn pointer_trace(xs: &[f64]) -> Vec<TraceEvent> {
    xs.iter()
        .enumerate()
        .map(|(i, &x)| TraceEvent::Move { at_ms: i as u64 * POINTER_STEP_MS, x })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct IconState {
    pub index: usize,
    pub name: String,
    pub scale: f64,
    pub z_index: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationStep {
    pub event: TraceEvent,
    #[serde(flatten)]
    pub outcome: HoverOutcome,
    pub phase: HoverPhase,
    pub icons: Vec<IconState>,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub init: InitStatus,
    pub settings: EffectiveSettings,
    pub steps: Vec<SimulationStep>,
}

/// Replay `trace` over the icon row described by `layout`.
///
/// The frame module is synthesized with the handlers the settings select,
/// so the full install path runs before the first event.
pub fn run_simulation(
    layout: &TaskbarLayout,
    trace: &[TraceEvent],
    raw: &RawSettings,
) -> Result<SimulationReport> {
    let rendered = FrameSignatures::default().render(&EffectiveSettings::from_raw(raw));
    let modules = StaticModules::new();
    modules.load(
        LOADER_MODULE,
        LOADER_HANDLE,
        StaticSymbols::new().with("LoadLibraryExW", LOAD_LIBRARY_ADDR),
    );
    modules.load(
        PRIMARY_MODULE,
        FRAME_MODULE,
        StaticSymbols::new()
            .with(rendered.pointer_moved, POINTER_MOVED_ADDR)
            .with(rendered.pointer_exited, POINTER_EXITED_ADDR),
    );

    let mut zoom = DockZoom::new(raw, modules, RedirectTable::new(), SHIMS, ManualClock::default());
    let init = zoom.init().context("Failed to install hooks in the simulated module")?;
    let initial_settings = zoom.settings().clone();

    let (tree, scene) = layout.build();
    let args = EventArgsHandle(1);
    let mut steps = Vec::with_capacity(trace.len());
    for event in trace {
        zoom.clock().set(event.at_ms());
        let outcome = match event {
            TraceEvent::Move { x, .. } => {
                tree.set_pointer(args, Point::new(*x, 0.0));
                zoom.handle_pointer_moved(&tree, scene.frame, args)
            }
            TraceEvent::Exit { .. } => zoom.handle_pointer_exited(&tree),
            TraceEvent::Settings { settings, .. } => zoom.settings_changed(&tree, settings),
        };
        steps.push(SimulationStep {
            event: event.clone(),
            outcome,
            phase: zoom.phase(),
            icons: icon_states(&tree, &scene.icons),
        });
    }
    zoom.uninit(&tree);

    Ok(SimulationReport { init, settings: initial_settings, steps })
}

fn icon_states(tree: &SceneTree, icons: &[ElementHandle]) -> Vec<IconState> {
    icons
        .iter()
        .enumerate()
        .map(|(index, &icon)| IconState {
            index,
            name: tree.name(icon).unwrap_or_default(),
            scale: tree.scale_of(icon).map(|t| t.scale_x).unwrap_or(1.0),
            z_index: tree.z_index_of(icon),
        })
        .collect()
}

/// Load the layout and trace named on the command line and replay them.
pub fn simulate_command(
    layout: &str,
    trace: Option<&str>,
    pointers: &[f64],
    config: Option<&str>,
    json: bool,
) -> Result<()> {
    let layout: TaskbarLayout = load_yaml(layout, "layout")?;
    let events = match trace {
        Some(path) => load_yaml::<Vec<TraceEvent>>(path, "trace")?,
        None if !pointers.is_empty() => pointer_trace(pointers),
        None => return Err(anyhow!("Provide --trace or at least one --pointer value")),
    };
    let raw = load_settings_or_default(config)?;

    let report = run_simulation(&layout, &events, &raw)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let init = match report.init {
        InitStatus::Hooked => "hooked",
        InitStatus::WaitingForModule => "waiting for module",
    };
    println!(
        "Simulating {} icons (zoom {}%, range {}); handlers {}",
        layout.icons.len(),
        report.settings.zoom_percentage,
        report.settings.zoom_range,
        init
    );
    for step in &report.steps {
        println!(
            "{:>6} ms  {:<14} {:<22} [{}]",
            step.event.at_ms(),
            describe_event(&step.event),
            describe_outcome(&step.outcome),
            phase_name(step.phase)
        );
        let scales: Vec<String> = step.icons.iter().map(|i| format!("{:.2}", i.scale)).collect();
        println!("           {}", scales.join(" "));
    }

    Ok(())
}

fn describe_event(event: &TraceEvent) -> String {
    match event {
        TraceEvent::Move { x, .. } => format!("move x={x:.1}"),
        TraceEvent::Exit { .. } => "exit".to_string(),
        TraceEvent::Settings { .. } => "settings".to_string(),
    }
}

fn describe_outcome(outcome: &HoverOutcome) -> String {
    match outcome {
        HoverOutcome::Ignored => "ignored".to_string(),
        HoverOutcome::Debounced => "debounced".to_string(),
        HoverOutcome::Updated { affected } => format!("updated ({affected} affected)"),
        HoverOutcome::Reset { reason } => format!("reset ({reason:?})"),
    }
}

fn phase_name(phase: HoverPhase) -> &'static str {
    match phase {
        HoverPhase::Idle => "idle",
        HoverPhase::MapBuilding => "map building",
        HoverPhase::Active => "active",
        HoverPhase::Resetting => "resetting",
    }
}

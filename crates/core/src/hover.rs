//! Lifecycle of a hover session.
//!
//! ```text
//! Idle --move--> MapBuilding --ok--> Active --move--> Active
//!                    |                  |
//!                  error        exit / out of range / settings / teardown
//!                    v                  v
//!                  Resetting -------> Idle
//! ```
//!
//! Everything runs on the host UI thread inside the hooked handlers. The
//! `applying` flag only guards against the same thread re-entering through a
//! synchronous relayout triggered by our own property writes; re-entrant
//! events are dropped, never queued. The flag is also held while resetting.
//! A reset requested mid-event is deferred until that event has applied.

use std::cell::{Cell, RefCell};

use serde::Serialize;
use tracing::{debug, warn};

use crate::effect::{AffectedIcon, EffectApplier};
use crate::magnify::compute_scales;
use crate::settings::EffectiveSettings;
use crate::spatial::{build_spatial_map, SpatialMap};
use crate::visual::{ElementHandle, VisualHost, Visibility};

/// Minimum time between two processed moves (about 60 Hz).
pub const DEBOUNCE_INTERVAL_MS: u64 = 16;

/// Minimum horizontal pointer travel between two processed moves.
pub const MIN_POINTER_DELTA: f64 = 1.0;

/// Slack around the icon envelope before the session is ended.
pub const RANGE_TOLERANCE: f64 = 50.0;

/// Icons wider than this are mid-animation and are not written.
pub const MAX_RENDERABLE_WIDTH: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HoverPhase {
    Idle,
    MapBuilding,
    Active,
    Resetting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetReason {
    PointerExited,
    OutOfRange,
    SettingsChanged,
    Teardown,
    MapFailed,
}

/// What a single event did to the effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum HoverOutcome {
    /// Not a qualifying event, or arrived while another was being processed.
    Ignored,
    /// Too soon or too close to the previously processed move.
    Debounced,
    /// Scales recomputed and applied.
    Updated { affected: usize },
    /// The session was torn down.
    Reset { reason: ResetReason },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PointerSample {
    x: f64,
    at_ms: u64,
}

/// State owned by one live hover session.
#[derive(Debug)]
pub struct HoverSession {
    map: SpatialMap,
    effect: EffectApplier,
}

impl HoverSession {
    fn new(map: SpatialMap) -> Self {
        Self { map, effect: EffectApplier::new() }
    }

    pub fn map(&self) -> &SpatialMap {
        &self.map
    }

    pub fn affected(&self) -> &[AffectedIcon] {
        self.effect.affected()
    }
}

#[derive(Debug)]
pub struct HoverMachine {
    phase: Cell<HoverPhase>,
    applying: Cell<bool>,
    last: Cell<Option<PointerSample>>,
    pending_reset: Cell<Option<ResetReason>>,
    session: RefCell<Option<HoverSession>>,
}

impl Default for HoverMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl HoverMachine {
    pub fn new() -> Self {
        Self {
            phase: Cell::new(HoverPhase::Idle),
            applying: Cell::new(false),
            last: Cell::new(None),
            pending_reset: Cell::new(None),
            session: RefCell::new(None),
        }
    }

    pub fn phase(&self) -> HoverPhase {
        self.phase.get()
    }

    /// True while an event is being processed.
    pub fn is_applying(&self) -> bool {
        self.applying.get()
    }

    /// Inspect the live session, if any.
    pub fn with_session<T>(&self, f: impl FnOnce(&HoverSession) -> T) -> Option<T> {
        self.session.try_borrow().ok()?.as_ref().map(f)
    }

    pub fn affected(&self) -> Vec<AffectedIcon> {
        self.with_session(|s| s.affected().to_vec()).unwrap_or_default()
    }

    /// Process a qualifying pointer move over `frame` at `pointer_x`.
    pub fn handle_move<H: VisualHost + ?Sized>(
        &self,
        host: &H,
        frame: ElementHandle,
        pointer_x: f64,
        settings: &EffectiveSettings,
        now_ms: u64,
    ) -> HoverOutcome {
        if self.applying.get() {
            return HoverOutcome::Ignored;
        }
        if self.is_debounced(pointer_x, now_ms) {
            return HoverOutcome::Debounced;
        }

        self.applying.set(true);
        self.last.set(Some(PointerSample { x: pointer_x, at_ms: now_ms }));
        let mut outcome = self.process_move(host, frame, pointer_x, settings);
        if let Some(reason) = self.pending_reset.take() {
            outcome = self.teardown(host, reason);
        }
        self.applying.set(false);
        outcome
    }

    /// Pointer left the frame.
    pub fn handle_exit<H: VisualHost + ?Sized>(&self, host: &H) -> HoverOutcome {
        if self.applying.get() {
            return HoverOutcome::Ignored;
        }
        self.reset(host, ResetReason::PointerExited)
    }

    /// Tear the session down and return to a clean idle state.
    ///
    /// Safe to call in any state, including from a failure path; elements
    /// that are gone are skipped. Called while an event is being applied,
    /// the reset runs as soon as that event's writes are done.
    pub fn reset<H: VisualHost + ?Sized>(&self, host: &H, reason: ResetReason) -> HoverOutcome {
        if self.applying.get() {
            if self.pending_reset.get().is_none() {
                self.pending_reset.set(Some(reason));
            }
            debug!(?reason, "reset requested mid-event; deferring");
            return HoverOutcome::Reset { reason };
        }

        self.applying.set(true);
        let outcome = self.teardown(host, reason);
        self.applying.set(false);
        outcome
    }

    /// Reset with `applying` already held by the caller.
    fn teardown<H: VisualHost + ?Sized>(&self, host: &H, reason: ResetReason) -> HoverOutcome {
        self.phase.set(HoverPhase::Resetting);
        self.last.set(None);
        let session = match self.session.try_borrow_mut() {
            Ok(mut slot) => slot.take(),
            Err(_) => {
                warn!(?reason, "hover session busy during reset");
                None
            }
        };
        if let Some(mut session) = session {
            session.effect.reset_all(host);
            debug!(?reason, "hover session ended");
        }
        self.pending_reset.set(None);
        self.phase.set(HoverPhase::Idle);
        HoverOutcome::Reset { reason }
    }

    fn is_debounced(&self, pointer_x: f64, now_ms: u64) -> bool {
        let Some(last) = self.last.get() else { return false };
        now_ms.wrapping_sub(last.at_ms) < DEBOUNCE_INTERVAL_MS
            || (pointer_x - last.x).abs() < MIN_POINTER_DELTA
    }

    fn process_move<H: VisualHost + ?Sized>(
        &self,
        host: &H,
        frame: ElementHandle,
        pointer_x: f64,
        settings: &EffectiveSettings,
    ) -> HoverOutcome {
        let Ok(mut slot) = self.session.try_borrow_mut() else {
            warn!("hover session busy; dropping move");
            return HoverOutcome::Ignored;
        };
        let mut session = match slot.take() {
            Some(session) => session,
            None => {
                self.phase.set(HoverPhase::MapBuilding);
                match build_spatial_map(host, frame) {
                    Ok(map) => HoverSession::new(map),
                    Err(err) => {
                        warn!(%err, "cannot start hover session");
                        drop(slot);
                        return self.teardown(host, ResetReason::MapFailed);
                    }
                }
            }
        };

        if !session.map.contains_x(pointer_x, RANGE_TOLERANCE) {
            *slot = Some(session);
            drop(slot);
            return self.teardown(host, ResetReason::OutOfRange);
        }

        self.phase.set(HoverPhase::Active);
        let scales: Vec<_> = compute_scales(&session.map, pointer_x, settings)
            .into_iter()
            .filter(|icon| is_renderable(host, icon.element))
            .collect();
        session.effect.apply(host, &scales);

        let affected = session.effect.affected().len();
        *slot = Some(session);
        HoverOutcome::Updated { affected }
    }
}

fn is_renderable<H: VisualHost + ?Sized>(host: &H, element: ElementHandle) -> bool {
    matches!(host.visibility(element), Ok(Visibility::Visible))
        && matches!(host.actual_width(element), Ok(w) if w > 0.0 && w <= MAX_RENDERABLE_WIDTH)
}

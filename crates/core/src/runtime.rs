//! The object the host glue owns for the lifetime of the injected module.
//!
//! `DockZoom` wires settings, the module load watcher, the hook installer and
//! the hover state machine together and exposes:
//! - lifecycle calls: [`DockZoom::init`], [`DockZoom::after_init`],
//!   [`DockZoom::settings_changed`], [`DockZoom::uninit`];
//! - the loader notification: [`DockZoom::on_library_loaded`];
//! - the two intercepted handlers: [`DockZoom::on_pointer_moved`] and
//!   [`DockZoom::on_pointer_exited`], which always forward to the original.

use std::cell::RefCell;
use std::sync::OnceLock;

use serde::Serialize;
use tracing::{info, warn};

use crate::clock::{Clock, WallClock};
use crate::hooks::{
    install_hooks, Address, FrameSignatures, FunctionPatcher, HookError, TargetFunctionBinding,
    LOADER_MODULE, LOAD_LIBRARY_SIGNATURES,
};
use crate::hover::{HoverMachine, HoverOutcome, HoverPhase, ResetReason};
use crate::settings::{EffectiveSettings, RawSettings};
use crate::visual::{ElementHandle, EventArgsHandle, VisualHost};
use crate::watcher::{ModuleHandle, ModuleLoadWatcher, ModuleRegistry, ModuleScope};

/// Entry points of the replacement functions, as seen by the patcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShimAddresses {
    pub pointer_moved: Address,
    pub pointer_exited: Address,
    pub load_library: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitStatus {
    /// The target module was loaded and its handlers are hooked.
    Hooked,
    /// The loader is hooked; handlers get hooked when the module loads.
    WaitingForModule,
}

/// Frame handler bindings, built from the settings in force at install time.
#[derive(Debug)]
struct FrameBindings {
    pointer_moved: TargetFunctionBinding,
    pointer_exited: TargetFunctionBinding,
}

impl FrameBindings {
    fn iter(&self) -> impl Iterator<Item = &TargetFunctionBinding> {
        [&self.pointer_moved, &self.pointer_exited].into_iter()
    }
}

pub struct DockZoom<M, P, C = WallClock> {
    settings: EffectiveSettings,
    signatures: FrameSignatures,
    shims: ShimAddresses,
    modules: M,
    patcher: RefCell<P>,
    watcher: ModuleLoadWatcher,
    frame_hooks: OnceLock<FrameBindings>,
    load_library: TargetFunctionBinding,
    hover: HoverMachine,
    clock: C,
}

impl<M, P, C> DockZoom<M, P, C>
where
    M: ModuleRegistry,
    P: FunctionPatcher,
    C: Clock,
{
    pub fn new(raw: &RawSettings, modules: M, patcher: P, shims: ShimAddresses, clock: C) -> Self {
        let load_library = TargetFunctionBinding::new(
            "LoadLibraryExW",
            LOAD_LIBRARY_SIGNATURES.iter().map(|s| s.to_string()).collect(),
            shims.load_library,
        );
        Self {
            settings: EffectiveSettings::from_raw(raw),
            signatures: FrameSignatures::default(),
            shims,
            modules,
            patcher: RefCell::new(patcher),
            watcher: ModuleLoadWatcher::default(),
            frame_hooks: OnceLock::new(),
            load_library,
            hover: HoverMachine::new(),
            clock,
        }
    }

    /// Use different signature templates (another host build).
    pub fn with_signatures(mut self, signatures: FrameSignatures) -> Self {
        self.signatures = signatures;
        self
    }

    /// Watch different module names.
    pub fn with_watcher(mut self, watcher: ModuleLoadWatcher) -> Self {
        self.watcher = watcher;
        self
    }

    pub fn settings(&self) -> &EffectiveSettings {
        &self.settings
    }

    pub fn phase(&self) -> HoverPhase {
        self.hover.phase()
    }

    pub fn hover(&self) -> &HoverMachine {
        &self.hover
    }

    pub fn modules(&self) -> &M {
        &self.modules
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn patcher(&self) -> std::cell::Ref<'_, P> {
        self.patcher.borrow()
    }

    pub fn is_hooked(&self) -> bool {
        self.frame_hooks.get().is_some_and(|hooks| hooks.iter().all(|b| b.is_installed()))
    }

    /// Original `OnPointerMoved` to forward to, once hooked.
    pub fn pointer_moved_original(&self) -> Option<Address> {
        self.frame_hooks.get().and_then(|hooks| hooks.pointer_moved.original())
    }

    /// Original `OnPointerExited` to forward to, once hooked.
    pub fn pointer_exited_original(&self) -> Option<Address> {
        self.frame_hooks.get().and_then(|hooks| hooks.pointer_exited.original())
    }

    /// Original loader entry point, if the loader was hooked.
    pub fn load_library_original(&self) -> Option<Address> {
        self.load_library.original()
    }

    /// Hook the frame handlers now, or arrange to hook them on module load.
    ///
    /// Any error here means the effect can never activate.
    pub fn init(&self) -> Result<InitStatus, HookError> {
        if let Some(module) = self.watcher.find_target(&self.modules) {
            if self.watcher.claim() {
                if let Err(err) = self.install_frame_hooks(module) {
                    warn!(%err, "failed to hook frame handlers");
                    return Err(err);
                }
            }
            info!("initialized with frame handlers hooked");
            return Ok(InitStatus::Hooked);
        }

        info!("target module not loaded yet; will hook on load");
        let loader = self
            .modules
            .module_handle(LOADER_MODULE)
            .ok_or_else(|| HookError::ModuleMissing(LOADER_MODULE.to_string()))?;
        let resolver = ModuleScope::new(&self.modules, loader);
        install_hooks(&resolver, &mut *self.patcher.borrow_mut(), [&self.load_library])?;
        info!("initialized; waiting for target module");
        Ok(InitStatus::WaitingForModule)
    }

    /// Catch a target module that loaded between `init` and now.
    ///
    /// Returns whether this call installed the frame hooks.
    pub fn after_init(&self) -> Result<bool, HookError> {
        match self.watcher.check_loaded(&self.modules, |module| self.install_frame_hooks(module)) {
            Some(result) => result.map(|_| true),
            None => Ok(false),
        }
    }

    /// Loader notification, called after the original loader returned
    /// `module` for `file_name`.
    ///
    /// Returns whether this call installed the frame hooks.
    pub fn on_library_loaded(&self, module: ModuleHandle, file_name: &str) -> Result<bool, HookError> {
        let installed = self.watcher.on_module_loaded(&self.modules, module, file_name, |module| {
            self.install_frame_hooks(module)
        });
        match installed {
            Some(Err(err)) => {
                warn!(%err, file_name, "failed to hook frame handlers after load");
                Err(err)
            }
            Some(Ok(_)) => Ok(true),
            None => Ok(false),
        }
    }

    /// Replacement for the frame's `OnPointerMoved`.
    pub fn on_pointer_moved<H, R>(
        &self,
        host: &H,
        element: ElementHandle,
        args: EventArgsHandle,
        original: impl FnOnce() -> R,
    ) -> R
    where
        H: VisualHost + ?Sized,
    {
        self.handle_pointer_moved(host, element, args);
        original()
    }

    /// Replacement for the frame's `OnPointerExited`.
    pub fn on_pointer_exited<H, R>(
        &self,
        host: &H,
        _element: ElementHandle,
        _args: EventArgsHandle,
        original: impl FnOnce() -> R,
    ) -> R
    where
        H: VisualHost + ?Sized,
    {
        self.handle_pointer_exited(host);
        original()
    }

    /// Effect half of [`Self::on_pointer_moved`], without forwarding.
    pub fn handle_pointer_moved<H: VisualHost + ?Sized>(
        &self,
        host: &H,
        element: ElementHandle,
        args: EventArgsHandle,
    ) -> HoverOutcome {
        if self.hover.is_applying() {
            return HoverOutcome::Ignored;
        }
        match host.class_name(element) {
            Ok(class_name) if class_name == self.settings.frame_class => {}
            _ => return HoverOutcome::Ignored,
        }
        let Some(position) = host.pointer_position(args, element) else {
            return HoverOutcome::Ignored;
        };
        self.hover.handle_move(host, element, position.x, &self.settings, self.clock.now_ms())
    }

    /// Effect half of [`Self::on_pointer_exited`], without forwarding.
    pub fn handle_pointer_exited<H: VisualHost + ?Sized>(&self, host: &H) -> HoverOutcome {
        self.hover.handle_exit(host)
    }

    /// New settings from the host: end the session, then swap settings.
    pub fn settings_changed<H: VisualHost + ?Sized>(
        &mut self,
        host: &H,
        raw: &RawSettings,
    ) -> HoverOutcome {
        let outcome = self.hover.reset(host, ResetReason::SettingsChanged);
        self.settings = EffectiveSettings::from_raw(raw);
        info!(settings = ?self.settings, "settings reloaded");
        outcome
    }

    /// Module teardown: return every icon to baseline.
    pub fn uninit<H: VisualHost + ?Sized>(&self, host: &H) {
        self.hover.reset(host, ResetReason::Teardown);
    }

    fn install_frame_hooks(&self, module: ModuleHandle) -> Result<usize, HookError> {
        let resolver = ModuleScope::new(&self.modules, module);
        let hooks = self.frame_hooks.get_or_init(|| {
            let rendered = self.signatures.render(&self.settings);
            FrameBindings {
                pointer_moved: TargetFunctionBinding::new(
                    "OnPointerMoved",
                    vec![rendered.pointer_moved],
                    self.shims.pointer_moved,
                ),
                pointer_exited: TargetFunctionBinding::new(
                    "OnPointerExited",
                    vec![rendered.pointer_exited],
                    self.shims.pointer_exited,
                ),
            }
        });
        install_hooks(&resolver, &mut *self.patcher.borrow_mut(), hooks.iter())
    }
}

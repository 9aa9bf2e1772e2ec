//! Detects the module that holds the hooked handlers and installs hooks once.
//!
//! The module may already be loaded when the runtime starts, or it may be
//! loaded later. Two independent paths (a loader notification and the
//! post-init check) can therefore race to install; the `hooked` flag is
//! claimed with an atomic swap so exactly one of them proceeds.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{debug, info};

use crate::hooks::{Address, StaticSymbols, SymbolResolver};

/// Module that normally hosts the taskbar frame implementation.
pub const PRIMARY_MODULE: &str = "Taskbar.View.dll";

/// Module that hosts the frame on builds without [`PRIMARY_MODULE`].
pub const FALLBACK_MODULE: &str = "ExplorerExtensions.dll";

/// Identity of a loaded module (its base address on the host).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ModuleHandle(pub u64);

impl fmt::Display for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module@0x{:X}", self.0)
    }
}

/// The host process's table of loaded modules.
pub trait ModuleRegistry {
    /// Handle of an already-loaded module by file name.
    fn module_handle(&self, file_name: &str) -> Option<ModuleHandle>;

    /// Resolve a structural signature inside a loaded module.
    fn resolve(&self, module: ModuleHandle, signature: &str) -> Option<Address>;
}

/// Symbol lookups restricted to one module of a registry.
#[derive(Debug)]
pub struct ModuleScope<'a, M: ?Sized> {
    registry: &'a M,
    module: ModuleHandle,
}

impl<'a, M: ModuleRegistry + ?Sized> ModuleScope<'a, M> {
    pub fn new(registry: &'a M, module: ModuleHandle) -> Self {
        Self { registry, module }
    }
}

impl<M: ModuleRegistry + ?Sized> SymbolResolver for ModuleScope<'_, M> {
    fn resolve(&self, signature: &str) -> Option<Address> {
        self.registry.resolve(self.module, signature)
    }
}

/// In-memory module table; file names compare case-insensitively.
#[derive(Debug, Default)]
pub struct StaticModules {
    modules: RefCell<HashMap<String, (ModuleHandle, StaticSymbols)>>,
}

impl StaticModules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `file_name` as loaded at `handle` with the given symbols.
    pub fn load(&self, file_name: &str, handle: ModuleHandle, symbols: StaticSymbols) {
        self.modules.borrow_mut().insert(file_name.to_ascii_lowercase(), (handle, symbols));
    }

    pub fn unload(&self, file_name: &str) {
        self.modules.borrow_mut().remove(&file_name.to_ascii_lowercase());
    }
}

impl ModuleRegistry for StaticModules {
    fn module_handle(&self, file_name: &str) -> Option<ModuleHandle> {
        self.modules.borrow().get(&file_name.to_ascii_lowercase()).map(|(handle, _)| *handle)
    }

    fn resolve(&self, module: ModuleHandle, signature: &str) -> Option<Address> {
        self.modules
            .borrow()
            .values()
            .find(|(handle, _)| *handle == module)
            .and_then(|(_, symbols)| symbols.resolve(signature))
    }
}

#[derive(Debug)]
pub struct ModuleLoadWatcher {
    targets: Vec<String>,
    hooked: AtomicBool,
}

impl Default for ModuleLoadWatcher {
    fn default() -> Self {
        Self::new(vec![PRIMARY_MODULE.to_string(), FALLBACK_MODULE.to_string()])
    }
}

impl ModuleLoadWatcher {
    /// `targets` are tried in order; the first loaded one is the target.
    pub fn new(targets: Vec<String>) -> Self {
        Self { targets, hooked: AtomicBool::new(false) }
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn is_hooked(&self) -> bool {
        self.hooked.load(Ordering::Acquire)
    }

    /// The currently loaded target module, if any.
    pub fn find_target<M: ModuleRegistry + ?Sized>(&self, registry: &M) -> Option<ModuleHandle> {
        self.targets.iter().find_map(|name| registry.module_handle(name))
    }

    /// Claim the one-time installation. Returns true for exactly one caller.
    pub fn claim(&self) -> bool {
        !self.is_hooked() && !self.hooked.swap(true, Ordering::AcqRel)
    }

    /// Loader notification: run `install` if `loaded` is the target module
    /// and nobody has installed yet.
    pub fn on_module_loaded<M, F, T>(
        &self,
        registry: &M,
        loaded: ModuleHandle,
        file_name: &str,
        install: F,
    ) -> Option<T>
    where
        M: ModuleRegistry + ?Sized,
        F: FnOnce(ModuleHandle) -> T,
    {
        if self.is_hooked() || self.find_target(registry) != Some(loaded) {
            return None;
        }
        if !self.claim() {
            debug!(file_name, "target module already claimed by another path");
            return None;
        }
        info!(file_name, module = %loaded, "target module loaded");
        Some(install(loaded))
    }

    /// Post-init check: run `install` if the target is loaded by now and
    /// nobody has installed yet.
    pub fn check_loaded<M, F, T>(&self, registry: &M, install: F) -> Option<T>
    where
        M: ModuleRegistry + ?Sized,
        F: FnOnce(ModuleHandle) -> T,
    {
        if self.is_hooked() {
            return None;
        }
        let module = self.find_target(registry)?;
        if !self.claim() {
            return None;
        }
        info!(module = %module, "target module found after init");
        Some(install(module))
    }
}

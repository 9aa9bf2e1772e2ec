//! dockzoom-core
//!
//! Dock-style magnification for shell taskbar icons, driven by hooked
//! pointer handlers.
//!
//! This crate holds the hook installer, the module load watcher, the spatial
//! map builder, the magnification engine, the hover state machine and the
//! effect applier. The host process (its visual tree, module table and code
//! patching primitive) is reached only through traits, so all of the logic is
//! testable against in-memory stand-ins.

pub mod clock;
pub mod effect;
pub mod hooks;
pub mod hover;
pub mod magnify;
pub mod runtime;
pub mod settings;
pub mod spatial;
#[cfg(feature = "goblin-symbols")]
pub mod symbols;
pub mod visual;
pub mod watcher;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

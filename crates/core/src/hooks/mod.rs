//! Signature-based function interception.
//!
//! Two separate concerns live here:
//! - `signature`: building structural signature strings from configurable
//!   templates and the frame class in the settings.
//! - `installer`: the resolve/replace capability and the batch installer that
//!   fills each binding's write-once original-address slot.
//!
//! Keeping them apart means a different host build only needs different
//! templates, not different code.

pub mod installer;
pub mod signature;

pub use installer::{
    install_hooks, Address, FunctionPatcher, HookError, RedirectTable, StaticSymbols,
    SymbolResolver, TargetFunctionBinding,
};
pub use signature::{
    FrameSignatures, RenderedSignatures, SignatureTemplate, LOADER_MODULE,
    LOAD_LIBRARY_SIGNATURES,
};

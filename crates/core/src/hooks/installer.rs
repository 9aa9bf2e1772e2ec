use std::collections::HashMap;
use std::sync::OnceLock;

use thiserror::Error;
use tracing::{debug, info};

/// Address of a function inside a loaded module.
pub type Address = u64;

/// Error type for hook installation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    /// None of a binding's signatures matched a symbol in the module.
    #[error("hook install failed: no symbol in the module matches {binding} (tried {signatures:?})")]
    Unresolved { binding: String, signatures: Vec<String> },

    /// The redirect primitive refused to patch a resolved address.
    #[error("hook install failed: could not redirect {binding} at 0x{target:X}: {reason}")]
    Patch { binding: String, target: Address, reason: String },

    /// A module the hooks live in is not loaded.
    #[error("hook install failed: module {0} is not loaded")]
    ModuleMissing(String),
}

/// Looks a structural signature up in one module.
pub trait SymbolResolver {
    fn resolve(&self, signature: &str) -> Option<Address>;
}

/// Redirects a function entry point and yields the address to call the
/// original through.
pub trait FunctionPatcher {
    fn replace(&mut self, target: Address, replacement: Address) -> Result<Address, String>;
}

/// One function to intercept.
///
/// The original-address slot is write-once: it is filled the first time the
/// binding is installed and never touched again.
#[derive(Debug)]
pub struct TargetFunctionBinding {
    name: String,
    signatures: Vec<String>,
    replacement: Address,
    original: OnceLock<Address>,
}

impl TargetFunctionBinding {
    /// `signatures` are alternatives; the first that resolves wins.
    pub fn new(name: impl Into<String>, signatures: Vec<String>, replacement: Address) -> Self {
        Self { name: name.into(), signatures, replacement, original: OnceLock::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signatures(&self) -> &[String] {
        &self.signatures
    }

    pub fn replacement(&self) -> Address {
        self.replacement
    }

    /// Address to forward to, once installed.
    pub fn original(&self) -> Option<Address> {
        self.original.get().copied()
    }

    pub fn is_installed(&self) -> bool {
        self.original.get().is_some()
    }

    fn resolve_in<R: SymbolResolver + ?Sized>(&self, resolver: &R) -> Option<Address> {
        self.signatures.iter().find_map(|signature| resolver.resolve(signature))
    }
}

/// Resolve and redirect every binding that is not installed yet.
///
/// All signatures are resolved before anything is patched, so a missing
/// symbol leaves the module untouched. Returns the number of newly installed
/// bindings.
pub fn install_hooks<'a, R, P, I>(
    resolver: &R,
    patcher: &mut P,
    bindings: I,
) -> Result<usize, HookError>
where
    R: SymbolResolver + ?Sized,
    P: FunctionPatcher + ?Sized,
    I: IntoIterator<Item = &'a TargetFunctionBinding>,
{
    let mut plan = Vec::new();
    for binding in bindings {
        if binding.is_installed() {
            debug!(binding = binding.name(), "hook already installed; skipping");
            continue;
        }
        let target = binding.resolve_in(resolver).ok_or_else(|| HookError::Unresolved {
            binding: binding.name().to_string(),
            signatures: binding.signatures().to_vec(),
        })?;
        plan.push((binding, target));
    }

    let mut installed = 0;
    for (binding, target) in plan {
        let original = patcher.replace(target, binding.replacement()).map_err(|reason| {
            HookError::Patch { binding: binding.name().to_string(), target, reason }
        })?;
        if binding.original.set(original).is_ok() {
            installed += 1;
            info!(binding = binding.name(), address = %format!("0x{target:X}"), "hook installed");
        }
    }
    Ok(installed)
}

/// Symbol table held in memory, keyed by exact signature text.
#[derive(Debug, Clone, Default)]
pub struct StaticSymbols {
    symbols: HashMap<String, Address>,
}

impl StaticSymbols {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, signature: impl Into<String>, address: Address) -> Self {
        self.insert(signature, address);
        self
    }

    pub fn insert(&mut self, signature: impl Into<String>, address: Address) {
        self.symbols.insert(signature.into(), address);
    }
}

impl SymbolResolver for StaticSymbols {
    fn resolve(&self, signature: &str) -> Option<Address> {
        self.symbols.get(signature).copied()
    }
}

/// Redirect table standing in for in-place code patching.
///
/// Each target can be redirected once; the "original" handed back is the
/// target itself, as a trampoline would forward there.
#[derive(Debug, Default)]
pub struct RedirectTable {
    redirects: HashMap<Address, Address>,
}

impl RedirectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Where calls to `target` currently go, if redirected.
    pub fn redirect_of(&self, target: Address) -> Option<Address> {
        self.redirects.get(&target).copied()
    }

    pub fn len(&self) -> usize {
        self.redirects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.redirects.is_empty()
    }
}

impl FunctionPatcher for RedirectTable {
    fn replace(&mut self, target: Address, replacement: Address) -> Result<Address, String> {
        if self.redirects.contains_key(&target) {
            return Err(format!("0x{target:X} is already redirected"));
        }
        self.redirects.insert(target, replacement);
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_resolving_alternative_wins() {
        let resolver = StaticSymbols::new().with("__imp_LoadLibraryExW", 0x2000);
        let binding = TargetFunctionBinding::new(
            "LoadLibraryExW",
            vec!["LoadLibraryExW".into(), "__imp_LoadLibraryExW".into()],
            0xAAAA,
        );
        let mut table = RedirectTable::new();
        assert_eq!(install_hooks(&resolver, &mut table, [&binding]).unwrap(), 1);
        assert_eq!(binding.original(), Some(0x2000));
        assert_eq!(table.redirect_of(0x2000), Some(0xAAAA));
    }

    #[test]
    fn redirect_table_refuses_double_patch() {
        let mut table = RedirectTable::new();
        table.replace(0x10, 0x20).unwrap();
        assert!(table.replace(0x10, 0x30).is_err());
        assert_eq!(table.redirect_of(0x10), Some(0x20));
    }
}

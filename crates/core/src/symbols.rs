//! Symbol tables read from on-disk modules with goblin.
//!
//! This backs [`SymbolResolver`] for offline checks: given a copy of the shell
//! module, report whether the configured signatures still exist and where.
//! PE modules contribute their named exports, ELF modules their defined
//! function symbols (static and dynamic), Mach-O binaries their symbol table.

use std::collections::BTreeMap;
use std::path::Path;

use goblin::{elf, mach, pe, Object};
use serde::Serialize;
use thiserror::Error;

use crate::hooks::{Address, SymbolResolver};

#[derive(Debug, Error)]
pub enum SymbolError {
    #[error("failed to read module {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse module: {0}")]
    Parse(#[from] goblin::error::Error),
    #[error("unsupported module format")]
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
    Pe,
    Elf,
    MachO,
}

/// Name → address table of one module.
#[derive(Debug, Clone)]
pub struct ModuleSymbols {
    format: ModuleFormat,
    symbols: BTreeMap<String, Address>,
}

impl ModuleSymbols {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SymbolError> {
        let (format, symbols) = match Object::parse(bytes)? {
            Object::PE(pe) => (ModuleFormat::Pe, pe_symbols(&pe)),
            Object::Elf(elf) => (ModuleFormat::Elf, elf_symbols(&elf)),
            Object::Mach(mach::Mach::Binary(bin)) => (ModuleFormat::MachO, mach_symbols(&bin)),
            _ => return Err(SymbolError::Unsupported),
        };
        Ok(Self { format, symbols })
    }

    pub fn from_path(path: &Path) -> Result<Self, SymbolError> {
        let bytes = std::fs::read(path)
            .map_err(|source| SymbolError::Io { path: path.display().to_string(), source })?;
        Self::from_bytes(&bytes)
    }

    pub fn format(&self) -> ModuleFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Address)> {
        self.symbols.iter().map(|(name, address)| (name.as_str(), *address))
    }
}

impl SymbolResolver for ModuleSymbols {
    fn resolve(&self, signature: &str) -> Option<Address> {
        self.symbols.get(signature).copied()
    }
}

fn elf_symbols(elf: &elf::Elf) -> BTreeMap<String, Address> {
    let mut symbols = BTreeMap::new();
    let tables = [(&elf.syms, &elf.strtab), (&elf.dynsyms, &elf.dynstrtab)];
    for (syms, strtab) in tables {
        for sym in syms.iter() {
            if !sym.is_function() || sym.st_shndx == elf::section_header::SHN_UNDEF as usize {
                continue;
            }
            let name = strtab.get_at(sym.st_name).unwrap_or("");
            if name.is_empty() {
                continue;
            }
            symbols.entry(name.to_string()).or_insert(sym.st_value);
        }
    }
    symbols
}

/// Named exports only; symbols that live in a separate PDB are not visible here.
fn pe_symbols(pe: &pe::PE) -> BTreeMap<String, Address> {
    let mut symbols = BTreeMap::new();
    for export in &pe.exports {
        if export.rva == 0 {
            continue;
        }
        let name = export.name.unwrap_or_default();
        if name.is_empty() {
            continue;
        }
        symbols.insert(name.to_string(), export.rva as Address);
    }
    symbols
}

fn mach_symbols(bin: &mach::MachO) -> BTreeMap<String, Address> {
    let mut symbols = BTreeMap::new();
    for sym in bin.symbols() {
        let Ok((name, nlist)) = sym else { continue };
        if nlist.n_value == 0 {
            continue;
        }
        let name = name.strip_prefix('_').unwrap_or(name);
        if name.is_empty() {
            continue;
        }
        symbols.entry(name.to_string()).or_insert(nlist.n_value);
    }
    symbols
}

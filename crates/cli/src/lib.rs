use std::env;
use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dockzoom_core::settings::{load_settings, RawSettings};
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

pub mod commands;

/// Canonicalize a user-supplied path if possible, falling back to the given
/// string relative to the current working directory.
pub fn canonicalize_or_current(path: &str) -> Result<PathBuf> {
    let path = Path::new(path);
    if path == Path::new(".") {
        Ok(env::current_dir().context("Failed to get current directory")?)
    } else {
        match path.canonicalize() {
            Ok(p) => Ok(p),
            Err(_) => {
                let cwd = env::current_dir().context("Failed to get current directory")?;
                Ok(cwd.join(path))
            }
        }
    }
}

/// Compute the SHA-256 hash of a file and return it as a hex string.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open module for hashing: {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("Failed to read module for hashing: {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    let digest = hasher.finalize();
    Ok(format!("{:x}", digest))
}

/// Settings from `--config`, or the built-in defaults when no file is given.
pub fn load_settings_or_default(config: Option<&str>) -> Result<RawSettings> {
    match config {
        Some(path) => load_settings(&canonicalize_or_current(path)?),
        None => Ok(RawSettings::default()),
    }
}

/// Read and deserialize a YAML document (layouts and pointer traces).
pub fn load_yaml<T: DeserializeOwned>(path: &str, what: &str) -> Result<T> {
    let path = canonicalize_or_current(path)?;
    let text = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {what} at {}", path.display()))?;
    serde_yaml::from_str(&text)
        .with_context(|| format!("Failed to parse {what} YAML at {}", path.display()))
}

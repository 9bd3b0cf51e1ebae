//! `modcc.toml` configuration (SPEC_FULL §[AMBIENT] Configuration).
//!
//! Supplies defaults for flags spec §6 otherwise requires on every
//! invocation. Precedence is CLI flag > config file > built-in default;
//! an absent or empty config file is equivalent to every field being
//! unset, so a zero-configuration invocation behaves exactly as spec §6
//! describes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CliResult;

const CONFIG_FILE_NAME: &str = "modcc.toml";

/// Color output preference, mirroring `console`'s own tri-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorPreference {
    Auto,
    Always,
    Never,
}

impl Default for ColorPreference {
    fn default() -> Self {
        ColorPreference::Auto
    }
}

/// Parsed `modcc.toml` contents. Every field is optional — a field this
/// crate doesn't recognize is ignored by `toml`'s default deserialization
/// rather than rejected, so a shared config file with unrelated keys
/// still loads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModccConfig {
    /// Default `-t` backend target (`cpu`, `simd`, or `gpu`).
    pub target: Option<String>,
    /// Default `-O` setting.
    pub optimize: Option<bool>,
    /// Default color preference.
    pub color: Option<ColorPreference>,
}

impl ModccConfig {
    /// Read and parse a config file. A missing file yields the default
    /// (all-`None`) configuration rather than an error.
    pub fn load_from_file(path: &Path) -> CliResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Walk up from `start` looking for `modcc.toml`, the same upward
    /// directory search the teacher's workspace root discovery uses,
    /// loading the first one found (or the default if none exists all
    /// the way to the filesystem root).
    pub fn discover(start: &Path) -> CliResult<Self> {
        match find_config_path(start) {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }
}

fn find_config_path(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        let candidate = current.join(CONFIG_FILE_NAME);
        if candidate.exists() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}

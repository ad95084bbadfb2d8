//! Load `worldconv.toml` (CLI only). Library callers build a [`ConverterConfig`](crate::ConverterConfig) directly.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::types::Resolution;

#[derive(Debug, Default, Deserialize)]
pub struct WorldconvToml {
    #[serde(default)]
    pub settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsSection {
    pub threads: Option<usize>,
    pub write_threads: Option<usize>,
    pub convert_queue_factor: Option<usize>,
    pub write_queue_factor: Option<usize>,
    pub on_error: Option<Resolution>,
    pub verbose: Option<bool>,
}

/// Parse a config file. A missing file is an error here; see [`load_from_dir`] for the lenient lookup.
pub fn load_file(path: &Path) -> Result<WorldconvToml> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

/// Load `<dir>/worldconv.toml` if present. Returns None if missing or unreadable (logged).
pub fn load_from_dir(dir: &Path, filename: &str) -> Option<WorldconvToml> {
    let path = dir.join(filename);
    if !path.is_file() {
        return None;
    }
    load_file(&path).map_err(|e| log::warn!("{:#}", e)).ok()
}

/// Overwrite a target field when the source option is set.
#[macro_export]
macro_rules! apply_opt {
    ($src:expr, $dst:expr, $src_field:ident => $dst_field:ident) => {
        if let Some(v) = $src.$src_field {
            $dst.$dst_field = v;
        }
    };
}

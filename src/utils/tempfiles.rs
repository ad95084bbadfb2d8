use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::config::PackagePaths;

/// Get the temporary path a file is written to before its rename.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}{}", PackagePaths::get().temp_suffix()))
}

/// Write `bytes` to a temp file next to `path`, then rename over `path`.
/// Readers never observe a half-written file. Creates missing parent directories.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let temp_path = temp_path_for(path);
    fs::write(&temp_path, bytes).with_context(|| format!("write {}", temp_path.display()))?;
    rename_temp_to_final(&temp_path, path)
}

pub fn rename_temp_to_final(temp_path: &Path, final_path: &Path) -> Result<()> {
    if let Err(e) = fs::rename(temp_path, final_path) {
        let _ = fs::remove_file(temp_path);
        return Err(e).with_context(|| {
            format!(
                "atomic rename temp file to final path ({} -> {})",
                temp_path.display(),
                final_path.display()
            )
        });
    }
    Ok(())
}

/// Remove `dir` and then its parents up to (not including) `stop_at`, as long as they are empty.
pub fn prune_empty_dirs(dir: &Path, stop_at: &Path) {
    let mut current = Some(dir);
    while let Some(d) = current {
        if d == stop_at || !d.starts_with(stop_at) || fs::remove_dir(d).is_err() {
            break;
        }
        current = d.parent();
    }
}

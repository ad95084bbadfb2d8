//! Level info finalization: copy the small descriptor files once all chunks are written.

use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::interfaces::LevelInfoFinalizer;
use crate::utils::config::WorldLayout;

/// Copies `level.dat` (required) and `offset.txt` (when present) into the output world.
pub struct LevelInfoCopier {
    src: PathBuf,
    dst: PathBuf,
}

impl LevelInfoCopier {
    pub fn new(src: &Path, dst: &Path) -> Self {
        Self {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
        }
    }

    fn copy(&self, name: &str) -> Result<()> {
        let from = self.src.join(name);
        let to = self.dst.join(name);
        fs::copy(&from, &to)
            .with_context(|| format!("copy {} -> {}", from.display(), to.display()))?;
        Ok(())
    }
}

impl LevelInfoFinalizer for LevelInfoCopier {
    fn finalize(&self) -> Result<()> {
        fs::create_dir_all(&self.dst)
            .with_context(|| format!("create output world {}", self.dst.display()))?;
        self.copy(WorldLayout::LEVEL_DAT)?;
        if self.src.join(WorldLayout::OFFSET_TXT).is_file() {
            self.copy(WorldLayout::OFFSET_TXT)?;
        }
        debug!("Level info copied to {}", self.dst.display());
        Ok(())
    }
}

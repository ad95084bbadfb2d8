//! Filesystem source and sink for worlds laid out as `<root>/chunks/<dim>/<x>.<z>.chunk`.

use anyhow::{Context, Result};
use log::{debug, warn};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use walkdir::WalkDir;

use crate::interfaces::{ChunkSink, ChunkSource, StopFlag};
use crate::utils::config::WorldLayout;
use crate::utils::tempfiles::{prune_empty_dirs, write_atomic};

use super::chunk::{ChunkFile, ChunkPos};

/// Reads chunk files from a world directory. Walks the tree once for `produce_all` and
/// again, independently, for `count_all`.
pub struct ChunkDirSource {
    chunks_dir: PathBuf,
    stop: StopFlag,
}

impl ChunkDirSource {
    pub fn open(world: &Path) -> Result<Self> {
        let chunks_dir = world.join(WorldLayout::CHUNKS_DIR);
        if !chunks_dir.is_dir() {
            anyhow::bail!("no {} directory in {}", WorldLayout::CHUNKS_DIR, world.display());
        }
        Ok(Self {
            chunks_dir,
            stop: StopFlag::new(),
        })
    }

    /// Chunk file paths in walk order. Walk errors are returned as they occur.
    fn chunk_paths(&self) -> impl Iterator<Item = Result<PathBuf>> + '_ {
        WalkDir::new(&self.chunks_dir)
            .min_depth(2)
            .into_iter()
            .filter_map(|r| match r {
                Ok(entry) if is_chunk_file(entry.path()) && entry.file_type().is_file() => {
                    Some(Ok(entry.into_path()))
                }
                Ok(_) => None,
                Err(err) => Some(Err(anyhow::Error::new(err).context("walk chunks directory"))),
            })
    }
}

fn is_chunk_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == WorldLayout::CHUNK_EXT)
}

impl ChunkSource for ChunkDirSource {
    type Item = ChunkFile;

    fn produce_all(&self, on_item: &mut dyn FnMut(ChunkFile) -> ControlFlow<()>) -> Result<()> {
        for path in self.chunk_paths() {
            if self.stop.is_stopped() {
                debug!("Chunk source stopped");
                break;
            }
            let path = path?;
            let rel = path.strip_prefix(&self.chunks_dir).unwrap_or(path.as_path());
            let pos = match ChunkPos::from_chunk_path(rel) {
                Ok(pos) => pos,
                Err(e) => {
                    warn!("Skipping {}: {:#}", path.display(), e);
                    continue;
                }
            };
            let data = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            if on_item(ChunkFile { pos, data }).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn count_all(&self, on_counted: &mut dyn FnMut()) -> Result<()> {
        for path in self.chunk_paths() {
            if self.stop.is_stopped() {
                break;
            }
            path?;
            on_counted();
        }
        Ok(())
    }

    fn request_stop(&self) {
        self.stop.stop();
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Writes chunk files into a destination world and remembers them for `discard_output`.
pub struct ChunkDirSink {
    root: PathBuf,
    written: Mutex<Vec<PathBuf>>,
}

impl ChunkDirSink {
    pub fn create(world: &Path) -> Result<Self> {
        fs::create_dir_all(world.join(WorldLayout::CHUNKS_DIR))
            .with_context(|| format!("create output world {}", world.display()))?;
        Ok(Self {
            root: world.to_path_buf(),
            written: Mutex::new(Vec::new()),
        })
    }

    /// Number of chunk files written so far.
    pub fn written_count(&self) -> usize {
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl ChunkSink for ChunkDirSink {
    type Item = ChunkFile;

    fn accept(&self, chunk: ChunkFile) -> Result<()> {
        let path = self.root.join(chunk.pos.relative_path());
        write_atomic(&path, &chunk.data).with_context(|| format!("write chunk {}", chunk.pos))?;
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        debug!("Chunk sink closed after {} chunks", self.written_count());
        Ok(())
    }

    fn discard_output(&self) -> Result<()> {
        let written = {
            let mut guard = self.written.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        let failed = written
            .par_iter()
            .filter(|p| match fs::remove_file(p) {
                Ok(()) => false,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
                Err(e) => {
                    warn!("Could not remove {}: {}", p.display(), e);
                    true
                }
            })
            .count();
        let dirs: BTreeSet<&Path> = written.iter().filter_map(|p| p.parent()).collect();
        for dir in dirs {
            prune_empty_dirs(dir, &self.root);
        }
        debug!("Discarded {} chunk files", written.len() - failed);
        if failed > 0 {
            anyhow::bail!("{} of {} chunk files could not be removed", failed, written.len());
        }
        Ok(())
    }
}

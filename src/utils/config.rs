//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    config_filename: String,
    temp_suffix: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                config_filename: format!("{pkg}.toml"),
                temp_suffix: format!(".{pkg}.tmp"),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Config file looked up in the source world directory.
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Suffix of in-progress chunk files before their atomic rename.
    pub fn temp_suffix(&self) -> &str {
        &self.temp_suffix
    }
}

// ---- Worker threads ----

/// Thread limits for stage sizing.
/// Use [`WorkerThreadLimits::current()`] to fill `all_threads` from rayon; the rest are const.
#[derive(Clone, Copy, Debug)]
pub struct WorkerThreadLimits {
    /// Available threads (from rayon); set by [`WorkerThreadLimits::current()`].
    pub all_threads: usize,
    /// Minimum workers per stage.
    pub floor: usize,
}

impl Default for WorkerThreadLimits {
    fn default() -> Self {
        Self {
            all_threads: 0, // use current() to set from rayon
            floor: Self::FLOOR_THREADS,
        }
    }
}

impl WorkerThreadLimits {
    pub const FLOOR_THREADS: usize = 1;

    /// Build limits with `all_threads` set from `rayon::current_num_threads()`.
    pub fn current() -> Self {
        Self {
            all_threads: rayon::current_num_threads(),
            ..Self::default()
        }
    }

    /// Threads per stage: hardware parallelism, never below the floor.
    pub fn stage_threads(&self) -> usize {
        self.all_threads.max(self.floor)
    }
}

// ---- Stage queues ----

/// Queue sizing: capacity = factor × workers. Writing drains slower than conversion,
/// so its buffer is smaller relative to the worker count.
pub struct QueueConsts;

impl QueueConsts {
    /// Convert queue slots per convert worker.
    pub const CONVERT_QUEUE_FACTOR: usize = 64;
    /// Write queue slots per write worker.
    pub const WRITE_QUEUE_FACTOR: usize = 32;
    /// How often a drain wait checks the interrupt flag.
    pub const DRAIN_POLL: Duration = Duration::from_millis(100);
}

// ---- Progress ----

/// Progress bar refresh tuning.
pub struct ProgressConsts;

impl ProgressConsts {
    /// Interval at which the reporter thread refreshes the bar total and logs queue fill.
    pub const REPORT_INTERVAL: Duration = Duration::from_millis(250);
}

// ---- World layout ----

/// File and directory names of the on-disk world layout.
pub struct WorldLayout;

impl WorldLayout {
    /// Directory under the world root holding `<dim>/<x>.<z>.chunk` files.
    pub const CHUNKS_DIR: &'static str = "chunks";
    pub const CHUNK_EXT: &'static str = "chunk";
    /// Required level descriptor.
    pub const LEVEL_DAT: &'static str = "level.dat";
    /// Optional vertical offset descriptor.
    pub const OFFSET_TXT: &'static str = "offset.txt";
}

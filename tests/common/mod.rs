//! In-memory collaborators for driving the pipeline in tests.
#![allow(dead_code)]

use anyhow::{Result, anyhow, bail};
use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Barrier, Mutex, OnceLock};
use std::time::Duration;

use worldconv::{
    ChunkSink, ChunkSource, ChunkTransform, ConverterConfig, ItemFailure, LevelInfoFinalizer,
    ProgressListener, Resolution, StopFlag,
};

/// Output of [`MockTransform`]: proves the item passed through the transform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Converted(pub u32);

// --- source ---

pub struct VecSource {
    items: Vec<u32>,
    /// Fail with a read error instead of yielding the item at this index.
    pub fail_at: Option<usize>,
    stop: StopFlag,
    pub log: Arc<SourceLog>,
}

#[derive(Default)]
pub struct SourceLog {
    pub closed: AtomicUsize,
    pub stop_requests: AtomicUsize,
}

impl VecSource {
    pub fn new(items: impl IntoIterator<Item = u32>) -> Self {
        Self {
            items: items.into_iter().collect(),
            fail_at: None,
            stop: StopFlag::new(),
            log: Arc::new(SourceLog::default()),
        }
    }
}

impl ChunkSource for VecSource {
    type Item = u32;

    fn produce_all(&self, on_item: &mut dyn FnMut(u32) -> ControlFlow<()>) -> Result<()> {
        for (i, &item) in self.items.iter().enumerate() {
            if self.stop.is_stopped() {
                break;
            }
            if self.fail_at == Some(i) {
                bail!("simulated read failure at item {}", i);
            }
            if on_item(item).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn count_all(&self, on_counted: &mut dyn FnMut()) -> Result<()> {
        for _ in &self.items {
            on_counted();
        }
        Ok(())
    }

    fn request_stop(&self) {
        self.log.stop_requests.fetch_add(1, Ordering::SeqCst);
        self.stop.stop();
    }

    fn close(&self) -> Result<()> {
        self.log.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Raises the converter's interrupt flag right after yielding `after` items, as a
/// Ctrl+C in the middle of submission would.
pub struct InterruptingSource {
    inner: VecSource,
    after: usize,
    /// Filled with the converter's interrupt handle once it exists.
    pub flag: Arc<OnceLock<Arc<AtomicBool>>>,
}

impl InterruptingSource {
    pub fn new(inner: VecSource, after: usize) -> Self {
        Self {
            inner,
            after,
            flag: Arc::new(OnceLock::new()),
        }
    }
}

impl ChunkSource for InterruptingSource {
    type Item = u32;

    fn produce_all(&self, on_item: &mut dyn FnMut(u32) -> ControlFlow<()>) -> Result<()> {
        let mut yielded = 0;
        self.inner.produce_all(&mut |item| {
            let flow = on_item(item);
            yielded += 1;
            if yielded == self.after
                && let Some(flag) = self.flag.get()
            {
                flag.store(true, Ordering::SeqCst);
            }
            flow
        })
    }

    fn count_all(&self, on_counted: &mut dyn FnMut()) -> Result<()> {
        self.inner.count_all(on_counted)
    }

    fn request_stop(&self) {
        self.inner.request_stop();
    }

    fn close(&self) -> Result<()> {
        self.inner.close()
    }
}

// --- transform ---

#[derive(Default)]
pub struct MockTransform {
    pub fail_on: HashSet<u32>,
    pub panic_on: HashSet<u32>,
    pub fail_all: bool,
    pub delay: Option<Duration>,
    /// Every call waits here first, so failures from different workers land together.
    pub barrier: Option<Arc<Barrier>>,
    pub calls: Arc<AtomicUsize>,
}

impl ChunkTransform for MockTransform {
    type Input = u32;
    type Output = Converted;

    fn convert(&self, input: u32) -> Result<Converted> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(barrier) = &self.barrier {
            barrier.wait();
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.panic_on.contains(&input) {
            panic!("transform panicked on {input}");
        }
        if self.fail_all || self.fail_on.contains(&input) {
            return Err(anyhow!("cannot convert {}", input));
        }
        Ok(Converted(input))
    }
}

// --- sink ---

#[derive(Default)]
pub struct SinkLog {
    pub accepted: Mutex<Vec<Converted>>,
    /// Lifecycle calls in order: "close", "discard".
    pub events: Mutex<Vec<&'static str>>,
}

impl SinkLog {
    pub fn accepted_sorted(&self) -> Vec<u32> {
        let mut v: Vec<u32> = self.accepted.lock().unwrap().iter().map(|c| c.0).collect();
        v.sort_unstable();
        v
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct MockSink {
    pub fail_on: HashSet<u32>,
    pub close_fails: bool,
    pub discard_fails: bool,
    pub delay: Option<Duration>,
    pub log: Arc<SinkLog>,
}

impl ChunkSink for MockSink {
    type Item = Converted;

    fn accept(&self, item: Converted) -> Result<()> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail_on.contains(&item.0) {
            bail!("disk full while writing {}", item.0);
        }
        self.log.accepted.lock().unwrap().push(item);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.log.events.lock().unwrap().push("close");
        if self.close_fails {
            bail!("simulated close failure");
        }
        Ok(())
    }

    fn discard_output(&self) -> Result<()> {
        self.log.events.lock().unwrap().push("discard");
        if self.discard_fails {
            bail!("simulated discard failure");
        }
        self.log.accepted.lock().unwrap().clear();
        Ok(())
    }
}

// --- finalizer ---

#[derive(Default)]
pub struct CountingFinalizer {
    pub calls: Arc<AtomicUsize>,
    pub fail: bool,
}

impl LevelInfoFinalizer for CountingFinalizer {
    fn finalize(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("level.dat missing");
        }
        Ok(())
    }
}

// --- listener ---

pub struct RecordingListener {
    resolution: Resolution,
    /// Time spent inside `on_error`, to widen the window for racing failures.
    pub decide_delay: Duration,
    pub errors: AtomicUsize,
    pub progress: AtomicUsize,
    pub first_failure: Mutex<Option<String>>,
}

impl RecordingListener {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            decide_delay: Duration::ZERO,
            errors: AtomicUsize::new(0),
            progress: AtomicUsize::new(0),
            first_failure: Mutex::new(None),
        }
    }

    pub fn error_calls(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }
}

impl ProgressListener<Converted> for RecordingListener {
    fn on_progress(&self, _converted: &Converted) {
        self.progress.fetch_add(1, Ordering::SeqCst);
    }

    fn on_error(&self, failure: &ItemFailure) -> Resolution {
        self.errors.fetch_add(1, Ordering::SeqCst);
        *self.first_failure.lock().unwrap() = Some(failure.to_string());
        std::thread::sleep(self.decide_delay);
        self.resolution
    }
}

/// Small stages so backpressure kicks in even for short runs.
pub fn small_config(workers: usize) -> ConverterConfig {
    ConverterConfig::with_workers(workers).with_queue_factors(2, 2)
}

// --- chunk fixtures ---

/// Section compound at height `y` holding `blocks` (index, packed id) on air, plus sky light.
pub fn section_tag(y: i8, blocks: &[(usize, u16)]) -> fastnbt::Value {
    use fastnbt::{ByteArray, Value};
    use worldconv::formats::Section;

    let mut section = Section::empty(y as u8);
    for &(index, id) in blocks {
        section.set_packed_id(index, id);
    }
    let mut tag = HashMap::new();
    tag.insert("Y".to_string(), Value::Byte(y));
    tag.insert(
        "SkyLight".to_string(),
        Value::ByteArray(ByteArray::new(vec![-1; 2048])),
    );
    section.write_to(&mut tag);
    Value::Compound(tag)
}

/// Chunk NBT root `{Level: {xPos, zPos, Sections}}`.
pub fn chunk_root(sections: Vec<fastnbt::Value>) -> fastnbt::Value {
    use fastnbt::Value;

    let mut level = HashMap::new();
    level.insert("xPos".to_string(), Value::Int(0));
    level.insert("zPos".to_string(), Value::Int(0));
    level.insert("Sections".to_string(), Value::List(sections));
    let mut root = HashMap::new();
    root.insert("Level".to_string(), Value::Compound(level));
    Value::Compound(root)
}

/// Encoded chunk payload: section 0 holds `blocks`, section 1 is empty.
pub fn chunk_bytes(
    compression: worldconv::formats::ChunkCompression,
    blocks: &[(usize, u16)],
) -> Vec<u8> {
    worldconv::formats::ChunkNbt {
        compression,
        root: chunk_root(vec![section_tag(0, blocks), section_tag(1, &[])]),
    }
    .encode()
    .unwrap()
}

use std::{
    fmt::{self, Debug},
    fs, io,
    panic::{catch_unwind, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};
use xxhash_rust::xxh3::xxh3_64;

use crate::{backend::Backend, worker::Worker, OutOfMemory};

/// Persistent storage for pipeline cache blob.
pub trait CacheStorage: Debug + Send + Sync + 'static {
    /// Loads stored blob.
    /// Returns `Ok(None)` if nothing was stored yet.
    fn load(&self) -> io::Result<Option<Vec<u8>>>;

    /// Replaces stored blob.
    fn store(&self, data: &[u8]) -> io::Result<()>;

    /// Human readable location for logs.
    fn describe(&self) -> String;
}

static DEFAULT_CACHE_PATH: Lazy<PathBuf> = Lazy::new(|| {
    let exe = std::env::current_exe()
        .ok()
        .and_then(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
        .unwrap_or_else(|| String::from("pipewright"));

    std::env::temp_dir().join(format!("{:016x}.pipecache", xxh3_64(exe.as_bytes())))
});

/// Stores blob in a single file.
/// File is replaced as a whole on each store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileStorage {
    path: PathBuf,
}

impl Default for FileStorage {
    fn default() -> Self {
        FileStorage {
            path: DEFAULT_CACHE_PATH.clone(),
        }
    }
}

impl FileStorage {
    /// Storage in temp directory, named after running executable.
    pub fn new() -> Self {
        FileStorage::default()
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        FileStorage { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStorage for FileStorage {
    fn load(&self) -> io::Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn store(&self, data: &[u8]) -> io::Result<()> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Storage that keeps nothing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NullStorage;

impl CacheStorage for NullStorage {
    fn load(&self) -> io::Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn store(&self, _data: &[u8]) -> io::Result<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        String::from("<null>")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineCacheConfig {
    /// Longest time between two persistence passes.
    pub flush_interval: Duration,

    /// Name of persistence thread.
    pub thread_name: String,
}

impl Default for PipelineCacheConfig {
    fn default() -> Self {
        PipelineCacheConfig {
            flush_interval: Duration::from_secs(60),
            thread_name: String::from("pipewright-cache"),
        }
    }
}

#[derive(Debug, Default)]
struct Signal {
    stop: bool,
    pending: bool,
}

struct Shared<B: Backend> {
    device: Arc<B>,
    handle: B::PipelineCache,
    storage: Box<dyn CacheStorage>,

    /// Number of `update` calls so far.
    updates: AtomicU64,

    /// Value of `updates` at last successful store.
    persisted: AtomicU64,

    signal: Mutex<Signal>,
    condvar: Condvar,
}

impl<B> Shared<B>
where
    B: Backend,
{
    /// Stores cache content if it changed since last store.
    fn persist(&self) {
        let updates = self.updates.load(Ordering::Acquire);
        if updates == self.persisted.load(Ordering::Acquire) {
            return;
        }

        let start = Instant::now();
        let data = match self.device.pipeline_cache_data(&self.handle) {
            Ok(data) => data,
            Err(err) => {
                error!("Failed to serialize pipeline cache: {}", err);
                return;
            }
        };

        match self.storage.store(&data) {
            Ok(()) => {
                self.persisted.store(updates, Ordering::Release);
                debug!(
                    "Pipeline cache stored to {}, {} bytes in {} ms",
                    self.storage.describe(),
                    data.len(),
                    start.elapsed().as_millis()
                );
            }
            Err(err) => {
                warn!(
                    "Failed to store pipeline cache to {}: {}",
                    self.storage.describe(),
                    err
                );
            }
        }
    }

    fn run(&self, flush_interval: Duration) {
        loop {
            {
                let mut signal = self.signal.lock();
                if !signal.stop && !signal.pending {
                    self.condvar.wait_for(&mut signal, flush_interval);
                }
                if signal.stop {
                    return;
                }
                signal.pending = false;
            }

            if catch_unwind(AssertUnwindSafe(|| self.persist())).is_err() {
                error!("Pipeline cache persistence pass panicked");
            }
        }
    }
}

impl<B> Drop for Shared<B>
where
    B: Backend,
{
    fn drop(&mut self) {
        self.device.destroy_pipeline_cache(&self.handle);
    }
}

/// Driver pipeline cache kept in sync with persistent storage.
///
/// Content loaded from the storage warms up the driver cache.
/// Background thread writes the cache back after it was updated,
/// at most once per wakeup, and once more when the cache is stopped.
pub struct PipelineCache<B: Backend> {
    shared: Arc<Shared<B>>,
    worker: Mutex<Worker>,
}

impl<B> Debug for PipelineCache<B>
where
    B: Backend,
{
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("PipelineCache")
            .field("handle", &self.shared.handle)
            .field("storage", &self.shared.storage)
            .field("updates", &self.shared.updates.load(Ordering::Relaxed))
            .field("worker", &*self.worker.lock())
            .finish()
    }
}

impl<B> PipelineCache<B>
where
    B: Backend,
{
    pub fn new(
        device: Arc<B>,
        storage: Box<dyn CacheStorage>,
        config: PipelineCacheConfig,
    ) -> Result<Self, OutOfMemory> {
        let initial = match storage.load() {
            Ok(Some(data)) => {
                debug!(
                    "Pipeline cache loaded from {}, {} bytes",
                    storage.describe(),
                    data.len()
                );
                data
            }
            Ok(None) => {
                info!("No pipeline cache at {}", storage.describe());
                Vec::new()
            }
            Err(err) => {
                warn!(
                    "Failed to load pipeline cache from {}: {}",
                    storage.describe(),
                    err
                );
                Vec::new()
            }
        };

        let handle = device.create_pipeline_cache(&initial)?;

        let shared = Arc::new(Shared {
            device,
            handle,
            storage,
            updates: AtomicU64::new(0),
            persisted: AtomicU64::new(0),
            signal: Mutex::new(Signal::default()),
            condvar: Condvar::new(),
        });

        let flush_interval = config.flush_interval;
        let worker = Worker::spawn(
            config.thread_name,
            {
                let shared = Arc::clone(&shared);
                move || shared.run(flush_interval)
            },
            {
                let shared = Arc::clone(&shared);
                move || {
                    shared.signal.lock().stop = true;
                    shared.condvar.notify_all();
                }
            },
        );

        match worker {
            Ok(worker) => Ok(PipelineCache {
                shared,
                worker: Mutex::new(worker),
            }),
            Err(err) => {
                // Thread creation fails only when the process is out of resources.
                error!("Failed to spawn pipeline cache thread: {}", err);
                Err(OutOfMemory)
            }
        }
    }

    /// Driver cache handle to compile pipelines with.
    pub fn handle(&self) -> &B::PipelineCache {
        &self.shared.handle
    }

    /// Notifies that cache content changed.
    /// Never writes to the storage itself.
    pub fn update(&self) {
        self.shared.updates.fetch_add(1, Ordering::AcqRel);
        self.shared.signal.lock().pending = true;
        self.shared.condvar.notify_one();
    }

    /// Stops background thread and stores final cache content.
    /// Calls after the first one do nothing.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        if !worker.is_running() {
            return;
        }

        worker.stop();
        self.shared.persist();
    }
}

impl<B> Drop for PipelineCache<B>
where
    B: Backend,
{
    fn drop(&mut self) {
        self.stop();
    }
}

//! Background preload and GC worker
//!
//! The consumer's thread never waits on the worker. DMA calls record which
//! resources were touched; the worker wakes on a tick or after the GC
//! interval, asks each touched resource for preload tasks, runs them in
//! priority order across all resources, then garbage-collects every
//! resource at most once per interval.

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::registry::{Registry, ResourceId};
use crate::resource::CachedResource;
use parking_lot::{Condvar, Mutex};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Default)]
struct Signals {
    pending: BTreeSet<ResourceId>,
    ticked: bool,
    shutdown: bool,
}

#[derive(Debug)]
struct Shared {
    registry: Arc<Registry>,
    gc_interval: Duration,
    signals: Mutex<Signals>,
    wake: Condvar,
    last_gc: Mutex<Option<Instant>>,
}

impl Shared {
    fn drain_pending(&self) -> usize {
        let pending = std::mem::take(&mut self.signals.lock().pending);
        if pending.is_empty() {
            return 0;
        }

        let mut tasks = Vec::new();
        for id in pending {
            match self.registry.get(id) {
                Ok(resource) => {
                    for task in resource.preload_tasks() {
                        tasks.push((id, Arc::clone(&resource), task));
                    }
                }
                Err(e) => warn!("Dropping notification: {}", e),
            }
        }
        tasks.sort_by_key(|(_, _, task)| task.priority);

        if !tasks.is_empty() {
            debug!("Running {} preload tasks", tasks.len());
        }
        let mut done = 0;
        for (id, resource, task) in &tasks {
            match resource.run_preload_task(task) {
                Ok(()) => done += 1,
                Err(e) => error!("Preload {:?} of resource {} failed: {}", task.payload, id, e),
            }
        }
        done
    }

    fn collect_garbage_at(&self, now: Instant) {
        for (_, resource) in self.registry.snapshot() {
            resource.gc(now);
        }
        *self.last_gc.lock() = Some(now);
    }

    fn maybe_collect_garbage(&self, now: Instant) {
        let due = self
            .last_gc
            .lock()
            .is_none_or(|last| now.saturating_duration_since(last) >= self.gc_interval);
        if due {
            self.collect_garbage_at(now);
        }
    }

    fn run(&self) {
        info!("Scheduler started");
        loop {
            {
                let mut signals = self.signals.lock();
                if !signals.ticked && !signals.shutdown {
                    self.wake.wait_for(&mut signals, self.gc_interval);
                }
                if signals.shutdown {
                    break;
                }
                signals.ticked = false;
            }

            self.drain_pending();
            self.maybe_collect_garbage(Instant::now());
        }
        info!("Scheduler stopped");
    }
}

/// Owns the worker thread and the touched-resource set.
///
/// Dropping the scheduler stops and joins the worker.
#[derive(Debug)]
pub struct Scheduler {
    shared: Arc<Shared>,
    worker: Option<thread::JoinHandle<()>>,
}

impl Scheduler {
    /// Scheduler with a background worker.
    pub fn start(registry: Arc<Registry>, config: &CacheConfig) -> CacheResult<Self> {
        let mut scheduler = Self::manual(registry, config);
        let shared = Arc::clone(&scheduler.shared);
        let worker = thread::Builder::new()
            .name("resound-scheduler".to_string())
            .spawn(move || shared.run())
            .map_err(CacheError::Spawn)?;
        scheduler.worker = Some(worker);
        Ok(scheduler)
    }

    /// Scheduler without a worker; the host calls
    /// [`drain_pending`](Self::drain_pending) and
    /// [`collect_garbage`](Self::collect_garbage) itself.
    pub fn manual(registry: Arc<Registry>, config: &CacheConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry,
                gc_interval: config.gc_interval,
                signals: Mutex::new(Signals::default()),
                wake: Condvar::new(),
                last_gc: Mutex::new(None),
            }),
            worker: None,
        }
    }

    /// Whether a background worker is running
    pub fn has_worker(&self) -> bool {
        self.worker.is_some()
    }

    /// Record that `id` was touched. Repeated notifications collapse.
    pub fn notify(&self, id: ResourceId) {
        self.shared.signals.lock().pending.insert(id);
    }

    /// Number of resources waiting for a preload pass
    pub fn pending_len(&self) -> usize {
        self.shared.signals.lock().pending.len()
    }

    /// Wake the worker for one pass.
    pub fn tick(&self) {
        self.shared.signals.lock().ticked = true;
        self.shared.wake.notify_one();
    }

    /// Run the preload tasks of every touched resource now, in priority
    /// order. Failed tasks are logged and skipped. Returns how many tasks
    /// succeeded.
    pub fn drain_pending(&self) -> usize {
        self.shared.drain_pending()
    }

    /// Garbage-collect every registered resource now.
    pub fn collect_garbage(&self) {
        self.shared.collect_garbage_at(Instant::now());
    }

    /// Garbage-collect every registered resource as of `now`.
    pub fn collect_garbage_at(&self, now: Instant) {
        self.shared.collect_garbage_at(now);
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.shared.signals.lock().shutdown = true;
        self.shared.wake.notify_all();
        if worker.join().is_err() {
            error!("Scheduler thread panicked");
        }
    }
}

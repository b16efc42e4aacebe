//! Background surface extraction on a worker pool
//!
//! Jobs carry an owned snapshot of the voxels they mesh, so workers never
//! touch live volumes. Completed meshes land in a shared result queue that the
//! main thread drains without blocking.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::core::{Error, Result};
use crate::math::Region;
use crate::mesh::{ExtractedMesh, MeshMode, SurfaceExtractor};
use crate::voxel::{Palette, RawVolume};

/// Work handed to a worker
pub struct ExtractionJob {
    pub slot: usize,
    pub generation: u64,
    /// Dispatch order; a result older than the newest dispatch of its tile is stale
    pub sequence: u64,
    /// Region to mesh
    pub region: Region,
    /// Snapshot covering `region` plus a border
    pub volume: RawVolume,
    pub palette: Arc<Palette>,
    pub mode: MeshMode,
}

/// Finished mesh for one region of one slot
#[derive(Debug)]
pub struct ExtractionResult {
    pub slot: usize,
    pub generation: u64,
    pub sequence: u64,
    pub region: Region,
    pub mesh: ExtractedMesh,
}

/// Decrements the pending counter when a task ends, including by panic
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Dispatches extraction jobs to a rayon pool and collects their results
pub struct ExtractionScheduler {
    pool: rayon::ThreadPool,
    extractor: Arc<dyn SurfaceExtractor>,
    /// Tasks spawned but not yet finished
    pending: Arc<AtomicUsize>,
    /// Bumped on cancellation; tasks from an older epoch drop their results
    epoch: Arc<AtomicU64>,
    /// Total tasks ever spawned
    dispatched: AtomicUsize,
    results: Arc<Mutex<VecDeque<ExtractionResult>>>,
}

impl ExtractionScheduler {
    /// Create a scheduler with `worker_threads` workers (0 = one per core)
    pub fn new(worker_threads: usize, extractor: Arc<dyn SurfaceExtractor>) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_threads)
            .thread_name(|i| format!("extract-{i}"))
            .panic_handler(|_| {
                log::error!("Surface extraction task panicked, keeping previous mesh")
            })
            .build()
            .map_err(|e| Error::ThreadPool(e.to_string()))?;
        log::info!("Extraction scheduler started with {} workers", pool.current_num_threads());

        Ok(Self {
            pool,
            extractor,
            pending: Arc::new(AtomicUsize::new(0)),
            epoch: Arc::new(AtomicU64::new(0)),
            dispatched: AtomicUsize::new(0),
            results: Arc::new(Mutex::new(VecDeque::new())),
        })
    }

    fn lock_results(&self) -> MutexGuard<'_, VecDeque<ExtractionResult>> {
        self.results.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn a worker task for `job`
    pub fn dispatch(&self, job: ExtractionJob) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.dispatched.fetch_add(1, Ordering::Relaxed);

        let guard = PendingGuard(self.pending.clone());
        let task_epoch = self.epoch.load(Ordering::SeqCst);
        let epoch = self.epoch.clone();
        let results = self.results.clone();
        let extractor = self.extractor.clone();

        self.pool.spawn(move || {
            let _guard = guard;
            if epoch.load(Ordering::SeqCst) != task_epoch {
                return;
            }
            let mesh = extractor.extract(&job.volume, &job.region, &job.palette, job.mode);

            let mut results = results.lock().unwrap_or_else(PoisonError::into_inner);
            // Checked under the lock so a concurrent clear cannot miss this result
            if epoch.load(Ordering::SeqCst) == task_epoch {
                log::trace!("Extracted {} for slot {}", job.region, job.slot);
                results.push_back(ExtractionResult {
                    slot: job.slot,
                    generation: job.generation,
                    sequence: job.sequence,
                    region: job.region,
                    mesh,
                });
            }
        });
    }

    /// Publish an empty mesh for a region without involving a worker
    pub fn push_empty(&self, slot: usize, generation: u64, sequence: u64, region: Region) {
        self.lock_results().push_back(ExtractionResult {
            slot,
            generation,
            sequence,
            region,
            mesh: ExtractedMesh::default(),
        });
    }

    /// Take the oldest completed result, if any
    pub fn pop_result(&self) -> Option<ExtractionResult> {
        self.lock_results().pop_front()
    }

    pub fn result_count(&self) -> usize {
        self.lock_results().len()
    }

    /// Tasks spawned and not yet finished
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Total worker tasks spawned since creation
    pub fn dispatched_count(&self) -> usize {
        self.dispatched.load(Ordering::Relaxed)
    }

    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Block until every spawned task has finished
    pub fn wait_for_pending(&self) {
        while self.pending.load(Ordering::SeqCst) > 0 {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// Abort queued tasks, wait for running ones and discard all results
    pub fn clear_pending(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.wait_for_pending();
        let dropped = {
            let mut results = self.lock_results();
            let count = results.len();
            results.clear();
            count
        };
        if dropped > 0 {
            log::debug!("Discarded {dropped} extraction results");
        }
    }
}

impl Drop for ExtractionScheduler {
    fn drop(&mut self) {
        self.clear_pending();
    }
}

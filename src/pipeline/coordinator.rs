/*
 *  pipeline/coordinator.rs
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Owns the request queue, hands work to the pool and writes results
 *  back to the caches and the display state
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, never, select, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::bitmap::ContentHash;
use crate::cache::{CacheKey, ImageCaches, Variant};
use crate::display::state::{DisplayState, Slot};
use crate::pipeline::transforms::{JobInput, JobOutput, OrFallback, TransformError};
use crate::pipeline::workers::{self, PipelineHandle, WorkRequest, WorkResult};
use crate::shutdown::Shutdown;

/// Longest the coordinator blocks before looking at the shutdown flag.
pub const COORDINATOR_WAIT: Duration = Duration::from_secs(1);

/// A queued or in-flight transform and where its result goes.
#[derive(Debug, Clone)]
pub struct PendingJob {
    pub id: u64,
    pub input: JobInput,
    pub hash: ContentHash,
    pub size: (u32, u32),
    pub variant: Variant,
    pub target: Slot,
}

impl PendingJob {
    fn key(&self) -> CacheKey {
        CacheKey::new(self.hash, self.size, self.variant)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Accepted onto the queue
    Queued,
    /// Queue full; caller may ask again later
    Dropped,
    /// Same art already requested for this variant and slot
    Deduplicated,
    /// Served from the cache without any work
    Cached,
}

#[derive(Debug, Default)]
pub struct PipelineStats {
    dispatched: AtomicU64,
    dropped: AtomicU64,
    deduplicated: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub dispatched: u64,
    pub dropped: u64,
    pub deduplicated: u64,
    pub completed: u64,
    pub failed: u64,
}

impl PipelineStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

struct Shared {
    state: Arc<DisplayState>,
    caches: Arc<ImageCaches>,
    stats: PipelineStats,
    last_requested: Mutex<HashMap<(Variant, Slot), ContentHash>>,
    next_id: AtomicU64,
}

impl Shared {
    fn write_back(&self, job: &PendingJob, output: JobOutput, cache: bool) {
        match output {
            JobOutput::Image(bitmap) => {
                let bitmap = Arc::new(bitmap);
                if cache {
                    if let Some(c) = self.caches.for_variant(job.variant) {
                        c.put(job.key(), bitmap.clone());
                    }
                }
                self.state.apply_image(job.target, job.hash, bitmap);
            }
            JobOutput::Accents(accents) => {
                self.state.apply_accents(job.hash, accents);
            }
        }
    }

    fn complete(&self, job: &PendingJob, result: Result<JobOutput, TransformError>) {
        let ok = result.is_ok();
        PipelineStats::bump(if ok { &self.stats.completed } else { &self.stats.failed });
        // a filled slot keeps what it has; an empty one gets the stand-in
        if ok || self.state.slot_is_empty(job.target) {
            self.write_back(job, result.or_fallback(job.variant, job.size), ok);
        } else if let Err(e) = result {
            warn!("{:?} job {} for {:?} failed, keeping prior: {}", job.variant, job.id, job.target, e);
        }
    }

    /// Drop the guard entry of a job that never ran, if it still holds.
    fn release(&self, job: &PendingJob) {
        let mut guard = self.last_requested.lock();
        let key = (job.variant, job.target);
        if guard.get(&key) == Some(&job.hash) {
            guard.remove(&key);
        }
    }
}

/// Cheap handle for asking the coordinator to produce an artifact.
#[derive(Clone)]
pub struct BackgroundRequester {
    tx: Sender<PendingJob>,
    shared: Arc<Shared>,
}

impl BackgroundRequester {
    /// Never blocks. The caller must already have pointed the display state
    /// at the source hash of `input`, otherwise the result is dropped as stale.
    pub fn request(&self, input: JobInput, size: (u32, u32), variant: Variant, target: Slot) -> RequestOutcome {
        let hash = input.content_hash();
        let guard_key = (variant, target);

        if self.shared.last_requested.lock().get(&guard_key) == Some(&hash) {
            PipelineStats::bump(&self.shared.stats.deduplicated);
            debug!("{:?} for {:?} unchanged ({}), skipped", variant, target, hash);
            return RequestOutcome::Deduplicated;
        }

        let key = CacheKey::new(hash, size, variant);
        if let Some(bitmap) = self.shared.caches.for_variant(variant).and_then(|c| c.get(&key)) {
            self.shared.last_requested.lock().insert(guard_key, hash);
            self.shared.state.apply_image(target, hash, bitmap);
            debug!("{:?} for {:?} served from cache", variant, target);
            return RequestOutcome::Cached;
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let job = PendingJob { id, input, hash, size, variant, target };
        match self.tx.try_send(job) {
            Ok(()) => {
                self.shared.last_requested.lock().insert(guard_key, hash);
                RequestOutcome::Queued
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                PipelineStats::bump(&self.shared.stats.dropped);
                debug!("request queue full, dropped {:?} for {:?}", variant, target);
                RequestOutcome::Dropped
            }
        }
    }

    /// Forget the dedup guard of every variant aimed at `target`. Must be
    /// called whenever the slot is emptied, or art that comes back later is
    /// never produced again.
    pub fn forget(&self, target: Slot) {
        self.shared.last_requested.lock().retain(|(_, slot), _| *slot != target);
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }
}

/// Coordinator thread state. Runs transforms on the pool when there is one
/// and in-line otherwise.
pub struct Coordinator {
    requests: Receiver<PendingJob>,
    results: Receiver<WorkResult>,
    pool: Option<PipelineHandle>,
    in_flight: HashMap<u64, PendingJob>,
    shared: Arc<Shared>,
}

impl Coordinator {
    pub fn new(
        state: Arc<DisplayState>,
        caches: Arc<ImageCaches>,
        pool: Option<PipelineHandle>,
        queue_capacity: usize,
    ) -> (Self, BackgroundRequester) {
        let (tx, requests) = bounded(queue_capacity.max(1));
        let shared = Arc::new(Shared {
            state,
            caches,
            stats: PipelineStats::default(),
            last_requested: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        });
        let pool = pool.filter(|p| p.is_running());
        let results = pool.as_ref().map(|p| p.results().clone()).unwrap_or_else(never);
        let coordinator = Self { requests, results, pool, in_flight: HashMap::new(), shared: shared.clone() };
        (coordinator, BackgroundRequester { tx, shared })
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Only pull new requests while a worker is free, so a busy pool backs
    /// up the bounded queue and further requests are dropped.
    fn has_capacity(&self) -> bool {
        match &self.pool {
            Some(pool) => self.in_flight.len() < pool.workers(),
            None => true,
        }
    }

    /// One bounded wait for a request or a result. Returns false once every
    /// requester has gone away.
    pub fn step(&mut self, wait: Duration) -> bool {
        if self.has_capacity() {
            let (requests, results) = (self.requests.clone(), self.results.clone());
            select! {
                recv(requests) -> msg => match msg {
                    Ok(job) => self.dispatch(job),
                    Err(_) => return false,
                },
                recv(results) -> msg => if let Ok(result) = msg {
                    self.on_result(result);
                },
                default(wait) => {}
            }
        } else {
            match self.results.recv_timeout(wait) {
                Ok(result) => self.on_result(result),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
        true
    }

    fn dispatch(&mut self, job: PendingJob) {
        if !self.shared.state.is_current(job.target, job.hash) {
            debug!("{:?} job {} superseded before dispatch", job.variant, job.id);
            self.shared.release(&job);
            return;
        }
        PipelineStats::bump(&self.shared.stats.dispatched);
        let req = WorkRequest { id: job.id, input: job.input.clone(), size: job.size, variant: job.variant };
        let handed_back = match &self.pool {
            Some(pool) => pool.submit(req).err(),
            None => Some(req),
        };
        match handed_back {
            None => {
                self.in_flight.insert(job.id, job);
            }
            Some(req) => {
                let result = workers::execute(&req);
                self.shared.complete(&job, result);
            }
        }
    }

    fn on_result(&mut self, result: WorkResult) {
        match self.in_flight.remove(&result.id) {
            Some(job) => self.shared.complete(&job, result.result),
            None => debug!("result for unknown job {}", result.id),
        }
    }

    /// Loop until shutdown. In-flight jobs are abandoned on the way out.
    pub fn run(mut self, shutdown: Shutdown) {
        info!(
            "Pipeline coordinator running ({})",
            match &self.pool {
                Some(pool) => format!("{} workers", pool.workers()),
                None => "in-line".to_string(),
            }
        );
        while !shutdown.is_triggered() {
            if !self.step(COORDINATOR_WAIT) {
                break;
            }
        }
        if let Some(mut pool) = self.pool.take() {
            pool.shutdown();
        }
        let stats = self.stats();
        info!(
            "Pipeline coordinator stopped: {} dispatched, {} completed, {} failed, {} dropped, {} deduplicated",
            stats.dispatched, stats.completed, stats.failed, stats.dropped, stats.deduplicated
        );
    }

    pub fn spawn(self, shutdown: Shutdown) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("coordinator".into())
            .spawn(move || self.run(shutdown))
    }
}

/*
 *  pipeline/workers.rs
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Fixed pool of transform workers
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

use std::any::Any;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info, warn};

use crate::cache::Variant;
use crate::pipeline::transforms::{self, JobInput, JobOutput, TransformError};

/// One unit of work handed to the pool.
#[derive(Debug)]
pub struct WorkRequest {
    pub id: u64,
    pub input: JobInput,
    pub size: (u32, u32),
    pub variant: Variant,
}

/// Completed (or failed) work, matched back to its request by `id`.
#[derive(Debug)]
pub struct WorkResult {
    pub id: u64,
    pub result: Result<JobOutput, TransformError>,
}

/// Run one request with panics contained to the job.
pub fn execute(req: &WorkRequest) -> Result<JobOutput, TransformError> {
    catch_unwind(AssertUnwindSafe(|| transforms::run(&req.input, req.size, req.variant)))
        .unwrap_or_else(|payload| Err(TransformError::Panicked(panic_message(payload))))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Worker pool, built in two phases: `new` sizes it, `start` spawns threads.
/// Until started (or if starting fails) `submit` hands the request back so the
/// caller can run it in-line.
pub struct PipelineHandle {
    workers: usize,
    jobs_tx: Option<Sender<WorkRequest>>,
    results_tx: Sender<WorkResult>,
    results_rx: Receiver<WorkResult>,
    threads: Vec<JoinHandle<()>>,
}

impl PipelineHandle {
    pub fn new(workers: usize) -> Self {
        let (results_tx, results_rx) = unbounded();
        Self {
            workers,
            jobs_tx: None,
            results_tx,
            results_rx,
            threads: Vec::new(),
        }
    }

    pub fn workers(&self) -> usize { self.workers }

    pub fn is_running(&self) -> bool {
        self.jobs_tx.is_some()
    }

    pub fn start(&mut self) -> io::Result<()> {
        if self.is_running() {
            return Ok(());
        }
        if self.workers == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "pipeline needs at least one worker"));
        }
        let (jobs_tx, jobs_rx) = unbounded::<WorkRequest>();
        for n in 0..self.workers {
            let jobs_rx = jobs_rx.clone();
            let results_tx = self.results_tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("pipeline-{n}"))
                .spawn(move || worker_loop(n, jobs_rx, results_tx));
            match spawned {
                Ok(handle) => self.threads.push(handle),
                Err(e) => {
                    // dropping jobs_tx stops whatever already started
                    self.threads.clear();
                    return Err(e);
                }
            }
        }
        self.jobs_tx = Some(jobs_tx);
        info!("Image pipeline started with {} workers", self.workers);
        Ok(())
    }

    /// Queue a request on the pool; gives it back when the pool is not running.
    pub fn submit(&self, req: WorkRequest) -> Result<(), WorkRequest> {
        match &self.jobs_tx {
            Some(tx) => tx.send(req).map_err(|e| e.into_inner()),
            None => Err(req),
        }
    }

    pub fn results(&self) -> &Receiver<WorkResult> {
        &self.results_rx
    }

    /// Stop accepting work. Jobs in flight finish on their own and their
    /// results are never read.
    pub fn shutdown(&mut self) {
        if self.jobs_tx.take().is_some() {
            info!("Image pipeline stopping; abandoning in-flight jobs");
        }
        self.threads.clear();
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(n: usize, jobs: Receiver<WorkRequest>, results: Sender<WorkResult>) {
    debug!("pipeline worker {n} up");
    while let Ok(req) = jobs.recv() {
        let result = execute(&req);
        if let Err(e) = &result {
            warn!("pipeline worker {n}: job {} ({:?}) failed: {}", req.id, req.variant, e);
        }
        if results.send(WorkResult { id: req.id, result }).is_err() {
            break;
        }
    }
    debug!("pipeline worker {n} exiting");
}

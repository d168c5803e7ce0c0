/*
 *  pipeline/mod.rs
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Background image pipeline - request queue, worker pool and transforms
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

use log::warn;

pub mod transforms;
pub mod workers;
pub mod coordinator;

pub use coordinator::{BackgroundRequester, Coordinator, PendingJob, PipelineStats, RequestOutcome, StatsSnapshot};
pub use transforms::{AccentColors, JobInput, JobOutput, OrFallback, TransformError};
pub use workers::{PipelineHandle, WorkRequest, WorkResult};

/// Build and start the pool. `None` means transforms run in-line on the
/// coordinator thread.
pub fn start_pool(workers: usize) -> Option<PipelineHandle> {
    if workers == 0 {
        warn!("Image pipeline disabled (0 workers); transforms run in-line");
        return None;
    }
    let mut pool = PipelineHandle::new(workers);
    match pool.start() {
        Ok(()) => Some(pool),
        Err(e) => {
            warn!("Image pipeline failed to start ({}); transforms run in-line", e);
            None
        }
    }
}

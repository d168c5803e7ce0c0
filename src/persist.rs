/*
 *  persist.rs
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Debounced, validated writer for the persisted track state
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

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, error, info, warn};
use thiserror::Error;

use crate::media::TrackState;
use crate::shutdown::Shutdown;

const WRITER_WAIT: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("written state does not match the snapshot")]
    Mismatch,
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(".tmp");
    PathBuf::from(s)
}

/// Write `track` to `path` via a synced temp file that is re-read and
/// compared before the rename. On any failure the old file is untouched.
pub fn persist_snapshot(path: &Path, track: &TrackState) -> Result<(), PersistError> {
    let tmp = tmp_path(path);
    let result = write_and_verify(&tmp, track).and_then(|()| Ok(fs::rename(&tmp, path)?));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn write_and_verify(tmp: &Path, track: &TrackState) -> Result<(), PersistError> {
    let json = serde_json::to_vec_pretty(track)?;
    {
        let mut f = File::create(tmp)?;
        f.write_all(&json)?;
        f.sync_all()?;
    }
    let back: TrackState = serde_json::from_slice(&fs::read(tmp)?)?;
    if &back != track {
        return Err(PersistError::Mismatch);
    }
    Ok(())
}

/// Read a previously persisted state, if there is a usable one.
pub fn load_snapshot(path: &Path) -> Option<TrackState> {
    let bytes = fs::read(path).ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(track) => Some(track),
        Err(e) => {
            warn!("Ignoring unreadable state file {}: {}", path.display(), e);
            None
        }
    }
}

/// Producer side of the single-slot queue. `enqueue` never blocks; a newer
/// snapshot replaces one the writer has not picked up yet.
#[derive(Clone)]
pub struct WriterHandle {
    tx: Sender<TrackState>,
    rx: Receiver<TrackState>,
}

impl WriterHandle {
    pub fn enqueue(&self, snapshot: TrackState) {
        let mut item = snapshot;
        for _ in 0..3 {
            match self.tx.try_send(item) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => {
                    // drop the stale one and retry
                    let _ = self.rx.try_recv();
                    item = back;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
        debug!("state writer slot contended, snapshot skipped");
    }
}

pub struct StateWriter {
    path: PathBuf,
    tx: Sender<TrackState>,
    rx: Receiver<TrackState>,
    last_written: Option<TrackState>,
    writes: Arc<AtomicU64>,
}

impl StateWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (tx, rx) = bounded(1);
        Self { path: path.into(), tx, rx, last_written: None, writes: Arc::new(AtomicU64::new(0)) }
    }

    pub fn handle(&self) -> WriterHandle {
        WriterHandle { tx: self.tx.clone(), rx: self.rx.clone() }
    }

    /// Counter of successful file replacements.
    pub fn write_counter(&self) -> Arc<AtomicU64> {
        self.writes.clone()
    }

    fn write(&mut self, snapshot: TrackState) {
        if self.last_written.as_ref() == Some(&snapshot) {
            debug!("state unchanged, not rewriting {}", self.path.display());
            return;
        }
        match persist_snapshot(&self.path, &snapshot) {
            Ok(()) => {
                self.writes.fetch_add(1, Ordering::Relaxed);
                debug!("state written to {}", self.path.display());
                self.last_written = Some(snapshot);
            }
            Err(e) => error!("Failed to persist state to {}: {}", self.path.display(), e),
        }
    }

    pub fn run(mut self, shutdown: Shutdown) {
        info!("State writer started ({})", self.path.display());
        let rx = self.rx.clone();
        while !shutdown.is_triggered() {
            match rx.recv_timeout(WRITER_WAIT) {
                Ok(snapshot) => self.write(snapshot),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        if let Ok(snapshot) = rx.try_recv() {
            info!("Flushing pending state before exit");
            self.write(snapshot);
        }
        info!("State writer stopped");
    }

    pub fn start(self, shutdown: Shutdown) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("state-writer".into())
            .spawn(move || self.run(shutdown))
    }
}

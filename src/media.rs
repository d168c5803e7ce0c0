/*
 *  media.rs
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Track and weather records delivered by the polling collaborators
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

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bitmap::Bitmap;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Now playing snapshot. The media collaborator owns its meaning; the
/// renderer only displays and persists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackState {
    pub title: String,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub position_secs: f64,
    #[serde(default)]
    pub duration_secs: f64,
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl TrackState {
    pub fn artist_line(&self) -> String {
        self.artists.join(", ")
    }

    /// Same song, ignoring position and play state.
    pub fn same_track(&self, other: &TrackState) -> bool {
        self.title == other.title && self.artists == other.artists && self.album == other.album
    }

    /// Playback fraction 0..=1; zero when the duration is unknown.
    pub fn progress(&self) -> f64 {
        if self.duration_secs > 0.0 {
            (self.position_secs / self.duration_secs).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// A track change, optionally with raw album art and an artist portrait.
#[derive(Debug, Clone)]
pub struct TrackUpdate {
    pub track: TrackState,
    pub art: Option<Arc<[u8]>>,
    pub portrait: Option<Arc<[u8]>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub condition_code: i64,
    #[serde(default)]
    pub description: String,
    pub temperature_c: f64,
    #[serde(default)]
    pub feels_like_c: Option<f64>,
    #[serde(default)]
    pub humidity_pct: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct WeatherUpdate {
    pub report: WeatherReport,
    pub icon: Option<Bitmap>,
}

/// Media collaborator. `Ok(None)` means nothing is playing.
pub trait MediaSource: Send {
    fn poll(&mut self) -> Result<Option<TrackUpdate>, SourceError>;
}

/// Weather collaborator. `Ok(None)` means no report yet.
pub trait WeatherSource: Send {
    fn poll(&mut self) -> Result<Option<WeatherUpdate>, SourceError>;
}

/// A JSON record dropped on disk by another process; re-parsed only when
/// its mtime moves.
struct WatchedJson<T> {
    path: PathBuf,
    mtime: Option<SystemTime>,
    last: Option<T>,
}

impl<T: DeserializeOwned + Clone> WatchedJson<T> {
    fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), mtime: None, last: None }
    }

    /// Returns (record, freshly parsed).
    fn read(&mut self) -> Result<Option<(T, bool)>, SourceError> {
        let meta = match fs::metadata(&self.path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.mtime = None;
                self.last = None;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let mtime = meta.modified().ok();
        if mtime.is_some() && mtime == self.mtime {
            return Ok(self.last.clone().map(|r| (r, false)));
        }
        let text = fs::read_to_string(&self.path)?;
        let record: T = serde_json::from_str(&text)?;
        debug!("re-read {}", self.path.display());
        self.mtime = mtime;
        self.last = Some(record.clone());
        Ok(Some((record, true)))
    }
}

fn read_optional(path: Option<&Path>) -> Option<Arc<[u8]>> {
    let path = path?;
    match fs::read(path) {
        Ok(bytes) => Some(Arc::from(bytes)),
        Err(e) => {
            warn!("could not read {}: {}", path.display(), e);
            None
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct MediaRecord {
    #[serde(flatten)]
    track: TrackState,
    #[serde(default)]
    art_path: Option<PathBuf>,
    #[serde(default)]
    portrait_path: Option<PathBuf>,
}

/// File-backed media collaborator.
pub struct MediaFile {
    record: WatchedJson<MediaRecord>,
    art: Option<Arc<[u8]>>,
    portrait: Option<Arc<[u8]>>,
}

impl MediaFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { record: WatchedJson::new(path), art: None, portrait: None }
    }
}

impl MediaSource for MediaFile {
    fn poll(&mut self) -> Result<Option<TrackUpdate>, SourceError> {
        let Some((record, fresh)) = self.record.read()? else {
            return Ok(None);
        };
        if fresh {
            self.art = read_optional(record.art_path.as_deref());
            self.portrait = read_optional(record.portrait_path.as_deref());
        }
        Ok(Some(TrackUpdate {
            track: record.track,
            art: self.art.clone(),
            portrait: self.portrait.clone(),
        }))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct WeatherRecord {
    #[serde(flatten)]
    report: WeatherReport,
    #[serde(default)]
    icon_path: Option<PathBuf>,
}

/// File-backed weather collaborator.
pub struct WeatherFile {
    record: WatchedJson<WeatherRecord>,
    icon: Option<Bitmap>,
}

impl WeatherFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { record: WatchedJson::new(path), icon: None }
    }
}

impl WeatherSource for WeatherFile {
    fn poll(&mut self) -> Result<Option<WeatherUpdate>, SourceError> {
        let Some((record, fresh)) = self.record.read()? else {
            return Ok(None);
        };
        if fresh {
            self.icon = read_optional(record.icon_path.as_deref()).and_then(|bytes| {
                image::load_from_memory(&bytes)
                    .map(Bitmap::from)
                    .map_err(|e| warn!("weather icon undecodable: {}", e))
                    .ok()
            });
        }
        Ok(Some(WeatherUpdate { report: record.report, icon: self.icon.clone() }))
    }
}

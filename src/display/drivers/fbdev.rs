/*
 *  display/drivers/fbdev.rs
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Sink that writes packed frames to a framebuffer device or plain file
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

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::info;

use crate::display::error::DisplayError;
use crate::display::traits::{DisplayCapabilities, DisplaySink, RefreshMode};

/// Every frame overwrites the target from offset 0. Works for `/dev/fbN`
/// when the configured geometry and depth match the device, and for a
/// regular file that another process mirrors to a panel.
pub struct FbdevSink {
    path: PathBuf,
    file: File,
    capabilities: DisplayCapabilities,
}

impl FbdevSink {
    pub fn open(path: &Path, capabilities: DisplayCapabilities) -> Result<Self, DisplayError> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| DisplayError::InitializationFailed(format!("{}: {}", path.display(), e)))?;
        info!(
            "Framebuffer sink {} ({}x{} {:?})",
            path.display(),
            capabilities.width,
            capabilities.height,
            capabilities.color_depth
        );
        Ok(Self { path: path.to_path_buf(), file, capabilities })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn frame_len(&self) -> usize {
        self.capabilities.color_depth.frame_len(self.capabilities.width, self.capabilities.height)
    }
}

impl DisplaySink for FbdevSink {
    fn capabilities(&self) -> &DisplayCapabilities {
        &self.capabilities
    }

    fn write_frame(&mut self, frame: &[u8], _mode: RefreshMode) -> Result<(), DisplayError> {
        let expected = self.frame_len();
        if frame.len() != expected {
            return Err(DisplayError::BufferSizeMismatch { expected, actual: frame.len() });
        }
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(frame)?;
        self.file.flush()?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        let blank = vec![0u8; self.frame_len()];
        self.write_frame(&blank, RefreshMode::Full)
    }
}

/*
 *  metrics.rs
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  System load sampling for the rate controller
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
//! Reads the 1-minute load average and normalises it per core.

use std::fs;
use std::io;
use std::thread;

/// Snapshot of machine load.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct LoadSample {
    pub load_1m: f64,
    pub cores: usize,
}

impl LoadSample {
    /// Load average divided by the core count.
    pub fn per_core(&self) -> f64 {
        self.load_1m / self.cores.max(1) as f64
    }
}

pub struct LoadSampler {
    cores: usize,
}

impl Default for LoadSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadSampler {
    pub fn new() -> Self {
        let cores = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self { cores }
    }

    pub fn cores(&self) -> usize {
        self.cores
    }

    /// 1-minute load via getloadavg(3), falling back to /proc/loadavg.
    fn load_1m(&self) -> io::Result<f64> {
        let mut loads = [0f64; 3];
        // SAFETY: getloadavg writes at most `nelem` doubles into the buffer.
        let n = unsafe { libc::getloadavg(loads.as_mut_ptr(), 1) };
        if n >= 1 {
            return Ok(loads[0]);
        }
        let content = fs::read_to_string("/proc/loadavg")?;
        let first_word = content.split_whitespace().next().unwrap_or("0.0");
        first_word.parse::<f64>().map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn sample(&self) -> io::Result<LoadSample> {
        Ok(LoadSample { load_1m: self.load_1m()?, cores: self.cores })
    }
}

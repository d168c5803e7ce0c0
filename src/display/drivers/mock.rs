/*
 *  display/drivers/mock.rs
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Mock sink for tests and headless runs
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

use std::sync::Arc;

use parking_lot::Mutex;

use crate::display::error::DisplayError;
use crate::display::traits::{ColorDepth, DisplayCapabilities, DisplaySink, RefreshMode};

/// Mock display sink
///
/// Accepts frames without any hardware behind it. It's useful for:
/// - Unit and integration tests
/// - Running the binary without a panel attached
///
/// Every operation is recorded in a shared state that stays readable after
/// the sink has been moved into the render thread.
#[derive(Debug, Clone)]
pub struct MockSink {
    /// Display capabilities
    capabilities: DisplayCapabilities,

    /// Shared state for inspection
    state: Arc<Mutex<MockSinkState>>,
}

/// Internal state for the mock sink (shared for inspection in tests)
#[derive(Debug, Default)]
pub struct MockSinkState {
    /// Number of frames accepted
    pub write_count: usize,

    /// Number of frames pushed with a full refresh
    pub full_refresh_count: usize,

    /// Number of times clear() was called
    pub clear_count: usize,

    /// Total bytes written
    pub bytes_written: usize,

    /// Copy of the most recent frame
    pub last_frame: Option<Vec<u8>>,

    /// Simulate failures (for error testing)
    pub simulate_write_failure: bool,
}

impl MockSink {
    pub fn new(width: u32, height: u32, color_depth: ColorDepth) -> Self {
        Self::with_capabilities(DisplayCapabilities {
            width,
            height,
            color_depth,
            partial_refresh_budget: None,
        })
    }

    pub fn with_capabilities(capabilities: DisplayCapabilities) -> Self {
        Self { capabilities, state: Arc::new(Mutex::new(MockSinkState::default())) }
    }

    /// Get reference to state for inspection
    pub fn state(&self) -> Arc<Mutex<MockSinkState>> {
        Arc::clone(&self.state)
    }

    /// Reset state counters (useful between tests)
    pub fn reset_state(&self) {
        *self.state.lock() = MockSinkState::default();
    }
}

impl DisplaySink for MockSink {
    fn capabilities(&self) -> &DisplayCapabilities {
        &self.capabilities
    }

    fn write_frame(&mut self, frame: &[u8], mode: RefreshMode) -> Result<(), DisplayError> {
        let expected = self.capabilities.color_depth.frame_len(self.capabilities.width, self.capabilities.height);
        if frame.len() != expected {
            return Err(DisplayError::BufferSizeMismatch { expected, actual: frame.len() });
        }
        let mut state = self.state.lock();
        if state.simulate_write_failure {
            return Err(DisplayError::Other("simulated write failure".into()));
        }
        state.write_count += 1;
        if mode == RefreshMode::Full {
            state.full_refresh_count += 1;
        }
        state.bytes_written += frame.len();
        state.last_frame = Some(frame.to_vec());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        self.state.lock().clear_count += 1;
        Ok(())
    }
}

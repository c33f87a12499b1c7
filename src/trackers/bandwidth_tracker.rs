/*
 *  Copyright (c) 2024 The datagrump_cc authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree.
 */

use super::{SampleWindow, SampleWindowSettings};
use crate::Result;

/// Windowed maximum of delivery rate samples, in datagrams per millisecond.
#[derive(Debug, Clone)]
pub struct BandwidthTracker {
    window: SampleWindow<f64>,
}

impl Default for BandwidthTracker {
    fn default() -> Self {
        Self::new(SampleWindowSettings::with_horizon(Self::DEFAULT_HORIZON_MS))
    }
}

impl BandwidthTracker {
    pub const DEFAULT_HORIZON_MS: u64 = 200;

    pub fn new(settings: SampleWindowSettings) -> Self {
        Self {
            window: SampleWindow::new("bandwidth", settings),
        }
    }

    pub fn update(&mut self, now_ms: u64, bandwidth: f64) -> Result<()> {
        debug_assert!(bandwidth.is_finite() && bandwidth >= 0.0);
        self.window.push(now_ms, bandwidth)
    }

    pub fn max(&self) -> Result<f64> {
        self.window.max()
    }

    pub fn window_ms(&self) -> u64 {
        self.window.horizon_ms()
    }

    pub fn set_window_ms(&mut self, window_ms: u64) {
        self.window.set_horizon_ms(window_ms);
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

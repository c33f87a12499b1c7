/*
 *  Copyright (c) 2024 The datagrump_cc authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree.
 */

use super::PacingSettings;

// Probe-bandwidth style pacing gain cycle. The index advances by one
// table entry whenever more than one minimum RTT has passed since the last
// advance, wrapping around forever.
#[derive(Debug, Clone)]
pub struct PacingGainCycle {
    gains: Vec<f64>,
    index: usize,
    last_advance_ms: u64,
}

impl PacingGainCycle {
    pub fn new(mut gains: Vec<f64>) -> Self {
        if gains.is_empty() {
            tracing::warn!("Pacing gain table is empty, using a fixed gain");
            gains = vec![PacingSettings::DEFAULT_FIXED_GAIN];
        }
        Self {
            gains,
            index: 0,
            last_advance_ms: 0,
        }
    }

    /// Returns true if the cycle moved to the next gain.
    pub fn on_ack(&mut self, now_ms: u64, min_rtt_ms: u64) -> bool {
        if now_ms.saturating_sub(self.last_advance_ms) <= min_rtt_ms {
            return false;
        }
        self.index = (self.index + 1) % self.gains.len();
        self.last_advance_ms = now_ms;
        true
    }

    pub fn gain(&self) -> f64 {
        self.gains[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/*
 *  Copyright (c) 2024 The datagrump_cc authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree.
 */

use super::{Sample, SampleWindow, SampleWindowSettings};
use crate::{Error, Result};

// Ledger of cumulative delivered datagram counts indexed by the time they
// were observed. Used to answer "how much had been delivered when this
// datagram left", which turns an ack into a delivery rate sample.
#[derive(Debug, Clone)]
pub struct DeliveryTracker {
    window: SampleWindow<u64>,
    delivered: u64,
}

impl Default for DeliveryTracker {
    fn default() -> Self {
        Self::new(SampleWindowSettings::with_horizon(Self::DEFAULT_HORIZON_MS))
    }
}

impl DeliveryTracker {
    pub const DEFAULT_HORIZON_MS: u64 = 15_000;

    pub fn new(settings: SampleWindowSettings) -> Self {
        Self {
            window: SampleWindow::new("delivery", settings),
            delivered: 0,
        }
    }

    pub fn update(&mut self, now_ms: u64, delivered: u64) -> Result<()> {
        if delivered < self.delivered {
            return Err(Error::NonMonotonicDelivered {
                previous: self.delivered,
                current: delivered,
            });
        }
        self.window.upsert(now_ms, delivered)?;
        self.delivered = delivered;
        Ok(())
    }

    pub fn current_total(&self) -> u64 {
        self.delivered
    }

    /// The newest snapshot taken at or before `timestamp_ms`, or `None` when
    /// the ledger has nothing that old.
    pub fn delivered_as_of(&self, timestamp_ms: u64) -> Option<Sample<u64>> {
        self.window.at_or_before(timestamp_ms).copied()
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

/*
 *  Copyright (c) 2024 The datagrump_cc authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree.
 */

use super::{SampleWindow, SampleWindowSettings};
use crate::Result;

#[derive(Debug, Clone)]
pub struct RttTrackerSettings {
    pub window: SampleWindowSettings,

    // When set, `adjust_horizon` resizes the window to this multiple of the
    // minimum RTT.
    pub adaptive_horizon_multiplier: Option<u64>,
}

impl RttTrackerSettings {
    pub const DEFAULT_HORIZON_MS: u64 = 10_000;
    pub const DEFAULT_ADAPTIVE_MULTIPLIER: u64 = 100;

    pub fn adaptive() -> Self {
        Self {
            adaptive_horizon_multiplier: Some(Self::DEFAULT_ADAPTIVE_MULTIPLIER),
            ..Default::default()
        }
    }

    pub fn validate(&mut self) {
        self.window.validate();
        if self.adaptive_horizon_multiplier == Some(0) {
            tracing::warn!("Adaptive RTT horizon multiplier must be positive, disabling");
            self.adaptive_horizon_multiplier = None;
        }
    }
}

impl Default for RttTrackerSettings {
    fn default() -> Self {
        Self {
            window: SampleWindowSettings::with_horizon(Self::DEFAULT_HORIZON_MS),
            adaptive_horizon_multiplier: None,
        }
    }
}

/// Windowed minimum and latest RTT.
#[derive(Debug, Clone)]
pub struct RttTracker {
    window: SampleWindow<u64>,
    adaptive_horizon_multiplier: Option<u64>,
}

impl Default for RttTracker {
    fn default() -> Self {
        Self::new(RttTrackerSettings::default())
    }
}

impl RttTracker {
    // Reported by `last` until the first sample arrives.
    pub const LAST_RTT_FALLBACK_MS: u64 = 100;

    pub fn new(mut settings: RttTrackerSettings) -> Self {
        settings.validate();
        Self {
            window: SampleWindow::new("rtt", settings.window),
            adaptive_horizon_multiplier: settings.adaptive_horizon_multiplier,
        }
    }

    pub fn update(&mut self, now_ms: u64, rtt_ms: u64) -> Result<()> {
        self.window.push(now_ms, rtt_ms)
    }

    pub fn min(&self) -> Result<u64> {
        self.window.min()
    }

    pub fn last(&self) -> u64 {
        self.window
            .last()
            .map(|sample| sample.value)
            .unwrap_or(Self::LAST_RTT_FALLBACK_MS)
    }

    /// Applies the adaptive horizon for a freshly read minimum. A no-op when
    /// the tracker uses a fixed horizon.
    pub fn adjust_horizon(&mut self, min_rtt_ms: u64) {
        if let Some(multiplier) = self.adaptive_horizon_multiplier {
            // A 0 ms minimum would otherwise collapse the window to a single instant.
            let horizon_ms = multiplier.saturating_mul(min_rtt_ms.max(1));
            self.window.set_horizon_ms(horizon_ms);
        }
    }

    pub fn horizon_ms(&self) -> u64 {
        self.window.horizon_ms()
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

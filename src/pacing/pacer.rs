/*
 *  Copyright (c) 2024 The datagrump_cc authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree.
 */

use super::PacingGainCycle;

#[derive(Debug, Clone)]
pub struct PacingSettings {
    // Gain table walked by the cycle. A single entry is a fixed gain.
    pub gains: Vec<f64>,

    // Constant multiplier on the computed delay.
    pub damping: f64,

    // Weight of a new sample in the short-term smoothed rate.
    pub smoothed_rate_weight: f64,

    // Pace on the smoothed rate instead of the max bandwidth once it has
    // fallen more than this fraction below the max. `None` always paces on
    // the max bandwidth.
    pub rate_drop_threshold: Option<f64>,
}

impl PacingSettings {
    pub const PROBE_BW_GAINS: [f64; 5] = [0.8, 1.33, 1.0, 1.0, 1.0];
    pub(crate) const DEFAULT_FIXED_GAIN: f64 = 0.8;
    const DEFAULT_SMOOTHED_RATE_WEIGHT: f64 = 0.3;

    /// Fixed gain, paced on the max bandwidth.
    pub fn fixed() -> Self {
        Self {
            gains: vec![Self::DEFAULT_FIXED_GAIN],
            damping: 1.0,
            smoothed_rate_weight: Self::DEFAULT_SMOOTHED_RATE_WEIGHT,
            rate_drop_threshold: None,
        }
    }

    /// Cycling gain, paced on the more conservative of the max and smoothed rate.
    pub fn cycling() -> Self {
        Self {
            gains: Self::PROBE_BW_GAINS.to_vec(),
            damping: 0.9,
            smoothed_rate_weight: Self::DEFAULT_SMOOTHED_RATE_WEIGHT,
            rate_drop_threshold: Some(0.2),
        }
    }

    pub fn validate(&mut self) {
        if self.gains.is_empty() || self.gains.iter().any(|g| !(*g > 0.0)) {
            tracing::warn!(
                "Pacing gains must be a non-empty list of positive values, using a fixed gain"
            );
            self.gains = vec![Self::DEFAULT_FIXED_GAIN];
        }
        if !(self.damping > 0.0) {
            tracing::warn!("Pacing damping must be positive");
            self.damping = 1.0;
        }
        if !(self.smoothed_rate_weight > 0.0 && self.smoothed_rate_weight <= 1.0) {
            tracing::warn!("Smoothed rate weight must be in (0, 1]");
            self.smoothed_rate_weight = Self::DEFAULT_SMOOTHED_RATE_WEIGHT;
        }
        if let Some(threshold) = self.rate_drop_threshold {
            if !(0.0..1.0).contains(&threshold) {
                tracing::warn!("Rate drop threshold must be in [0, 1), disabling");
                self.rate_drop_threshold = None;
            }
        }
    }
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self::fixed()
    }
}

/// Computes the spacing between consecutive transmissions.
#[derive(Debug, Clone)]
pub struct Pacer {
    damping: f64,
    smoothed_rate_weight: f64,
    rate_drop_threshold: Option<f64>,
    cycle: PacingGainCycle,
    smoothed_rate: Option<f64>,
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(PacingSettings::default())
    }
}

impl Pacer {
    pub fn new(mut settings: PacingSettings) -> Self {
        settings.validate();
        Self {
            damping: settings.damping,
            smoothed_rate_weight: settings.smoothed_rate_weight,
            rate_drop_threshold: settings.rate_drop_threshold,
            cycle: PacingGainCycle::new(settings.gains),
            smoothed_rate: None,
        }
    }

    pub fn on_bandwidth_sample(&mut self, bandwidth: f64) {
        let weight = self.smoothed_rate_weight;
        self.smoothed_rate = Some(match self.smoothed_rate {
            Some(rate) => weight * bandwidth + (1.0 - weight) * rate,
            None => bandwidth,
        });
    }

    /// Returns true if the gain cycle advanced.
    pub fn on_ack(&mut self, now_ms: u64, min_rtt_ms: u64) -> bool {
        self.cycle.on_ack(now_ms, min_rtt_ms)
    }

    pub fn gain(&self) -> f64 {
        self.cycle.gain()
    }

    pub fn gain_index(&self) -> usize {
        self.cycle.index()
    }

    pub fn smoothed_rate(&self) -> Option<f64> {
        self.smoothed_rate
    }

    // The rate the delay is derived from, in datagrams per ms.
    pub fn pacing_rate(&self, max_bandwidth: f64) -> f64 {
        match (self.rate_drop_threshold, self.smoothed_rate) {
            (Some(threshold), Some(rate)) if rate < (1.0 - threshold) * max_bandwidth => rate,
            _ => max_bandwidth,
        }
    }

    /// `1 / rate * gain * 1000 * damping`. With the rate in datagrams per ms
    /// this is the inter-datagram gap in microseconds.
    pub fn inter_packet_delay_ms(&self, max_bandwidth: f64) -> f64 {
        let rate = self.pacing_rate(max_bandwidth);
        if !(rate > 0.0) {
            // No usable rate yet, don't hold back transmissions.
            return 0.0;
        }
        1.0 / rate * self.gain() * 1000.0 * self.damping
    }
}

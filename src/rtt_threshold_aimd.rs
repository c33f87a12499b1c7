/*
 *  Copyright (c) 2024 The datagrump_cc authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree.
 */

use crate::{Ack, CongestionControllerInterface, Result};

/// How hard the window backs off on an ack whose RTT is over the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggressiveness {
    // cwnd -= 1 / cwnd
    #[default]
    Gentle,
    // cwnd /= 2
    Aggressive,
}

#[derive(Debug, Clone)]
pub struct RttThresholdAimdSettings {
    pub debug: bool,
    pub initial_cwnd: f64,
    pub rtt_threshold_ms: u64,
    pub aggressiveness: Aggressiveness,
    pub min_cwnd: f64,
}

impl RttThresholdAimdSettings {
    pub const DEFAULT_RTT_THRESHOLD_MS: u64 = 500;

    pub fn validate(&mut self) {
        if !(self.min_cwnd >= 1.0) {
            tracing::warn!("Minimum window must be at least one datagram");
            self.min_cwnd = 3.0;
        }
        if self.rtt_threshold_ms == 0 {
            tracing::warn!(
                "RTT threshold must be positive, using {} ms",
                Self::DEFAULT_RTT_THRESHOLD_MS
            );
            self.rtt_threshold_ms = Self::DEFAULT_RTT_THRESHOLD_MS;
        }
        if !(self.initial_cwnd >= self.min_cwnd) {
            tracing::warn!(
                "Initial window {} is below the minimum {}",
                self.initial_cwnd,
                self.min_cwnd
            );
            self.initial_cwnd = self.min_cwnd;
        }
    }
}

impl Default for RttThresholdAimdSettings {
    fn default() -> Self {
        Self {
            debug: false,
            initial_cwnd: 50.0,
            rtt_threshold_ms: Self::DEFAULT_RTT_THRESHOLD_MS,
            aggressiveness: Aggressiveness::Gentle,
            min_cwnd: 3.0,
        }
    }
}

// Delay triggered AIMD: every ack with an RTT under the threshold grows the
// window by 1/cwnd, every ack over it shrinks the window.
pub struct RttThresholdAimd {
    settings: RttThresholdAimdSettings,
    cwnd: f64,
}

impl Default for RttThresholdAimd {
    fn default() -> Self {
        Self::new(RttThresholdAimdSettings::default())
    }
}

impl RttThresholdAimd {
    const TIMEOUT_MS: u32 = 1000;

    pub fn new(mut settings: RttThresholdAimdSettings) -> Self {
        settings.validate();
        tracing::info!("Using RTT threshold AIMD controller with settings {:?}", settings);
        Self {
            cwnd: settings.initial_cwnd,
            settings,
        }
    }

    pub fn cwnd(&self) -> f64 {
        self.cwnd
    }
}

impl CongestionControllerInterface for RttThresholdAimd {
    fn window_size(&self) -> u32 {
        let window_size = self.cwnd as u32;
        if self.settings.debug {
            tracing::debug!("window size is {}", window_size);
        }
        window_size
    }

    fn ack_received(&mut self, ack: &Ack) -> Result<()> {
        let rtt_ms = ack.rtt_ms()?;

        if rtt_ms < self.settings.rtt_threshold_ms {
            self.cwnd += 1.0 / self.cwnd;
        } else {
            match self.settings.aggressiveness {
                Aggressiveness::Gentle if self.cwnd > 1.0 => self.cwnd -= 1.0 / self.cwnd,
                Aggressiveness::Aggressive if self.cwnd >= 2.0 => self.cwnd /= 2.0,
                _ => {}
            }
            self.cwnd = self.cwnd.max(self.settings.min_cwnd);
        }

        if self.settings.debug {
            tracing::debug!(
                "At time {} received ack for datagram {} (send @ time {}, received @ time {} by receiver's clock), rtt {} ms, cwnd {}",
                ack.ack_received_ms,
                ack.sequence_number,
                ack.send_timestamp_ms,
                ack.recv_timestamp_ms,
                rtt_ms,
                self.cwnd
            );
        }
        Ok(())
    }

    fn timed_out(&mut self) {
        if self.cwnd > 1.0 {
            self.cwnd = (self.cwnd / 2.0).max(self.settings.min_cwnd);
        }

        if self.settings.debug {
            tracing::debug!("Timed out. cwnd: {}", self.cwnd);
        }
    }

    fn timeout_ms(&self) -> u32 {
        Self::TIMEOUT_MS
    }
}

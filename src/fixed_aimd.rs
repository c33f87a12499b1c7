/*
 *  Copyright (c) 2024 The datagrump_cc authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree.
 */

use crate::{Ack, CongestionControllerInterface, Result};

#[derive(Debug, Clone)]
pub struct FixedAimdSettings {
    pub debug: bool,
    pub initial_cwnd: f64,

    // Window growth per fully acknowledged window. Zero disables growth.
    pub increase: f64,

    // The window is divided by this on every timeout.
    pub decrease: f64,

    pub min_cwnd: f64,
}

impl FixedAimdSettings {
    pub const DEFAULT_INITIAL_CWND: f64 = 50.0;
    pub const DEFAULT_MIN_CWND: f64 = 3.0;

    pub fn validate(&mut self) {
        if !(self.min_cwnd >= 1.0) {
            tracing::warn!("Minimum window must be at least one datagram");
            self.min_cwnd = Self::DEFAULT_MIN_CWND;
        }
        if !(self.increase >= 0.0) {
            tracing::warn!("AIMD increase must not be negative, disabling growth");
            self.increase = 0.0;
        }
        if !(self.decrease >= 1.0) {
            tracing::warn!("AIMD decrease must be at least 1, disabling backoff");
            self.decrease = 1.0;
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

impl Default for FixedAimdSettings {
    fn default() -> Self {
        Self {
            debug: false,
            initial_cwnd: Self::DEFAULT_INITIAL_CWND,
            increase: 0.0,
            decrease: 1.0,
            min_cwnd: Self::DEFAULT_MIN_CWND,
        }
    }
}

// Classic additive increase, multiplicative decrease on timeout. Acks grow
// the window by `increase / cwnd`, which adds roughly `increase` per round
// trip once the whole window has been acknowledged.
pub struct FixedAimd {
    settings: FixedAimdSettings,
    cwnd: f64,
}

impl Default for FixedAimd {
    fn default() -> Self {
        Self::new(FixedAimdSettings::default())
    }
}

impl FixedAimd {
    const TIMEOUT_MS: u32 = 1000;

    pub fn new(mut settings: FixedAimdSettings) -> Self {
        settings.validate();
        tracing::info!("Using fixed AIMD controller with settings {:?}", settings);
        Self {
            cwnd: settings.initial_cwnd,
            settings,
        }
    }

    pub fn cwnd(&self) -> f64 {
        self.cwnd
    }
}

impl CongestionControllerInterface for FixedAimd {
    fn window_size(&self) -> u32 {
        let window_size = self.cwnd as u32;
        if self.settings.debug {
            tracing::debug!("window size is {}", window_size);
        }
        window_size
    }

    fn datagram_was_sent(&mut self, sequence_number: u64, send_timestamp_ms: u64) {
        if self.settings.debug {
            tracing::debug!(
                "At time {} sent datagram {}",
                send_timestamp_ms,
                sequence_number
            );
        }
    }

    fn ack_received(&mut self, ack: &Ack) -> Result<()> {
        self.cwnd += self.settings.increase / self.cwnd;

        if self.settings.debug {
            tracing::debug!(
                "At time {} received ack for datagram {} (send @ time {}, received @ time {} by receiver's clock), cwnd {}",
                ack.ack_received_ms,
                ack.sequence_number,
                ack.send_timestamp_ms,
                ack.recv_timestamp_ms,
                self.cwnd
            );
        }
        Ok(())
    }

    fn timed_out(&mut self) {
        if self.cwnd > 1.0 {
            self.cwnd = (self.cwnd / self.settings.decrease).max(self.settings.min_cwnd);
        }

        if self.settings.debug {
            tracing::debug!("Timed out. cwnd: {}", self.cwnd);
        }
    }

    fn timeout_ms(&self) -> u32 {
        Self::TIMEOUT_MS
    }
}

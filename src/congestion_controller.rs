/*
 *  Copyright (c) 2024 The datagrump_cc authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree.
 */

use crate::{
    BdpController, BdpControllerSettings, Error, FixedAimd, FixedAimdSettings, Result,
    RttThresholdAimd, RttThresholdAimdSettings,
};

/// An acknowledgment as reported by the transport loop.
///
/// All timestamps are milliseconds on the sender's clock, except
/// `recv_timestamp_ms` which comes from the receiver's clock and is only
/// carried for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ack {
    pub sequence_number: u64,
    pub send_timestamp_ms: u64,
    pub recv_timestamp_ms: u64,
    pub ack_received_ms: u64,
}

impl Ack {
    pub fn rtt_ms(&self) -> Result<u64> {
        self.ack_received_ms
            .checked_sub(self.send_timestamp_ms)
            .ok_or(Error::AckBeforeSend {
                send_ms: self.send_timestamp_ms,
                ack_ms: self.ack_received_ms,
            })
    }
}

// CongestionControllerInterface is implemented by every window controller.
// It is driven by a single flow's event loop and is not thread-safe; each
// flow owns its own instance.
pub trait CongestionControllerInterface {
    // Number of datagrams allowed in flight.
    fn window_size(&self) -> u32;

    // Called when a datagram leaves the sender.
    fn datagram_was_sent(&mut self, _sequence_number: u64, _send_timestamp_ms: u64) {}

    // Called for every acknowledgment. The only place estimates change.
    fn ack_received(&mut self, ack: &Ack) -> Result<()>;

    // Called when the retransmission timer fires.
    fn timed_out(&mut self);

    // How long to wait for an ack before `timed_out`.
    fn timeout_ms(&self) -> u32;

    // Minimum spacing between transmissions. Zero for unpaced controllers.
    //
    // Rates are tracked in datagrams per ms and the delay is scaled by 1000,
    // so the value is effectively in microseconds: a 0.1 datagram/ms path
    // paced at gain 0.8 returns 8000, i.e. 8 ms between datagrams.
    fn inter_packet_delay_ms(&self) -> f64 {
        0.0
    }
}

/// Selects a controller variant and its settings.
#[derive(Debug, Clone)]
pub enum ControllerConfig {
    FixedAimd(FixedAimdSettings),
    RttThresholdAimd(RttThresholdAimdSettings),
    BandwidthDelayProduct(BdpControllerSettings),
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::FixedAimd(FixedAimdSettings::default())
    }
}

impl ControllerConfig {
    pub fn create(self) -> Box<dyn CongestionControllerInterface> {
        match self {
            Self::FixedAimd(settings) => Box::new(FixedAimd::new(settings)),
            Self::RttThresholdAimd(settings) => Box::new(RttThresholdAimd::new(settings)),
            Self::BandwidthDelayProduct(settings) => Box::new(BdpController::new(settings)),
        }
    }
}

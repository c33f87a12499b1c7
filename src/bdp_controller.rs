/*
 *  Copyright (c) 2024 The datagrump_cc authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree.
 */

use crate::{
    pacing::{Pacer, PacingSettings},
    trackers::{
        BandwidthTracker, DeliveryTracker, RttTracker, RttTrackerSettings, SampleWindowSettings,
    },
    Ack, CongestionControllerInterface, Result,
};

/// Multiplier applied to the bandwidth-delay product.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GainRule {
    Fixed(f64),
    // 2.0 up to a 10 datagram window, then 1.6 + 0.4 * 10 / cwnd, so the
    // headroom shrinks as the window grows.
    Damped,
}

impl GainRule {
    const DAMPING_WINDOW: f64 = 10.0;

    pub fn gain(&self, cwnd: f64) -> f64 {
        match *self {
            Self::Fixed(gain) => gain,
            Self::Damped if cwnd <= Self::DAMPING_WINDOW => 2.0,
            Self::Damped => 1.6 + 0.4 * Self::DAMPING_WINDOW / cwnd,
        }
    }
}

/// How the window shrinks when the RTT sits above the minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InflationPenalty {
    // cwnd /= rtt / min_rtt
    Proportional,
    // cwnd /= exp(rtt / min_rtt - 1)
    Exponential,
}

impl InflationPenalty {
    pub fn divisor(&self, rtt_ratio: f64) -> f64 {
        match self {
            Self::Proportional => rtt_ratio,
            Self::Exponential => (rtt_ratio - 1.0).exp(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientPenalty {
    // Penalty applies once the smoothed gradient exceeds this.
    pub threshold: f64,
    // cwnd *= 1 - scale * gradient
    pub scale: f64,
}

impl Default for GradientPenalty {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            scale: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BdpControllerSettings {
    pub debug: bool,

    pub initial_cwnd: f64,
    pub min_cwnd: f64,

    // Used until the first ack provides real estimates.
    pub initial_min_rtt_ms: u64,
    pub initial_max_bandwidth: f64,

    // srtt = alpha * srtt + (1 - alpha) * rtt
    pub srtt_alpha: f64,
    // gradient = (1 - beta) * gradient + beta * sample
    pub gradient_beta: f64,

    pub gain: GainRule,

    pub inflation_penalty: InflationPenalty,
    // The inflation penalty applies when rtt > tolerance * min_rtt.
    pub inflation_tolerance: f64,

    pub gradient_penalty: Option<GradientPenalty>,

    // The bandwidth window spans this many minimum RTTs.
    pub bandwidth_window_rtts: u64,

    // Retransmission timeout as a multiple of the minimum RTT.
    pub timeout_multiplier: f64,

    pub pacing: PacingSettings,

    pub rtt_window: RttTrackerSettings,
    pub delivery_window: SampleWindowSettings,
    pub bandwidth_window: SampleWindowSettings,
}

impl BdpControllerSettings {
    /// Fixed gain with a proportional RTT penalty.
    pub fn baseline() -> Self {
        Self {
            debug: false,
            initial_cwnd: 50.0,
            min_cwnd: 3.0,
            initial_min_rtt_ms: 500,
            initial_max_bandwidth: 10.0,
            srtt_alpha: 0.8,
            gradient_beta: 0.7,
            gain: GainRule::Fixed(2.0),
            inflation_penalty: InflationPenalty::Proportional,
            inflation_tolerance: 1.0,
            gradient_penalty: None,
            bandwidth_window_rtts: 5,
            timeout_multiplier: 1.5,
            pacing: PacingSettings::fixed(),
            rtt_window: RttTrackerSettings::default(),
            delivery_window: SampleWindowSettings::with_horizon(
                DeliveryTracker::DEFAULT_HORIZON_MS,
            ),
            bandwidth_window: SampleWindowSettings::with_horizon(
                BandwidthTracker::DEFAULT_HORIZON_MS,
            ),
        }
    }

    /// Damped gain, exponential RTT penalty, gradient penalty, adaptive RTT
    /// horizon and a cycling pacing gain.
    pub fn advanced() -> Self {
        Self {
            initial_cwnd: 10.0,
            initial_min_rtt_ms: 50,
            initial_max_bandwidth: 1.0,
            gradient_beta: 0.5,
            gain: GainRule::Damped,
            inflation_penalty: InflationPenalty::Exponential,
            inflation_tolerance: 1.1,
            gradient_penalty: Some(GradientPenalty::default()),
            timeout_multiplier: 2.0,
            pacing: PacingSettings::cycling(),
            rtt_window: RttTrackerSettings::adaptive(),
            ..Self::baseline()
        }
    }

    pub fn validate(&mut self) {
        let defaults = Self::baseline();
        if !(self.min_cwnd >= 1.0) {
            tracing::warn!("Minimum window must be at least one datagram");
            self.min_cwnd = defaults.min_cwnd;
        }
        if !(self.initial_cwnd >= self.min_cwnd) {
            tracing::warn!(
                "Initial window {} is below the minimum {}",
                self.initial_cwnd,
                self.min_cwnd
            );
            self.initial_cwnd = self.min_cwnd;
        }
        if self.initial_min_rtt_ms == 0 {
            tracing::warn!("Initial minimum RTT must be positive");
            self.initial_min_rtt_ms = defaults.initial_min_rtt_ms;
        }
        if !(self.initial_max_bandwidth > 0.0 && self.initial_max_bandwidth.is_finite()) {
            tracing::warn!("Initial bandwidth must be positive");
            self.initial_max_bandwidth = defaults.initial_max_bandwidth;
        }
        if !(0.0..=1.0).contains(&self.srtt_alpha) {
            tracing::warn!("Smoothed RTT alpha must be between 0 and 1");
            self.srtt_alpha = defaults.srtt_alpha;
        }
        if !(0.0..=1.0).contains(&self.gradient_beta) {
            tracing::warn!("RTT gradient beta must be between 0 and 1");
            self.gradient_beta = defaults.gradient_beta;
        }
        if let GainRule::Fixed(gain) = self.gain {
            if !(gain > 0.0) {
                tracing::warn!("Window gain must be positive");
                self.gain = defaults.gain;
            }
        }
        if !(self.inflation_tolerance >= 1.0) {
            tracing::warn!("RTT inflation tolerance must be at least 1");
            self.inflation_tolerance = 1.0;
        }
        if self.bandwidth_window_rtts == 0 {
            tracing::warn!("Bandwidth window must span at least one RTT");
            self.bandwidth_window_rtts = defaults.bandwidth_window_rtts;
        }
        if !(self.timeout_multiplier > 0.0) {
            tracing::warn!("Timeout multiplier must be positive");
            self.timeout_multiplier = defaults.timeout_multiplier;
        }
    }
}

impl Default for BdpControllerSettings {
    fn default() -> Self {
        Self::baseline()
    }
}

// Bandwidth-delay product controller in the spirit of BBR. Every ack
// produces an RTT sample and a delivery rate sample; the window is a gain
// times max bandwidth times min RTT, penalized when the current RTT is
// inflated over the minimum or, optionally, when the RTT trend is rising.
// Timeouts leave the window alone.
pub struct BdpController {
    settings: BdpControllerSettings,

    cwnd: f64,
    min_rtt_ms: u64,
    srtt_ms: f64,
    rtt_gradient: f64,
    max_bandwidth: f64,
    bdp: f64,

    rtt_tracker: RttTracker,
    delivery_tracker: DeliveryTracker,
    bandwidth_tracker: BandwidthTracker,
    pacer: Pacer,
}

impl Default for BdpController {
    fn default() -> Self {
        Self::new(BdpControllerSettings::default())
    }
}

impl BdpController {
    pub fn new(mut settings: BdpControllerSettings) -> Self {
        settings.validate();
        tracing::info!(
            "Using bandwidth-delay product controller with settings {:?}",
            settings
        );
        Self {
            cwnd: settings.initial_cwnd,
            min_rtt_ms: settings.initial_min_rtt_ms,
            srtt_ms: settings.initial_min_rtt_ms as f64,
            rtt_gradient: 0.0,
            max_bandwidth: settings.initial_max_bandwidth,
            bdp: settings.initial_max_bandwidth * settings.initial_min_rtt_ms as f64,
            rtt_tracker: RttTracker::new(settings.rtt_window.clone()),
            delivery_tracker: DeliveryTracker::new(settings.delivery_window.clone()),
            bandwidth_tracker: BandwidthTracker::new(settings.bandwidth_window.clone()),
            pacer: Pacer::new(settings.pacing.clone()),
            settings,
        }
    }

    pub fn cwnd(&self) -> f64 {
        self.cwnd
    }

    pub fn min_rtt_ms(&self) -> u64 {
        self.min_rtt_ms
    }

    pub fn smoothed_rtt_ms(&self) -> f64 {
        self.srtt_ms
    }

    pub fn rtt_gradient(&self) -> f64 {
        self.rtt_gradient
    }

    /// Windowed max delivery rate, in datagrams per ms.
    pub fn max_bandwidth(&self) -> f64 {
        self.max_bandwidth
    }

    /// Bandwidth-delay product, in datagrams.
    pub fn bdp(&self) -> f64 {
        self.bdp
    }

    pub fn pacing_gain(&self) -> f64 {
        self.pacer.gain()
    }

    pub fn pacing_gain_index(&self) -> usize {
        self.pacer.gain_index()
    }

    pub fn bandwidth_window_ms(&self) -> u64 {
        self.bandwidth_tracker.window_ms()
    }

    pub fn rtt_horizon_ms(&self) -> u64 {
        self.rtt_tracker.horizon_ms()
    }

    // Delivery rate over the life of the acked datagram: everything delivered
    // since the newest snapshot taken at or before it was sent. `None` when
    // the ledger predates the send or the interval is empty.
    fn delivery_rate(&self, send_timestamp_ms: u64, now_ms: u64, delivered: u64) -> Option<f64> {
        let Some(at_send) = self.delivery_tracker.delivered_as_of(send_timestamp_ms) else {
            tracing::trace!("no delivery data at or before {} ms", send_timestamp_ms);
            return None;
        };
        let elapsed_ms = now_ms.saturating_sub(at_send.timestamp_ms);
        if elapsed_ms == 0 {
            tracing::trace!("zero delivery interval at {} ms", now_ms);
            return None;
        }
        Some((delivered - at_send.value) as f64 / elapsed_ms as f64)
    }

    fn update_window(&mut self, rtt_ms: u64) {
        let min_rtt_ms = self.min_rtt_ms as f64;

        self.bdp = self.max_bandwidth * min_rtt_ms;
        let gain = self.settings.gain.gain(self.cwnd);
        let mut cwnd = gain * self.bdp;

        if rtt_ms as f64 > self.settings.inflation_tolerance * min_rtt_ms {
            let rtt_ratio = rtt_ms as f64 / min_rtt_ms.max(1.0);
            cwnd /= self.settings.inflation_penalty.divisor(rtt_ratio);
        }

        // Both penalties can apply to the same ack and compound.
        if let Some(penalty) = self.settings.gradient_penalty {
            if self.rtt_gradient > penalty.threshold {
                cwnd *= 1.0 - penalty.scale * self.rtt_gradient;
            }
        }

        self.cwnd = cwnd.max(self.settings.min_cwnd);
    }
}

impl CongestionControllerInterface for BdpController {
    fn window_size(&self) -> u32 {
        let window_size = self.cwnd as u32;
        if self.settings.debug {
            tracing::debug!("window size is {}", window_size);
        }
        window_size
    }

    fn ack_received(&mut self, ack: &Ack) -> Result<()> {
        let now_ms = ack.ack_received_ms;
        let rtt_ms = ack.rtt_ms()?;

        let previous_rtt_ms = self.rtt_tracker.last();
        self.rtt_tracker.update(now_ms, rtt_ms)?;
        let min_rtt_ms = self.rtt_tracker.min()?;
        self.rtt_tracker.adjust_horizon(min_rtt_ms);
        self.min_rtt_ms = min_rtt_ms;

        let alpha = self.settings.srtt_alpha;
        self.srtt_ms = alpha * self.srtt_ms + (1.0 - alpha) * rtt_ms as f64;

        let beta = self.settings.gradient_beta;
        let gradient_sample =
            (rtt_ms as f64 - previous_rtt_ms as f64) / min_rtt_ms.max(1) as f64;
        self.rtt_gradient = (1.0 - beta) * self.rtt_gradient + beta * gradient_sample;

        let delivered = self.delivery_tracker.current_total() + 1;
        self.delivery_tracker.update(now_ms, delivered)?;

        let bandwidth = self.delivery_rate(ack.send_timestamp_ms, now_ms, delivered);
        if let Some(bandwidth) = bandwidth {
            self.bandwidth_tracker.update(now_ms, bandwidth)?;
            self.pacer.on_bandwidth_sample(bandwidth);
        }
        // Until the first delivery rate sample the seeded bandwidth says
        // nothing about this path, so the window holds.
        if !self.bandwidth_tracker.is_empty() {
            self.max_bandwidth = self.bandwidth_tracker.max()?;
            self.update_window(rtt_ms);
        }

        self.bandwidth_tracker
            .set_window_ms(self.settings.bandwidth_window_rtts.saturating_mul(min_rtt_ms));
        if self.pacer.on_ack(now_ms, min_rtt_ms) {
            tracing::trace!(
                "pacing gain {} (index {})",
                self.pacer.gain(),
                self.pacer.gain_index()
            );
        }

        if self.settings.debug {
            tracing::debug!(
                "At time {} received ack for datagram {} (send @ time {}, received @ time {} by receiver's clock), bw_t {:?} pkts/ms, rtt {} ms, srtt {:.1} ms, gradient {:.3}, max_bw {} pkts/ms, min_rtt {} ms, bdp {} pkts, cwnd {}",
                now_ms,
                ack.sequence_number,
                ack.send_timestamp_ms,
                ack.recv_timestamp_ms,
                bandwidth,
                rtt_ms,
                self.srtt_ms,
                self.rtt_gradient,
                self.max_bandwidth,
                self.min_rtt_ms,
                self.bdp,
                self.cwnd
            );
        }
        Ok(())
    }

    fn timed_out(&mut self) {
        if self.settings.debug {
            tracing::debug!("Timed out. cwnd: {}", self.cwnd);
        }
    }

    fn timeout_ms(&self) -> u32 {
        (self.settings.timeout_multiplier * self.min_rtt_ms as f64).max(1.0) as u32
    }

    fn inter_packet_delay_ms(&self) -> f64 {
        self.pacer.inter_packet_delay_ms(self.max_bandwidth)
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;
    use test_trace::test;

    use super::*;

    // Synthetic path: one datagram acked every `spacing_ms`, each with the
    // RTT returned by `rtt_ms(i)`.
    struct AckStream<F: Fn(u64) -> u64> {
        start_ms: u64,
        spacing_ms: u64,
        rtt_ms: F,
        count: u64,
    }

    impl<F: Fn(u64) -> u64> AckStream<F> {
        fn new(start_ms: u64, spacing_ms: u64, rtt_ms: F) -> Self {
            Self {
                start_ms,
                spacing_ms,
                rtt_ms,
                count: 0,
            }
        }
    }

    impl<F: Fn(u64) -> u64> Iterator for AckStream<F> {
        type Item = Ack;

        fn next(&mut self) -> Option<Self::Item> {
            let i = self.count;
            self.count += 1;
            let send_timestamp_ms = self.start_ms + i * self.spacing_ms;
            let rtt_ms = (self.rtt_ms)(i);
            Some(Ack {
                sequence_number: i,
                send_timestamp_ms,
                recv_timestamp_ms: send_timestamp_ms + rtt_ms / 2,
                ack_received_ms: send_timestamp_ms + rtt_ms,
            })
        }
    }

    fn run(controller: &mut BdpController, acks: impl Iterator<Item = Ack>) {
        for ack in acks {
            controller.ack_received(&ack).unwrap();
            assert!(controller.cwnd() >= 3.0);
        }
    }

    #[test]
    fn gain_rules() {
        assert_eq!(GainRule::Fixed(2.5).gain(100.0), 2.5);
        assert_eq!(GainRule::Damped.gain(3.0), 2.0);
        assert_eq!(GainRule::Damped.gain(10.0), 2.0);
        assert_relative_eq!(GainRule::Damped.gain(20.0), 1.8);
        assert_relative_eq!(GainRule::Damped.gain(1000.0), 1.604);
    }

    #[test]
    fn inflation_penalties() {
        assert_relative_eq!(InflationPenalty::Proportional.divisor(2.0), 2.0);
        assert_relative_eq!(InflationPenalty::Exponential.divisor(1.0), 1.0);
        assert_relative_eq!(InflationPenalty::Exponential.divisor(2.0), std::f64::consts::E);
    }

    #[test]
    fn initial_state() {
        let controller = BdpController::default();
        assert_eq!(controller.window_size(), 50);
        assert_eq!(controller.min_rtt_ms(), 500);
        assert_eq!(controller.timeout_ms(), 750);
        assert_relative_eq!(controller.inter_packet_delay_ms(), 1.0 / 10.0 * 0.8 * 1000.0);

        let controller = BdpController::new(BdpControllerSettings::advanced());
        assert_eq!(controller.window_size(), 10);
        assert_eq!(controller.timeout_ms(), 100);
        assert_eq!(controller.pacing_gain_index(), 0);
    }

    #[test]
    fn first_ack_skips_bandwidth_sample() {
        let mut controller = BdpController::default();
        let ack = Ack {
            sequence_number: 0,
            send_timestamp_ms: 1000,
            recv_timestamp_ms: 0,
            ack_received_ms: 1050,
        };
        controller.ack_received(&ack).unwrap();

        // No delivery data predates the send, so the seeded estimate stands
        // and the window is not derived from it.
        assert!(controller.bandwidth_tracker.is_empty());
        assert_relative_eq!(controller.max_bandwidth(), 10.0);
        assert_eq!(controller.min_rtt_ms(), 50);
        assert_relative_eq!(controller.cwnd(), 50.0);
        assert_eq!(controller.bandwidth_window_ms(), 250);
        assert_eq!(controller.timeout_ms(), 75);
    }

    #[test]
    fn window_holds_until_first_bandwidth_sample() {
        for (settings, initial_cwnd) in [
            (BdpControllerSettings::baseline(), 50.0),
            (BdpControllerSettings::advanced(), 10.0),
        ] {
            let mut controller = BdpController::new(settings);
            let mut acks = AckStream::new(0, 10, |_| 50);

            // Acks 0..5 were all sent before the ledger's first snapshot.
            for _ in 0..5 {
                controller.ack_received(&acks.next().unwrap()).unwrap();
                assert!(controller.bandwidth_tracker.is_empty());
                assert_eq!(controller.min_rtt_ms(), 50);
                assert_relative_eq!(controller.cwnd(), initial_cwnd);
            }

            // (6 - 1) datagrams over 50 ms.
            controller.ack_received(&acks.next().unwrap()).unwrap();
            assert_relative_eq!(controller.max_bandwidth(), 0.1, epsilon = 1e-9);
            assert_relative_eq!(controller.bdp(), 5.0, epsilon = 1e-9);
            assert_relative_eq!(controller.cwnd(), 10.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn zero_interval_skips_bandwidth_sample() {
        let mut controller = BdpController::default();
        let ack = |sequence_number, send_timestamp_ms, ack_received_ms| Ack {
            sequence_number,
            send_timestamp_ms,
            recv_timestamp_ms: 0,
            ack_received_ms,
        };
        controller.ack_received(&ack(0, 900, 1000)).unwrap();
        // Sent and acked in the same ms as the only snapshot.
        controller.ack_received(&ack(1, 1000, 1000)).unwrap();
        assert!(controller.bandwidth_tracker.is_empty());
        assert!(controller.max_bandwidth().is_finite());
        assert_eq!(controller.min_rtt_ms(), 0);
        assert_eq!(controller.timeout_ms(), 1);
        assert_eq!(controller.window_size(), 50);
    }

    #[test]
    fn converges_on_constant_path() {
        let mut controller = BdpController::default();
        // 100 datagrams, one every 10 ms, all with a 50 ms RTT.
        run(&mut controller, AckStream::new(0, 10, |_| 50).take(100));

        assert_eq!(controller.min_rtt_ms(), 50);
        assert_relative_eq!(controller.max_bandwidth(), 0.1, epsilon = 1e-9);
        assert_relative_eq!(controller.bdp(), 5.0, epsilon = 1e-6);
        assert_relative_eq!(controller.cwnd(), 2.0 * 5.0, epsilon = 1e-6);
        assert!((9..=10).contains(&controller.window_size()));
        assert_relative_eq!(controller.smoothed_rtt_ms(), 50.0, epsilon = 1e-6);
        assert_eq!(controller.timeout_ms(), 75);
        assert_eq!(controller.bandwidth_window_ms(), 250);
        assert_relative_eq!(controller.inter_packet_delay_ms(), 8000.0, epsilon = 1e-3);
    }

    #[test]
    fn floor_applies_when_bdp_is_tiny() {
        let mut controller = BdpController::default();
        // One datagram every 100 ms with a 10 ms RTT: bdp = 0.1.
        run(&mut controller, AckStream::new(0, 100, |_| 10).take(50));
        assert_relative_eq!(controller.bdp(), 0.1, epsilon = 1e-9);
        assert_relative_eq!(controller.cwnd(), 3.0);
        assert_eq!(controller.window_size(), 3);
    }

    #[test]
    fn proportional_penalty_on_inflated_rtt() {
        let mut controller = BdpController::default();
        run(&mut controller, AckStream::new(0, 10, |_| 50).take(100));
        let max_bandwidth = controller.max_bandwidth();

        // The RTT doubles on the next ack.
        let ack = Ack {
            sequence_number: 100,
            send_timestamp_ms: 1000,
            recv_timestamp_ms: 0,
            ack_received_ms: 1100,
        };
        controller.ack_received(&ack).unwrap();
        assert_eq!(controller.min_rtt_ms(), 50);
        let expected = 2.0 * controller.max_bandwidth() * 50.0 / 2.0;
        assert!(controller.max_bandwidth() >= max_bandwidth);
        assert_relative_eq!(controller.cwnd(), expected.max(3.0), epsilon = 1e-9);
    }

    #[test]
    fn timeout_leaves_window_alone() {
        let mut controller = BdpController::default();
        run(&mut controller, AckStream::new(0, 10, |_| 50).take(100));
        let cwnd = controller.cwnd();
        let timeout_ms = controller.timeout_ms();
        for _ in 0..10 {
            controller.timed_out();
        }
        assert_eq!(controller.cwnd(), cwnd);
        assert_eq!(controller.timeout_ms(), timeout_ms);
        assert_eq!(controller.min_rtt_ms(), 50);
    }

    #[test]
    fn bandwidth_window_tracks_min_rtt() {
        let mut controller = BdpController::default();
        assert_eq!(controller.bandwidth_window_ms(), 200);
        run(&mut controller, AckStream::new(0, 10, |_| 80).take(3));
        assert_eq!(controller.bandwidth_window_ms(), 400);
        run(&mut controller, AckStream::new(100, 10, |_| 30).take(1));
        assert_eq!(controller.bandwidth_window_ms(), 150);
    }

    #[test]
    fn smoothed_rtt_and_gradient() {
        let mut controller = BdpController::default();
        run(&mut controller, AckStream::new(0, 10, |_| 100).take(1));
        // srtt starts at the seeded 500 ms.
        assert_relative_eq!(controller.smoothed_rtt_ms(), 0.8 * 500.0 + 0.2 * 100.0);
        // previous RTT falls back to 100 ms, so the first gradient sample is 0.
        assert_relative_eq!(controller.rtt_gradient(), 0.0);

        run(&mut controller, AckStream::new(10, 10, |_| 150).take(1));
        // (150 - 100) / 100 = 0.5, beta 0.7
        assert_relative_eq!(controller.rtt_gradient(), 0.35, epsilon = 1e-12);
    }

    #[test]
    fn advanced_converges_on_constant_path() {
        let mut controller = BdpController::new(BdpControllerSettings::advanced());
        run(&mut controller, AckStream::new(0, 10, |_| 50).take(100));

        assert_eq!(controller.min_rtt_ms(), 50);
        assert_relative_eq!(controller.max_bandwidth(), 0.1, epsilon = 1e-9);
        assert_relative_eq!(controller.bdp(), 5.0, epsilon = 1e-6);
        // Window stays under the damping knee, so the gain is 2.
        assert_relative_eq!(controller.cwnd(), 10.0, epsilon = 1e-6);
        assert_eq!(controller.timeout_ms(), 100);
        assert_eq!(controller.rtt_horizon_ms(), 5000);
        assert!(controller.rtt_gradient() <= 0.0);
    }

    #[test]
    fn advanced_pacing_cycles_gain() {
        let mut controller = BdpController::new(BdpControllerSettings::advanced());
        let mut seen = [false; 5];
        let mut acks = AckStream::new(0, 10, |_| 50);
        for _ in 0..200 {
            controller.ack_received(&acks.next().unwrap()).unwrap();
            seen[controller.pacing_gain_index()] = true;
            let delay = controller.inter_packet_delay_ms();
            let expected = 1.0 / controller.max_bandwidth()
                * controller.pacing_gain()
                * 1000.0
                * 0.9;
            assert_relative_eq!(delay, expected, epsilon = 1e-6);
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn advanced_paces_on_smoothed_rate_after_bandwidth_drop() {
        let mut controller = BdpController::new(BdpControllerSettings::advanced());
        run(&mut controller, AckStream::new(0, 10, |_| 50).take(100));
        // Path slows to one ack every 40 ms; the max still remembers 0.1.
        run(&mut controller, AckStream::new(1000, 40, |_| 50).take(4));
        assert_relative_eq!(controller.max_bandwidth(), 0.1, epsilon = 1e-9);
        let smoothed = controller.pacer.smoothed_rate().unwrap();
        assert!(smoothed < 0.08);
        assert_relative_eq!(
            controller.inter_packet_delay_ms(),
            1.0 / smoothed * controller.pacing_gain() * 1000.0 * 0.9,
            epsilon = 1e-6
        );
    }

    #[test]
    fn advanced_exponential_penalty() {
        let mut settings = BdpControllerSettings::advanced();
        settings.gradient_penalty = None;
        let mut controller = BdpController::new(settings);
        run(&mut controller, AckStream::new(0, 10, |_| 50).take(100));

        // 54 ms is within the 10% tolerance.
        run(&mut controller, AckStream::new(1000, 10, |_| 54).take(1));
        let unpenalized = controller.cwnd();
        assert!(unpenalized > 9.0);

        run(&mut controller, AckStream::new(1010, 10, |_| 100).take(1));
        let bdp = controller.bdp();
        let gain = GainRule::Damped.gain(unpenalized);
        assert_relative_eq!(
            controller.cwnd(),
            (gain * bdp / 1.0f64.exp()).max(3.0),
            epsilon = 1e-9
        );
    }

    // Both the inflation and gradient penalties trip on a sudden RTT rise and
    // they compound. This is aggressive, but it is the intended control law.
    #[test]
    fn advanced_penalties_compound() {
        let mut settings = BdpControllerSettings::advanced();
        settings.initial_cwnd = 10.0;
        let mut with_gradient = BdpController::new(settings.clone());
        settings.gradient_penalty = None;
        let mut without_gradient = BdpController::new(settings);

        for controller in [&mut with_gradient, &mut without_gradient] {
            run(controller, AckStream::new(0, 10, |_| 50).take(100));
            run(controller, AckStream::new(1000, 10, |_| 70).take(1));
        }

        assert!(with_gradient.rtt_gradient() > 0.1);
        let gradient = with_gradient.rtt_gradient();
        assert_relative_eq!(
            with_gradient.cwnd(),
            (without_gradient.cwnd() * (1.0 - gradient)).max(3.0),
            epsilon = 1e-9
        );
        assert!(with_gradient.cwnd() < without_gradient.cwnd());
    }

    #[test]
    fn rejects_out_of_order_acks() {
        let mut controller = BdpController::default();
        run(&mut controller, AckStream::new(1000, 10, |_| 50).take(5));
        let stale = Ack {
            sequence_number: 99,
            send_timestamp_ms: 0,
            recv_timestamp_ms: 0,
            ack_received_ms: 10,
        };
        assert!(controller.ack_received(&stale).is_err());
    }

    #[test]
    fn invalid_settings_are_reset() {
        let mut settings = BdpControllerSettings {
            min_cwnd: 0.0,
            initial_min_rtt_ms: 0,
            initial_max_bandwidth: f64::NAN,
            srtt_alpha: 1.5,
            gradient_beta: -0.1,
            gain: GainRule::Fixed(0.0),
            inflation_tolerance: 0.5,
            bandwidth_window_rtts: 0,
            timeout_multiplier: 0.0,
            ..BdpControllerSettings::baseline()
        };
        settings.validate();
        assert_eq!(settings.min_cwnd, 3.0);
        assert_eq!(settings.initial_min_rtt_ms, 500);
        assert_eq!(settings.initial_max_bandwidth, 10.0);
        assert_eq!(settings.srtt_alpha, 0.8);
        assert_eq!(settings.gradient_beta, 0.7);
        assert_eq!(settings.gain, GainRule::Fixed(2.0));
        assert_eq!(settings.inflation_tolerance, 1.0);
        assert_eq!(settings.bandwidth_window_rtts, 5);
        assert_eq!(settings.timeout_multiplier, 1.5);
    }
}

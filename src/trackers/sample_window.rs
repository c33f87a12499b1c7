/*
 *  Copyright (c) 2024 The datagrump_cc authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree.
 */

use std::collections::VecDeque;

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct SampleWindowSettings {
    // Samples older than `now - horizon_ms` are dropped on every insert.
    pub horizon_ms: u64,

    // Hard cap on retained samples. The horizon is time based, so a very
    // high ack rate over a long horizon would otherwise grow without bound.
    pub max_samples: usize,
}

impl SampleWindowSettings {
    pub const DEFAULT_MAX_SAMPLES: usize = 1 << 16;

    pub fn with_horizon(horizon_ms: u64) -> Self {
        Self {
            horizon_ms,
            max_samples: Self::DEFAULT_MAX_SAMPLES,
        }
    }

    pub fn validate(&mut self) {
        if self.max_samples == 0 {
            tracing::warn!(
                "Sample window must retain at least one sample, using {}",
                Self::DEFAULT_MAX_SAMPLES
            );
            self.max_samples = Self::DEFAULT_MAX_SAMPLES;
        }
    }
}

/// A single timestamped observation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sample<T> {
    pub timestamp_ms: u64,
    pub value: T,
}

impl<T> Sample<T> {
    pub fn new(timestamp_ms: u64, value: T) -> Self {
        Self {
            timestamp_ms,
            value,
        }
    }
}

/// Time bounded store of samples ordered by timestamp.
///
/// Timestamps must be non-decreasing. After every insert the window only
/// holds samples with `timestamp_ms >= now - horizon_ms`.
#[derive(Debug, Clone)]
pub struct SampleWindow<T> {
    name: &'static str,
    settings: SampleWindowSettings,
    samples: VecDeque<Sample<T>>,
}

impl<T: Copy + PartialOrd> SampleWindow<T> {
    pub fn new(name: &'static str, mut settings: SampleWindowSettings) -> Self {
        settings.validate();
        Self {
            name,
            settings,
            samples: VecDeque::new(),
        }
    }

    pub fn push(&mut self, now_ms: u64, value: T) -> Result<()> {
        self.check_order(now_ms)?;
        self.samples.push_back(Sample::new(now_ms, value));
        self.prune(now_ms);
        Ok(())
    }

    /// Like [push](Self::push), but overwrites the newest sample instead of
    /// appending when it carries the same timestamp.
    pub fn upsert(&mut self, now_ms: u64, value: T) -> Result<()> {
        self.check_order(now_ms)?;
        match self.samples.back_mut() {
            Some(last) if last.timestamp_ms == now_ms => last.value = value,
            _ => self.samples.push_back(Sample::new(now_ms, value)),
        }
        self.prune(now_ms);
        Ok(())
    }

    pub fn min(&self) -> Result<T> {
        self.fold(|best, value| value < best)
    }

    pub fn max(&self) -> Result<T> {
        self.fold(|best, value| value > best)
    }

    pub fn last(&self) -> Option<&Sample<T>> {
        self.samples.back()
    }

    /// The newest sample whose timestamp is `<= timestamp_ms`.
    pub fn at_or_before(&self, timestamp_ms: u64) -> Option<&Sample<T>> {
        let upper = self
            .samples
            .partition_point(|sample| sample.timestamp_ms <= timestamp_ms);
        upper.checked_sub(1).and_then(|i| self.samples.get(i))
    }

    pub fn horizon_ms(&self) -> u64 {
        self.settings.horizon_ms
    }

    // Takes effect on the next insert.
    pub fn set_horizon_ms(&mut self, horizon_ms: u64) {
        self.settings.horizon_ms = horizon_ms;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample<T>> {
        self.samples.iter()
    }

    fn fold(&self, better: impl Fn(T, T) -> bool) -> Result<T> {
        let mut iter = self.samples.iter();
        let first = iter.next().ok_or(Error::EmptyWindow(self.name))?;
        Ok(iter.fold(first.value, |best, sample| {
            if better(best, sample.value) {
                sample.value
            } else {
                best
            }
        }))
    }

    fn check_order(&self, now_ms: u64) -> Result<()> {
        match self.samples.back() {
            Some(last) if now_ms < last.timestamp_ms => Err(Error::OutOfOrderSample {
                latest_ms: last.timestamp_ms,
                now_ms,
            }),
            _ => Ok(()),
        }
    }

    fn prune(&mut self, now_ms: u64) {
        let cutoff = now_ms.saturating_sub(self.settings.horizon_ms);
        while let Some(front) = self.samples.front() {
            if front.timestamp_ms >= cutoff {
                break;
            }
            self.samples.pop_front();
        }

        if self.samples.len() > self.settings.max_samples {
            let excess = self.samples.len() - self.settings.max_samples;
            tracing::trace!("{} window over capacity, dropping {} samples", self.name, excess);
            self.samples.drain(..excess);
        }
    }
}

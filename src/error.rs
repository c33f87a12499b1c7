/*
 *  Copyright (c) 2024 The datagrump_cc authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree.
 */

/// Contract violations reported by the trackers and controllers.
///
/// These all indicate an ordering bug in the transport loop feeding the
/// controller. None of them are expected on a correctly driven flow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("delivered count went backwards: {previous} -> {current}")]
    NonMonotonicDelivered { previous: u64, current: u64 },

    #[error("sample at {now_ms} ms is older than the newest sample at {latest_ms} ms")]
    OutOfOrderSample { latest_ms: u64, now_ms: u64 },

    #[error("{0} window is empty")]
    EmptyWindow(&'static str),

    #[error("ack received at {ack_ms} ms for a datagram sent at {send_ms} ms")]
    AckBeforeSend { send_ms: u64, ack_ms: u64 },
}

pub type Result<T> = std::result::Result<T, Error>;

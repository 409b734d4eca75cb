// SPDX-License-Identifier: Apache-2.0

//! New Reno congestion control, plus the slow start and additive increase
//! primitives it shares with CUBIC.

use crate::congestion::{CongestionController, ConnectionState};
use core::cmp::max;

/// Standard TCP slow start: the window grows by the number of packets acked,
/// capped one past the slow start threshold. Growth is per segment rather
/// than per ACK, so cumulative and coalesced ACKs grow the window correctly
/// in a single call.
pub fn slow_start(conn: &mut ConnectionState, acked: u32) {
    let cwnd = conn.cwnd.saturating_add(acked);

    conn.cwnd = if cwnd > conn.ssthresh {
        conn.ssthresh.saturating_add(1)
    } else {
        cwnd
    };
}

/// Additive increase pacing: once `target` ACKs have accumulated, bump the
/// window by one and restart the count. Reno passes `cwnd` as the target;
/// CUBIC passes its computed growth divisor.
pub fn cong_avoid_ai(conn: &mut ConnectionState, target: u32) {
    if conn.cwnd_cnt >= target {
        conn.cwnd += 1;
        conn.cwnd_cnt = 0;
    } else {
        conn.cwnd_cnt += 1;
    }
}

/// Halve the window on loss, never below two packets.
pub fn ssthresh(cwnd: u32) -> u32 {
    max(cwnd >> 1, 2)
}

/// New Reno: slow start at or below the threshold, linear additive increase
/// above it. Carries no per-connection state of its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Reno;

impl CongestionController for Reno {
    fn ssthresh(&mut self, conn: &ConnectionState) -> u32 {
        ssthresh(conn.cwnd)
    }

    fn on_ack(&mut self, conn: &mut ConnectionState, _ack: u32, acked: u32, _now: u32) {
        if !conn.is_cwnd_limited {
            return;
        }

        if conn.cwnd <= conn.ssthresh {
            slow_start(conn, acked);
        } else {
            cong_avoid_ai(conn, conn.cwnd);
        }
    }
}

// SPDX-License-Identifier: Apache-2.0

//! Hybrid Slow Start, as described in "Hybrid Slow Start for High-Bandwidth
//! and Long-Distance Networks" (Ha, Rhee). Owned by the CUBIC controller and
//! fed one delay sample per acknowledged segment while the connection is in
//! slow start.
//!
//! Two independent heuristics detect that the pipe is close to full before a
//! loss does: a train of tightly spaced ACKs stretching over half the minimum
//! RTT, and an increase of the per-round minimum RTT over the path minimum.
//! Either one exits slow start by setting `ssthresh` to the current window.

use crate::{
    congestion::{Config, ConnectionState},
    time::millis_elapsed,
};
use log::trace;

/// Consecutive ACK spacing stayed tight for half the minimum RTT.
pub(crate) const ACK_TRAIN: u8 = 0x1;
/// The round's minimum RTT rose past the delay threshold.
pub(crate) const DELAY: u8 = 0x2;

/// Delay samples collected per round before the increase check runs.
const MIN_SAMPLES: u8 = 8;

/// Per-round bookkeeping for the slow start exit detection. All delay values
/// are in 1/8-ms units, timestamps in wrapping milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct HybridSlowStart {
    /// Exit conditions found so far; monotonic within a loss epoch, cleared
    /// only by the full reset on loss.
    pub(crate) found: u8,
    /// When the current slow start round began.
    pub(crate) round_start: u32,
    /// Sequence number ending the current round.
    pub(crate) end_seq: u32,
    /// Last time the ACK spacing was close.
    pub(crate) last_ack: u32,
    /// Minimum RTT observed in the current round.
    pub(crate) curr_rtt: u32,
    /// Delay samples folded into `curr_rtt` so far.
    pub(crate) sample_cnt: u8,
}

impl HybridSlowStart {
    /// Starts a new detection round. The `found` flags deliberately survive;
    /// only a loss invalidates them.
    pub(crate) fn reset_round(&mut self, snd_nxt: u32, now: u32) {
        self.round_start = now;
        self.last_ack = now;
        self.end_seq = snd_nxt;
        self.curr_rtt = 0;
        self.sample_cnt = 0;
    }

    pub(crate) fn clear_found(&mut self) {
        self.found = 0;
    }

    /// Feeds one delay sample (1/8-ms units). `delay_min` is the connection's
    /// minimum observed delay. Sets `ssthresh = cwnd` when an exit condition
    /// fires, which makes the caller's next avoidance check leave slow start.
    pub(crate) fn update(
        &mut self,
        conn: &mut ConnectionState,
        delay: u32,
        delay_min: u32,
        config: &Config,
        now: u32,
    ) {
        if self.found & (ACK_TRAIN | DELAY) != 0 {
            return;
        }

        // Only a tightly spaced ACK extends the current train
        if millis_elapsed(now, self.last_ack) <= config.hystart_ack_delta as i32 {
            self.last_ack = now;
            // A train stretching over half the minimum RTT means the window
            // already covers the pipe
            if millis_elapsed(now, self.round_start) > (delay_min >> 4) as i32 {
                self.found |= ACK_TRAIN;
            }
        }

        if self.sample_cnt < MIN_SAMPLES {
            if self.curr_rtt == 0 || self.curr_rtt > delay {
                self.curr_rtt = delay;
            }
            self.sample_cnt += 1;
        } else if self.curr_rtt > delay_min + delay_threshold(delay_min, config) {
            self.found |= DELAY;
        }

        if self.found & (ACK_TRAIN | DELAY) != 0 {
            trace!(
                "hystart exit: found={:#x} cwnd={} curr_rtt={} delay_min={}",
                self.found,
                conn.cwnd,
                self.curr_rtt,
                delay_min
            );
            conn.ssthresh = conn.cwnd;
        }
    }
}

/// How much the round's minimum RTT may exceed the path minimum before the
/// delay heuristic fires: one sixteenth of the minimum, clamped.
fn delay_threshold(delay_min: u32, config: &Config) -> u32 {
    (delay_min >> 4).clamp(config.hystart_delay_min, config.hystart_delay_max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (HybridSlowStart, ConnectionState, Config) {
        let mut hystart = HybridSlowStart::default();
        hystart.reset_round(5_000, 100);
        let mut conn = ConnectionState::new(32, 1_000);
        conn.snd_nxt = 5_000;
        (hystart, conn, Config::default())
    }

    #[test]
    fn threshold_clamps() {
        let config = Config::default();
        // delay_min of 400 (50ms): 400 >> 4 = 25, clamped up to 4ms
        assert_eq!(delay_threshold(400, &config), 32);
        // 2048 >> 4 = 128 sits exactly at the upper clamp
        assert_eq!(delay_threshold(2048, &config), 128);
        assert_eq!(delay_threshold(40_000, &config), 128);
    }

    #[test]
    fn round_reset_keeps_found() {
        let (mut hystart, _, _) = setup();
        hystart.found = ACK_TRAIN;
        hystart.curr_rtt = 77;
        hystart.sample_cnt = 5;

        hystart.reset_round(9_000, 250);

        assert_eq!(hystart.found, ACK_TRAIN);
        assert_eq!(hystart.round_start, 250);
        assert_eq!(hystart.last_ack, 250);
        assert_eq!(hystart.end_seq, 9_000);
        assert_eq!(hystart.curr_rtt, 0);
        assert_eq!(hystart.sample_cnt, 0);
    }

    #[test]
    fn ack_train_detection() {
        let (mut hystart, mut conn, config) = setup();
        // min delay 400 (50ms): the train must span more than 25ms
        let delay_min = 400;

        // ACKs 2ms apart keep the train alive without tripping it early
        for now in [102, 104, 106, 108, 110] {
            hystart.update(&mut conn, 400, delay_min, &config, now);
            assert_eq!(hystart.found, 0);
        }

        // a gap over hystart_ack_delta breaks the chain, so nothing fires
        // even past the half-min-RTT point
        hystart.update(&mut conn, 400, delay_min, &config, 120);
        assert_eq!(hystart.found, 0);
        assert_eq!(hystart.last_ack, 110);

        // tight spacing resumes from 120? no: last_ack is stale, so this
        // sample is ignored for the train as well
        hystart.update(&mut conn, 400, delay_min, &config, 127);
        assert_eq!(hystart.found, 0);
    }

    #[test]
    fn ack_train_fires_past_half_min_rtt() {
        let (mut hystart, mut conn, config) = setup();
        let delay_min = 400;

        let mut now = 100;
        // an unbroken 2ms train; it crosses the 25ms mark at now > 125
        for _ in 0..13 {
            now += 2;
            hystart.update(&mut conn, 400, delay_min, &config, now);
        }
        assert_eq!(hystart.found & ACK_TRAIN, ACK_TRAIN);
        assert_eq!(conn.ssthresh, conn.cwnd);
    }

    #[test]
    fn delay_increase_fires_after_min_samples() {
        let (mut hystart, mut conn, config) = setup();
        let delay_min = 400;

        // first 8 samples only establish the round minimum, spaced wide
        // enough apart that the ACK train heuristic stays quiet
        let mut now = 100;
        for _ in 0..8 {
            now += 10;
            hystart.update(&mut conn, 600, delay_min, &config, now);
            assert_eq!(hystart.found, 0);
        }
        assert_eq!(hystart.curr_rtt, 600);
        assert_eq!(hystart.sample_cnt, 8);

        // round minimum 600 > 400 + clamp(25, 32, 128) = 432, so the ninth
        // sample trips the delay heuristic
        now += 10;
        hystart.update(&mut conn, 600, delay_min, &config, now);
        assert_eq!(hystart.found, DELAY);
        assert_eq!(conn.ssthresh, conn.cwnd);
    }

    #[test]
    fn delay_increase_tolerates_threshold() {
        let (mut hystart, mut conn, config) = setup();
        let delay_min = 400;

        let mut now = 100;
        for _ in 0..9 {
            now += 10;
            // 430 stays within 400 + 32
            hystart.update(&mut conn, 430, delay_min, &config, now);
        }
        assert_eq!(hystart.found, 0);
        assert_eq!(conn.ssthresh, 1_000);
    }

    #[test]
    fn found_is_sticky() {
        let (mut hystart, mut conn, config) = setup();
        hystart.found = DELAY;
        let before = hystart;

        // further samples are ignored outright
        hystart.update(&mut conn, 10_000, 400, &config, 104);
        assert_eq!(hystart, before);
        assert_eq!(conn.ssthresh, 1_000);

        hystart.clear_found();
        assert_eq!(hystart.found, 0);
    }
}

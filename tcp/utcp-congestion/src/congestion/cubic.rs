// SPDX-License-Identifier: Apache-2.0

//! CUBIC congestion control ("CUBIC for Fast Long-Distance Networks",
//! RFC 8312), in the fixed-point integer formulation.
//!
//! Between two loss events the window follows `W(t) = C*(t - K)^3 + Wmax`,
//! fitted so that the curve plateaus at `Wmax`, the window where the last
//! loss happened. Rather than setting the window from the curve directly,
//! each update computes `cnt`, the number of ACKs per +1 window increment,
//! and feeds it to the shared additive increase primitive; a TCP-friendliness
//! bound keeps growth at least as fast as standard TCP, and a delayed-ACK
//! ratio estimate compensates for receivers that coalesce ACKs. Slow start
//! exits early via the owned Hybrid Slow Start detector.
//!
//! All curve arithmetic is integer-only: time in `2^-10` second units, delays
//! in 1/8-ms units, the ACK ratio with 4 fractional bits. Bit-exactness here
//! is what makes fairness between flows reproducible, so none of it is done
//! in floating point.

use crate::{
    congestion::{
        hystart::HybridSlowStart, math::cubic_root, reno, CaState, Config, CongestionController,
        ConnectionState,
    },
    time::{millis_elapsed, seq_after},
};
use core::cmp::max;
use log::trace;

/// Fixed-point scale of the `beta` window multiplier.
pub const BETA_SCALE: u32 = 1024;

/// Time unit of the cubic curve: `2^-BICTCP_HZ` seconds.
const BICTCP_HZ: u32 = 10;

/// Fractional bits of the delayed-ACK ratio.
const ACK_RATIO_SHIFT: u32 = 4;

/// Upper clamp of the delayed-ACK ratio: 32 packets per ACK.
const ACK_RATIO_LIMIT: u32 = 32 << ACK_RATIO_SHIFT;

/// Initial packets-per-ACK estimate: assume the peer ACKs every 2nd packet.
const INITIAL_ACK_RATIO: u16 = (2 << ACK_RATIO_SHIFT) as u16;

/// `C = 0.4` expressed as `cube_rtt_scale = 410 = C * 2^10` with the
/// reference RTT of 100ms folded in.
const CUBE_RTT_SCALE: u64 = 410;

/// `2^(10 + 3*BICTCP_HZ) / cube_rtt_scale`, the constant in
/// `K^3 = cube_factor * (Wmax - cwnd)`.
const CUBE_FACTOR: u64 = (1u64 << (10 + 3 * BICTCP_HZ)) / CUBE_RTT_SCALE;

/// Growth divisor multiplier used when the window is already above the
/// curve: one increment per 100 windows of ACKs, effectively flat.
const HOLD_FACTOR: u32 = 100;

/// Hold-down between curve recomputations when the window is unchanged, in
/// ms (the kernel's `HZ / 32`).
const UPDATE_HOLD_MILLIS: i32 = 1000 / 32;

/// CUBIC per-connection state. Reset in full whenever the connection enters
/// `Loss`, since a real loss invalidates every curve-fitting assumption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cubic {
    config: Config,
    /// `(BETA_SCALE + beta) << 3 / (3 * (BETA_SCALE - beta))`, the per-ACK
    /// scale of the standard TCP window estimate.
    beta_scale: u32,
    /// Increase cwnd by 1 after this many ACKs in congestion avoidance.
    cnt: u32,
    /// Window at the last loss event (Wmax).
    last_max_cwnd: u32,
    /// Window when the most recent loss happened, kept for undo.
    loss_cwnd: u32,
    /// Window and timestamp of the last curve evaluation.
    last_cwnd: u32,
    last_time: u32,
    /// Origin of the fitted curve, and the time offset to reach it.
    origin_point: u32,
    bic_k: u32,
    /// Minimum observed delay this epoch, 1/8-ms units.
    delay_min: u32,
    /// When the current congestion avoidance epoch began; 0 means closed.
    epoch_start: u32,
    /// ACKs seen since the epoch began.
    ack_cnt: u32,
    /// Estimated window of a standard TCP flow over the same epoch.
    tcp_cwnd: u32,
    /// Packets-per-ACK estimate, `ACK_RATIO_SHIFT` fractional bits.
    delayed_ack: u16,
    hystart: HybridSlowStart,
}

impl Cubic {
    pub fn new(config: Config) -> Self {
        debug_assert!(config.beta > 0 && config.beta < BETA_SCALE);
        let mut cubic = Self {
            config,
            beta_scale: ((BETA_SCALE + config.beta) << 3) / (3 * (BETA_SCALE - config.beta)),
            cnt: 0,
            last_max_cwnd: 0,
            loss_cwnd: 0,
            last_cwnd: 0,
            last_time: 0,
            origin_point: 0,
            bic_k: 0,
            delay_min: 0,
            epoch_start: 0,
            ack_cnt: 0,
            tcp_cwnd: 0,
            delayed_ack: INITIAL_ACK_RATIO,
            hystart: HybridSlowStart::default(),
        };
        cubic.reset();
        cubic
    }

    /// Returns to the just-initialized state. `loss_cwnd` is left alone so
    /// an undo stays possible across the reset.
    fn reset(&mut self) {
        self.cnt = 0;
        self.last_max_cwnd = 0;
        self.last_cwnd = 0;
        self.last_time = 0;
        self.origin_point = 0;
        self.bic_k = 0;
        self.delay_min = 0;
        self.epoch_start = 0;
        self.ack_cnt = 0;
        self.tcp_cwnd = 0;
        self.delayed_ack = INITIAL_ACK_RATIO;
        self.hystart.clear_found();
    }

    /// Recomputes `cnt`, the reciprocal growth rate, from the cubic curve.
    /// Called on every ACK taken in congestion avoidance.
    fn update(&mut self, cwnd: u32, now: u32) {
        debug_assert!(cwnd >= 1);

        self.ack_cnt = self.ack_cnt.wrapping_add(1);

        if self.last_cwnd == cwnd && millis_elapsed(now, self.last_time) <= UPDATE_HOLD_MILLIS {
            return;
        }

        self.last_cwnd = cwnd;
        self.last_time = now;

        if self.epoch_start == 0 {
            // First useful ACK since the last window reduction opens a new
            // epoch and fits the curve to it
            self.epoch_start = now;
            self.ack_cnt = 1;
            self.tcp_cwnd = cwnd;

            if self.last_max_cwnd <= cwnd {
                // No saturation point on record below us (e.g. right after
                // an undo): we are already at or past the origin, so start
                // in the convex region
                self.bic_k = 0;
                self.origin_point = cwnd;
            } else {
                // K = cubic_root((Wmax - cwnd) / C), in 2^-10 s units
                self.bic_k = cubic_root(CUBE_FACTOR * u64::from(self.last_max_cwnd - cwnd));
                self.origin_point = self.last_max_cwnd;
            }

            trace!(
                "cubic epoch open: origin={} k={} last_max={} cwnd={}",
                self.origin_point,
                self.bic_k,
                self.last_max_cwnd,
                cwnd
            );
        }

        // Elapsed epoch time, predicted one minimum RTT ahead so cnt aims at
        // where the curve wants the window to be after the next round trip
        let t = millis_elapsed(now, self.epoch_start).max(0) as u64 + u64::from(self.delay_min >> 3);
        let t = (t << BICTCP_HZ) / 1000;

        let bic_target = cubic_target(self.origin_point, self.bic_k, t);

        if bic_target > cwnd {
            // Below the curve: the wider the gap, the faster the growth
            self.cnt = cwnd / (bic_target - cwnd);
        } else {
            // Above the curve: hold nearly flat
            self.cnt = HOLD_FACTOR.saturating_mul(cwnd);
        }

        // With no loss on record the curve fit is provisional; cap the
        // divisor so growth while bandwidth is unprobed stays at least 5%
        if self.last_max_cwnd == 0 && self.cnt > 20 {
            self.cnt = 20;
        }

        if self.config.tcp_friendliness {
            // Standard TCP adds one window per cwnd ACKs; scaled through
            // beta_scale this turns the epoch's ACK count into the window a
            // Reno flow would have reached
            let delta = (u64::from(cwnd) * u64::from(self.beta_scale)) >> 3;
            while u64::from(self.ack_cnt) > delta {
                self.ack_cnt -= delta as u32;
                self.tcp_cwnd += 1;
            }

            if self.tcp_cwnd > cwnd {
                // The cubic curve is growing slower than TCP would; never
                // fall behind it
                let max_cnt = cwnd / (self.tcp_cwnd - cwnd);
                if self.cnt > max_cnt {
                    self.cnt = max_cnt;
                }
            }
        }

        // cnt is packets-per-ACK; a receiver that ACKs every delayed_ack
        // packets should see the same per-packet growth
        self.cnt = ((u64::from(self.cnt) << ACK_RATIO_SHIFT) / u64::from(self.delayed_ack))
            .min(u64::from(u32::MAX)) as u32;

        if self.cnt == 0 {
            self.cnt = 1;
        }
    }
}

/// Evaluates `W(t)` on the fitted curve: `origin ∓ C * |t - K|^3`, with `t`
/// in `2^-10` second units. Concave below `K` (rising toward the origin),
/// convex past it.
fn cubic_target(origin_point: u32, bic_k: u32, t: u64) -> u32 {
    let offs = if t < u64::from(bic_k) {
        u64::from(bic_k) - t
    } else {
        t - u64::from(bic_k)
    };

    // C/rtt * (t - K)^3, kept in 64 bits: exact for windows up to well past
    // a million packets, saturating beyond instead of wrapping
    let delta = CUBE_RTT_SCALE
        .saturating_mul(offs.saturating_mul(offs).saturating_mul(offs))
        >> (10 + 3 * BICTCP_HZ);
    let delta = delta.min(u64::from(u32::MAX)) as u32;

    if t < u64::from(bic_k) {
        origin_point.saturating_sub(delta)
    } else {
        origin_point.saturating_add(delta)
    }
}

impl CongestionController for Cubic {
    fn init(&mut self, conn: &mut ConnectionState, now: u32) {
        self.reset();
        self.loss_cwnd = 0;
        if self.config.hystart {
            self.hystart.reset_round(conn.snd_nxt, now);
        }
    }

    /// Closes the epoch and rebuilds the saturation point. With fast
    /// convergence, a window that shrank since the last loss is taken as a
    /// sign of competing flows and the remembered maximum gives up room
    /// early instead of defending a stale estimate.
    fn ssthresh(&mut self, conn: &ConnectionState) -> u32 {
        let cwnd = conn.cwnd;

        self.epoch_start = 0;

        if cwnd < self.last_max_cwnd && self.config.fast_convergence {
            self.last_max_cwnd = ((u64::from(cwnd) * u64::from(BETA_SCALE + self.config.beta))
                / u64::from(BETA_SCALE << 1)) as u32;
        } else {
            self.last_max_cwnd = cwnd;
        }
        self.loss_cwnd = cwnd;

        let ssthresh = max(
            ((u64::from(cwnd) * u64::from(self.config.beta)) / u64::from(BETA_SCALE)) as u32,
            2,
        );
        trace!(
            "cubic ssthresh: cwnd={} ssthresh={} last_max={}",
            cwnd,
            ssthresh,
            self.last_max_cwnd
        );
        ssthresh
    }

    fn on_ack(&mut self, conn: &mut ConnectionState, ack: u32, acked: u32, now: u32) {
        if !conn.is_cwnd_limited {
            return;
        }

        if conn.cwnd <= conn.ssthresh {
            if self.config.hystart && seq_after(ack, self.hystart.end_seq) {
                self.hystart.reset_round(conn.snd_nxt, now);
            }
            reno::slow_start(conn, acked);
        } else {
            self.update(conn.cwnd, now);
            reno::cong_avoid_ai(conn, self.cnt);
        }
    }

    fn on_state_change(&mut self, conn: &mut ConnectionState, new_state: CaState, now: u32) {
        if new_state == CaState::Loss {
            trace!("cubic loss reset: cwnd={}", conn.cwnd);
            self.reset();
            self.hystart.reset_round(conn.snd_nxt, now);
        }
    }

    fn undo_cwnd(&mut self, conn: &ConnectionState) -> u32 {
        // The loss was spurious; never come back below the pre-loss window
        max(conn.cwnd, self.loss_cwnd)
    }

    fn on_packet_acked(&mut self, conn: &mut ConnectionState, acked: u32, rtt_us: i32, now: u32) {
        if conn.ca_state == CaState::Open {
            // delayed_ack = 15/16 * delayed_ack + 1/16 * acked, in
            // ACK_RATIO_SHIFT fixed-point
            let ratio = u32::from(self.delayed_ack) - (u32::from(self.delayed_ack) >> ACK_RATIO_SHIFT)
                + acked;
            self.delayed_ack = ratio.clamp(1, ACK_RATIO_LIMIT) as u16;
        }

        // Retransmission ambiguity: the sample is unusable, not zero
        if rtt_us < 0 {
            return;
        }

        // Delay samples in the first second after an epoch opens still carry
        // fast-recovery noise
        if self.epoch_start != 0 && millis_elapsed(now, self.epoch_start) < 1000 {
            return;
        }

        let delay = ((u64::from(rtt_us as u32) << 3) / 1000).max(1) as u32;

        if self.delay_min == 0 || self.delay_min > delay {
            self.delay_min = delay;
        }

        if self.config.hystart
            && conn.cwnd <= conn.ssthresh
            && conn.cwnd >= self.config.hystart_low_window
        {
            self.hystart
                .update(conn, delay, self.delay_min, &self.config, now);
        }
    }
}

// SPDX-License-Identifier: Apache-2.0

//! Congestion control interface and algorithm selection.
//!
//! A connection owns a [`ConnectionState`] and a [`Controller`] chosen at
//! setup time. The connection state machine drives the controller through the
//! [`CongestionController`] hooks: [`on_ack`] on every accepted ACK,
//! [`on_packet_acked`] per acknowledged segment (with its RTT sample),
//! [`ssthresh`]/[`undo_cwnd`] on loss and recovery transitions, and
//! [`on_state_change`] when the congestion state moves. The controller only
//! reads and mutates the window fields; segment transmission, retransmission
//! timers and sequence bookkeeping stay with the caller.
//!
//! [`on_ack`]: CongestionController::on_ack
//! [`on_packet_acked`]: CongestionController::on_packet_acked
//! [`ssthresh`]: CongestionController::ssthresh
//! [`undo_cwnd`]: CongestionController::undo_cwnd
//! [`on_state_change`]: CongestionController::on_state_change

use core::{fmt, str::FromStr};

pub mod cubic;
pub mod math;
pub mod reno;

mod hystart;

/// Initial congestion window, in packets (RFC 6928).
pub const INITIAL_WINDOW: u32 = 10;

/// Congestion state of a connection, owned by the connection state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaState {
    /// Normal operation, ACKs advancing in order.
    Open,
    /// Dubious ACKs seen (duplicate ACKs / SACK), no loss declared yet.
    Disorder,
    /// Fast retransmit / fast recovery in progress.
    Recovery,
    /// Retransmission timeout, everything outstanding is presumed lost.
    Loss,
}

/// The window-related slice of connection state read and written by the
/// congestion controllers. Owned by the external connection object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionState {
    /// Congestion window, in packets. Never below 1.
    pub cwnd: u32,
    /// Slow start threshold.
    pub ssthresh: u32,
    /// ACKs accumulated toward the next +1 `cwnd` increment during additive
    /// increase.
    pub cwnd_cnt: u32,
    /// Current congestion state, maintained by the loss detection machinery.
    pub ca_state: CaState,
    /// Highest sequence number sent so far; marks slow start round
    /// boundaries for Hystart.
    pub snd_nxt: u32,
    /// True only if the sender was actually blocked by the congestion window
    /// rather than idle or flow-control limited. Computed by the caller;
    /// window growth is skipped while false.
    pub is_cwnd_limited: bool,
}

impl ConnectionState {
    pub fn new(cwnd: u32, ssthresh: u32) -> Self {
        Self {
            cwnd,
            ssthresh,
            cwnd_cnt: 0,
            ca_state: CaState::Open,
            snd_nxt: 0,
            is_cwnd_limited: false,
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        // ssthresh starts effectively infinite; the first loss sets it
        Self::new(INITIAL_WINDOW, u32::MAX)
    }
}

/// Process-wide congestion control tunables, fixed at construction.
///
/// `beta` is the loss-window multiplier in [`cubic::BETA_SCALE`] fixed-point
/// (the default 717/1024 is approximately 0.7). The Hystart delay thresholds
/// are in 1/8-millisecond units, matching the resolution of the minimum
/// delay tracker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    pub fast_convergence: bool,
    pub tcp_friendliness: bool,
    pub hystart: bool,
    pub beta: u32,
    /// Window size below which Hystart detection is not worth running.
    pub hystart_low_window: u32,
    /// Maximum gap between consecutive ACKs of one ACK train, in ms.
    pub hystart_ack_delta: u32,
    /// Lower clamp on the delay-increase threshold, in 1/8-ms units.
    pub hystart_delay_min: u32,
    /// Upper clamp on the delay-increase threshold, in 1/8-ms units.
    pub hystart_delay_max: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fast_convergence: true,
            tcp_friendliness: true,
            hystart: true,
            beta: 717,
            hystart_low_window: 16,
            hystart_ack_delta: 2,
            hystart_delay_min: 4 << 3,
            hystart_delay_max: 16 << 3,
        }
    }
}

impl Config {
    pub fn with_fast_convergence(mut self, enabled: bool) -> Self {
        self.fast_convergence = enabled;
        self
    }

    pub fn with_tcp_friendliness(mut self, enabled: bool) -> Self {
        self.tcp_friendliness = enabled;
        self
    }

    pub fn with_hystart(mut self, enabled: bool) -> Self {
        self.hystart = enabled;
        self
    }

    /// Sets the loss-window multiplier, scaled by [`cubic::BETA_SCALE`].
    /// Must be in `(0, BETA_SCALE)`.
    pub fn with_beta(mut self, beta: u32) -> Self {
        debug_assert!(beta > 0 && beta < cubic::BETA_SCALE);
        self.beta = beta;
        self
    }
}

/// The operation set a congestion control algorithm exposes to the connection
/// state machine.
///
/// Every operation except [`on_ack`] has a default so an algorithm only
/// implements the hooks it cares about; New Reno, for instance, supplies
/// nothing beyond `on_ack` and `ssthresh`.
///
/// The caller guarantees that `init` runs exactly once before any other
/// operation, that `on_ack` is invoked only when new data was actually
/// acknowledged, and that a single connection's hooks are never invoked
/// concurrently. `now` arguments are wrapping millisecond timestamps from a
/// monotonic clock (see [`crate::time`]).
///
/// [`on_ack`]: CongestionController::on_ack
pub trait CongestionController {
    /// Resets algorithm-private state for a fresh connection.
    fn init(&mut self, _conn: &mut ConnectionState, _now: u32) {}

    /// Computes the new slow start threshold on loss/recovery entry.
    /// Must not mutate `cwnd`.
    fn ssthresh(&mut self, conn: &ConnectionState) -> u32 {
        reno::ssthresh(conn.cwnd)
    }

    /// The main per-ACK hook: grows or holds `cwnd`. `ack` is the
    /// acknowledged sequence number, `acked` the number of newly
    /// acknowledged packets.
    fn on_ack(&mut self, conn: &mut ConnectionState, ack: u32, acked: u32, now: u32);

    /// Notified when the congestion state changes.
    fn on_state_change(&mut self, _conn: &mut ConnectionState, _new_state: CaState, _now: u32) {}

    /// Returns the window to restore after a spurious loss signal.
    fn undo_cwnd(&mut self, conn: &ConnectionState) -> u32 {
        conn.cwnd
    }

    /// Invoked once per acknowledged segment with its RTT sample in
    /// microseconds. A negative `rtt_us` marks a retransmitted segment whose
    /// RTT is ambiguous; such samples must be discarded, not treated as zero.
    fn on_packet_acked(&mut self, _conn: &mut ConnectionState, _acked: u32, _rtt_us: i32, _now: u32) {
    }
}

/// A congestion control algorithm name was not recognized at setup time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnknownAlgorithm;

impl fmt::Display for UnknownAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown congestion control algorithm")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for UnknownAlgorithm {}

/// The closed set of available congestion control algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    Cubic,
    Reno,
}

impl Algorithm {
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Cubic => "cubic",
            Algorithm::Reno => "reno",
        }
    }
}

impl FromStr for Algorithm {
    type Err = UnknownAlgorithm;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "cubic" => Ok(Algorithm::Cubic),
            "reno" => Ok(Algorithm::Reno),
            _ => Err(UnknownAlgorithm),
        }
    }
}

/// A congestion controller instance, dispatching to the algorithm selected
/// at connection setup.
#[derive(Clone, Debug)]
pub enum Controller {
    Cubic(cubic::Cubic),
    Reno(reno::Reno),
}

impl Controller {
    pub fn new(algorithm: Algorithm, config: &Config) -> Self {
        match algorithm {
            Algorithm::Cubic => Controller::Cubic(cubic::Cubic::new(*config)),
            Algorithm::Reno => Controller::Reno(reno::Reno),
        }
    }

    /// Selects an algorithm by its table name ("cubic", "reno").
    pub fn from_name(name: &str, config: &Config) -> Result<Self, UnknownAlgorithm> {
        Ok(Self::new(name.parse()?, config))
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            Controller::Cubic(_) => Algorithm::Cubic,
            Controller::Reno(_) => Algorithm::Reno,
        }
    }
}

impl CongestionController for Controller {
    fn init(&mut self, conn: &mut ConnectionState, now: u32) {
        match self {
            Controller::Cubic(cc) => cc.init(conn, now),
            Controller::Reno(cc) => cc.init(conn, now),
        }
    }

    fn ssthresh(&mut self, conn: &ConnectionState) -> u32 {
        match self {
            Controller::Cubic(cc) => cc.ssthresh(conn),
            Controller::Reno(cc) => cc.ssthresh(conn),
        }
    }

    fn on_ack(&mut self, conn: &mut ConnectionState, ack: u32, acked: u32, now: u32) {
        match self {
            Controller::Cubic(cc) => cc.on_ack(conn, ack, acked, now),
            Controller::Reno(cc) => cc.on_ack(conn, ack, acked, now),
        }
    }

    fn on_state_change(&mut self, conn: &mut ConnectionState, new_state: CaState, now: u32) {
        match self {
            Controller::Cubic(cc) => cc.on_state_change(conn, new_state, now),
            Controller::Reno(cc) => cc.on_state_change(conn, new_state, now),
        }
    }

    fn undo_cwnd(&mut self, conn: &ConnectionState) -> u32 {
        match self {
            Controller::Cubic(cc) => cc.undo_cwnd(conn),
            Controller::Reno(cc) => cc.undo_cwnd(conn),
        }
    }

    fn on_packet_acked(&mut self, conn: &mut ConnectionState, acked: u32, rtt_us: i32, now: u32) {
        match self {
            Controller::Cubic(cc) => cc.on_packet_acked(conn, acked, rtt_us, now),
            Controller::Reno(cc) => cc.on_packet_acked(conn, acked, rtt_us, now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_from_name() {
        assert_eq!("cubic".parse(), Ok(Algorithm::Cubic));
        assert_eq!("reno".parse(), Ok(Algorithm::Reno));
        assert_eq!("bbr".parse::<Algorithm>(), Err(UnknownAlgorithm));
        assert_eq!("CUBIC".parse::<Algorithm>(), Err(UnknownAlgorithm));
    }

    #[test]
    fn controller_from_name() {
        let config = Config::default();
        let cc = Controller::from_name("cubic", &config).unwrap();
        assert_eq!(cc.algorithm(), Algorithm::Cubic);
        let cc = Controller::from_name("reno", &config).unwrap();
        assert_eq!(cc.algorithm(), Algorithm::Reno);
        assert!(Controller::from_name("vegas", &config).is_err());
    }

    #[test]
    fn controller_delegates_to_reno() {
        let config = Config::default();
        let mut cc = Controller::from_name("reno", &config).unwrap();
        let mut conn = ConnectionState::new(10, 100);
        conn.is_cwnd_limited = true;

        cc.init(&mut conn, 1);
        cc.on_ack(&mut conn, 100, 3, 1);
        assert_eq!(conn.cwnd, 13);
        assert_eq!(cc.ssthresh(&conn), 6);
    }

    #[test]
    fn default_operations() {
        // An algorithm supplying only on_ack gets Reno ssthresh and a
        // non-shrinking undo for free.
        struct Fixed;
        impl CongestionController for Fixed {
            fn on_ack(&mut self, _: &mut ConnectionState, _: u32, _: u32, _: u32) {}
        }

        let mut cc = Fixed;
        let mut conn = ConnectionState::new(40, 100);
        cc.init(&mut conn, 1);
        assert_eq!(cc.ssthresh(&conn), 20);
        assert_eq!(cc.undo_cwnd(&conn), 40);
        cc.on_state_change(&mut conn, CaState::Loss, 1);
        cc.on_packet_acked(&mut conn, 1, 1000, 1);
        assert_eq!(conn, ConnectionState::new(40, 100));
    }

    #[test]
    fn config_defaults() {
        let config = Config::default();
        assert!(config.fast_convergence);
        assert!(config.tcp_friendliness);
        assert!(config.hystart);
        assert_eq!(config.beta, 717);
        assert_eq!(config.hystart_low_window, 16);
        assert_eq!(config.hystart_ack_delta, 2);
        assert_eq!(config.hystart_delay_min, 32);
        assert_eq!(config.hystart_delay_max, 128);
    }

    #[test]
    fn config_setters() {
        let config = Config::default()
            .with_fast_convergence(false)
            .with_tcp_friendliness(false)
            .with_hystart(false)
            .with_beta(512);
        assert!(!config.fast_convergence);
        assert!(!config.tcp_friendliness);
        assert!(!config.hystart);
        assert_eq!(config.beta, 512);
    }

    #[test]
    fn unknown_algorithm_display() {
        assert_eq!(
            UnknownAlgorithm.to_string(),
            "unknown congestion control algorithm"
        );
    }
}

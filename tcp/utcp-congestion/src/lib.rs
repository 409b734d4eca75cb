// SPDX-License-Identifier: Apache-2.0

//! Pluggable TCP congestion control for the utcp user-space TCP stack.
//!
//! The connection state machine owns a [`congestion::ConnectionState`] and a
//! [`congestion::Controller`] selected by name at connection setup, and drives
//! the controller through the hooks of [`congestion::CongestionController`]:
//! once per accepted ACK, per acknowledged segment, and on loss/recovery
//! transitions. All window arithmetic is fixed-point integer math; timestamps
//! are wrapping `u32` milliseconds from a monotonic clock.
//!
//! ```
//! use utcp_congestion::congestion::{Config, ConnectionState, Controller, CongestionController};
//!
//! let config = Config::default();
//! let mut cc = Controller::from_name("cubic", &config).unwrap();
//! let mut conn = ConnectionState::default();
//! conn.ssthresh = 64;
//! conn.is_cwnd_limited = true;
//!
//! cc.init(&mut conn, 1);
//! cc.on_ack(&mut conn, 1_000, 2, 1);
//! assert_eq!(conn.cwnd, 12);
//! ```

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod congestion;
pub mod time;

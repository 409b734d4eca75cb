// SPDX-License-Identifier: Apache-2.0

//! Millisecond clock and wrapping comparison helpers.
//!
//! Timestamps are `u32` milliseconds from an arbitrary monotonic origin and
//! wrap after about 49.7 days, so elapsed time is always computed through a
//! signed difference rather than unsigned subtraction. The same idiom is used
//! for TCP sequence numbers.

/// Signed difference between two wrapping millisecond timestamps.
///
/// Positive when `now` is after `earlier`. Valid as long as the real distance
/// between the two timestamps is less than half the `u32` range.
#[inline]
pub fn millis_elapsed(now: u32, earlier: u32) -> i32 {
    now.wrapping_sub(earlier) as i32
}

/// Returns true if sequence number `a` is after `b`, modulo wraparound.
#[inline]
pub fn seq_after(a: u32, b: u32) -> bool {
    a.wrapping_sub(b) as i32 > 0
}

/// Milliseconds elapsed since the first call in this process, read from the
/// system monotonic clock.
///
/// The congestion control hooks take an explicit `now` argument so that
/// embedders can batch one clock read per event-loop iteration (and tests can
/// inject time); this is the production source for that argument.
#[cfg(feature = "std")]
pub fn now_millis() -> u32 {
    use once_cell::sync::Lazy;
    use std::time::Instant;

    static ORIGIN: Lazy<Instant> = Lazy::new(Instant::now);
    ORIGIN.elapsed().as_millis() as u32
}

// SPDX-License-Identifier: Apache-2.0

//! Fixed-point math primitives shared by the congestion control algorithms.

/// Position of the most significant set bit, 1-based. `fls64(0) == 0`.
#[inline]
fn fls64(a: u64) -> u32 {
    64 - a.leading_zeros()
}

/// Integer cube root of `a`, computed with a table lookup followed by one
/// Newton-Raphson iteration. Average error is about 0.195%, which is enough
/// precision for fitting the CUBIC window curve; inputs below 64 resolve to
/// the nearest integer root straight from the table.
pub fn cubic_root(a: u64) -> u32 {
    // cbrt(x) MSB values for x MSB values in [0..63].
    // For x in [0..63]:
    //   v[x] = cbrt(x << 18) - 1
    //   cbrt(x) = (v[x] + 10) >> 6
    const V: [u8; 64] = [
        /* 0x00 */ 0, 54, 54, 54, 118, 118, 118, 118,
        /* 0x08 */ 123, 129, 134, 138, 143, 147, 151, 156,
        /* 0x10 */ 157, 161, 164, 168, 170, 173, 176, 179,
        /* 0x18 */ 181, 185, 187, 190, 192, 194, 197, 199,
        /* 0x20 */ 200, 202, 204, 206, 209, 211, 213, 215,
        /* 0x28 */ 217, 219, 221, 222, 224, 225, 227, 229,
        /* 0x30 */ 231, 232, 234, 236, 237, 239, 240, 242,
        /* 0x38 */ 244, 245, 246, 248, 250, 251, 252, 254,
    ];

    let b = fls64(a);
    if b < 7 {
        // a in [0..63]
        return (u32::from(V[a as usize]) + 35) >> 6;
    }

    let b = ((b * 84) >> 8) - 1;
    let shift = (a >> (b * 3)) as usize;

    let mut x = ((u32::from(V[shift]) + 10) << b) >> 6;

    // One Newton-Raphson iteration:
    //                         2
    // x    = ( 2 * x  + a / x  ) / 3
    //  k+1          k        k
    //
    // x is at least 2 on this path, so the divisor cannot be zero.
    x = 2 * x + (a / (u64::from(x) * u64::from(x - 1))) as u32;
    x = (x * 341) >> 10;
    x
}

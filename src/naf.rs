//! Non-adjacent-form scalar recodings (§3, §4.8 — component C8).
//!
//! Both [`naf`] and [`wnaf`] return digits in most-significant-to-least-
//! significant order, ready for the left-to-right scan the `BinaryNAF` and
//! `WindowNAF` multipliers in `src/mult.rs` perform. Scalars are arbitrary
//! precision `BigUint`s, not fixed-width integers — a curve's order is not
//! bounded to fit in a machine word.

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, ToPrimitive, Zero};

/// Binary non-adjacent-form recoding of `k`. Every digit is in `{-1, 0, 1}`;
/// no two consecutive digits are both nonzero; the digits recover `k`.
pub fn naf(mut k: BigUint) -> Vec<i8> {
    let mut digits = Vec::new();
    let four = BigUint::from(4u32);
    while !k.is_zero() {
        if k.bit(0) {
            let r = (&k).mod_floor(&four);
            if r == BigUint::one() {
                digits.push(1i8);
                k -= 1u32;
            } else {
                digits.push(-1i8);
                k += 1u32;
            }
        } else {
            digits.push(0);
        }
        k >>= 1u32;
    }
    digits.reverse();
    digits
}

/// Width-`w` non-adjacent-form recoding of `k`. Every nonzero digit is odd
/// and lies in `(-2^(w-1), 2^(w-1)]`; between any two nonzero digits there
/// are at least `w - 1` zero digits.
pub fn wnaf(mut k: BigUint, w: u32) -> Vec<i64> {
    assert!(w >= 2, "wnaf window width must be at least 2");
    let modulus = BigUint::from(1u32) << w;
    let modulus_i64 = 1i64 << w;
    let half_i64 = 1i64 << (w - 1);
    let mut digits = Vec::new();
    while !k.is_zero() {
        if k.bit(0) {
            let window = (&k).mod_floor(&modulus);
            let window_i64 = window.to_i64().expect("window is bounded by 2^w, which fits in i64 for any realistic w");
            let d = if window_i64 > half_i64 { window_i64 - modulus_i64 } else { window_i64 };
            digits.push(d);
            if d >= 0 {
                k -= BigUint::from(d as u64);
            } else {
                k += BigUint::from((-d) as u64);
            }
        } else {
            digits.push(0);
        }
        k >>= 1u32;
    }
    digits.reverse();
    digits
}

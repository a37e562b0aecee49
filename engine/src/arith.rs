//! Modular inverse by the extended Euclidean algorithm.

use num_bigint::BigInt;
use num_traits::{One, Zero};

use crate::error::{Error, Result};

/// Returns the Bézout coefficient `s` with `a * s ≡ 1 (mod m)`.
///
/// The coefficient is not reduced and may be negative; use [`inverse_mod`]
/// for the canonical representative. Both arguments must be non-negative
/// and `m` must be positive.
///
/// # Errors
///
/// Returns [`Error::NotCoprime`] if `gcd(a, m) != 1`.
pub fn inverse(a: &BigInt, m: &BigInt) -> Result<BigInt> {
    let (mut old_r, mut r) = (a.clone(), m.clone());
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());

    while !r.is_zero() {
        let q = &old_r / &r;
        let next_r = &old_r - &q * &r;
        old_r = std::mem::replace(&mut r, next_r);
        let next_s = &old_s - &q * &s;
        old_s = std::mem::replace(&mut s, next_s);
    }

    if !old_r.is_one() {
        log::warn!("{a} and {m} share the factor {old_r}");
        return Err(Error::NotCoprime {
            a: a.to_string(),
            m: m.to_string(),
        });
    }
    Ok(old_s)
}

/// Returns the inverse of `a` modulo `m` reduced into `[0, m)`.
///
/// # Errors
///
/// Returns [`Error::NotCoprime`] if `gcd(a, m) != 1`.
pub fn inverse_mod(a: &BigInt, m: &BigInt) -> Result<BigInt> {
    inverse(a, m).map(|s| canonical(&s, m))
}

/// Reduces `x` into `[0, m)` for positive `m`.
#[must_use]
pub fn canonical(x: &BigInt, m: &BigInt) -> BigInt {
    let r = x % m;
    if r < BigInt::zero() {
        r + m
    } else {
        r
    }
}

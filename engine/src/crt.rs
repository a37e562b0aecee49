//! Chinese remainder reconstruction.
//!
//! [`reconstruct`] is a pure function of the samples it is given. The driver
//! calls it on the whole [`AccumulatedSet`] after every oracle run instead of
//! updating a running value, so the result never depends on how earlier
//! values were obtained.

use num_bigint::{BigInt, BigUint};
use num_traits::One;
use serde::Serialize;

use crate::arith;
use crate::error::{Error, Result};

/// One oracle answer: the counted quantity modulo `modulus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ResultSample {
    /// Canonical remainder, `0 <= remainder < modulus`.
    pub remainder: u64,
    /// Prime the remainder was taken against.
    pub modulus: u64,
}

impl ResultSample {
    /// Creates a sample, checking that the remainder is canonical.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedOutput`] if `modulus` is zero or
    /// `remainder >= modulus`.
    pub fn new(remainder: u64, modulus: u64) -> Result<Self> {
        if modulus == 0 || remainder >= modulus {
            return Err(Error::MalformedOutput {
                line: format!("{remainder} mod {modulus}"),
                reason: "remainder is not in [0, modulus)".to_owned(),
            });
        }
        Ok(Self { remainder, modulus })
    }
}

/// The samples collected so far in one run, in insertion order.
///
/// Grows only by [`push`](AccumulatedSet::push), which refuses a modulus that
/// is already present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccumulatedSet {
    samples: Vec<ResultSample>,
}

impl AccumulatedSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sample.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedOutput`] if the remainder is not below its
    /// modulus and [`Error::DuplicateModulus`] if a sample with the same
    /// modulus was already collected.
    pub fn push(&mut self, sample: ResultSample) -> Result<()> {
        let sample = ResultSample::new(sample.remainder, sample.modulus)?;
        if self.samples.iter().any(|s| s.modulus == sample.modulus) {
            return Err(Error::DuplicateModulus(sample.modulus));
        }
        self.samples.push(sample);
        Ok(())
    }

    /// The samples in insertion order.
    #[must_use]
    pub fn samples(&self) -> &[ResultSample] {
        &self.samples
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no sample has been collected yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Remainders in insertion order.
    #[must_use]
    pub fn remainders(&self) -> Vec<u64> {
        self.samples.iter().map(|s| s.remainder).collect()
    }

    /// Moduli in insertion order.
    #[must_use]
    pub fn moduli(&self) -> Vec<u64> {
        self.samples.iter().map(|s| s.modulus).collect()
    }

    /// Product of all moduli, the range the reconstruction is unique in.
    #[must_use]
    pub fn product(&self) -> BigUint {
        modulus_product(&self.samples)
    }

    /// Reconstructs the value consistent with every sample.
    ///
    /// # Errors
    ///
    /// See [`reconstruct`].
    pub fn reconstruct(&self) -> Result<BigUint> {
        reconstruct(&self.samples)
    }
}

fn modulus_product(samples: &[ResultSample]) -> BigUint {
    samples
        .iter()
        .fold(BigUint::one(), |acc, s| acc * BigUint::from(s.modulus))
}

/// Returns the unique `x` in `[0, M)` with `x ≡ r_i (mod m_i)` for every
/// sample, where `M` is the product of the moduli.
///
/// A single sample reconstructs to its own remainder, reduced if it is not
/// canonical; an empty slice to zero.
///
/// # Errors
///
/// Returns [`Error::MalformedOutput`] for a zero modulus and
/// [`Error::NotCoprime`] if two moduli share a factor.
pub fn reconstruct(samples: &[ResultSample]) -> Result<BigUint> {
    if let Some(zero) = samples.iter().find(|s| s.modulus == 0) {
        return Err(Error::MalformedOutput {
            line: format!("{} mod 0", zero.remainder),
            reason: "modulus must be positive".to_owned(),
        });
    }
    if let [only] = samples {
        return Ok(BigUint::from(only.remainder % only.modulus));
    }

    let product = BigInt::from(modulus_product(samples));
    let mut sum = BigInt::default();
    for sample in samples {
        let m_i = BigInt::from(sample.modulus);
        let partial = &product / &m_i;
        let inv = arith::inverse(&(&partial % &m_i), &m_i)?;
        sum += BigInt::from(sample.remainder) * &partial * inv;
    }

    let value = arith::canonical(&sum, &product);
    // `canonical` lands in [0, product), so the sign is never negative here.
    Ok(value.magnitude().clone())
}

//! Modulus schedules.
//!
//! One fixed list of distinct primes per supported counter width, largest
//! first. Larger moduli carry more residue information per oracle run, so
//! convergence tends to come earlier; the reconstruction itself does not
//! depend on the order.

use std::fmt;

use crate::error::{Error, Result};

/// Width of the oracle's counter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WordWidth {
    /// 8-bit counters.
    W8,
    /// 16-bit counters.
    W16,
    /// 32-bit counters.
    W32,
    /// 64-bit counters.
    W64,
}

impl WordWidth {
    /// All supported widths, narrowest first.
    pub const ALL: [WordWidth; 4] = [WordWidth::W8, WordWidth::W16, WordWidth::W32, WordWidth::W64];

    /// Looks up the width for a bit count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedWidth`] for anything but 8, 16, 32 or 64.
    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            8 => Ok(WordWidth::W8),
            16 => Ok(WordWidth::W16),
            32 => Ok(WordWidth::W32),
            64 => Ok(WordWidth::W64),
            other => Err(Error::UnsupportedWidth(other)),
        }
    }

    /// Number of bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            WordWidth::W8 => 8,
            WordWidth::W16 => 16,
            WordWidth::W32 => 32,
            WordWidth::W64 => 64,
        }
    }

    /// Largest modulus the oracle accepts at this width.
    ///
    /// 64-bit counters lose their top bit to overflow headroom.
    #[must_use]
    pub const fn max_modulus(self) -> u64 {
        match self {
            WordWidth::W64 => (1u64 << 63) - 1,
            other => (1u64 << other.bits()) - 1,
        }
    }

    /// The schedule registered for this width.
    #[must_use]
    pub const fn schedule(self) -> Schedule {
        let moduli: &'static [u64] = match self {
            WordWidth::W8 => &MODULI_8,
            WordWidth::W16 => &MODULI_16,
            WordWidth::W32 => &MODULI_32,
            WordWidth::W64 => &MODULI_64,
        };
        Schedule { moduli }
    }
}

impl serde::Serialize for WordWidth {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

impl fmt::Display for WordWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// An immutable, ordered list of pairwise-coprime moduli.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    moduli: &'static [u64],
}

impl Schedule {
    /// The moduli in query order.
    #[must_use]
    pub const fn moduli(&self) -> &'static [u64] {
        self.moduli
    }

    /// Number of moduli, which bounds the number of oracle runs.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.moduli.len()
    }

    /// Whether the schedule has no moduli.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.moduli.is_empty()
    }

    /// Iterates the moduli in query order.
    pub fn iter(&self) -> std::iter::Copied<std::slice::Iter<'static, u64>> {
        self.moduli.iter().copied()
    }
}

impl IntoIterator for Schedule {
    type Item = u64;
    type IntoIter = std::iter::Copied<std::slice::Iter<'static, u64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.moduli.iter().copied()
    }
}

/// Returns the schedule for a counter width given in bits.
///
/// # Errors
///
/// Returns [`Error::UnsupportedWidth`] if no schedule is registered for `bits`.
pub fn schedule_for(bits: u32) -> Result<Schedule> {
    WordWidth::from_bits(bits).map(WordWidth::schedule)
}

/// Every prime below 2^8, descending.
const MODULI_8: [u64; 54] = [
    251, 241, 239, 233, 229, 227, 223, 211, 199, 197, //
    193, 191, 181, 179, 173, 167, 163, 157, 151, 149, //
    139, 137, 131, 127, 113, 109, 107, 103, 101, 97, //
    89, 83, 79, 73, 71, 67, 61, 59, 53, 47, //
    43, 41, 37, 31, 29, 23, 19, 17, 13, 11, //
    7, 5, 3, 2,
];

/// The 50 largest primes below 2^16.
const MODULI_16: [u64; 50] = [
    65521, 65519, 65497, 65479, 65449, 65447, 65437, 65423, 65419, 65413, //
    65407, 65393, 65381, 65371, 65357, 65353, 65327, 65323, 65309, 65293, //
    65287, 65269, 65267, 65257, 65239, 65213, 65203, 65183, 65179, 65173, //
    65171, 65167, 65147, 65141, 65129, 65123, 65119, 65111, 65101, 65099, //
    65089, 65071, 65063, 65053, 65033, 65029, 65027, 65011, 65003, 64997,
];

/// Thirty consecutive primes just below 2^32.
const MODULI_32: [u64; 30] = [
    4294966661, 4294966657, 4294966651, 4294966639, 4294966619, //
    4294966591, 4294966583, 4294966553, 4294966477, 4294966447, //
    4294966441, 4294966427, 4294966373, 4294966367, 4294966337, //
    4294966297, 4294966243, 4294966237, 4294966231, 4294966217, //
    4294966187, 4294966177, 4294966163, 4294966153, 4294966129, //
    4294966121, 4294966099, 4294966087, 4294966073, 4294966043,
];

/// Eighteen consecutive primes just below 2^63.
const MODULI_64: [u64; 18] = [
    9223372036854775783, 9223372036854775643, 9223372036854775549, //
    9223372036854775507, 9223372036854775433, 9223372036854775421, //
    9223372036854775417, 9223372036854775399, 9223372036854775351, //
    9223372036854775337, 9223372036854775291, 9223372036854775279, //
    9223372036854775259, 9223372036854775181, 9223372036854775159, //
    9223372036854775139, 9223372036854775097, 9223372036854775073,
];

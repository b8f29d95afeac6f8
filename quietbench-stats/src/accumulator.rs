//! Exact Floating-Point Summation
//!
//! A superaccumulator for `f64`. Every finite double is an integer multiple of
//! 2^-1074 and smaller than 2^1024, so a running sum fits exactly in a
//! fixed-point integer of [`WORD_COUNT`] 64-bit words plus a sign flag.
//! Additions are exact; rounding happens once, in [`Accumulator::to_f64`].
//!
//! Because the fixed-point state is exact and canonical, the result does not
//! depend on the order in which values are added.
//!
//! **Domain**: inputs must be finite. The effect of NaN or ±∞ on the
//! accumulated value is unspecified; callers filter such values out first.

use std::cmp::Ordering;

/// Number of 64-bit words in the fixed-point magnitude.
///
/// 33 words cover bit positions 2^-1074 through 2^1037, which spans every
/// finite double. The 34th word is carry headroom for long runs of additions.
pub const WORD_COUNT: usize = 34;

/// Exponent of bit 0 of word 0 (the smallest subnormal).
const BASE_EXPONENT: i32 = -1074;

const MANTISSA_BITS: u32 = 52;
const EXPONENT_MASK: u64 = 0x7ff;
const FRACTION_MASK: u64 = (1 << MANTISSA_BITS) - 1;

/// Sign+magnitude fixed-point sum of doubles.
///
/// Canonical zero has `highest_word_idx == 0` and a positive sign, so two
/// accumulators holding the same exact sum compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accumulator {
    words: [u64; WORD_COUNT],
    highest_word_idx: usize,
    negative: bool,
}

/// Fixed-point magnitude of a single double: at most two adjacent words.
#[derive(Debug, Clone, Copy)]
struct UnsignedAddend {
    words: [u64; 2],
    low_word_idx: usize,
}

impl UnsignedAddend {
    /// Decode `value` into its sign and fixed-point magnitude.
    ///
    /// Returns `None` for `+0.0` and `-0.0`.
    fn decode(value: f64) -> Option<(bool, Self)> {
        let bits = value.to_bits();
        let negative = bits >> 63 != 0;
        let biased_exponent = (bits >> MANTISSA_BITS) & EXPONENT_MASK;
        let fraction = bits & FRACTION_MASK;

        let mantissa = if biased_exponent == 0 {
            fraction
        } else {
            fraction | (1 << MANTISSA_BITS)
        };
        if mantissa == 0 {
            return None;
        }

        // Subnormals share the scale of the smallest normal exponent.
        let shift = biased_exponent.max(1) as usize - 1;
        let wide = u128::from(mantissa) << (shift % 64);

        Some((
            negative,
            Self {
                words: [wide as u64, (wide >> 64) as u64],
                low_word_idx: shift / 64,
            },
        ))
    }

    #[inline]
    fn word(&self, idx: usize) -> u64 {
        match idx.checked_sub(self.low_word_idx) {
            Some(0) => self.words[0],
            Some(1) => self.words[1],
            _ => 0,
        }
    }

    #[inline]
    fn highest_word_idx(&self) -> usize {
        if self.words[1] != 0 {
            self.low_word_idx + 1
        } else {
            self.low_word_idx
        }
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator {
    /// Canonical zero.
    pub const fn new() -> Self {
        Self {
            words: [0; WORD_COUNT],
            highest_word_idx: 0,
            negative: false,
        }
    }

    /// Whether the exact sum is zero.
    pub fn is_zero(&self) -> bool {
        self.highest_word_idx == 0 && self.words[0] == 0
    }

    /// Whether the exact sum is strictly negative.
    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// Add `value` to the exact running sum.
    ///
    /// `+0.0` and `-0.0` are no-ops.
    pub fn add(&mut self, value: f64) {
        let Some((negative, addend)) = UnsignedAddend::decode(value) else {
            return;
        };

        if negative == self.negative {
            self.add_magnitude(&addend);
        } else if self.compare_magnitude(&addend) == Ordering::Less {
            // |acc| < |addend|: the result takes the addend's sign
            self.subtract_from_addend(&addend);
            self.negative = negative;
        } else {
            self.subtract_magnitude(&addend);
        }
    }

    /// Round the exact sum to the nearest representable double (within one ulp).
    pub fn to_f64(&self) -> f64 {
        let mut total = 0.0;
        for (idx, &word) in self.words[..=self.highest_word_idx].iter().enumerate() {
            if word != 0 {
                total += word as f64 * exp2i(idx as i32 * 64 + BASE_EXPONENT);
            }
        }
        if self.negative { -total } else { total }
    }

    /// Compare `|self|` with `|addend|`, from the highest word down.
    fn compare_magnitude(&self, addend: &UnsignedAddend) -> Ordering {
        let top = self.highest_word_idx.max(addend.highest_word_idx());
        for idx in (0..=top).rev() {
            match self.words[idx].cmp(&addend.word(idx)) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }

    /// `|self| += |addend|`
    fn add_magnitude(&mut self, addend: &UnsignedAddend) {
        let mut idx = addend.low_word_idx;
        let mut carry = false;
        for word in addend.words {
            let (sum, c1) = self.words[idx].overflowing_add(word);
            let (sum, c2) = sum.overflowing_add(u64::from(carry));
            self.words[idx] = sum;
            carry = c1 || c2;
            idx += 1;
        }
        while carry {
            assert!(
                idx < WORD_COUNT,
                "accumulator overflow: carry out of the highest word"
            );
            let (sum, c) = self.words[idx].overflowing_add(1);
            self.words[idx] = sum;
            carry = c;
            idx += 1;
        }

        self.highest_word_idx = self.highest_word_idx.max(idx - 1);
        self.trim();
    }

    /// `|self| -= |addend|`, requires `|self| >= |addend|`.
    fn subtract_magnitude(&mut self, addend: &UnsignedAddend) {
        let mut idx = addend.low_word_idx;
        let mut borrow = false;
        for word in addend.words {
            let (diff, b1) = self.words[idx].overflowing_sub(word);
            let (diff, b2) = diff.overflowing_sub(u64::from(borrow));
            self.words[idx] = diff;
            borrow = b1 || b2;
            idx += 1;
        }
        while borrow {
            assert!(
                idx <= self.highest_word_idx,
                "accumulator invariant: borrow past the highest word"
            );
            let (diff, b) = self.words[idx].overflowing_sub(1);
            self.words[idx] = diff;
            borrow = b;
            idx += 1;
        }

        self.trim();
    }

    /// `|self| = |addend| - |self|`, requires `|addend| > |self|`.
    fn subtract_from_addend(&mut self, addend: &UnsignedAddend) {
        let top = self.highest_word_idx.max(addend.highest_word_idx());
        let mut borrow = false;
        for idx in 0..=top {
            let (diff, b1) = addend.word(idx).overflowing_sub(self.words[idx]);
            let (diff, b2) = diff.overflowing_sub(u64::from(borrow));
            self.words[idx] = diff;
            borrow = b1 || b2;
        }
        assert!(
            !borrow,
            "accumulator invariant: swapped subtraction left a borrow"
        );

        self.highest_word_idx = top;
        self.trim();
    }

    /// Lower `highest_word_idx` past zero words; zero becomes canonical.
    fn trim(&mut self) {
        let mut idx = self.highest_word_idx;
        while idx > 0 && self.words[idx] == 0 {
            idx -= 1;
        }
        self.highest_word_idx = idx;
        if idx == 0 && self.words[0] == 0 {
            self.negative = false;
        }
    }
}

impl Extend<f64> for Accumulator {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for value in iter {
            self.add(value);
        }
    }
}

impl FromIterator<f64> for Accumulator {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut acc = Self::new();
        acc.extend(iter);
        acc
    }
}

/// Exactly summed `values`, rounded once.
///
/// The result is independent of the order of `values`.
pub fn exact_sum(values: &[f64]) -> f64 {
    values.iter().copied().collect::<Accumulator>().to_f64()
}

/// Mean of `values` using the exact sum; `None` when empty.
pub fn exact_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(exact_sum(values) / values.len() as f64)
}

/// `2^exp` as a double, including the subnormal range.
fn exp2i(exp: i32) -> f64 {
    if exp > 1023 {
        f64::INFINITY
    } else if exp >= -1022 {
        f64::from_bits(((exp + 1023) as u64) << MANTISSA_BITS)
    } else if exp >= BASE_EXPONENT {
        f64::from_bits(1 << (exp - BASE_EXPONENT))
    } else {
        0.0
    }
}

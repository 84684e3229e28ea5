//! Binary floating-point representations.
//!
//! `Binary` extends [`num_traits::Float`] with the bit-level queries the
//! evaluator needs: frexp-style exponents, exact power-of-two scaling,
//! neighbouring values and error-free transformations.

use std::fmt;

use num_traits::Float;

use crate::rounding::Direction;

/// An IEEE-754 binary floating-point representation.
///
/// Exponents follow the frexp convention: a finite nonzero `x` is written
/// `m * 2^e` with `0.5 <= |m| < 1`, so `1.0` has exponent 1.
pub trait Binary: Float + fmt::Debug + fmt::Display + Default + Send + Sync + 'static {
    /// Significand width in bits, including the implicit leading bit.
    const MANTISSA_DIGITS: u32;

    /// Smallest frexp exponent of a normal value.
    const MIN_EXP: i32;

    /// One more than the largest frexp exponent of a finite value.
    const MAX_EXP: i32;

    /// Short name used in diagnostics.
    const NAME: &'static str;

    /// Returns `2^k` exactly.
    ///
    /// `k` must lie in `MIN_EXP - 1 ..= MAX_EXP - 1` (the normal range).
    fn exp2i(k: i32) -> Self;

    /// The least value strictly greater than `self`.
    #[must_use]
    fn next_up(self) -> Self;

    /// Converts an integer with round-to-nearest.
    fn from_i64(n: i64) -> Self;

    /// The greatest value strictly less than `self`.
    #[must_use]
    fn next_down(self) -> Self {
        -(-self).next_up()
    }

    /// Returns the frexp exponent, or `None` for zero and non-finite values.
    fn exponent(self) -> Option<i32> {
        if !self.is_finite() {
            return None;
        }
        let (mantissa, exp, _) = self.integer_decode();
        if mantissa == 0 {
            return None;
        }
        let bits = 64 - mantissa.leading_zeros();
        Some(i32::from(exp) + bits as i32)
    }

    /// Returns the exponent of the least significant set bit.
    ///
    /// `x` is an integer multiple of `2^lowest_bit(x)`.
    fn lowest_bit(self) -> Option<i32> {
        if !self.is_finite() {
            return None;
        }
        let (mantissa, exp, _) = self.integer_decode();
        if mantissa == 0 {
            return None;
        }
        Some(i32::from(exp) + mantissa.trailing_zeros() as i32)
    }

    /// If `|self| == 2^k`, returns `k`.
    fn power_of_two(self) -> Option<i32> {
        if !self.is_finite() {
            return None;
        }
        let (mantissa, exp, _) = self.integer_decode();
        if mantissa.is_power_of_two() {
            Some(i32::from(exp) + mantissa.trailing_zeros() as i32)
        } else {
            None
        }
    }

    /// Multiplies by `2^e`.
    ///
    /// Exact whenever the result is representable; see
    /// [`Binary::safe_scale_range`].
    #[must_use]
    fn scale(self, e: i32) -> Self {
        let mut x = self;
        let mut e = e;
        while e > 0 {
            let k = e.min(Self::MAX_EXP - 1);
            x = x * Self::exp2i(k);
            e -= k;
        }
        while e < 0 {
            let k = e.max(Self::MIN_EXP - 1);
            x = x * Self::exp2i(k);
            e -= k;
        }
        x
    }

    /// The closed range of `e` for which `self.scale(e)` is lossless.
    ///
    /// Zero and infinities scale losslessly by any amount.
    fn safe_scale_range(self) -> (i32, i32) {
        match (self.exponent(), self.lowest_bit()) {
            (Some(top), Some(bottom)) => {
                let quantum = Self::MIN_EXP - Self::MANTISSA_DIGITS as i32;
                (quantum - bottom, Self::MAX_EXP - top)
            }
            _ => (i32::MIN, i32::MAX),
        }
    }

    /// Smallest positive subnormal value.
    fn min_subnormal() -> Self {
        Self::zero().next_up()
    }

    /// Below this magnitude the error terms of a product or quotient may
    /// themselves underflow.
    fn fma_threshold() -> Self {
        Self::exp2i(Self::MIN_EXP - 1 + Self::MANTISSA_DIGITS as i32)
    }

    /// Converts an integer, rounding in the given direction.
    fn from_i64_directed(n: i64, dir: Direction) -> Self {
        let x = Self::from_i64(n);
        match (x.to_i128(), dir) {
            (Some(v), Direction::Down) if v > i128::from(n) => x.next_down(),
            (Some(v), Direction::Up) if v < i128::from(n) => x.next_up(),
            _ => x,
        }
    }

    /// Returns the integer value if `self` is integral and fits in `i64`.
    fn to_i64_exact(self) -> Option<i64> {
        if !self.is_finite() || self.fract() != Self::zero() {
            return None;
        }
        self.to_i64()
    }
}

/// Knuth's two-sum: `a + b == s + err` exactly, for any ordering of `a`, `b`.
///
/// Only meaningful when `s` is finite.
pub fn two_sum<T: Binary>(a: T, b: T) -> (T, T) {
    let s = a + b;
    let bb = s - a;
    let err = (a - (s - bb)) + (b - bb);
    (s, err)
}

/// Dekker's fast two-sum. Requires `|a| >= |b|`.
pub fn fast_two_sum<T: Binary>(a: T, b: T) -> (T, T) {
    let s = a + b;
    let delta = s - a;
    (s, b - delta)
}

/// Error-free product through fused multiply-add.
///
/// Exact as long as `|a * b|` stays above [`Binary::fma_threshold`].
pub fn two_prod<T: Binary>(a: T, b: T) -> (T, T) {
    let p = a * b;
    (p, a.mul_add(b, -p))
}

macro_rules! impl_binary {
    ($t:ty, $bits:ty, $name:literal, $frac:expr, $bias:expr) => {
        impl Binary for $t {
            const MANTISSA_DIGITS: u32 = <$t>::MANTISSA_DIGITS;
            const MIN_EXP: i32 = <$t>::MIN_EXP;
            const MAX_EXP: i32 = <$t>::MAX_EXP;
            const NAME: &'static str = $name;

            fn exp2i(k: i32) -> Self {
                debug_assert!((Self::MIN_EXP - 1..Self::MAX_EXP).contains(&k));
                <$t>::from_bits(((k + $bias) as $bits) << $frac)
            }

            fn next_up(self) -> Self {
                if self.is_nan() || self == <$t>::INFINITY {
                    return self;
                }
                if self == 0.0 {
                    return <$t>::from_bits(1);
                }
                let bits = self.to_bits();
                if self > 0.0 {
                    <$t>::from_bits(bits + 1)
                } else {
                    <$t>::from_bits(bits - 1)
                }
            }

            #[allow(clippy::cast_precision_loss)]
            fn from_i64(n: i64) -> Self {
                n as $t
            }
        }
    };
}

impl_binary!(f32, u32, "f32", 23, 127);
impl_binary!(f64, u64, "f64", 52, 1023);

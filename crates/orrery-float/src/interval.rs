//! Faithfully-rounded interval arithmetic.
//!
//! Multiplication and division dispatch on the sign class of each operand
//! (negative, straddling zero, positive). Each case picks which endpoint
//! products form the bounds; the lower bound is always rounded down and the
//! upper bound up, so the exact result set is contained in the returned
//! interval.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{IndeterminateForm, IntervalError};
use crate::float::Binary;
use crate::rounding::{Direction, RoundingContext};

use Direction::{Down, Up};

/// Sign classification of an interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignClass {
    /// Every element is `<= 0`.
    Negative,
    /// The interior contains zero.
    Straddles,
    /// Every element is `>= 0`.
    Positive,
}

/// A closed interval `[lo, hi]` of a binary float representation.
///
/// Invariant: `lo <= hi` and neither bound is NaN, except for the
/// distinguished empty sentinel, which no arithmetic operation returns.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval<T> {
    lo: T,
    hi: T,
}

impl<T: Binary> Interval<T> {
    /// Creates an interval from its bounds.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` if a bound is NaN or `lo > hi`.
    pub fn new(lo: T, hi: T) -> Result<Self, IntervalError> {
        if lo.is_nan() || hi.is_nan() || lo > hi {
            return Err(IntervalError::Malformed);
        }
        Ok(Self { lo, hi })
    }

    /// Creates the degenerate interval `[x, x]`.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` if `x` is NaN.
    pub fn point(x: T) -> Result<Self, IntervalError> {
        Self::new(x, x)
    }

    /// The tightest enclosure of an integer.
    #[must_use]
    pub fn from_i64(n: i64) -> Self {
        Self {
            lo: T::from_i64_directed(n, Down),
            hi: T::from_i64_directed(n, Up),
        }
    }

    /// The empty sentinel.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            lo: T::nan(),
            hi: T::nan(),
        }
    }

    /// `[0, 0]`.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            lo: T::zero(),
            hi: T::zero(),
        }
    }

    /// `[1, 1]`.
    #[must_use]
    pub fn one() -> Self {
        Self {
            lo: T::one(),
            hi: T::one(),
        }
    }

    /// Lower bound.
    #[must_use]
    pub fn lo(&self) -> T {
        self.lo
    }

    /// Upper bound.
    #[must_use]
    pub fn hi(&self) -> T {
        self.hi
    }

    /// Returns true for the empty sentinel.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lo.is_nan() || self.hi.is_nan()
    }

    /// Returns true if both bounds coincide.
    #[must_use]
    pub fn is_point(&self) -> bool {
        self.lo == self.hi
    }

    /// Returns true for `[0, 0]`.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.lo.is_zero() && self.hi.is_zero()
    }

    /// Returns true for `[1, 1]`.
    #[must_use]
    pub fn is_one(&self) -> bool {
        self.lo == T::one() && self.hi == T::one()
    }

    /// Returns true if both bounds are finite.
    #[must_use]
    pub fn is_bounded(&self) -> bool {
        self.lo.is_finite() && self.hi.is_finite()
    }

    /// Returns true if `x` lies in the interval.
    #[must_use]
    pub fn contains(&self, x: T) -> bool {
        self.lo <= x && x <= self.hi
    }

    /// Returns true if zero lies in the interval.
    #[must_use]
    pub fn contains_zero(&self) -> bool {
        self.contains(T::zero())
    }

    /// Sign classification used by the case dispatch.
    #[must_use]
    pub fn sign_class(&self) -> SignClass {
        if self.lo >= T::zero() {
            SignClass::Positive
        } else if self.hi <= T::zero() {
            SignClass::Negative
        } else {
            SignClass::Straddles
        }
    }

    /// The sign shared by every element, if there is one.
    #[must_use]
    pub fn sgn(&self) -> Option<i8> {
        if self.is_zero() {
            Some(0)
        } else if self.lo > T::zero() {
            Some(1)
        } else if self.hi < T::zero() {
            Some(-1)
        } else {
            None
        }
    }

    /// Upper bound on `hi - lo`.
    #[must_use]
    pub fn width(&self, cx: &RoundingContext) -> T {
        cx.sub(self.hi, self.lo, Up)
    }

    /// A point inside the interval.
    #[must_use]
    pub fn midpoint(&self) -> T {
        if !self.is_bounded() {
            return match (self.lo.is_finite(), self.hi.is_finite()) {
                (true, false) => self.lo,
                (false, true) => self.hi,
                _ => T::zero(),
            };
        }
        let half = T::exp2i(-1);
        let mid = self.lo * half + self.hi * half;
        mid.max(self.lo).min(self.hi)
    }

    /// Smallest interval containing both operands.
    #[must_use]
    pub fn hull(&self, other: &Self) -> Self {
        Self {
            lo: self.lo.min(other.lo),
            hi: self.hi.max(other.hi),
        }
    }

    /// Exact negation.
    #[must_use]
    pub fn neg(&self) -> Self {
        Self {
            lo: -self.hi,
            hi: -self.lo,
        }
    }

    /// Exact absolute value.
    #[must_use]
    pub fn abs(&self) -> Self {
        match self.sign_class() {
            SignClass::Positive => *self,
            SignClass::Negative => self.neg(),
            SignClass::Straddles => Self {
                lo: T::zero(),
                hi: self.hi.max(-self.lo),
            },
        }
    }

    /// Multiplies both bounds by `2^e`. Lossless inside the safe range.
    #[must_use]
    pub fn scale(&self, e: i32) -> Self {
        Self {
            lo: self.lo.scale(e),
            hi: self.hi.scale(e),
        }
    }

    /// Intersection of the bounds' lossless scaling ranges.
    #[must_use]
    pub fn safe_scale_range(&self) -> (i32, i32) {
        let (a_lo, a_hi) = self.lo.safe_scale_range();
        let (b_lo, b_hi) = self.hi.safe_scale_range();
        (a_lo.max(b_lo), a_hi.min(b_hi))
    }

    /// Partial order: `Some` only when the comparison holds for every pair
    /// of elements.
    #[must_use]
    pub fn value_compare(&self, other: &Self) -> Option<Ordering> {
        if self.is_empty() || other.is_empty() {
            return None;
        }
        if self.is_point() && other.is_point() && self.lo == other.lo {
            Some(Ordering::Equal)
        } else if self.hi < other.lo {
            Some(Ordering::Less)
        } else if self.lo > other.hi {
            Some(Ordering::Greater)
        } else {
            None
        }
    }

    /// Interval sum.
    ///
    /// # Errors
    ///
    /// `Indeterminate` when infinities of opposite sign meet.
    pub fn add(&self, rhs: &Self, cx: &RoundingContext) -> Result<Self, IntervalError> {
        self.check(rhs)?;
        finish(
            cx.add(self.lo, rhs.lo, Down),
            cx.add(self.hi, rhs.hi, Up),
            IndeterminateForm::InfinityMinusInfinity,
        )
    }

    /// Interval difference.
    ///
    /// # Errors
    ///
    /// `Indeterminate` when infinities of the same sign meet.
    pub fn sub(&self, rhs: &Self, cx: &RoundingContext) -> Result<Self, IntervalError> {
        self.add(&rhs.neg(), cx)
    }

    /// Interval product.
    ///
    /// # Errors
    ///
    /// `Indeterminate` when a zero bound meets an infinite one.
    pub fn mul(&self, rhs: &Self, cx: &RoundingContext) -> Result<Self, IntervalError> {
        use SignClass::{Negative as N, Positive as P, Straddles as M};

        self.check(rhs)?;
        let (a, b) = (self, rhs);
        let (lo, hi) = match (a.sign_class(), b.sign_class()) {
            (P, P) => (cx.mul(a.lo, b.lo, Down), cx.mul(a.hi, b.hi, Up)),
            (P, N) => (cx.mul(a.hi, b.lo, Down), cx.mul(a.lo, b.hi, Up)),
            (P, M) => (cx.mul(a.hi, b.lo, Down), cx.mul(a.hi, b.hi, Up)),
            (N, P) => (cx.mul(a.lo, b.hi, Down), cx.mul(a.hi, b.lo, Up)),
            (N, N) => (cx.mul(a.hi, b.hi, Down), cx.mul(a.lo, b.lo, Up)),
            (N, M) => (cx.mul(a.lo, b.hi, Down), cx.mul(a.lo, b.lo, Up)),
            (M, P) => (cx.mul(a.lo, b.hi, Down), cx.mul(a.hi, b.hi, Up)),
            (M, N) => (cx.mul(a.hi, b.lo, Down), cx.mul(a.lo, b.lo, Up)),
            (M, M) => {
                let lo1 = cx.mul(a.lo, b.hi, Down);
                let lo2 = cx.mul(a.hi, b.lo, Down);
                let hi1 = cx.mul(a.lo, b.lo, Up);
                let hi2 = cx.mul(a.hi, b.hi, Up);
                if lo1.is_nan() || lo2.is_nan() || hi1.is_nan() || hi2.is_nan() {
                    return Err(IntervalError::Indeterminate(IndeterminateForm::ZeroTimesInfinity));
                }
                (lo1.min(lo2), hi1.max(hi2))
            }
        };
        finish(lo, hi, IndeterminateForm::ZeroTimesInfinity)
    }

    /// Interval quotient.
    ///
    /// A divisor with a zero endpoint yields a half-unbounded result.
    ///
    /// # Errors
    ///
    /// `DivisionByZero` if the divisor is `[0, 0]` or its interior straddles
    /// zero; `Indeterminate` for `0 / 0` and `infinity / infinity`.
    pub fn div(&self, rhs: &Self, cx: &RoundingContext) -> Result<Self, IntervalError> {
        use SignClass::{Negative as N, Positive as P, Straddles as M};

        self.check(rhs)?;
        let (a, b) = (self, rhs);
        let zero = T::zero();

        if b.is_zero() || (b.lo < zero && b.hi > zero) {
            return Err(IntervalError::DivisionByZero);
        }

        if b.lo.is_zero() || b.hi.is_zero() {
            let inf = T::infinity();
            let (lo, hi) = match (b.lo.is_zero(), a.lo > zero, a.hi < zero) {
                (true, true, _) => (cx.div(a.lo, b.hi, Down), inf),
                (true, _, true) => (-inf, cx.div(a.hi, b.hi, Up)),
                (false, true, _) => (-inf, cx.div(a.lo, b.lo, Up)),
                (false, _, true) => (cx.div(a.hi, b.lo, Down), inf),
                _ => return Err(IntervalError::Indeterminate(IndeterminateForm::ZeroOverZero)),
            };
            return finish(lo, hi, IndeterminateForm::InfinityOverInfinity);
        }

        let (lo, hi) = if b.lo > zero {
            match a.sign_class() {
                P => (cx.div(a.lo, b.hi, Down), cx.div(a.hi, b.lo, Up)),
                N => (cx.div(a.lo, b.lo, Down), cx.div(a.hi, b.hi, Up)),
                M => (cx.div(a.lo, b.lo, Down), cx.div(a.hi, b.lo, Up)),
            }
        } else {
            match a.sign_class() {
                P => (cx.div(a.hi, b.hi, Down), cx.div(a.lo, b.lo, Up)),
                N => (cx.div(a.hi, b.lo, Down), cx.div(a.lo, b.hi, Up)),
                M => (cx.div(a.hi, b.hi, Down), cx.div(a.lo, b.hi, Up)),
            }
        };
        finish(lo, hi, IndeterminateForm::InfinityOverInfinity)
    }

    /// Interval square. Tighter than `self * self` for spans straddling
    /// zero, where squaring is not monotonic.
    ///
    /// # Errors
    ///
    /// `EmptyOperand` for the empty sentinel.
    pub fn square(&self, cx: &RoundingContext) -> Result<Self, IntervalError> {
        self.powi(2, cx)
    }

    /// Integer power by repeated squaring.
    ///
    /// # Errors
    ///
    /// `Indeterminate` for `0^0` (the interval contains zero and `n == 0`),
    /// `DivisionByZero` for a negative power of an interval containing zero.
    pub fn powi(&self, n: i32, cx: &RoundingContext) -> Result<Self, IntervalError> {
        self.check(self)?;
        if n == 0 {
            if self.contains_zero() {
                return Err(IntervalError::Indeterminate(IndeterminateForm::ZeroPowZero));
            }
            return Ok(Self::one());
        }
        if n < 0 {
            let positive = self.powi_unsigned(n.unsigned_abs(), cx);
            return Self::one().div(&positive?, cx);
        }
        self.powi_unsigned(n.unsigned_abs(), cx)
    }

    fn powi_unsigned(&self, n: u32, cx: &RoundingContext) -> Result<Self, IntervalError> {
        let (lo, hi) = if n % 2 == 1 {
            (signed_pow(self.lo, n, Down, cx), signed_pow(self.hi, n, Up, cx))
        } else {
            match self.sign_class() {
                SignClass::Positive => (
                    cx.powi_nonneg(self.lo.abs(), n, Down),
                    cx.powi_nonneg(self.hi, n, Up),
                ),
                SignClass::Negative => (
                    cx.powi_nonneg(-self.hi, n, Down),
                    cx.powi_nonneg(-self.lo, n, Up),
                ),
                SignClass::Straddles => (
                    T::zero(),
                    cx.powi_nonneg(self.hi.max(-self.lo), n, Up),
                ),
            }
        };
        finish(lo, hi, IndeterminateForm::ZeroTimesInfinity)
    }

    fn check(&self, rhs: &Self) -> Result<(), IntervalError> {
        if self.is_empty() || rhs.is_empty() {
            Err(IntervalError::EmptyOperand)
        } else {
            Ok(())
        }
    }
}

fn signed_pow<T: Binary>(x: T, n: u32, dir: Direction, cx: &RoundingContext) -> T {
    if x.is_sign_negative() {
        -cx.powi_nonneg(-x, n, dir.reverse())
    } else {
        cx.powi_nonneg(x, n, dir)
    }
}

fn finish<T: Binary>(lo: T, hi: T, what: IndeterminateForm) -> Result<Interval<T>, IntervalError> {
    if lo.is_nan() || hi.is_nan() {
        return Err(IntervalError::Indeterminate(what));
    }
    debug_assert!(lo <= hi, "inverted bounds [{lo}, {hi}]");
    Ok(Interval { lo, hi })
}

impl<T: Binary> fmt::Display for Interval<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "[empty]")
        } else {
            write!(f, "[{:?}, {:?}]", self.lo, self.hi)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(lo: f64, hi: f64) -> Interval<f64> {
        Interval::new(lo, hi).unwrap()
    }

    #[test]
    fn test_construction() {
        assert!(Interval::new(2.0, 1.0).is_err());
        assert!(Interval::new(f64::NAN, 1.0).is_err());
        assert!(Interval::<f64>::empty().is_empty());
        assert!(iv(1.0, 1.0).is_point());
        assert_eq!(Interval::<f64>::from_i64(5), iv(5.0, 5.0));
    }

    #[test]
    fn test_mul_positive_positive() {
        let cx = RoundingContext::new();
        let r = iv(1.0, 2.0).mul(&iv(3.0, 4.0), &cx).unwrap();
        assert_eq!(r, iv(3.0, 8.0));
    }

    #[test]
    fn test_mul_sign_cases() {
        let cx = RoundingContext::new();
        assert_eq!(
            iv(-2.0, 3.0).mul(&iv(-5.0, 4.0), &cx).unwrap(),
            iv(-15.0, 12.0)
        );
        assert_eq!(
            iv(-2.0, -1.0).mul(&iv(3.0, 4.0), &cx).unwrap(),
            iv(-8.0, -3.0)
        );
        assert_eq!(
            iv(-2.0, -1.0).mul(&iv(-1.0, 4.0), &cx).unwrap(),
            iv(-8.0, 2.0)
        );
        assert_eq!(iv(0.0, 1.0).mul(&iv(-1.0, 0.0), &cx).unwrap(), iv(-1.0, 0.0));
    }

    #[test]
    fn test_mul_zero_infinity() {
        let cx = RoundingContext::new();
        let zero = iv(0.0, 0.0);
        let inf = iv(f64::INFINITY, f64::INFINITY);
        assert!(matches!(
            zero.mul(&inf, &cx),
            Err(IntervalError::Indeterminate(_))
        ));
        // A zero endpoint next to an unbounded one is fine.
        let r = iv(0.0, 1.0).mul(&iv(2.0, f64::INFINITY), &cx).unwrap();
        assert_eq!(r, iv(0.0, f64::INFINITY));
    }

    #[test]
    fn test_add_sub() {
        let cx = RoundingContext::new();
        assert_eq!(iv(1.0, 2.0).add(&iv(3.0, 4.0), &cx).unwrap(), iv(4.0, 6.0));
        assert_eq!(iv(1.0, 2.0).sub(&iv(3.0, 4.0), &cx).unwrap(), iv(-3.0, -1.0));
        let pos = iv(f64::INFINITY, f64::INFINITY);
        assert!(pos.sub(&pos, &cx).is_err());
        assert!(iv(1.0, 2.0).add(&Interval::empty(), &cx).is_err());
    }

    #[test]
    fn test_add_is_outward_rounded() {
        let cx = RoundingContext::new();
        let r = iv(0.1, 0.1).add(&iv(0.2, 0.2), &cx).unwrap();
        assert!(r.lo() < r.hi());
        assert!(r.contains(0.1 + 0.2));
    }

    #[test]
    fn test_div_cases() {
        let cx = RoundingContext::new();
        assert_eq!(iv(1.0, 2.0).div(&iv(4.0, 8.0), &cx).unwrap(), iv(0.125, 0.5));
        assert_eq!(iv(1.0, 2.0).div(&iv(-4.0, -2.0), &cx).unwrap(), iv(-1.0, -0.25));
        assert_eq!(iv(-2.0, 1.0).div(&iv(-4.0, -2.0), &cx).unwrap(), iv(-0.5, 1.0));
    }

    #[test]
    fn test_div_by_zero_endpoint() {
        let cx = RoundingContext::new();
        let r = iv(1.0, 2.0).div(&iv(0.0, 4.0), &cx).unwrap();
        assert_eq!(r, iv(0.25, f64::INFINITY));
        let r = iv(1.0, 2.0).div(&iv(-4.0, 0.0), &cx).unwrap();
        assert_eq!(r, iv(f64::NEG_INFINITY, -0.25));
        assert!(matches!(
            iv(-1.0, 1.0).div(&iv(0.0, 1.0), &cx),
            Err(IntervalError::Indeterminate(_))
        ));
    }

    #[test]
    fn test_div_by_straddling_zero_fails() {
        let cx = RoundingContext::new();
        assert_eq!(
            iv(1.0, 2.0).div(&iv(-1.0, 1.0), &cx),
            Err(IntervalError::DivisionByZero)
        );
        assert_eq!(
            iv(1.0, 2.0).div(&iv(0.0, 0.0), &cx),
            Err(IntervalError::DivisionByZero)
        );
    }

    #[test]
    fn test_square_straddling() {
        let cx = RoundingContext::new();
        assert_eq!(iv(-3.0, 2.0).square(&cx).unwrap(), iv(0.0, 9.0));
        assert_eq!(iv(-3.0, -2.0).square(&cx).unwrap(), iv(4.0, 9.0));
    }

    #[test]
    fn test_powi() {
        let cx = RoundingContext::new();
        assert_eq!(iv(-1.0, 2.0).powi(3, &cx).unwrap(), iv(-1.0, 8.0));
        assert_eq!(iv(2.0, 4.0).powi(-1, &cx).unwrap(), iv(0.25, 0.5));
        assert_eq!(iv(2.0, 4.0).powi(0, &cx).unwrap(), Interval::one());
        assert!(iv(-1.0, 1.0).powi(0, &cx).is_err());
    }

    #[test]
    fn test_value_compare() {
        assert_eq!(iv(1.0, 2.0).value_compare(&iv(3.0, 4.0)), Some(Ordering::Less));
        assert_eq!(iv(1.0, 3.0).value_compare(&iv(2.0, 4.0)), None);
        assert_eq!(iv(2.0, 2.0).value_compare(&iv(2.0, 2.0)), Some(Ordering::Equal));
    }

    #[test]
    fn test_abs_hull_midpoint() {
        assert_eq!(iv(-3.0, 2.0).abs(), iv(0.0, 3.0));
        assert_eq!(iv(-3.0, -2.0).abs(), iv(2.0, 3.0));
        assert_eq!(iv(0.0, 1.0).hull(&iv(3.0, 4.0)), iv(0.0, 4.0));
        assert_eq!(iv(1.0, 3.0).midpoint(), 2.0);
    }
}

//! Leaf values: the closed set of machine representations.

use std::cmp::Ordering;
use std::fmt;

use orrery_float::float::two_prod;
use orrery_float::{
    rearrange, rearrange_interval, Binary, IndeterminateForm, Interval, Rearranged,
    RoundingContext,
};

use crate::domain::{Domain, Precedence, Sign};
use crate::error::{ArithError, Representation};
use crate::value::{ExactScaling, NumericValue};

/// A non-composite numeric value.
///
/// Never holds NaN or an empty interval; constructors reject both.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Leaf {
    /// Machine integer.
    Int(i64),
    /// Single-precision float.
    F32(f32),
    /// Double-precision float.
    F64(f64),
    /// Interval with single-precision bounds.
    IntervalF32(Interval<f32>),
    /// Interval with double-precision bounds.
    IntervalF64(Interval<f64>),
}

impl Leaf {
    /// Wraps a single-precision float.
    ///
    /// # Errors
    ///
    /// `Domain` for NaN.
    pub fn from_f32(x: f32) -> Result<Self, ArithError> {
        if x.is_nan() {
            return Err(not_a_number());
        }
        Ok(Leaf::F32(x))
    }

    /// Wraps a double-precision float.
    ///
    /// # Errors
    ///
    /// `Domain` for NaN.
    pub fn from_f64(x: f64) -> Result<Self, ArithError> {
        if x.is_nan() {
            return Err(not_a_number());
        }
        Ok(Leaf::F64(x))
    }

    /// Wraps a single-precision interval.
    ///
    /// # Errors
    ///
    /// `Domain` for the empty sentinel.
    pub fn from_interval_f32(iv: Interval<f32>) -> Result<Self, ArithError> {
        if iv.is_empty() {
            return Err(ArithError::Domain("empty interval".to_string()));
        }
        Ok(Leaf::IntervalF32(iv))
    }

    /// Wraps a double-precision interval.
    ///
    /// # Errors
    ///
    /// `Domain` for the empty sentinel.
    pub fn from_interval_f64(iv: Interval<f64>) -> Result<Self, ArithError> {
        if iv.is_empty() {
            return Err(ArithError::Domain("empty interval".to_string()));
        }
        Ok(Leaf::IntervalF64(iv))
    }

    /// Additive identity in the given representation.
    #[must_use]
    pub fn zero_of(repr: Representation) -> Self {
        match repr {
            Representation::Int => Leaf::Int(0),
            Representation::F32 => Leaf::F32(0.0),
            Representation::F64 => Leaf::F64(0.0),
            Representation::IntervalF32 => Leaf::IntervalF32(Interval::zero()),
            Representation::IntervalF64 => Leaf::IntervalF64(Interval::zero()),
        }
    }

    /// Multiplicative identity in the given representation.
    #[must_use]
    pub fn one_of(repr: Representation) -> Self {
        match repr {
            Representation::Int => Leaf::Int(1),
            Representation::F32 => Leaf::F32(1.0),
            Representation::F64 => Leaf::F64(1.0),
            Representation::IntervalF32 => Leaf::IntervalF32(Interval::one()),
            Representation::IntervalF64 => Leaf::IntervalF64(Interval::one()),
        }
    }

    /// The machine representation.
    #[must_use]
    pub fn representation(&self) -> Representation {
        match self {
            Leaf::Int(_) => Representation::Int,
            Leaf::F32(_) => Representation::F32,
            Leaf::F64(_) => Representation::F64,
            Leaf::IntervalF32(_) => Representation::IntervalF32,
            Leaf::IntervalF64(_) => Representation::IntervalF64,
        }
    }

    /// The integer value, if the leaf holds exactly one.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Leaf::Int(n) => Some(*n),
            Leaf::F32(x) => x.to_i64_exact(),
            Leaf::F64(x) => x.to_i64_exact(),
            Leaf::IntervalF32(iv) if iv.is_point() => iv.lo().to_i64_exact(),
            Leaf::IntervalF64(iv) if iv.is_point() => iv.lo().to_i64_exact(),
            Leaf::IntervalF32(_) | Leaf::IntervalF64(_) => None,
        }
    }

    /// Returns true unless a bound or the value is infinite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        match self {
            Leaf::Int(_) => true,
            Leaf::F32(x) => x.is_finite(),
            Leaf::F64(x) => x.is_finite(),
            Leaf::IntervalF32(iv) => iv.is_bounded(),
            Leaf::IntervalF64(iv) => iv.is_bounded(),
        }
    }

    /// Frexp exponent of the largest magnitude the leaf can take.
    ///
    /// `None` for zero and unbounded values.
    #[must_use]
    pub fn magnitude_exponent(&self) -> Option<i32> {
        match self {
            Leaf::Int(0) => None,
            Leaf::Int(n) => Some(64 - n.unsigned_abs().leading_zeros() as i32),
            Leaf::F32(x) => x.exponent(),
            Leaf::F64(x) => x.exponent(),
            Leaf::IntervalF32(iv) => iv.abs().hi().exponent(),
            Leaf::IntervalF64(iv) => iv.abs().hi().exponent(),
        }
    }

    /// The next representation up the ladder, holding the same value (an
    /// enclosure of it, for the interval step).
    ///
    /// `i64 → f64` (or `interval<f64>` when not exactly representable),
    /// `f32 → f64 → interval<f64>`, `interval<f32> → interval<f64>`.
    #[must_use]
    pub fn upgrade(&self) -> Option<Leaf> {
        match *self {
            Leaf::Int(n) => Some(
                self.convert_exact(Representation::F64)
                    .unwrap_or(Leaf::IntervalF64(Interval::from_i64(n))),
            ),
            Leaf::F32(x) => Some(Leaf::F64(f64::from(x))),
            Leaf::F64(x) => Interval::point(x).ok().map(Leaf::IntervalF64),
            Leaf::IntervalF32(iv) => Interval::new(f64::from(iv.lo()), f64::from(iv.hi()))
                .ok()
                .map(Leaf::IntervalF64),
            Leaf::IntervalF64(_) => None,
        }
    }

    /// Converts up to `repr` without losing anything, if possible.
    #[must_use]
    pub fn convert_exact(&self, repr: Representation) -> Option<Leaf> {
        if self.representation() == repr {
            return Some(*self);
        }
        match (*self, repr) {
            (Leaf::Int(n), Representation::F32) => {
                let x = f32::from_i64(n);
                (x.to_i64_exact() == Some(n)).then_some(Leaf::F32(x))
            }
            (Leaf::Int(n), Representation::F64) => {
                let x = f64::from_i64(n);
                (x.to_i64_exact() == Some(n)).then_some(Leaf::F64(x))
            }
            (Leaf::Int(n), Representation::IntervalF32) => {
                Some(Leaf::IntervalF32(Interval::from_i64(n)))
            }
            (Leaf::Int(n), Representation::IntervalF64) => {
                Some(Leaf::IntervalF64(Interval::from_i64(n)))
            }
            (Leaf::F32(x), Representation::F64) => Some(Leaf::F64(f64::from(x))),
            (Leaf::F32(x), Representation::IntervalF32) => {
                Interval::point(x).ok().map(Leaf::IntervalF32)
            }
            (Leaf::F32(x), Representation::IntervalF64) => {
                Interval::point(f64::from(x)).ok().map(Leaf::IntervalF64)
            }
            (Leaf::F64(x), Representation::IntervalF64) => {
                Interval::point(x).ok().map(Leaf::IntervalF64)
            }
            (Leaf::IntervalF32(_), Representation::IntervalF64) => self.upgrade(),
            _ => None,
        }
    }

    /// Brings two leaves to a common representation, moving the lower one
    /// up the ladder.
    #[must_use]
    pub fn promote_pair(a: Leaf, b: Leaf) -> (Leaf, Leaf) {
        let (mut a, mut b) = (a, b);
        while a.representation() != b.representation() {
            let (low, target) = if a.representation() < b.representation() {
                (&mut a, b.representation())
            } else {
                (&mut b, a.representation())
            };
            match low.convert_exact(target).or_else(|| low.upgrade()) {
                Some(next) => *low = next,
                None => break,
            }
        }
        (a, b)
    }

    /// Sum, rounded to nearest (outward for intervals).
    ///
    /// # Errors
    ///
    /// `Overflow` when the result leaves the representation's range,
    /// `Indeterminate` for cancelling infinities.
    pub fn add(&self, rhs: &Leaf, cx: &RoundingContext) -> Result<Leaf, ArithError> {
        let form = IndeterminateForm::InfinityMinusInfinity;
        match Leaf::promote_pair(*self, *rhs) {
            (Leaf::Int(x), Leaf::Int(y)) => x.checked_add(y).map(Leaf::Int).ok_or(overflow(Representation::Int)),
            (Leaf::F32(x), Leaf::F32(y)) => checked(x + y, x, y, form, Representation::F32).map(Leaf::F32),
            (Leaf::F64(x), Leaf::F64(y)) => checked(x + y, x, y, form, Representation::F64).map(Leaf::F64),
            (Leaf::IntervalF32(x), Leaf::IntervalF32(y)) => Ok(Leaf::IntervalF32(x.add(&y, cx)?)),
            (Leaf::IntervalF64(x), Leaf::IntervalF64(y)) => Ok(Leaf::IntervalF64(x.add(&y, cx)?)),
            (a, b) => Err(unhandled(a, b)),
        }
    }

    /// Difference.
    ///
    /// # Errors
    ///
    /// As for [`Leaf::add`].
    pub fn sub(&self, rhs: &Leaf, cx: &RoundingContext) -> Result<Leaf, ArithError> {
        let form = IndeterminateForm::InfinityMinusInfinity;
        match Leaf::promote_pair(*self, *rhs) {
            (Leaf::Int(x), Leaf::Int(y)) => x.checked_sub(y).map(Leaf::Int).ok_or(overflow(Representation::Int)),
            (Leaf::F32(x), Leaf::F32(y)) => checked(x - y, x, y, form, Representation::F32).map(Leaf::F32),
            (Leaf::F64(x), Leaf::F64(y)) => checked(x - y, x, y, form, Representation::F64).map(Leaf::F64),
            (Leaf::IntervalF32(x), Leaf::IntervalF32(y)) => Ok(Leaf::IntervalF32(x.sub(&y, cx)?)),
            (Leaf::IntervalF64(x), Leaf::IntervalF64(y)) => Ok(Leaf::IntervalF64(x.sub(&y, cx)?)),
            (a, b) => Err(unhandled(a, b)),
        }
    }

    /// Product.
    ///
    /// # Errors
    ///
    /// `Overflow` out of range, `Indeterminate` for `0 * infinity`.
    pub fn mul(&self, rhs: &Leaf, cx: &RoundingContext) -> Result<Leaf, ArithError> {
        let form = IndeterminateForm::ZeroTimesInfinity;
        match Leaf::promote_pair(*self, *rhs) {
            (Leaf::Int(x), Leaf::Int(y)) => x.checked_mul(y).map(Leaf::Int).ok_or(overflow(Representation::Int)),
            (Leaf::F32(x), Leaf::F32(y)) => checked(x * y, x, y, form, Representation::F32).map(Leaf::F32),
            (Leaf::F64(x), Leaf::F64(y)) => checked(x * y, x, y, form, Representation::F64).map(Leaf::F64),
            (Leaf::IntervalF32(x), Leaf::IntervalF32(y)) => Ok(Leaf::IntervalF32(x.mul(&y, cx)?)),
            (Leaf::IntervalF64(x), Leaf::IntervalF64(y)) => Ok(Leaf::IntervalF64(x.mul(&y, cx)?)),
            (a, b) => Err(unhandled(a, b)),
        }
    }

    /// Quotient. Integer division that does not come out even is carried
    /// out in double precision.
    ///
    /// # Errors
    ///
    /// `DivisionByZero` for a zero divisor, `Indeterminate` for `0 / 0` and
    /// `infinity / infinity`, `Overflow` out of range.
    pub fn div(&self, rhs: &Leaf, cx: &RoundingContext) -> Result<Leaf, ArithError> {
        if rhs.is_zero() {
            return Err(if self.is_zero() {
                ArithError::Indeterminate(IndeterminateForm::ZeroOverZero)
            } else {
                ArithError::DivisionByZero
            });
        }
        let form = IndeterminateForm::InfinityOverInfinity;
        match Leaf::promote_pair(*self, *rhs) {
            (Leaf::Int(x), Leaf::Int(y)) => match (x.checked_rem(y), x.checked_div(y)) {
                (Some(0), Some(q)) => Ok(Leaf::Int(q)),
                _ => match (self.upgrade(), rhs.upgrade()) {
                    (Some(a), Some(b)) => a.div(&b, cx),
                    _ => Err(unhandled(*self, *rhs)),
                },
            },
            (Leaf::F32(x), Leaf::F32(y)) => checked(x / y, x, y, form, Representation::F32).map(Leaf::F32),
            (Leaf::F64(x), Leaf::F64(y)) => checked(x / y, x, y, form, Representation::F64).map(Leaf::F64),
            (Leaf::IntervalF32(x), Leaf::IntervalF32(y)) => Ok(Leaf::IntervalF32(x.div(&y, cx)?)),
            (Leaf::IntervalF64(x), Leaf::IntervalF64(y)) => Ok(Leaf::IntervalF64(x.div(&y, cx)?)),
            (a, b) => Err(unhandled(a, b)),
        }
    }

    /// Negation.
    ///
    /// # Errors
    ///
    /// `Overflow` for `-i64::MIN`.
    pub fn neg(&self) -> Result<Leaf, ArithError> {
        match *self {
            Leaf::Int(n) => n.checked_neg().map(Leaf::Int).ok_or(overflow(Representation::Int)),
            Leaf::F32(x) => Ok(Leaf::F32(-x)),
            Leaf::F64(x) => Ok(Leaf::F64(-x)),
            Leaf::IntervalF32(iv) => Ok(Leaf::IntervalF32(iv.neg())),
            Leaf::IntervalF64(iv) => Ok(Leaf::IntervalF64(iv.neg())),
        }
    }

    /// Reciprocal.
    ///
    /// # Errors
    ///
    /// As for [`Leaf::div`].
    pub fn recip(&self, cx: &RoundingContext) -> Result<Leaf, ArithError> {
        Leaf::one_of(self.representation()).div(self, cx)
    }

    /// Integer power by repeated squaring.
    ///
    /// # Errors
    ///
    /// `Indeterminate` for `0^0`, `DivisionByZero` for a negative power of
    /// zero, `Overflow` out of range.
    pub fn powi(&self, n: i32, cx: &RoundingContext) -> Result<Leaf, ArithError> {
        match *self {
            Leaf::IntervalF32(iv) => return Ok(Leaf::IntervalF32(iv.powi(n, cx)?)),
            Leaf::IntervalF64(iv) => return Ok(Leaf::IntervalF64(iv.powi(n, cx)?)),
            _ => {}
        }
        if n == 0 {
            if self.is_zero() {
                return Err(ArithError::Indeterminate(IndeterminateForm::ZeroPowZero));
            }
            return Ok(Leaf::one_of(self.representation()));
        }
        let mut acc = Leaf::one_of(self.representation());
        let mut base = *self;
        let mut k = n.unsigned_abs();
        while k > 0 {
            if k & 1 == 1 {
                acc = acc.mul(&base, cx)?;
            }
            k >>= 1;
            if k > 0 {
                base = base.mul(&base, cx)?;
            }
        }
        if n < 0 {
            acc.recip(cx)
        } else {
            Ok(acc)
        }
    }

    /// Rearranges two leaves of one representation so that `self` carries
    /// as much of the sum as is exactly representable. The exact sum of the
    /// pair is unchanged.
    ///
    /// # Errors
    ///
    /// `UnhandledPair` for mixed representations; `Overflow` and
    /// `Indeterminate` from the float rearrangement.
    pub fn rearrange(&mut self, other: &mut Leaf) -> Result<Rearranged, ArithError> {
        let repr = self.representation();
        let cancel = |e| ArithError::from_cancel(e, repr);
        match (self, other) {
            (Leaf::Int(x), Leaf::Int(y)) => match x.checked_add(*y) {
                Some(s) => {
                    *x = s;
                    *y = 0;
                    Ok(Rearranged::Combined)
                }
                None => Ok(Rearranged::Absorbed),
            },
            (Leaf::F32(x), Leaf::F32(y)) => rearrange(x, y).map_err(cancel),
            (Leaf::F64(x), Leaf::F64(y)) => rearrange(x, y).map_err(cancel),
            (Leaf::IntervalF32(x), Leaf::IntervalF32(y)) => rearrange_interval(x, y).map_err(cancel),
            (Leaf::IntervalF64(x), Leaf::IntervalF64(y)) => rearrange_interval(x, y).map_err(cancel),
            (a, b) => Err(unhandled(*a, *b)),
        }
    }

    /// The product, if it is exactly representable.
    ///
    /// # Errors
    ///
    /// `Indeterminate` for `0 * infinity`.
    pub fn mul_exact(&self, rhs: &Leaf) -> Result<Option<Leaf>, ArithError> {
        match Leaf::promote_pair(*self, *rhs) {
            (Leaf::Int(x), Leaf::Int(y)) => Ok(x.checked_mul(y).map(Leaf::Int)),
            (Leaf::F32(x), Leaf::F32(y)) => Ok(exact_product(x, y)?.map(Leaf::F32)),
            (Leaf::F64(x), Leaf::F64(y)) => Ok(exact_product(x, y)?.map(Leaf::F64)),
            (Leaf::IntervalF32(x), Leaf::IntervalF32(y)) if x.is_point() && y.is_point() => {
                Ok(exact_product(x.lo(), y.lo())?.and_then(|p| Interval::point(p).ok()).map(Leaf::IntervalF32))
            }
            (Leaf::IntervalF64(x), Leaf::IntervalF64(y)) if x.is_point() && y.is_point() => {
                Ok(exact_product(x.lo(), y.lo())?.and_then(|p| Interval::point(p).ok()).map(Leaf::IntervalF64))
            }
            _ => Ok(None),
        }
    }

    /// The quotient, if it is exactly representable.
    ///
    /// # Errors
    ///
    /// `DivisionByZero`, or `Indeterminate` for `0 / 0` and
    /// `infinity / infinity`.
    pub fn div_exact(&self, rhs: &Leaf) -> Result<Option<Leaf>, ArithError> {
        if rhs.is_zero() {
            return Err(if self.is_zero() {
                ArithError::Indeterminate(IndeterminateForm::ZeroOverZero)
            } else {
                ArithError::DivisionByZero
            });
        }
        match Leaf::promote_pair(*self, *rhs) {
            (Leaf::Int(x), Leaf::Int(y)) => Ok(match (x.checked_rem(y), x.checked_div(y)) {
                (Some(0), Some(q)) => Some(Leaf::Int(q)),
                _ => None,
            }),
            (Leaf::F32(x), Leaf::F32(y)) => Ok(exact_quotient(x, y)?.map(Leaf::F32)),
            (Leaf::F64(x), Leaf::F64(y)) => Ok(exact_quotient(x, y)?.map(Leaf::F64)),
            (Leaf::IntervalF32(x), Leaf::IntervalF32(y)) if x.is_point() && y.is_point() => {
                Ok(exact_quotient(x.lo(), y.lo())?.and_then(|q| Interval::point(q).ok()).map(Leaf::IntervalF32))
            }
            (Leaf::IntervalF64(x), Leaf::IntervalF64(y)) if x.is_point() && y.is_point() => {
                Ok(exact_quotient(x.lo(), y.lo())?.and_then(|q| Interval::point(q).ok()).map(Leaf::IntervalF64))
            }
            _ => Ok(None),
        }
    }

    /// If the leaf is `±2^k` (with `k != 0` for floats), returns the sign
    /// and `k`.
    #[must_use]
    pub fn signed_power_of_two(&self) -> Option<(Sign, i32)> {
        let sign = self.sgn()?;
        let k = match self {
            Leaf::Int(n) if n.unsigned_abs().is_power_of_two() => n.unsigned_abs().trailing_zeros() as i32,
            Leaf::F32(x) => x.power_of_two()?,
            Leaf::F64(x) => x.power_of_two()?,
            _ => return None,
        };
        Some((sign, k))
    }
}

fn not_a_number() -> ArithError {
    ArithError::Domain("NaN is not a number".to_string())
}

fn overflow(repr: Representation) -> ArithError {
    ArithError::Overflow { repr }
}

fn unhandled(a: Leaf, b: Leaf) -> ArithError {
    ArithError::UnhandledPair {
        lhs: a.representation(),
        rhs: b.representation(),
    }
}

fn checked<T: Binary>(
    r: T,
    x: T,
    y: T,
    form: IndeterminateForm,
    repr: Representation,
) -> Result<T, ArithError> {
    if r.is_nan() {
        return Err(ArithError::Indeterminate(form));
    }
    if r.is_infinite() && x.is_finite() && y.is_finite() {
        return Err(overflow(repr));
    }
    Ok(r)
}

fn exact_product<T: Binary>(x: T, y: T) -> Result<Option<T>, ArithError> {
    if (x.is_zero() && y.is_infinite()) || (x.is_infinite() && y.is_zero()) {
        return Err(ArithError::Indeterminate(IndeterminateForm::ZeroTimesInfinity));
    }
    if x.is_zero() || y.is_zero() || !x.is_finite() || !y.is_finite() {
        return Ok(Some(x * y));
    }
    let (p, err) = two_prod(x, y);
    if p.is_infinite() || p.abs() < T::fma_threshold() || !err.is_zero() {
        return Ok(None);
    }
    Ok(Some(p))
}

fn exact_quotient<T: Binary>(x: T, y: T) -> Result<Option<T>, ArithError> {
    if x.is_infinite() && y.is_infinite() {
        return Err(ArithError::Indeterminate(IndeterminateForm::InfinityOverInfinity));
    }
    if x.is_zero() || !x.is_finite() || !y.is_finite() {
        return Ok(Some(x / y));
    }
    let q = x / y;
    if q.is_infinite() || q.abs() < T::fma_threshold() || x.abs() < T::fma_threshold() {
        return Ok(None);
    }
    let residual = q.mul_add(y, -x);
    Ok(residual.is_zero().then_some(q))
}

fn float_sign<T: Binary>(x: T) -> Sign {
    if x.is_zero() {
        Sign::Zero
    } else if x.is_sign_negative() {
        Sign::Negative
    } else {
        Sign::Positive
    }
}

fn float_ideal_scale<T: Binary>(x: T) -> i32 {
    let Some(e) = x.exponent() else { return 0 };
    let (lo, hi) = x.safe_scale_range();
    (1 - e).clamp(lo, hi)
}

fn interval_ideal_scale<T: Binary>(iv: &Interval<T>) -> i32 {
    let Some(e) = iv.abs().hi().exponent() else { return 0 };
    let (lo, hi) = iv.safe_scale_range();
    if lo > hi {
        return 0;
    }
    (1 - e).clamp(lo, hi)
}

fn int_scale_range(n: i64) -> (i32, i32) {
    if n == 0 {
        return (i32::MIN, i32::MAX);
    }
    let magnitude = n.unsigned_abs();
    (
        -(n.trailing_zeros() as i32),
        magnitude.leading_zeros() as i32 - 1,
    )
}

fn in_range(e: i32, (lo, hi): (i32, i32)) -> bool {
    lo <= e && e <= hi
}

impl ExactScaling for Leaf {
    fn is_scale_identity(&self) -> bool {
        match self {
            Leaf::Int(n) => *n == 0,
            Leaf::F32(x) => *x == 0.0 || x.is_infinite(),
            Leaf::F64(x) => *x == 0.0 || x.is_infinite(),
            Leaf::IntervalF32(iv) => iv.is_zero(),
            Leaf::IntervalF64(iv) => iv.is_zero(),
        }
    }

    fn safe_scale_range(&self) -> (i32, i32) {
        match self {
            Leaf::Int(n) => int_scale_range(*n),
            Leaf::F32(x) => x.safe_scale_range(),
            Leaf::F64(x) => x.safe_scale_range(),
            Leaf::IntervalF32(iv) => iv.safe_scale_range(),
            Leaf::IntervalF64(iv) => iv.safe_scale_range(),
        }
    }

    fn ideal_scale(&self) -> i32 {
        match self {
            Leaf::Int(_) => 0,
            Leaf::F32(x) => float_ideal_scale(*x),
            Leaf::F64(x) => float_ideal_scale(*x),
            Leaf::IntervalF32(iv) => interval_ideal_scale(iv),
            Leaf::IntervalF64(iv) => interval_ideal_scale(iv),
        }
    }

    fn rescale(&mut self, e: i32) -> bool {
        if e == 0 || self.is_scale_identity() {
            return true;
        }
        if !in_range(e, self.safe_scale_range()) {
            return false;
        }
        match self {
            Leaf::Int(n) => {
                *n = if e > 0 { *n << e } else { *n >> -e };
            }
            Leaf::F32(x) => *x = x.scale(e),
            Leaf::F64(x) => *x = x.scale(e),
            Leaf::IntervalF32(iv) => *iv = iv.scale(e),
            Leaf::IntervalF64(iv) => *iv = iv.scale(e),
        }
        true
    }
}

impl NumericValue for Leaf {
    fn domain(&self) -> Result<Domain, ArithError> {
        Ok(match self {
            Leaf::Int(_) => Domain::Integer,
            _ if self.is_finite() => Domain::Real,
            _ => Domain::ExtendedReal,
        })
    }

    fn is_exact(&self) -> bool {
        match self {
            Leaf::Int(_) | Leaf::F32(_) | Leaf::F64(_) => true,
            Leaf::IntervalF32(iv) => iv.is_point(),
            Leaf::IntervalF64(iv) => iv.is_point(),
        }
    }

    fn is_zero(&self) -> bool {
        match self {
            Leaf::Int(n) => *n == 0,
            Leaf::F32(x) => *x == 0.0,
            Leaf::F64(x) => *x == 0.0,
            Leaf::IntervalF32(iv) => iv.is_zero(),
            Leaf::IntervalF64(iv) => iv.is_zero(),
        }
    }

    fn is_one(&self) -> bool {
        match self {
            Leaf::Int(n) => *n == 1,
            Leaf::F32(x) => *x == 1.0,
            Leaf::F64(x) => *x == 1.0,
            Leaf::IntervalF32(iv) => iv.is_one(),
            Leaf::IntervalF64(iv) => iv.is_one(),
        }
    }

    fn sgn(&self) -> Option<Sign> {
        match self {
            Leaf::Int(n) => Some(Sign::from_i8(n.signum() as i8)),
            Leaf::F32(x) => Some(float_sign(*x)),
            Leaf::F64(x) => Some(float_sign(*x)),
            Leaf::IntervalF32(iv) => iv.sgn().map(Sign::from_i8),
            Leaf::IntervalF64(iv) => iv.sgn().map(Sign::from_i8),
        }
    }

    fn precedence(&self) -> Precedence {
        match self.sgn() {
            Some(Sign::Negative) if !matches!(self, Leaf::IntervalF32(_) | Leaf::IntervalF64(_)) => {
                Precedence::Unary
            }
            _ => Precedence::Atom,
        }
    }

    fn value_compare(&self, other: &Self) -> Option<Ordering> {
        match Leaf::promote_pair(*self, *other) {
            (Leaf::Int(x), Leaf::Int(y)) => Some(x.cmp(&y)),
            (Leaf::F32(x), Leaf::F32(y)) => x.partial_cmp(&y),
            (Leaf::F64(x), Leaf::F64(y)) => x.partial_cmp(&y),
            (Leaf::IntervalF32(x), Leaf::IntervalF32(y)) => x.value_compare(&y),
            (Leaf::IntervalF64(x), Leaf::IntervalF64(y)) => x.value_compare(&y),
            _ => None,
        }
    }
}

impl From<i64> for Leaf {
    fn from(n: i64) -> Self {
        Leaf::Int(n)
    }
}

impl TryFrom<f64> for Leaf {
    type Error = ArithError;

    fn try_from(x: f64) -> Result<Self, Self::Error> {
        Leaf::from_f64(x)
    }
}

impl TryFrom<f32> for Leaf {
    type Error = ArithError;

    fn try_from(x: f32) -> Result<Self, Self::Error> {
        Leaf::from_f32(x)
    }
}

impl fmt::Display for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leaf::Int(n) => write!(f, "{n}"),
            Leaf::F32(x) => write!(f, "{x:?}f"),
            Leaf::F64(x) => write!(f, "{x:?}"),
            Leaf::IntervalF32(iv) => write!(f, "{iv}f"),
            Leaf::IntervalF64(iv) => write!(f, "{iv}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(lo: f64, hi: f64) -> Leaf {
        Leaf::IntervalF64(Interval::new(lo, hi).unwrap())
    }

    #[test]
    fn test_nan_rejected() {
        assert!(Leaf::from_f64(f64::NAN).is_err());
        assert!(Leaf::from_f32(f32::NAN).is_err());
        assert!(Leaf::from_interval_f64(Interval::empty()).is_err());
    }

    #[test]
    fn test_integer_overflow_reports_representation() {
        let cx = RoundingContext::new();
        let err = Leaf::Int(i64::MAX).add(&Leaf::Int(1), &cx).unwrap_err();
        assert_eq!(err, ArithError::Overflow { repr: Representation::Int });
        assert!(err.is_retryable());
    }

    #[test]
    fn test_float_overflow_and_upgrade() {
        let cx = RoundingContext::new();
        let big = Leaf::F32(f32::MAX);
        assert!(big.mul(&big, &cx).is_err());
        let wide = big.upgrade().unwrap();
        assert_eq!(wide.representation(), Representation::F64);
        assert!(wide.mul(&wide, &cx).is_ok());
    }

    #[test]
    fn test_upgrade_ladder() {
        assert_eq!(Leaf::Int(3).upgrade(), Some(Leaf::F64(3.0)));
        let huge = Leaf::Int(i64::MAX).upgrade().unwrap();
        assert_eq!(huge.representation(), Representation::IntervalF64);
        assert_eq!(Leaf::F64(1.5).upgrade(), Some(iv(1.5, 1.5)));
        assert_eq!(iv(1.0, 2.0).upgrade(), None);
    }

    #[test]
    fn test_promotion() {
        let (a, b) = Leaf::promote_pair(Leaf::Int(2), Leaf::F32(0.5));
        assert_eq!((a, b), (Leaf::F32(2.0), Leaf::F32(0.5)));
        let (a, b) = Leaf::promote_pair(Leaf::F64(1.0), Leaf::IntervalF32(Interval::one()));
        assert_eq!(a.representation(), Representation::IntervalF64);
        assert_eq!(b.representation(), Representation::IntervalF64);
    }

    #[test]
    fn test_mixed_rearrange_is_unhandled() {
        let mut a = Leaf::F32(1.0);
        let mut b = Leaf::F64(1.0);
        assert!(matches!(
            a.rearrange(&mut b),
            Err(ArithError::UnhandledPair { .. })
        ));
    }

    #[test]
    fn test_division() {
        let cx = RoundingContext::new();
        assert_eq!(Leaf::Int(6).div(&Leaf::Int(3), &cx), Ok(Leaf::Int(2)));
        assert_eq!(Leaf::Int(1).div(&Leaf::Int(4), &cx), Ok(Leaf::F64(0.25)));
        assert_eq!(Leaf::Int(1).div(&Leaf::Int(0), &cx), Err(ArithError::DivisionByZero));
        assert_eq!(
            Leaf::F64(0.0).div(&Leaf::F64(0.0), &cx),
            Err(ArithError::Indeterminate(IndeterminateForm::ZeroOverZero))
        );
    }

    #[test]
    fn test_exact_products() {
        assert_eq!(Leaf::F64(1.5).mul_exact(&Leaf::F64(4.0)), Ok(Some(Leaf::F64(6.0))));
        assert_eq!(Leaf::F64(0.1).mul_exact(&Leaf::F64(0.1)), Ok(None));
        assert!(Leaf::F64(0.0).mul_exact(&Leaf::F64(f64::INFINITY)).is_err());
        assert_eq!(Leaf::F64(3.0).div_exact(&Leaf::F64(4.0)), Ok(Some(Leaf::F64(0.75))));
        assert_eq!(Leaf::F64(1.0).div_exact(&Leaf::F64(3.0)), Ok(None));
    }

    #[test]
    fn test_powi() {
        let cx = RoundingContext::new();
        assert_eq!(Leaf::Int(3).powi(4, &cx), Ok(Leaf::Int(81)));
        assert_eq!(Leaf::Int(2).powi(-2, &cx), Ok(Leaf::F64(0.25)));
        assert_eq!(
            Leaf::Int(0).powi(0, &cx),
            Err(ArithError::Indeterminate(IndeterminateForm::ZeroPowZero))
        );
        assert_eq!(Leaf::F64(0.0).powi(-1, &cx), Err(ArithError::DivisionByZero));
        assert_eq!(iv(-1.0, 2.0).powi(2, &cx), Ok(iv(0.0, 4.0)));
    }

    #[test]
    fn test_integer_scaling() {
        let mut n = Leaf::Int(12);
        assert_eq!(n.safe_scale_range(), (-2, 59));
        assert!(n.rescale(-2));
        assert_eq!(n, Leaf::Int(3));
        assert!(!n.rescale(-1));
        assert_eq!(n, Leaf::Int(3));
        assert!(n.try_rescale(70).is_err());
    }

    #[test]
    fn test_float_ideal_scale() {
        let mut x = Leaf::F64(48.0);
        let e = x.ideal_scale();
        assert!(x.rescale(e));
        assert_eq!(x, Leaf::F64(1.5));
    }

    #[test]
    fn test_power_of_two_detection() {
        assert_eq!(Leaf::F64(-8.0).signed_power_of_two(), Some((Sign::Negative, 3)));
        assert_eq!(Leaf::Int(16).signed_power_of_two(), Some((Sign::Positive, 4)));
        assert_eq!(Leaf::F64(3.0).signed_power_of_two(), None);
    }

    #[test]
    fn test_domain_and_display() {
        assert_eq!(Leaf::Int(1).domain(), Ok(Domain::Integer));
        assert_eq!(Leaf::F64(f64::INFINITY).domain(), Ok(Domain::ExtendedReal));
        assert_eq!(Leaf::F32(2.0).to_string(), "2.0f");
        assert_eq!(iv(1.0, 2.0).to_string(), "[1.0, 2.0]");
    }

    #[test]
    fn test_value_compare() {
        assert_eq!(Leaf::Int(1).value_compare(&Leaf::F64(1.5)), Some(Ordering::Less));
        assert_eq!(iv(1.0, 3.0).value_compare(&Leaf::F64(2.0)), None);
    }
}

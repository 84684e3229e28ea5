//! Powers.

use std::cmp::Ordering;
use std::fmt;

use orrery_core::{
    fmt_operand, ArithError, Domain, ExactScaling, IndeterminateForm, Leaf, NumericValue,
    Precedence, Representation, Sign,
};
use orrery_float::Binary;

use crate::context::EvalContext;
use crate::expr::Expr;
use crate::node::LazyNode;

/// `base ^ exponent`.
///
/// Integer exponents are evaluated exactly when the result is
/// representable, otherwise by squaring in the inexact pass with the base
/// renormalized and its exponent carried as scale debt. A reduced power
/// stores its value as `result ^ 1` until it collapses.
#[derive(Clone, Debug, PartialEq)]
pub struct Power {
    base: Box<Expr>,
    exponent: Box<Expr>,
}

impl Power {
    /// `base ^ exponent`, not yet reduced.
    #[must_use]
    pub fn new(base: Expr, exponent: Expr) -> Self {
        Self {
            base: Box::new(base),
            exponent: Box::new(exponent),
        }
    }

    /// The base.
    #[must_use]
    pub fn base(&self) -> &Expr {
        &self.base
    }

    /// The exponent.
    #[must_use]
    pub fn exponent(&self) -> &Expr {
        &self.exponent
    }

    /// The exponent, if it is an integer leaf that fits in `i32`.
    #[must_use]
    pub fn integer_exponent(&self) -> Option<i32> {
        self.exponent
            .as_leaf()
            .and_then(Leaf::as_i64)
            .and_then(|n| i32::try_from(n).ok())
    }

    fn resolve(&mut self, value: Expr) -> bool {
        *self.base = value;
        *self.exponent = Expr::int(1);
        true
    }

    /// Negates an odd power through its base.
    pub(crate) fn negate_base(&mut self) -> bool {
        if self.integer_exponent().map_or(true, |n| n % 2 == 0) {
            return false;
        }
        let base = self.base.take();
        *self.base = base.negate();
        true
    }

    /// Negates an integer exponent.
    pub(crate) fn invert_exponent(&mut self) -> bool {
        let Some(n) = self.exponent.as_int().and_then(i64::checked_neg) else {
            return false;
        };
        *self.exponent = Expr::int(n);
        true
    }

    fn reduce_integer(&mut self, n: i32) -> Result<bool, ArithError> {
        if n == 0 {
            if self.base.is_zero() {
                return Err(ArithError::Indeterminate(IndeterminateForm::ZeroPowZero));
            }
            if let Some(b) = self.base.as_leaf() {
                let one = exact_powi(b, 0)?;
                if let Some(one) = one {
                    return Ok(self.resolve(Expr::leaf(one)));
                }
            }
            if self.base.is_known_nonzero() {
                return Ok(self.resolve(Expr::int(1)));
            }
            return Ok(false);
        }
        if self.base.is_zero() {
            if n < 0 {
                return Err(ArithError::DivisionByZero);
            }
            let zero = self.base.take();
            return Ok(self.resolve(zero));
        }
        if n == -1 {
            let base = self.base.take();
            return Ok(self.resolve(Expr::quotient(Expr::int(1), base)));
        }

        if let Some(b) = self.base.as_leaf().copied() {
            if n < 0 && matches!(b, Leaf::Int(_)) {
                let base = self.base.take();
                let positive = base.pow(Expr::int(-i64::from(n)));
                return Ok(self.resolve(Expr::quotient(Expr::int(1), positive)));
            }
            if let Some(p) = exact_powi(&b, n)? {
                return Ok(self.resolve(Expr::leaf(p)));
            }
            return Ok(false);
        }

        if let Expr::Power(inner) = &mut *self.base {
            if let Some(m) = inner.integer_exponent() {
                if let Some(mn) = m.checked_mul(n) {
                    let b = inner.base.take();
                    *self.base = b;
                    *self.exponent = Expr::int(i64::from(mn));
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn eval_integer(
        &mut self,
        b: Leaf,
        n: i32,
        cx: &mut EvalContext,
    ) -> Result<bool, ArithError> {
        let mut b = b;
        let e0 = b.ideal_scale();
        let e0 = if b.rescale(e0) { e0 } else { 0 };
        let p = cx.leaf_unary(&b, |x, r| x.powi(n, r))?;
        let debt = i64::from(e0)
            .checked_mul(i64::from(n))
            .map(|d| -d)
            .and_then(|d| i32::try_from(d).ok())
            .ok_or(ArithError::Overflow {
                repr: p.representation(),
            })?;
        Ok(self.resolve(Expr::leaf(p).with_scale(debt)))
    }
}

/// `b^n` if it is exactly representable.
fn exact_powi(b: &Leaf, n: i32) -> Result<Option<Leaf>, ArithError> {
    if n == 0 {
        return match b {
            Leaf::IntervalF32(iv) if !iv.is_point() => Ok(None),
            Leaf::IntervalF64(iv) if !iv.is_point() => Ok(None),
            _ => Ok(Some(Leaf::one_of(b.representation()))),
        };
    }
    let mut acc = Leaf::one_of(b.representation());
    let mut base = *b;
    let mut k = n.unsigned_abs();
    while k > 0 {
        if k & 1 == 1 {
            let Some(next) = acc.mul_exact(&base)? else {
                return Ok(None);
            };
            acc = next;
        }
        k >>= 1;
        if k > 0 {
            let Some(next) = base.mul_exact(&base)? else {
                return Ok(None);
            };
            base = next;
        }
    }
    if n < 0 {
        return Leaf::one_of(acc.representation()).div_exact(&acc);
    }
    Ok(Some(acc))
}

/// Real power with a non-integer exponent, in the common scalar
/// representation.
fn powf(b: Leaf, e: Leaf) -> Result<Leaf, ArithError> {
    if b.sgn() == Some(Sign::Negative) {
        return Err(negative_base());
    }
    if b.is_zero() && e.sgn() == Some(Sign::Negative) {
        return Err(ArithError::DivisionByZero);
    }
    match Leaf::promote_pair(b, e) {
        (Leaf::F32(x), Leaf::F32(y)) => checked_powf(x, y, Representation::F32).map(Leaf::F32),
        (Leaf::F64(x), Leaf::F64(y)) => checked_powf(x, y, Representation::F64).map(Leaf::F64),
        (x, y) => Err(ArithError::UnhandledPair {
            lhs: x.representation(),
            rhs: y.representation(),
        }),
    }
}

fn checked_powf<T: Binary>(x: T, y: T, repr: Representation) -> Result<T, ArithError> {
    let r = x.powf(y);
    if r.is_nan() {
        return Err(negative_base());
    }
    if r.is_infinite() && x.is_finite() && y.is_finite() {
        return Err(ArithError::Overflow { repr });
    }
    Ok(r)
}

fn negative_base() -> ArithError {
    ArithError::Domain("negative base raised to a non-integer power".to_string())
}

impl LazyNode for Power {
    fn reduce_exact(&mut self, cx: &mut EvalContext) -> Result<bool, ArithError> {
        let mut changed = self.base.settle_exact(cx)?;
        changed |= self.exponent.settle_exact(cx)?;
        if self.exponent.is_int(1) {
            return Ok(changed);
        }
        if self.base.is_one() && self.base.is_exact() && self.exponent.has_finite_domain() {
            let one = self.base.take();
            return Ok(self.resolve(one));
        }

        if let Some(n) = self.integer_exponent() {
            if !self.exponent.is_int(i64::from(n)) {
                *self.exponent = Expr::int(i64::from(n));
                changed = true;
            }
            return Ok(self.reduce_integer(n)? || changed);
        }

        if self.exponent.as_leaf().is_some() && self.base.sgn() == Some(Sign::Negative) {
            return Err(negative_base());
        }
        Ok(changed)
    }

    fn reduce_inexact(&mut self, cx: &mut EvalContext) -> Result<bool, ArithError> {
        if self.base.step_inexact(cx)? || self.exponent.step_inexact(cx)? {
            return Ok(true);
        }
        if self.exponent.is_int(1) {
            return Ok(false);
        }
        let (Some(b), Some(e)) = (self.base.as_leaf().copied(), self.exponent.as_leaf().copied())
        else {
            return Ok(false);
        };
        match self.integer_exponent() {
            Some(n) => self.eval_integer(b, n, cx),
            None => {
                let r = powf(b, e)?;
                Ok(self.resolve(Expr::leaf(r)))
            }
        }
    }

    fn collapse(&mut self) -> Option<Expr> {
        self.exponent.is_int(1).then(|| self.base.take())
    }
}

impl ExactScaling for Power {
    fn is_scale_identity(&self) -> bool {
        self.is_zero()
    }

    fn safe_scale_range(&self) -> (i32, i32) {
        (0, 0)
    }

    fn rescale(&mut self, e: i32) -> bool {
        e == 0 || self.is_scale_identity()
    }
}

impl NumericValue for Power {
    fn domain(&self) -> Result<Domain, ArithError> {
        let base = self.base.domain()?;
        if let Some(n) = self.exponent.as_int() {
            return Ok(if n < 0 && base == Domain::Integer {
                Domain::Rational
            } else {
                base
            });
        }
        if self.base.sgn() == Some(Sign::Negative) && !base.is_complex() {
            return Err(negative_base());
        }
        Ok(base.join(self.exponent.domain()?).join(Domain::Real))
    }

    fn is_exact(&self) -> bool {
        self.base.is_exact() && self.exponent.is_exact()
    }

    fn is_zero(&self) -> bool {
        self.base.is_zero() && self.exponent.sgn() == Some(Sign::Positive)
    }

    fn is_one(&self) -> bool {
        self.base.is_one()
            || (self.exponent.is_zero() && self.exponent.is_exact() && self.base.is_known_nonzero())
    }

    fn sgn(&self) -> Option<Sign> {
        match (self.base.sgn()?, self.exponent.as_int()) {
            (Sign::Positive, _) => Some(Sign::Positive),
            (Sign::Zero, _) => (self.exponent.sgn()? == Sign::Positive).then_some(Sign::Zero),
            (Sign::Negative, Some(n)) if n % 2 == 0 => Some(Sign::Positive),
            (Sign::Negative, Some(_)) => Some(Sign::Negative),
            (Sign::Negative, None) => None,
        }
    }

    fn precedence(&self) -> Precedence {
        Precedence::Power
    }

    fn value_compare(&self, other: &Self) -> Option<Ordering> {
        (self == other).then_some(Ordering::Equal)
    }
}

impl fmt::Display for Power {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_operand(f, &*self.base, Precedence::Atom)?;
        f.write_str("^")?;
        fmt_operand(f, &*self.exponent, Precedence::Power)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64(x: f64) -> Expr {
        Expr::f64(x).unwrap()
    }

    fn canonical(e: Expr) -> Result<Expr, ArithError> {
        let mut e = e;
        let mut cx = EvalContext::new();
        e.canonicalize(&mut cx)?;
        Ok(e)
    }

    #[test]
    fn test_integer_powers_are_exact() {
        assert_eq!(canonical(Expr::int(3).pow(Expr::int(4))), Ok(Expr::int(81)));
        assert_eq!(canonical(f64(1.5).pow(Expr::int(2))), Ok(f64(2.25)));
        assert_eq!(
            canonical(Expr::int(2).pow(Expr::int(-3))),
            Ok(f64(0.125))
        );
    }

    #[test]
    fn test_special_exponents() {
        let x = Expr::int(2) + f64(0.5);
        assert_eq!(canonical(x.clone().pow(Expr::int(1))), canonical(x.clone()));
        assert_eq!(canonical(f64(7.0).pow(f64(0.0))), Ok(f64(1.0)));
        assert_eq!(canonical(Expr::int(1).pow(f64(0.3))), Ok(Expr::int(1)));
        assert_eq!(canonical(f64(0.0).pow(Expr::int(3))), Ok(f64(0.0)));
        assert_eq!(
            canonical(Expr::int(0).pow(Expr::int(-2))),
            Err(ArithError::DivisionByZero)
        );
    }

    #[test]
    fn test_zero_to_the_zero() {
        for base in [Expr::int(0), f64(0.0), Expr::interval_f64(0.0, 0.0).unwrap()] {
            assert_eq!(
                canonical(base.pow(Expr::int(0))),
                Err(ArithError::Indeterminate(IndeterminateForm::ZeroPowZero))
            );
        }
    }

    #[test]
    fn test_power_of_power() {
        let x = f64(1.0) + f64(2f64.powi(-60));
        let mut e = x.pow(Expr::int(2)).pow(Expr::int(3));
        let mut cx = EvalContext::new();
        e.settle_exact(&mut cx).unwrap();
        let Expr::Power(p) = &e else {
            panic!("expected a power, got {e}");
        };
        assert_eq!(p.exponent(), &Expr::int(6));
        assert_eq!(p.base().kind(), crate::node::NodeKind::Sum);
    }

    #[test]
    fn test_large_power_uses_debt() {
        let e = canonical(f64(3.0).pow(Expr::int(40))).unwrap();
        let Some(Leaf::F64(v)) = e.as_leaf() else {
            panic!("expected an f64 leaf, got {e}");
        };
        let expected = 3f64.powi(40);
        assert!((v - expected).abs() <= expected * 1e-14);
    }

    #[test]
    fn test_overflowing_power_upgrades() {
        let e = canonical(f64(1e300).pow(Expr::int(2))).unwrap();
        let Some(Leaf::IntervalF64(iv)) = e.as_leaf() else {
            panic!("expected an interval leaf, got {e}");
        };
        assert_eq!(iv.hi(), f64::INFINITY);
        assert!(iv.lo() >= 1e300);
    }

    #[test]
    fn test_fractional_exponent() {
        let e = canonical(f64(2.0).pow(f64(0.5))).unwrap();
        assert_eq!(e, f64(2f64.powf(0.5)));
        assert!(matches!(
            canonical(f64(-2.0).pow(f64(0.5))),
            Err(ArithError::Domain(_))
        ));
    }

    #[test]
    fn test_sign_and_domain() {
        let p = Power::new(Expr::int(-3), Expr::int(2));
        assert_eq!(p.sgn(), Some(Sign::Positive));
        let p = Power::new(Expr::int(-3), Expr::int(3));
        assert_eq!(p.sgn(), Some(Sign::Negative));
        let p = Power::new(Expr::int(2), Expr::int(-1));
        assert_eq!(p.domain(), Ok(Domain::Rational));
        assert_eq!(p.to_string(), "2^(-1)");
    }
}

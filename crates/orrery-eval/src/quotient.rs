//! Ratios.

use std::cmp::Ordering;
use std::fmt;

use orrery_core::{
    fmt_operand, ArithError, Domain, ExactScaling, IndeterminateForm, Leaf, NumericValue,
    Precedence, Sign,
};

use crate::context::EvalContext;
use crate::expr::Expr;
use crate::node::LazyNode;
use crate::product::debt_range;
use crate::sign::SignTransform;

/// `numerator / denominator * 2^scale_debt`.
///
/// Float parts are kept near magnitude one by moving their exponents into
/// the debt. Integer ratios are kept in lowest terms with a positive
/// denominator and stay exact until the inexact pass divides them out.
///
/// A denominator that cancels to zero fails with `DivisionByZero`, but one
/// built from opposite infinities fails earlier, inside its own sum, with
/// `Indeterminate(InfinityMinusInfinity)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Quotient {
    num: Box<Expr>,
    den: Box<Expr>,
    scale_debt: i32,
}

impl Quotient {
    /// `num / den`, not yet reduced.
    #[must_use]
    pub fn new(num: Expr, den: Expr) -> Self {
        Self {
            num: Box::new(num),
            den: Box::new(den),
            scale_debt: 0,
        }
    }

    /// Replaces the pending power-of-two exponent.
    #[must_use]
    pub fn with_debt(mut self, debt: i32) -> Self {
        self.scale_debt = debt;
        self
    }

    /// The numerator.
    #[must_use]
    pub fn numerator(&self) -> &Expr {
        &self.num
    }

    /// The denominator.
    #[must_use]
    pub fn denominator(&self) -> &Expr {
        &self.den
    }

    /// Pending power-of-two exponent.
    #[must_use]
    pub fn scale_debt(&self) -> i32 {
        self.scale_debt
    }

    /// Consumes the quotient, returning numerator, denominator and debt.
    #[must_use]
    pub fn into_parts(self) -> (Expr, Expr, i32) {
        (*self.num, *self.den, self.scale_debt)
    }

    /// Swaps numerator and denominator.
    pub(crate) fn invert(&mut self) -> Result<(), ArithError> {
        self.scale_debt = self
            .scale_debt
            .checked_neg()
            .ok_or_else(|| scale_overflow(self.scale_debt))?;
        std::mem::swap(&mut self.num, &mut self.den);
        Ok(())
    }

    /// Negates the numerator.
    pub(crate) fn negate(&mut self) {
        let num = self.num.take();
        *self.num = num.negate();
    }

    fn add_debt(&mut self, e: i32) -> bool {
        match self.scale_debt.checked_add(e) {
            Some(debt) => {
                self.scale_debt = debt;
                true
            }
            None => false,
        }
    }

    fn reduce_leaves(&mut self, n: Leaf, d: Leaf) -> Result<bool, ArithError> {
        if let (Leaf::Int(n), Leaf::Int(d)) = (n, d) {
            if let Some((rn, rd)) = lowest_terms(n, d) {
                if (rn, rd) != (n, d) {
                    self.num.set_leaf(Leaf::Int(rn));
                    self.den.set_leaf(Leaf::Int(rd));
                    return Ok(true);
                }
            }
        }
        if let Some(q) = n.div_exact(&d)? {
            self.num.set_leaf(q);
            *self.den = Expr::int(1);
            return Ok(true);
        }

        let mut changed = false;
        if matches!(n, Leaf::F32(_) | Leaf::F64(_)) {
            let e = n.ideal_scale();
            if e != 0 && self.scale_debt.checked_sub(e).is_some() && self.num.rescale(e) {
                self.scale_debt -= e;
                changed = true;
            }
        }
        if matches!(d, Leaf::F32(_) | Leaf::F64(_)) {
            let e = d.ideal_scale();
            if e != 0 && self.scale_debt.checked_add(e).is_some() && self.den.rescale(e) {
                self.scale_debt += e;
                changed = true;
            }
        }
        Ok(changed)
    }

    fn flatten(&mut self) -> Result<bool, ArithError> {
        let num_debt = SignTransform::split_debt(&mut self.num);
        let den_debt = SignTransform::split_debt(&mut self.den);
        let debt = self
            .scale_debt
            .checked_add(num_debt)
            .and_then(|d| d.checked_sub(den_debt))
            .ok_or_else(|| scale_overflow(self.scale_debt))?;
        let mut changed = num_debt != 0 || den_debt != 0;
        self.scale_debt = debt;

        if let Expr::Quotient(inner) = &mut *self.num {
            if self.scale_debt.checked_add(inner.scale_debt).is_some() {
                let (a, b, d) = std::mem::take(inner).into_parts();
                self.scale_debt += d;
                *self.num = a;
                let den = self.den.take();
                *self.den = Expr::product([b, den]);
                changed = true;
            }
        }
        if let Expr::Quotient(inner) = &mut *self.den {
            if self.scale_debt.checked_sub(inner.scale_debt).is_some() {
                let (c, d, e) = std::mem::take(inner).into_parts();
                self.scale_debt -= e;
                let num = self.num.take();
                *self.num = Expr::product([num, d]);
                *self.den = c;
                changed = true;
            }
        }
        if let Expr::Complex(c) = &*self.den {
            // Multiply through by the conjugate.
            let (re, im) = (c.real().clone(), c.imag().clone());
            let conjugate = Expr::complex(re.clone(), im.clone().negate());
            let norm = Expr::sum([re.clone() * re, im.clone() * im]);
            let num = self.num.take();
            *self.num = num * conjugate;
            *self.den = norm;
            changed = true;
        } else if let Expr::Complex(c) = &mut *self.num {
            // Divide each part.
            let (re, im) = std::mem::take(c).into_parts();
            let den = self.den.take();
            let debt = std::mem::take(&mut self.scale_debt);
            *self.num = Expr::complex(
                Expr::Quotient(Quotient::new(re, den.clone()).with_debt(debt)),
                Expr::Quotient(Quotient::new(im, den).with_debt(debt)),
            );
            *self.den = Expr::int(1);
            changed = true;
        }
        Ok(changed)
    }
}

impl Default for Quotient {
    fn default() -> Self {
        Self::new(Expr::int(0), Expr::int(1))
    }
}

fn scale_overflow(debt: i32) -> ArithError {
    let (lower, upper) = debt_range(debt);
    ArithError::ScaleOutOfRange {
        requested: debt,
        lower,
        upper,
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// `n / d` in lowest terms with `d > 0`, if that fits in `i64`.
fn lowest_terms(n: i64, d: i64) -> Option<(i64, i64)> {
    let g = gcd(n.unsigned_abs(), d.unsigned_abs());
    if g == 0 {
        return None;
    }
    let (mut n, mut d) = (i128::from(n) / i128::from(g), i128::from(d) / i128::from(g));
    if d < 0 {
        n = -n;
        d = -d;
    }
    Some((i64::try_from(n).ok()?, i64::try_from(d).ok()?))
}

impl LazyNode for Quotient {
    fn reduce_exact(&mut self, cx: &mut EvalContext) -> Result<bool, ArithError> {
        let mut changed = self.num.settle_exact(cx)?;
        changed |= self.den.settle_exact(cx)?;

        if self.den.is_zero() {
            return Err(if self.num.is_zero() {
                ArithError::Indeterminate(IndeterminateForm::ZeroOverZero)
            } else {
                ArithError::DivisionByZero
            });
        }
        if self.den.is_int(1) {
            return Ok(changed);
        }
        if self.num.is_zero() && self.den.is_known_nonzero() && self.den.has_finite_domain() {
            *self.den = Expr::int(1);
            return Ok(true);
        }
        if let (Some(n), Some(d)) = (self.num.as_leaf().copied(), self.den.as_leaf().copied()) {
            return Ok(self.reduce_leaves(n, d)? || changed);
        }
        Ok(self.flatten()? || changed)
    }

    fn reduce_inexact(&mut self, cx: &mut EvalContext) -> Result<bool, ArithError> {
        if self.num.step_inexact(cx)? || self.den.step_inexact(cx)? {
            return Ok(true);
        }
        if self.den.is_int(1) {
            return Ok(false);
        }
        let (Some(n), Some(d)) = (self.num.as_leaf().copied(), self.den.as_leaf().copied()) else {
            return Ok(false);
        };
        let q = cx.leaf_binary(&n, &d, Leaf::div)?;
        self.num.set_leaf(q);
        *self.den = Expr::int(1);
        Ok(true)
    }

    fn collapse(&mut self) -> Option<Expr> {
        if !self.den.is_int(1) {
            return None;
        }
        Some(self.num.take().with_scale(self.scale_debt))
    }
}

impl ExactScaling for Quotient {
    fn is_scale_identity(&self) -> bool {
        self.num.is_scale_identity() && self.den.is_known_nonzero()
    }

    fn safe_scale_range(&self) -> (i32, i32) {
        debt_range(self.scale_debt)
    }

    fn rescale(&mut self, e: i32) -> bool {
        self.add_debt(e)
    }
}

impl NumericValue for Quotient {
    fn domain(&self) -> Result<Domain, ArithError> {
        let domain = self.num.domain()?.join(self.den.domain()?);
        Ok(if domain == Domain::Integer {
            Domain::Rational
        } else {
            domain
        })
    }

    fn is_exact(&self) -> bool {
        self.num.is_exact() && self.den.is_exact()
    }

    fn is_zero(&self) -> bool {
        self.num.is_zero() && self.den.is_known_nonzero()
    }

    fn is_one(&self) -> bool {
        self.scale_debt == 0 && self.num.is_one() && self.den.is_one()
    }

    fn sgn(&self) -> Option<Sign> {
        match (self.num.sgn()?, self.den.sgn()?) {
            (_, Sign::Zero) => None,
            (n, d) => Some(n.mul(d)),
        }
    }

    fn precedence(&self) -> Precedence {
        Precedence::Multiplicative
    }

    fn value_compare(&self, other: &Self) -> Option<Ordering> {
        (self == other).then_some(Ordering::Equal)
    }
}

impl fmt::Display for Quotient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_operand(f, &*self.num, Precedence::Multiplicative)?;
        f.write_str(" / ")?;
        fmt_operand(f, &*self.den, Precedence::Unary)?;
        if self.scale_debt != 0 {
            write!(f, " * 2^{}", self.scale_debt)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64(x: f64) -> Expr {
        Expr::f64(x).unwrap()
    }

    fn settle(q: Quotient) -> Result<Expr, ArithError> {
        let mut e = Expr::Quotient(q);
        let mut cx = EvalContext::new();
        e.settle_exact(&mut cx)?;
        Ok(e)
    }

    #[test]
    fn test_lowest_terms() {
        assert_eq!(lowest_terms(6, -4), Some((-3, 2)));
        assert_eq!(lowest_terms(0, 5), Some((0, 1)));
        assert_eq!(lowest_terms(i64::MIN, -1), None);
    }

    #[test]
    fn test_integer_ratio_stays_exact() {
        let e = settle(Quotient::new(Expr::int(6), Expr::int(-4))).unwrap();
        assert_eq!(e, Expr::quotient(Expr::int(-3), Expr::int(2)));
        assert_eq!(e.domain(), Ok(Domain::Rational));
        assert_eq!(e.to_string(), "-3 / 2");
    }

    #[test]
    fn test_exact_division_collapses() {
        let e = settle(Quotient::new(Expr::int(12), Expr::int(4))).unwrap();
        assert_eq!(e, Expr::int(3));
        let e = settle(Quotient::new(f64(3.0), f64(4.0))).unwrap();
        assert_eq!(e, f64(0.75));
    }

    #[test]
    fn test_zero_denominator() {
        assert_eq!(
            settle(Quotient::new(Expr::int(1), f64(0.0))),
            Err(ArithError::DivisionByZero)
        );
        assert_eq!(
            settle(Quotient::new(Expr::int(0), Expr::int(0))),
            Err(ArithError::Indeterminate(IndeterminateForm::ZeroOverZero))
        );
    }

    #[test]
    fn test_cancelling_denominators() {
        let mut cx = EvalContext::new();
        let x = f64(0.375);
        let mut e = Expr::quotient(Expr::int(1), x.clone() + x.negate());
        assert_eq!(e.canonicalize(&mut cx), Err(ArithError::DivisionByZero));
        let inf = f64(f64::INFINITY);
        let mut e = Expr::quotient(Expr::int(1), inf.clone() + inf.negate());
        assert_eq!(
            e.canonicalize(&mut cx),
            Err(ArithError::Indeterminate(IndeterminateForm::InfinityMinusInfinity))
        );
    }

    #[test]
    fn test_infinity_over_infinity() {
        let inf = f64(f64::INFINITY);
        assert_eq!(
            settle(Quotient::new(inf.clone(), inf)),
            Err(ArithError::Indeterminate(IndeterminateForm::InfinityOverInfinity))
        );
    }

    #[test]
    fn test_float_parts_are_normalized() {
        let mut e = Expr::quotient(f64(1.0), f64(3.0 * 2f64.powi(600)));
        let mut cx = EvalContext::new();
        e.settle_exact(&mut cx).unwrap();
        let Expr::Quotient(q) = &e else {
            panic!("expected a quotient")
        };
        assert_eq!(q.denominator(), &f64(1.5));
        assert_eq!(q.scale_debt(), -601);
        e.canonicalize(&mut cx).unwrap();
        assert_eq!(e, f64(1.0 / (3.0 * 2f64.powi(600))));
    }

    #[test]
    fn test_nested_quotients_flatten() {
        let inner = Expr::quotient(Expr::int(1), Expr::int(3));
        let e = settle(Quotient::new(inner, Expr::int(5))).unwrap();
        assert_eq!(e, Expr::quotient(Expr::int(1), Expr::int(15)));
        let e = settle(Quotient::new(
            Expr::int(2),
            Expr::quotient(Expr::int(4), Expr::int(7)),
        ))
        .unwrap();
        assert_eq!(e, Expr::quotient(Expr::int(7), Expr::int(2)));
    }

    #[test]
    fn test_inexact_division() {
        let mut e = Expr::quotient(Expr::int(1), Expr::int(3));
        let mut cx = EvalContext::new();
        e.canonicalize(&mut cx).unwrap();
        assert_eq!(e, f64(1.0 / 3.0));
    }

    #[test]
    fn test_complex_denominator() {
        let mut e = Expr::quotient(
            Expr::int(1),
            Expr::complex(Expr::int(0), Expr::int(2)),
        );
        let mut cx = EvalContext::new();
        e.canonicalize(&mut cx).unwrap();
        assert_eq!(e, Expr::complex(Expr::int(0), f64(-0.5)));
    }
}

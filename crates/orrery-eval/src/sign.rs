//! Deferred negation, inversion and power-of-two scaling.
//!
//! A `SignTransform` records what should happen to its inner value instead
//! of recursing into it. The exact pass hands each pending transform to the
//! inner node when that node can take it cheaply: a quotient swaps its
//! parts, a sum negates its terms, a leaf negates in place, a value whose
//! safe range admits the scale absorbs it. Whatever is left is applied to a
//! leaf by the inexact pass.

use std::cmp::Ordering;
use std::fmt;

use orrery_core::{
    fmt_operand, ArithError, Domain, ExactScaling, Leaf, NumericValue, Precedence, Sign,
};
use orrery_float::RoundingContext;

use crate::context::EvalContext;
use crate::expr::Expr;
use crate::node::LazyNode;
use crate::product::debt_range;

/// `±(inner or 1/inner) · 2^scale_debt`.
#[derive(Clone, Debug, PartialEq)]
pub struct SignTransform {
    inner: Box<Expr>,
    scale_debt: i32,
    negated: bool,
    inverted: bool,
}

impl SignTransform {
    /// A wrapper with the given pending transforms.
    #[must_use]
    pub fn new(inner: Expr, scale_debt: i32, negated: bool, inverted: bool) -> Self {
        Self {
            inner: Box::new(inner),
            scale_debt,
            negated,
            inverted,
        }
    }

    /// `-inner`.
    #[must_use]
    pub fn negate(inner: Expr) -> Self {
        Self::new(inner, 0, true, false)
    }

    /// `1 / inner`.
    #[must_use]
    pub fn invert(inner: Expr) -> Self {
        Self::new(inner, 0, false, true)
    }

    /// `inner · 2^e`.
    #[must_use]
    pub fn scaled(inner: Expr, e: i32) -> Self {
        Self::new(inner, e, false, false)
    }

    /// The wrapped value.
    #[must_use]
    pub fn inner(&self) -> &Expr {
        &self.inner
    }

    /// Pending power-of-two exponent.
    #[must_use]
    pub fn scale_debt(&self) -> i32 {
        self.scale_debt
    }

    /// Whether a negation is pending.
    #[must_use]
    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Whether an inversion is pending.
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// Whether anything is still pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.negated || self.inverted || self.scale_debt != 0
    }

    /// Exactly `-inner`.
    #[must_use]
    pub fn is_plain_negation(&self) -> bool {
        self.negated && !self.inverted && self.scale_debt == 0
    }

    /// Exactly `1 / inner`.
    #[must_use]
    pub fn is_plain_inversion(&self) -> bool {
        self.inverted && !self.negated && self.scale_debt == 0
    }

    pub(crate) fn carries_only_debt(&self) -> bool {
        !self.negated && !self.inverted && self.scale_debt != 0
    }

    /// If `expr` is a debt-only wrapper, replaces it with its inner value
    /// and returns the debt. Returns 0 otherwise.
    pub(crate) fn split_debt(expr: &mut Expr) -> i32 {
        let Expr::Sign(s) = expr else {
            return 0;
        };
        if !s.carries_only_debt() {
            return 0;
        }
        let debt = s.scale_debt;
        let inner = s.inner.take();
        *expr = inner;
        debt
    }

    fn merge_nested(&mut self) -> bool {
        let Expr::Sign(nested) = &mut *self.inner else {
            return false;
        };
        let carried = if self.inverted {
            nested.scale_debt.checked_neg()
        } else {
            Some(nested.scale_debt)
        };
        let Some(debt) = carried.and_then(|d| self.scale_debt.checked_add(d)) else {
            return false;
        };
        self.negated ^= nested.negated;
        self.inverted ^= nested.inverted;
        self.scale_debt = debt;
        let inner = nested.inner.take();
        *self.inner = inner;
        true
    }

    fn push_inversion(&mut self) -> Result<bool, ArithError> {
        if !self.inverted {
            return Ok(false);
        }
        let in_place = match &mut *self.inner {
            Expr::Quotient(q) => {
                q.invert()?;
                true
            }
            Expr::Power(p) => p.invert_exponent(),
            _ => false,
        };
        if !in_place {
            let x = self.inner.take();
            *self.inner = Expr::quotient(Expr::int(1), x);
        }
        self.inverted = false;
        Ok(true)
    }

    fn push_negation(&mut self) -> bool {
        if !self.negated {
            return false;
        }
        let pushed = match &mut *self.inner {
            Expr::Leaf(cell) => match cell.read().neg() {
                Ok(n) => {
                    *cell.to_mut() = n;
                    true
                }
                Err(_) => false,
            },
            Expr::Quotient(q) => {
                q.negate();
                true
            }
            Expr::Product(p) => {
                p.push(Expr::int(-1));
                true
            }
            Expr::Sum(s) => {
                s.negate_terms();
                true
            }
            Expr::Complex(c) => {
                c.negate_parts();
                true
            }
            Expr::Power(p) => p.negate_base(),
            Expr::Sign(_) => false,
        };
        if pushed {
            self.negated = false;
        }
        pushed
    }

    fn push_scale(&mut self) -> bool {
        if self.inverted || self.scale_debt == 0 || !self.inner.rescale(self.scale_debt) {
            return false;
        }
        self.scale_debt = 0;
        true
    }
}

/// `x · 2^debt`, rounding at most once.
///
/// Applies as much of the scale as is lossless, then one multiplication or
/// division for the remainder. An integer that cannot take the whole scale
/// moves up the ladder first.
fn scale_leaf(x: &Leaf, debt: i32, rc: &RoundingContext) -> Result<Leaf, ArithError> {
    let mut v = *x;
    let (lo, hi) = v.safe_scale_range();
    let exact = if lo <= hi { debt.clamp(lo, hi) } else { 0 };
    let rest = debt - exact;
    if rest != 0 {
        if let (Leaf::Int(_), Some(up)) = (x, x.upgrade()) {
            return scale_leaf(&up, debt, rc);
        }
    }
    if !v.rescale(exact) {
        return Err(ArithError::ScaleOutOfRange {
            requested: debt,
            lower: lo,
            upper: hi,
        });
    }
    if rest == 0 {
        return Ok(v);
    }
    let mut factor = Leaf::one_of(v.representation());
    let (_, top) = factor.safe_scale_range();
    let k = rest.saturating_abs().min(top);
    if !factor.rescale(k) {
        return Err(ArithError::ScaleOutOfRange {
            requested: k,
            lower: 0,
            upper: top,
        });
    }
    if rest > 0 {
        v.mul(&factor, rc)
    } else {
        v.div(&factor, rc)
    }
}

impl LazyNode for SignTransform {
    fn reduce_exact(&mut self, cx: &mut EvalContext) -> Result<bool, ArithError> {
        let mut changed = self.inner.settle_exact(cx)?;
        changed |= self.merge_nested();
        changed |= self.push_inversion()?;
        changed |= self.push_negation();
        changed |= self.push_scale();
        Ok(changed)
    }

    fn reduce_inexact(&mut self, cx: &mut EvalContext) -> Result<bool, ArithError> {
        if self.inner.step_inexact(cx)? {
            return Ok(true);
        }
        let Some(leaf) = self.inner.as_leaf().copied() else {
            return Ok(false);
        };
        if self.inverted {
            let r = cx.leaf_unary(&leaf, Leaf::recip)?;
            self.inner.set_leaf(r);
            self.inverted = false;
            return Ok(true);
        }
        if self.negated {
            let r = cx.leaf_unary(&leaf, |x, _| x.neg())?;
            self.inner.set_leaf(r);
            self.negated = false;
            return Ok(true);
        }
        if self.scale_debt != 0 {
            let debt = self.scale_debt;
            let r = cx.leaf_unary(&leaf, |x, rc| scale_leaf(x, debt, rc))?;
            self.inner.set_leaf(r);
            self.scale_debt = 0;
            return Ok(true);
        }
        Ok(false)
    }

    fn collapse(&mut self) -> Option<Expr> {
        (!self.is_pending()).then(|| self.inner.take())
    }
}

impl ExactScaling for SignTransform {
    fn is_scale_identity(&self) -> bool {
        !self.inverted && self.inner.is_scale_identity()
    }

    fn safe_scale_range(&self) -> (i32, i32) {
        debt_range(self.scale_debt)
    }

    fn rescale(&mut self, e: i32) -> bool {
        match self.scale_debt.checked_add(e) {
            Some(debt) => {
                self.scale_debt = debt;
                true
            }
            None => false,
        }
    }
}

impl NumericValue for SignTransform {
    fn domain(&self) -> Result<Domain, ArithError> {
        let inner = self.inner.domain()?;
        if inner == Domain::Integer && (self.inverted || self.scale_debt < 0) {
            return Ok(Domain::Rational);
        }
        Ok(inner)
    }

    fn is_exact(&self) -> bool {
        !self.inverted && self.inner.is_exact()
    }

    fn is_zero(&self) -> bool {
        !self.inverted && self.inner.is_zero()
    }

    fn is_one(&self) -> bool {
        !self.negated && self.scale_debt == 0 && self.inner.is_one()
    }

    fn sgn(&self) -> Option<Sign> {
        let s = self.inner.sgn()?;
        if self.inverted && s == Sign::Zero {
            return None;
        }
        Some(if self.negated { s.negate() } else { s })
    }

    fn precedence(&self) -> Precedence {
        if self.negated {
            Precedence::Unary
        } else if self.inverted || self.scale_debt != 0 {
            Precedence::Multiplicative
        } else {
            self.inner.precedence()
        }
    }

    fn value_compare(&self, other: &Self) -> Option<Ordering> {
        (self == other).then_some(Ordering::Equal)
    }
}

impl fmt::Display for SignTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("-")?;
        }
        if self.inverted {
            f.write_str("1 / ")?;
        }
        let parent = if self.negated || self.inverted {
            Precedence::Unary
        } else {
            Precedence::Multiplicative
        };
        fmt_operand(f, &*self.inner, parent)?;
        if self.scale_debt != 0 {
            write!(f, " * 2^{}", self.scale_debt)?;
        }
        Ok(())
    }
}

//! n-ary products.

use std::cmp::Ordering;
use std::fmt;

use orrery_core::{
    fmt_operand, ArithError, Domain, ExactScaling, Leaf, NumericValue, Precedence, Sign,
};

use crate::complex;
use crate::context::EvalContext;
use crate::engine::{self, Associative, HeuristicState, Interaction, Pass};
use crate::expr::Expr;
use crate::node::{LazyNode, NodeKind};
use crate::rules;
use crate::sign::SignTransform;

/// A lazy product of factors, times `2^scale_debt`.
///
/// Float factors that are exact powers of two are moved into the debt so
/// that the remaining factors stay near magnitude one. The debt is
/// materialized only when the product collapses.
#[derive(Clone, Debug, Default)]
pub struct Product {
    factors: Vec<Expr>,
    state: HeuristicState,
    scale_debt: i32,
}

impl Product {
    /// A product of `factors`, not yet reduced.
    #[must_use]
    pub fn new(factors: impl IntoIterator<Item = Expr>) -> Self {
        Self {
            factors: factors.into_iter().collect(),
            state: HeuristicState::new(),
            scale_debt: 0,
        }
    }

    /// The current factors.
    #[must_use]
    pub fn factors(&self) -> &[Expr] {
        &self.factors
    }

    /// Pending power-of-two exponent.
    #[must_use]
    pub fn scale_debt(&self) -> i32 {
        self.scale_debt
    }

    /// Number of factors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factors.len()
    }

    /// Returns true for the empty product.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Appends a factor; it is admitted on the next exact pass.
    pub fn push(&mut self, factor: Expr) {
        self.factors.push(factor);
    }

    /// Engine progress.
    #[must_use]
    pub fn state(&self) -> &HeuristicState {
        &self.state
    }

    fn absorb_power_of_two(&mut self, index: usize) -> bool {
        let Some(leaf) = self.factors[index].as_leaf().copied() else {
            return false;
        };
        if matches!(leaf, Leaf::Int(_)) {
            return false;
        }
        let Some((sign, k)) = leaf.signed_power_of_two() else {
            return false;
        };
        if k == 0 {
            return false;
        }
        let Some(debt) = self.scale_debt.checked_add(k) else {
            return false;
        };
        let one = Leaf::one_of(leaf.representation());
        let unit = match sign {
            Sign::Negative => one.neg(),
            _ => Ok(one),
        };
        let Ok(unit) = unit else { return false };
        self.factors[index].set_leaf(unit);
        self.scale_debt = debt;
        true
    }
}

/// Range of lossless exponents for a node that keeps its own debt.
pub(crate) fn debt_range(debt: i32) -> (i32, i32) {
    (i32::MIN.saturating_sub(debt), i32::MAX.saturating_sub(debt))
}

fn is_reciprocal_pair(lhs: &Expr, rhs: &Expr) -> bool {
    let base = if lhs.is_reciprocal_of(rhs) {
        rhs
    } else if rhs.is_reciprocal_of(lhs) {
        lhs
    } else {
        return false;
    };
    base.is_known_nonzero() && base.has_finite_domain()
}

impl Associative for Product {
    const KIND: NodeKind = NodeKind::Product;

    fn parts_mut(&mut self) -> (&mut Vec<Expr>, &mut HeuristicState) {
        (&mut self.factors, &mut self.state)
    }

    fn is_identity(term: &Expr) -> bool {
        term.is_int(1)
    }

    fn absorb(&mut self, index: usize) -> bool {
        if let Expr::Product(inner) = &mut self.factors[index] {
            let Some(debt) = self.scale_debt.checked_add(inner.scale_debt) else {
                return false;
            };
            let factors = std::mem::take(&mut inner.factors);
            self.factors.remove(index);
            self.factors.splice(index..index, factors);
            self.scale_debt = debt;
            return true;
        }
        if let Expr::Sign(s) = &self.factors[index] {
            if s.carries_only_debt() {
                let Some(debt) = self.scale_debt.checked_add(s.scale_debt()) else {
                    return false;
                };
                SignTransform::split_debt(&mut self.factors[index]);
                self.scale_debt = debt;
                return true;
            }
        }
        self.absorb_power_of_two(index)
    }

    fn interact(
        lhs: &mut Expr,
        rhs: &mut Expr,
        cx: &mut EvalContext,
    ) -> Result<Interaction, ArithError> {
        if let (Some(a), Some(b)) = (lhs.as_leaf().copied(), rhs.as_leaf().copied()) {
            return match a.mul_exact(&b)? {
                Some(p) => {
                    rhs.set_leaf(p);
                    Ok(Interaction::LhsAnnihilated)
                }
                None => Ok(Interaction::None),
            };
        }
        if lhs.as_leaf().is_some_and(NumericValue::is_zero) && rhs.has_finite_domain() {
            *rhs = lhs.take();
            return Ok(Interaction::LhsAnnihilated);
        }
        if rhs.as_leaf().is_some_and(NumericValue::is_zero) && lhs.has_finite_domain() {
            return Ok(Interaction::LhsAnnihilated);
        }
        if is_reciprocal_pair(lhs, rhs) {
            return Ok(Interaction::MutualAnnihilate);
        }
        if let Some(merged) = complex::mul(lhs, rhs) {
            *rhs = merged;
            return Ok(Interaction::LhsAnnihilated);
        }
        if let Some(merged) = rules::apply(NodeKind::Product, lhs, rhs, cx)? {
            *rhs = merged;
            return Ok(Interaction::LhsAnnihilated);
        }
        Ok(Interaction::None)
    }

    fn score(lhs: &Expr, rhs: &Expr) -> Option<(i32, i32)> {
        let (a, b) = (lhs.as_leaf()?, rhs.as_leaf()?);
        match (a.magnitude_exponent(), b.magnitude_exponent()) {
            (Some(ea), Some(eb)) => Some(((ea + eb).abs(), ea.max(eb))),
            _ => Some((0, i32::MIN)),
        }
    }

    fn fold(lhs: &Expr, rhs: &Expr, cx: &mut EvalContext) -> Result<Expr, ArithError> {
        match (lhs.as_leaf(), rhs.as_leaf()) {
            (Some(a), Some(b)) => cx.leaf_binary(a, b, Leaf::mul).map(Expr::leaf),
            _ => Err(ArithError::Domain("only leaf factors fold".to_string())),
        }
    }
}

impl LazyNode for Product {
    fn reduce_exact(&mut self, cx: &mut EvalContext) -> Result<bool, ArithError> {
        engine::run(self, Pass::Exact, cx)
    }

    fn reduce_inexact(&mut self, cx: &mut EvalContext) -> Result<bool, ArithError> {
        engine::run(self, Pass::Inexact, cx)
    }

    fn collapse(&mut self) -> Option<Expr> {
        if self.factors.len() > 1 {
            return None;
        }
        let value = self.factors.pop().unwrap_or_else(|| Expr::int(1));
        Some(value.with_scale(std::mem::take(&mut self.scale_debt)))
    }
}

impl ExactScaling for Product {
    fn is_scale_identity(&self) -> bool {
        self.factors.iter().any(ExactScaling::is_scale_identity)
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

impl NumericValue for Product {
    fn domain(&self) -> Result<Domain, ArithError> {
        let domain = self
            .factors
            .iter()
            .try_fold(Domain::Integer, |acc, t| Ok::<_, ArithError>(acc.join(t.domain()?)))?;
        if domain == Domain::Integer && self.scale_debt < 0 {
            return Ok(Domain::Rational);
        }
        Ok(domain)
    }

    fn is_exact(&self) -> bool {
        self.factors.iter().all(NumericValue::is_exact)
    }

    fn is_zero(&self) -> bool {
        self.factors.iter().any(NumericValue::is_zero)
            && self.factors.iter().all(Expr::has_finite_domain)
    }

    fn is_one(&self) -> bool {
        self.scale_debt == 0 && self.factors.iter().all(NumericValue::is_one)
    }

    fn sgn(&self) -> Option<Sign> {
        self.factors
            .iter()
            .try_fold(Sign::Positive, |acc, t| Some(acc.mul(t.sgn()?)))
    }

    fn precedence(&self) -> Precedence {
        match (self.factors.as_slice(), self.scale_debt) {
            ([], 0) => Precedence::Atom,
            ([t], 0) => t.precedence(),
            _ => Precedence::Multiplicative,
        }
    }

    fn value_compare(&self, other: &Self) -> Option<Ordering> {
        (self == other).then_some(Ordering::Equal)
    }
}

impl PartialEq for Product {
    fn eq(&self, other: &Self) -> bool {
        self.scale_debt == other.scale_debt && self.factors == other.factors
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.factors.is_empty() {
            f.write_str("1")?;
        }
        for (i, factor) in self.factors.iter().enumerate() {
            if i > 0 {
                f.write_str(" * ")?;
            }
            fmt_operand(f, factor, Precedence::Multiplicative)?;
        }
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

    fn settle(product: &mut Product) -> EvalContext {
        let mut cx = EvalContext::new();
        product.reduce_exact(&mut cx).unwrap();
        cx
    }

    #[test]
    fn test_exact_leaf_products() {
        let mut product = Product::new([Expr::int(3), Expr::int(1), Expr::int(-4)]);
        settle(&mut product);
        assert_eq!(product.factors(), &[Expr::int(-12)]);
    }

    #[test]
    fn test_powers_of_two_become_debt() {
        let mut product = Product::new([f64(8.0), f64(-0.5)]);
        settle(&mut product);
        assert_eq!(product.scale_debt(), 2);
        assert_eq!(product.factors(), &[f64(-1.0)]);
        assert_eq!(product.collapse(), Some(f64(-4.0)));
    }

    #[test]
    fn test_debt_beyond_range_stays_deferred() {
        let mut product = Product::new([f64(2f64.powi(1000)), f64(2f64.powi(1000))]);
        settle(&mut product);
        assert_eq!(product.scale_debt(), 2000);
        let collapsed = product.collapse().unwrap();
        assert_eq!(collapsed.kind(), NodeKind::Sign);
    }

    #[test]
    fn test_zero_annihilates_finite_factor() {
        let composite = Expr::int(2).pow(f64(0.5));
        let mut product = Product::new([composite, f64(0.0)]);
        settle(&mut product);
        assert_eq!(product.factors(), &[f64(0.0)]);
    }

    #[test]
    fn test_reciprocal_pair_annihilates() {
        let x = Expr::sum([f64(1.0), f64(2f64.powi(-60))]);
        let mut product = Product::new([x.clone(), x.invert()]);
        settle(&mut product);
        assert!(product.is_empty());
        assert_eq!(product.collapse(), Some(Expr::int(1)));
    }

    #[test]
    fn test_interval_factors_fold() {
        let mut product = Product::new([
            Expr::interval_f64(1.0, 2.0).unwrap(),
            Expr::interval_f64(-3.0, 4.0).unwrap(),
        ]);
        let mut cx = settle(&mut product);
        assert_eq!(product.len(), 2);
        assert!(product.reduce_inexact(&mut cx).unwrap());
        assert_eq!(product.factors(), &[Expr::interval_f64(-6.0, 8.0).unwrap()]);
    }

    #[test]
    fn test_nested_products_merge_debt() {
        let mut inner = Product::new([f64(3.0), Expr::int(2).pow(f64(0.5))]);
        assert!(inner.rescale(5));
        let mut product = Product::new([Expr::Product(inner), f64(0.25)]);
        settle(&mut product);
        assert_eq!(product.scale_debt(), 3);
        assert_eq!(product.len(), 2);
    }

    #[test]
    fn test_sign_and_display() {
        let product = Product::new([Expr::int(-2), f64(3.0), Expr::int(1) + Expr::int(1)]);
        assert_eq!(product.sgn(), Some(Sign::Negative));
        assert_eq!(product.to_string(), "-2 * 3.0 * (1 + 1)");
        assert_eq!(Product::default().to_string(), "1");
    }
}

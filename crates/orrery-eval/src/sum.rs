//! n-ary sums.

use std::cmp::Ordering;
use std::fmt;

use orrery_core::{
    fmt_operand, ArithError, Domain, ExactScaling, Leaf, NumericValue, Precedence, Sign,
};
use orrery_float::Rearranged;

use crate::complex;
use crate::context::EvalContext;
use crate::engine::{self, Associative, HeuristicState, Interaction, Pass};
use crate::expr::Expr;
use crate::node::{LazyNode, NodeKind};
use crate::rules;

/// A lazy sum of terms.
///
/// The integer zero is the identity and is dropped on sight. Other zeros
/// (`0.0`, `[0, 0]`) are ordinary terms that happen to combine exactly.
#[derive(Clone, Debug, Default)]
pub struct Sum {
    terms: Vec<Expr>,
    state: HeuristicState,
}

impl Sum {
    /// A sum of `terms`, not yet reduced.
    #[must_use]
    pub fn new(terms: impl IntoIterator<Item = Expr>) -> Self {
        Self {
            terms: terms.into_iter().collect(),
            state: HeuristicState::new(),
        }
    }

    /// The current terms.
    #[must_use]
    pub fn terms(&self) -> &[Expr] {
        &self.terms
    }

    /// Number of terms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Returns true for the empty sum.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Appends a term; it is admitted on the next exact pass.
    pub fn push(&mut self, term: Expr) {
        self.terms.push(term);
    }

    /// Engine progress.
    #[must_use]
    pub fn state(&self) -> &HeuristicState {
        &self.state
    }

    /// Consumes the sum, returning its terms.
    #[must_use]
    pub fn into_terms(self) -> Vec<Expr> {
        self.terms
    }

    /// Negates every term in place.
    pub fn negate_terms(&mut self) {
        let terms = std::mem::take(&mut self.terms);
        self.terms = terms.into_iter().map(Expr::negate).collect();
        self.state.reset();
    }
}

fn interact_leaves(
    lhs: &mut Expr,
    rhs: &mut Expr,
    a: Leaf,
    b: Leaf,
) -> Result<Interaction, ArithError> {
    let (mut a, mut b) = Leaf::promote_pair(a, b);
    match a.rearrange(&mut b) {
        Ok(Rearranged::Combined) if a.is_zero() => Ok(Interaction::MutualAnnihilate),
        Ok(Rearranged::Combined) => {
            rhs.set_leaf(a);
            Ok(Interaction::LhsAnnihilated)
        }
        Ok(Rearranged::Changed) => {
            lhs.set_leaf(a);
            rhs.set_leaf(b);
            Ok(Interaction::Changed)
        }
        Ok(Rearranged::Absorbed) => Ok(Interaction::None),
        // Left for the fold, which may upgrade the representation.
        Err(err) if err.is_retryable() => Ok(Interaction::None),
        Err(err) => Err(err),
    }
}

impl Associative for Sum {
    const KIND: NodeKind = NodeKind::Sum;

    fn parts_mut(&mut self) -> (&mut Vec<Expr>, &mut HeuristicState) {
        (&mut self.terms, &mut self.state)
    }

    fn is_identity(term: &Expr) -> bool {
        term.is_int(0)
    }

    fn absorb(&mut self, index: usize) -> bool {
        if !matches!(self.terms[index], Expr::Sum(_)) {
            return false;
        }
        if let Expr::Sum(inner) = self.terms.remove(index) {
            self.terms.splice(index..index, inner.into_terms());
        }
        true
    }

    fn interact(
        lhs: &mut Expr,
        rhs: &mut Expr,
        cx: &mut EvalContext,
    ) -> Result<Interaction, ArithError> {
        if let (Some(a), Some(b)) = (lhs.as_leaf().copied(), rhs.as_leaf().copied()) {
            return interact_leaves(lhs, rhs, a, b);
        }
        if (lhs.is_negation_of(rhs) || rhs.is_negation_of(lhs)) && lhs.has_finite_domain() {
            return Ok(Interaction::MutualAnnihilate);
        }
        if let Some(merged) = complex::add(lhs, rhs) {
            *rhs = merged;
            return Ok(Interaction::LhsAnnihilated);
        }
        if let Some(merged) = rules::apply(NodeKind::Sum, lhs, rhs, cx)? {
            *rhs = merged;
            return Ok(Interaction::LhsAnnihilated);
        }
        Ok(Interaction::None)
    }

    fn score(lhs: &Expr, rhs: &Expr) -> Option<(i32, i32)> {
        let (a, b) = (lhs.as_leaf()?, rhs.as_leaf()?);
        match (a.magnitude_exponent(), b.magnitude_exponent()) {
            (Some(ea), Some(eb)) => Some(((ea - eb).abs(), ea.max(eb))),
            _ => Some((0, i32::MIN)),
        }
    }

    fn fold(lhs: &Expr, rhs: &Expr, cx: &mut EvalContext) -> Result<Expr, ArithError> {
        match (lhs.as_leaf(), rhs.as_leaf()) {
            (Some(a), Some(b)) => cx.leaf_binary(a, b, Leaf::add).map(Expr::leaf),
            _ => Err(ArithError::Domain("only leaf terms fold".to_string())),
        }
    }
}

impl LazyNode for Sum {
    fn reduce_exact(&mut self, cx: &mut EvalContext) -> Result<bool, ArithError> {
        engine::run(self, Pass::Exact, cx)
    }

    fn reduce_inexact(&mut self, cx: &mut EvalContext) -> Result<bool, ArithError> {
        engine::run(self, Pass::Inexact, cx)
    }

    fn collapse(&mut self) -> Option<Expr> {
        match self.terms.len() {
            0 => Some(Expr::int(0)),
            1 => self.terms.pop(),
            _ => None,
        }
    }
}

/// Intersection of the terms' safe ranges, skipping terms that do not
/// move under scaling.
///
/// A sign wrapper counts with the range its inner value can absorb, not
/// the range it can defer, so debt pushed into a sum is never split into
/// per-term roundings.
pub(crate) fn common_scale_range<'a>(terms: impl IntoIterator<Item = &'a Expr>) -> (i32, i32) {
    terms
        .into_iter()
        .filter(|t| !t.is_scale_identity())
        .map(material_scale_range)
        .fold((i32::MIN, i32::MAX), |(lo, hi), (l, h)| (lo.max(l), hi.min(h)))
}

fn material_scale_range(term: &Expr) -> (i32, i32) {
    match term {
        Expr::Sign(s) if s.is_inverted() => (0, 0),
        Expr::Sign(s) => {
            let (lo, hi) = s.inner().safe_scale_range();
            let debt = s.scale_debt();
            (lo.saturating_sub(debt), hi.saturating_sub(debt))
        }
        other => other.safe_scale_range(),
    }
}

/// Sign of a sum: known when every nonzero term agrees.
pub(crate) fn sum_sign<'a>(terms: impl IntoIterator<Item = &'a Expr>) -> Option<Sign> {
    let mut acc = Sign::Zero;
    for term in terms {
        match (acc, term.sgn()?) {
            (_, Sign::Zero) => {}
            (Sign::Zero, s) => acc = s,
            (a, s) if a == s => {}
            _ => return None,
        }
    }
    Some(acc)
}

impl ExactScaling for Sum {
    fn is_scale_identity(&self) -> bool {
        self.terms.iter().all(ExactScaling::is_scale_identity)
    }

    fn safe_scale_range(&self) -> (i32, i32) {
        common_scale_range(&self.terms)
    }

    fn rescale(&mut self, e: i32) -> bool {
        let (lo, hi) = self.safe_scale_range();
        if e < lo || e > hi {
            return false;
        }
        let applied = self
            .terms
            .iter_mut()
            .fold(true, |ok, term| term.rescale(e) && ok);
        debug_assert!(applied, "a term refused a shift inside its own safe range");
        self.state.reset();
        applied
    }
}

impl NumericValue for Sum {
    fn domain(&self) -> Result<Domain, ArithError> {
        self.terms
            .iter()
            .try_fold(Domain::Integer, |acc, t| Ok(acc.join(t.domain()?)))
    }

    fn is_exact(&self) -> bool {
        self.terms.iter().all(NumericValue::is_exact)
    }

    fn is_zero(&self) -> bool {
        self.terms.iter().all(NumericValue::is_zero)
    }

    fn is_one(&self) -> bool {
        matches!(self.terms.as_slice(), [t] if t.is_one())
    }

    fn sgn(&self) -> Option<Sign> {
        sum_sign(&self.terms)
    }

    fn precedence(&self) -> Precedence {
        match self.terms.as_slice() {
            [] => Precedence::Atom,
            [t] => t.precedence(),
            _ => Precedence::Additive,
        }
    }

    fn value_compare(&self, other: &Self) -> Option<Ordering> {
        (self == other).then_some(Ordering::Equal)
    }
}

impl PartialEq for Sum {
    fn eq(&self, other: &Self) -> bool {
        self.terms == other.terms
    }
}

impl fmt::Display for Sum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return f.write_str("0");
        }
        for (i, term) in self.terms.iter().enumerate() {
            match term {
                Expr::Sign(s) if i > 0 && s.is_plain_negation() => {
                    f.write_str(" - ")?;
                    fmt_operand(f, s.inner(), Precedence::Multiplicative)?;
                }
                _ => {
                    if i > 0 {
                        f.write_str(" + ")?;
                    }
                    fmt_operand(f, term, Precedence::Multiplicative)?;
                }
            }
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

    fn settle(sum: &mut Sum) -> EvalContext {
        let mut cx = EvalContext::new();
        sum.reduce_exact(&mut cx).unwrap();
        cx
    }

    #[test]
    fn test_rescale_reaches_every_term() {
        let mut sum = Sum::new([f64(1.5), Expr::int(3)]);
        assert!(sum.rescale(2));
        assert_eq!(sum.terms(), &[f64(6.0), Expr::int(12)]);
        assert!(!sum.rescale(5000));
        assert_eq!(sum.terms(), &[f64(6.0), Expr::int(12)]);
    }

    #[test]
    fn test_wrapped_terms_limit_the_range() {
        let mut sum = Sum::new([f64(1.0).negate(), f64(0.5).negate()]);
        let (_, hi) = sum.safe_scale_range();
        assert!(hi < 1100, "range reaches {hi}");
        assert!(!sum.rescale(3000));
        assert!(sum.rescale(4));
        let Expr::Sign(s) = &sum.terms()[0] else {
            panic!("expected a wrapper");
        };
        assert_eq!(s.scale_debt(), 4);
        let inverted = Sum::new([f64(2.0).invert()]);
        assert_eq!(inverted.safe_scale_range(), (0, 0));
    }

    #[test]
    fn test_integers_combine_exactly() {
        let mut sum = Sum::new([Expr::int(3), Expr::int(-5), Expr::int(9)]);
        settle(&mut sum);
        assert_eq!(sum.terms(), &[Expr::int(7)]);
    }

    #[test]
    fn test_integer_overflow_is_left_for_folding() {
        let mut sum = Sum::new([Expr::int(i64::MAX), Expr::int(i64::MAX)]);
        let mut cx = settle(&mut sum);
        assert_eq!(sum.len(), 2);
        assert!(sum.reduce_inexact(&mut cx).unwrap());
        assert_eq!(cx.stats.upgrades, 1);
        let folded = sum.terms()[0].as_leaf().unwrap();
        assert!(!matches!(folded, Leaf::Int(_)));
    }

    #[test]
    fn test_exact_cancellation() {
        let mut sum = Sum::new([f64(0.1), f64(-0.1)]);
        settle(&mut sum);
        assert!(sum.is_empty());
        assert_eq!(sum.collapse(), Some(Expr::int(0)));
    }

    #[test]
    fn test_float_zero_is_not_identity() {
        assert!(!Sum::is_identity(&f64(0.0)));
        let mut sum = Sum::new([f64(0.0), Expr::f32(2.5).unwrap()]);
        settle(&mut sum);
        assert_eq!(sum.terms(), &[f64(2.5)]);
    }

    #[test]
    fn test_partial_transfer_then_absorbed() {
        let b = 3.0 * f64::EPSILON / 4.0 + f64::EPSILON * f64::EPSILON;
        let mut sum = Sum::new([f64(1.0), f64(b)]);
        let cx = settle(&mut sum);
        assert_eq!(cx.stats.rearrangements, 1);
        assert_eq!(sum.len(), 2);
        let total: f64 = sum
            .terms()
            .iter()
            .map(|t| match t.as_leaf() {
                Some(Leaf::F64(x)) => *x,
                _ => panic!("expected f64 leaves"),
            })
            .sum();
        assert_eq!(total, 1.0 + f64::EPSILON);
    }

    #[test]
    fn test_negation_pair_annihilates() {
        let x = Expr::int(2).pow(f64(0.5));
        let mut sum = Sum::new([x.clone(), x.negate()]);
        settle(&mut sum);
        assert!(sum.is_empty());
    }

    #[test]
    fn test_negate_terms() {
        let mut sum = Sum::new([Expr::int(1), f64(2.5)]);
        sum.negate_terms();
        settle(&mut sum);
        assert_eq!(sum.terms(), &[f64(-3.5)]);
    }

    #[test]
    fn test_sign() {
        let sum = Sum::new([Expr::int(1), f64(0.0), f64(2.0)]);
        assert_eq!(sum.sgn(), Some(Sign::Positive));
        let sum = Sum::new([Expr::int(1), f64(-2.0)]);
        assert_eq!(sum.sgn(), None);
        assert_eq!(Sum::default().sgn(), Some(Sign::Zero));
    }

    #[test]
    fn test_display() {
        let sum = Sum::new([Expr::int(1), Expr::int(2).negate(), Expr::int(3) + Expr::int(4)]);
        assert_eq!(sum.to_string(), "1 - 2 + (3 + 4)");
        assert_eq!(Sum::default().to_string(), "0");
    }
}

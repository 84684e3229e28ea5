//! The open registry of cross-kind identity rules.
//!
//! The associative engine knows how to combine two leaves. Everything else
//! it learns from here: a rule names the operation it serves and the node
//! kinds of the pair it accepts, a guard that decides whether this pair
//! combines, and the combination itself. Rules run in the exact pass, so a
//! combination must not round.
//!
//! Sums and products are commutative; a rule registered for `(A, B)` is
//! also tried with the operands swapped.

use std::fmt;

use orrery_core::ArithError;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::trace;

use crate::context::EvalContext;
use crate::expr::Expr;
use crate::node::NodeKind;
use crate::power::Power;
use crate::quotient::Quotient;

/// Guard deciding whether a rule applies to `(lhs, rhs)`.
pub type WouldCombine = fn(&Expr, &Expr) -> bool;

/// Combination of an accepted pair into one value.
pub type Combine = fn(Expr, Expr) -> Result<Expr, ArithError>;

/// A registered identity.
#[derive(Clone, Copy)]
pub struct Rule {
    /// Name reported in traces.
    pub name: &'static str,
    /// The n-ary operation the rule serves: `Sum` or `Product`.
    pub op: NodeKind,
    /// Kind of the left operand.
    pub lhs: NodeKind,
    /// Kind of the right operand.
    pub rhs: NodeKind,
    /// Guard.
    pub would_combine: WouldCombine,
    /// Combination.
    pub combine: Combine,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("op", &self.op)
            .field("lhs", &self.lhs)
            .field("rhs", &self.rhs)
            .finish_non_exhaustive()
    }
}

type RuleKey = (NodeKind, NodeKind, NodeKind);

/// Rules indexed by `(operation, lhs kind, rhs kind)`.
#[derive(Clone, Debug, Default)]
pub struct RuleRegistry {
    rules: FxHashMap<RuleKey, SmallVec<[Rule; 2]>>,
}

impl RuleRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the default rule set.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for rule in defaults() {
            registry.register(rule);
        }
        registry
    }

    /// Adds a rule. Rules for the same key are tried in registration order.
    pub fn register(&mut self, rule: Rule) {
        self.rules
            .entry((rule.op, rule.lhs, rule.rhs))
            .or_default()
            .push(rule);
    }

    /// Number of registered rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.values().map(SmallVec::len).sum()
    }

    /// Returns true if no rule is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Finds a rule accepting the pair. The flag is set when the rule
    /// matched with the operands swapped.
    #[must_use]
    pub fn find(&self, op: NodeKind, lhs: &Expr, rhs: &Expr) -> Option<(Rule, bool)> {
        self.first_match(op, lhs, rhs)
            .map(|rule| (rule, false))
            .or_else(|| self.first_match(op, rhs, lhs).map(|rule| (rule, true)))
    }

    fn first_match(&self, op: NodeKind, lhs: &Expr, rhs: &Expr) -> Option<Rule> {
        self.rules
            .get(&(op, lhs.kind(), rhs.kind()))?
            .iter()
            .find(|rule| (rule.would_combine)(lhs, rhs))
            .copied()
    }
}

/// Applies the first rule accepting `(lhs, rhs)`, moving both out.
pub(crate) fn apply(
    op: NodeKind,
    lhs: &mut Expr,
    rhs: &mut Expr,
    cx: &mut EvalContext,
) -> Result<Option<Expr>, ArithError> {
    let Some((rule, swapped)) = cx.rules().find(op, lhs, rhs) else {
        return Ok(None);
    };
    trace!(rule = rule.name, ?op, swapped, "rule fired");
    cx.stats.rules_fired += 1;
    let (a, b) = if swapped {
        (rhs.take(), lhs.take())
    } else {
        (lhs.take(), rhs.take())
    };
    (rule.combine)(a, b).map(Some)
}

const ALL_KINDS: [NodeKind; 7] = [
    NodeKind::Leaf,
    NodeKind::Sum,
    NodeKind::Product,
    NodeKind::Quotient,
    NodeKind::Power,
    NodeKind::Sign,
    NodeKind::Complex,
];

/// The default rule set.
#[must_use]
pub fn defaults() -> Vec<Rule> {
    let mut rules = vec![
        Rule {
            name: "common-denominator",
            op: NodeKind::Sum,
            lhs: NodeKind::Quotient,
            rhs: NodeKind::Quotient,
            would_combine: common_denominator_applies,
            combine: common_denominator,
        },
        Rule {
            name: "rational-addend",
            op: NodeKind::Sum,
            lhs: NodeKind::Quotient,
            rhs: NodeKind::Leaf,
            would_combine: |q, k| rational_addend_parts(q, k).is_some(),
            combine: rational_addend,
        },
        Rule {
            name: "quotient-quotient",
            op: NodeKind::Product,
            lhs: NodeKind::Quotient,
            rhs: NodeKind::Quotient,
            would_combine: |a, b| {
                matches!((a, b), (Expr::Quotient(x), Expr::Quotient(y))
                    if x.scale_debt().checked_add(y.scale_debt()).is_some())
            },
            combine: quotient_quotient,
        },
    ];
    for kind in ALL_KINDS {
        if kind != NodeKind::Quotient {
            rules.push(Rule {
                name: "quotient-factor",
                op: NodeKind::Product,
                lhs: NodeKind::Quotient,
                rhs: kind,
                would_combine: |q, _| matches!(q, Expr::Quotient(_)),
                combine: quotient_factor,
            });
        }
        rules.push(Rule {
            name: "same-base-power",
            op: NodeKind::Product,
            lhs: NodeKind::Power,
            rhs: kind,
            would_combine: |p, x| same_base_exponent(p, x).is_some(),
            combine: same_base_power,
        });
    }
    rules
}

fn mismatch(lhs: &Expr, rhs: &Expr) -> ArithError {
    ArithError::Domain(format!(
        "rule applied to {:?} and {:?}",
        lhs.kind(),
        rhs.kind()
    ))
}

// === Sum rules ===

fn common_denominator_applies(a: &Expr, b: &Expr) -> bool {
    let (Expr::Quotient(x), Expr::Quotient(y)) = (a, b) else {
        return false;
    };
    x.scale_debt() == y.scale_debt()
        && (x.denominator() == y.denominator()
            || (x.denominator().as_int().is_some() && y.denominator().as_int().is_some()))
}

/// `n1/d + n2/d → (n1 + n2)/d`, `n1/d1 + n2/d2 → (n1·d2 + n2·d1)/(d1·d2)`.
fn common_denominator(a: Expr, b: Expr) -> Result<Expr, ArithError> {
    let (Expr::Quotient(x), Expr::Quotient(y)) = (a, b) else {
        return Err(ArithError::Domain("common-denominator needs two quotients".into()));
    };
    let (n1, d1, debt) = x.into_parts();
    let (n2, d2, _) = y.into_parts();
    let q = if d1 == d2 {
        Quotient::new(n1 + n2, d1)
    } else {
        Quotient::new(n1 * d2.clone() + n2 * d1.clone(), d1 * d2)
    };
    Ok(Expr::Quotient(q.with_debt(debt)))
}

fn rational_addend_parts(q: &Expr, k: &Expr) -> Option<(i64, i64)> {
    let Expr::Quotient(q) = q else {
        return None;
    };
    if q.scale_debt() != 0 {
        return None;
    }
    let (n, d, k) = (q.numerator().as_int()?, q.denominator().as_int()?, k.as_int()?);
    let num = k.checked_mul(d)?.checked_add(n)?;
    Some((num, d))
}

/// `n/d + k → (n + k·d)/d` over integers.
fn rational_addend(q: Expr, k: Expr) -> Result<Expr, ArithError> {
    let (num, den) = rational_addend_parts(&q, &k).ok_or_else(|| mismatch(&q, &k))?;
    Ok(Expr::quotient(Expr::int(num), Expr::int(den)))
}

// === Product rules ===

/// `(a/b)·c → (a·c)/b`.
fn quotient_factor(q: Expr, c: Expr) -> Result<Expr, ArithError> {
    let Expr::Quotient(q) = q else {
        return Err(mismatch(&q, &c));
    };
    let (a, b, debt) = q.into_parts();
    Ok(Expr::Quotient(Quotient::new(a * c, b).with_debt(debt)))
}

/// `(a/b)·(c/d) → (a·c)/(b·d)`.
fn quotient_quotient(x: Expr, y: Expr) -> Result<Expr, ArithError> {
    let (Expr::Quotient(x), Expr::Quotient(y)) = (x, y) else {
        return Err(ArithError::Domain("quotient-quotient needs two quotients".into()));
    };
    let (a, b, d1) = x.into_parts();
    let (c, d, d2) = y.into_parts();
    let debt = d1.checked_add(d2).ok_or(ArithError::ScaleOutOfRange {
        requested: d2,
        lower: i32::MIN.saturating_sub(d1),
        upper: i32::MAX.saturating_sub(d1),
    })?;
    Ok(Expr::Quotient(Quotient::new(a * c, b * d).with_debt(debt)))
}

/// Exponent sum for `x^m · x^n` (or `x^m · x`).
fn same_base_exponent(p: &Expr, x: &Expr) -> Option<i64> {
    let Expr::Power(p) = p else {
        return None;
    };
    let m = p.exponent().as_int()?;
    let n = match x {
        Expr::Power(q) if q.base() == p.base() => q.exponent().as_int()?,
        other if other == p.base() => 1,
        _ => return None,
    };
    let total = m.checked_add(n)?;
    (p.base().is_known_nonzero() || (m > 0 && n > 0)).then_some(total)
}

/// `x^m · x^n → x^(m+n)`.
fn same_base_power(p: Expr, x: Expr) -> Result<Expr, ArithError> {
    let total = same_base_exponent(&p, &x).ok_or_else(|| mismatch(&p, &x))?;
    let Expr::Power(p) = p else {
        return Err(mismatch(&p, &x));
    };
    Ok(Expr::Power(Power::new(p.base().clone(), Expr::int(total))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64(x: f64) -> Expr {
        Expr::f64(x).unwrap()
    }

    fn settled(mut e: Expr, cx: &mut EvalContext) -> Expr {
        e.settle_exact(cx).unwrap();
        e
    }

    fn ratio(n: i64, d: i64) -> Expr {
        Expr::quotient(Expr::int(n), Expr::int(d))
    }

    #[test]
    fn test_defaults_registered() {
        let registry = RuleRegistry::with_defaults();
        assert!(!registry.is_empty());
        // three fixed rules, quotient-factor for six kinds, same-base-power for seven
        assert_eq!(registry.len(), 16);
        assert!(RuleRegistry::new().is_empty());
    }

    #[test]
    fn test_find_swaps_operands() {
        let registry = RuleRegistry::with_defaults();
        let q = ratio(1, 3);
        let k = Expr::int(2);
        let (rule, swapped) = registry.find(NodeKind::Sum, &k, &q).unwrap();
        assert_eq!(rule.name, "rational-addend");
        assert!(swapped);
        assert!(registry.find(NodeKind::Sum, &k, &k).is_none());
    }

    #[test]
    fn test_rational_addend() {
        let mut cx = EvalContext::new();
        let e = settled(ratio(1, 3) + Expr::int(2), &mut cx);
        assert_eq!(e.to_string(), "7 / 3");
        assert_eq!(cx.stats.rules_fired, 1);
    }

    #[test]
    fn test_common_denominator() {
        let mut cx = EvalContext::new();
        let e = settled(ratio(1, 3) + ratio(1, 6), &mut cx);
        assert_eq!(e, Expr::quotient(Expr::int(1), Expr::int(2)));
        let e = settled(ratio(2, 7) + ratio(-2, 7), &mut cx);
        assert_eq!(e, Expr::int(0));
    }

    #[test]
    fn test_quotient_factor() {
        let mut cx = EvalContext::new();
        let e = settled(ratio(1, 3) * Expr::int(3), &mut cx);
        assert_eq!(e, Expr::int(1));
        let e = settled(ratio(2, 3) * ratio(9, 4), &mut cx);
        assert_eq!(e.to_string(), "3 / 2");
    }

    #[test]
    fn test_same_base_power() {
        let mut cx = EvalContext::new();
        let x = f64(1.0) + f64(2f64.powi(-60));
        let e = settled(x.clone().pow(Expr::int(2)) * x.clone().pow(Expr::int(3)), &mut cx);
        let Expr::Power(p) = &e else {
            panic!("expected a power, got {e}");
        };
        assert_eq!(p.exponent(), &Expr::int(5));
        let e = settled(x.clone().pow(Expr::int(2)) * x, &mut cx);
        let Expr::Power(p) = &e else {
            panic!("expected a power, got {e}");
        };
        assert_eq!(p.exponent(), &Expr::int(3));
    }

    #[test]
    fn test_custom_rule_plugs_in() {
        fn both_sums(a: &Expr, b: &Expr) -> bool {
            matches!((a, b), (Expr::Sum(_), Expr::Sum(_)))
        }
        fn concat(a: Expr, b: Expr) -> Result<Expr, ArithError> {
            Ok(Expr::sum([a, b]))
        }
        let mut registry = RuleRegistry::new();
        registry.register(Rule {
            name: "merge-sums",
            op: NodeKind::Product,
            lhs: NodeKind::Sum,
            rhs: NodeKind::Sum,
            would_combine: both_sums,
            combine: concat,
        });
        assert_eq!(registry.len(), 1);
        let a = f64(1.0) + f64(2f64.powi(-60));
        let (rule, swapped) = registry.find(NodeKind::Product, &a, &a).unwrap();
        assert_eq!(rule.name, "merge-sums");
        assert!(!swapped);
        assert!(registry.find(NodeKind::Sum, &a, &a).is_none());
    }
}

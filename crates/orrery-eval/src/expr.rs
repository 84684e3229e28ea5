//! The expression DAG.
//!
//! Expressions are built bottom-up by the arithmetic operators, which never
//! evaluate: `a + b` allocates a [`Sum`] node holding both operands. Values
//! are produced by reducing in place, either one step at a time
//! ([`Expr::reduce_step`]) or until canonical ([`Expr::canonicalize`]).

use std::cmp::Ordering;
use std::fmt;
use std::io::{Read, Write};
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::rc::Rc;

use orrery_core::persist::{read_leaf, write_leaf, PersistError};
use orrery_core::{
    ArithError, CowCell, Domain, ExactScaling, Leaf, NumericValue, Precedence, Sign,
};
use orrery_float::Interval;
use tracing::warn;

use crate::complex::Complex;
use crate::context::EvalContext;
use crate::node::{LazyNode, NodeKind};
use crate::power::Power;
use crate::product::Product;
use crate::quotient::Quotient;
use crate::sign::SignTransform;
use crate::sum::Sum;

/// A numeric expression: a leaf value or a lazy composite node.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// A leaf value, possibly shared with other trees.
    Leaf(CowCell<Leaf>),
    /// n-ary sum.
    Sum(Sum),
    /// n-ary product.
    Product(Product),
    /// Ratio.
    Quotient(Quotient),
    /// Power.
    Power(Power),
    /// Deferred negate/invert/rescale.
    Sign(SignTransform),
    /// Real/imaginary pair.
    Complex(Complex),
}

/// Outcome of a bounded reduction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    /// `reduce_step` calls that made progress.
    pub steps: usize,
    /// Whether the expression reached canonical form.
    pub canonical: bool,
}

macro_rules! each_node {
    ($value:expr, $n:ident => $body:expr) => {
        match $value {
            Expr::Leaf(cell) => {
                let $n = cell.read();
                $body
            }
            Expr::Sum($n) => $body,
            Expr::Product($n) => $body,
            Expr::Quotient($n) => $body,
            Expr::Power($n) => $body,
            Expr::Sign($n) => $body,
            Expr::Complex($n) => $body,
        }
    };
}

macro_rules! each_node_mut {
    ($value:expr, $n:ident => $body:expr) => {
        match $value {
            Expr::Leaf(cell) => {
                let $n = cell.to_mut();
                $body
            }
            Expr::Sum($n) => $body,
            Expr::Product($n) => $body,
            Expr::Quotient($n) => $body,
            Expr::Power($n) => $body,
            Expr::Sign($n) => $body,
            Expr::Complex($n) => $body,
        }
    };
}

impl Expr {
    // === Construction ===

    /// An owned leaf.
    #[must_use]
    pub fn leaf(leaf: Leaf) -> Self {
        Expr::Leaf(CowCell::owned(leaf))
    }

    /// A leaf shared with other holders. Reduction never mutates `leaf`.
    #[must_use]
    pub fn shared(leaf: Rc<Leaf>) -> Self {
        Expr::Leaf(CowCell::shared(leaf))
    }

    /// An integer leaf.
    #[must_use]
    pub fn int(n: i64) -> Self {
        Self::leaf(Leaf::Int(n))
    }

    /// A single-precision leaf.
    ///
    /// # Errors
    ///
    /// `Domain` for NaN.
    pub fn f32(x: f32) -> Result<Self, ArithError> {
        Leaf::from_f32(x).map(Self::leaf)
    }

    /// A double-precision leaf.
    ///
    /// # Errors
    ///
    /// `Domain` for NaN.
    pub fn f64(x: f64) -> Result<Self, ArithError> {
        Leaf::from_f64(x).map(Self::leaf)
    }

    /// A single-precision interval leaf.
    ///
    /// # Errors
    ///
    /// `Domain` for NaN or out-of-order bounds.
    pub fn interval_f32(lo: f32, hi: f32) -> Result<Self, ArithError> {
        Leaf::from_interval_f32(Interval::new(lo, hi)?).map(Self::leaf)
    }

    /// A double-precision interval leaf.
    ///
    /// # Errors
    ///
    /// `Domain` for NaN or out-of-order bounds.
    pub fn interval_f64(lo: f64, hi: f64) -> Result<Self, ArithError> {
        Leaf::from_interval_f64(Interval::new(lo, hi)?).map(Self::leaf)
    }

    /// Lazy sum of `terms`.
    #[must_use]
    pub fn sum(terms: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Sum(Sum::new(terms))
    }

    /// Lazy product of `factors`.
    #[must_use]
    pub fn product(factors: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Product(Product::new(factors))
    }

    /// Lazy `num / den`.
    #[must_use]
    pub fn quotient(num: Expr, den: Expr) -> Self {
        Expr::Quotient(Quotient::new(num, den))
    }

    /// Lazy `self ^ exponent`.
    #[must_use]
    pub fn pow(self, exponent: Expr) -> Self {
        Expr::Power(Power::new(self, exponent))
    }

    /// Lazy `re + im·i`.
    #[must_use]
    pub fn complex(re: Expr, im: Expr) -> Self {
        Expr::Complex(Complex::new(re, im))
    }

    /// Deferred negation.
    #[must_use]
    pub fn negate(self) -> Self {
        Expr::Sign(SignTransform::negate(self))
    }

    /// Deferred reciprocal.
    #[must_use]
    pub fn invert(self) -> Self {
        Expr::Sign(SignTransform::invert(self))
    }

    /// `self` times `2^e`, applied now if lossless and deferred otherwise.
    #[must_use]
    pub fn with_scale(mut self, e: i32) -> Self {
        if e == 0 || self.rescale(e) {
            self
        } else {
            Expr::Sign(SignTransform::scaled(self, e))
        }
    }

    /// Reads a persisted leaf.
    ///
    /// # Errors
    ///
    /// See [`read_leaf`].
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, PersistError> {
        read_leaf(r).map(Self::leaf)
    }

    // === Queries ===

    /// The variant's discriminant.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Expr::Leaf(_) => NodeKind::Leaf,
            Expr::Sum(_) => NodeKind::Sum,
            Expr::Product(_) => NodeKind::Product,
            Expr::Quotient(_) => NodeKind::Quotient,
            Expr::Power(_) => NodeKind::Power,
            Expr::Sign(_) => NodeKind::Sign,
            Expr::Complex(_) => NodeKind::Complex,
        }
    }

    /// The leaf value, if this is a leaf.
    #[must_use]
    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            Expr::Leaf(cell) => Some(cell.read()),
            _ => None,
        }
    }

    /// The value of an `i64` leaf.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self.as_leaf() {
            Some(Leaf::Int(n)) => Some(*n),
            _ => None,
        }
    }

    /// Returns true for the `i64` leaf `n`.
    #[must_use]
    pub fn is_int(&self, n: i64) -> bool {
        self.as_int() == Some(n)
    }

    /// Only fully reduced leaves cross the persistence boundary.
    #[must_use]
    pub fn as_persistable(&self) -> Option<&Leaf> {
        self.as_leaf()
    }

    /// Writes the expression if it has reduced to a leaf.
    ///
    /// # Errors
    ///
    /// `NotReduced` for composite nodes; I/O failures otherwise.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), PersistError> {
        match self.as_persistable() {
            Some(leaf) => write_leaf(w, leaf),
            None => Err(PersistError::NotReduced),
        }
    }

    /// Returns true if the sign is known and nonzero.
    #[must_use]
    pub fn is_known_nonzero(&self) -> bool {
        matches!(self.sgn(), Some(Sign::Negative | Sign::Positive))
    }

    /// Returns true if the value is known to exclude infinities.
    #[must_use]
    pub fn has_finite_domain(&self) -> bool {
        matches!(self.domain(), Ok(d) if !d.is_extended())
    }

    /// Returns true if `self` is exactly `-other`, structurally.
    #[must_use]
    pub fn is_negation_of(&self, other: &Expr) -> bool {
        match self {
            Expr::Sign(s) => s.is_plain_negation() && s.inner() == other,
            _ => false,
        }
    }

    /// Returns true if `self` is exactly `1 / other`, structurally.
    #[must_use]
    pub fn is_reciprocal_of(&self, other: &Expr) -> bool {
        match self {
            Expr::Sign(s) => s.is_plain_inversion() && s.inner() == other,
            Expr::Quotient(q) => {
                q.scale_debt() == 0 && q.numerator().is_int(1) && q.denominator() == other
            }
            _ => false,
        }
    }

    // === Reduction ===

    /// Performs one unit of reduction: settles the exact pass if anything
    /// is pending there, otherwise makes one inexact change. Returns false
    /// once canonical.
    ///
    /// # Errors
    ///
    /// Any [`ArithError`] raised while reducing.
    pub fn reduce_step(&mut self, cx: &mut EvalContext) -> Result<bool, ArithError> {
        if self.settle_exact(cx)? {
            cx.stats.exact_rounds += 1;
            return Ok(true);
        }
        if cx.config.fold_inexact && self.step_inexact(cx)? {
            cx.stats.inexact_rounds += 1;
            return Ok(true);
        }
        Ok(false)
    }

    /// Reduces for at most `max_steps` steps.
    ///
    /// A caller that needs a deadline uses this and accepts a possibly
    /// non-canonical result.
    ///
    /// # Errors
    ///
    /// Any [`ArithError`] raised while reducing.
    pub fn reduce_bounded(
        &mut self,
        max_steps: usize,
        cx: &mut EvalContext,
    ) -> Result<Progress, ArithError> {
        for steps in 0..max_steps {
            if !self.reduce_step(cx)? {
                return Ok(Progress {
                    steps,
                    canonical: true,
                });
            }
        }
        warn!(max_steps, "step budget exhausted before canonical form");
        Ok(Progress {
            steps: max_steps,
            canonical: false,
        })
    }

    /// Reduces to canonical form, bounded by `cx.config.max_steps`.
    ///
    /// # Errors
    ///
    /// Any [`ArithError`] raised while reducing.
    pub fn canonicalize(&mut self, cx: &mut EvalContext) -> Result<Progress, ArithError> {
        let max_steps = cx.config.max_steps;
        self.reduce_bounded(max_steps, cx)
    }

    /// Runs the exact pass until nothing changes, collapsing as it goes.
    pub(crate) fn settle_exact(&mut self, cx: &mut EvalContext) -> Result<bool, ArithError> {
        let mut changed = false;
        loop {
            let progressed = match self.lazy_mut() {
                Some(node) => node.reduce_exact(cx)?,
                None => false,
            };
            let collapsed = self.try_collapse();
            if !progressed && !collapsed {
                return Ok(changed);
            }
            changed = true;
        }
    }

    /// Makes at most one inexact change.
    pub(crate) fn step_inexact(&mut self, cx: &mut EvalContext) -> Result<bool, ArithError> {
        let progressed = match self.lazy_mut() {
            Some(node) => node.reduce_inexact(cx)?,
            None => false,
        };
        let collapsed = self.try_collapse();
        Ok(progressed || collapsed)
    }

    fn lazy_mut(&mut self) -> Option<&mut dyn LazyNode> {
        match self {
            Expr::Leaf(_) => None,
            Expr::Sum(n) => Some(n),
            Expr::Product(n) => Some(n),
            Expr::Quotient(n) => Some(n),
            Expr::Power(n) => Some(n),
            Expr::Sign(n) => Some(n),
            Expr::Complex(n) => Some(n),
        }
    }

    fn try_collapse(&mut self) -> bool {
        let simpler = self.lazy_mut().and_then(|node| node.collapse());
        match simpler {
            Some(expr) => {
                *self = expr;
                true
            }
            None => false,
        }
    }

    /// Moves the value out, leaving the integer zero behind.
    pub(crate) fn take(&mut self) -> Expr {
        std::mem::replace(self, Expr::int(0))
    }

    /// Overwrites with a leaf, reusing owned leaf storage.
    pub(crate) fn set_leaf(&mut self, value: Leaf) {
        match self {
            Expr::Leaf(cell) => *cell.to_mut() = value,
            other => *other = Expr::leaf(value),
        }
    }
}

impl ExactScaling for Expr {
    fn is_scale_identity(&self) -> bool {
        each_node!(self, n => n.is_scale_identity())
    }

    fn safe_scale_range(&self) -> (i32, i32) {
        each_node!(self, n => n.safe_scale_range())
    }

    fn ideal_scale(&self) -> i32 {
        each_node!(self, n => n.ideal_scale())
    }

    fn rescale(&mut self, e: i32) -> bool {
        if e == 0 || self.is_scale_identity() {
            return true;
        }
        let (lo, hi) = self.safe_scale_range();
        if e < lo || e > hi {
            return false;
        }
        each_node_mut!(self, n => n.rescale(e))
    }
}

impl NumericValue for Expr {
    fn domain(&self) -> Result<Domain, ArithError> {
        each_node!(self, n => n.domain())
    }

    fn is_exact(&self) -> bool {
        each_node!(self, n => n.is_exact())
    }

    fn is_zero(&self) -> bool {
        each_node!(self, n => n.is_zero())
    }

    fn is_one(&self) -> bool {
        each_node!(self, n => n.is_one())
    }

    fn sgn(&self) -> Option<Sign> {
        each_node!(self, n => n.sgn())
    }

    fn precedence(&self) -> Precedence {
        each_node!(self, n => n.precedence())
    }

    fn value_compare(&self, other: &Self) -> Option<Ordering> {
        match (self.as_leaf(), other.as_leaf()) {
            (Some(a), Some(b)) => a.value_compare(b),
            _ => (self == other).then_some(Ordering::Equal),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        each_node!(self, n => fmt::Display::fmt(n, f))
    }
}

impl From<Leaf> for Expr {
    fn from(leaf: Leaf) -> Self {
        Expr::leaf(leaf)
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::int(n)
    }
}

impl Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        Expr::sum([self, rhs])
    }
}

impl Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        Expr::sum([self, rhs.negate()])
    }
}

impl Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        Expr::product([self, rhs])
    }
}

impl Div for Expr {
    type Output = Expr;

    fn div(self, rhs: Expr) -> Expr {
        Expr::quotient(self, rhs)
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        self.negate()
    }
}

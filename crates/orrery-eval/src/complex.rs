//! Complex values as a pair of real expressions.

use std::cmp::Ordering;
use std::fmt;

use orrery_core::{
    fmt_operand, ArithError, Domain, ExactScaling, NumericValue, Precedence, Sign,
};

use crate::context::EvalContext;
use crate::expr::Expr;
use crate::node::LazyNode;
use crate::sum::common_scale_range;

/// `real + imag·i`.
///
/// Sums and products treat a complex term like any other: the interaction
/// hooks [`add`] and [`mul`] merge it with real neighbours componentwise, so
/// mixed sums reduce without a separate code path.
#[derive(Clone, Debug, PartialEq)]
pub struct Complex {
    real: Box<Expr>,
    imag: Box<Expr>,
}

impl Complex {
    /// `real + imag·i`.
    #[must_use]
    pub fn new(real: Expr, imag: Expr) -> Self {
        Self {
            real: Box::new(real),
            imag: Box::new(imag),
        }
    }

    /// The real part.
    #[must_use]
    pub fn real(&self) -> &Expr {
        &self.real
    }

    /// The imaginary part.
    #[must_use]
    pub fn imag(&self) -> &Expr {
        &self.imag
    }

    /// Consumes the pair.
    #[must_use]
    pub fn into_parts(self) -> (Expr, Expr) {
        (*self.real, *self.imag)
    }

    pub(crate) fn negate_parts(&mut self) {
        let re = self.real.take();
        let im = self.imag.take();
        *self.real = re.negate();
        *self.imag = im.negate();
    }
}

impl Default for Complex {
    fn default() -> Self {
        Self::new(Expr::int(0), Expr::int(0))
    }
}

fn is_real(x: &Expr) -> bool {
    !matches!(x, Expr::Complex(_)) && matches!(x.domain(), Ok(d) if !d.is_complex())
}

/// Merges a sum term pair when at least one side is complex.
pub(crate) fn add(lhs: &mut Expr, rhs: &mut Expr) -> Option<Expr> {
    match (&mut *lhs, &mut *rhs) {
        (Expr::Complex(a), Expr::Complex(b)) => {
            let (ar, ai) = std::mem::take(a).into_parts();
            let (br, bi) = std::mem::take(b).into_parts();
            Some(Expr::complex(ar + br, ai + bi))
        }
        (Expr::Complex(c), x) | (x, Expr::Complex(c)) if is_real(x) => {
            let (re, im) = std::mem::take(c).into_parts();
            Some(Expr::complex(re + x.take(), im))
        }
        _ => None,
    }
}

/// Merges a product factor pair when at least one side is complex.
pub(crate) fn mul(lhs: &mut Expr, rhs: &mut Expr) -> Option<Expr> {
    match (&mut *lhs, &mut *rhs) {
        (Expr::Complex(a), Expr::Complex(b)) => {
            let (ar, ai) = std::mem::take(a).into_parts();
            let (br, bi) = std::mem::take(b).into_parts();
            let re = ar.clone() * br.clone() - ai.clone() * bi.clone();
            let im = ar * bi + ai * br;
            Some(Expr::complex(re, im))
        }
        (Expr::Complex(c), x) | (x, Expr::Complex(c)) if is_real(x) => {
            let (re, im) = std::mem::take(c).into_parts();
            let x = x.take();
            Some(Expr::complex(re * x.clone(), im * x))
        }
        _ => None,
    }
}

impl LazyNode for Complex {
    fn reduce_exact(&mut self, cx: &mut EvalContext) -> Result<bool, ArithError> {
        let re = self.real.settle_exact(cx)?;
        let im = self.imag.settle_exact(cx)?;
        Ok(re || im)
    }

    fn reduce_inexact(&mut self, cx: &mut EvalContext) -> Result<bool, ArithError> {
        Ok(self.real.step_inexact(cx)? || self.imag.step_inexact(cx)?)
    }

    fn collapse(&mut self) -> Option<Expr> {
        (self.imag.is_zero() && self.imag.is_exact()).then(|| self.real.take())
    }
}

impl ExactScaling for Complex {
    fn is_scale_identity(&self) -> bool {
        self.real.is_scale_identity() && self.imag.is_scale_identity()
    }

    fn safe_scale_range(&self) -> (i32, i32) {
        common_scale_range([&*self.real, &*self.imag])
    }

    fn rescale(&mut self, e: i32) -> bool {
        let (lo, hi) = self.safe_scale_range();
        if e < lo || e > hi {
            return false;
        }
        let re = self.real.rescale(e);
        let im = self.imag.rescale(e);
        debug_assert!(re && im, "a part refused a shift inside its own safe range");
        re && im
    }
}

impl NumericValue for Complex {
    fn domain(&self) -> Result<Domain, ArithError> {
        Ok(self.real.domain()?.join(self.imag.domain()?).complexify())
    }

    fn is_exact(&self) -> bool {
        self.real.is_exact() && self.imag.is_exact()
    }

    fn is_zero(&self) -> bool {
        self.real.is_zero() && self.imag.is_zero()
    }

    fn is_one(&self) -> bool {
        self.real.is_one() && self.imag.is_zero()
    }

    fn sgn(&self) -> Option<Sign> {
        if self.imag.is_zero() {
            self.real.sgn()
        } else {
            None
        }
    }

    fn precedence(&self) -> Precedence {
        Precedence::Additive
    }

    fn value_compare(&self, other: &Self) -> Option<Ordering> {
        (self == other).then_some(Ordering::Equal)
    }
}

impl fmt::Display for Complex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_operand(f, &*self.real, Precedence::Additive)?;
        f.write_str(" + ")?;
        fmt_operand(f, &*self.imag, Precedence::Atom)?;
        f.write_str("i")
    }
}

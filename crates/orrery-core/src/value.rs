//! The uniform query/transform capabilities of every numeric value.

use std::cmp::Ordering;
use std::fmt;

use crate::domain::{Domain, Precedence, Sign};
use crate::error::ArithError;

/// Lossless power-of-two rescaling.
///
/// Scale adjustments that cannot be applied yet are carried as deferred
/// debt by composite nodes and materialized through this trait once they
/// fall inside [`ExactScaling::safe_scale_range`].
pub trait ExactScaling {
    /// Returns true if rescaling leaves the value unchanged (zero,
    /// infinities).
    fn is_scale_identity(&self) -> bool;

    /// The closed exponent range over which `rescale` is lossless.
    fn safe_scale_range(&self) -> (i32, i32);

    /// The shift that would bring the magnitude into `[1, 2)`, clamped to
    /// the safe range. Zero when no renormalization applies.
    fn ideal_scale(&self) -> i32 {
        0
    }

    /// Multiplies by `2^e` if that is lossless; otherwise leaves the value
    /// untouched and returns false.
    fn rescale(&mut self, e: i32) -> bool;

    /// Like [`ExactScaling::rescale`], reporting the safe range on failure.
    ///
    /// # Errors
    ///
    /// `ScaleOutOfRange` if `e` is outside the safe range.
    fn try_rescale(&mut self, e: i32) -> Result<(), ArithError> {
        if self.rescale(e) {
            Ok(())
        } else {
            let (lower, upper) = self.safe_scale_range();
            Err(ArithError::ScaleOutOfRange {
                requested: e,
                lower,
                upper,
            })
        }
    }
}

/// Queries shared by leaves and composite nodes.
///
/// No implementor ever represents NaN: operations that would produce one
/// fail instead.
pub trait NumericValue: ExactScaling + Clone + fmt::Display {
    /// The value's domain.
    ///
    /// # Errors
    ///
    /// `Domain` when the value is undefined over every domain (for example
    /// a negative base raised to a non-integer power).
    fn domain(&self) -> Result<Domain, ArithError>;

    /// Returns true if the value is known exactly.
    fn is_exact(&self) -> bool;

    /// Returns true if the value is known to be zero.
    fn is_zero(&self) -> bool;

    /// Returns true if the value is known to be one.
    fn is_one(&self) -> bool;

    /// The value's sign, if known.
    fn sgn(&self) -> Option<Sign>;

    /// Binding strength for printing.
    fn precedence(&self) -> Precedence;

    /// Partial order by value; `None` when unknown.
    fn value_compare(&self, other: &Self) -> Option<Ordering>;
}

/// Writes `value`, parenthesized if it binds looser than `parent`.
///
/// # Errors
///
/// Propagates formatter errors.
pub fn fmt_operand<V: NumericValue>(
    f: &mut fmt::Formatter<'_>,
    value: &V,
    parent: Precedence,
) -> fmt::Result {
    if value.precedence() < parent {
        write!(f, "({value})")
    } else {
        write!(f, "{value}")
    }
}

//! The arithmetic error taxonomy.

use std::fmt;

use orrery_float::{CancelError, IndeterminateForm, IntervalError};
use thiserror::Error;

/// Machine representation of a leaf value.
///
/// Ordered along the upgrade ladder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Representation {
    /// 64-bit signed integer.
    Int,
    /// IEEE single precision.
    F32,
    /// IEEE double precision.
    F64,
    /// Interval of single-precision bounds.
    IntervalF32,
    /// Interval of double-precision bounds.
    IntervalF64,
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Representation::Int => "i64",
            Representation::F32 => "f32",
            Representation::F64 => "f64",
            Representation::IntervalF32 => "interval<f32>",
            Representation::IntervalF64 => "interval<f64>",
        };
        f.write_str(s)
    }
}

/// Errors that can occur during arithmetic evaluation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ArithError {
    /// The operation is undefined for the domains involved.
    #[error("domain error: {0}")]
    Domain(String),

    /// The exact result would be NaN.
    #[error("indeterminate form {0}")]
    Indeterminate(IndeterminateForm),

    /// Division by a zero value, or by an interval whose interior holds zero.
    #[error("division by zero")]
    DivisionByZero,

    /// The result exceeds the representation's range.
    #[error("{repr} overflow")]
    Overflow {
        /// Representation that overflowed.
        repr: Representation,
    },

    /// A power-of-two rescale would not be lossless.
    #[error("scale by 2^{requested} outside lossless range [{lower}, {upper}]")]
    ScaleOutOfRange {
        /// Requested exponent.
        requested: i32,
        /// Lowest lossless exponent.
        lower: i32,
        /// Highest lossless exponent.
        upper: i32,
    },

    /// Two leaf kinds met with no rule to combine them.
    #[error("no rule combines {lhs} with {rhs}")]
    UnhandledPair {
        /// Left representation.
        lhs: Representation,
        /// Right representation.
        rhs: Representation,
    },
}

impl ArithError {
    /// Returns true if the caller may retry after widening the
    /// representation.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ArithError::Overflow { .. } | ArithError::ScaleOutOfRange { .. }
        )
    }

    /// Maps a cancellation failure for the given representation.
    #[must_use]
    pub fn from_cancel(err: CancelError, repr: Representation) -> Self {
        match err {
            CancelError::Indeterminate => {
                ArithError::Indeterminate(IndeterminateForm::InfinityMinusInfinity)
            }
            CancelError::Overflow => ArithError::Overflow { repr },
        }
    }
}

impl From<IntervalError> for ArithError {
    fn from(err: IntervalError) -> Self {
        match err {
            IntervalError::Indeterminate(form) => ArithError::Indeterminate(form),
            IntervalError::DivisionByZero => ArithError::DivisionByZero,
            IntervalError::EmptyOperand => ArithError::Domain("empty interval".to_string()),
            IntervalError::Malformed => ArithError::Domain("malformed interval".to_string()),
        }
    }
}

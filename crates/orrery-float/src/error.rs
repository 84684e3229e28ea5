//! Error types for interval arithmetic and cancellation.

use std::fmt;

use thiserror::Error;

/// A would-be NaN result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndeterminateForm {
    /// `0 * infinity`
    ZeroTimesInfinity,
    /// `infinity - infinity` with cancelling signs
    InfinityMinusInfinity,
    /// `0 / 0`
    ZeroOverZero,
    /// `infinity / infinity`
    InfinityOverInfinity,
    /// `0 ^ 0`
    ZeroPowZero,
}

impl fmt::Display for IndeterminateForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IndeterminateForm::ZeroTimesInfinity => "0 * inf",
            IndeterminateForm::InfinityMinusInfinity => "inf - inf",
            IndeterminateForm::ZeroOverZero => "0 / 0",
            IndeterminateForm::InfinityOverInfinity => "inf / inf",
            IndeterminateForm::ZeroPowZero => "0 ^ 0",
        };
        f.write_str(s)
    }
}

/// Errors raised by interval operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum IntervalError {
    /// One of the operands is the empty sentinel.
    #[error("operand is the empty interval")]
    EmptyOperand,

    /// The exact result is undefined somewhere in the operand span.
    #[error("indeterminate form: {0}")]
    Indeterminate(IndeterminateForm),

    /// The divisor is zero or its interior straddles zero.
    #[error("division by an interval containing zero")]
    DivisionByZero,

    /// Bounds are NaN or out of order.
    #[error("malformed interval bounds")]
    Malformed,
}

/// Errors raised by the cancellation rearrangement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum CancelError {
    /// Infinities of opposite sign met.
    #[error("infinities of opposite sign cancel")]
    Indeterminate,

    /// The exact sum is beyond the largest finite value.
    #[error("sum overflows the representation")]
    Overflow,
}

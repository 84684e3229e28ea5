//! # orrery-float
//!
//! Binary floating-point substrate for the Orrery arithmetic evaluator.
//!
//! This crate provides:
//! - The `Binary` trait describing an IEEE-754 binary representation (f32, f64)
//! - `RoundingContext`: directed rounding without touching the FPU mode register
//! - `Interval<T>`: faithfully-rounded interval arithmetic with sign-case dispatch
//! - Mantissa-cancellation rearrangement of float pairs
//!
//! ## Soundness
//!
//! Every interval operation returns an enclosure of the exact result. Lower
//! bounds are rounded toward negative infinity and upper bounds toward
//! positive infinity. No operation ever produces a NaN bound: indeterminate
//! forms fail with an [`IntervalError`] instead.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cancel;
pub mod error;
pub mod float;
pub mod interval;
pub mod rounding;

#[cfg(test)]
mod proptests;

pub use cancel::{rearrange, rearrange_interval, Rearranged};
pub use error::{CancelError, IndeterminateForm, IntervalError};
pub use float::Binary;
pub use interval::{Interval, SignClass};
pub use rounding::{Direction, RoundingContext};

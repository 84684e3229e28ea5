//! # orrery-core
//!
//! Leaf numeric values for the Orrery arithmetic evaluator.
//!
//! This crate provides:
//! - The `NumericValue` and `ExactScaling` capabilities shared by leaves and
//!   composite expression nodes
//! - `Leaf`: the closed set of machine representations (i64, f32, f64 and
//!   intervals of the floats), with a representation-upgrade ladder
//! - `CowCell`: shared-until-mutated ownership of leaf values
//! - The `ArithError` taxonomy
//! - Binary persistence of fully-reduced leaves
//!
//! ## Design Principles
//!
//! - **No NaN**: any operation whose exact result is undefined fails
//! - **Closed variants**: every operation matches the representation set
//!   exhaustively, so an unhandled pair is a compile-time hole, not a guess
//! - **Lossless scaling**: power-of-two rescaling is offered only inside the
//!   range where it cannot round

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cow;
pub mod domain;
pub mod error;
pub mod leaf;
pub mod persist;
pub mod value;

#[cfg(test)]
mod proptests;

pub use cow::CowCell;
pub use domain::{Domain, Precedence, Sign};
pub use error::{ArithError, Representation};
pub use leaf::Leaf;
pub use persist::{read_leaf, write_leaf, PersistError};
pub use value::{fmt_operand, ExactScaling, NumericValue};

pub use orrery_float::IndeterminateForm;

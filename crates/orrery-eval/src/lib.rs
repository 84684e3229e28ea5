//! # orrery-eval
//!
//! Lazy, self-normalizing expression evaluation for Orrery.
//!
//! This crate provides:
//! - `Expr`: an expression DAG built by the arithmetic operators without
//!   evaluating anything
//! - The `LazyNode` protocol: an exact pass that never rounds and an
//!   inexact pass that folds one pair at a time
//! - The associative evaluation engine shared by `Sum` and `Product`
//! - `Quotient`, `Power`, `SignTransform` and `Complex` nodes
//! - An open `RuleRegistry` of cross-kind identities
//! - `EvalContext`: rounding context, rules, configuration and statistics
//!
//! ## Reduction Order
//!
//! Exact work always runs first. Cancellation between leaves is performed by
//! mantissa rearrangement, which moves value between two floats without
//! rounding. Only when no exact interaction remains does the engine fold,
//! and then it folds the pair whose magnitudes are closest, so the smallest
//! terms meet first.
//!
//! ## Example
//!
//! ```
//! use orrery_eval::{EvalContext, Expr};
//!
//! let tiny = Expr::f64(1e-20).unwrap();
//! let mut e = Expr::f64(1.0).unwrap() + tiny.clone() - Expr::f64(1.0).unwrap();
//! let mut cx = EvalContext::new();
//! e.canonicalize(&mut cx).unwrap();
//! assert_eq!(e, tiny);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod complex;
pub mod context;
pub mod engine;
pub mod expr;
pub mod node;
pub mod power;
pub mod product;
pub mod quotient;
pub mod rules;
pub mod sign;
pub mod sum;

#[cfg(test)]
mod proptests;

pub use complex::Complex;
pub use context::{EvalConfig, EvalContext, EvalStats};
pub use engine::{Associative, HeuristicState, Interaction, Pass, Phase};
pub use expr::{Expr, Progress};
pub use node::{LazyNode, NodeKind};
pub use power::Power;
pub use product::Product;
pub use quotient::Quotient;
pub use rules::{Rule, RuleRegistry};
pub use sign::SignTransform;
pub use sum::Sum;

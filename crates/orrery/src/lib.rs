//! # Orrery
//!
//! Lazy, self-normalizing arithmetic over machine integers, floats and
//! faithfully-rounded intervals.
//!
//! Orrery is the numeric substrate of an orbital-mechanics simulation. It
//! never produces a NaN, and it reorders work so that cancellation happens
//! exactly and rounding happens as late and as locally as possible.
//!
//! ## Features
//!
//! - **Closed Leaf Set**: i64, f32, f64, `Interval<f32>` and `Interval<f64>`,
//!   with an upgrade ladder on overflow
//! - **Lazy Nodes**: sums, products, quotients, powers, deferred sign and
//!   scale transforms, complex pairs
//! - **Exact First**: mantissa rearrangement cancels float pairs without
//!   rounding before any fold is attempted
//! - **Deferred Scaling**: power-of-two factors travel as debt until they can
//!   be applied losslessly
//! - **Open Rules**: late-bound identities plug into the associative engine
//!
//! ## Quick Start
//!
//! ```rust
//! use orrery::prelude::*;
//!
//! let mut cx = EvalContext::new();
//! let mut e = Expr::interval_f64(1.0, 2.0).unwrap() * Expr::interval_f64(3.0, 4.0).unwrap();
//! e.canonicalize(&mut cx).unwrap();
//! assert_eq!(e.to_string(), "[3.0, 8.0]");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub use orrery_core as core;
pub use orrery_eval as eval;
pub use orrery_float as float;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use orrery_core::{ArithError, Domain, ExactScaling, Leaf, NumericValue, Sign};
    pub use orrery_eval::{EvalConfig, EvalContext, Expr, Progress, RuleRegistry};
    pub use orrery_float::{Interval, RoundingContext};
}

//! The lazy-node protocol.

use orrery_core::ArithError;

use crate::context::EvalContext;
use crate::expr::Expr;

/// Discriminant of an [`Expr`] variant. Keys the rule registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    /// A leaf value.
    Leaf,
    /// n-ary sum.
    Sum,
    /// n-ary product.
    Product,
    /// Ratio.
    Quotient,
    /// Power.
    Power,
    /// Deferred negate/invert/rescale wrapper.
    Sign,
    /// Real/imaginary pair.
    Complex,
}

/// A composite node that reduces itself in place.
///
/// Reduction has two passes. The exact pass never rounds: it removes
/// identities, applies registered rules and combines values whose result is
/// exactly representable. The inexact pass may consume precision, folding
/// two values into one rounded result. A caller alternates both until
/// neither reports a change; the node is then canonical.
pub trait LazyNode {
    /// Runs the exact pass. Returns true if anything changed.
    ///
    /// # Errors
    ///
    /// Any [`ArithError`] from the values involved.
    fn reduce_exact(&mut self, cx: &mut EvalContext) -> Result<bool, ArithError>;

    /// Makes at most one inexact change. Returns true if it did.
    ///
    /// # Errors
    ///
    /// Any [`ArithError`] from the values involved.
    fn reduce_inexact(&mut self, cx: &mut EvalContext) -> Result<bool, ArithError>;

    /// If the node has degenerated to something simpler, moves that value
    /// out. The node is left empty and must be discarded.
    fn collapse(&mut self) -> Option<Expr>;
}

//! The associative evaluation engine.
//!
//! Sum and Product share one heuristic state machine. Terms are admitted
//! one at a time into a *clean prefix*: a run of terms that are each
//! settled and pairwise non-interacting. Admitting a term walks four
//! phases, kept on an explicit stack:
//!
//! 1. [`Phase::RemoveIdentity`] drops a term equal to the operation's
//!    identity.
//! 2. [`Phase::ComponentwiseEval`] settles the term at the cursor and lets
//!    the node absorb it (flattening nested nodes of the same operation).
//! 3. [`Phase::PairwiseRescan`] tests the new term against each clean term.
//!    A nonzero interaction is applied and the affected terms leave the
//!    clean prefix to be admitted again; pairs already tested are never
//!    retested, which bounds the scan at amortized O(n²).
//! 4. [`Phase::Fold`] runs only in the inexact pass, once nothing cheap
//!    remains: the best-scoring pair is destructively combined and the
//!    result is admitted through phase 2.
//!
//! Each phase shrinks the term count or advances a bounded cursor, and
//! changed-but-not-annihilated interactions are capped per fold, so the
//! machine always reaches a quiescent state.

use smallvec::SmallVec;
use tracing::{debug, trace};

use orrery_core::ArithError;

use crate::context::EvalContext;
use crate::expr::Expr;
use crate::node::NodeKind;

/// Which reduction pass is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pass {
    /// Rounding-free.
    Exact,
    /// May consume precision.
    Inexact,
}

/// Result of testing one pair of terms.
///
/// `lhs` is the clean term, `rhs` the one being admitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Interaction {
    /// Both terms reduced to the identity.
    MutualAnnihilate,
    /// `rhs` absorbed `lhs`; `lhs` is now the identity.
    LhsAnnihilated,
    /// The pair does not interact.
    None,
    /// `lhs` absorbed `rhs`; `rhs` is now the identity.
    RhsAnnihilated,
    /// Both terms changed and both survive.
    Changed,
}

impl Interaction {
    /// The numeric interaction code: -2, -1, 0, 1 or 2.
    #[must_use]
    pub fn code(self) -> i8 {
        match self {
            Interaction::MutualAnnihilate => -2,
            Interaction::LhsAnnihilated => -1,
            Interaction::None => 0,
            Interaction::RhsAnnihilated => 1,
            Interaction::Changed => 2,
        }
    }
}

/// One entry on the heuristic stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Drop the term at `index`.
    RemoveIdentity {
        /// Index of the identity term.
        index: usize,
    },
    /// Settle and absorb the term at `cursor`.
    ComponentwiseEval {
        /// Index of the term being admitted.
        cursor: usize,
    },
    /// Test the term at `anchor` against clean term `next`, and onward.
    PairwiseRescan {
        /// Index of the term being admitted.
        anchor: usize,
        /// Next clean term to test against.
        next: usize,
    },
    /// Destructively combine the best-scoring pair.
    Fold,
}

/// Progress of an n-ary node through the engine.
#[derive(Clone, Debug, Default)]
pub struct HeuristicState {
    stack: SmallVec<[Phase; 4]>,
    clean: usize,
    rearrangements: usize,
}

impl HeuristicState {
    /// Fresh state: nothing admitted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Length of the clean prefix.
    #[must_use]
    pub fn clean(&self) -> usize {
        self.clean
    }

    /// Pending phases, bottom of the stack first.
    #[must_use]
    pub fn pending(&self) -> &[Phase] {
        &self.stack
    }

    /// Returns true if nothing is pending for a node of `len` terms.
    #[must_use]
    pub fn is_quiescent(&self, len: usize) -> bool {
        self.stack.is_empty() && self.clean >= len
    }

    /// Forgets all progress; every term will be admitted again.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.clean = 0;
        self.rearrangements = 0;
    }

    /// Pushes a phase to run next.
    pub fn push(&mut self, phase: Phase) {
        self.stack.push(phase);
    }

    /// Moves `terms[index]` out of the clean prefix so it is admitted next.
    pub(crate) fn requeue(&mut self, terms: &mut Vec<Expr>, index: usize) {
        if index < self.clean {
            let term = terms.remove(index);
            self.clean -= 1;
            terms.insert(self.clean, term);
        }
    }

    fn remove(&mut self, terms: &mut Vec<Expr>, index: usize) -> Expr {
        if index < self.clean {
            self.clean -= 1;
        }
        terms.remove(index)
    }
}

/// An associative, commutative n-ary operation driven by the engine.
pub trait Associative {
    /// The node kind, for rule lookup and diagnostics.
    const KIND: NodeKind;

    /// The terms and the engine state, borrowed together.
    fn parts_mut(&mut self) -> (&mut Vec<Expr>, &mut HeuristicState);

    /// Returns true if `term` is the operation's identity.
    fn is_identity(term: &Expr) -> bool;

    /// Lets the node take over (part of) the term at `index`, for example
    /// splicing in the terms of a nested node of the same operation.
    /// Returns true if the term list changed.
    fn absorb(&mut self, index: usize) -> bool;

    /// Tests and applies one pair interaction, in place.
    ///
    /// # Errors
    ///
    /// Any [`ArithError`] from combining the pair.
    fn interact(
        lhs: &mut Expr,
        rhs: &mut Expr,
        cx: &mut EvalContext,
    ) -> Result<Interaction, ArithError>;

    /// Ranks a pair for folding; lowest is best, `None` means the pair
    /// cannot be folded.
    fn score(lhs: &Expr, rhs: &Expr) -> Option<(i32, i32)>;

    /// Combines a pair into one, possibly rounded, value.
    ///
    /// # Errors
    ///
    /// Any [`ArithError`] from combining the pair.
    fn fold(lhs: &Expr, rhs: &Expr, cx: &mut EvalContext) -> Result<Expr, ArithError>;
}

/// Runs a pass. The exact pass steps until quiescent; the inexact pass
/// makes at most one fold.
///
/// # Errors
///
/// Any [`ArithError`] raised by a phase.
pub fn run<N: Associative>(
    node: &mut N,
    pass: Pass,
    cx: &mut EvalContext,
) -> Result<bool, ArithError> {
    match pass {
        Pass::Exact => {
            let mut changed = false;
            while let Some(progress) = step(node, cx)? {
                changed |= progress;
            }
            Ok(changed)
        }
        Pass::Inexact => {
            node.parts_mut().1.push(Phase::Fold);
            Ok(step(node, cx)?.unwrap_or(false))
        }
    }
}

/// Executes one phase. Returns `None` once the machine is quiescent,
/// otherwise whether the terms changed.
///
/// # Errors
///
/// Any [`ArithError`] raised by the phase.
pub fn step<N: Associative>(
    node: &mut N,
    cx: &mut EvalContext,
) -> Result<Option<bool>, ArithError> {
    let phase = {
        let (terms, state) = node.parts_mut();
        match state.stack.pop() {
            Some(phase) => phase,
            None if state.clean < terms.len() => Phase::ComponentwiseEval {
                cursor: state.clean,
            },
            None => return Ok(None),
        }
    };
    trace!(op = ?N::KIND, ?phase, "engine step");

    let changed = match phase {
        Phase::RemoveIdentity { index } => {
            let (terms, state) = node.parts_mut();
            state.remove(terms, index);
            true
        }
        Phase::ComponentwiseEval { cursor } => componentwise_eval(node, cursor, cx)?,
        Phase::PairwiseRescan { anchor, next } => pairwise_rescan(node, anchor, next, cx)?,
        Phase::Fold => fold(node, cx)?,
    };
    Ok(Some(changed))
}

fn componentwise_eval<N: Associative>(
    node: &mut N,
    cursor: usize,
    cx: &mut EvalContext,
) -> Result<bool, ArithError> {
    let changed = {
        let (terms, _) = node.parts_mut();
        match terms.get_mut(cursor) {
            Some(term) => term.settle_exact(cx)?,
            None => return Ok(false),
        }
    };

    if node.absorb(cursor) {
        node.parts_mut().1.push(Phase::ComponentwiseEval { cursor });
        return Ok(true);
    }

    let (terms, state) = node.parts_mut();
    if N::is_identity(&terms[cursor]) {
        state.push(Phase::RemoveIdentity { index: cursor });
    } else {
        state.push(Phase::PairwiseRescan {
            anchor: cursor,
            next: 0,
        });
    }
    Ok(changed)
}

fn pairwise_rescan<N: Associative>(
    node: &mut N,
    anchor: usize,
    next: usize,
    cx: &mut EvalContext,
) -> Result<bool, ArithError> {
    let max_rearrangements = cx.config.max_rearrangements;
    let (terms, state) = node.parts_mut();
    if anchor >= terms.len() {
        return Ok(false);
    }
    if next >= anchor {
        state.clean = anchor + 1;
        return Ok(false);
    }

    let (head, tail) = terms.split_at_mut(anchor);
    let interaction = N::interact(&mut head[next], &mut tail[0], cx)?;
    if interaction != Interaction::None {
        trace!(op = ?N::KIND, code = interaction.code(), next, anchor, "pair interaction");
    }

    match interaction {
        Interaction::None => {
            state.push(Phase::PairwiseRescan {
                anchor,
                next: next + 1,
            });
            Ok(false)
        }
        Interaction::MutualAnnihilate => {
            state.remove(terms, anchor);
            state.remove(terms, next);
            Ok(true)
        }
        Interaction::LhsAnnihilated => {
            state.remove(terms, next);
            state.push(Phase::ComponentwiseEval {
                cursor: state.clean,
            });
            Ok(true)
        }
        Interaction::RhsAnnihilated => {
            state.remove(terms, anchor);
            state.requeue(terms, next);
            state.push(Phase::ComponentwiseEval {
                cursor: state.clean,
            });
            Ok(true)
        }
        Interaction::Changed if state.rearrangements < max_rearrangements => {
            state.rearrangements += 1;
            cx.stats.rearrangements += 1;
            state.requeue(terms, next);
            state.push(Phase::ComponentwiseEval {
                cursor: state.clean,
            });
            Ok(true)
        }
        Interaction::Changed => {
            state.push(Phase::PairwiseRescan {
                anchor,
                next: next + 1,
            });
            Ok(true)
        }
    }
}

fn fold<N: Associative>(node: &mut N, cx: &mut EvalContext) -> Result<bool, ArithError> {
    let (terms, state) = node.parts_mut();

    for i in 0..terms.len() {
        if terms[i].step_inexact(cx)? {
            state.requeue(terms, i);
            state.rearrangements = 0;
            return Ok(true);
        }
    }

    let mut best: Option<((i32, i32), usize, usize)> = None;
    for i in 0..terms.len() {
        for j in i + 1..terms.len() {
            if let Some(score) = N::score(&terms[i], &terms[j]) {
                if best.map_or(true, |(b, _, _)| score < b) {
                    best = Some((score, i, j));
                }
            }
        }
    }
    let Some((score, i, j)) = best else {
        return Ok(false);
    };

    let combined = N::fold(&terms[i], &terms[j], cx)?;
    state.remove(terms, j);
    state.remove(terms, i);
    terms.insert(state.clean, combined);
    state.rearrangements = 0;
    cx.stats.folds += 1;
    debug!(op = ?N::KIND, ?score, "folded pair");
    Ok(true)
}

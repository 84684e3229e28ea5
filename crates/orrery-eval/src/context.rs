//! Evaluation context: configuration, statistics and the upgrade policy.

use orrery_core::{ArithError, Leaf};
use orrery_float::RoundingContext;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::rules::RuleRegistry;

/// Configuration for reduction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Maximum number of `reduce_step` rounds `canonicalize` performs.
    pub max_steps: usize,
    /// Changed-but-not-annihilated rearrangements allowed between two folds
    /// of one n-ary node.
    pub max_rearrangements: usize,
    /// Retry an overflowing leaf operation one rung up the representation
    /// ladder.
    pub allow_upgrade: bool,
    /// Run the inexact pass. When off, canonical means exact-canonical.
    pub fold_inexact: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            max_steps: 100_000,
            max_rearrangements: 256,
            allow_upgrade: true,
            fold_inexact: true,
        }
    }
}

/// Counters collected while reducing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvalStats {
    /// `reduce_step` calls that made exact progress.
    pub exact_rounds: usize,
    /// `reduce_step` calls that made inexact progress.
    pub inexact_rounds: usize,
    /// Pairs destructively combined.
    pub folds: usize,
    /// Changed-but-not-annihilated pair interactions.
    pub rearrangements: usize,
    /// Representation upgrades after overflow.
    pub upgrades: usize,
    /// Registry rules fired.
    pub rules_fired: usize,
}

/// Everything reduction threads through: the rounding context, the rule
/// registry, configuration and statistics.
///
/// Holds a [`RoundingContext`], so it is not `Sync`.
pub struct EvalContext {
    rounding: RoundingContext,
    rules: RuleRegistry,
    /// Configuration.
    pub config: EvalConfig,
    /// Statistics.
    pub stats: EvalStats,
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new()
    }
}

impl EvalContext {
    /// A context with the default configuration and rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EvalConfig::default())
    }

    /// A context with custom configuration and the default rule set.
    #[must_use]
    pub fn with_config(config: EvalConfig) -> Self {
        Self {
            rounding: RoundingContext::new(),
            rules: RuleRegistry::with_defaults(),
            config,
            stats: EvalStats::default(),
        }
    }

    /// Replaces the rule registry.
    #[must_use]
    pub fn with_rules(mut self, rules: RuleRegistry) -> Self {
        self.rules = rules;
        self
    }

    /// The rounding context for interval endpoints.
    #[must_use]
    pub fn rounding(&self) -> &RoundingContext {
        &self.rounding
    }

    /// The identity-rule registry.
    #[must_use]
    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    /// Mutable access to the registry, for registering rules late.
    pub fn rules_mut(&mut self) -> &mut RuleRegistry {
        &mut self.rules
    }

    /// Clears the statistics.
    pub fn reset_stats(&mut self) {
        self.stats = EvalStats::default();
    }

    /// Applies a binary leaf operation, climbing the representation ladder
    /// while it overflows and upgrades are allowed.
    ///
    /// # Errors
    ///
    /// The operation's error once no upgrade remains, or immediately for
    /// non-retryable errors.
    pub fn leaf_binary(
        &mut self,
        a: &Leaf,
        b: &Leaf,
        op: fn(&Leaf, &Leaf, &RoundingContext) -> Result<Leaf, ArithError>,
    ) -> Result<Leaf, ArithError> {
        let (mut a, mut b) = (*a, *b);
        loop {
            match op(&a, &b, &self.rounding) {
                Err(err) if err.is_retryable() && self.config.allow_upgrade => {
                    let (pa, pb) = Leaf::promote_pair(a, b);
                    let (Some(ua), Some(ub)) = (pa.upgrade(), pb.upgrade()) else {
                        return Err(err);
                    };
                    self.note_upgrade(&pa, &ua, &err);
                    a = ua;
                    b = ub;
                }
                other => return other,
            }
        }
    }

    /// Unary counterpart of [`EvalContext::leaf_binary`].
    ///
    /// # Errors
    ///
    /// As for [`EvalContext::leaf_binary`].
    pub fn leaf_unary<F>(&mut self, a: &Leaf, op: F) -> Result<Leaf, ArithError>
    where
        F: Fn(&Leaf, &RoundingContext) -> Result<Leaf, ArithError>,
    {
        let mut a = *a;
        loop {
            match op(&a, &self.rounding) {
                Err(err) if err.is_retryable() && self.config.allow_upgrade => {
                    let Some(up) = a.upgrade() else {
                        return Err(err);
                    };
                    self.note_upgrade(&a, &up, &err);
                    a = up;
                }
                other => return other,
            }
        }
    }

    fn note_upgrade(&mut self, from: &Leaf, to: &Leaf, err: &ArithError) {
        debug!(
            from = %from.representation(),
            to = %to.representation(),
            cause = %err,
            "upgrading leaf representation"
        );
        self.stats.upgrades += 1;
    }
}

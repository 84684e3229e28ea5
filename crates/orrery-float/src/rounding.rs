//! Directed rounding.
//!
//! Rust exposes no portable control over the FPU rounding-mode register, and
//! a process-wide mode would be a hidden side channel anyway. Instead every
//! operation here rounds to nearest and then inspects the exact error term
//! (two-sum, or a fused multiply-add residual) to step one ulp in the
//! requested direction when the nearest result lies on the wrong side.
//!
//! The context is an explicit value threaded through every interval
//! operation. It is deliberately `!Sync`: one active rounding context per
//! thread of evaluation.

use std::cell::Cell;
use std::marker::PhantomData;

use crate::float::{two_sum, Binary};

/// Rounding direction for a bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Toward negative infinity (lower bounds).
    Down,
    /// Toward positive infinity (upper bounds).
    Up,
}

impl Direction {
    /// The opposite direction.
    #[must_use]
    pub fn reverse(self) -> Self {
        match self {
            Direction::Down => Direction::Up,
            Direction::Up => Direction::Down,
        }
    }
}

/// Explicit directed-rounding context.
#[derive(Debug, Default)]
pub struct RoundingContext {
    _not_sync: PhantomData<Cell<()>>,
}

impl RoundingContext {
    /// Creates a new rounding context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `a + b` rounded in direction `dir`.
    pub fn add<T: Binary>(&self, a: T, b: T, dir: Direction) -> T {
        let s = a + b;
        if s.is_nan() || a.is_infinite() || b.is_infinite() {
            return s;
        }
        if s.is_infinite() {
            return overflowed(s, dir);
        }
        let (_, err) = two_sum(a, b);
        nudge(s, err, dir)
    }

    /// `a - b` rounded in direction `dir`.
    pub fn sub<T: Binary>(&self, a: T, b: T, dir: Direction) -> T {
        self.add(a, -b, dir)
    }

    /// `a * b` rounded in direction `dir`.
    pub fn mul<T: Binary>(&self, a: T, b: T, dir: Direction) -> T {
        let p = a * b;
        if p.is_nan() || !a.is_finite() || !b.is_finite() {
            return p;
        }
        if p.is_infinite() {
            return overflowed(p, dir);
        }
        if a.is_zero() || b.is_zero() {
            return p;
        }
        let negative = a.is_sign_negative() != b.is_sign_negative();
        if p.is_zero() {
            return underflowed(negative, dir);
        }
        if p.abs() < T::fma_threshold() {
            return step_outward(p, dir);
        }
        let err = a.mul_add(b, -p);
        nudge(p, err, dir)
    }

    /// `a / b` rounded in direction `dir`.
    ///
    /// Division by zero yields the IEEE signed infinity; callers classify
    /// zero divisors before getting here.
    pub fn div<T: Binary>(&self, a: T, b: T, dir: Direction) -> T {
        let q = a / b;
        if q.is_nan() || b.is_zero() || !a.is_finite() || !b.is_finite() {
            return q;
        }
        if q.is_infinite() {
            return overflowed(q, dir);
        }
        if a.is_zero() {
            return q;
        }
        let negative = a.is_sign_negative() != b.is_sign_negative();
        if q.is_zero() {
            return underflowed(negative, dir);
        }
        if q.abs() < T::fma_threshold() || a.abs() < T::fma_threshold() {
            return step_outward(q, dir);
        }
        // a - q*b is exact for a correctly rounded quotient.
        let residual = -q.mul_add(b, -a);
        let err = if b.is_sign_negative() { -residual } else { residual };
        nudge(q, err, dir)
    }

    /// `x^n` for `x >= 0`, by repeated squaring with every step rounded in
    /// direction `dir`. Monotonic on the non-negative half-line, so the
    /// result bounds the exact power from the requested side.
    pub fn powi_nonneg<T: Binary>(&self, x: T, n: u32, dir: Direction) -> T {
        debug_assert!(!x.is_sign_negative() || x.is_zero());
        let mut acc = T::one();
        let mut base = x;
        let mut n = n;
        while n > 0 {
            if n & 1 == 1 {
                acc = self.mul(acc, base, dir);
            }
            n >>= 1;
            if n > 0 {
                base = self.mul(base, base, dir);
            }
        }
        acc
    }
}

fn nudge<T: Binary>(value: T, err: T, dir: Direction) -> T {
    match dir {
        Direction::Down if err < T::zero() => value.next_down(),
        Direction::Up if err > T::zero() => value.next_up(),
        _ => value,
    }
}

fn step_outward<T: Binary>(value: T, dir: Direction) -> T {
    match dir {
        Direction::Down => value.next_down(),
        Direction::Up => value.next_up(),
    }
}

fn overflowed<T: Binary>(value: T, dir: Direction) -> T {
    match (value.is_sign_positive(), dir) {
        (true, Direction::Down) => T::max_value(),
        (false, Direction::Up) => -T::max_value(),
        _ => value,
    }
}

fn underflowed<T: Binary>(negative: bool, dir: Direction) -> T {
    match (negative, dir) {
        (false, Direction::Down) => T::zero(),
        (false, Direction::Up) => T::min_subnormal(),
        (true, Direction::Down) => -T::min_subnormal(),
        (true, Direction::Up) => -T::zero(),
    }
}

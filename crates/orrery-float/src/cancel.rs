//! Mantissa-cancellation rearrangement.
//!
//! Given two floats that are about to be added, move the largest portion of
//! the smaller operand into the larger one that can be moved without any
//! rounding. The pair's exact sum never changes. Repeating this over many
//! terms (smallest magnitudes first) lets a sum be folded with a much
//! smaller worst-case error than naive left-to-right accumulation.

use std::mem;

use tracing::trace;

use crate::error::CancelError;
use crate::float::{fast_two_sum, Binary};
use crate::interval::Interval;

/// Outcome of a rearrangement step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rearranged {
    /// The second operand is now zero and the first holds the exact sum.
    Combined,
    /// An exact portion moved; the second operand shrank and the pair may
    /// be retried.
    Changed,
    /// Nothing can move without rounding: the smaller operand is below half
    /// an ulp of the larger. Both operands are untouched.
    Absorbed,
}

/// Rearranges `a` and `b` so that `a` carries as much of `a + b` as can be
/// represented exactly, keeping `a + b` unchanged.
///
/// On return the larger-magnitude part sits in `a`; the operands may have
/// been swapped to get there.
///
/// # Errors
///
/// `Indeterminate` for opposite infinities, `Overflow` when the exact sum
/// exceeds the finite range.
pub fn rearrange<T: Binary>(a: &mut T, b: &mut T) -> Result<Rearranged, CancelError> {
    if a.is_nan() || b.is_nan() {
        return Err(CancelError::Indeterminate);
    }
    if b.is_zero() {
        return Ok(Rearranged::Combined);
    }
    if a.is_zero() {
        mem::swap(a, b);
        *b = T::zero();
        return Ok(Rearranged::Combined);
    }

    match (a.is_infinite(), b.is_infinite()) {
        (true, true) if a.is_sign_positive() != b.is_sign_positive() => {
            return Err(CancelError::Indeterminate);
        }
        (true, _) => {
            *b = T::zero();
            return Ok(Rearranged::Combined);
        }
        (false, true) => {
            mem::swap(a, b);
            *b = T::zero();
            return Ok(Rearranged::Combined);
        }
        (false, false) => {}
    }

    if a.abs() < b.abs() {
        mem::swap(a, b);
    }

    // Both finite and nonzero from here on.
    let (Some(ea), Some(eb)) = (a.exponent(), b.exponent()) else {
        return Ok(Rearranged::Absorbed);
    };
    if ea - eb > T::MANTISSA_DIGITS as i32 + 1 {
        return Ok(Rearranged::Absorbed);
    }

    // Subnormals share one quantum, so their sum is always exact.
    if a.abs() < T::min_positive_value() {
        *a = *a + *b;
        *b = T::zero();
        return Ok(Rearranged::Combined);
    }

    if a.is_sign_positive() == b.is_sign_positive() {
        transfer_same_sign(a, b)
    } else {
        transfer_cancelling(a, b)
    }
}

fn transfer_same_sign<T: Binary>(a: &mut T, b: &mut T) -> Result<Rearranged, CancelError> {
    let (s, r) = fast_two_sum(*a, *b);
    if s.is_infinite() {
        return Err(CancelError::Overflow);
    }
    Ok(commit(a, b, s, r))
}

fn transfer_cancelling<T: Binary>(a: &mut T, b: &mut T) -> Result<Rearranged, CancelError> {
    // Sterbenz: |a|/2 <= |b| <= |a| makes the difference exact.
    if b.abs() + b.abs() >= a.abs() {
        *a = *a + *b;
        *b = T::zero();
        return Ok(Rearranged::Combined);
    }
    let (s, r) = fast_two_sum(*a, *b);
    Ok(commit(a, b, s, r))
}

fn commit<T: Binary>(a: &mut T, b: &mut T, s: T, r: T) -> Rearranged {
    if s == *a {
        return Rearranged::Absorbed;
    }
    *a = s;
    if r.is_zero() {
        *b = T::zero();
        Rearranged::Combined
    } else {
        *b = r;
        Rearranged::Changed
    }
}

/// Best-effort rearrangement of two intervals, endpoint by endpoint.
///
/// Each endpoint pair is rearranged independently, which keeps the exact
/// bounds of `a + b` unchanged. When the resulting intervals would be
/// malformed, or an operand is unbounded, both operands are restored and
/// `Absorbed` is reported so the caller falls back to direct interval
/// addition.
///
/// # Errors
///
/// Propagates errors from the scalar rearrangement.
pub fn rearrange_interval<T: Binary>(
    a: &mut Interval<T>,
    b: &mut Interval<T>,
) -> Result<Rearranged, CancelError> {
    if b.is_zero() {
        return Ok(Rearranged::Combined);
    }
    if a.is_zero() {
        mem::swap(a, b);
        return Ok(Rearranged::Combined);
    }
    if !a.is_bounded() || !b.is_bounded() || a.is_empty() || b.is_empty() {
        return Ok(Rearranged::Absorbed);
    }

    let (mut a_lo, mut b_lo) = (a.lo(), b.lo());
    let (mut a_hi, mut b_hi) = (a.hi(), b.hi());
    let lo = rearrange(&mut a_lo, &mut b_lo)?;
    let hi = rearrange(&mut a_hi, &mut b_hi)?;
    if lo == Rearranged::Absorbed && hi == Rearranged::Absorbed {
        return Ok(Rearranged::Absorbed);
    }

    let (Ok(new_a), Ok(new_b)) = (Interval::new(a_lo, a_hi), Interval::new(b_lo, b_hi)) else {
        trace!(?lo, ?hi, "endpoint rearrangement crossed, keeping intervals");
        return Ok(Rearranged::Absorbed);
    };
    *a = new_a;
    *b = new_b;
    if b.is_zero() {
        Ok(Rearranged::Combined)
    } else {
        Ok(Rearranged::Changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_terms_combine() {
        let (mut a, mut b) = (1.0f32, 1.0f32);
        assert_eq!(rearrange(&mut a, &mut b), Ok(Rearranged::Combined));
        assert_eq!(a, 2.0);
        assert_eq!(b, 0.0);
    }

    #[test]
    fn test_large_gap_is_absorbed() {
        let (mut a, mut b) = (1.0f64, 1e-30f64);
        assert_eq!(rearrange(&mut a, &mut b), Ok(Rearranged::Absorbed));
        assert_eq!(a, 1.0);
        assert_eq!(b, 1e-30);
        // The smaller operand contributes less than one ulp.
        assert!(b < f64::EPSILON * a);
    }

    #[test]
    fn test_swaps_larger_into_first_slot() {
        let (mut a, mut b) = (1e-30f64, 1.0f64);
        assert_eq!(rearrange(&mut a, &mut b), Ok(Rearranged::Absorbed));
        assert_eq!(a, 1.0);
    }

    #[test]
    fn test_partial_transfer_keeps_sum() {
        let a0 = 1.0f64;
        let b0 = 3.0 * f64::EPSILON / 4.0 + f64::EPSILON * f64::EPSILON;
        let (mut a, mut b) = (a0, b0);
        let outcome = rearrange(&mut a, &mut b).unwrap();
        assert_eq!(outcome, Rearranged::Changed);
        assert!(b.abs() < b0);
        // The transferred part was exact: the tail carries the remainder.
        assert_eq!(a - a0, b0 - b);
    }

    #[test]
    fn test_cancelling_sterbenz() {
        let (mut a, mut b) = (1.5f64, -1.0f64);
        assert_eq!(rearrange(&mut a, &mut b), Ok(Rearranged::Combined));
        assert_eq!(a, 0.5);
        assert_eq!(b, 0.0);
    }

    #[test]
    fn test_exact_negation_cancels() {
        let (mut a, mut b) = (0.1f64, -0.1f64);
        assert_eq!(rearrange(&mut a, &mut b), Ok(Rearranged::Combined));
        assert_eq!(a, 0.0);
    }

    #[test]
    fn test_subnormals_combine() {
        let tiny = f64::from_bits(3);
        let (mut a, mut b) = (tiny, f64::from_bits(5));
        assert_eq!(rearrange(&mut a, &mut b), Ok(Rearranged::Combined));
        assert_eq!(a, f64::from_bits(8));
    }

    #[test]
    fn test_infinities() {
        let (mut a, mut b) = (f64::INFINITY, f64::NEG_INFINITY);
        assert_eq!(rearrange(&mut a, &mut b), Err(CancelError::Indeterminate));
        let (mut a, mut b) = (2.0f64, f64::NEG_INFINITY);
        assert_eq!(rearrange(&mut a, &mut b), Ok(Rearranged::Combined));
        assert_eq!(a, f64::NEG_INFINITY);
        assert_eq!(b, 0.0);
    }

    #[test]
    fn test_overflow() {
        let (mut a, mut b) = (f64::MAX, f64::MAX);
        assert_eq!(rearrange(&mut a, &mut b), Err(CancelError::Overflow));
    }

    #[test]
    fn test_interval_endpointwise() {
        let mut a = Interval::new(1.0f64, 2.0).unwrap();
        let mut b = Interval::new(0.5f64, 0.75).unwrap();
        assert_eq!(rearrange_interval(&mut a, &mut b), Ok(Rearranged::Combined));
        assert_eq!(a, Interval::new(1.5, 2.75).unwrap());
    }

    #[test]
    fn test_interval_unbounded_falls_back() {
        let mut a = Interval::new(f64::NEG_INFINITY, -1.0).unwrap();
        let mut b = Interval::new(f64::NEG_INFINITY, 2.0).unwrap();
        assert_eq!(rearrange_interval(&mut a, &mut b), Ok(Rearranged::Absorbed));
    }
}

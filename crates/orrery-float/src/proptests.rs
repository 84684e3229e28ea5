//! Property-based tests for interval soundness and cancellation.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::cancel::{rearrange, Rearranged};
    use crate::float::{two_sum, Binary};
    use crate::interval::Interval;
    use crate::rounding::RoundingContext;

    // Strategy for an interval together with a member of it
    fn interval_with_member() -> impl Strategy<Value = (Interval<f64>, f64)> {
        (-1.0e6f64..1.0e6, 0.0f64..1.0e3, 0.0f64..=1.0).prop_map(|(lo, width, t)| {
            let hi = lo + width;
            let x = (lo + t * width).clamp(lo, hi);
            (Interval::new(lo, hi).unwrap(), x)
        })
    }

    fn finite_nonzero() -> impl Strategy<Value = f64> {
        prop_oneof![(-1.0e12f64..-1.0e-12), (1.0e-12f64..1.0e12)]
    }

    proptest! {
        // Interval soundness: the nearest-rounded scalar result of members
        // lies between the directed bounds.

        #[test]
        fn interval_add_sound((a, x) in interval_with_member(), (b, y) in interval_with_member()) {
            let cx = RoundingContext::new();
            let r = a.add(&b, &cx).unwrap();
            prop_assert!(r.contains(x + y));
        }

        #[test]
        fn interval_sub_sound((a, x) in interval_with_member(), (b, y) in interval_with_member()) {
            let cx = RoundingContext::new();
            let r = a.sub(&b, &cx).unwrap();
            prop_assert!(r.contains(x - y));
        }

        #[test]
        fn interval_mul_sound((a, x) in interval_with_member(), (b, y) in interval_with_member()) {
            let cx = RoundingContext::new();
            let r = a.mul(&b, &cx).unwrap();
            prop_assert!(r.contains(x * y));
        }

        #[test]
        fn interval_div_sound((a, x) in interval_with_member(), (b, y) in interval_with_member()) {
            let cx = RoundingContext::new();
            match a.div(&b, &cx) {
                Ok(r) => prop_assert!(r.contains(x / y) || y == 0.0),
                Err(_) => prop_assert!(b.contains_zero()),
            }
        }

        #[test]
        fn interval_square_sound((a, x) in interval_with_member()) {
            let cx = RoundingContext::new();
            let r = a.square(&cx).unwrap();
            prop_assert!(r.contains(x * x));
            prop_assert!(r.lo() >= 0.0);
        }

        #[test]
        fn rescale_round_trip(x in finite_nonzero(), t in 0.0f64..=1.0) {
            let (lo, hi) = x.safe_scale_range();
            let span = f64::from(hi) - f64::from(lo);
            let e = (f64::from(lo) + t * span).round() as i32;
            let e = e.clamp(lo, hi);
            prop_assert_eq!(x.scale(e).scale(-e), x);
        }

        #[test]
        fn rearrange_preserves_exact_sum(a in finite_nonzero(), b in finite_nonzero()) {
            let before = two_sum(a, b);
            let (mut a1, mut b1) = (a, b);
            let outcome = rearrange(&mut a1, &mut b1).unwrap();
            prop_assert_eq!(two_sum(a1, b1), before);
            if outcome == Rearranged::Combined {
                prop_assert_eq!(b1, 0.0);
            }
            prop_assert!(a1.abs() >= b1.abs());
        }

        #[test]
        fn rearrange_terminates(a in finite_nonzero(), b in finite_nonzero()) {
            let (mut a1, mut b1) = (a, b);
            let mut rounds = 0;
            while rearrange(&mut a1, &mut b1).unwrap() == Rearranged::Changed {
                rounds += 1;
                prop_assert!(rounds < 8);
            }
        }
    }
}

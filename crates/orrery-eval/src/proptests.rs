//! Property-based tests for the algebraic laws of reduction.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use orrery_core::{Leaf, NumericValue};

    use crate::context::EvalContext;
    use crate::expr::Expr;

    fn canonical(mut e: Expr) -> Expr {
        let mut cx = EvalContext::new();
        let progress = e.canonicalize(&mut cx).unwrap();
        assert!(progress.canonical);
        e
    }

    // Finite doubles away from the overflow boundary
    fn moderate() -> impl Strategy<Value = f64> {
        -1.0e10f64..1.0e10
    }

    fn scalar() -> impl Strategy<Value = Expr> {
        prop_oneof![
            (-1_000_000i64..1_000_000).prop_map(Expr::int),
            moderate().prop_map(|x| Expr::f64(x).unwrap()),
            (-1.0e6f32..1.0e6).prop_map(|x| Expr::f32(x).unwrap()),
        ]
    }

    fn leaf() -> impl Strategy<Value = Expr> {
        prop_oneof![
            3 => scalar(),
            1 => (-1.0e6f64..1.0e6, 0.0f64..1.0e3)
                .prop_map(|(lo, w)| Expr::interval_f64(lo, lo + w).unwrap()),
            1 => (-1.0e4f32..1.0e4, 0.0f32..1.0e2)
                .prop_map(|(lo, w)| Expr::interval_f32(lo, lo + w).unwrap()),
        ]
    }

    fn combine(op: usize, x: Expr, y: Expr) -> Expr {
        match op {
            0 => x + y,
            1 => x - y,
            2 => x * y,
            _ => Expr::quotient(x, y),
        }
    }

    #[test]
    fn empty_nodes_are_identities() {
        assert_eq!(canonical(Expr::sum(Vec::new())), Expr::int(0));
        assert_eq!(canonical(Expr::product(Vec::new())), Expr::int(1));
    }

    proptest! {
        #[test]
        fn additive_identity(x in leaf()) {
            let direct = canonical(x.clone());
            prop_assert_eq!(canonical(x + Expr::int(0)), direct);
        }

        #[test]
        fn multiplicative_identity(x in leaf()) {
            let direct = canonical(x.clone());
            prop_assert_eq!(canonical(x * Expr::int(1)), direct);
        }

        #[test]
        fn exact_annihilation(x in scalar()) {
            let e = canonical(x.clone() + x.negate());
            prop_assert!(e.is_zero());
        }

        #[test]
        fn double_negation(x in leaf()) {
            prop_assert_eq!(canonical(x.clone().negate().negate()), canonical(x));
        }

        #[test]
        fn sum_order_insensitive(a in moderate(), b in moderate()) {
            let (x, y) = (Expr::f64(a).unwrap(), Expr::f64(b).unwrap());
            let ab = canonical(x.clone() + y.clone());
            let ba = canonical(y + x);
            prop_assert_eq!(ab.as_leaf(), ba.as_leaf());
            prop_assert_eq!(ab.as_leaf(), Some(&Leaf::F64(a + b)));
        }

        #[test]
        fn canonicalize_is_idempotent(a in leaf(), b in leaf(), c in leaf()) {
            let mut e = (a * b) + c.negate();
            let mut cx = EvalContext::new();
            e.canonicalize(&mut cx).unwrap();
            let before = e.clone();
            let again = e.canonicalize(&mut cx).unwrap();
            prop_assert_eq!(again.steps, 0);
            prop_assert_eq!(e, before);
        }

        #[test]
        fn rescale_round_trip(x in moderate(), e in -200i32..200) {
            let original = Expr::f64(x).unwrap();
            let scaled = canonical(original.clone().with_scale(e).with_scale(-e));
            prop_assert_eq!(scaled, original);
        }

        #[test]
        fn mixed_sum_order_insensitive(x in leaf(), y in leaf()) {
            let ab = canonical(x.clone() + y.clone());
            let ba = canonical(y + x);
            prop_assert_eq!(ab, ba);
        }

        #[test]
        fn mixed_rescale_round_trip(x in leaf(), e in -200i32..200) {
            let scaled = canonical(x.clone().with_scale(e).with_scale(-e));
            prop_assert_eq!(scaled, canonical(x));
        }

        #[test]
        fn point_interval_encloses_float(a in moderate(), b in moderate(), op in 0usize..4) {
            prop_assume!(op < 3 || b != 0.0);
            let float = canonical(combine(op, Expr::f64(a).unwrap(), Expr::f64(b).unwrap()));
            let point = |x: f64| Expr::interval_f64(x, x).unwrap();
            let enclosed = canonical(combine(op, point(a), point(b)));
            let (Some(&Leaf::F64(r)), Some(Leaf::IntervalF64(iv))) =
                (float.as_leaf(), enclosed.as_leaf())
            else {
                panic!("expected a double and an interval, got {float} and {enclosed}");
            };
            prop_assert!(iv.contains(r), "{} not in {}", r, iv);
        }
    }
}

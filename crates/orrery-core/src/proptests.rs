//! Property-based tests for leaf arithmetic and persistence.

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use proptest::prelude::*;

    use orrery_float::{Interval, RoundingContext};

    use crate::error::Representation;
    use crate::leaf::Leaf;
    use crate::persist::{read_leaf, write_leaf};
    use crate::value::ExactScaling;

    fn any_leaf() -> impl Strategy<Value = Leaf> {
        prop_oneof![
            any::<i64>().prop_map(Leaf::Int),
            (-1.0e30f32..1.0e30).prop_map(Leaf::F32),
            (-1.0e300f64..1.0e300).prop_map(Leaf::F64),
            (-1.0e6f64..1.0e6, 0.0f64..1.0e3)
                .prop_map(|(lo, w)| Leaf::IntervalF64(Interval::new(lo, lo + w).unwrap())),
        ]
    }

    proptest! {
        #[test]
        fn persisted_leaf_reads_back(leaf in any_leaf()) {
            let mut buf = Vec::new();
            write_leaf(&mut buf, &leaf).unwrap();
            let back = read_leaf(&mut Cursor::new(buf)).unwrap();
            prop_assert_eq!(back, leaf);
        }

        #[test]
        fn exact_product_matches_rounded(a in -1.0e100f64..1.0e100, b in -1.0e100f64..1.0e100) {
            let cx = RoundingContext::new();
            let (x, y) = (Leaf::F64(a), Leaf::F64(b));
            if let Some(p) = x.mul_exact(&y).unwrap() {
                prop_assert_eq!(p, x.mul(&y, &cx).unwrap());
            }
        }

        #[test]
        fn small_int_promotes_to_same_float(n in -(1i64 << 53)..(1i64 << 53), x in -1.0e6f64..1.0e6) {
            let (a, b) = Leaf::promote_pair(Leaf::Int(n), Leaf::F64(x));
            prop_assert_eq!(a.representation(), Representation::F64);
            #[allow(clippy::cast_precision_loss)]
            let expected = Leaf::F64(n as f64);
            prop_assert_eq!(a, expected);
            prop_assert_eq!(b, Leaf::F64(x));
        }

        #[test]
        fn rescale_inverts(leaf in any_leaf(), e in -64i32..64) {
            let mut scaled = leaf;
            if scaled.rescale(e) {
                prop_assert!(scaled.rescale(-e));
                prop_assert_eq!(scaled, leaf);
            }
        }

        #[test]
        fn rearrange_keeps_rounded_sum(a in -1.0e20f64..1.0e20, b in -1.0e20f64..1.0e20) {
            let cx = RoundingContext::new();
            let (mut x, mut y) = (Leaf::F64(a), Leaf::F64(b));
            let before = x.add(&y, &cx).unwrap();
            x.rearrange(&mut y).unwrap();
            prop_assert_eq!(x.add(&y, &cx).unwrap(), before);
        }
    }
}

//! Domains, signs and print precedence.

use std::fmt;

/// The algebraic set a value belongs to.
///
/// ```text
/// Integer ⊂ Rational ⊂ Real ⊂ Complex
///                       ∩        ∩
///               ExtendedReal ⊂ ExtendedComplex
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Domain {
    /// Integers.
    Integer,
    /// Rationals.
    Rational,
    /// Reals.
    Real,
    /// Complex numbers.
    Complex,
    /// Reals with signed infinities.
    ExtendedReal,
    /// Complex numbers with a point at infinity.
    ExtendedComplex,
}

impl Domain {
    fn parts(self) -> (u8, bool, bool) {
        match self {
            Domain::Integer => (0, false, false),
            Domain::Rational => (1, false, false),
            Domain::Real => (2, false, false),
            Domain::Complex => (2, true, false),
            Domain::ExtendedReal => (2, false, true),
            Domain::ExtendedComplex => (2, true, true),
        }
    }

    fn from_parts(level: u8, complex: bool, extended: bool) -> Self {
        match (complex, extended, level) {
            (true, true, _) => Domain::ExtendedComplex,
            (true, false, _) => Domain::Complex,
            (false, true, _) => Domain::ExtendedReal,
            (false, false, 0) => Domain::Integer,
            (false, false, 1) => Domain::Rational,
            (false, false, _) => Domain::Real,
        }
    }

    /// Least domain containing both.
    #[must_use]
    pub fn join(self, other: Domain) -> Domain {
        let (la, ca, ea) = self.parts();
        let (lb, cb, eb) = other.parts();
        Self::from_parts(la.max(lb), ca || cb, ea || eb)
    }

    /// The same domain with its imaginary axis added.
    #[must_use]
    pub fn complexify(self) -> Domain {
        let (_, _, extended) = self.parts();
        Self::from_parts(2, true, extended)
    }

    /// Returns true if the domain admits infinities.
    #[must_use]
    pub fn is_extended(self) -> bool {
        self.parts().2
    }

    /// Returns true if the domain has an imaginary axis.
    #[must_use]
    pub fn is_complex(self) -> bool {
        self.parts().1
    }
}

/// Sign of a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Sign {
    /// Strictly negative.
    Negative,
    /// Zero.
    Zero,
    /// Strictly positive.
    Positive,
}

impl Sign {
    /// `-1`, `0` or `1`.
    #[must_use]
    pub fn as_i8(self) -> i8 {
        match self {
            Sign::Negative => -1,
            Sign::Zero => 0,
            Sign::Positive => 1,
        }
    }

    /// Inverse of [`Sign::as_i8`].
    #[must_use]
    pub fn from_i8(s: i8) -> Self {
        match s.signum() {
            -1 => Sign::Negative,
            0 => Sign::Zero,
            _ => Sign::Positive,
        }
    }

    /// Sign of a product.
    #[must_use]
    pub fn mul(self, other: Sign) -> Sign {
        Sign::from_i8(self.as_i8() * other.as_i8())
    }

    /// Sign of the negation.
    #[must_use]
    pub fn negate(self) -> Sign {
        Sign::from_i8(-self.as_i8())
    }
}

/// Binding strength when printing; a child with lower precedence than its
/// parent is parenthesized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Precedence {
    /// `a + b`
    Additive,
    /// `a * b`, `a / b`
    Multiplicative,
    /// `-a`
    Unary,
    /// `a ^ b`
    Power,
    /// Literals.
    Atom,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Domain::Integer => "Z",
            Domain::Rational => "Q",
            Domain::Real => "R",
            Domain::Complex => "C",
            Domain::ExtendedReal => "R∪{±∞}",
            Domain::ExtendedComplex => "C∪{∞}",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join() {
        assert_eq!(Domain::Integer.join(Domain::Rational), Domain::Rational);
        assert_eq!(Domain::Rational.join(Domain::Real), Domain::Real);
        assert_eq!(Domain::Real.join(Domain::Complex), Domain::Complex);
        assert_eq!(
            Domain::ExtendedReal.join(Domain::Complex),
            Domain::ExtendedComplex
        );
        assert_eq!(Domain::Integer.join(Domain::Integer), Domain::Integer);
    }

    #[test]
    fn test_complexify() {
        assert_eq!(Domain::Integer.complexify(), Domain::Complex);
        assert_eq!(Domain::ExtendedReal.complexify(), Domain::ExtendedComplex);
    }

    #[test]
    fn test_sign() {
        assert_eq!(Sign::Negative.mul(Sign::Negative), Sign::Positive);
        assert_eq!(Sign::Zero.mul(Sign::Negative), Sign::Zero);
        assert_eq!(Sign::Positive.negate(), Sign::Negative);
        assert_eq!(Sign::from_i8(-7), Sign::Negative);
    }

    #[test]
    fn test_precedence_order() {
        assert!(Precedence::Additive < Precedence::Multiplicative);
        assert!(Precedence::Power < Precedence::Atom);
    }
}

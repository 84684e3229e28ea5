//! Shared-until-mutated ownership.

use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use tracing::trace;

/// A value that is either shared with other holders or owned outright.
///
/// Reads never copy. The first mutable access to a shared value clones it
/// into owned storage, so other holders never observe the change.
#[derive(Debug)]
pub enum CowCell<T> {
    /// Shared with other cells.
    Shared(Rc<T>),
    /// Exclusively owned.
    Owned(T),
}

impl<T: Clone> CowCell<T> {
    /// An owned cell.
    #[must_use]
    pub fn owned(value: T) -> Self {
        CowCell::Owned(value)
    }

    /// A cell sharing `value`.
    #[must_use]
    pub fn shared(value: Rc<T>) -> Self {
        CowCell::Shared(value)
    }

    /// Shared read access.
    #[must_use]
    pub fn read(&self) -> &T {
        match self {
            CowCell::Shared(rc) => rc,
            CowCell::Owned(v) => v,
        }
    }

    /// Mutable access, cloning a shared value first.
    pub fn to_mut(&mut self) -> &mut T {
        if let CowCell::Shared(rc) = self {
            trace!(holders = Rc::strong_count(rc), "copying shared value on first write");
            let copy = T::clone(rc);
            *self = CowCell::Owned(copy);
        }
        match self {
            CowCell::Owned(v) => v,
            CowCell::Shared(_) => unreachable!("shared cell was replaced above"),
        }
    }

    /// Returns true while the value is borrowed from elsewhere.
    #[must_use]
    pub fn is_shared(&self) -> bool {
        matches!(self, CowCell::Shared(_))
    }

    /// Converts into a shareable handle, moving an owned value behind an
    /// `Rc`.
    #[must_use]
    pub fn into_shared(self) -> Rc<T> {
        match self {
            CowCell::Shared(rc) => rc,
            CowCell::Owned(v) => Rc::new(v),
        }
    }

    /// The owned value, cloning if shared.
    #[must_use]
    pub fn into_inner(self) -> T {
        match self {
            CowCell::Shared(rc) => Rc::try_unwrap(rc).unwrap_or_else(|rc| T::clone(&rc)),
            CowCell::Owned(v) => v,
        }
    }
}

/// Cloning shares: an owned source stays owned, a shared one bumps its
/// count.
impl<T: Clone> Clone for CowCell<T> {
    fn clone(&self) -> Self {
        match self {
            CowCell::Shared(rc) => CowCell::Shared(Rc::clone(rc)),
            CowCell::Owned(v) => CowCell::Owned(v.clone()),
        }
    }
}

impl<T: Clone> Deref for CowCell<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.read()
    }
}

impl<T: Clone + PartialEq> PartialEq for CowCell<T> {
    fn eq(&self, other: &Self) -> bool {
        self.read() == other.read()
    }
}

impl<T: Clone> From<T> for CowCell<T> {
    fn from(value: T) -> Self {
        CowCell::Owned(value)
    }
}

impl<T: Clone + fmt::Display> fmt::Display for CowCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.read().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutation_detaches_from_source() {
        let source = Rc::new(vec![1, 2, 3]);
        let mut cell = CowCell::shared(Rc::clone(&source));
        assert!(cell.is_shared());
        cell.to_mut().push(4);
        assert!(!cell.is_shared());
        assert_eq!(*source, vec![1, 2, 3]);
        assert_eq!(cell.read(), &vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_sole_holder_still_becomes_owned() {
        let mut cell = CowCell::shared(Rc::new(5));
        *cell.to_mut() += 1;
        assert!(!cell.is_shared());
        assert!(matches!(cell, CowCell::Owned(6)));
    }

    #[test]
    fn test_clone_of_shared_shares() {
        let cell = CowCell::shared(Rc::new(7));
        let other = cell.clone();
        assert!(other.is_shared());
        assert_eq!(Rc::strong_count(&cell.into_shared()), 2);
    }

    #[test]
    fn test_owned_round_trip() {
        let mut cell = CowCell::owned(String::from("a"));
        cell.to_mut().push('b');
        assert_eq!(cell.into_inner(), "ab");
    }
}

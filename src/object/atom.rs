//! Interned atoms.

use rustc_hash::FxHashMap;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{Arc, RwLock};

/// An immutable interned byte string.
///
/// Atoms back both dictionary-key/name literals and bare keyword operators.
/// While an [`AtomTable`] lives, two atoms with equal text share the same
/// allocation, so equality usually short-circuits on pointer identity.
#[derive(Clone, Eq)]
pub struct Atom(Arc<[u8]>);

impl Atom {
    /// Create a detached atom that does not go through a table.
    ///
    /// Useful for lookups and tests; equality with interned atoms still
    /// holds because comparison falls back to the text.
    pub fn new(bytes: &[u8]) -> Self {
        Self(Arc::from(bytes))
    }

    /// Return a string representation of the atom.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(self).unwrap_or("{non-ascii atom}")
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || *self.0 == *other.0
    }
}

impl Hash for Atom {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.deref().hash(state);
    }
}

impl Deref for Atom {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for Atom {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::borrow::Borrow<[u8]> for Atom {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for Atom {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.as_str())
    }
}

/// The intern table for atoms, owned by one document session.
///
/// Interning keeps memory bounded for documents that repeat the same small
/// set of key names millions of times. The table is cleared between
/// independent documents via [`AtomTable::clear`] rather than living for the
/// whole process.
#[derive(Default)]
pub struct AtomTable {
    atoms: RwLock<FxHashMap<Arc<[u8]>, Atom>>,
}

impl AtomTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern the given bytes.
    pub fn intern(&self, bytes: &[u8]) -> Atom {
        if let Some(atom) = self.atoms.read().unwrap().get(bytes) {
            return atom.clone();
        }

        let mut atoms = self.atoms.write().unwrap();

        // A racing writer may have interned it in the meantime.
        if let Some(atom) = atoms.get(bytes) {
            return atom.clone();
        }

        let repr: Arc<[u8]> = Arc::from(bytes);
        let atom = Atom(repr.clone());
        atoms.insert(repr, atom.clone());

        atom
    }

    /// The number of interned atoms.
    pub fn len(&self) -> usize {
        self.atoms.read().unwrap().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.atoms.read().unwrap().is_empty()
    }

    /// Drop all interned atoms.
    ///
    /// Outstanding [`Atom`]s stay valid; they merely stop sharing storage
    /// with atoms interned afterwards.
    pub fn clear(&self) {
        self.atoms.write().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use crate::object::atom::{Atom, AtomTable};
    use std::sync::Arc;

    #[test]
    fn interning_shares_storage() {
        let table = AtomTable::new();
        let a = table.intern(b"Type");
        let b = table.intern(b"Type");

        assert!(Arc::ptr_eq(&a.0, &b.0));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn equality_is_by_text() {
        let table = AtomTable::new();
        let a = table.intern(b"Catalog");

        assert_eq!(a, Atom::new(b"Catalog"));
        assert_ne!(a, Atom::new(b"Pages"));
    }

    #[test]
    fn clear_resets_the_table() {
        let table = AtomTable::new();
        let a = table.intern(b"Root");
        table.clear();
        let b = table.intern(b"Root");

        assert!(table.len() == 1);
        // Still equal by text after the reset.
        assert_eq!(a, b);
    }
}

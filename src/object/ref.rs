//! Indirect object references and the containers that track them.

use crate::object::Object;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt::{Debug, Display, Formatter};
use std::sync::RwLock;

/// A reference to an object stored elsewhere in the document.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub struct ObjRef {
    /// The object number.
    pub num: u32,
    /// The generation number.
    pub r#gen: u32,
}

impl ObjRef {
    /// Create a new object reference.
    pub fn new(num: u32, r#gen: u32) -> Self {
        Self { num, r#gen }
    }

    /// Parse the canonical string form produced by `Display`.
    pub fn from_canonical(s: &str) -> Option<Self> {
        let (num, rest) = s.split_once('R')?;
        let num = num.parse().ok()?;
        let r#gen = if rest.is_empty() { 0 } else { rest.parse().ok()? };

        Some(Self { num, r#gen })
    }
}

// The canonical form is the cache/set key everywhere, so it omits the
// generation when it is zero, by far the common case.
impl Display for ObjRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.r#gen == 0 {
            write!(f, "{}R", self.num)
        } else {
            write!(f, "{}R{}", self.num, self.r#gen)
        }
    }
}

/// A set of references, used to detect cycles while walking reference
/// chains.
#[derive(Default, Debug)]
pub struct RefSet(FxHashSet<ObjRef>);

impl RefSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the set contains the reference.
    pub fn has(&self, r: ObjRef) -> bool {
        self.0.contains(&r)
    }

    /// Insert a reference. Returns `false` if it was already present.
    pub fn put(&mut self, r: ObjRef) -> bool {
        self.0.insert(r)
    }

    /// Remove a reference.
    pub fn remove(&mut self, r: ObjRef) {
        self.0.remove(&r);
    }
}

/// A cache from references to decoded objects.
///
/// Owned by one document session and discarded wholesale on teardown. Also
/// serves as the loop-breaking memo during reference traversal: an alias
/// entry points one reference at the value already cached for another.
#[derive(Default)]
pub struct RefSetCache {
    map: RwLock<FxHashMap<ObjRef, Object>>,
}

impl RefSetCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached object.
    pub fn get(&self, r: ObjRef) -> Option<Object> {
        self.map.read().unwrap().get(&r).cloned()
    }

    /// Whether the cache holds an entry for the reference.
    pub fn has(&self, r: ObjRef) -> bool {
        self.map.read().unwrap().contains_key(&r)
    }

    /// Cache an object.
    pub fn put(&self, r: ObjRef, obj: Object) {
        self.map.write().unwrap().insert(r, obj);
    }

    /// Point `r` at the value already cached for `alias`.
    pub fn put_alias(&self, r: ObjRef, alias: ObjRef) {
        let mut map = self.map.write().unwrap();

        if let Some(obj) = map.get(&alias).cloned() {
            map.insert(r, obj);
        }
    }

    /// The number of cached entries.
    pub fn len(&self) -> usize {
        self.map.read().unwrap().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.map.read().unwrap().is_empty()
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.map.write().unwrap().clear();
    }
}

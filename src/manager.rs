//! The resolution managers.
//!
//! Every accessor in this crate either returns a value or fails with
//! [`Error::NeedsData`], naming the byte range that has to become resident
//! before the identical call can succeed. The managers own that loop: a
//! [`ChunkedManager`] fetches the missing range from its [`RangeSource`] and
//! re-invokes the accessor from scratch, while a [`LocalManager`] wraps a
//! fully resident document and never suspends by construction. The same
//! accessor code runs unmodified against either.

use crate::chunked::ChunkedData;
use crate::crypt::Decrypt;
use crate::object::atom::AtomTable;
use crate::object::{ObjRef, Object, RefSet, RefSetCache, Resolve};
use crate::parser::{ParseCtx, Parser};
use crate::reader::{Cursor, Window};
use crate::{Error, Result};
use log::warn;
use rustc_hash::FxHashMap;
use std::sync::{Arc, RwLock, Weak};

/// The byte-range source a chunked manager fetches from.
///
/// This is the only place the crate touches I/O; failures are propagated to
/// the caller verbatim and never retried.
pub trait RangeSource {
    /// Fetch the bytes of the half-open range `[begin, end)`.
    fn fetch(&mut self, begin: u64, end: u64) -> std::io::Result<Vec<u8>>;
}

/// Maps references to the absolute byte offset of their `N G obj` header.
///
/// Building this table (from a cross-reference table, or by scanning) is the
/// host's concern; the engine only consumes it.
#[derive(Default, Debug)]
pub struct ObjectIndex {
    map: FxHashMap<ObjRef, u64>,
}

impl ObjectIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the byte offset of an object.
    pub fn insert(&mut self, r: ObjRef, offset: u64) {
        self.map.insert(r, offset);
    }

    /// The byte offset of an object.
    pub fn get(&self, r: ObjRef) -> Option<u64> {
        self.map.get(&r).copied()
    }

    /// The number of indexed objects.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl FromIterator<(ObjRef, u64)> for ObjectIndex {
    fn from_iter<T: IntoIterator<Item = (ObjRef, u64)>>(iter: T) -> Self {
        Self {
            map: iter.into_iter().collect(),
        }
    }
}

/// Tuning knobs for a document session.
#[derive(Default)]
pub struct DocumentOptions {
    /// The decryption transform for strings and stream payloads.
    pub decryptor: Option<Box<dyn Decrypt>>,
    /// Tolerate structural malformation by returning partial results.
    pub recovery: bool,
}

enum DocData {
    Full(Vec<u8>),
    Chunked(RwLock<ChunkedData>),
}

/// One document session: the byte store, the intern tables, the object
/// index and the object cache.
///
/// A document implements [`Resolve`], so dictionaries parsed out of it
/// transparently follow one level of indirection on access. All session
/// state is discarded wholesale when the document is dropped.
pub struct Document {
    data: DocData,
    atoms: AtomTable,
    index: ObjectIndex,
    cache: RefSetCache,
    // References whose resolution is currently on the stack; breaks
    // self-referential objects (e.g. a stream whose /Length points back at
    // the stream's own object).
    pending: RwLock<RefSet>,
    options: DocumentOptions,
    this: Weak<Document>,
}

impl Document {
    /// Create a session over fully resident bytes.
    pub fn from_bytes(data: Vec<u8>, index: ObjectIndex, options: DocumentOptions) -> Arc<Self> {
        Self::build(DocData::Full(data), index, options)
    }

    /// Create a session over a chunked byte store.
    pub fn from_chunked(
        data: ChunkedData,
        index: ObjectIndex,
        options: DocumentOptions,
    ) -> Arc<Self> {
        Self::build(DocData::Chunked(RwLock::new(data)), index, options)
    }

    fn build(data: DocData, index: ObjectIndex, options: DocumentOptions) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            data,
            atoms: AtomTable::new(),
            index,
            cache: RefSetCache::new(),
            pending: RwLock::new(RefSet::new()),
            options,
            this: this.clone(),
        })
    }

    /// The session's atom table.
    pub fn atoms(&self) -> &AtomTable {
        &self.atoms
    }

    /// The session's object cache.
    pub fn cache(&self) -> &RefSetCache {
        &self.cache
    }

    /// The number of resident chunks, or `None` for a fully resident
    /// document.
    pub fn resident_chunks(&self) -> Option<usize> {
        match &self.data {
            DocData::Full(_) => None,
            DocData::Chunked(lock) => Some(lock.read().unwrap().loaded_chunks()),
        }
    }

    /// Merge fetched bytes into a chunked store.
    pub fn write_range(&self, begin: u64, bytes: &[u8]) {
        match &self.data {
            DocData::Full(_) => warn!("ignoring range write to a fully resident document"),
            DocData::Chunked(lock) => lock.write().unwrap().write_range(begin, bytes),
        }
    }

    /// Drop all per-session caches (between independent parses of the same
    /// bytes).
    pub fn clear_caches(&self) {
        self.cache.clear();
        self.atoms.clear();
    }

    fn with_window<T>(&self, f: impl FnOnce(Window<'_>) -> Result<T>) -> Result<T> {
        match &self.data {
            DocData::Full(data) => f(Window::full(data)),
            DocData::Chunked(lock) => {
                let guard = lock.read().unwrap();

                f(Window::chunked(&guard))
            }
        }
    }

    /// Fetch the object a reference points at: [`Resolve::resolve`] without
    /// decryption suppression.
    pub fn object(&self, r: ObjRef) -> Result<Object> {
        self.resolve(r, false)
    }

    /// Follow a chain of references until a non-reference object turns up.
    ///
    /// Cycles terminate: each distinct reference is visited at most once,
    /// and a repeated visit resolves to null with a diagnostic.
    pub fn resolve_chain(&self, r: ObjRef) -> Result<Object> {
        let mut seen = RefSet::new();
        let mut cur = r;

        loop {
            if !seen.put(cur) {
                warn!("circular reference chain at {cur}");

                return Ok(Object::Null);
            }

            match self.resolve(cur, false)? {
                Object::Ref(next) => cur = next,
                obj => return Ok(obj),
            }
        }
    }

    /// Parse the object whose `N G obj` header starts at the given offset.
    pub fn parse_object_at(
        &self,
        offset: u64,
        suppress_decryption: bool,
    ) -> Result<(ObjRef, Object)> {
        self.with_window(|window| {
            let cursor = Cursor::new_at(window, offset as usize);
            let resolver: Weak<dyn Resolve> = self.this.clone();

            let ctx = ParseCtx {
                atoms: &self.atoms,
                resolver: Some(resolver),
                // The decryption transform keys off the object's own
                // identity, which the parser learns from the header.
                decrypt: None,
                known_commands: None,
                recovery: self.options.recovery,
                allow_streams: true,
                suppress_decryption,
            };

            let transform = if suppress_decryption {
                None
            } else {
                self.options.decryptor.as_deref()
            };

            Parser::new(cursor, ctx)?.parse_indirect_object_decrypted(transform)
        })
    }
}

impl Resolve for Document {
    fn resolve(&self, r: ObjRef, suppress_decryption: bool) -> Result<Object> {
        if !suppress_decryption && let Some(obj) = self.cache.get(r) {
            return Ok(obj);
        }

        let Some(offset) = self.index.get(r) else {
            warn!("reference {r} is not indexed, resolving to null");

            return Ok(Object::Null);
        };

        if !self.pending.write().unwrap().put(r) {
            warn!("circular resolution of {r}, resolving to null");

            return Ok(Object::Null);
        }

        let result = self.parse_object_at(offset, suppress_decryption);
        self.pending.write().unwrap().remove(r);
        let (id, obj) = result?;

        if id != r {
            warn!("object at {offset} identifies as {id}, expected {r}");
        }

        // Only a fully successful resolution is cached; an attempt cut
        // short by missing data leaves no partial state behind, so the
        // retried call is idempotent.
        if !suppress_decryption {
            self.cache.put(r, obj.clone());
        }

        Ok(obj)
    }
}

/// The manager that drives accessors over a partially loaded document.
pub struct ChunkedManager<S: RangeSource> {
    doc: Arc<Document>,
    source: S,
}

impl<S: RangeSource> ChunkedManager<S> {
    /// Create a manager for the given session and byte-range source.
    pub fn new(doc: Arc<Document>, source: S) -> Self {
        Self { doc, source }
    }

    /// The managed document.
    pub fn document(&self) -> &Arc<Document> {
        &self.doc
    }

    /// Run an accessor to completion.
    ///
    /// Each missing-data suspension fetches exactly the requested span and
    /// re-invokes the accessor from scratch; accessors must therefore be
    /// idempotent. Every cycle must strictly enlarge the resident window,
    /// which bounds the number of cycles for any finite document. Any error
    /// other than the missing-data signal propagates unmodified.
    pub fn ensure<T>(&mut self, f: impl Fn(&Document) -> Result<T>) -> Result<T> {
        loop {
            match f(&self.doc) {
                Err(Error::NeedsData { begin, end }) => {
                    let before = self.doc.resident_chunks().ok_or_else(|| {
                        Error::format("a fully resident document requested more data")
                    })?;

                    let bytes = self.source.fetch(begin, end)?;
                    self.doc.write_range(begin, &bytes);

                    let after = self.doc.resident_chunks().unwrap_or(before);

                    if after <= before {
                        return Err(Error::format(format!(
                            "fetching bytes {begin}..{end} did not enlarge the resident window"
                        )));
                    }
                }
                other => return other,
            }
        }
    }

    /// Fetch an object, retrying across missing-data suspensions.
    pub fn object(&mut self, r: ObjRef) -> Result<Object> {
        self.ensure(|doc| doc.object(r))
    }
}

/// The manager variant for documents whose bytes are already fully
/// resident.
///
/// The retry protocol collapses to direct invocation; the missing-data
/// signal cannot occur by construction.
pub struct LocalManager {
    doc: Arc<Document>,
}

impl LocalManager {
    /// Create a manager for the given fully resident session.
    pub fn new(doc: Arc<Document>) -> Self {
        Self { doc }
    }

    /// The managed document.
    pub fn document(&self) -> &Arc<Document> {
        &self.doc
    }

    /// Run an accessor. Plain invocation; nothing to retry.
    pub fn ensure<T>(&self, f: impl Fn(&Document) -> Result<T>) -> Result<T> {
        f(&self.doc)
    }

    /// Fetch an object.
    pub fn object(&self, r: ObjRef) -> Result<Object> {
        self.ensure(|doc| doc.object(r))
    }
}

#[cfg(test)]
mod tests {
    use crate::chunked::ChunkedData;
    use crate::manager::{
        ChunkedManager, Document, DocumentOptions, LocalManager, ObjectIndex, RangeSource,
    };
    use crate::object::{ObjRef, Object};
    use crate::Error;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// A range source over an in-memory byte vector that records every
    /// fetched span.
    struct MemorySource {
        data: Vec<u8>,
        fetched: Rc<RefCell<Vec<(u64, u64)>>>,
    }

    impl RangeSource for MemorySource {
        fn fetch(&mut self, begin: u64, end: u64) -> std::io::Result<Vec<u8>> {
            self.fetched.borrow_mut().push((begin, end));

            Ok(self.data[begin as usize..end as usize].to_vec())
        }
    }

    struct FailingSource;

    impl RangeSource for FailingSource {
        fn fetch(&mut self, _: u64, _: u64) -> std::io::Result<Vec<u8>> {
            Err(std::io::Error::other("connection lost"))
        }
    }

    /// A document with objects laid out at known offsets and an index over
    /// them.
    fn fixture() -> (Vec<u8>, ObjectIndex) {
        let mut data = vec![];
        let mut index = ObjectIndex::new();

        let objects: &[(u32, &[u8])] = &[
            (1, b"1 0 obj << /Kind /Root /Next 2 0 R /Count 3 0 R >> endobj\n"),
            (2, b"2 0 obj (payload) endobj\n"),
            (3, b"3 0 obj 42 endobj\n"),
            (4, b"4 0 obj 5 0 R endobj\n"),
            (5, b"5 0 obj 4 0 R endobj\n"),
        ];

        for (num, bytes) in objects {
            index.insert(ObjRef::new(*num, 0), data.len() as u64);
            data.extend_from_slice(bytes);
        }

        (data, index)
    }

    #[test]
    fn local_manager_resolves_through_dicts() {
        let (data, index) = fixture();
        let doc = Document::from_bytes(data, index, DocumentOptions::default());
        let manager = LocalManager::new(doc);

        let dict = manager
            .object(ObjRef::new(1, 0))
            .unwrap()
            .into_dict()
            .unwrap();

        // `get` walks exactly one level of indirection.
        assert_eq!(
            dict.get_string(b"Next").unwrap(),
            Some(b"payload".to_vec())
        );
        assert_eq!(dict.get_int(b"Count").unwrap(), Some(42));
        assert_eq!(dict.get(b"Absent").unwrap(), None);
    }

    #[test]
    fn unindexed_reference_resolves_to_null() {
        let (data, index) = fixture();
        let doc = Document::from_bytes(data, index, DocumentOptions::default());

        assert!(doc.object(ObjRef::new(99, 0)).unwrap().is_null());
    }

    #[test]
    fn cyclic_chain_terminates() {
        let (data, index) = fixture();
        let doc = Document::from_bytes(data, index, DocumentOptions::default());

        // 4 and 5 reference each other.
        assert!(doc.resolve_chain(ObjRef::new(4, 0)).unwrap().is_null());
        // A chain into a non-reference object succeeds.
        assert_eq!(
            doc.resolve_chain(ObjRef::new(3, 0)).unwrap(),
            Object::Number(42.0)
        );
    }

    #[test]
    fn chunked_manager_fetches_and_retries() {
        let (data, index) = fixture();
        let total = data.len();

        let fetched = Rc::new(RefCell::new(vec![]));
        let source = MemorySource {
            data: data.clone(),
            fetched: fetched.clone(),
        };

        let doc = Document::from_chunked(
            ChunkedData::new(total, 16),
            index,
            DocumentOptions::default(),
        );
        let mut manager = ChunkedManager::new(doc, source);

        // Nothing is resident yet; the manager fetches what each attempt
        // asks for until the access completes.
        let dict = manager
            .object(ObjRef::new(1, 0))
            .unwrap()
            .into_dict()
            .unwrap();
        assert!(!fetched.borrow().is_empty());

        // The result matches what a fully resident parse produces.
        let full_doc = Document::from_bytes(data, fixture().1, DocumentOptions::default());
        let full_dict = full_doc
            .object(ObjRef::new(1, 0))
            .unwrap()
            .into_dict()
            .unwrap();
        assert_eq!(dict, full_dict);
    }

    #[test]
    fn chunked_dict_get_suspends_and_retries() {
        let (data, index) = fixture();
        let total = data.len();

        let fetched = Rc::new(RefCell::new(vec![]));
        let source = MemorySource {
            data,
            fetched: fetched.clone(),
        };

        let doc = Document::from_chunked(
            ChunkedData::new(total, 16),
            index,
            DocumentOptions::default(),
        );
        let mut manager = ChunkedManager::new(doc, source);

        // A property access that has to resolve a reference into a
        // not-yet-loaded region suspends; driving it through the manager
        // completes it.
        let payload = manager
            .ensure(|doc| {
                let dict = doc.object(ObjRef::new(1, 0))?.into_dict().unwrap();

                dict.get_string(b"Next")
            })
            .unwrap();

        assert_eq!(payload, Some(b"payload".to_vec()));
    }

    #[test]
    fn satisfied_retry_matches_direct_access() {
        let (data, index) = fixture();
        let total = data.len();

        let doc = Document::from_chunked(
            ChunkedData::new(total, 16),
            index,
            DocumentOptions::default(),
        );

        // Each attempt raises the control signal with a concrete range;
        // supplying exactly that span lets the identical call get further,
        // until it completes.
        let mut cycles = 0;
        let first = loop {
            match doc.object(ObjRef::new(3, 0)) {
                Ok(obj) => break obj,
                Err(Error::NeedsData { begin, end }) => {
                    cycles += 1;
                    doc.write_range(begin, &data[begin as usize..end as usize]);
                }
                Err(e) => panic!("unexpected error: {e:?}"),
            }
        };

        assert!(cycles >= 1);
        assert_eq!(first, Object::Number(42.0));

        // Idempotence: re-invoking with the same resident window returns
        // the same result, with no double side effects.
        let second = doc.object(ObjRef::new(3, 0)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn io_errors_propagate_unretried() {
        let (data, index) = fixture();
        let doc = Document::from_chunked(
            ChunkedData::new(data.len(), 16),
            index,
            DocumentOptions::default(),
        );
        let mut manager = ChunkedManager::new(doc, FailingSource);

        assert!(matches!(
            manager.object(ObjRef::new(1, 0)),
            Err(Error::Io(_))
        ));
    }

    struct Reverser;

    impl crate::crypt::Decrypt for Reverser {
        fn decrypt(&self, _: ObjRef, data: &[u8]) -> Vec<u8> {
            data.iter().rev().copied().collect()
        }
    }

    #[test]
    fn decryption_applies_to_strings_only() {
        use crate::object::Resolve;

        let (data, index) = fixture();
        let options = DocumentOptions {
            decryptor: Some(Box::new(Reverser)),
            recovery: false,
        };
        let doc = Document::from_bytes(data, index, options);

        assert_eq!(
            doc.object(ObjRef::new(2, 0)).unwrap(),
            Object::String(b"daolyap".to_vec())
        );

        // Names pass through untouched.
        let dict = doc
            .object(ObjRef::new(1, 0))
            .unwrap()
            .into_dict()
            .unwrap();
        assert_eq!(dict.get_name(b"Kind").unwrap().unwrap().as_str(), "Root");

        // A suppressed resolution skips the transform.
        assert_eq!(
            doc.resolve(ObjRef::new(2, 0), true).unwrap(),
            Object::String(b"payload".to_vec())
        );
    }

    #[test]
    fn object_cache_returns_the_same_object() {
        let (data, index) = fixture();
        let doc = Document::from_bytes(data, index, DocumentOptions::default());

        let first = doc.object(ObjRef::new(2, 0)).unwrap();
        assert!(doc.cache().has(ObjRef::new(2, 0)));
        let second = doc.object(ObjRef::new(2, 0)).unwrap();

        assert_eq!(first, second);
    }
}

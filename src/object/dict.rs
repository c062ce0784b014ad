//! Dictionaries.

use crate::Result;
use crate::object::atom::Atom;
use crate::object::stream::Stream;
use crate::object::{Object, Resolve};
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, LazyLock, Weak};

pub(crate) type Entries = IndexMap<Atom, Object, FxBuildHasher>;

/// A dictionary: an insertion-ordered map from names to objects.
///
/// A dictionary parsed out of a document keeps a back-reference to the
/// resolver that produced it, so [`Dict::get`] transparently walks one level
/// of indirection. Detached dictionaries (no resolver, or a resolver that
/// has been dropped) return stored references as-is.
#[derive(Clone)]
pub struct Dict(Arc<Repr>);

struct Repr {
    entries: Entries,
    resolver: Option<Weak<dyn Resolve>>,
    suppress_decryption: bool,
}

static EMPTY: LazyLock<Dict> = LazyLock::new(|| {
    Dict(Arc::new(Repr {
        entries: Entries::default(),
        resolver: None,
        suppress_decryption: false,
    }))
});

impl Default for Dict {
    fn default() -> Self {
        Self::empty()
    }
}

// Structural equality over the entries; the attached resolver does not
// participate.
impl PartialEq for Dict {
    fn eq(&self, other: &Self) -> bool {
        self.0.entries == other.0.entries
    }
}

impl Dict {
    /// The shared empty dictionary.
    ///
    /// Used for objects that legitimately have no properties, without a heap
    /// allocation per use.
    pub fn empty() -> Self {
        EMPTY.clone()
    }

    pub(crate) fn from_entries(
        entries: Entries,
        resolver: Option<Weak<dyn Resolve>>,
        suppress_decryption: bool,
    ) -> Self {
        Self(Arc::new(Repr {
            entries,
            resolver,
            suppress_decryption,
        }))
    }

    /// Build a detached dictionary from key/value pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Atom, Object)>) -> Self {
        Self::from_entries(pairs.into_iter().collect(), None, false)
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.0.entries.len()
    }

    /// Whether the dictionary has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.entries.is_empty()
    }

    /// Whether the dictionary contains an entry with the given key.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.0.entries.contains_key(key)
    }

    /// Whether decryption is suppressed for objects resolved through this
    /// dictionary.
    pub fn suppress_decryption(&self) -> bool {
        self.0.suppress_decryption
    }

    /// The stored entry for a key, without resolving references.
    pub fn get_raw(&self, key: &[u8]) -> Option<&Object> {
        self.0.entries.get(key)
    }

    /// The entry for a key, walking one level of indirection.
    ///
    /// If the stored value is a reference and a resolver is attached, the
    /// resolver fetches the target; the target is returned as-is even if it
    /// is itself a further reference. A missing key is `Ok(None)`, never an
    /// error.
    pub fn get(&self, key: &[u8]) -> Result<Option<Object>> {
        let Some(obj) = self.0.entries.get(key) else {
            return Ok(None);
        };

        if let Object::Ref(r) = obj
            && let Some(resolver) = self.0.resolver.as_ref().and_then(Weak::upgrade)
        {
            return resolver.resolve(*r, self.0.suppress_decryption).map(Some);
        }

        Ok(Some(obj.clone()))
    }

    /// The entry for a key as a number.
    pub fn get_number(&self, key: &[u8]) -> Result<Option<f64>> {
        Ok(self.get(key)?.and_then(|o| o.as_f64()))
    }

    /// The entry for a key as an integer.
    pub fn get_int(&self, key: &[u8]) -> Result<Option<i64>> {
        Ok(self.get(key)?.and_then(|o| o.as_int()))
    }

    /// The entry for a key as a boolean.
    pub fn get_bool(&self, key: &[u8]) -> Result<Option<bool>> {
        Ok(self.get(key)?.and_then(|o| o.as_bool()))
    }

    /// The entry for a key as a name.
    pub fn get_name(&self, key: &[u8]) -> Result<Option<Atom>> {
        Ok(self.get(key)?.and_then(|o| o.as_name().cloned()))
    }

    /// The entry for a key as a string.
    pub fn get_string(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.get(key)?.and_then(Object::into_string))
    }

    /// The entry for a key as an array.
    pub fn get_array(&self, key: &[u8]) -> Result<Option<Vec<Object>>> {
        Ok(self.get(key)?.and_then(Object::into_array))
    }

    /// The entry for a key as a dictionary.
    pub fn get_dict(&self, key: &[u8]) -> Result<Option<Dict>> {
        Ok(self.get(key)?.and_then(Object::into_dict))
    }

    /// The entry for a key as a stream.
    pub fn get_stream(&self, key: &[u8]) -> Result<Option<Stream>> {
        Ok(self.get(key)?.and_then(Object::into_stream))
    }

    /// Resolve an object through this dictionary's resolver if it is a
    /// reference; any other object is returned unchanged.
    pub fn resolve_obj(&self, obj: &Object) -> Result<Object> {
        if let Object::Ref(r) = obj
            && let Some(resolver) = self.0.resolver.as_ref().and_then(Weak::upgrade)
        {
            return resolver.resolve(*r, self.0.suppress_decryption);
        }

        Ok(obj.clone())
    }

    /// An iterator over the keys, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &Atom> {
        self.0.entries.keys()
    }

    /// An iterator over the raw entries, in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&Atom, &Object)> {
        self.0.entries.iter()
    }
}

impl Debug for Dict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut debug_struct = f.debug_struct("Dict");

        for (key, val) in &self.0.entries {
            debug_struct.field(key.as_str(), val);
        }

        debug_struct.finish()
    }
}

/// The well-known dictionary keys used by the engine.
#[allow(missing_docs)]
pub mod keys {
    macro_rules! key {
        ($i:ident, $e:expr) => {
            pub const $i: &'static [u8] = $e;
        };
    }

    key!(ASCII_HEX_DECODE, b"ASCIIHexDecode");
    key!(ASCII_HEX_DECODE_ABBREVIATION, b"AHx");
    key!(ASCII85_DECODE, b"ASCII85Decode");
    key!(ASCII85_DECODE_ABBREVIATION, b"A85");
    key!(BITS_PER_COMPONENT, b"BitsPerComponent");
    key!(BLACK_IS_1, b"BlackIs1");
    key!(BPC, b"BPC");
    key!(CCITTFAX_DECODE, b"CCITTFaxDecode");
    key!(CCITTFAX_DECODE_ABBREVIATION, b"CCF");
    key!(COLOR_TRANSFORM, b"ColorTransform");
    key!(COLORS, b"Colors");
    key!(COLUMNS, b"Columns");
    key!(CS, b"CS");
    key!(D, b"D");
    key!(DCT_DECODE, b"DCTDecode");
    key!(DCT_DECODE_ABBREVIATION, b"DCT");
    key!(DECODE_PARMS, b"DecodeParms");
    key!(DP, b"DP");
    key!(EARLY_CHANGE, b"EarlyChange");
    key!(ENCODED_BYTE_ALIGN, b"EncodedByteAlign");
    key!(END_OF_BLOCK, b"EndOfBlock");
    key!(END_OF_LINE, b"EndOfLine");
    key!(F, b"F");
    key!(FILTER, b"Filter");
    key!(FLATE_DECODE, b"FlateDecode");
    key!(FLATE_DECODE_ABBREVIATION, b"Fl");
    key!(H, b"H");
    key!(HEIGHT, b"Height");
    key!(IM, b"IM");
    key!(IMAGE_MASK, b"ImageMask");
    key!(JPX_DECODE, b"JPXDecode");
    key!(K, b"K");
    key!(LENGTH, b"Length");
    key!(LZW_DECODE, b"LZWDecode");
    key!(LZW_DECODE_ABBREVIATION, b"LZW");
    key!(PREDICTOR, b"Predictor");
    key!(ROWS, b"Rows");
    key!(RUN_LENGTH_DECODE, b"RunLengthDecode");
    key!(RUN_LENGTH_DECODE_ABBREVIATION, b"RL");
    key!(SUBTYPE, b"Subtype");
    key!(TYPE, b"Type");
    key!(W, b"W");
    key!(WIDTH, b"Width");
}

#[cfg(test)]
mod tests {
    use crate::object::atom::Atom;
    use crate::object::dict::Dict;
    use crate::object::{ObjRef, Object};

    #[test]
    fn empty_dict_is_shared() {
        let a = Dict::empty();
        let b = Dict::empty();

        assert_eq!(a.len(), 0);
        assert_eq!(a, b);
    }

    #[test]
    fn absent_key_is_none_not_an_error() {
        let dict = Dict::from_pairs([(Atom::new(b"Hi"), Object::Number(34.0))]);

        assert_eq!(dict.get(b"Missing").unwrap(), None);
        assert_eq!(dict.get_number(b"Hi").unwrap(), Some(34.0));
    }

    #[test]
    fn detached_dict_returns_refs_raw() {
        let r = ObjRef::new(7, 0);
        let dict = Dict::from_pairs([(Atom::new(b"Next"), Object::Ref(r))]);

        // No resolver attached, so the reference comes back unresolved.
        assert_eq!(dict.get(b"Next").unwrap(), Some(Object::Ref(r)));
    }

    #[test]
    fn insertion_order_is_preserved() {
        let dict = Dict::from_pairs([
            (Atom::new(b"B"), Object::Number(2.0)),
            (Atom::new(b"A"), Object::Number(1.0)),
        ]);

        let keys: Vec<_> = dict.keys().map(|k| k.as_str().to_string()).collect();
        assert_eq!(keys, ["B", "A"]);
    }
}

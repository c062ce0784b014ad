//! The object model.

use log::debug;

pub mod atom;
pub mod dict;
pub mod r#ref;
pub mod stream;

pub use atom::{Atom, AtomTable};
pub use dict::Dict;
pub use r#ref::{ObjRef, RefSet, RefSetCache};
pub use stream::Stream;

/// A primitive PDF object.
///
/// Arrays and dictionaries may contain [`Object::Ref`] entries that are not
/// resolved until read; see [`Dict::get`].
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// The null object.
    Null,
    /// A boolean object.
    Boolean(bool),
    /// A number object.
    Number(f64),
    /// A string object (decoded bytes).
    String(Vec<u8>),
    /// A name object.
    Name(Atom),
    /// A bare keyword operator, distinguished from a name.
    Command(Atom),
    /// An array object.
    Array(Vec<Object>),
    /// A dictionary object.
    Dict(Dict),
    /// An indirect reference.
    Ref(ObjRef),
    /// A stream object.
    Stream(Stream),
}

impl Object {
    /// Whether this is the null object.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The boolean value, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// The numeric value, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The numeric value truncated to an integer, if this is a number.
    pub fn as_int(&self) -> Option<i64> {
        let n = self.as_f64()?;
        let res = n as i64;

        if n.trunc() != n {
            debug!("number {n} was truncated to {res}");
        }

        Some(res)
    }

    /// The atom, if this is a name.
    pub fn as_name(&self) -> Option<&Atom> {
        match self {
            Self::Name(n) => Some(n),
            _ => None,
        }
    }

    /// The reference, if this is an indirect reference.
    pub fn as_ref_id(&self) -> Option<ObjRef> {
        match self {
            Self::Ref(r) => Some(*r),
            _ => None,
        }
    }

    /// The string bytes, if this is a string.
    pub fn into_string(self) -> Option<Vec<u8>> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The elements, if this is an array.
    pub fn into_array(self) -> Option<Vec<Object>> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// The dictionary, if this is a dictionary.
    pub fn into_dict(self) -> Option<Dict> {
        match self {
            Self::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// The stream, if this is a stream.
    pub fn into_stream(self) -> Option<Stream> {
        match self {
            Self::Stream(s) => Some(s),
            _ => None,
        }
    }

    /// The atom, if this is a bare keyword.
    pub fn into_command(self) -> Option<Atom> {
        match self {
            Self::Command(c) => Some(c),
            _ => None,
        }
    }
}

/// The resolver abstraction that turns a reference into an object.
///
/// Resolution may require bytes that are not loaded yet, in which case it
/// fails with [`crate::Error::NeedsData`]; the resolution manager consumes
/// that signal and retries.
pub trait Resolve: Send + Sync {
    /// Fetch the object a reference points at.
    ///
    /// This walks exactly one level of indirection; if the target is itself
    /// a reference, it is returned as-is. `suppress_decryption` disables the
    /// string/stream decryption transform for the fetched object.
    fn resolve(&self, r: ObjRef, suppress_decryption: bool) -> crate::Result<Object>;
}

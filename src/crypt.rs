//! The decryption boundary.

use crate::object::ObjRef;

/// A decryption transform supplied by the host.
///
/// The transform is applied to literal/hex string bytes and to stream
/// payload bytes (before the decode-stream pipeline runs), never to keys,
/// names or numbers. The identifier of the enclosing indirect object is
/// passed along because the format derives per-object key material from it.
pub trait Decrypt: Send + Sync {
    /// Decrypt the given bytes.
    fn decrypt(&self, id: ObjRef, data: &[u8]) -> Vec<u8>;
}

/// The decryption context a parser carries: the transform plus the identity
/// of the object being parsed.
#[derive(Clone, Copy)]
pub struct DecryptCtx<'a> {
    /// The transform.
    pub transform: &'a dyn Decrypt,
    /// The indirect object the parsed bytes belong to.
    pub id: ObjRef,
}

impl DecryptCtx<'_> {
    pub(crate) fn apply(&self, data: &[u8]) -> Vec<u8> {
        self.transform.decrypt(self.id, data)
    }
}

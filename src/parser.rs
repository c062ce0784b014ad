//! The object parser.

use crate::crypt::DecryptCtx;
use crate::lexer::{Lexer, Token};
use crate::object::atom::{Atom, AtomTable};
use crate::object::dict::keys::{F, FILTER, LENGTH};
use crate::object::dict::Entries;
use crate::object::{Dict, ObjRef, Object, Resolve, Stream};
use crate::reader::{Cursor, Window};
use crate::trivia::{is_eol_character, is_white_space_character};
use crate::{Error, Result};
use log::warn;
use memchr::memmem;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Weak;

/// Inline images below this payload size are memoized by checksum.
const MAX_IMAGE_CACHE_LENGTH: usize = 1000;

/// Inline image dictionaries above this entry count are never memoized.
const MAX_IMAGE_CACHE_ENTRIES: usize = 8;

/// How many bytes after a candidate `EI` are inspected for binary content.
const EI_CONTEXT: usize = 10;

/// Everything a parse needs besides the bytes themselves.
pub struct ParseCtx<'a> {
    /// The atom table of the session.
    pub atoms: &'a AtomTable,
    /// The resolver handed to parsed dictionaries, if any.
    pub resolver: Option<Weak<dyn Resolve>>,
    /// The decryption transform for strings and stream payloads, if any.
    pub decrypt: Option<DecryptCtx<'a>>,
    /// Keywords that may legitimately follow an inline image; used to
    /// disambiguate `EI` bytes inside image payloads.
    pub known_commands: Option<&'a FxHashSet<Atom>>,
    /// Tolerate unterminated structures by returning partial results.
    pub recovery: bool,
    /// Whether a dictionary followed by the `stream` keyword is promoted to
    /// a stream.
    pub allow_streams: bool,
    /// Whether dictionaries built by this parse suppress decryption for the
    /// objects they resolve.
    pub suppress_decryption: bool,
}

impl<'a> ParseCtx<'a> {
    /// A minimal context: no resolver, no decryption, strict parsing.
    pub fn new(atoms: &'a AtomTable) -> Self {
        Self {
            atoms,
            resolver: None,
            decrypt: None,
            known_commands: None,
            recovery: false,
            allow_streams: true,
            suppress_decryption: false,
        }
    }
}

/// Consumes tokens two ahead and assembles objects.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    ctx: ParseCtx<'a>,
    buf1: Token,
    buf2: Token,
    image_cache: FxHashMap<(u32, u32), Object>,
}

impl<'a> Parser<'a> {
    /// Create a parser over the given cursor.
    pub fn new(cursor: Cursor<'a>, ctx: ParseCtx<'a>) -> Result<Self> {
        let mut lexer = Lexer::new(cursor, ctx.atoms);
        let buf1 = lexer.next_token()?;
        let buf2 = lexer.next_token()?;

        Ok(Self {
            lexer,
            ctx,
            buf1,
            buf2,
            image_cache: FxHashMap::default(),
        })
    }

    /// Consume and return the current token, refilling the lookahead.
    ///
    /// When the second lookahead slot holds the `ID` keyword, the lexer must
    /// not run past it: the bytes that follow are raw image data, not
    /// tokens. The slot is left empty and refilled after the image data has
    /// been skipped.
    fn shift(&mut self) -> Result<Token> {
        let next = if self.buf2.is_keyword(b"ID") {
            Token::Eof
        } else {
            self.lexer.next_token()?
        };

        let b2 = std::mem::replace(&mut self.buf2, next);

        Ok(std::mem::replace(&mut self.buf1, b2))
    }

    /// Refill both lookahead slots from the lexer's current position.
    fn refill(&mut self) -> Result<()> {
        self.buf1 = self.lexer.next_token()?;
        self.buf2 = self.lexer.next_token()?;

        Ok(())
    }

    /// Parse the next object.
    pub fn get_object(&mut self) -> Result<Object> {
        match self.shift()? {
            Token::Eof => {
                if self.ctx.recovery {
                    warn!("unexpected end of input, returning null");

                    Ok(Object::Null)
                } else {
                    Err(Error::format("unexpected end of input"))
                }
            }
            Token::Number(num) => {
                // Two integers followed by the keyword `R` collapse into an
                // indirect reference.
                if is_ref_component(num)
                    && matches!(&self.buf1, Token::Number(r#gen) if is_ref_component(*r#gen))
                    && self.buf2.is_keyword(b"R")
                {
                    let Token::Number(r#gen) = self.shift()? else {
                        unreachable!()
                    };
                    self.shift()?;

                    return Ok(Object::Ref(ObjRef::new(num as u32, r#gen as u32)));
                }

                Ok(Object::Number(num))
            }
            Token::String(s) => {
                let s = match &self.ctx.decrypt {
                    Some(dc) => dc.apply(&s),
                    None => s,
                };

                Ok(Object::String(s))
            }
            Token::Name(n) => Ok(Object::Name(n)),
            Token::Boolean(b) => Ok(Object::Boolean(b)),
            Token::Null => Ok(Object::Null),
            Token::ArrayOpen => self.array(),
            Token::DictOpen => self.dict(),
            // Stray closers read as bare operators, like any other keyword
            // the parser has no structure for.
            Token::ArrayClose => Ok(Object::Command(self.ctx.atoms.intern(b"]"))),
            Token::DictClose => Ok(Object::Command(self.ctx.atoms.intern(b">>"))),
            Token::BraceOpen => Ok(Object::Command(self.ctx.atoms.intern(b"{"))),
            Token::BraceClose => Ok(Object::Command(self.ctx.atoms.intern(b"}"))),
            Token::Keyword(k) => {
                if k.as_ref() == b"BI" {
                    self.make_inline_image()
                } else {
                    Ok(Object::Command(k))
                }
            }
        }
    }

    /// Parse `N G obj <object> endobj` at the cursor position.
    pub fn parse_indirect_object(&mut self) -> Result<(ObjRef, Object)> {
        let id = self.read_indirect_header()?;

        self.finish_indirect_object(id)
    }

    /// Like [`Parser::parse_indirect_object`], but arming the decryption
    /// transform with the object's own identity once the header is known.
    pub fn parse_indirect_object_decrypted(
        &mut self,
        transform: Option<&'a dyn crate::crypt::Decrypt>,
    ) -> Result<(ObjRef, Object)> {
        let id = self.read_indirect_header()?;

        if let Some(transform) = transform {
            self.ctx.decrypt = Some(DecryptCtx { transform, id });
        }

        self.finish_indirect_object(id)
    }

    fn read_indirect_header(&mut self) -> Result<ObjRef> {
        let num = match self.shift()? {
            Token::Number(n) if is_ref_component(n) => n as u32,
            _ => return Err(Error::format("expected an object number")),
        };
        let r#gen = match self.shift()? {
            Token::Number(n) if is_ref_component(n) => n as u32,
            _ => return Err(Error::format("expected a generation number")),
        };

        if !self.shift()?.is_keyword(b"obj") {
            return Err(Error::format("expected the obj keyword"));
        }

        Ok(ObjRef::new(num, r#gen))
    }

    fn finish_indirect_object(&mut self, id: ObjRef) -> Result<(ObjRef, Object)> {
        let obj = self.get_object()?;

        if self.buf1.is_keyword(b"endobj") {
            self.shift()?;
        } else {
            warn!("indirect object is not terminated by endobj");
        }

        Ok((id, obj))
    }

    fn array(&mut self) -> Result<Object> {
        let mut arr = vec![];

        loop {
            match &self.buf1 {
                Token::ArrayClose => {
                    self.shift()?;
                    break;
                }
                Token::Eof => {
                    if self.ctx.recovery {
                        warn!("unterminated array, returning the partial array");
                        break;
                    }

                    return Err(Error::format("end of input inside an array"));
                }
                _ => arr.push(self.get_object()?),
            }
        }

        Ok(Object::Array(arr))
    }

    fn dict(&mut self) -> Result<Object> {
        let mut entries = Entries::default();

        loop {
            match &self.buf1 {
                Token::DictClose => break,
                Token::Eof => {
                    if self.ctx.recovery {
                        warn!("unterminated dictionary, returning the partial dictionary");
                        break;
                    }

                    return Err(Error::format("end of input inside a dictionary"));
                }
                Token::Name(_) => {
                    let Token::Name(key) = self.shift()? else {
                        unreachable!()
                    };
                    let value = self.get_object()?;
                    entries.insert(key, value);
                }
                // In case there is garbage in-between, be lenient and just
                // skip it while scanning for the next name key.
                _ => {
                    warn!("skipping malformed dictionary entry");
                    self.shift()?;
                }
            }
        }

        let dict = Dict::from_entries(
            entries,
            self.ctx.resolver.clone(),
            self.ctx.suppress_decryption,
        );

        if matches!(self.buf1, Token::DictClose) {
            // The dictionary is promoted to a stream when the keyword after
            // `>>` says so; the lexer then sits right behind that keyword.
            if self.ctx.allow_streams && self.buf2.is_keyword(b"stream") {
                return self.make_stream(dict);
            }

            self.shift()?;
        }

        Ok(Object::Dict(dict))
    }

    fn make_stream(&mut self, dict: Dict) -> Result<Object> {
        let (data_start, window) = {
            let cursor = self.lexer.cursor_mut();
            cursor.skip_single_eol()?;

            (cursor.offset(), cursor.window())
        };

        // The declared length may be wrong in incrementally-updated or
        // hand-edited files; it only counts when the `endstream` keyword
        // actually shows up where it points.
        let declared = dict.get_int(LENGTH)?;
        let mut span = None;

        match declared {
            Some(length) if length >= 0 => {
                let end = data_start + length as usize;
                let mut probe = Cursor::new_at(window, end);

                if check_endstream(&mut probe)? {
                    span = Some((end, probe.offset()));
                } else {
                    warn!("stream has a wrong /Length, scanning for endstream");
                }
            }
            _ => warn!("stream has no valid /Length, scanning for endstream"),
        }

        let (data_end, resume) = match span {
            Some(span) => span,
            None => scan_for_endstream(window, data_start)?,
        };

        let mut raw = window.slice(data_start..data_end)?.to_vec();

        if let Some(dc) = &self.ctx.decrypt {
            raw = dc.apply(&raw);
        }

        self.lexer.cursor_mut().jump(resume);
        self.refill()?;

        Ok(Object::Stream(Stream::new(dict, raw)))
    }

    fn make_inline_image(&mut self) -> Result<Object> {
        let bi_pos = self.lexer.take_begin_inline_pos();

        let mut entries = Entries::default();

        loop {
            match &self.buf1 {
                Token::Keyword(k) if k.as_ref() == b"ID" => break,
                Token::Eof => return Err(Error::format("end of input inside an inline image")),
                Token::Name(_) => {
                    let Token::Name(key) = self.shift()? else {
                        unreachable!()
                    };
                    let value = self.get_object()?;
                    entries.insert(key, value);
                }
                _ => {
                    warn!("skipping malformed inline image entry");
                    self.shift()?;
                }
            }
        }

        // Inline image dictionaries cannot contain references.
        let dict = Dict::from_entries(entries, None, self.ctx.suppress_decryption);

        // The lookahead special-case parked the lexer right after `ID`; the
        // image data begins after a single whitespace byte.
        let (data_start, window) = {
            let cursor = self.lexer.cursor_mut();
            cursor.eat(is_white_space_character)?;

            (cursor.offset(), cursor.window())
        };

        let filter = inline_filter_name(&dict)?;

        let specific = match filter.as_ref().map(|a| a.as_ref() as &[u8]) {
            Some(b"DCTDecode" | b"DCT") => scan_dct_end(window, data_start)?,
            Some(b"ASCII85Decode" | b"A85") => scan_ascii85_end(window, data_start)?,
            Some(b"ASCIIHexDecode" | b"AHx") => scan_ascii_hex_end(window, data_start)?,
            _ => None,
        };

        let (data_end, resume) = match specific {
            Some(end) => {
                let mut probe = Cursor::new_at(window, end);
                probe.skip_white_spaces()?;

                if !probe.forward_tag(b"EI")? {
                    warn!("inline image data is not followed by EI");
                }

                (end, probe.offset())
            }
            None => scan_default_inline_end(
                window,
                data_start,
                self.ctx.known_commands,
                self.ctx.atoms,
            )?,
        };

        let raw = window.slice(data_start..data_end)?.to_vec();

        self.lexer.cursor_mut().jump(resume);
        self.refill()?;

        // A document repeating the same tiny inline image thousands of
        // times decodes it once.
        let cache_key = match bi_pos {
            Some(bi_pos)
                if raw.len() < MAX_IMAGE_CACHE_LENGTH
                    && dict.len() <= MAX_IMAGE_CACHE_ENTRIES =>
            {
                let dict_bytes = window.slice(bi_pos..data_start)?;

                Some((adler32(dict_bytes), adler32(&raw)))
            }
            _ => None,
        };

        if let Some(key) = cache_key {
            if let Some(cached) = self.image_cache.get(&key) {
                return Ok(cached.clone());
            }

            let obj = Object::Stream(Stream::new(dict, raw));
            self.image_cache.insert(key, obj.clone());

            return Ok(obj);
        }

        Ok(Object::Stream(Stream::new(dict, raw)))
    }
}

fn is_ref_component(n: f64) -> bool {
    n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64
}

fn check_endstream(probe: &mut Cursor<'_>) -> Result<bool> {
    probe.skip_white_spaces()?;

    probe.forward_tag(b"endstream")
}

/// Locate the stream terminator by signature when the declared length did
/// not pan out.
///
/// The full 9-byte signature is tried first; failing that, a truncated
/// `endstrea` followed by whitespace recovers files whose trailing `m` was
/// lost. A terminator found by scanning is preceded by an end-of-line marker
/// that does not belong to the data, so one is trimmed.
fn scan_for_endstream(window: Window<'_>, data_start: usize) -> Result<(usize, usize)> {
    const SIGNATURE: &[u8] = b"endstream";
    const TRUNCATED: &[u8] = b"endstrea";

    let tail = window.slice(data_start..window.len())?;

    if let Some(pos) = memmem::find(tail, SIGNATURE) {
        return Ok((
            data_start + trim_single_eol(tail, pos),
            data_start + pos + SIGNATURE.len(),
        ));
    }

    if let Some(pos) = memmem::find(tail, TRUNCATED) {
        let after = tail.get(pos + TRUNCATED.len()).copied();

        if after.is_none() || after.is_some_and(is_white_space_character) {
            warn!("stream is terminated by a truncated endstream keyword");

            return Ok((
                data_start + trim_single_eol(tail, pos),
                data_start + pos + TRUNCATED.len(),
            ));
        }
    }

    Err(Error::format("stream terminator not found"))
}

fn trim_single_eol(data: &[u8], end: usize) -> usize {
    if end >= 2 && &data[end - 2..end] == b"\r\n" {
        end - 2
    } else if end >= 1 && is_eol_character(data[end - 1]) {
        end - 1
    } else {
        end
    }
}

/// The first declared filter of an inline image, which decides how the end
/// of the image data is located.
fn inline_filter_name(dict: &Dict) -> Result<Option<Atom>> {
    let entry = match dict.get(F)? {
        Some(e) => Some(e),
        None => dict.get(FILTER)?,
    };

    Ok(match entry {
        Some(Object::Name(n)) => Some(n),
        Some(Object::Array(a)) => a.first().and_then(|o| o.as_name().cloned()),
        _ => None,
    })
}

/// Scan for a whitespace run followed by `EI` where the surroundings look
/// like plausible content-stream text rather than image payload.
///
/// This is a best-effort heuristic: arbitrary binary filters can embed the
/// terminator bytes, so candidates are vetted by inspecting the bytes that
/// follow and, when a keyword table is available, by requiring the next
/// token to be a known keyword.
fn scan_default_inline_end(
    window: Window<'_>,
    start: usize,
    known: Option<&FxHashSet<Atom>>,
    atoms: &AtomTable,
) -> Result<(usize, usize)> {
    let mut cursor = Cursor::new_at(window, start);
    let mut prev_ws = false;

    loop {
        let Some(b) = cursor.read_byte()? else {
            warn!("inline image data runs to the end of the input");

            return Ok((cursor.offset(), cursor.offset()));
        };

        if is_white_space_character(b) {
            prev_ws = true;
            continue;
        }

        if prev_ws && b == b'E' && cursor.peek_byte()? == Some(b'I') {
            let e_pos = cursor.offset() - 1;
            cursor.forward();
            let ei_end = cursor.offset();

            if ei_candidate_accepted(window, ei_end, known, atoms)? {
                return Ok((trim_trailing_ws(window, start, e_pos)?, ei_end));
            }
        }

        prev_ws = false;
    }
}

fn ei_candidate_accepted(
    window: Window<'_>,
    ei_end: usize,
    known: Option<&FxHashSet<Atom>>,
    atoms: &AtomTable,
) -> Result<bool> {
    let probe = Cursor::new_at(window, ei_end);

    match probe.peek_byte()? {
        // The image ends the input.
        None => return Ok(true),
        Some(b) if !is_white_space_character(b) => return Ok(false),
        _ => {}
    }

    // Shortly after a genuine terminator everything is text: printable
    // ASCII, whitespace, or NUL runs. Anything else means the `EI` was part
    // of the payload.
    let context_end = (ei_end + EI_CONTEXT).min(window.len());

    for &b in window.slice(ei_end..context_end)? {
        if b != 0 && !is_white_space_character(b) && !(0x20..0x7F).contains(&b) {
            return Ok(false);
        }
    }

    let Some(known) = known else {
        return Ok(true);
    };

    let mut lexer = Lexer::new(probe, atoms);

    match lexer.next_token() {
        Ok(Token::Eof) => Ok(true),
        Ok(Token::Keyword(k)) => Ok(known.contains(&k)),
        Ok(_) => Ok(false),
        Err(Error::Format(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

fn trim_trailing_ws(window: Window<'_>, start: usize, end: usize) -> Result<usize> {
    let mut end = end;

    while end > start {
        if is_white_space_character(window.slice(end - 1..end)?[0]) {
            end -= 1;
        } else {
            break;
        }
    }

    Ok(end)
}

/// Walk JPEG marker segments until the end-of-image marker.
fn scan_dct_end(window: Window<'_>, start: usize) -> Result<Option<usize>> {
    let mut cursor = Cursor::new_at(window, start);

    loop {
        let Some(b) = cursor.read_byte()? else {
            return Ok(None);
        };

        if b != 0xFF {
            continue;
        }

        let Some(marker) = cursor.read_byte()? else {
            return Ok(None);
        };

        match marker {
            // End of image.
            0xD9 => return Ok(Some(cursor.offset())),
            // Byte stuffing, fill bytes, and standalone markers.
            0x00 | 0xFF | 0x01 | 0xD0..=0xD8 => {}
            _ => {
                // Marker segments declare a big-endian length that includes
                // the length field itself.
                let Some(bytes) = cursor.peek_bytes(2)? else {
                    return Ok(None);
                };
                let len = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;

                if len < 2 {
                    return Ok(None);
                }

                cursor.jump(cursor.offset() + len);
            }
        }
    }
}

/// Scan for the `~>` terminator, tolerating whitespace between the two
/// characters.
fn scan_ascii85_end(window: Window<'_>, start: usize) -> Result<Option<usize>> {
    let mut cursor = Cursor::new_at(window, start);

    loop {
        let Some(b) = cursor.read_byte()? else {
            return Ok(None);
        };

        if b == b'~' {
            cursor.skip_white_spaces()?;

            if cursor.forward_tag(b">")? {
                return Ok(Some(cursor.offset()));
            }
        }
    }
}

/// Scan for the bare `>` terminator.
fn scan_ascii_hex_end(window: Window<'_>, start: usize) -> Result<Option<usize>> {
    let mut cursor = Cursor::new_at(window, start);

    loop {
        match cursor.read_byte()? {
            None => return Ok(None),
            Some(b'>') => return Ok(Some(cursor.offset())),
            Some(_) => {}
        }
    }
}

fn adler32(data: &[u8]) -> u32 {
    const MOD: u32 = 65521;

    let mut a: u32 = 1;
    let mut b: u32 = 0;

    for &byte in data {
        a = (a + byte as u32) % MOD;
        b = (b + a) % MOD;
    }

    b << 16 | a
}

#[cfg(test)]
mod tests {
    use crate::Error;
    use crate::object::atom::{Atom, AtomTable};
    use crate::object::{ObjRef, Object};
    use crate::parser::{ParseCtx, Parser};
    use crate::reader::{Cursor, Window};
    use rustc_hash::FxHashSet;

    fn parse(data: &[u8]) -> crate::Result<Object> {
        let atoms = AtomTable::new();
        let ctx = ParseCtx::new(&atoms);
        let mut parser = Parser::new(Cursor::new(Window::full(data)), ctx)?;

        parser.get_object()
    }

    #[test]
    fn primitives() {
        assert!(matches!(parse(b"null").unwrap(), Object::Null));
        assert!(matches!(parse(b"true").unwrap(), Object::Boolean(true)));
        assert!(matches!(parse(b"34.5").unwrap(), Object::Number(_)));
        assert!(matches!(parse(b"(Hi)").unwrap(), Object::String(_)));
        assert!(matches!(parse(b"<3400>").unwrap(), Object::String(_)));
        assert!(matches!(parse(b"/Name").unwrap(), Object::Name(_)));
        assert!(matches!(parse(b"[45]").unwrap(), Object::Array(_)));
        assert!(matches!(parse(b"<</Entry 45>>").unwrap(), Object::Dict(_)));
        assert!(matches!(parse(b"Do").unwrap(), Object::Command(_)));
    }

    #[test]
    fn indirect_reference_collapses() {
        assert_eq!(
            parse(b"34 1 R").unwrap(),
            Object::Ref(ObjRef::new(34, 1))
        );
    }

    #[test]
    fn two_integers_stay_numbers() {
        let obj = parse(b"[256 257]").unwrap();

        assert_eq!(
            obj,
            Object::Array(vec![Object::Number(256.0), Object::Number(257.0)])
        );
    }

    #[test]
    fn nested_dictionary() {
        let data = b"<< /Type /Example
/Subtype /DictionaryExample
/Version 0.01
/IntegerItem 12
/StringItem ( a string )
/Subdictionary << /Item1 0.4
                /Item2 true
                /LastItem ( not ! )
                >>
>>";
        let dict = parse(data).unwrap().into_dict().unwrap();

        assert_eq!(dict.len(), 6);
        assert!(dict.get_name(b"Type").unwrap().is_some());
        assert_eq!(dict.get_int(b"IntegerItem").unwrap(), Some(12));

        let sub = dict.get_dict(b"Subdictionary").unwrap().unwrap();
        assert_eq!(sub.len(), 3);
        assert_eq!(sub.get_bool(b"Item2").unwrap(), Some(true));
    }

    #[test]
    fn garbage_in_between_dict_entries() {
        let data = b"<<
/ProcSet [ /PDF /Text ]
/Font << /F4 31 0 R /F6 23 0 R >>
/ExtGState << /GS2 14 0 R
2000
 /GS3 15 0 R >>
>> ";
        let dict = parse(data).unwrap().into_dict().unwrap();

        assert!(dict.contains_key(b"ProcSet"));
        assert!(dict.contains_key(b"Font"));

        let gs = dict.get_dict(b"ExtGState").unwrap().unwrap();
        assert_eq!(gs.get_raw(b"GS2"), Some(&Object::Ref(ObjRef::new(14, 0))));
        assert_eq!(gs.get_raw(b"GS3"), Some(&Object::Ref(ObjRef::new(15, 0))));
    }

    #[test]
    fn unterminated_array_fails_without_recovery() {
        assert!(matches!(parse(b"[1 2 3"), Err(Error::Format(_))));
    }

    #[test]
    fn unterminated_array_in_recovery_mode() {
        let atoms = AtomTable::new();
        let mut ctx = ParseCtx::new(&atoms);
        ctx.recovery = true;
        let mut parser = Parser::new(Cursor::new(Window::full(b"[1 2 3")), ctx).unwrap();

        let arr = parser.get_object().unwrap().into_array().unwrap();
        assert_eq!(arr.len(), 3);
    }

    #[test]
    fn stream_with_correct_length() {
        let obj = parse(b"<< /Length 10 >> stream\nabcdefghij\nendstream").unwrap();
        let stream = obj.into_stream().unwrap();

        assert_eq!(stream.raw_data(), b"abcdefghij");
    }

    #[test]
    fn stream_with_short_length_recovers() {
        // The declared length is 3 bytes short of the truth.
        let obj = parse(b"<< /Length 7 >> stream\nabcdefghij\nendstream").unwrap();
        let stream = obj.into_stream().unwrap();

        assert_eq!(stream.raw_data(), b"abcdefghij");
    }

    #[test]
    fn stream_with_truncated_endstream() {
        let obj = parse(b"<< /Length 99 >> stream\nabcdefghij\nendstrea\n").unwrap();
        let stream = obj.into_stream().unwrap();

        assert_eq!(stream.raw_data(), b"abcdefghij");
    }

    #[test]
    fn stream_without_terminator_is_fatal() {
        assert!(matches!(
            parse(b"<< /Length 99 >> stream\nabcdefghij"),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn flate_stream_scenario() {
        use std::io::Write;

        let plain = b"hello";
        let mut enc = flate2::write::ZlibEncoder::new(vec![], flate2::Compression::default());
        enc.write_all(plain).unwrap();
        let compressed = enc.finish().unwrap();

        let mut data = format!("<< /Length {} /Filter /FlateDecode >> stream\n", compressed.len())
            .into_bytes();
        data.extend_from_slice(&compressed);
        data.extend_from_slice(b"\nendstream");

        let stream = parse(&data).unwrap().into_stream().unwrap();
        assert_eq!(stream.decoded().unwrap(), plain);
    }

    fn known_commands(cmds: &[&[u8]]) -> FxHashSet<Atom> {
        cmds.iter().map(|c| Atom::new(c)).collect()
    }

    fn parse_with_known(data: &[u8], known: &FxHashSet<Atom>) -> Object {
        let atoms = AtomTable::new();
        let mut ctx = ParseCtx::new(&atoms);
        ctx.known_commands = Some(known);
        let mut parser = Parser::new(Cursor::new(Window::full(data)), ctx).unwrap();

        parser.get_object().unwrap()
    }

    #[test]
    fn inline_image_simple() {
        let known = known_commands(&[b"Q", b"Do"]);
        let data = b"BI /W 2 /H 2 /BPC 8 /CS /G ID \x01\x02\x03\x04 EI Q";

        let stream = parse_with_known(data, &known).into_stream().unwrap();
        assert_eq!(stream.raw_data(), b"\x01\x02\x03\x04");
        assert_eq!(stream.dict().get_int(b"W").unwrap(), Some(2));
    }

    #[test]
    fn inline_image_embedded_ei_is_not_a_terminator() {
        let known = known_commands(&[b"Q"]);
        // The payload contains " EI " followed by a number, which is not a
        // known keyword; the scanner must not stop there.
        let data = b"BI /W 2 /H 2 ID \x01\x02 EI 5\xfe\x01\x04 EI Q";

        let stream = parse_with_known(data, &known).into_stream().unwrap();
        assert_eq!(stream.raw_data(), b"\x01\x02 EI 5\xfe\x01\x04");
    }

    #[test]
    fn inline_image_binary_after_candidate_is_rejected() {
        let known = known_commands(&[b"Q"]);
        // The first "EI" is followed by binary bytes, the second by a known
        // keyword.
        let data = b"BI /W 1 ID \x01 EI \x90\x91\x92\x93 EI Q";

        let stream = parse_with_known(data, &known).into_stream().unwrap();
        assert_eq!(stream.raw_data(), b"\x01 EI \x90\x91\x92\x93");
    }

    #[test]
    fn inline_image_dct_marker_walk() {
        let known = known_commands(&[b"Q"]);
        // SOI, an APP0 segment of declared length 4, entropy-ish bytes that
        // contain no EOI, then EOI.
        let data = b"BI /F /DCT ID \xff\xd8\xff\xe0\x00\x04ab\x12\x34\xff\xd9 EI Q";

        let stream = parse_with_known(data, &known).into_stream().unwrap();
        assert_eq!(
            stream.raw_data(),
            b"\xff\xd8\xff\xe0\x00\x04ab\x12\x34\xff\xd9"
        );
    }

    #[test]
    fn inline_image_ascii85_terminator() {
        let known = known_commands(&[b"Q"]);
        let data = b"BI /F /A85 ID 87cURDZ~> EI Q";

        let stream = parse_with_known(data, &known).into_stream().unwrap();
        assert_eq!(stream.raw_data(), b"87cURDZ~>");
        assert_eq!(stream.decoded().unwrap(), b"Hello");
    }

    #[test]
    fn inline_image_hex_terminator() {
        let known = known_commands(&[b"Q"]);
        let data = b"BI /F /AHx ID 0102fF> EI Q";

        let stream = parse_with_known(data, &known).into_stream().unwrap();
        assert_eq!(stream.decoded().unwrap(), vec![0x01, 0x02, 0xff]);
    }

    #[test]
    fn repeated_tiny_inline_images_are_memoized() {
        let known = known_commands(&[b"Q"]);
        let atoms = AtomTable::new();
        let mut ctx = ParseCtx::new(&atoms);
        ctx.known_commands = Some(&known);

        let data = b"BI /W 1 ID \x05 EI Q BI /W 1 ID \x05 EI Q";
        let mut parser = Parser::new(Cursor::new(Window::full(data)), ctx).unwrap();

        let first = parser.get_object().unwrap().into_stream().unwrap();
        let q = parser.get_object().unwrap();
        assert!(matches!(q, Object::Command(_)));
        let second = parser.get_object().unwrap().into_stream().unwrap();

        assert!(first.shares_repr(&second));
    }

    #[test]
    fn parse_indirect_object() {
        let atoms = AtomTable::new();
        let ctx = ParseCtx::new(&atoms);
        let data = b"12 0 obj << /Type /Test >> endobj";
        let mut parser = Parser::new(Cursor::new(Window::full(data)), ctx).unwrap();

        let (id, obj) = parser.parse_indirect_object().unwrap();
        assert_eq!(id, ObjRef::new(12, 0));
        assert!(matches!(obj, Object::Dict(_)));
    }
}

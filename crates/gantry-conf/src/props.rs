//! Line-oriented `key <sep> value` configuration text, in the classic
//! properties dialect: `#`/`!` comments, `=`/`:`/whitespace key separators,
//! backslash escapes (`\t` `\n` `\r` `\f`, `\uXXXX` code points re-encoded
//! as UTF-8, anything else taken literally) and backslash-newline line
//! continuation. The parser is a byte-at-a-time state machine, so input may
//! arrive in chunks of any size.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};

use crate::error::Error;

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\x0c')
}

fn is_line_sep(b: u8) -> bool {
    matches!(b, b'\n' | b'\r')
}

fn is_key_sep(b: u8) -> bool {
    matches!(b, b':' | b'=')
}

fn is_any_space(b: u8) -> bool {
    is_space(b) || is_line_sep(b)
}

fn is_comment_mark(b: u8) -> bool {
    matches!(b, b'#' | b'!')
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn push_code_point(dst: &mut Vec<u8>, cp: u32) -> Result<(), Error> {
    if cp < 0x80 {
        dst.push(cp as u8);
    } else if cp < 0x800 {
        dst.push(0xc0 | (cp >> 6) as u8);
        dst.push(0x80 | (cp & 0x3f) as u8);
    } else if cp < 0x10000 {
        dst.push(0xe0 | (cp >> 12) as u8);
        dst.push(0x80 | ((cp >> 6) & 0x3f) as u8);
        dst.push(0x80 | (cp & 0x3f) as u8);
    } else {
        return Err(Error::CodePoint { value: cp });
    }
    Ok(())
}

#[derive(Clone, Copy)]
enum Field {
    Key,
    Value,
}

#[derive(Clone, Copy)]
enum State {
    /// Skipping whitespace and blank lines before a key starts.
    LineStart,
    Comment,
    Key,
    /// Whitespace after the key; a `=`/`:` may still follow.
    AfterKey,
    /// Separator consumed; skipping whitespace before the value.
    AfterSep,
    Value,
    /// Backslash consumed, deciding what it introduces.
    Escape,
    /// Backslash then `\r`; a `\n` may complete the separator pair.
    EscapeCr,
    /// Line continuation; skipping leading whitespace of the joined line.
    Continuation,
    /// Collecting the four hex digits of a `\u` escape.
    UniDigit,
}

/// Outcome of a finished escape, applied when the following byte arrives.
/// Input that ends while one is outstanding drops it.
enum Pending {
    Byte(u8),
    CodePoint(u32),
    EndLine,
}

/// Streaming parser. All parse position lives in this struct, never in the
/// caller's control flow, so [`Parser::push_bytes`] may be fed any chunking
/// of the same byte stream with identical results.
pub struct Parser {
    state: State,
    field: Field,
    pending: Option<Pending>,
    key: Vec<u8>,
    value: Vec<u8>,
    uni_value: u32,
    uni_count: u8,
    uni_raw: [u8; 4],
}

impl Parser {
    pub fn new() -> Parser {
        Parser {
            state: State::LineStart,
            field: Field::Key,
            pending: None,
            key: Vec::new(),
            value: Vec::new(),
            uni_value: 0,
            uni_count: 0,
            uni_raw: [0; 4],
        }
    }

    /// Feeds one chunk. Entries completed by a line separator inside the
    /// chunk are inserted into `out` as they close; within one parse pass
    /// the first occurrence of a key wins.
    pub fn push_bytes(&mut self, chunk: &[u8], out: &mut PropSet) -> Result<(), Error> {
        for &b in chunk {
            self.step(b, out)?;
        }
        Ok(())
    }

    /// Ends the stream, flushing a final entry whose line had no terminating
    /// separator. An outstanding escape is discarded.
    pub fn finish(mut self, out: &mut PropSet) {
        if !self.key.is_empty() {
            self.emit(out);
        }
    }

    fn step(&mut self, b: u8, out: &mut PropSet) -> Result<(), Error> {
        if let Some(p) = self.pending.take() {
            self.apply(p, out)?;
        }

        loop {
            match self.state {
                State::LineStart => {
                    if is_any_space(b) {
                    } else if is_comment_mark(b) {
                        self.state = State::Comment;
                    } else if b == b'\\' {
                        self.field = Field::Key;
                        self.state = State::Escape;
                    } else {
                        self.key.push(b);
                        self.state = State::Key;
                    }
                }
                State::Comment => {
                    if is_line_sep(b) {
                        self.state = State::LineStart;
                    }
                }
                State::Key => {
                    if is_space(b) {
                        self.state = State::AfterKey;
                    } else if is_key_sep(b) {
                        self.state = State::AfterSep;
                    } else if is_line_sep(b) {
                        self.emit(out);
                        self.state = State::LineStart;
                    } else if b == b'\\' {
                        self.field = Field::Key;
                        self.state = State::Escape;
                    } else {
                        self.key.push(b);
                    }
                }
                State::AfterKey => {
                    if is_space(b) {
                    } else if is_key_sep(b) {
                        self.state = State::AfterSep;
                    } else if is_line_sep(b) {
                        self.emit(out);
                        self.state = State::LineStart;
                    } else if b == b'\\' {
                        self.field = Field::Value;
                        self.state = State::Escape;
                    } else {
                        self.value.push(b);
                        self.state = State::Value;
                    }
                }
                State::AfterSep => {
                    if is_space(b) {
                    } else if is_line_sep(b) {
                        self.emit(out);
                        self.state = State::LineStart;
                    } else if b == b'\\' {
                        self.field = Field::Value;
                        self.state = State::Escape;
                    } else {
                        self.value.push(b);
                        self.state = State::Value;
                    }
                }
                State::Value => {
                    if is_line_sep(b) {
                        self.emit(out);
                        self.state = State::LineStart;
                    } else if b == b'\\' {
                        self.field = Field::Value;
                        self.state = State::Escape;
                    } else {
                        self.value.push(b);
                    }
                }
                State::Escape => match b {
                    b'\n' => self.state = State::Continuation,
                    b'\r' => self.state = State::EscapeCr,
                    b'f' => self.pending = Some(Pending::Byte(b'\x0c')),
                    b'n' => self.pending = Some(Pending::Byte(b'\n')),
                    b'r' => self.pending = Some(Pending::Byte(b'\r')),
                    b't' => self.pending = Some(Pending::Byte(b'\t')),
                    b'u' => {
                        self.uni_value = 0;
                        self.uni_count = 0;
                        self.state = State::UniDigit;
                    }
                    // An unrecognized escape stands for the character itself.
                    _ => self.pending = Some(Pending::Byte(b)),
                },
                State::EscapeCr => match b {
                    b'\n' => self.state = State::Continuation,
                    b'\r' => self.pending = Some(Pending::EndLine),
                    _ if is_space(b) => self.state = State::Continuation,
                    _ => self.pending = Some(Pending::Byte(b)),
                },
                State::Continuation => {
                    if is_space(b) {
                    } else if is_line_sep(b) {
                        self.pending = Some(Pending::EndLine);
                    } else {
                        self.pending = Some(Pending::Byte(b));
                    }
                }
                State::UniDigit => {
                    if let Some(d) = hex_value(b) {
                        self.uni_raw[self.uni_count as usize] = b;
                        self.uni_value = (self.uni_value << 4) | u32::from(d);
                        self.uni_count += 1;
                        if self.uni_count == 4 {
                            self.pending = Some(Pending::CodePoint(self.uni_value));
                            self.uni_count = 0;
                        }
                    } else {
                        // Malformed escape: whatever was consumed goes
                        // through literally, and this byte is reconsidered
                        // in the field the escape interrupted.
                        let raw = self.uni_raw;
                        let n = usize::from(self.uni_count);
                        let dst = self.field_mut();
                        if n == 0 {
                            dst.push(b'u');
                        } else {
                            dst.extend_from_slice(&raw[..n]);
                        }
                        self.uni_count = 0;
                        self.state = self.field_state();
                        continue;
                    }
                }
            }
            break;
        }
        Ok(())
    }

    fn apply(&mut self, p: Pending, out: &mut PropSet) -> Result<(), Error> {
        match p {
            Pending::Byte(b) => {
                self.field_mut().push(b);
                self.state = self.field_state();
            }
            Pending::CodePoint(cp) => {
                push_code_point(self.field_mut(), cp)?;
                self.state = self.field_state();
            }
            Pending::EndLine => {
                self.state = State::LineStart;
                if !self.key.is_empty() {
                    self.emit(out);
                }
            }
        }
        Ok(())
    }

    fn field_mut(&mut self) -> &mut Vec<u8> {
        match self.field {
            Field::Key => &mut self.key,
            Field::Value => &mut self.value,
        }
    }

    fn field_state(&self) -> State {
        match self.field {
            Field::Key => State::Key,
            Field::Value => State::Value,
        }
    }

    fn emit(&mut self, out: &mut PropSet) {
        let key = String::from_utf8_lossy(&self.key).into_owned();
        let value = String::from_utf8_lossy(&self.value).into_owned();
        out.entries.entry(key).or_insert(value);
        self.key.clear();
        self.value.clear();
    }
}

impl Default for Parser {
    fn default() -> Parser {
        Parser::new()
    }
}

/// Parsed configuration entries, keyed case-sensitively.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PropSet {
    entries: BTreeMap<String, String>,
}

impl PropSet {
    pub fn new() -> PropSet {
        PropSet::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Overlays `other` onto this set; on key collision `other` wins. Merging
    /// sources lowest-priority first therefore leaves the highest-priority
    /// value in place.
    pub fn merge_from(&mut self, other: PropSet) {
        self.entries.extend(other.entries);
    }

    /// Parses `path` into this set. A file that cannot be opened contributes
    /// nothing; configuration sources are optional. `scratch` is reused as
    /// the read window and holds unspecified bytes afterwards.
    pub fn load_file(&mut self, path: &str, scratch: &mut Vec<u8>) -> Result<(), Error> {
        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(_) => return Ok(()),
        };

        scratch.clear();
        let window = scratch.capacity().max(2048);
        scratch.resize(window, 0);

        let mut parser = Parser::new();
        loop {
            let n = match file.read(&mut scratch[..]) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                // A read failure ends the stream like end of input.
                Err(_) => break,
            };
            parser.push_bytes(&scratch[..n], self)?;
        }
        parser.finish(self);
        Ok(())
    }
}

//! Streaming reader for the three attributes this crate needs out of
//! `Info.plist`: `band-size`, `size`, and `bundle-backingstore-version`.
//!
//! This does not attempt to be a general-purpose plist or XML parser. It
//! walks the byte stream once, character at a time, with a handful of
//! bounded scratch buffers, tracking element depth well enough to find the
//! direct children of the top-level `plist -> dict` and ignore everything
//! else. Nested dicts/arrays under those three keys are not expected in a
//! real `Info.plist` and are tolerated (parsed without error) but not
//! interpreted.
//!
//! Value elements are not type-checked: `<integer>`, `<string>`, and any
//! other tag's inner text is parsed with the same decimal-integer rule. This
//! mirrors the lax behavior of the original sparsebundle reader this crate is
//! modeled on, which never distinguishes plist value types either.

use std::fmt;
use std::io::Read;

/// Bound on how much text any single key or value buffer may accumulate
/// before parsing gives up. Keeps working memory independent of the size of
/// `Info.plist`.
const MAX_SCRATCH: usize = 1024;
const MAX_TAG_NAME: usize = 256;

const DICT_PATH: [&str; 2] = ["plist", "dict"];

/// The three attributes extracted from `Info.plist`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ParsedInfo {
    pub(crate) band_size: u64,
    pub(crate) size: u64,
    pub(crate) version: i64,
}

/// Failure to parse or validate `Info.plist`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PlistError {
    Io(String),
    Xml(String),
    ScratchOverflow,
    MissingBandSize,
    MissingSize,
    MissingVersion,
    UnsupportedVersion(i64),
    InvalidBandSize(i64),
    InvalidSize(i64),
}

impl fmt::Display for PlistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlistError::Io(msg) => write!(f, "error reading Info.plist: {msg}"),
            PlistError::Xml(msg) => write!(f, "error while parsing plist: {msg}"),
            PlistError::ScratchOverflow => {
                write!(f, "plist element text exceeded the {MAX_SCRATCH} byte scratch bound")
            }
            PlistError::MissingBandSize => write!(f, "unable to obtain a valid band-size"),
            PlistError::MissingSize => write!(f, "unable to obtain a valid size"),
            PlistError::MissingVersion => {
                write!(f, "unsupported bundle-backingstore-version")
            }
            PlistError::UnsupportedVersion(v) => {
                write!(f, "unsupported bundle-backingstore-version: {v}")
            }
            PlistError::InvalidBandSize(v) => write!(f, "unable to obtain a valid band-size: {v}"),
            PlistError::InvalidSize(v) => write!(f, "unable to obtain a valid size: {v}"),
        }
    }
}

impl std::error::Error for PlistError {}

struct Scanner<R: Read> {
    inner: std::io::Bytes<std::io::BufReader<R>>,
}

impl<R: Read> Scanner<R> {
    fn new(reader: R) -> Self {
        Scanner { inner: std::io::BufReader::new(reader).bytes() }
    }

    fn next(&mut self) -> Result<Option<u8>, PlistError> {
        match self.inner.next() {
            None => Ok(None),
            Some(Ok(b)) => Ok(Some(b)),
            Some(Err(e)) => Err(PlistError::Io(e.to_string())),
        }
    }

    fn require_next(&mut self) -> Result<u8, PlistError> {
        self.next()?.ok_or_else(|| PlistError::Xml("unexpected end of file".to_string()))
    }

    /// Skip the remainder of a tag (attributes, possibly quoted), returning
    /// whether it was self-closing (`.../>`).
    fn skip_tag_tail(&mut self) -> Result<bool, PlistError> {
        let mut self_closing = false;
        let mut prev: u8 = 0;
        loop {
            let c = self.require_next()?;
            match c {
                b'"' | b'\'' => self.skip_quoted(c)?,
                b'>' => {
                    self_closing = prev == b'/';
                    break;
                }
                _ => {}
            }
            prev = c;
        }
        Ok(self_closing)
    }

    fn skip_quoted(&mut self, quote: u8) -> Result<(), PlistError> {
        loop {
            let c = self.require_next()?;
            if c == quote {
                return Ok(());
            }
        }
    }

    /// Skip a `<?...?>`, `<!-- ... -->`, or `<!DOCTYPE ...>` construct.
    fn skip_declaration(&mut self) -> Result<(), PlistError> {
        loop {
            match self.next()? {
                None => return Err(PlistError::Xml("unexpected end of file".to_string())),
                Some(b'>') => return Ok(()),
                Some(_) => {}
            }
        }
    }
}

fn push_scratch(buf: &mut String, b: u8) -> Result<(), PlistError> {
    if buf.len() >= MAX_SCRATCH {
        return Err(PlistError::ScratchOverflow);
    }
    buf.push(b as char);
    Ok(())
}

#[derive(Default)]
struct ParseState {
    depth: u32,
    path_ok: bool,
    in_key: bool,
    in_value: bool,
    cur_key: String,
    cur_value: String,
    band_size: Option<i64>,
    size: Option<i64>,
    version: Option<i64>,
}

impl ParseState {
    fn new() -> Self {
        ParseState { path_ok: true, ..Default::default() }
    }

    fn open(&mut self, name: &str) {
        let matches_path = self.path_ok
            && (self.depth as usize >= DICT_PATH.len() || DICT_PATH[self.depth as usize] == name);
        if matches_path && self.depth as usize == DICT_PATH.len() {
            if name == "key" {
                self.cur_key.clear();
                self.in_key = true;
            } else {
                self.cur_value.clear();
                self.in_value = true;
            }
        }
        self.path_ok = matches_path;
        self.depth += 1;
    }

    fn close(&mut self) {
        if self.in_value {
            self.assign_if_known();
        }
        self.in_key = false;
        self.in_value = false;
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            self.path_ok = true;
        }
    }

    fn assign_if_known(&mut self) {
        match self.cur_key.as_str() {
            "band-size" => self.band_size = Some(parse_decimal(&self.cur_value)),
            "size" => self.size = Some(parse_decimal(&self.cur_value)),
            "bundle-backingstore-version" => {
                self.version = Some(parse_decimal(&self.cur_value))
            }
            _ => {}
        }
    }

    fn push_text(&mut self, b: u8) -> Result<(), PlistError> {
        if self.in_key {
            push_scratch(&mut self.cur_key, b)
        } else if self.in_value {
            push_scratch(&mut self.cur_value, b)
        } else {
            Ok(())
        }
    }

    fn finish(self) -> Result<ParsedInfo, PlistError> {
        let version = self.version.ok_or(PlistError::MissingVersion)?;
        if version != 1 {
            return Err(PlistError::UnsupportedVersion(version));
        }
        let band_size = self.band_size.ok_or(PlistError::MissingBandSize)?;
        if band_size <= 0 {
            return Err(PlistError::InvalidBandSize(band_size));
        }
        let size = self.size.ok_or(PlistError::MissingSize)?;
        if size <= 0 {
            return Err(PlistError::InvalidSize(size));
        }
        Ok(ParsedInfo { band_size: band_size as u64, size: size as u64, version })
    }
}

/// `atoi`-style parse: leading sign and digits, stops at the first
/// non-digit, defaults to 0 on no digits at all. Matches the C library's
/// `atoi`, which the reader this crate is modeled on relies on for every
/// value regardless of declared type.
fn parse_decimal(s: &str) -> i64 {
    let s = s.trim_start();
    let mut chars = s.chars().peekable();
    let neg = match chars.peek() {
        Some('-') => {
            chars.next();
            true
        }
        Some('+') => {
            chars.next();
            false
        }
        _ => false,
    };
    let mut value: i64 = 0;
    let mut saw_digit = false;
    for c in chars {
        match c.to_digit(10) {
            Some(d) => {
                saw_digit = true;
                value = value.saturating_mul(10).saturating_add(d as i64);
            }
            None => break,
        }
    }
    if !saw_digit {
        return 0;
    }
    if neg { -value } else { value }
}

pub(crate) fn parse_info_plist<R: Read>(reader: R) -> Result<ParsedInfo, PlistError> {
    let mut scanner = Scanner::new(reader);
    let mut state = ParseState::new();

    while let Some(b) = scanner.next()? {
        if b != b'<' {
            state.push_text(b)?;
            continue;
        }

        let mut c = scanner.require_next()?;
        let closing = c == b'/';
        if closing {
            c = scanner.require_next()?;
        }
        if c == b'?' || c == b'!' {
            scanner.skip_declaration()?;
            continue;
        }

        let mut name = String::new();
        let self_closing = loop {
            match c {
                b'>' => break false,
                b'/' => {
                    // Consume the trailing '>' of a self-closing tag.
                    let gt = scanner.require_next()?;
                    debug_assert_eq!(gt, b'>');
                    break true;
                }
                _ if c.is_ascii_whitespace() => break scanner.skip_tag_tail()?,
                _ => {
                    if name.len() < MAX_TAG_NAME {
                        name.push(c as char);
                    }
                    c = scanner.require_next()?;
                    continue;
                }
            }
        };

        if closing {
            state.close();
        } else {
            state.open(&name);
            if self_closing {
                state.close();
            }
        }
    }

    state.finish()
}

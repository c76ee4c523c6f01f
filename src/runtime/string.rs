//! Risse string representation
//!
//! Strings are views (`start`, `len`) into a shared buffer of code points.
//! Clones and substrings share the buffer; a mutating operation writes in
//! place only while the buffer is uniquely owned and the view covers its
//! tail, otherwise the characters are copied into a fresh buffer first.
//! The hash hint is computed lazily and cached next to the view.

use crate::error::{RtResult, TemporaryException};
use crate::util::decode_utf8;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::sync::{Arc, LazyLock};

/// Length below which the buffer grows by doubling
const GROWTH_LINEAR_THRESHOLD: usize = 16 * 1024;

/// Code points that are never stored (content is cut at the first one)
const TERMINATOR: char = '\0';

/// Digits used by `\x` escapes
const HEX_CHARS: &[u8; 16] = b"0123456789ABCDEF";

static EMPTY_BUFFER: LazyLock<Arc<Vec<char>>> = LazyLock::new(|| Arc::new(Vec::new()));

static TEMPLATE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"%([1-9])").ok());

/// Risse string
///
/// Length is measured in code points. Content never contains NUL.
pub struct RString {
    buf: Arc<Vec<char>>,
    start: usize,
    len: usize,
    /// Cached hash hint (0 = not computed yet)
    hash: AtomicU32,
}

impl RString {
    /// Sentinel for "until the end of the string"
    pub const NPOS: usize = usize::MAX;

    /// Longest string a repetition may produce
    pub const MAX_LEN: usize = (1 << 30) - 1;

    /// The canonical empty string
    pub fn empty() -> Self {
        RString {
            buf: Arc::clone(&EMPTY_BUFFER),
            start: 0,
            len: 0,
            hash: AtomicU32::new(0),
        }
    }

    /// Create a string by copying a slice of code points
    ///
    /// The buffer is allocated at exactly the required size.
    pub fn from_chars(chars: &[char]) -> Self {
        let end = chars.iter().position(|&c| c == TERMINATOR).unwrap_or(chars.len());
        if end == 0 {
            return Self::empty();
        }
        Self::from_vec(chars[..end].to_vec())
    }

    fn from_vec(chars: Vec<char>) -> Self {
        let len = chars.len();
        RString {
            buf: Arc::new(chars),
            start: 0,
            len,
            hash: AtomicU32::new(0),
        }
    }

    /// Decode a UTF-8 byte sequence
    pub fn from_utf8(bytes: &[u8]) -> RtResult<Self> {
        match decode_utf8(bytes) {
            Ok(chars) => Ok(Self::from_chars(&chars)),
            Err(_) => Err(TemporaryException::invalid_utf8().into()),
        }
    }

    /// Build a string from UTF-32 code units
    pub fn from_utf32(units: &[u32]) -> RtResult<Self> {
        let mut chars = Vec::with_capacity(units.len());
        for &unit in units {
            match char::from_u32(unit) {
                Some(c) => chars.push(c),
                None => return Err(TemporaryException::utf32_out_of_range().into()),
            }
        }
        Ok(Self::from_chars(&chars))
    }

    /// Number of code points
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if string is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The code points of this string
    #[inline]
    pub fn as_chars(&self) -> &[char] {
        &self.buf[self.start..self.start + self.len]
    }

    /// Code point at `index`
    #[inline]
    pub fn char_at(&self, index: usize) -> Option<char> {
        self.as_chars().get(index).copied()
    }

    /// Whether another string value currently shares this buffer
    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.buf) > 1
    }

    /// Whether two strings view the same buffer
    pub fn shares_buffer_with(&self, other: &RString) -> bool {
        Arc::ptr_eq(&self.buf, &other.buf)
    }

    /// Substring view
    ///
    /// Returns the empty string if `length` is 0 or `offset` is past the end.
    /// The length is clamped to the remaining characters; pass
    /// [`RString::NPOS`] to take everything after `offset`.
    pub fn substring(&self, offset: usize, length: usize) -> RString {
        if length == 0 || offset >= self.len {
            return Self::empty();
        }
        let length = length.min(self.len - offset);
        if offset == 0 && length == self.len {
            return self.clone();
        }
        RString {
            buf: Arc::clone(&self.buf),
            start: self.start + offset,
            len: length,
            hash: AtomicU32::new(0),
        }
    }

    /// Append another string in place
    pub fn append(&mut self, other: &RString) {
        self.append_chars(other.as_chars());
    }

    /// Append a Rust string in place
    pub fn append_str(&mut self, other: &str) {
        let chars: Vec<char> = other.chars().collect();
        self.append_chars(&chars);
    }

    /// Append code points in place
    ///
    /// Writes into the current buffer only when no other string shares it and
    /// this view ends at the buffer's end; otherwise copies first.
    pub fn append_chars(&mut self, chars: &[char]) {
        let chars = match chars.iter().position(|&c| c == TERMINATOR) {
            Some(end) => &chars[..end],
            None => chars,
        };
        if chars.is_empty() {
            return;
        }

        let new_len = self.len + chars.len();
        let covers_tail = self.start + self.len == self.buf.len();
        let in_place = covers_tail && !Arc::ptr_eq(&self.buf, &EMPTY_BUFFER);

        let written = match Arc::get_mut(&mut self.buf) {
            Some(buf) if in_place => {
                let needed = self.start + new_len;
                if needed > buf.capacity() {
                    buf.reserve_exact(Self::grown_capacity(needed) - buf.len());
                }
                buf.extend_from_slice(chars);
                true
            }
            _ => false,
        };

        if !written {
            let mut fresh = Vec::with_capacity(Self::grown_capacity(new_len));
            fresh.extend_from_slice(self.as_chars());
            fresh.extend_from_slice(chars);
            self.buf = Arc::new(fresh);
            self.start = 0;
        }

        self.len = new_len;
        self.hash.store(0, AtomicOrdering::Relaxed);
    }

    /// Capacity to reserve when `needed` code points must fit
    #[inline]
    fn grown_capacity(needed: usize) -> usize {
        if needed < GROWTH_LINEAR_THRESHOLD {
            needed * 2
        } else {
            needed + GROWTH_LINEAR_THRESHOLD
        }
    }

    /// Concatenate into a new string
    pub fn concat(&self, other: &RString) -> RString {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let mut chars = Vec::with_capacity(self.len + other.len);
        chars.extend_from_slice(self.as_chars());
        chars.extend_from_slice(other.as_chars());
        Self::from_vec(chars)
    }

    /// Hash hint
    ///
    /// One-at-a-time hash over the code points; never 0.
    pub fn hash_hint(&self) -> u32 {
        let cached = self.hash.load(AtomicOrdering::Relaxed);
        if cached != 0 {
            return cached;
        }
        let hash = Self::compute_hash(self.as_chars());
        self.hash.store(hash, AtomicOrdering::Relaxed);
        hash
    }

    fn compute_hash(chars: &[char]) -> u32 {
        let mut ret: u32 = 0;
        for &c in chars {
            ret = ret.wrapping_add(c as u32);
            ret = ret.wrapping_add(ret << 10);
            ret ^= ret >> 6;
        }
        ret = ret.wrapping_add(ret << 3);
        ret ^= ret >> 11;
        ret = ret.wrapping_add(ret << 15);
        if ret == 0 { 0xFFFF_FFFF } else { ret }
    }

    /// Find the first occurrence of `needle` at or after `from`
    pub fn find(&self, needle: &RString, from: usize) -> Option<usize> {
        let hay = self.as_chars();
        let pat = needle.as_chars();
        if from > hay.len() {
            return None;
        }
        if pat.is_empty() {
            return Some(from);
        }
        hay[from..]
            .windows(pat.len())
            .position(|w| w == pat)
            .map(|p| p + from)
    }

    /// Check for a prefix
    pub fn starts_with(&self, prefix: &RString) -> bool {
        self.as_chars().starts_with(prefix.as_chars())
    }

    /// Replace the first (or every) occurrence of `old` with `new`
    pub fn replace(&self, old: &RString, new: &RString, replace_all: bool) -> RString {
        if old.is_empty() {
            return self.clone();
        }
        let mut out = RString::empty();
        let mut pos = 0;
        while let Some(found) = self.find(old, pos) {
            out.append_chars(&self.as_chars()[pos..found]);
            out.append(new);
            pos = found + old.len();
            if !replace_all {
                break;
            }
        }
        if pos == 0 {
            return self.clone();
        }
        out.append_chars(&self.as_chars()[pos..]);
        out
    }

    /// Repeat the string `count` times
    ///
    /// Fails when the result would exceed [`RString::MAX_LEN`].
    pub fn times(&self, count: usize) -> RtResult<RString> {
        if count == 0 || self.is_empty() {
            return Ok(Self::empty());
        }
        match self.len.checked_mul(count) {
            Some(total) if total <= Self::MAX_LEN => Ok(Self::from_vec(self.as_chars().repeat(count))),
            _ => Err(TemporaryException::illegal_argument("string is too long").into()),
        }
    }

    /// Escape the string with C-style escapes
    ///
    /// Output stops once it reaches `max_len` characters; a quoted result is
    /// then terminated with `" ..."` instead of the closing quote. A
    /// character that could be read as part of a preceding `\x` escape is
    /// escaped as well.
    pub fn escape(&self, max_len: usize, quote: bool) -> RString {
        let mut out: Vec<char> = Vec::with_capacity(self.len.min(max_len) + 6);
        let mut hexflag = false;

        if quote {
            out.push('"');
        }
        for &c in self.as_chars() {
            if out.len() >= max_len {
                if quote {
                    out.extend(" ...".chars());
                }
                return Self::from_vec(out);
            }

            let simple = match c {
                '\u{07}' => Some('a'),
                '\u{08}' => Some('b'),
                '\u{0C}' => Some('f'),
                '\n' => Some('n'),
                '\r' => Some('r'),
                '\t' => Some('t'),
                '\u{0B}' => Some('v'),
                '\\' => Some('\\'),
                '\'' => Some('\''),
                '"' => Some('"'),
                _ => None,
            };
            if let Some(e) = simple {
                out.push('\\');
                out.push(e);
                hexflag = false;
                continue;
            }

            if (hexflag && c.is_ascii_hexdigit()) || (c as u32) < 0x20 {
                let code = c as u32;
                out.push('\\');
                out.push('x');
                out.push(HEX_CHARS[((code >> 4) & 0x0F) as usize] as char);
                out.push(HEX_CHARS[(code & 0x0F) as usize] as char);
                hexflag = true;
            } else {
                out.push(c);
                hexflag = false;
            }
        }
        if quote {
            out.push('"');
        }
        Self::from_vec(out)
    }

    /// Quoted, escaped form limited to `max_len` characters
    pub fn as_human_readable(&self, max_len: usize) -> RString {
        self.escape(max_len, true)
    }

    /// Quoted, escaped form suitable for re-parsing
    pub fn as_token_string(&self) -> RString {
        self.escape(usize::MAX, true)
    }

    /// Expand `%1` .. `%9` placeholders in a template
    ///
    /// Placeholders without a matching argument are left as-is.
    pub fn format(template: &str, args: &[RString]) -> RString {
        let Some(pattern) = TEMPLATE_PATTERN.as_ref() else {
            return RString::from(template);
        };
        let expanded = pattern.replace_all(template, |caps: &regex::Captures<'_>| {
            let index = caps[1].parse::<usize>().unwrap_or(0);
            match index.checked_sub(1).and_then(|i| args.get(i)) {
                Some(arg) => arg.to_string(),
                None => caps[0].to_string(),
            }
        });
        RString::from(expanded.as_ref())
    }

    /// Parse the string as an integer index
    ///
    /// Accepts an optional `-` followed by decimal digits without leading
    /// zeros. Used to route numeric member names to the by-index path.
    pub fn parse_index(&self) -> Option<i64> {
        let chars = self.as_chars();
        let (negative, digits) = match chars.first()? {
            '-' => (true, &chars[1..]),
            _ => (false, chars),
        };
        if digits.is_empty() || digits.len() > 18 {
            return None;
        }
        if digits[0] == '0' && (digits.len() > 1 || negative) {
            return None;
        }
        let mut val: i64 = 0;
        for &c in digits {
            let d = c.to_digit(10)?;
            val = val * 10 + d as i64;
        }
        Some(if negative { -val } else { val })
    }

    /// Convert to upper case
    pub fn to_uppercase(&self) -> RString {
        RString::from(self.to_string().to_uppercase().as_str())
    }

    /// Convert to lower case
    pub fn to_lowercase(&self) -> RString {
        RString::from(self.to_string().to_lowercase().as_str())
    }
}

impl Default for RString {
    fn default() -> Self {
        Self::empty()
    }
}

impl Clone for RString {
    fn clone(&self) -> Self {
        RString {
            buf: Arc::clone(&self.buf),
            start: self.start,
            len: self.len,
            hash: AtomicU32::new(self.hash.load(AtomicOrdering::Relaxed)),
        }
    }
}

impl From<&str> for RString {
    fn from(s: &str) -> Self {
        let chars: Vec<char> = s.chars().take_while(|&c| c != TERMINATOR).collect();
        if chars.is_empty() {
            return Self::empty();
        }
        Self::from_vec(chars)
    }
}

impl From<String> for RString {
    fn from(s: String) -> Self {
        RString::from(s.as_str())
    }
}

impl From<&String> for RString {
    fn from(s: &String) -> Self {
        RString::from(s.as_str())
    }
}

impl From<&RString> for RString {
    fn from(s: &RString) -> Self {
        s.clone()
    }
}

impl PartialEq for RString {
    fn eq(&self, other: &Self) -> bool {
        if self.len != other.len {
            return false;
        }
        if Arc::ptr_eq(&self.buf, &other.buf) && self.start == other.start {
            return true;
        }
        let (a, b) = (
            self.hash.load(AtomicOrdering::Relaxed),
            other.hash.load(AtomicOrdering::Relaxed),
        );
        if a != 0 && b != 0 && a != b {
            return false;
        }
        self.as_chars() == other.as_chars()
    }
}

impl Eq for RString {}

impl PartialEq<str> for RString {
    fn eq(&self, other: &str) -> bool {
        self.as_chars().iter().copied().eq(other.chars())
    }
}

impl PartialEq<&str> for RString {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl PartialOrd for RString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RString {
    /// Code-point-wise comparison; a proper prefix orders first
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_chars().cmp(other.as_chars())
    }
}

impl Hash for RString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.hash_hint());
    }
}

impl fmt::Display for RString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: String = self.as_chars().iter().collect();
        f.write_str(&s)
    }
}

impl fmt::Debug for RString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_token_string())
    }
}

impl std::ops::Add<&RString> for &RString {
    type Output = RString;

    fn add(self, rhs: &RString) -> RString {
        self.concat(rhs)
    }
}

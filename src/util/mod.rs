//! Utility functions
//!
//! Character decoding and number formatting helpers shared by the string
//! type, the variant coercions and the structured-data lexer.

pub mod dtoa;
pub mod unicode;

/// Decode a UTF-8 character from bytes
///
/// Returns (code point, bytes consumed) or None if invalid. Overlong forms,
/// surrogate halves and code points above U+10FFFF are rejected.
pub fn unicode_from_utf8(buf: &[u8]) -> Option<(char, usize)> {
    let b0 = *buf.first()?;
    if b0 < 0x80 {
        return Some((b0 as char, 1));
    }

    if !(0xC0..0xF8).contains(&b0) {
        return None; // Invalid start byte
    }

    let (len, min_cp) = if b0 < 0xE0 {
        (2, 0x80)
    } else if b0 < 0xF0 {
        (3, 0x800)
    } else {
        (4, 0x10000)
    };

    if buf.len() < len {
        return None;
    }

    if buf[1..len].iter().any(|byte| byte & 0xC0 != 0x80) {
        return None;
    }

    let cp = match len {
        2 => ((b0 & 0x1F) as u32) << 6 | (buf[1] & 0x3F) as u32,
        3 => ((b0 & 0x0F) as u32) << 12 | ((buf[1] & 0x3F) as u32) << 6 | (buf[2] & 0x3F) as u32,
        _ => {
            ((b0 & 0x07) as u32) << 18
                | ((buf[1] & 0x3F) as u32) << 12
                | ((buf[2] & 0x3F) as u32) << 6
                | (buf[3] & 0x3F) as u32
        }
    };

    if cp < min_cp {
        return None;
    }

    // char::from_u32 refuses surrogates and values past U+10FFFF
    char::from_u32(cp).map(|c| (c, len))
}

/// Decode a whole UTF-8 byte sequence into code points
///
/// On failure returns the byte offset of the first malformed sequence.
pub fn decode_utf8(buf: &[u8]) -> Result<Vec<char>, usize> {
    let mut out = Vec::with_capacity(buf.len());
    let mut pos = 0;
    while pos < buf.len() {
        match unicode_from_utf8(&buf[pos..]) {
            Some((c, len)) => {
                out.push(c);
                pos += len;
            }
            None => return Err(pos),
        }
    }
    Ok(out)
}

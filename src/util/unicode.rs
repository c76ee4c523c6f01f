//! Unicode utilities
//!
//! Character classes used by the structured-data lexer and by string escaping.

/// Check if a character is a line terminator
#[inline]
pub fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

/// Check if a character is whitespace
#[inline]
pub fn is_whitespace(c: char) -> bool {
    matches!(
        c,
        '\t'
        | '\u{000B}' // Vertical Tab
        | '\u{000C}' // Form Feed
        | ' '
        | '\u{00A0}' // No-Break Space
        | '\u{FEFF}' // BOM
    ) || is_line_terminator(c)
        || is_unicode_space(c)
}

/// Check if a character is a Unicode space separator
#[inline]
pub fn is_unicode_space(c: char) -> bool {
    matches!(c, '\u{1680}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}')
}

/// Check if a character can start an identifier
#[inline]
pub fn is_id_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || (!c.is_ascii() && c.is_alphabetic())
}

/// Check if a character can continue an identifier
#[inline]
pub fn is_id_continue(c: char) -> bool {
    is_id_start(c) || c.is_ascii_digit()
}

/// Value of a hexadecimal digit
#[inline]
pub fn hex_value(c: char) -> Option<u32> {
    c.to_digit(16)
}

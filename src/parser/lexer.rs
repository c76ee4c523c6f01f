//! Structured-data lexer
//!
//! Converts structured-data text into a stream of tokens. Works on
//! characters rather than bytes so string literals keep their full
//! Unicode content.

use crate::util::dtoa::{ParsedNumber, parse_number};
use crate::util::unicode::{hex_value, is_id_continue, is_id_start, is_whitespace};

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(ParsedNumber),
    String(String),
    Ident(String),

    // Punctuation
    Plus,
    Minus,
    Comma,
    Arrow,           // =>
    LBracket,        // [
    PercentBracket,  // %[
    RBracket,        // ]

    // Special
    Eof,
    Error(String),
}

/// Lexer for structured-data text
pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    /// Start of the most recently read token
    token_start: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            pos: 0,
            token_start: 0,
        }
    }

    /// Character offset of the most recently read token
    pub fn position(&self) -> usize {
        self.token_start
    }

    /// Source text of the most recently read token
    pub fn token_text(&self) -> String {
        self.source[self.token_start..self.pos].iter().collect()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    /// Skip whitespace and comments; an unterminated block comment is an error
    fn skip_whitespace(&mut self) -> Result<(), String> {
        loop {
            match self.peek() {
                Some(c) if is_whitespace(c) => {
                    self.advance();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    while let Some(c) = self.advance() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                Some('/') if self.peek_next() == Some('*') => {
                    self.pos += 2;
                    loop {
                        match self.advance() {
                            Some('*') if self.peek() == Some('/') => {
                                self.advance();
                                break;
                            }
                            Some(_) => {}
                            None => return Err("unterminated comment".to_string()),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Read the next token
    pub fn next_token(&mut self) -> Token {
        if let Err(message) = self.skip_whitespace() {
            return Token::Error(message);
        }
        self.token_start = self.pos;

        let Some(c) = self.peek() else {
            return Token::Eof;
        };

        if is_id_start(c) {
            return self.read_identifier();
        }
        if c.is_ascii_digit() || (c == '.' && self.peek_next().is_some_and(|n| n.is_ascii_digit())) {
            return self.read_number();
        }
        if c == '"' || c == '\'' {
            return self.read_string(c);
        }

        self.advance();
        match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            ',' => Token::Comma,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '%' if self.peek() == Some('[') => {
                self.advance();
                Token::PercentBracket
            }
            '=' if self.peek() == Some('>') => {
                self.advance();
                Token::Arrow
            }
            _ => Token::Error(format!("unexpected character '{}'", c)),
        }
    }

    fn read_identifier(&mut self) -> Token {
        let start = self.pos;
        while self.peek().is_some_and(is_id_continue) {
            self.advance();
        }
        Token::Ident(self.source[start..self.pos].iter().collect())
    }

    fn read_number(&mut self) -> Token {
        let start = self.pos;
        if self.peek() == Some('0') && matches!(self.peek_next(), Some('x' | 'X')) {
            self.pos += 2;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.advance();
            }
        } else {
            while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
                self.advance();
            }
            if matches!(self.peek(), Some('e' | 'E')) {
                self.advance();
                if matches!(self.peek(), Some('+' | '-')) {
                    self.advance();
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let text: String = self.source[start..self.pos].iter().collect();
        match parse_number(&text) {
            Some(n) => Token::Number(n),
            None => Token::Error(format!("invalid number {}", text)),
        }
    }

    fn read_string(&mut self, quote: char) -> Token {
        self.advance();
        let mut s = String::new();

        loop {
            match self.advance() {
                None => return Token::Error("unterminated string".to_string()),
                Some(c) if c == quote => break,
                Some('\\') => match self.advance() {
                    Some('a') => s.push('\u{07}'),
                    Some('b') => s.push('\u{08}'),
                    Some('f') => s.push('\u{0C}'),
                    Some('n') => s.push('\n'),
                    Some('r') => s.push('\r'),
                    Some('t') => s.push('\t'),
                    Some('v') => s.push('\u{0B}'),
                    Some('x') => {
                        let mut code: u32 = 0;
                        let mut digits = 0;
                        while let Some(v) = self.peek().and_then(hex_value) {
                            code = code.saturating_mul(16).saturating_add(v);
                            digits += 1;
                            self.advance();
                        }
                        match char::from_u32(code) {
                            Some(c) if digits > 0 => s.push(c),
                            _ => return Token::Error("invalid hexadecimal escape".to_string()),
                        }
                    }
                    Some(c) => s.push(c),
                    None => return Token::Error("unterminated string".to_string()),
                },
                Some(c) => s.push(c),
            }
        }

        Token::String(s)
    }
}

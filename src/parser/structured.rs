//! Structured-data reader
//!
//! Reads the text produced by [`crate::runtime::structured`] back into
//! values: scalar literals, `[...]` arrays and `%[key => value, ...]`
//! dictionaries. A trailing comma is accepted inside both containers.

use super::lexer::{Lexer, Token};
use crate::engine::Engine;
use crate::error::{RtResult, TemporaryException};
use crate::runtime::string::RString;
use crate::util::dtoa::{ParsedNumber, parse_number};
use crate::value::Variant;

/// Deepest container nesting the reader accepts
const MAX_DEPTH: usize = 512;

/// Read a single structured-data value from `source`
pub fn parse_structured(engine: &Engine, source: &str) -> RtResult<Variant> {
    let mut parser = StructuredParser::new(engine, source);
    let value = parser.parse_value(0)?;
    if parser.current_token != Token::Eof {
        return Err(parser.unexpected("end of input"));
    }
    Ok(value)
}

/// Parser state
struct StructuredParser<'e> {
    engine: &'e Engine,
    lexer: Lexer,
    current_token: Token,
}

impl<'e> StructuredParser<'e> {
    fn new(engine: &'e Engine, source: &str) -> Self {
        let mut lexer = Lexer::new(source);
        let current_token = lexer.next_token();
        StructuredParser {
            engine,
            lexer,
            current_token,
        }
    }

    /// Advance to the next token
    fn advance(&mut self) {
        self.current_token = self.lexer.next_token();
    }

    /// Check if current token matches expected
    fn check(&self, expected: &Token) -> bool {
        std::mem::discriminant(&self.current_token) == std::mem::discriminant(expected)
    }

    fn error(&self, message: &str) -> crate::error::RuntimeError {
        TemporaryException::compile_error(message, self.lexer.position()).into()
    }

    fn unexpected(&self, expected: &str) -> crate::error::RuntimeError {
        match &self.current_token {
            Token::Error(message) => self.error(message),
            Token::Eof => self.error(&format!("unexpected end of input, expected {}", expected)),
            token => self.error(&format!("unexpected {:?}, expected {}", token, expected)),
        }
    }

    /// Expect a specific token, advance if matched
    fn expect(&mut self, expected: Token, description: &str) -> RtResult<()> {
        if self.check(&expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(description))
        }
    }

    fn parse_value(&mut self, depth: usize) -> RtResult<Variant> {
        if depth > MAX_DEPTH {
            return Err(self.error("structured data nested too deeply"));
        }
        match self.current_token.clone() {
            Token::LBracket => self.parse_array(depth),
            Token::PercentBracket => self.parse_dictionary(depth),
            Token::Number(n) => {
                self.advance();
                Ok(number(n))
            }
            Token::String(s) => {
                self.advance();
                Ok(Variant::String(RString::from(s)))
            }
            Token::Plus | Token::Minus => self.parse_signed(),
            Token::Ident(word) => {
                let value = match word.as_str() {
                    "void" => Variant::Void,
                    "null" => Variant::Null,
                    "true" => Variant::Boolean(true),
                    "false" => Variant::Boolean(false),
                    "NaN" => Variant::Real(f64::NAN),
                    "Infinity" => Variant::Real(f64::INFINITY),
                    _ => return Err(self.error(&format!("unknown identifier {}", word))),
                };
                self.advance();
                Ok(value)
            }
            _ => Err(self.unexpected("a value")),
        }
    }

    /// `+` or `-` followed by a number, `NaN` or `Infinity`
    fn parse_signed(&mut self) -> RtResult<Variant> {
        let negative = self.current_token == Token::Minus;
        self.advance();
        let value = match &self.current_token {
            // Sign and digits are read together so i64::MIN stays an integer
            Token::Number(_) => {
                let sign = if negative { "-" } else { "" };
                match parse_number(&format!("{}{}", sign, self.lexer.token_text())) {
                    Some(n) => number(n),
                    None => return Err(self.unexpected("a number")),
                }
            }
            Token::Ident(word) if word == "Infinity" => {
                Variant::Real(if negative { f64::NEG_INFINITY } else { f64::INFINITY })
            }
            Token::Ident(word) if word == "NaN" => Variant::Real(f64::NAN),
            _ => return Err(self.unexpected("a number")),
        };
        self.advance();
        Ok(value)
    }

    fn parse_array(&mut self, depth: usize) -> RtResult<Variant> {
        self.advance();
        let mut items = Vec::new();
        while !self.check(&Token::RBracket) {
            items.push(self.parse_value(depth + 1)?);
            if !self.check(&Token::Comma) {
                break;
            }
            self.advance();
        }
        self.expect(Token::RBracket, "']'")?;
        self.engine.new_array(items)
    }

    fn parse_dictionary(&mut self, depth: usize) -> RtResult<Variant> {
        self.advance();
        let mut entries = Vec::new();
        while !self.check(&Token::RBracket) {
            let key = self.parse_value(depth + 1)?.stringify(self.engine)?;
            self.expect(Token::Arrow, "'=>'")?;
            let value = self.parse_value(depth + 1)?;
            entries.push((key, value));
            if !self.check(&Token::Comma) {
                break;
            }
            self.advance();
        }
        self.expect(Token::RBracket, "']'")?;
        self.engine.new_dictionary(entries)
    }
}

fn number(n: ParsedNumber) -> Variant {
    match n {
        ParsedNumber::Integer(i) => Variant::Integer(i),
        ParsedNumber::Real(r) => Variant::Real(r),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::runtime::operate::Dispatch;

    fn parse(engine: &Engine, source: &str) -> Variant {
        parse_structured(engine, source).unwrap()
    }

    #[test]
    fn test_scalars() {
        let engine = Engine::new();
        assert!(parse(&engine, "void").is_void());
        assert!(parse(&engine, "null").is_null());
        assert_eq!(parse(&engine, "true"), Variant::from(true));
        assert_eq!(parse(&engine, "-3"), Variant::from(-3));
        assert_eq!(parse(&engine, "+1.5"), Variant::from(1.5));
        assert_eq!(parse(&engine, "'x\\ty'"), Variant::from("x\ty"));
        assert_eq!(parse(&engine, "-Infinity"), Variant::from(f64::NEG_INFINITY));
        assert!(parse(&engine, "NaN").to_real().is_nan());
    }

    #[test]
    fn test_containers_with_trailing_comma() {
        let engine = Engine::new();
        let value = parse(&engine, "[1, %[\"k\" => [true,], 2 => 'two',], ]");
        assert_eq!(value.get_property(&engine, "count").unwrap(), Variant::from(2));
        let dict = value.index_get(&engine, Variant::from(1)).unwrap();
        assert_eq!(dict.index_get(&engine, Variant::from("2")).unwrap(), Variant::from("two"));
        let inner = dict.index_get(&engine, Variant::from("k")).unwrap();
        assert_eq!(inner.index_get(&engine, Variant::from(0)).unwrap(), Variant::from(true));
    }

    #[test]
    fn test_reads_back_structured_output() {
        let engine = Engine::new();
        let dict = engine
            .new_dictionary(vec![
                (RString::from("name"), Variant::from("a\"b\n\u{1}")),
                (RString::from("ratio"), Variant::from(0.25)),
                (RString::from("big"), Variant::from(1e300)),
            ])
            .unwrap();
        let original = engine
            .new_array(vec![
                Variant::from(1),
                Variant::Null,
                Variant::Void,
                dict,
                Variant::from(-2.0),
                Variant::from(i64::MIN),
                Variant::from(i64::MAX),
            ])
            .unwrap();
        let text = engine.to_structured(&original).unwrap();
        let copy = parse_structured(&engine, &text.to_string()).unwrap();
        assert_eq!(copy.get_property(&engine, "count").unwrap(), Variant::from(7));
        assert!(copy.index_get(&engine, Variant::from(1)).unwrap().is_null());
        assert!(copy.index_get(&engine, Variant::from(2)).unwrap().is_void());
        assert_eq!(copy.index_get(&engine, Variant::from(4)).unwrap(), Variant::from(-2.0));
        assert_eq!(copy.index_get(&engine, Variant::from(5)).unwrap(), Variant::from(i64::MIN));
        assert_eq!(copy.index_get(&engine, Variant::from(6)).unwrap(), Variant::from(i64::MAX));

        let copied = copy.index_get(&engine, Variant::from(3)).unwrap();
        assert_eq!(copied.get_property(&engine, "count").unwrap(), Variant::from(3));
        let expected = [
            ("name", Variant::from("a\"b\n\u{1}")),
            ("ratio", Variant::from(0.25)),
            ("big", Variant::from(1e300)),
        ];
        for (key, value) in expected {
            assert_eq!(copied.index_get(&engine, Variant::from(key)).unwrap(), value);
        }

        let nested = parse(&engine, "[[1, [2.5, 'x']], []]");
        let text = engine.to_structured(&nested).unwrap();
        let again = parse_structured(&engine, &text.to_string()).unwrap();
        assert_eq!(engine.to_structured(&again).unwrap(), text);
    }

    #[test]
    fn test_recursion_marker_reads_as_null() {
        let engine = Engine::new();
        let value = parse(&engine, "[\n 1,\n null /* object recursion detected */\n]");
        assert!(value.index_get(&engine, Variant::from(1)).unwrap().is_null());
    }

    #[test]
    fn test_errors_report_position() {
        let engine = Engine::new();
        let err = parse_structured(&engine, "[1, 2").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Compile);
        assert!(err.message().to_string().ends_with("at 5"));

        let err = parse_structured(&engine, "%[\"a\" 1]").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Compile);
        assert!(err.message().to_string().contains("'=>'"));

        assert!(parse_structured(&engine, "1 2").is_err());
        assert!(parse_structured(&engine, "undefined").is_err());
        assert!(parse_structured(&engine, "").is_err());
    }
}

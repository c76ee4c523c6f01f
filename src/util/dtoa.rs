//! Number <-> text conversion
//!
//! Reals are always rendered so that they read back as reals: the output
//! carries a decimal point or an exponent, and the non-finite values use the
//! `NaN` / `Infinity` spellings the structured-data parser understands.

/// Result of parsing a numeric literal
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedNumber {
    Integer(i64),
    Real(f64),
}

/// Convert a real to its canonical string form
pub fn real_to_string(val: f64) -> String {
    if val.is_nan() {
        "NaN".to_string()
    } else if val.is_infinite() {
        if val > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else {
        // Debug formatting is the shortest round-trip form and keeps ".0"
        format!("{:?}", val)
    }
}

/// Parse a numeric string
///
/// Accepts optional surrounding whitespace, a sign, decimal and `0x`
/// hexadecimal integers, decimal reals with fraction and/or exponent, and
/// the words `NaN` and `Infinity`. Integers that overflow 64 bits are
/// returned as reals. Returns None if the text is not a number.
pub fn parse_number(text: &str) -> Option<ParsedNumber> {
    let text = text.trim();
    let (negative, body) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    if body.is_empty() {
        return None;
    }

    let sign = if negative { -1.0 } else { 1.0 };
    match body {
        "NaN" => return Some(ParsedNumber::Real(f64::NAN)),
        "Infinity" => return Some(ParsedNumber::Real(sign * f64::INFINITY)),
        _ => {}
    }

    if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        let magnitude = u64::from_str_radix(hex, 16).ok()?;
        let val = magnitude as i64;
        return Some(ParsedNumber::Integer(if negative { val.wrapping_neg() } else { val }));
    }

    if !body.bytes().next().is_some_and(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }

    let is_real = body.bytes().any(|b| matches!(b, b'.' | b'e' | b'E'));
    if !is_real {
        if !body.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        // The magnitude of i64::MIN is one past i64::MAX
        let integer = body.parse::<u64>().ok().and_then(|magnitude| match negative {
            true if magnitude <= 1 << 63 => Some((magnitude as i64).wrapping_neg()),
            true => None,
            false => i64::try_from(magnitude).ok(),
        });
        return match integer {
            Some(v) => Some(ParsedNumber::Integer(v)),
            None => body.parse::<f64>().ok().map(|v| ParsedNumber::Real(sign * v)),
        };
    }

    body.parse::<f64>().ok().map(|v| ParsedNumber::Real(sign * v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_to_string() {
        assert_eq!(real_to_string(1.0), "1.0");
        assert_eq!(real_to_string(0.5), "0.5");
        assert_eq!(real_to_string(-2.25), "-2.25");
        assert_eq!(real_to_string(f64::NAN), "NaN");
        assert_eq!(real_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_parse_integers() {
        assert_eq!(parse_number("42"), Some(ParsedNumber::Integer(42)));
        assert_eq!(parse_number(" -7 "), Some(ParsedNumber::Integer(-7)));
        assert_eq!(parse_number("0x1F"), Some(ParsedNumber::Integer(31)));
        assert_eq!(
            parse_number("99999999999999999999"),
            Some(ParsedNumber::Real(1e20))
        );
    }

    #[test]
    fn test_parse_integer_limits() {
        assert_eq!(
            parse_number("-9223372036854775808"),
            Some(ParsedNumber::Integer(i64::MIN))
        );
        assert_eq!(
            parse_number("9223372036854775807"),
            Some(ParsedNumber::Integer(i64::MAX))
        );
        assert_eq!(
            parse_number("9223372036854775808"),
            Some(ParsedNumber::Real(9223372036854775808.0))
        );
        assert_eq!(
            parse_number("-9223372036854775809"),
            Some(ParsedNumber::Real(-9223372036854775809.0))
        );
    }

    #[test]
    fn test_parse_reals() {
        assert_eq!(parse_number("1.5"), Some(ParsedNumber::Real(1.5)));
        assert_eq!(parse_number("2e3"), Some(ParsedNumber::Real(2000.0)));
        assert_eq!(parse_number(".25"), Some(ParsedNumber::Real(0.25)));
        assert_eq!(
            parse_number("-Infinity"),
            Some(ParsedNumber::Real(f64::NEG_INFINITY))
        );
        assert!(matches!(parse_number("NaN"), Some(ParsedNumber::Real(v)) if v.is_nan()));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("12abc"), None);
        assert_eq!(parse_number("-"), None);
    }

    #[test]
    fn test_real_round_trip() {
        for v in [0.1, 1.0, 123456.789, 1e300, -3.5e-7] {
            assert_eq!(parse_number(&real_to_string(v)), Some(ParsedNumber::Real(v)));
        }
    }
}

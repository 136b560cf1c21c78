// src/grammar/char_support.rs
// Grammar literal decoding and char rendering shared by the front-end,
// the lexer factory and the dump formats.

use crate::atn::{IntervalSet, MAX_CHAR_VALUE, MIN_CHAR_VALUE};

fn escaped_char_value(c: char) -> Option<i32> {
    Some(match c {
        'n' => '\n' as i32,
        'r' => '\r' as i32,
        't' => '\t' as i32,
        'b' => 0x08,
        'f' => 0x0C,
        '\\' => '\\' as i32,
        _ => return None,
    })
}

fn char_escape(c: i32) -> Option<&'static str> {
    Some(match c {
        0x0A => "\\n",
        0x0D => "\\r",
        0x09 => "\\t",
        0x08 => "\\b",
        0x0C => "\\f",
        0x5C => "\\\\",
        _ => return None,
    })
}

#[inline]
fn is_printable_basic_latin(c: i32) -> bool {
    (0x20..0x7F).contains(&c)
}

/// `'x'`-style literal for a code point, the way grammars spell it.
pub fn char_literal(c: i32) -> String {
    if c < MIN_CHAR_VALUE {
        return "'<INVALID>'".to_string();
    }
    if let Some(esc) = char_escape(c) {
        return format!("'{esc}'");
    }
    if is_printable_basic_latin(c) {
        return match c {
            0x27 => "'\\''".to_string(),
            _ => format!("'{}'", c as u8 as char),
        };
    }
    if c <= 0xFFFF {
        format!("'\\u{c:04X}'")
    } else {
        format!("'\\u{{{c:06X}}}'")
    }
}

/// Char name used by the serialized-ATN describer: BMP values get a quoted
/// form, anything else is left numeric.
pub fn describer_char_name(c: i32) -> Option<String> {
    if !(0..=0xFFFF).contains(&c) {
        return None;
    }
    Some(match c {
        0x0A => "'\\n'".to_string(),
        0x0D => "'\\r'".to_string(),
        0x09 => "'\\t'".to_string(),
        0x08 => "'\\b'".to_string(),
        0x0C => "'\\f'".to_string(),
        0x5C => "'\\\\'".to_string(),
        0x27 => "'\\''".to_string(),
        _ if is_printable_basic_latin(c) => format!("'{}'", c as u8 as char),
        _ => format!("'\\u{c:04X}'"),
    })
}

pub fn range_escaped(a: i32, b: i32) -> String {
    if a == b {
        char_literal(a)
    } else {
        format!("{}..{}", char_literal(a), char_literal(b))
    }
}

pub fn interval_set_escaped(set: &IntervalSet) -> String {
    set.intervals()
        .iter()
        .map(|iv| range_escaped(iv.a, iv.b))
        .collect::<Vec<_>>()
        .join(" | ")
}

fn parse_hex(s: &str) -> Option<i32> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    i32::from_str_radix(s, 16).ok()
}

/// Value of the text between the quotes of a one-char literal, or -1.
pub fn char_value_in_literal(body: &str) -> i32 {
    let chars: Vec<char> = body.chars().collect();
    match chars.as_slice() {
        [c] => *c as i32,
        ['\\', '\''] => '\'' as i32,
        ['\\', c] => escaped_char_value(*c).unwrap_or(-1),
        ['\\', 'u', '{', ..] => match body[3..].find('}') {
            Some(end) => parse_hex(&body[3..3 + end]).unwrap_or(-1),
            None => -1,
        },
        ['\\', 'u', ..] if chars.len() == 6 => parse_hex(&body[2..]).unwrap_or(-1),
        _ => -1,
    }
}

/// `'a'` to 97; -1 for multi-char or malformed literals.
pub fn char_value_from_literal(literal: &str) -> i32 {
    if literal.chars().count() < 3 {
        return -1;
    }
    match strip_quotes(literal) {
        Some(body) => char_value_in_literal(body),
        None => -1,
    }
}

fn strip_quotes(literal: &str) -> Option<&str> {
    literal.strip_prefix('\'')?.strip_suffix('\'')
}

/// Decodes a quoted string literal; `None` on a malformed escape.
pub fn string_from_literal(literal: &str) -> Option<String> {
    let body = strip_quotes(literal)?;
    let chars: Vec<char> = body.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        let mut end = i + 1;
        if chars[i] == '\\' {
            end = i + 2;
            if chars.get(i + 1) == Some(&'u') {
                if chars.get(i + 2) == Some(&'{') {
                    end = i + 3;
                    loop {
                        let c = *chars.get(end)?;
                        end += 1;
                        if c == '}' {
                            break;
                        }
                        if !c.is_ascii_hexdigit() {
                            return None;
                        }
                    }
                } else {
                    end = i + 6;
                    if end > chars.len() || !chars[i + 2..end].iter().all(char::is_ascii_hexdigit) {
                        return None;
                    }
                }
            }
        }
        if end > chars.len() {
            return None;
        }
        let esc: String = chars[i..end].iter().collect();
        let c = char_value_in_literal(&esc);
        out.push(char::from_u32(u32::try_from(c).ok()?)?);
        i = end;
    }
    Some(out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Escape {
    /// Offending text.
    Invalid(String),
    CodePoint(i32),
    Property(IntervalSet),
}

/// Parses the escape starting at `chars[start]` (a backslash) inside a char
/// set body; returns the escape and how many chars it spans.
pub fn parse_escape(chars: &[char], start: usize) -> (Escape, usize) {
    let invalid = |stop: usize| {
        let stop = stop.min(chars.len().saturating_sub(1));
        let text: String = chars[start..=stop.max(start)].iter().collect();
        (Escape::Invalid(text), stop.max(start) - start + 1)
    };
    if start + 2 > chars.len() || chars[start] != '\\' {
        return invalid(chars.len().saturating_sub(1));
    }
    let mut offset = start + 1;
    let escaped = chars[offset];
    offset += 1;
    match escaped {
        'u' => {
            if offset + 3 > chars.len() {
                return invalid(chars.len() - 1);
            }
            let (hex_start, hex_end) = if chars[offset] == '{' {
                let Some(close) = chars[offset + 1..].iter().position(|&c| c == '}') else {
                    return invalid(chars.len() - 1);
                };
                let close = offset + 1 + close;
                let r = (offset + 1, close);
                offset = close + 1;
                r
            } else {
                if offset + 4 > chars.len() {
                    return invalid(chars.len() - 1);
                }
                let r = (offset, offset + 4);
                offset += 4;
                r
            };
            let hex: String = chars[hex_start..hex_end].iter().collect();
            match parse_hex(&hex) {
                Some(v) if v <= MAX_CHAR_VALUE => (Escape::CodePoint(v), offset - start),
                _ => invalid(start + 5),
            }
        }
        'p' | 'P' => {
            if offset + 3 > chars.len() {
                return invalid(chars.len() - 1);
            }
            if chars[offset] != '{' {
                return invalid(offset);
            }
            let Some(close) = chars[offset..].iter().position(|&c| c == '}') else {
                return invalid(chars.len() - 1);
            };
            let close = offset + close;
            let name: String = chars[offset + 1..close].iter().collect();
            let Some(mut set) = unicode_property(&name) else {
                return invalid(close);
            };
            if escaped == 'P' {
                set = set.complement(MIN_CHAR_VALUE, MAX_CHAR_VALUE);
            }
            (Escape::Property(set), close + 1 - start)
        }
        ']' | '-' => (Escape::CodePoint(escaped as i32), offset - start),
        c => match escaped_char_value(c) {
            Some(v) => (Escape::CodePoint(v), offset - start),
            None => invalid(start + 1),
        },
    }
}

/// Built-in property table for `\p{..}`.
pub fn unicode_property(name: &str) -> Option<IntervalSet> {
    let ranges: &[(i32, i32)] = match name {
        "ASCII" => &[(0, 127)],
        "Any" => &[(MIN_CHAR_VALUE, MAX_CHAR_VALUE)],
        "ASCII_Hex_Digit" | "AHex" => &[(48, 57), (65, 70), (97, 102)],
        "Hex_Digit" | "Hex" => &[
            (48, 57),
            (65, 70),
            (97, 102),
            (65296, 65305),
            (65313, 65318),
            (65345, 65350),
        ],
        "Digit" | "Nd" => &[(48, 57)],
        "Gothic" => &[(66352, 66378)],
        "Mahajani" => &[(69968, 70006)],
        _ => return None,
    };
    let mut set = IntervalSet::new();
    for &(a, b) in ranges {
        set.add_range(a, b);
    }
    Some(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_literal_values() {
        assert_eq!(char_value_from_literal("'a'"), 97);
        assert_eq!(char_value_from_literal("'\\n'"), 10);
        assert_eq!(char_value_from_literal("'\\''"), 39);
        assert_eq!(char_value_from_literal("'\\uABCD'"), 0xABCD);
        assert_eq!(char_value_from_literal("'\\u{10ABCD}'"), 0x10ABCD);
        assert_eq!(char_value_from_literal("'ab'"), -1);
        assert_eq!(char_value_from_literal("''"), -1);
    }

    #[test]
    fn string_literals_decode_escapes() {
        assert_eq!(string_from_literal("'a\\tb'").as_deref(), Some("a\tb"));
        assert_eq!(string_from_literal("'\\u{1F4A9}'").as_deref(), Some("\u{1F4A9}"));
        assert_eq!(string_from_literal("'\\q'"), None);
        assert_eq!(string_from_literal("''").as_deref(), Some(""));
    }

    #[test]
    fn rendering() {
        assert_eq!(char_literal('a' as i32), "'a'");
        assert_eq!(char_literal('\n' as i32), "'\\n'");
        assert_eq!(char_literal(0xFFFC), "'\\uFFFC'");
        assert_eq!(char_literal(0x1F4A9), "'\\u{01F4A9}'");
        assert_eq!(describer_char_name(0x1F4A9), None);
    }

    #[test]
    fn property_escape_complements() {
        let chars: Vec<char> = "\\P{Gothic}".chars().collect();
        let (esc, len) = parse_escape(&chars, 0);
        assert_eq!(len, chars.len());
        let Escape::Property(set) = esc else { panic!("expected property") };
        assert_eq!(set.to_string(), "{0..66351, 66379..1114111}");
    }
}

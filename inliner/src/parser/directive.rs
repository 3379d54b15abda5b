use crate::MARKER;
use crate::parser::error::ParseError;
use crate::token::Param;

/// A single directive call as written: `$inline.method(params)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDirective {
    /// The `.method` suffix, if any.
    pub method: Option<String>,
    pub params: Vec<Param>,
    /// Byte offset just past the call.
    pub end: usize,
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.text[self.pos..].chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    /// Skip whitespace and `//` / `/* */` comments.
    fn skip_trivia(&mut self) {
        loop {
            match (self.peek(), self.peek_second()) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => {
                    match self.text[self.pos + 2..].find("*/") {
                        Some(close) => self.pos += 2 + close + 2,
                        None => self.pos = self.text.len(),
                    }
                }
                _ => return,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse the directive call starting at `pos`, which must point at the marker.
pub fn parse_directive(text: &str, pos: usize) -> Result<RawDirective, ParseError> {
    let mut cursor = Cursor {
        text,
        pos: pos + MARKER.len(),
    };

    let mut method = None;
    if cursor.eat('.') {
        let start = cursor.pos;
        while matches!(cursor.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            cursor.bump();
        }
        if start == cursor.pos {
            let got = cursor.peek().map(String::from).unwrap_or_default();
            return Err(ParseError::at(
                format!("Expecting $inline method but got \"{}\"", got),
                start,
            ));
        }
        method = Some(text[start..cursor.pos].to_string());
    }

    if !cursor.eat('(') {
        return Ok(RawDirective {
            method,
            params: Vec::new(),
            end: cursor.pos,
        });
    }

    let mut params = Vec::new();
    let mut need_value = true;
    loop {
        cursor.skip_trivia();
        let value_start = cursor.pos;
        match cursor.peek() {
            None => return Err(ParseError::at("Missing right parenthesis", text.len())),
            Some(')') => {
                cursor.bump();
                break;
            }
            Some(',') => {
                if need_value {
                    return Err(ParseError::at("Missing value", value_start));
                }
                cursor.bump();
                need_value = true;
            }
            Some(c) => {
                if !need_value {
                    return Err(ParseError::at("Missing comma between values", value_start));
                }
                let value = match c {
                    '\'' | '"' | '`' => Param::String(parse_string(&mut cursor)?),
                    '0'..='9' => Param::Number(parse_number(&mut cursor)?),
                    '.' if matches!(cursor.peek_second(), Some('0'..='9')) => {
                        Param::Number(parse_number(&mut cursor)?)
                    }
                    _ => {
                        return Err(ParseError::at(
                            "Value must be number or string",
                            value_start,
                        ));
                    }
                };
                params.push(value);
                need_value = false;
            }
        }
    }

    Ok(RawDirective {
        method,
        params,
        end: cursor.pos,
    })
}

// ---------------------------------------------------------------------------
// Literals
// ---------------------------------------------------------------------------

/// Parse a quoted string. All three quote styles produce the same value; only
/// backtick strings may span lines.
fn parse_string(cursor: &mut Cursor<'_>) -> Result<String, ParseError> {
    let start = cursor.pos;
    let quote = cursor.bump().unwrap_or('"');
    let mut value = String::new();

    loop {
        let Some(c) = cursor.bump() else {
            return Err(ParseError::new("Unclosed string", start..cursor.pos));
        };
        match c {
            c if c == quote => return Ok(value),
            '\n' if quote != '`' => {
                return Err(ParseError::new("Unclosed string", start..cursor.pos - 1));
            }
            '\\' => {
                let Some(escaped) = cursor.bump() else {
                    return Err(ParseError::new("Unclosed string", start..cursor.pos));
                };
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    'b' => value.push('\u{8}'),
                    'f' => value.push('\u{c}'),
                    'v' => value.push('\u{b}'),
                    '0' => value.push('\0'),
                    'u' => value.push(parse_unicode_escape(cursor)?),
                    // Line continuation
                    '\n' => {}
                    other => value.push(other),
                }
            }
            other => value.push(other),
        }
    }
}

fn parse_unicode_escape(cursor: &mut Cursor<'_>) -> Result<char, ParseError> {
    let text = cursor.text;
    let start = cursor.pos;
    let digits = if cursor.eat('{') {
        let digits_start = cursor.pos;
        while matches!(cursor.peek(), Some(c) if c.is_ascii_hexdigit()) {
            cursor.bump();
        }
        let digits = &text[digits_start..cursor.pos];
        if !cursor.eat('}') {
            return Err(ParseError::new("Invalid unicode escape", start..cursor.pos));
        }
        digits
    } else {
        for _ in 0..4 {
            if !matches!(cursor.peek(), Some(c) if c.is_ascii_hexdigit()) {
                return Err(ParseError::new("Invalid unicode escape", start..cursor.pos));
            }
            cursor.bump();
        }
        &text[start..cursor.pos]
    };

    u32::from_str_radix(digits, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| ParseError::new("Invalid unicode escape", start..cursor.pos))
}

fn parse_number(cursor: &mut Cursor<'_>) -> Result<f64, ParseError> {
    let start = cursor.pos;
    let text = cursor.text;

    if cursor.peek() == Some('0') && matches!(cursor.peek_second(), Some('x' | 'X')) {
        cursor.pos += 2;
        let digits_start = cursor.pos;
        while matches!(cursor.peek(), Some(c) if c.is_ascii_hexdigit()) {
            cursor.bump();
        }
        return u64::from_str_radix(&text[digits_start..cursor.pos], 16)
            .map(|n| n as f64)
            .map_err(|_| ParseError::new("Invalid number", start..cursor.pos));
    }

    while matches!(cursor.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
        cursor.bump();
    }
    if matches!(cursor.peek(), Some('e' | 'E')) {
        cursor.bump();
        if matches!(cursor.peek(), Some('+' | '-')) {
            cursor.bump();
        }
        while matches!(cursor.peek(), Some(c) if c.is_ascii_digit()) {
            cursor.bump();
        }
    }

    text[start..cursor.pos]
        .parse::<f64>()
        .map_err(|_| ParseError::new("Invalid number", start..cursor.pos))
}

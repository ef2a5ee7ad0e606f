//! Recursive-descent JSON parser
//!
//! Covers the subset the control channel emits, no more:
//!
//! - strings have **no escape processing**: a literal `"` always ends
//!   the string. A payload field containing an embedded quote would
//!   silently consume the wrong span, so the limitation is intentional
//!   and documented rather than half-fixed;
//! - numbers are 64-bit integers (signed if prefixed with `-`), no
//!   floats, no exponents;
//! - nesting depth is capped at [`MAX_DEPTH`] to bound stack use
//!   against adversarial input.
//!
//! Any unexpected character or missing closing delimiter is a fatal
//! [`ProtoError::Parse`]; the caller never sees a partial result.

use crate::error::ProtoError;
use crate::json::value::{Array, Object, Value};

/// Maximum object/array nesting before parsing fails.
pub const MAX_DEPTH: usize = 256;

/// Parse a complete JSON object from `input`.
pub fn parse_object(input: &str) -> Result<Object, ProtoError> {
    Parser::new(input).object(0)
}

/// Parse a JSON document: an object or array at the top level.
pub fn parse_document(input: &str) -> Result<Value, ProtoError> {
    let mut parser = Parser::new(input);
    parser.skip_whitespace();
    match parser.peek() {
        Some(b'{') => Ok(Value::Object(parser.object(0)?)),
        Some(b'[') => Ok(Value::Array(parser.array(0)?)),
        _ => Err(ProtoError::parse("document must be an object or array")),
    }
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Parser {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn fail(&self, reason: impl std::fmt::Display) -> ProtoError {
        ProtoError::parse(format!("{reason} at byte {}", self.pos))
    }

    fn expect(&mut self, byte: u8) -> Result<(), ProtoError> {
        match self.bump() {
            Some(b) if b == byte => Ok(()),
            Some(b) => Err(self.fail(format_args!(
                "expected '{}', found '{}'",
                byte as char, b as char
            ))),
            None => Err(self.fail(format_args!("expected '{}', found end of input", byte as char))),
        }
    }

    fn object(&mut self, depth: usize) -> Result<Object, ProtoError> {
        self.skip_whitespace();
        self.expect(b'{')?;

        let mut object = Object::new();
        self.skip_whitespace();
        if self.peek() == Some(b'}') {
            self.bump();
            return Ok(object);
        }

        loop {
            self.skip_whitespace();
            let key = self.string()?;
            self.skip_whitespace();
            self.expect(b':')?;
            let value = self.value(depth)?;
            // Duplicate keys: last write wins.
            object.insert(key, value);

            if !self.comma()? {
                break;
            }
        }

        self.skip_whitespace();
        self.expect(b'}')?;
        Ok(object)
    }

    fn array(&mut self, depth: usize) -> Result<Array, ProtoError> {
        self.skip_whitespace();
        self.expect(b'[')?;

        let mut array = Array::new();
        self.skip_whitespace();
        if self.peek() == Some(b']') {
            self.bump();
            return Ok(array);
        }

        loop {
            array.push(self.value(depth)?);
            if !self.comma()? {
                break;
            }
        }

        self.skip_whitespace();
        self.expect(b']')?;
        Ok(array)
    }

    fn value(&mut self, depth: usize) -> Result<Value, ProtoError> {
        let depth = depth + 1;
        if depth > MAX_DEPTH {
            return Err(self.fail("nesting depth exceeded"));
        }

        self.skip_whitespace();
        match self.peek() {
            Some(b'{') => Ok(Value::Object(self.object(depth)?)),
            Some(b'[') => Ok(Value::Array(self.array(depth)?)),
            Some(b'"') => Ok(Value::Str(self.string()?)),
            Some(b't') => self.literal("true", Value::Bool(true)),
            Some(b'f') => self.literal("false", Value::Bool(false)),
            Some(b'n') => self.literal("null", Value::Null),
            Some(b'-') | Some(b'0'..=b'9') => self.number(),
            Some(b) => Err(self.fail(format_args!("unexpected character '{}'", b as char))),
            None => Err(self.fail("unexpected end of input")),
        }
    }

    /// A string literal. No escape processing: the next `"` always
    /// terminates.
    fn string(&mut self) -> Result<String, ProtoError> {
        self.expect(b'"')?;
        let start = self.pos;
        loop {
            match self.bump() {
                Some(b'"') => {
                    let bytes = &self.input[start..self.pos - 1];
                    return String::from_utf8(bytes.to_vec())
                        .map_err(|_| self.fail("string is not valid UTF-8"));
                }
                Some(_) => continue,
                None => return Err(self.fail("unterminated string")),
            }
        }
    }

    fn number(&mut self) -> Result<Value, ProtoError> {
        let negative = self.peek() == Some(b'-');
        if negative {
            self.bump();
        }

        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.bump();
        }
        if self.pos == start {
            return Err(self.fail("expected digits"));
        }

        // Safe: the span is digits only.
        let digits = std::str::from_utf8(&self.input[start..self.pos]).unwrap();
        if negative {
            format!("-{digits}")
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| self.fail("integer out of range"))
        } else {
            digits
                .parse::<u64>()
                .map(Value::UInt)
                .map_err(|_| self.fail("integer out of range"))
        }
    }

    fn literal(&mut self, keyword: &str, value: Value) -> Result<Value, ProtoError> {
        if self.input[self.pos..].starts_with(keyword.as_bytes()) {
            self.pos += keyword.len();
            Ok(value)
        } else {
            Err(self.fail(format_args!("expected '{keyword}'")))
        }
    }

    fn comma(&mut self) -> Result<bool, ProtoError> {
        self.skip_whitespace();
        if self.peek() == Some(b',') {
            self.bump();
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

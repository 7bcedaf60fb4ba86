//! Strict decoder for the PHP `serialize()` text form.
//!
//! Grammar handled here: `N;`, `b:0|1;`, `i:<int>;`, `d:<float>;`,
//! `s:<bytes>:"…";`, `a:<count>:{k v …}`, `O:<bytes>:"Class":<count>:{…}`.
//! String lengths are byte counts, and the decoder slices by byte, not by
//! char. Anything else (`R:`/`r:` references, `C:` custom serializables)
//! is rejected; callers treat that the same as any other malformed input.

use crate::value::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEnd(usize),

    #[error("expected {expected} at byte {offset}")]
    Unexpected {
        offset: usize,
        expected: &'static str,
    },

    #[error("invalid number at byte {0}")]
    BadNumber(usize),

    #[error("declared length overruns input at byte {0}")]
    LengthOverrun(usize),

    #[error("string at byte {0} is not valid UTF-8")]
    NonUtf8(usize),

    #[error("unsupported token '{token}' at byte {offset}")]
    Unsupported { token: char, offset: usize },

    #[error("trailing bytes after value at byte {0}")]
    TrailingData(usize),
}

/// Decode a complete serialized value. The whole input must be consumed.
pub fn decode(input: &str) -> Result<Value, DecodeError> {
    let mut parser = Parser {
        bytes: input.as_bytes(),
        pos: 0,
    };
    let value = parser.value()?;
    if parser.pos != parser.bytes.len() {
        return Err(DecodeError::TrailingData(parser.pos));
    }
    Ok(value)
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Result<u8, DecodeError> {
        self.bytes
            .get(self.pos)
            .copied()
            .ok_or(DecodeError::UnexpectedEnd(self.pos))
    }

    fn expect(&mut self, literal: &'static [u8], expected: &'static str) -> Result<(), DecodeError> {
        let end = self.pos + literal.len();
        if end > self.bytes.len() {
            return Err(DecodeError::UnexpectedEnd(self.bytes.len()));
        }
        if &self.bytes[self.pos..end] != literal {
            return Err(DecodeError::Unexpected {
                offset: self.pos,
                expected,
            });
        }
        self.pos = end;
        Ok(())
    }

    fn value(&mut self) -> Result<Value, DecodeError> {
        match self.peek()? {
            b'N' => {
                self.expect(b"N;", "N;")?;
                Ok(Value::Null)
            }
            b'b' => self.bool_value(),
            b'i' => self.int_value(),
            b'd' => self.float_value(),
            b's' => Ok(Value::Str(self.quoted(b"s:")?)),
            b'a' => self.array_value(),
            b'O' => self.object_value(),
            other => Err(DecodeError::Unsupported {
                token: other as char,
                offset: self.pos,
            }),
        }
    }

    fn bool_value(&mut self) -> Result<Value, DecodeError> {
        self.expect(b"b:", "b:")?;
        let flag = match self.peek()? {
            b'0' => false,
            b'1' => true,
            _ => {
                return Err(DecodeError::Unexpected {
                    offset: self.pos,
                    expected: "0 or 1",
                })
            }
        };
        self.pos += 1;
        self.expect(b";", ";")?;
        Ok(Value::Bool(flag))
    }

    fn int_value(&mut self) -> Result<Value, DecodeError> {
        self.expect(b"i:", "i:")?;
        let start = self.pos;
        if self.peek()? == b'-' {
            self.pos += 1;
        }
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos])
            .map_err(|_| DecodeError::BadNumber(start))?;
        let value: i64 = text.parse().map_err(|_| DecodeError::BadNumber(start))?;
        self.expect(b";", ";")?;
        Ok(Value::Int(value))
    }

    fn float_value(&mut self) -> Result<Value, DecodeError> {
        self.expect(b"d:", "d:")?;
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b';' {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(DecodeError::BadNumber(start));
        }
        let raw = &self.bytes[start..self.pos];
        // PHP emits digits, sign, dot, exponent, or INF/NAN.
        let plausible = raw.iter().all(|b| {
            matches!(b, b'0'..=b'9' | b'+' | b'-' | b'.' | b'e' | b'E' | b'I' | b'N' | b'F' | b'A')
        });
        if !plausible {
            return Err(DecodeError::BadNumber(start));
        }
        let text = std::str::from_utf8(raw).map_err(|_| DecodeError::NonUtf8(start))?;
        self.expect(b";", ";")?;
        Ok(Value::Float(text.to_string()))
    }

    fn length(&mut self) -> Result<usize, DecodeError> {
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(DecodeError::BadNumber(start));
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos])
            .map_err(|_| DecodeError::BadNumber(start))?;
        text.parse().map_err(|_| DecodeError::BadNumber(start))
    }

    /// Reads `<tag><len>:"<len bytes>"`, the shape of both string values
    /// and class names.
    fn quoted(&mut self, tag: &'static [u8]) -> Result<String, DecodeError> {
        self.expect(tag, "type tag")?;
        let len = self.length()?;
        self.expect(b":\"", ":\"")?;
        let start = self.pos;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(DecodeError::LengthOverrun(start))?;
        let text = std::str::from_utf8(&self.bytes[start..end])
            .map_err(|_| DecodeError::NonUtf8(start))?
            .to_string();
        self.pos = end;
        self.expect(b"\";", "\";")?;
        Ok(text)
    }

    fn array_value(&mut self) -> Result<Value, DecodeError> {
        self.expect(b"a:", "a:")?;
        let count = self.length()?;
        self.expect(b":{", ":{")?;
        Ok(Value::Array(self.entries(count)?))
    }

    fn object_value(&mut self) -> Result<Value, DecodeError> {
        self.expect(b"O:", "O:")?;
        let len = self.length()?;
        self.expect(b":\"", ":\"")?;
        let start = self.pos;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(DecodeError::LengthOverrun(start))?;
        let class = std::str::from_utf8(&self.bytes[start..end])
            .map_err(|_| DecodeError::NonUtf8(start))?
            .to_string();
        self.pos = end;
        self.expect(b"\":", "\":")?;
        let count = self.length()?;
        self.expect(b":{", ":{")?;
        Ok(Value::Object {
            class,
            entries: self.entries(count)?,
        })
    }

    fn entries(&mut self, count: usize) -> Result<Vec<(Value, Value)>, DecodeError> {
        // The count comes from untrusted input; cap the preallocation.
        let mut entries = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            let key = self.value()?;
            let value = self.value()?;
            entries.push((key, value));
        }
        self.expect(b"}", "}")?;
        Ok(entries)
    }
}

//! Incremental reader for one array field of a top-level JSON object.
//!
//! The input is never loaded whole: the reader skips ahead to the named
//! array and then hands out the raw bytes of one element at a time, which
//! the caller decodes with `serde_json`. Only the element being returned is
//! held in memory. Skipped values are still checked to be valid JSON, and
//! the rest of the object after the array must be well formed.

use anyhow::{anyhow, Result};
use serde::de::IgnoredAny;
use std::io::BufRead;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayState {
    First,
    Next,
    Done,
}

pub struct JsonArrayStream<R: BufRead> {
    reader: R,
    /// Bytes consumed so far, for error positions.
    offset: u64,
    state: ArrayState,
}

impl<R: BufRead> JsonArrayStream<R> {
    /// Position the stream at the first element of the first field whose
    /// name is in `fields`. Other fields before it are skipped.
    pub fn open(reader: R, fields: &[&str]) -> Result<Self> {
        let mut stream = Self {
            reader,
            offset: 0,
            state: ArrayState::First,
        };

        stream.skip_whitespace()?;
        if stream.peek()? != Some(b'{') {
            return Err(anyhow!("expected JSON object at byte {}", stream.offset));
        }
        stream.bump();

        let missing = || anyhow!("{} field not found in JSON", fields.first().copied().unwrap_or("array"));
        loop {
            stream.skip_whitespace()?;
            match stream.peek()? {
                Some(b'}') | None => return Err(missing()),
                Some(b'"') => {}
                Some(other) => {
                    return Err(anyhow!(
                        "unexpected character {:?} at byte {}",
                        other as char,
                        stream.offset
                    ))
                }
            }

            let key = stream.read_key()?;
            if fields.contains(&key.as_str()) {
                if stream.peek()? != Some(b'[') {
                    return Err(anyhow!("{} must be an array", key));
                }
                stream.bump();
                return Ok(stream);
            }

            stream.skip_value()?;
            stream.skip_whitespace()?;
            match stream.next_byte()? {
                Some(b',') => {}
                Some(b'}') | None => return Err(missing()),
                Some(other) => {
                    return Err(anyhow!(
                        "expected ',' or '}}' at byte {}, found {:?}",
                        stream.offset,
                        other as char
                    ))
                }
            }
        }
    }

    /// Raw bytes of the next array element, or `None` after the closing `]`.
    pub fn next_raw(&mut self) -> Result<Option<Vec<u8>>> {
        match self.state {
            ArrayState::Done => return Ok(None),
            ArrayState::First => {
                self.skip_whitespace()?;
                if self.peek()? == Some(b']') {
                    self.bump();
                    self.state = ArrayState::Done;
                    self.finish_object()?;
                    return Ok(None);
                }
            }
            ArrayState::Next => {
                self.skip_whitespace()?;
                match self.next_byte()? {
                    Some(b',') => {}
                    Some(b']') => {
                        self.state = ArrayState::Done;
                        self.finish_object()?;
                        return Ok(None);
                    }
                    Some(other) => {
                        return Err(anyhow!(
                            "expected ',' or ']' at byte {}, found {:?}",
                            self.offset,
                            other as char
                        ))
                    }
                    None => return Err(anyhow!("unexpected end of input inside array")),
                }
            }
        }

        self.skip_whitespace()?;
        let mut raw = Vec::new();
        self.capture_value(&mut raw)?;
        self.state = ArrayState::Next;
        Ok(Some(raw))
    }

    /// Read the fields that follow the array up to the closing `}`, then
    /// require the input to end.
    fn finish_object(&mut self) -> Result<()> {
        loop {
            self.skip_whitespace()?;
            match self.next_byte()? {
                Some(b'}') => break,
                Some(b',') => {
                    self.skip_whitespace()?;
                    self.read_key()?;
                    self.skip_value()?;
                }
                Some(other) => {
                    return Err(anyhow!(
                        "expected ',' or '}}' at byte {}, found {:?}",
                        self.offset,
                        other as char
                    ))
                }
                None => return Err(anyhow!("unexpected end of input: object not closed")),
            }
        }

        self.skip_whitespace()?;
        match self.peek()? {
            None => Ok(()),
            Some(b) => Err(anyhow!(
                "trailing characters after JSON object at byte {}: {:?}",
                self.offset,
                b as char
            )),
        }
    }

    /// Read `"name":` and position at the value.
    fn read_key(&mut self) -> Result<String> {
        if self.peek()? != Some(b'"') {
            return Err(anyhow!("expected object key at byte {}", self.offset));
        }
        let mut raw_key = Vec::new();
        self.capture_value(&mut raw_key)?;
        let key: String = serde_json::from_slice(&raw_key)
            .map_err(|e| anyhow!("invalid object key at byte {}: {}", self.offset, e))?;

        self.skip_whitespace()?;
        self.expect(b':')?;
        self.skip_whitespace()?;
        Ok(key)
    }

    /// Consume one value, checking that it is valid JSON.
    fn skip_value(&mut self) -> Result<()> {
        let start = self.offset;
        let mut raw = Vec::new();
        self.capture_value(&mut raw)?;
        serde_json::from_slice::<IgnoredAny>(&raw)
            .map_err(|e| anyhow!("invalid JSON value at byte {}: {}", start, e))?;
        Ok(())
    }

    /// Bytes consumed from the underlying reader.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn peek(&mut self) -> Result<Option<u8>> {
        let buf = self.reader.fill_buf()?;
        Ok(buf.first().copied())
    }

    fn bump(&mut self) {
        self.reader.consume(1);
        self.offset += 1;
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        let b = self.peek()?;
        if b.is_some() {
            self.bump();
        }
        Ok(b)
    }

    fn expect(&mut self, want: u8) -> Result<()> {
        match self.next_byte()? {
            Some(b) if b == want => Ok(()),
            Some(b) => Err(anyhow!(
                "expected {:?} at byte {}, found {:?}",
                want as char,
                self.offset,
                b as char
            )),
            None => Err(anyhow!("expected {:?}, found end of input", want as char)),
        }
    }

    fn skip_whitespace(&mut self) -> Result<()> {
        loop {
            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                return Ok(());
            }
            let n = buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
            let exhausted = n == buf.len();
            self.reader.consume(n);
            self.offset += n as u64;
            if !exhausted {
                return Ok(());
            }
        }
    }

    /// Copy one complete value into `out`. Strings and containers are
    /// delimited by tracking nesting and string escapes; scalars end at the
    /// next structural character. The bytes are not validated here.
    fn capture_value(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let start = self.offset;
        match self.peek()? {
            None => return Err(anyhow!("unexpected end of input at byte {}", start)),
            Some(b'{') | Some(b'[') | Some(b'"') => {}
            Some(_) => return self.capture_scalar(out),
        }

        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        loop {
            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                return Err(anyhow!(
                    "unexpected end of input in value starting at byte {}",
                    start
                ));
            }

            let mut used = 0;
            let mut complete = false;
            for &b in buf {
                used += 1;
                if in_string {
                    if escaped {
                        escaped = false;
                    } else if b == b'\\' {
                        escaped = true;
                    } else if b == b'"' {
                        in_string = false;
                    }
                } else {
                    match b {
                        b'"' => in_string = true,
                        b'{' | b'[' => depth += 1,
                        b'}' | b']' => {
                            depth = depth.checked_sub(1).ok_or_else(|| {
                                anyhow!("unbalanced {:?} in value starting at byte {}", b as char, start)
                            })?;
                        }
                        _ => {}
                    }
                }
                if depth == 0 && !in_string {
                    complete = true;
                    break;
                }
            }

            out.extend_from_slice(&buf[..used]);
            self.reader.consume(used);
            self.offset += used as u64;
            if complete {
                return Ok(());
            }
        }
    }

    fn capture_scalar(&mut self, out: &mut Vec<u8>) -> Result<()> {
        loop {
            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                return Ok(());
            }
            let n = buf
                .iter()
                .take_while(|b| !matches!(b, b',' | b'}' | b']') && !b.is_ascii_whitespace())
                .count();
            let exhausted = n == buf.len();
            out.extend_from_slice(&buf[..n]);
            self.reader.consume(n);
            self.offset += n as u64;
            if !exhausted {
                return Ok(());
            }
        }
    }
}

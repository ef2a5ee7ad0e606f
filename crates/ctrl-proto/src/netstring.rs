//! Resumable netstring frame reader
//!
//! A netstring is `<decimal length>:<payload>,`. The control channel is
//! a stream of them, and the reader below is a small state machine that
//! advances as far as the currently buffered bytes allow:
//!
//! ```text
//! Length -> Payload -> Delimiter -> (Length)
//! ```
//!
//! [`FrameReader::parse`] is re-entrant: it returns `Ok(None)` while
//! starved and `Ok(Some(payload))` exactly once per complete frame, at
//! the same point regardless of how the bytes were chunked. Length
//! digits are consumed as they arrive (the accumulated value lives in
//! the reader, not the buffer); the payload is left buffered until its
//! trailing delimiter has been seen, then taken in one piece.
//!
//! A single buffer fill may carry several complete frames; callers must
//! loop `parse` until it returns `Ok(None)` or frames already buffered
//! will sit unprocessed until the next fill.

use ringwatch_ctrl_io::StreamCursor;

use crate::error::ProtoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Accumulating length digits; `seen_digit` distinguishes `":"`
    /// right at the start (an error) from a terminated length.
    Length { seen_digit: bool },
    Payload,
    Delimiter,
}

/// Turns a [`StreamCursor`] into complete frame payloads.
pub struct FrameReader {
    state: State,
    len: usize,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReader {
    pub fn new() -> Self {
        FrameReader {
            state: State::Length { seen_digit: false },
            len: 0,
        }
    }

    /// Advance as far as buffered bytes allow. Returns the payload of
    /// the next complete frame, or `None` when more bytes are needed.
    pub fn parse(&mut self, cursor: &StreamCursor) -> anyhow::Result<Option<String>> {
        loop {
            match self.state {
                State::Length { .. } => {
                    if !self.parse_length(cursor)? {
                        return Ok(None);
                    }
                    self.state = State::Payload;
                }
                State::Payload => {
                    // Payload plus the trailing delimiter.
                    let needed = self
                        .len
                        .checked_add(1)
                        .ok_or_else(|| ProtoError::framing("frame length overflow"))?;
                    if cursor.len() < needed {
                        return Ok(None);
                    }
                    self.state = State::Delimiter;
                }
                State::Delimiter => match cursor.peek(self.len) {
                    Some(b',') => {
                        let payload = cursor.take(self.len)?;
                        cursor.get()?; // discard ','
                        self.len = 0;
                        self.state = State::Length { seen_digit: false };
                        let payload = String::from_utf8(payload).map_err(|_| {
                            ProtoError::parse("frame payload is not valid UTF-8")
                        })?;
                        return Ok(Some(payload));
                    }
                    Some(c) => {
                        return Err(ProtoError::framing(format!(
                            "unexpected character '{}' in place of frame delimiter",
                            c as char
                        ))
                        .into())
                    }
                    // Unreachable: Payload guaranteed len + 1 bytes.
                    None => return Err(ProtoError::framing("frame delimiter missing").into()),
                },
            }
        }
    }

    fn parse_length(&mut self, cursor: &StreamCursor) -> anyhow::Result<bool> {
        loop {
            match cursor.get()? {
                Some(c @ b'0'..=b'9') => {
                    self.state = State::Length { seen_digit: true };
                    self.len = self
                        .len
                        .checked_mul(10)
                        .and_then(|l| l.checked_add((c - b'0') as usize))
                        .ok_or_else(|| ProtoError::framing("frame length overflow"))?;
                }
                Some(b':') => {
                    if self.state == (State::Length { seen_digit: true }) {
                        return Ok(true);
                    }
                    return Err(ProtoError::framing("empty frame length").into());
                }
                Some(c) => {
                    return Err(ProtoError::framing(format!(
                        "unexpected character '{}' while parsing frame length",
                        c as char
                    ))
                    .into())
                }
                None => return Ok(false),
            }
        }
    }
}

/// Encode one outbound frame.
pub fn encode(payload: &str) -> String {
    format!("{}:{},", payload.len(), payload)
}

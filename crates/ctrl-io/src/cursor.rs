//! Consuming cursor over an [`EventBuffer`]'s readable bytes

use std::rc::Rc;

use crate::event_buffer::EventBuffer;

/// Non-destructive-peek / destructive-get view over a shared buffer.
///
/// `get` and `take` drain the underlying buffer and therefore fire its
/// on-drain notification, which is how backpressure is released while a
/// parser walks the stream. Both are fallible because a drain handler
/// may fail (e.g. a reactor interest update).
pub struct StreamCursor {
    buf: Rc<EventBuffer>,
}

impl StreamCursor {
    pub fn new(buf: Rc<EventBuffer>) -> Self {
        StreamCursor { buf }
    }

    pub fn buffer(&self) -> &Rc<EventBuffer> {
        &self.buf
    }

    /// Number of bytes currently available.
    pub fn len(&self) -> usize {
        self.buf.readable_size()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume and return one byte, or `None` when the buffer is empty.
    pub fn get(&self) -> anyhow::Result<Option<u8>> {
        let byte = self.buf.with_readable(|r| r.first().copied());
        if byte.is_some() {
            self.buf.drain(1)?;
        }
        Ok(byte)
    }

    /// Inspect the byte at `offset` from the current read position
    /// without consuming; `None` when out of range.
    pub fn peek(&self, offset: usize) -> Option<u8> {
        self.buf.with_readable(|r| r.get(offset).copied())
    }

    /// Consume and return `len` bytes. `len` must not exceed
    /// [`StreamCursor::len`].
    pub fn take(&self, len: usize) -> anyhow::Result<Vec<u8>> {
        let bytes = self.buf.with_readable(|r| r[..len].to_vec());
        self.buf.drain(len)?;
        Ok(bytes)
    }
}

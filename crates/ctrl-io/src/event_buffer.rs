//! Byte buffer with fill/drain notifications
//!
//! [`EventBuffer`] wraps a [`Buffer`] and fires an on-fill signal after
//! every fill and an on-drain signal after every drain. These two signals
//! are the only backpressure mechanism in the stack: the connection stops
//! asking for readable events when the receive buffer reports full, and
//! resumes when a drain makes room - no polling anywhere.
//!
//! The buffer borrow is always released before a signal fires, so
//! handlers are free to read from or drain the same buffer.

use std::cell::RefCell;

use ringwatch_infra_common::{Signal, Subscription};

use crate::buffer::Buffer;

/// A [`Buffer`] shared between a producer and a consumer, with
/// "became non-empty" / "became non-full" notifications.
pub struct EventBuffer {
    buf: RefCell<Buffer>,
    on_fill: Signal<()>,
    on_drain: Signal<()>,
}

impl EventBuffer {
    pub fn with_capacity(size: usize) -> Self {
        EventBuffer {
            buf: RefCell::new(Buffer::with_capacity(size)),
            on_fill: Signal::new(),
            on_drain: Signal::new(),
        }
    }

    /// Subscribe to fills. Fired after every commit, while the buffer is
    /// guaranteed non-empty (unless a handler drained it already).
    pub fn on_fill<F>(&self, handler: F) -> Subscription
    where
        F: FnMut(&()) -> anyhow::Result<()> + 'static,
    {
        self.on_fill.connect(handler)
    }

    /// Subscribe to drains. Fired after every release of readable bytes.
    pub fn on_drain<F>(&self, handler: F) -> Subscription
    where
        F: FnMut(&()) -> anyhow::Result<()> + 'static,
    {
        self.on_drain.connect(handler)
    }

    /// Let `f` write into the current writable region and commit however
    /// many bytes it reports. The on-fill signal fires afterwards; a
    /// handler error propagates to the producer.
    pub fn fill_with<F>(&self, f: F) -> anyhow::Result<usize>
    where
        F: FnOnce(&mut [u8]) -> anyhow::Result<usize>,
    {
        let filled = {
            let mut buf = self.buf.borrow_mut();
            let n = f(buf.writable())?;
            buf.fill(n);
            n
        };
        self.on_fill.emit(&())?;
        Ok(filled)
    }

    /// Let `f` read from the current readable region and release however
    /// many bytes it reports consumed. Fires the on-drain signal.
    pub fn drain_with<F>(&self, f: F) -> anyhow::Result<usize>
    where
        F: FnOnce(&[u8]) -> anyhow::Result<usize>,
    {
        let drained = {
            let mut buf = self.buf.borrow_mut();
            let n = f(buf.readable())?;
            buf.drain(n);
            n
        };
        self.on_drain.emit(&())?;
        Ok(drained)
    }

    /// Copy `bytes` in, reserving room as needed. Fires on-fill.
    pub fn append(&self, bytes: &[u8]) -> anyhow::Result<()> {
        {
            let mut buf = self.buf.borrow_mut();
            buf.reserve(bytes.len());
            buf.writable()[..bytes.len()].copy_from_slice(bytes);
            buf.fill(bytes.len());
        }
        self.on_fill.emit(&())
    }

    /// Release `size` readable bytes. Fires on-drain.
    pub fn drain(&self, size: usize) -> anyhow::Result<()> {
        self.buf.borrow_mut().drain(size);
        self.on_drain.emit(&())
    }

    /// Run `f` against the readable region without consuming anything.
    pub fn with_readable<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(self.buf.borrow().readable())
    }

    pub fn readable_size(&self) -> usize {
        self.buf.borrow().readable_size()
    }

    pub fn writable_size(&self) -> usize {
        self.buf.borrow().writable_size()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.borrow().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buf.borrow().is_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn fill_and_drain_fire_notifications() {
        let buf = EventBuffer::with_capacity(8);
        let fills = Rc::new(Cell::new(0u32));
        let drains = Rc::new(Cell::new(0u32));

        {
            let fills = Rc::clone(&fills);
            buf.on_fill(move |_| {
                fills.set(fills.get() + 1);
                Ok(())
            });
        }
        {
            let drains = Rc::clone(&drains);
            buf.on_drain(move |_| {
                drains.set(drains.get() + 1);
                Ok(())
            });
        }

        buf.append(b"abc").unwrap();
        assert_eq!(fills.get(), 1);
        assert_eq!(buf.readable_size(), 3);

        buf.drain(1).unwrap();
        buf.drain(2).unwrap();
        assert_eq!(drains.get(), 2);
        assert!(buf.is_empty());
    }

    #[test]
    fn fill_handler_may_drain_the_same_buffer() {
        let buf = Rc::new(EventBuffer::with_capacity(8));
        {
            let buf2 = Rc::clone(&buf);
            buf.on_fill(move |_| {
                let n = buf2.readable_size();
                buf2.drain(n)
            });
        }

        buf.append(b"hello").unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn handler_error_propagates_to_producer() {
        let buf = EventBuffer::with_capacity(8);
        buf.on_fill(|_| anyhow::bail!("downstream failed"));
        let err = buf.append(b"x").unwrap_err();
        assert_eq!(err.to_string(), "downstream failed");
    }
}

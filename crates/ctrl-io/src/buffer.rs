//! Growable byte buffer with read/write cursors
//!
//! ```text
//!      <--------------- capacity -------------->
//!     +-----------------------------------------+
//!     | | | | | | | | | |D|D|D|D|D| | | | | | | |
//!     +^-----------------^---------^------------+
//!      |                 |         |
//!    data              rstart    wstart
//! ```
//!
//! A producer calls [`Buffer::reserve`], writes into [`Buffer::writable`]
//! and commits with [`Buffer::fill`]; a consumer reads from
//! [`Buffer::readable`] and releases with [`Buffer::drain`]. Capacity only
//! ever grows, and growth happens only after compaction failed to make
//! enough room - callers depend on the "no copy unless necessary"
//! behavior for throughput.
//!
//! Asking to fill or drain more than the sizes most recently reported is
//! a precondition violation, not a recoverable error; it panics.

/// Single-producer/single-consumer byte region.
#[derive(Debug, Default)]
pub struct Buffer {
    data: Vec<u8>,
    rstart: usize,
    wstart: usize,
}

impl Buffer {
    /// Create an empty buffer with no backing storage.
    pub fn new() -> Self {
        Buffer::default()
    }

    /// Create a buffer with `size` bytes of writable space.
    pub fn with_capacity(size: usize) -> Self {
        let mut buf = Buffer::default();
        buf.reserve(size);
        buf
    }

    /// Ensure at least `size` writable bytes.
    ///
    /// Compacts first (moving unread bytes to offset 0) and grows the
    /// allocation only if compaction was not enough. Invalidates slices
    /// previously obtained from `readable`/`writable`.
    pub fn reserve(&mut self, size: usize) {
        if size == 0 || size <= self.writable_size() {
            return;
        }

        if self.rstart != 0 {
            self.reclaim();
        }

        if size <= self.writable_size() {
            return;
        }

        let grow_by = size - self.writable_size();
        self.data.resize(self.data.len() + grow_by, 0);
    }

    /// Commit `size` bytes previously written into [`Buffer::writable`].
    pub fn fill(&mut self, size: usize) {
        assert!(
            self.wstart + size <= self.data.len(),
            "fill({size}) exceeds writable size {}",
            self.writable_size()
        );
        self.wstart += size;
    }

    /// Release `size` bytes from the front of [`Buffer::readable`].
    ///
    /// Draining the buffer empty resets both cursors to 0, reclaiming the
    /// whole region in O(1).
    pub fn drain(&mut self, size: usize) {
        assert!(
            size <= self.readable_size(),
            "drain({size}) exceeds readable size {}",
            self.readable_size()
        );

        self.rstart += size;
        if self.rstart == self.wstart {
            self.rstart = 0;
            self.wstart = 0;
        }
    }

    /// Unread bytes, in arrival order.
    pub fn readable(&self) -> &[u8] {
        &self.data[self.rstart..self.wstart]
    }

    /// Writable region; commit writes with [`Buffer::fill`].
    pub fn writable(&mut self) -> &mut [u8] {
        &mut self.data[self.wstart..]
    }

    /// Number of unread bytes.
    pub fn readable_size(&self) -> usize {
        self.wstart - self.rstart
    }

    /// Number of bytes that can be written without reserving.
    pub fn writable_size(&self) -> usize {
        self.data.len() - self.wstart
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readable_size() == 0
    }

    pub fn is_full(&self) -> bool {
        self.writable_size() == 0
    }

    fn reclaim(&mut self) {
        let len = self.readable_size();
        self.data.copy_within(self.rstart..self.wstart, 0);
        self.rstart = 0;
        self.wstart = len;
    }
}

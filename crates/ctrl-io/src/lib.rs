//! Reactor-driven non-blocking I/O for the ringwatch stack
//!
//! This crate provides the bottom half of the control-channel pipeline:
//!
//! ```text
//! socket -> Buffer -> StreamCursor -> (framing, upper layers)
//! ```
//!
//! - [`Buffer`] - growable byte region with separate read/write cursors
//!   and reserve/fill/drain semantics.
//! - [`EventBuffer`] - a [`Buffer`] that signals "became non-empty" /
//!   "became non-full"; the sole backpressure mechanism between layers.
//! - [`StreamCursor`] - peek/consume view over a buffer's readable bytes.
//! - [`Reactor`] - level-triggered epoll wrapper with one callback per
//!   registered descriptor.
//! - [`BufferedConnection`] - a non-blocking TCP connection owning one
//!   [`EventBuffer`] per direction, driven entirely by reactor readiness,
//!   including the deferred-connect handshake.
//!
//! Everything is single-threaded: callbacks and signal handlers run
//! synchronously inside [`Reactor::wait`].

pub mod buffer;
pub mod connection;
pub mod cursor;
pub mod error;
pub mod event_buffer;
pub mod reactor;

pub use buffer::Buffer;
pub use connection::{BufferedConnection, ConnectionState};
pub use cursor::StreamCursor;
pub use error::IoError;
pub use event_buffer::EventBuffer;
pub use reactor::{Reactor, Readiness};

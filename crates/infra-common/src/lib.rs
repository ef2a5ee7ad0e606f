//! Common infrastructure components for the ringwatch stack
//!
//! This crate provides the two cross-cutting pieces every other ringwatch
//! crate leans on:
//!
//! - [`signal`] - a single-threaded signal/slot event channel. Publishers
//!   own a [`Signal`] and expose `on_*` subscription methods; subscribers
//!   get back a [`Subscription`] handle they can disconnect at any time,
//!   including from inside a handler.
//! - [`logging`] - tracing-subscriber setup shared by binaries and tests.
//!
//! Everything here is deliberately `!Send`: the ringwatch stack runs on a
//! single reactor thread and the safety guarantees of [`Signal`] are about
//! reentrant mutation, not concurrent mutation.

pub mod logging;
pub mod signal;

pub use logging::{setup_logging, LoggingConfig};
pub use signal::{Signal, Subscription};

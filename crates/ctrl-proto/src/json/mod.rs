//! Minimal JSON model for the control protocol
//!
//! The control channel only ever carries flat objects of strings, bools
//! and small integers, so this module implements exactly that subset and
//! nothing more. [`parser`] documents the intentional limitations.

pub mod parser;
pub mod ser;
pub mod value;

pub use parser::{parse_document, parse_object};
pub use ser::to_string;
pub use value::{make_object, Array, Object, Value};

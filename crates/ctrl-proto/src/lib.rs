//! Wire codecs for the baresip `ctrl_tcp` control channel
//!
//! Two layers, both resumable-friendly and allocation-light:
//!
//! - [`netstring`] - the length-prefixed frame encoding
//!   (`<decimal length>:<payload>,`) used by the control channel, with a
//!   resumable [`FrameReader`] that copes with arbitrary chunk
//!   boundaries.
//! - [`json`] - a deliberately minimal JSON object model and
//!   recursive-descent parser covering exactly the subset the control
//!   protocol emits: no string escapes, no floats, no unicode handling.
//!   See the [`json::parser`] docs for why this limitation is kept.

pub mod error;
pub mod json;
pub mod netstring;

pub use error::ProtoError;
pub use json::{Array, Object, Value};
pub use netstring::FrameReader;

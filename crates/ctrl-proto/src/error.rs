//! Error types for the wire codecs

use thiserror::Error;

/// Errors raised while decoding the control-channel byte stream.
///
/// Both variants mean the stream is desynchronized and the connection
/// cannot be trusted any further; neither is retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtoError {
    /// Malformed netstring length or delimiter
    #[error("framing error: {reason}")]
    Framing { reason: String },

    /// Malformed or unsupported JSON
    #[error("JSON parse error: {reason}")]
    Parse { reason: String },
}

impl ProtoError {
    pub(crate) fn framing(reason: impl Into<String>) -> Self {
        ProtoError::Framing {
            reason: reason.into(),
        }
    }

    pub(crate) fn parse(reason: impl Into<String>) -> Self {
        ProtoError::Parse {
            reason: reason.into(),
        }
    }
}

//! Client-level errors.

use ringwatch_ctrl_io::IoError;
use ringwatch_ctrl_proto::ProtoError;
use thiserror::Error;

/// Errors raised while dispatching control-channel messages.
///
/// Every variant is fatal to the connection. The one condition that is
/// *not* an error is an unrecognized event class or type, which
/// [`classify`](crate::protocol::classify) drops silently.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A recognized message was missing a required field or carried a
    /// field of the wrong kind. Protocol desync is not recoverable.
    #[error("protocol error: {reason}")]
    Protocol { reason: String },

    /// Framing or JSON decode failure from the codec layer.
    #[error(transparent)]
    Proto(#[from] ProtoError),

    /// Transport failure from the connection layer.
    #[error(transparent)]
    Io(#[from] IoError),
}

impl ClientError {
    pub(crate) fn protocol(reason: impl Into<String>) -> Self {
        ClientError::Protocol {
            reason: reason.into(),
        }
    }
}

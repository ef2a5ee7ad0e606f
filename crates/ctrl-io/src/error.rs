//! Error types for the I/O layer

use std::net::SocketAddr;
use std::os::fd::RawFd;

use thiserror::Error;

use crate::reactor::Readiness;

/// Errors raised by the reactor and the buffered connection.
///
/// All of these are fatal to the connection: nothing here is retried
/// internally. They unwind out of the reactor callback as
/// `anyhow::Error` and terminate the owning wait loop.
#[derive(Debug, Error)]
pub enum IoError {
    /// Connecting to the control channel failed
    #[error("failed to connect to {addr}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The peer closed the connection (zero-byte read)
    #[error("connection closed by peer")]
    PeerClosed,

    /// The socket reported readiness the connection cannot handle
    #[error("unexpected socket readiness: {readiness:?}")]
    UnexpectedReadiness { readiness: Readiness },

    /// A descriptor was added to the reactor twice
    #[error("descriptor {fd} already registered with the reactor")]
    AlreadyRegistered { fd: RawFd },

    /// modify/remove on a descriptor the reactor does not know
    #[error("descriptor {fd} not registered with the reactor")]
    NotRegistered { fd: RawFd },

    /// A syscall failed
    #[error("{op} failed")]
    Syscall {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl IoError {
    pub(crate) fn syscall(op: &'static str) -> Self {
        IoError::Syscall {
            op,
            source: std::io::Error::last_os_error(),
        }
    }
}

//! Buffered non-blocking TCP connection
//!
//! [`BufferedConnection`] owns the socket plus one [`EventBuffer`] per
//! direction and drives both entirely from reactor readiness events:
//!
//! - while connecting, interest is WRITABLE only; the first readiness
//!   completes the handshake via an SO_ERROR probe;
//! - while connected, interest is recomputed after every I/O event and
//!   every buffer notification: READABLE iff the receive buffer has
//!   room, WRITABLE iff the send buffer has bytes to flush;
//! - one `read` / one `write` per readiness event, partial writes left
//!   for the next writable event.
//!
//! There is no reconnect logic: a zero-byte read (peer close), a socket
//! error, or any unexpected readiness flag is fatal and propagates out
//! of the reactor loop.

use std::cell::Cell;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::rc::Rc;

use socket2::{Domain, Socket, Type};
use tracing::{debug, trace};

use crate::error::IoError;
use crate::event_buffer::EventBuffer;
use crate::reactor::{Reactor, Readiness};

const BUFFER_SIZE: usize = 4096;

/// Connection lifecycle; `Error` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Init,
    Connecting,
    Connected,
    Error,
}

/// A non-blocking stream socket with buffered, reactor-driven I/O.
pub struct BufferedConnection {
    stream: TcpStream,
    peer: SocketAddr,
    state: Cell<ConnectionState>,
    interest: Cell<Readiness>,
    reactor: Rc<Reactor>,
    recvbuf: Rc<EventBuffer>,
    sendbuf: Rc<EventBuffer>,
}

impl BufferedConnection {
    /// Create a non-blocking socket, issue the connect and register with
    /// the reactor. A would-block result leaves the connection in
    /// `Connecting`; completion happens on the first writable readiness.
    pub fn connect(reactor: Rc<Reactor>, addr: SocketAddr) -> anyhow::Result<Rc<Self>> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, None)
            .map_err(|e| IoError::Syscall {
                op: "socket",
                source: e,
            })?;
        socket.set_nonblocking(true).map_err(|e| IoError::Syscall {
            op: "fcntl(O_NONBLOCK)",
            source: e,
        })?;

        let state = match socket.connect(&addr.into()) {
            Ok(()) => ConnectionState::Connected,
            Err(e)
                if e.raw_os_error() == Some(libc::EINPROGRESS)
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                ConnectionState::Connecting
            }
            Err(e) => {
                return Err(IoError::Connect {
                    addr,
                    source: e,
                }
                .into())
            }
        };
        debug!(%addr, ?state, "control connection initiated");

        let conn = Rc::new(BufferedConnection {
            stream: socket.into(),
            peer: addr,
            state: Cell::new(state),
            interest: Cell::new(Readiness::NONE),
            reactor,
            recvbuf: Rc::new(EventBuffer::with_capacity(BUFFER_SIZE)),
            sendbuf: Rc::new(EventBuffer::with_capacity(BUFFER_SIZE)),
        });

        // Draining the receive buffer can re-open read interest; filling
        // the send buffer opens write interest.
        let weak = Rc::downgrade(&conn);
        conn.recvbuf.on_drain(move |_| {
            match weak.upgrade() {
                Some(conn) => conn.update_interest(),
                None => Ok(()),
            }
        });
        let weak = Rc::downgrade(&conn);
        conn.sendbuf.on_fill(move |_| {
            match weak.upgrade() {
                Some(conn) => conn.update_interest(),
                None => Ok(()),
            }
        });

        let weak = Rc::downgrade(&conn);
        let initial = conn.desired_interest();
        conn.reactor
            .add(conn.stream.as_raw_fd(), initial, move |ready| {
                match weak.upgrade() {
                    Some(conn) => conn.handle_event(ready),
                    None => Ok(()),
                }
            })?;
        conn.interest.set(initial);

        Ok(conn)
    }

    /// Receive direction; filled by the reactor, drained by the parser.
    pub fn recvbuf(&self) -> &Rc<EventBuffer> {
        &self.recvbuf
    }

    /// Send direction; filled by the protocol layer, flushed on writable
    /// readiness.
    pub fn sendbuf(&self) -> &Rc<EventBuffer> {
        &self.sendbuf
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn handle_event(&self, ready: Readiness) -> anyhow::Result<()> {
        if ready.is_empty() {
            return Ok(());
        }

        if self.state.get() == ConnectionState::Connecting {
            self.connect_continue()?;
            return self.update_interest();
        }

        let fatal = Readiness::PEER_CLOSED
            | Readiness::PRIORITY
            | Readiness::ERROR
            | Readiness::HANGUP;
        if ready.intersects(fatal) {
            self.state.set(ConnectionState::Error);
            return Err(IoError::UnexpectedReadiness { readiness: ready }.into());
        }

        if ready.contains(Readiness::READABLE) {
            self.on_readable()?;
        }
        if ready.contains(Readiness::WRITABLE) {
            self.on_writable()?;
        }

        self.update_interest()
    }

    /// Complete a deferred connect on the first readiness after
    /// `connect` returned EINPROGRESS.
    fn connect_continue(&self) -> anyhow::Result<()> {
        let sock_err = self.stream.take_error().map_err(|e| IoError::Syscall {
            op: "getsockopt(SO_ERROR)",
            source: e,
        })?;

        if let Some(err) = sock_err {
            self.state.set(ConnectionState::Error);
            return Err(IoError::Connect {
                addr: self.peer,
                source: err,
            }
            .into());
        }

        self.state.set(ConnectionState::Connected);
        debug!(addr = %self.peer, "control connection established");
        Ok(())
    }

    /// One read into the receive buffer's writable region. Zero bytes
    /// means the peer closed the connection, which is fatal.
    fn on_readable(&self) -> anyhow::Result<()> {
        let n = self.recvbuf.fill_with(|dst| {
            if dst.is_empty() {
                return Ok(0);
            }
            match (&self.stream).read(dst) {
                Ok(0) => {
                    self.state.set(ConnectionState::Error);
                    Err(IoError::PeerClosed.into())
                }
                Ok(n) => Ok(n),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
                Err(e) => {
                    self.state.set(ConnectionState::Error);
                    Err(IoError::Syscall {
                        op: "read",
                        source: e,
                    }
                    .into())
                }
            }
        })?;
        trace!(bytes = n, "socket read");
        Ok(())
    }

    /// One write from the send buffer's readable region; bytes actually
    /// written are drained, the rest waits for the next writable event.
    fn on_writable(&self) -> anyhow::Result<()> {
        let n = self.sendbuf.drain_with(|src| {
            if src.is_empty() {
                return Ok(0);
            }
            match (&self.stream).write(src) {
                Ok(n) => Ok(n),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
                Err(e) => {
                    self.state.set(ConnectionState::Error);
                    Err(IoError::Syscall {
                        op: "write",
                        source: e,
                    }
                    .into())
                }
            }
        })?;
        trace!(bytes = n, "socket write");
        Ok(())
    }

    fn desired_interest(&self) -> Readiness {
        if self.state.get() == ConnectionState::Connecting {
            return Readiness::WRITABLE;
        }

        let mut interest = Readiness::NONE;
        if !self.recvbuf.is_full() {
            interest |= Readiness::READABLE;
        }
        if !self.sendbuf.is_empty() {
            interest |= Readiness::WRITABLE;
        }
        interest
    }

    fn update_interest(&self) -> anyhow::Result<()> {
        let desired = self.desired_interest();
        if desired != self.interest.get() {
            self.reactor.modify(self.stream.as_raw_fd(), desired)?;
            self.interest.set(desired);
        }
        Ok(())
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

impl Drop for BufferedConnection {
    fn drop(&mut self) {
        let _ = self.reactor.remove(self.stream.as_raw_fd());
    }
}

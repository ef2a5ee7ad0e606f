//! Buffered connection against a loopback TCP listener
//!
//! Single-threaded: the listener side uses plain blocking std sockets,
//! the connection under test runs through the reactor.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::rc::Rc;
use std::time::{Duration, Instant};

use ringwatch_ctrl_io::{BufferedConnection, ConnectionState, IoError, Reactor};

fn wait_until(
    reactor: &Reactor,
    deadline: Duration,
    mut done: impl FnMut() -> bool,
) -> anyhow::Result<()> {
    let start = Instant::now();
    while !done() {
        assert!(start.elapsed() < deadline, "timed out waiting for condition");
        reactor.wait(Some(Duration::from_millis(50)))?;
    }
    Ok(())
}

#[test]
fn connects_and_receives() {
    let reactor = Rc::new(Reactor::new().unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let conn = BufferedConnection::connect(Rc::clone(&reactor), addr).unwrap();
    let (mut peer, _) = listener.accept().unwrap();

    peer.write_all(b"hello").unwrap();
    wait_until(&reactor, Duration::from_secs(2), || {
        conn.recvbuf().readable_size() == 5
    })
    .unwrap();

    assert_eq!(conn.state(), ConnectionState::Connected);
    conn.recvbuf().with_readable(|r| assert_eq!(r, b"hello"));
}

#[test]
fn flushes_send_buffer_on_writable() {
    let reactor = Rc::new(Reactor::new().unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let conn = BufferedConnection::connect(Rc::clone(&reactor), addr).unwrap();
    let (mut peer, _) = listener.accept().unwrap();
    peer.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

    conn.sendbuf().append(b"ping").unwrap();
    wait_until(&reactor, Duration::from_secs(2), || {
        conn.sendbuf().is_empty()
    })
    .unwrap();

    let mut got = [0u8; 4];
    peer.read_exact(&mut got).unwrap();
    assert_eq!(&got, b"ping");
}

#[test]
fn full_receive_buffer_applies_backpressure() {
    let reactor = Rc::new(Reactor::new().unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let conn = BufferedConnection::connect(Rc::clone(&reactor), addr).unwrap();
    let (mut peer, _) = listener.accept().unwrap();

    // More than the 4096-byte receive buffer.
    let payload = vec![0x2a_u8; 5000];
    peer.write_all(&payload).unwrap();

    wait_until(&reactor, Duration::from_secs(2), || {
        conn.recvbuf().is_full()
    })
    .unwrap();
    assert_eq!(conn.recvbuf().readable_size(), 4096);

    // Read interest is parked: nothing further is delivered.
    let fired = reactor.wait(Some(Duration::from_millis(50))).unwrap();
    assert!(!fired);

    // Draining reopens read interest and the rest arrives.
    conn.recvbuf().drain(4096).unwrap();
    wait_until(&reactor, Duration::from_secs(2), || {
        conn.recvbuf().readable_size() == 5000 - 4096
    })
    .unwrap();
}

#[test]
fn peer_close_is_fatal() {
    let reactor = Rc::new(Reactor::new().unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let conn = BufferedConnection::connect(Rc::clone(&reactor), addr).unwrap();
    let (peer, _) = listener.accept().unwrap();

    // Let the connect handshake finish before closing the peer.
    wait_until(&reactor, Duration::from_secs(2), || {
        conn.state() == ConnectionState::Connected
    })
    .unwrap();
    drop(peer);

    let start = Instant::now();
    let err = loop {
        assert!(start.elapsed() < Duration::from_secs(2));
        match reactor.wait(Some(Duration::from_millis(50))) {
            Ok(_) => continue,
            Err(e) => break e,
        }
    };
    assert!(err.chain().any(|c| c
        .downcast_ref::<IoError>()
        .map_or(false, |e| matches!(
            e,
            IoError::PeerClosed | IoError::UnexpectedReadiness { .. }
        ))));
    assert_eq!(conn.state(), ConnectionState::Error);
}

#[test]
fn connect_to_closed_port_fails_on_first_readiness() {
    let reactor = Rc::new(Reactor::new().unwrap());
    // Bind-then-drop to get a port nothing listens on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let conn = match BufferedConnection::connect(Rc::clone(&reactor), addr) {
        // Some kernels refuse immediately.
        Err(_) => return,
        Ok(conn) => conn,
    };

    let start = Instant::now();
    let err = loop {
        assert!(start.elapsed() < Duration::from_secs(2));
        match reactor.wait(Some(Duration::from_millis(50))) {
            Ok(_) => continue,
            Err(e) => break e,
        }
    };
    assert!(err
        .chain()
        .any(|c| matches!(c.downcast_ref::<IoError>(), Some(IoError::Connect { .. }))));
    assert_eq!(conn.state(), ConnectionState::Error);
}

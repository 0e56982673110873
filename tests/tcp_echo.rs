//! End-to-end loopback coverage for the TCP façade: connect/accept, a
//! single-reactor echo round trip, and ordering of several queued writes
//! under the same readiness event.

use std::cell::RefCell;
use std::net::{Ipv4Addr, SocketAddr};
use std::rc::Rc;

use estuary::buf::OwningBuffer;
use estuary::net::{TcpListener, TcpStream};
use estuary::{Completion, ErrorCode, ReactorBuilder, SharedReactor};

fn local_reactor() -> SharedReactor {
    ReactorBuilder::new().enable_waker(false).build_shared().expect("build reactor")
}

fn loopback(port: u16) -> SocketAddr {
    SocketAddr::new(Ipv4Addr::LOCALHOST.into(), port)
}

/// Pump the reactor forward until `done` reports true or the iteration
/// budget runs out. Every scenario below triggers the kernel-side event
/// (a write, a connect) before pumping, so each `turn()` call either drains
/// already-ready state or is a very short wait — never an indefinite block.
fn pump(reactor: &SharedReactor, mut done: impl FnMut() -> bool, max_turns: usize) {
    for _ in 0..max_turns {
        if done() {
            return;
        }
        reactor.borrow_mut().turn().expect("turn");
    }
    assert!(done(), "operation did not complete within {max_turns} reactor turns");
}

#[test]
fn connect_accept_then_echo_one_message() {
    let reactor = local_reactor();
    let listener = TcpListener::bind(&reactor, loopback(0)).expect("bind");
    let bound = listener.local_addr().expect("local_addr");

    let accepted: Rc<RefCell<Option<(TcpStream, SocketAddr)>>> = Rc::new(RefCell::new(None));
    let accepted2 = accepted.clone();
    listener.accept_with(Completion::new(move |result| {
        *accepted2.borrow_mut() = Some(result.expect("accept succeeds"));
    }));

    let connected: Rc<RefCell<Option<TcpStream>>> = Rc::new(RefCell::new(None));
    let connected2 = connected.clone();
    TcpStream::connect_with(&reactor, bound, Completion::new(move |result| {
        *connected2.borrow_mut() = Some(result.expect("connect succeeds"));
    }));

    pump(&reactor, || accepted.borrow().is_some() && connected.borrow().is_some(), 64);

    let client = connected.borrow_mut().take().unwrap();
    let (server, _peer) = accepted.borrow_mut().take().unwrap();

    let payload = b"ping".to_vec();
    let wrote = Rc::new(RefCell::new(None));
    let wrote2 = wrote.clone();
    client.write_with(OwningBuffer::from(payload.clone()), Completion::new(move |result| {
        *wrote2.borrow_mut() = Some(result.expect("write succeeds"));
    }));
    pump(&reactor, || wrote.borrow().is_some(), 64);
    let (_buf, n) = wrote.borrow_mut().take().unwrap();
    assert_eq!(n, payload.len());

    let read = Rc::new(RefCell::new(None));
    let read2 = read.clone();
    server.read_with(OwningBuffer::zeroed(payload.len()), Completion::new(move |result| {
        *read2.borrow_mut() = Some(result.expect("read succeeds"));
    }));
    pump(&reactor, || read.borrow().is_some(), 64);
    let (buf, n) = read.borrow_mut().take().unwrap();
    assert_eq!(n, payload.len());
    assert_eq!(buf.as_slice(), payload.as_slice());
}

#[test]
fn a_short_write_then_a_longer_one_complete_in_submission_order() {
    let reactor = local_reactor();
    let listener = TcpListener::bind(&reactor, loopback(0)).expect("bind");
    let bound = listener.local_addr().expect("local_addr");

    let accepted: Rc<RefCell<Option<(TcpStream, SocketAddr)>>> = Rc::new(RefCell::new(None));
    let accepted2 = accepted.clone();
    listener.accept_with(Completion::new(move |result| {
        *accepted2.borrow_mut() = Some(result.expect("accept succeeds"));
    }));
    let connected: Rc<RefCell<Option<TcpStream>>> = Rc::new(RefCell::new(None));
    let connected2 = connected.clone();
    TcpStream::connect_with(&reactor, bound, Completion::new(move |result| {
        *connected2.borrow_mut() = Some(result.expect("connect succeeds"));
    }));
    pump(&reactor, || accepted.borrow().is_some() && connected.borrow().is_some(), 64);

    let client = connected.borrow_mut().take().unwrap();
    let (server, _peer) = accepted.borrow_mut().take().unwrap();

    let order = Rc::new(RefCell::new(Vec::new()));
    let order1 = order.clone();
    client.write_with(OwningBuffer::from(b"a".to_vec()), Completion::new(move |result| {
        result.expect("first write succeeds");
        order1.borrow_mut().push(1);
    }));
    let order2 = order.clone();
    client.write_with(OwningBuffer::from(b"bb".to_vec()), Completion::new(move |result| {
        result.expect("second write succeeds");
        order2.borrow_mut().push(2);
    }));

    pump(&reactor, || order.borrow().len() == 2, 64);
    assert_eq!(*order.borrow(), vec![1, 2]);

    // Drain the bytes server-side so the stream doesn't dangle unread.
    let read = Rc::new(RefCell::new(None));
    let read2 = read.clone();
    server.read_with(OwningBuffer::zeroed(3), Completion::new(move |result| {
        *read2.borrow_mut() = Some(result.expect("read succeeds"));
    }));
    pump(&reactor, || read.borrow().is_some(), 64);
    let (buf, n) = read.borrow_mut().take().unwrap();
    assert_eq!(&buf.as_slice()[..n], b"abb");
}

#[test]
fn connecting_to_a_closed_port_fails_with_a_hard_error() {
    let reactor = local_reactor();
    // Bind and immediately drop a listener to get a port nothing is
    // listening on anymore.
    let bound = {
        let listener = TcpListener::bind(&reactor, loopback(0)).expect("bind");
        listener.local_addr().expect("local_addr")
    };

    let result: Rc<RefCell<Option<Result<TcpStream, ErrorCode>>>> = Rc::new(RefCell::new(None));
    let result2 = result.clone();
    TcpStream::connect_with(&reactor, bound, Completion::new(move |res| {
        *result2.borrow_mut() = Some(res);
    }));
    pump(&reactor, || result.borrow().is_some(), 64);
    assert!(result.borrow_mut().take().unwrap().is_err());
}

#[test]
fn a_peer_reset_fails_a_queued_read_and_deregisters_the_descriptor() {
    let reactor = local_reactor();
    let listener = TcpListener::bind(&reactor, loopback(0)).expect("bind");
    let bound = listener.local_addr().expect("local_addr");

    let accepted: Rc<RefCell<Option<(TcpStream, SocketAddr)>>> = Rc::new(RefCell::new(None));
    let accepted2 = accepted.clone();
    listener.accept_with(Completion::new(move |result| {
        *accepted2.borrow_mut() = Some(result.expect("accept succeeds"));
    }));
    let connected: Rc<RefCell<Option<TcpStream>>> = Rc::new(RefCell::new(None));
    let connected2 = connected.clone();
    TcpStream::connect_with(&reactor, bound, Completion::new(move |result| {
        *connected2.borrow_mut() = Some(result.expect("connect succeeds"));
    }));
    pump(&reactor, || accepted.borrow().is_some() && connected.borrow().is_some(), 64);

    let client = connected.borrow_mut().take().unwrap();
    let (server, _peer) = accepted.borrow_mut().take().unwrap();

    // Queue a read on the client that nothing will ever naturally satisfy.
    let read_result: Rc<RefCell<Option<Result<(OwningBuffer, usize), ErrorCode>>>> = Rc::new(RefCell::new(None));
    let read_result2 = read_result.clone();
    client.read_with(OwningBuffer::zeroed(4), Completion::new(move |result| {
        *read_result2.borrow_mut() = Some(result);
    }));

    // SO_LINGER{on: 1, linger: 0} makes the server's close send an RST
    // instead of an orderly FIN (spec.md §8 scenario S3: "Descriptor B is
    // half-closed by the kernel").
    let linger = libc::linger { l_onoff: 1, l_linger: 0 };
    let bytes = unsafe {
        std::slice::from_raw_parts(&linger as *const _ as *const u8, std::mem::size_of::<libc::linger>())
    };
    server.setsockopt(libc::SOL_SOCKET, libc::SO_LINGER, bytes).expect("set SO_LINGER");
    drop(server);

    pump(&reactor, || read_result.borrow().is_some(), 64);
    let result = read_result.borrow_mut().take().unwrap();
    assert!(result.is_err(), "a queued read must fail once the peer resets the connection");
}

/// Re-arms a server-side read after every chunk until `target` bytes have
/// been collected, so the client's send buffer keeps draining while a
/// multi-chunk write is still in flight on the other end.
fn drain_until(server: Rc<TcpStream>, state: Rc<RefCell<(usize, Vec<u8>)>>, target: usize) {
    let server2 = server.clone();
    let state2 = state.clone();
    server.read_with(OwningBuffer::zeroed(8192), Completion::new(move |result| {
        let (buf, n) = result.expect("read succeeds");
        state2.borrow_mut().0 += n;
        state2.borrow_mut().1.extend_from_slice(&buf.as_slice()[..n]);
        if state2.borrow().0 < target {
            drain_until(server2.clone(), state2.clone(), target);
        }
    }));
}

#[test]
fn a_write_larger_than_the_send_buffer_completes_only_once_fully_transferred() {
    let reactor = local_reactor();
    let listener = TcpListener::bind(&reactor, loopback(0)).expect("bind");
    let bound = listener.local_addr().expect("local_addr");

    let accepted: Rc<RefCell<Option<(TcpStream, SocketAddr)>>> = Rc::new(RefCell::new(None));
    let accepted2 = accepted.clone();
    listener.accept_with(Completion::new(move |result| {
        *accepted2.borrow_mut() = Some(result.expect("accept succeeds"));
    }));
    let connected: Rc<RefCell<Option<TcpStream>>> = Rc::new(RefCell::new(None));
    let connected2 = connected.clone();
    TcpStream::connect_with(&reactor, bound, Completion::new(move |result| {
        *connected2.borrow_mut() = Some(result.expect("connect succeeds"));
    }));
    pump(&reactor, || accepted.borrow().is_some() && connected.borrow().is_some(), 64);

    let client = connected.borrow_mut().take().unwrap();
    let server = Rc::new(accepted.borrow_mut().take().unwrap().0);

    // Shrink both ends' buffers so a several-hundred-KiB payload cannot
    // possibly fit in one `send(2)` call, forcing the fast path in
    // `submit_write` to see a partial transfer on its first attempt.
    let small: libc::c_int = 4096;
    let bytes = small.to_ne_bytes();
    client.setsockopt(libc::SOL_SOCKET, libc::SO_SNDBUF, &bytes).expect("shrink SO_SNDBUF");
    server.setsockopt(libc::SOL_SOCKET, libc::SO_RCVBUF, &bytes).expect("shrink SO_RCVBUF");

    let payload: Vec<u8> = (0..512 * 1024).map(|i| (i % 251) as u8).collect();
    let wrote = Rc::new(RefCell::new(None));
    let wrote2 = wrote.clone();
    client.write_with(OwningBuffer::from(payload.clone()), Completion::new(move |result| {
        *wrote2.borrow_mut() = Some(result.expect("write eventually succeeds"));
    }));

    // Drain the server side concurrently: nothing would ever free up room
    // in the client's send buffer for the remainder otherwise, since
    // nobody is reading the bytes already transferred.
    let state = Rc::new(RefCell::new((0usize, Vec::new())));
    drain_until(server.clone(), state.clone(), payload.len());

    pump(&reactor, || wrote.borrow().is_some() && state.borrow().0 >= payload.len(), 20_000);

    let (_buf, n) = wrote.borrow_mut().take().expect("write never completed");
    assert_eq!(n, payload.len(), "a partial send(2) must not settle the intent short of the full buffer");
    assert_eq!(state.borrow().0, payload.len());
    assert_eq!(state.borrow().1, payload);
}

#[test]
fn cancelling_a_queued_read_lets_a_later_read_on_the_same_stream_proceed() {
    let reactor = local_reactor();
    let listener = TcpListener::bind(&reactor, loopback(0)).expect("bind");
    let bound = listener.local_addr().expect("local_addr");

    let accepted: Rc<RefCell<Option<(TcpStream, SocketAddr)>>> = Rc::new(RefCell::new(None));
    let accepted2 = accepted.clone();
    listener.accept_with(Completion::new(move |result| {
        *accepted2.borrow_mut() = Some(result.expect("accept succeeds"));
    }));
    let connected: Rc<RefCell<Option<TcpStream>>> = Rc::new(RefCell::new(None));
    let connected2 = connected.clone();
    TcpStream::connect_with(&reactor, bound, Completion::new(move |result| {
        *connected2.borrow_mut() = Some(result.expect("connect succeeds"));
    }));
    pump(&reactor, || accepted.borrow().is_some() && connected.borrow().is_some(), 64);

    let client = connected.borrow_mut().take().unwrap();
    let (server, _peer) = accepted.borrow_mut().take().unwrap();

    // Nothing has been written yet, so this read has no choice but to queue.
    let first_result: Rc<RefCell<Option<Result<(OwningBuffer, usize), ErrorCode>>>> = Rc::new(RefCell::new(None));
    let first_result2 = first_result.clone();
    let id = client
        .read_with(OwningBuffer::zeroed(4), Completion::new(move |result| {
            *first_result2.borrow_mut() = Some(result);
        }))
        .expect("read with nothing available must queue");

    assert!(client.cancel_read(id), "the queued read must still be present to cancel");
    let cancelled = first_result.borrow_mut().take().expect("cancellation completes synchronously");
    assert_eq!(cancelled.unwrap_err(), estuary::PosixError::OperationCanceled);

    // A second, independent read on the same stream must still work
    // normally: cancellation must not have corrupted the descriptor state.
    let payload = b"ok!!".to_vec();
    server.write_with(OwningBuffer::from(payload.clone()), Completion::new(|result| {
        result.expect("write succeeds");
    }));

    let second_result = Rc::new(RefCell::new(None));
    let second_result2 = second_result.clone();
    client.read_with(OwningBuffer::zeroed(4), Completion::new(move |result| {
        *second_result2.borrow_mut() = Some(result.expect("read succeeds"));
    }));
    pump(&reactor, || second_result.borrow().is_some(), 64);
    let (buf, n) = second_result.borrow_mut().take().unwrap();
    assert_eq!(&buf.as_slice()[..n], payload.as_slice());
}

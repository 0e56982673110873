//! Loopback coverage for the UDP façade: unconnected `send_to`/`recv_from`,
//! and connected-mode `send`/`recv` going through the same pending-work
//! queue as TCP.

use std::cell::RefCell;
use std::net::{Ipv4Addr, SocketAddr};
use std::rc::Rc;

use estuary::buf::OwningBuffer;
use estuary::net::UdpSocket;
use estuary::{Completion, ReactorBuilder};

fn loopback(port: u16) -> SocketAddr {
    SocketAddr::new(Ipv4Addr::LOCALHOST.into(), port)
}

#[test]
fn send_to_and_recv_from_round_trip_unconnected() {
    let reactor = ReactorBuilder::new().enable_waker(false).build_shared().expect("build reactor");
    let a = UdpSocket::bind(&reactor, loopback(0)).expect("bind a");
    let b = UdpSocket::bind(&reactor, loopback(0)).expect("bind b");
    let b_addr = b.local_addr().expect("local_addr");
    let a_addr = a.local_addr().expect("local_addr");

    let sent = Rc::new(RefCell::new(None));
    let sent2 = sent.clone();
    a.send_to_with(OwningBuffer::from(b"hello".to_vec()), b_addr, Completion::new(move |result| {
        *sent2.borrow_mut() = Some(result.expect("send_to succeeds"));
    }));
    assert_eq!(sent.borrow_mut().take(), Some(5), "send_to on an empty send buffer settles on the fast path");

    // The datagram above already landed in the kernel's receive buffer for
    // `b`, so this recv_from settles on the fast path too, with no reactor
    // turn needed to observe it.
    let received = Rc::new(RefCell::new(None));
    let received2 = received.clone();
    b.recv_from_with(OwningBuffer::zeroed(16), Completion::new(move |result| {
        *received2.borrow_mut() = Some(result.expect("recv_from succeeds"));
    }));
    let (buf, n, from) = received.borrow_mut().take().expect("recv_from settled on the fast path");
    assert_eq!(&buf.as_slice()[..n], b"hello");
    assert_eq!(from.port(), a_addr.port());
}

#[test]
fn connected_mode_send_and_recv_use_the_pending_queue() {
    let reactor = ReactorBuilder::new().enable_waker(false).build_shared().expect("build reactor");
    let a = UdpSocket::bind(&reactor, loopback(0)).expect("bind a");
    let b = UdpSocket::bind(&reactor, loopback(0)).expect("bind b");
    let a_addr = a.local_addr().expect("local_addr a");
    let b_addr = b.local_addr().expect("local_addr b");
    a.connect(b_addr).expect("connect a to b");
    b.connect(a_addr).expect("connect b to a");

    let wrote = Rc::new(RefCell::new(None));
    let wrote2 = wrote.clone();
    a.write_with(OwningBuffer::from(b"ohai".to_vec()), Completion::new(move |result| {
        *wrote2.borrow_mut() = Some(result.expect("write succeeds"));
    }));
    assert!(wrote.borrow().is_some(), "a connected-socket send completes synchronously on an empty send buffer");

    let read = Rc::new(RefCell::new(None));
    let read2 = read.clone();
    b.read_with(OwningBuffer::zeroed(4), Completion::new(move |result| {
        *read2.borrow_mut() = Some(result.expect("read succeeds"));
    }));
    for _ in 0..16 {
        if read.borrow().is_some() {
            break;
        }
        reactor.borrow_mut().turn().expect("turn");
    }
    let (buf, n) = read.borrow_mut().take().expect("read completed");
    assert_eq!(&buf.as_slice()[..n], b"ohai");
}

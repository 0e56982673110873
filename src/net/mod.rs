//! Networking: the address/DNS adapter (C4) and the socket façade (C9).

pub(crate) mod addr;
mod dns;
pub(crate) mod sockopt;
mod tcp;
mod udp;

pub use addr::{read_sockaddr, write_sockaddr, EncodedAddr, SockAddrStorage};
pub use dns::{resolve, AddressFamily, AddressRecord, ResolveHints};
pub use sockopt::option_size;
pub use tcp::{TcpListener, TcpStream};
pub use udp::UdpSocket;

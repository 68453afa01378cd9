use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};

/// Yield used inside every polling loop.
pub(crate) const POLL_YIELD: Duration = Duration::from_millis(10);

/// Binds a non-blocking UDP socket with SO_REUSEADDR.
///
/// Port 0 asks the OS to assign one; read it back via `local_addr`.
pub(crate) fn bind_udp(ip: Ipv4Addr, port: u16) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&SockAddr::from(SocketAddrV4::new(ip, port)))?;
    let socket: UdpSocket = socket.into();
    socket.set_nonblocking(true)?;
    Ok(socket)
}

/// One non-blocking receive attempt; `None` when nothing is queued.
pub(crate) fn try_recv(socket: &UdpSocket, buf: &mut [u8]) -> io::Result<Option<usize>> {
    match socket.recv_from(buf) {
        Ok((len, _)) => Ok(Some(len)),
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(err) => Err(err),
    }
}

/// Polls the socket until a datagram arrives or the timeout expires.
pub(crate) fn recv_within(
    socket: &UdpSocket,
    timeout: Duration,
    buf: &mut [u8],
) -> io::Result<Option<usize>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(len) = try_recv(socket, buf)? {
            return Ok(Some(len));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_YIELD);
    }
}

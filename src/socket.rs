//! The UDP datagram source: binds a socket, optionally joins a multicast
//! group, and yields raw datagram payloads to the framer.
//!
//! Built with `socket2` for the reuse-address and multicast calls
//! `std::net::UdpSocket` does not expose, then converted into a standard
//! `UdpSocket` for the actual blocking `recv_from` loop.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};

use crate::config::{Config, Multicast};

/// The maximum UDP payload this source will ever hand to the framer. TWSE
/// datagrams are expected not to exceed this; a larger datagram is
/// truncated by the kernel to this length before `recv_from` returns it.
pub const MAX_DATAGRAM_LEN: usize = 1500;

/// A bound, optionally multicast-joined UDP endpoint.
pub struct SocketSource {
    socket: Socket,
    std_socket: UdpSocket,
}

impl SocketSource {
    /// Creates and binds the endpoint per `config`. Any failure here
    /// (create, bind, reuse-address, multicast join, multicast interface)
    /// is fatal and terminates session startup rather than being retried.
    pub fn bind(config: &Config) -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;

        let bind_addr: SocketAddr =
            SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port).into();
        socket.bind(&bind_addr.into())?;
        log::info!("bound UDP socket on port {}", config.port);

        if let Some(multicast) = &config.multicast {
            join_multicast(&socket, multicast)?;
        }

        let std_socket: UdpSocket = socket.try_clone()?.into();
        // `shutdown` on an unconnected UDP socket does not reliably unblock
        // a pending `recv` on every platform; a short read timeout gives
        // `Stop` a bound on how long it waits regardless, and keeps the
        // receive loop responsive to the running flag.
        std_socket.set_read_timeout(Some(std::time::Duration::from_millis(200)))?;

        Ok(SocketSource { socket, std_socket })
    }

    /// Blocks until a datagram arrives, then returns the slice of `buf`
    /// actually filled. `buf` should be at least [`MAX_DATAGRAM_LEN`] bytes.
    ///
    /// A receive error other than "interrupted" or "bad descriptor" is
    /// fatal; the expected errors are surfaced as `Ok(&[])` so the caller
    /// can distinguish "nothing received because we're shutting down" from
    /// a real failure without matching on `io::Error` kinds itself.
    pub fn recv<'buf>(&self, buf: &'buf mut [u8]) -> io::Result<&'buf [u8]> {
        match self.std_socket.recv(buf) {
            Ok(len) => Ok(&buf[..len]),
            Err(e) if is_expected_shutdown_error(&e) => Ok(&[]),
            Err(e) => Err(e),
        }
    }

    /// Shuts the socket down for both directions, unblocking a concurrent
    /// blocking `recv`. Idempotent: a second call returns whatever the
    /// platform returns for shutting down an already-shutdown socket,
    /// which callers should not treat as fatal.
    pub fn shutdown(&self) -> io::Result<()> {
        self.socket.shutdown(std::net::Shutdown::Both)
    }
}

fn join_multicast(socket: &Socket, multicast: &Multicast) -> io::Result<()> {
    log::info!(
        "joining multicast group {} on interface {}",
        multicast.group,
        multicast.interface
    );
    socket.join_multicast_v4(&multicast.group, &multicast.interface)?;
    socket.set_multicast_if_v4(&multicast.interface)?;
    Ok(())
}

fn is_expected_shutdown_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::Interrupted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}

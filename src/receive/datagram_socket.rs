use std::io;
use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{info, trace, warn};
use crate::receive::config::ReceiveConfig;

/// This is an abstraction for receiving a single datagram, introduced to allow driving the
///  receive loop with synthetic datagrams in tests
#[async_trait]
pub trait DatagramSocket: Send + Sync + 'static {
    /// Waits for the next datagram and copies it into `buf`, returning its length. Datagrams
    ///  bigger than `buf` are truncated.
    async fn recv_datagram(&self, buf: &mut [u8]) -> io::Result<usize>;
}

#[async_trait]
impl DatagramSocket for UdpSocket {
    async fn recv_datagram(&self, buf: &mut [u8]) -> io::Result<usize> {
        let (len, from) = self.recv_from(buf).await?;
        trace!("received {} bytes from {:?}", len, from);
        Ok(len)
    }
}

/// Creates the UDP socket the receive loop listens on, with an enlarged kernel receive buffer.
///
/// Failure to create or bind the socket is an error, while failure to enlarge the receive buffer
///  is only logged: The tool works without it, but will likely see drops at high data rates.
pub fn bind_receive_socket(config: &ReceiveConfig) -> anyhow::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(config.bind_addr), Type::DGRAM, Some(Protocol::UDP))?;

    if let Err(e) = socket.set_recv_buffer_size(config.socket_receive_buffer_size) {
        warn!("could not set socket receive buffer size to {}: {}", config.socket_receive_buffer_size, e);
    }
    match socket.recv_buffer_size() {
        Ok(actual) if actual < config.socket_receive_buffer_size => {
            warn!("socket receive buffer size is {}, requested {} - check the OS limit (e.g. net.core.rmem_max)", actual, config.socket_receive_buffer_size);
        }
        Ok(actual) => info!("socket receive buffer size is {}", actual),
        Err(e) => warn!("could not read socket receive buffer size: {}", e),
    }

    if let Err(e) = socket.bind(&config.bind_addr.into()) {
        anyhow::bail!("could not bind to udp address {}: {}", config.bind_addr, e);
    }
    socket.set_nonblocking(true)?;

    let socket = UdpSocket::from_std(socket.into())?;
    info!("bound receive socket to {:?}", socket.local_addr()?);
    Ok(socket)
}

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use anyhow::bail;
use crate::stream::stream_stats::GIBIBYTE;

pub struct ReceiveConfig {
    pub bind_addr: SocketAddr,

    /// The receive loop terminates after this number of datagrams. `None` means there is no
    ///  limit.
    pub max_datagrams: Option<u64>,

    /// report every datagram rather than only failed ones
    pub verbose: bool,

    /// Maximum time to wait for a single datagram. Expiry is counted as a timeout, but the loop
    ///  continues waiting.
    pub wait_timeout: Duration,

    pub report_interval: Duration,

    /// This is the size of the (reused) receive buffer. Datagrams of this size or bigger are
    ///  treated as a framing error that terminates the receive loop, since they may have been
    ///  truncated.
    pub buffer_capacity: usize,

    /// The kernel's receive buffer for the socket (SO_RCVBUF). At high datagram rates, this
    ///  needs to be big to absorb bursts - the kernel drops datagrams that do not fit, and those
    ///  drops are indistinguishable from drops on the network.
    ///
    /// NB: The operating system may cap this (e.g. `net.core.rmem_max` on Linux)
    pub socket_receive_buffer_size: usize,
}

impl ReceiveConfig {
    pub const DEFAULT_BUFFER_CAPACITY: usize = 15000;

    pub fn default_for_port(port: u16) -> ReceiveConfig {
        ReceiveConfig {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
            max_datagrams: None,
            verbose: false,
            wait_timeout: Duration::from_secs(1),
            report_interval: Duration::from_secs(1),
            buffer_capacity: Self::DEFAULT_BUFFER_CAPACITY,
            socket_receive_buffer_size: GIBIBYTE as usize,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.buffer_capacity < 16 {
            bail!("receive buffer capacity must be at least 16 bytes, was {}", self.buffer_capacity);
        }
        if self.wait_timeout.is_zero() {
            bail!("wait timeout must not be zero");
        }
        if self.max_datagrams == Some(0) {
            bail!("maximum number of datagrams must not be zero - use `None` for 'unlimited'");
        }

        Ok(())
    }
}

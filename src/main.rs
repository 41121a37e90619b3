use clap::Parser;
use clap_derive::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, Level};
use udpverify::receive::config::ReceiveConfig;
use udpverify::receive::datagram_socket::bind_receive_socket;
use udpverify::receive::receive_loop::ReceiveLoop;
use udpverify::receive::report_sink::StdoutReportSink;

/// Verify and benchmark an incoming UDP stream
#[derive(Parser)]
struct Args {
    udp_port: u16,

    /// stop after this number of datagrams, 0 for unlimited
    #[clap(default_value_t = 0)]
    number_of_packets: u64,

    /// print a line for every datagram if > 0, not only for failed ones
    #[clap(default_value_t = 0)]
    debug: u32,

    #[clap(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    bind_address: IpAddr,

    /// requested kernel receive buffer size (SO_RCVBUF) in bytes
    #[clap(long)]
    socket_receive_buffer: Option<usize>,

    #[clap(long, default_value_t = ReceiveConfig::DEFAULT_BUFFER_CAPACITY)]
    buffer_capacity: usize,

    #[clap(long, default_value_t = 1000)]
    wait_timeout_ms: u64,

    #[clap(long, default_value_t = 1000)]
    report_interval_ms: u64,

    #[clap(long, default_value_t = Level::INFO)]
    log_level: Level,
}

#[tokio::main(flavor = "current_thread")]
pub async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(args.log_level)
        .try_init()
        .ok();

    let mut config = ReceiveConfig::default_for_port(args.udp_port);
    config.bind_addr = SocketAddr::new(args.bind_address, args.udp_port);
    config.max_datagrams = match args.number_of_packets {
        0 => None,
        n => Some(n),
    };
    config.verbose = args.debug > 0;
    config.buffer_capacity = args.buffer_capacity;
    config.wait_timeout = Duration::from_millis(args.wait_timeout_ms);
    config.report_interval = Duration::from_millis(args.report_interval_ms);
    if let Some(size) = args.socket_receive_buffer {
        config.socket_receive_buffer_size = size;
    }
    config.validate()?;

    let socket = bind_receive_socket(&config)?;
    let receive_loop = ReceiveLoop::new(Arc::new(config), Arc::new(socket), Arc::new(StdoutReportSink))?;

    let (shutdown_send, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl-C - shutting down");
                let _ = shutdown_send.send(true);
            }
            Err(e) => error!("could not listen for Ctrl-C: {}", e),
        }
    });

    let summary = receive_loop.run(shutdown).await;
    info!("terminated: {:?}", summary.termination);
    Ok(())
}

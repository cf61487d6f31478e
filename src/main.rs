use std::net::{SocketAddr, TcpStream};
use std::os::unix::io::IntoRawFd;
use std::process;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use peer_socket::{Exit, NetConfig, PeerBuffer, PeerLoop, PeerSocket, Result, Tos};

/// Connects to a peer over TCP, sends a message through a non-blocking peer
/// socket and prints whatever the peer sends back until it hangs up.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Address of the peer, e.g. `192.0.2.10:6881`.
    addr: SocketAddr,
    /// Bytes sent once connected.
    #[arg(short, long, default_value = "\x13BitTorrent protocol")]
    message: String,
    /// Type-of-service: `default`, `lowcost`, `le`, `throughput`, `lowdelay`
    /// or a number.
    #[arg(long, default_value_t = Tos::default())]
    tos: Tos,
    /// TCP congestion control algorithm (e.g. `cubic`, `bbr`).
    #[arg(long)]
    congestion: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    if let Err(err) = run(&args) {
        error!("{err}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let mut config = NetConfig::new().with_tos(args.tos);
    if let Some(ref algorithm) = args.congestion {
        config = config.with_congestion_algorithm(algorithm)?;
    }

    let stream = TcpStream::connect(args.addr)?;
    stream.set_nonblocking(true)?;

    let mut sock: PeerSocket = PeerSocket::from_tcp(&config, args.addr, stream.into_raw_fd());
    info!("connected to {}", sock.display_name());

    let mut outbound = PeerBuffer::from(args.message.as_bytes());
    let mut inbound = PeerBuffer::new();

    let result = PeerLoop::new()
        .and_then(PeerLoop::with_shutdown_signals)
        .and_then(|mut event_loop| event_loop.run(&mut sock, &mut outbound, &mut inbound));

    sock.close(&config);

    match result? {
        Exit::PeerClosed => {}
        Exit::Signal => info!("interrupted"),
    }

    let data = inbound.to_vec();
    info!(
        "received {} bytes from peer: {}",
        data.len(),
        String::from_utf8_lossy(&data).escape_debug()
    );

    Ok(())
}

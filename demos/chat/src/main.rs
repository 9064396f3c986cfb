//! rfcomm-chat
//!
//! Reads lines from stdin and sends each one as a message; prints received
//! messages and link events. The host keeps listening after its peer leaves.
//!
//! ```text
//! rfcomm-chat host --listen 127.0.0.1:7710
//! rfcomm-chat client --peer 127.0.0.1:7710
//! ```

mod cli;

use std::net::SocketAddr;

use anyhow::Context;
use rfcomm_link::prelude::*;
use rfcomm_link::transport::{TcpAdapter, TcpPeer};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, RoleCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => LinkConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => LinkConfig::default(),
    };

    let (link, mut events) = match &cli.role {
        RoleCommand::Host { listen } => {
            let (link, events) = open(TcpAdapter::new(*listen), config);
            link.start_as_host().await;
            (link, events)
        }
        RoleCommand::Client { peer, address } => {
            let paired = TcpPeer {
                address: PeerAddress::parse(address)?,
                endpoint: *peer,
            };
            let any: SocketAddr = "0.0.0.0:0".parse()?;
            let (link, events) = open(TcpAdapter::new(any).with_paired([paired]), config);
            link.connect_to_address(address).await?;
            (link, events)
        }
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => link.write(line.as_bytes()).await,
                None => break,
            },
            event = events.recv() => match event {
                Some(event) => report(event),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    link.shutdown().await;
    Ok(())
}

fn open(
    adapter: TcpAdapter,
    config: LinkConfig,
) -> (Link<TcpAdapter>, mpsc::UnboundedReceiver<LinkEvent<SocketAddr>>) {
    let link = Link::new(adapter, config);
    let (tx, rx) = mpsc::unbounded_channel();
    link.set_listener(tx);
    (link, rx)
}

fn report(event: LinkEvent<SocketAddr>) {
    match event {
        LinkEvent::MessageReceived(bytes) => println!("< {}", String::from_utf8_lossy(&bytes)),
        LinkEvent::MessageSent(bytes) => tracing::debug!(bytes = bytes.len(), "sent"),
        LinkEvent::Connected(peer) => println!("* connected to {}", peer),
        LinkEvent::WriteFailed { reason } => println!("! write failed: {}", reason),
        other => println!("* {}", other.kind()),
    }
}

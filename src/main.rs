use anyhow::{Context, Result};
use clap::Parser;
use lamport_hotel::{
    config::Config,
    hotel::Hotel,
    server::{client, spawn_dispatcher, Frame, HotelNode},
    transport::TcpTransport,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    config.validate()?;
    let listen_addr = config
        .listen_addr()
        .context("no peer address for this server")?;

    let peer_listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("bind peer listener on {listen_addr}"))?;
    let (transport, inbound) =
        TcpTransport::<Frame>::start(config.id, peer_listener, &config.peers);

    let hotel = Hotel::new(config.rooms, config.days);
    let node = Arc::new(HotelNode::new(config.id, config.peer_count(), hotel, transport)?);
    spawn_dispatcher(node.clone(), inbound);
    tracing::info!(
        id = config.id,
        peers = config.peer_count(),
        rooms = config.rooms,
        days = config.days,
        "hotel server started"
    );

    let client_listener = TcpListener::bind(config.client_addr)
        .await
        .with_context(|| format!("bind client listener on {}", config.client_addr))?;
    client::serve(client_listener, node)
        .await
        .context("client listener failed")
}

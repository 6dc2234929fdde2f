//! Newline-delimited JSON over TCP, one connection per ordered pair of peers.
//!
//! The dialing side opens the connection, announces itself with a [`Hello`] line and then only
//! writes; the accepting side only reads. A single writer task per link plus TCP's own ordering
//! gives FIFO delivery per link, so each peer gets at most one live inbound connection.

use super::{Transport, TransportError};
use crate::sync::lamport::PeerId;
use futures::{SinkExt, StreamExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
};
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, warn};

const CONNECT_RETRY: Duration = Duration::from_millis(250);

#[derive(Debug, Serialize, Deserialize)]
struct Hello {
    peer: PeerId,
}

pub type Inbound<P> = UnboundedReceiver<(PeerId, P)>;

type LiveLinks = Arc<parking_lot::Mutex<Vec<bool>>>;

// Holds a peer's inbound slot until the connection ends
struct LiveLink {
    peer: PeerId,
    live: LiveLinks,
}

impl LiveLink {
    fn claim(live: &LiveLinks, peer: PeerId) -> Result<Self, TransportError> {
        match live.lock().get_mut(peer) {
            None => Err(TransportError::UnknownPeer(peer)),
            Some(taken) if *taken => Err(TransportError::DuplicateLink(peer)),
            Some(taken) => {
                *taken = true;
                Ok(Self {
                    peer,
                    live: live.clone(),
                })
            }
        }
    }
}

impl Drop for LiveLink {
    fn drop(&mut self) {
        if let Some(taken) = self.live.lock().get_mut(self.peer) {
            *taken = false;
        }
    }
}

pub struct TcpTransport<P> {
    self_id: PeerId,
    // Indexed by peer id; `None` at our own slot
    links: Arc<Vec<Option<UnboundedSender<P>>>>,
}

impl<P> Clone for TcpTransport<P> {
    fn clone(&self) -> Self {
        Self {
            self_id: self.self_id,
            links: self.links.clone(),
        }
    }
}

impl<P> TcpTransport<P>
where
    P: Serialize + DeserializeOwned + Send + 'static,
{
    /// Starts accepting on `listener` and dialing every address in `peers` except our own.
    ///
    /// Must be called from within a tokio runtime. Payloads sent before a link is up are
    /// queued and go out in order once it connects.
    pub fn start(
        self_id: PeerId,
        listener: TcpListener,
        peers: &[SocketAddr],
    ) -> (Self, Inbound<P>) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        tokio::spawn(accept_loop(listener, peers.len(), inbound_tx));

        let links = peers
            .iter()
            .enumerate()
            .map(|(peer, addr)| {
                if peer == self_id {
                    return None;
                }
                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(dial(self_id, peer, *addr, rx));
                Some(tx)
            })
            .collect();

        let transport = Self {
            self_id,
            links: Arc::new(links),
        };
        (transport, inbound_rx)
    }
}

impl<P, M> Transport<M> for TcpTransport<P>
where
    P: Send,
    M: Into<P>,
{
    fn send(&self, to: PeerId, msg: M) -> Result<(), TransportError> {
        self.links
            .get(to)
            .and_then(Option::as_ref)
            .ok_or(TransportError::UnknownPeer(to))?
            .send(msg.into())
            .map_err(|_| TransportError::Disconnected(to))
    }
}

async fn dial<P: Serialize>(
    self_id: PeerId,
    peer: PeerId,
    addr: SocketAddr,
    mut outbound: UnboundedReceiver<P>,
) {
    let stream = loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => break stream,
            Err(error) => {
                debug!(peer, %addr, %error, "peer not reachable yet");
                tokio::time::sleep(CONNECT_RETRY).await;
            }
        }
    };
    info!(peer, %addr, "connected to peer");

    if let Err(error) = forward(self_id, stream, &mut outbound).await {
        warn!(peer, %error, "link to peer lost");
    }
}

async fn forward<P: Serialize>(
    self_id: PeerId,
    stream: TcpStream,
    outbound: &mut UnboundedReceiver<P>,
) -> Result<(), TransportError> {
    let mut lines = Framed::new(stream, LinesCodec::new());
    lines
        .send(serde_json::to_string(&Hello { peer: self_id })?)
        .await?;
    while let Some(payload) = outbound.recv().await {
        lines.send(serde_json::to_string(&payload)?).await?;
    }
    Ok(())
}

async fn accept_loop<P>(
    listener: TcpListener,
    peer_count: usize,
    inbound: UnboundedSender<(PeerId, P)>,
) where
    P: DeserializeOwned + Send + 'static,
{
    let live: LiveLinks = Arc::new(parking_lot::Mutex::new(vec![false; peer_count]));
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let inbound = inbound.clone();
                let live = live.clone();
                tokio::spawn(async move {
                    if let Err(error) = serve_link(stream, &live, inbound).await {
                        warn!(%addr, %error, "inbound link closed");
                    }
                });
            }
            Err(error) => warn!(%error, "failed to accept peer connection"),
        }
    }
}

async fn serve_link<P: DeserializeOwned>(
    stream: TcpStream,
    live: &LiveLinks,
    inbound: UnboundedSender<(PeerId, P)>,
) -> Result<(), TransportError> {
    let mut lines = Framed::new(stream, LinesCodec::new());
    let hello: Hello = match lines.next().await {
        Some(line) => serde_json::from_str(&line?)?,
        None => return Ok(()),
    };
    let _link = LiveLink::claim(live, hello.peer)?;
    debug!(peer = hello.peer, "peer link accepted");

    while let Some(line) = lines.next().await {
        let line = line?;
        match serde_json::from_str::<P>(&line) {
            Ok(payload) => {
                if inbound.send((hello.peer, payload)).is_err() {
                    break;
                }
            }
            Err(error) => warn!(peer = hello.peer, %error, "dropping malformed frame"),
        }
    }
    Ok(())
}

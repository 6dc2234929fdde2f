use super::{Transport, TransportError};
use crate::sync::lamport::PeerId;
use std::sync::{
    mpsc::{self, Receiver, Sender},
    Arc,
};
use std::thread::JoinHandle;

/// In-process link layer. Each peer owns one inbox; every sender pushes into it, so payloads
/// from any single peer keep their send order.
pub struct ChannelTransport<P> {
    self_id: PeerId,
    inboxes: Arc<Vec<Sender<(PeerId, P)>>>,
}

pub type Inbox<P> = Receiver<(PeerId, P)>;

impl<P> ChannelTransport<P> {
    /// Fully connected mesh of `n_peers`. Entry `i` is peer `i`'s transport and inbox.
    pub fn mesh(n_peers: usize) -> Vec<(Self, Inbox<P>)> {
        let (txs, rxs): (Vec<_>, Vec<_>) = (0..n_peers).map(|_| mpsc::channel()).unzip();
        let inboxes = Arc::new(txs);
        rxs.into_iter()
            .enumerate()
            .map(|(self_id, rx)| {
                let transport = Self {
                    self_id,
                    inboxes: inboxes.clone(),
                };
                (transport, rx)
            })
            .collect()
    }
}

impl<P> Clone for ChannelTransport<P> {
    fn clone(&self) -> Self {
        Self {
            self_id: self.self_id,
            inboxes: self.inboxes.clone(),
        }
    }
}

impl<P, M> Transport<M> for ChannelTransport<P>
where
    P: Send,
    M: Into<P>,
{
    fn send(&self, to: PeerId, msg: M) -> Result<(), TransportError> {
        if to == self.self_id {
            return Err(TransportError::UnknownPeer(to));
        }
        self.inboxes
            .get(to)
            .ok_or(TransportError::UnknownPeer(to))?
            .send((self.self_id, msg.into()))
            .map_err(|_| TransportError::Disconnected(to))
    }
}

/// Drains `inbox` on a dedicated thread until every sender is gone.
pub fn spawn_receiver<P, F>(inbox: Inbox<P>, mut handler: F) -> JoinHandle<()>
where
    P: Send + 'static,
    F: FnMut(PeerId, P) + Send + 'static,
{
    std::thread::spawn(move || {
        while let Ok((from, payload)) = inbox.recv() {
            handler(from, payload);
        }
    })
}

#[cfg(test)]
mod tests {
    use crate::transport::{channel::ChannelTransport, Transport, TransportError};

    #[test]
    fn per_link_fifo() {
        let mut mesh = ChannelTransport::<u32>::mesh(3);
        let (_, rx2) = mesh.pop().unwrap();
        let (t1, _rx1) = mesh.pop().unwrap();
        let (t0, _rx0) = mesh.pop().unwrap();

        let th0 = std::thread::spawn(move || {
            for i in 0..100u32 {
                t0.send(2, i).unwrap();
            }
        });
        let th1 = std::thread::spawn(move || {
            for i in 100..200u32 {
                t1.send(2, i).unwrap();
            }
        });
        th0.join().unwrap();
        th1.join().unwrap();

        let recvd: Vec<_> = rx2.try_iter().collect();
        assert_eq!(recvd.len(), 200);
        // Interleaving across links is arbitrary, order within each link is not
        for sender in 0..2 {
            let from: Vec<_> = recvd
                .iter()
                .filter(|(s, _)| *s == sender)
                .map(|(_, i)| *i)
                .collect();
            assert!(from.windows(2).all(|w| w[0] < w[1]));
            assert_eq!(from.len(), 100);
        }
    }

    #[test]
    fn unknown_and_closed_links() {
        let mut mesh = ChannelTransport::<u32>::mesh(2);
        let (t1, rx1) = mesh.pop().unwrap();
        let (t0, rx0) = mesh.pop().unwrap();

        assert!(matches!(t0.send(0, 1u32), Err(TransportError::UnknownPeer(0))));
        assert!(matches!(t0.send(7, 1u32), Err(TransportError::UnknownPeer(7))));

        drop(rx1);
        assert!(matches!(t0.send(1, 1u32), Err(TransportError::Disconnected(1))));
        t1.send(0, 5u32).unwrap();
        assert_eq!(rx0.recv().unwrap(), (1, 5));
    }
}

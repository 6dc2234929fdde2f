use super::command::{Command, Reply};
use super::{Frame, HotelNode, NodeError};
use crate::transport::TcpTransport;
use futures::{SinkExt, StreamExt};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{info, warn};

pub type TcpHotelNode = HotelNode<TcpTransport<Frame>>;

/// Accepts hotel clients forever, one task per connection.
pub async fn serve(listener: TcpListener, node: Arc<TcpHotelNode>) -> std::io::Result<()> {
    info!(addr = %listener.local_addr()?, "accepting clients");
    loop {
        let (stream, addr) = listener.accept().await?;
        let node = node.clone();
        tokio::spawn(async move {
            if let Err(error) = handle(stream, addr, node).await {
                warn!(%addr, %error, "client connection failed");
            }
        });
    }
}

async fn handle(
    stream: TcpStream,
    addr: SocketAddr,
    node: Arc<TcpHotelNode>,
) -> Result<(), tokio_util::codec::LinesCodecError> {
    info!(%addr, "client connected");
    let mut lines = Framed::new(stream, LinesCodec::new());

    while let Some(line) = lines.next().await {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let reply = match line.parse::<Command>() {
            Ok(command) => execute(&node, command).await,
            Err(error) => Reply::Error(error.to_string()),
        };
        lines.send(reply.to_string()).await?;
    }
    info!(%addr, "client disconnected");
    Ok(())
}

async fn execute(node: &Arc<TcpHotelNode>, command: Command) -> Reply {
    let result = match command {
        Command::Book {
            room,
            day,
            nights,
            client,
        } => {
            // Waiting for the grant blocks, keep it off the runtime threads
            let node = node.clone();
            let booking = tokio::task::spawn_blocking(move || node.book(room, day, nights, &client));
            match booking.await {
                Ok(booked) => booked.map(|r| Reply::Booked(r.room)),
                Err(error) => return Reply::Error(format!("booking task failed: {error}")),
            }
        }
        Command::List { day, client } => node.room_statuses(day, &client).map(Reply::Rooms),
        Command::Free { day, nights } => node.free_room(day, nights).map(Reply::Available),
    };
    result.unwrap_or_else(|error: NodeError| Reply::Error(error.to_string()))
}

#[cfg(test)]
mod tests {
    use crate::hotel::Hotel;
    use crate::server::{client, spawn_dispatcher, Frame, HotelNode};
    use crate::transport::TcpTransport;
    use futures::{SinkExt, StreamExt};
    use std::{net::SocketAddr, sync::Arc, time::Duration};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_util::codec::{Framed, LinesCodec};

    type Client = Framed<TcpStream, LinesCodec>;

    async fn start_cluster(n: usize) -> Vec<SocketAddr> {
        let mut peer_listeners = Vec::new();
        let mut peers = Vec::new();
        for _ in 0..n {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            peers.push(listener.local_addr().unwrap());
            peer_listeners.push(listener);
        }

        let mut client_addrs = Vec::new();
        for (id, listener) in peer_listeners.into_iter().enumerate() {
            let (transport, inbound) = TcpTransport::<Frame>::start(id, listener, &peers);
            let node = Arc::new(HotelNode::new(id, n, Hotel::new(2, 30), transport).unwrap());
            spawn_dispatcher(node.clone(), inbound);

            let clients = TcpListener::bind("127.0.0.1:0").await.unwrap();
            client_addrs.push(clients.local_addr().unwrap());
            tokio::spawn(client::serve(clients, node));
        }
        client_addrs
    }

    async fn connect(addr: SocketAddr) -> Client {
        Framed::new(TcpStream::connect(addr).await.unwrap(), LinesCodec::new())
    }

    async fn ask(client: &mut Client, line: &str) -> String {
        client.send(line).await.unwrap();
        client.next().await.unwrap().unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn books_over_tcp() {
        let addrs = start_cluster(2).await;
        let mut c0 = connect(addrs[0]).await;
        let mut c1 = connect(addrs[1]).await;

        assert_eq!(ask(&mut c0, "BOOK 1 3 2 ann").await, "OK room 1 booked");
        assert_eq!(ask(&mut c0, "bogus").await, r#"ERR unknown command "bogus""#);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(ask(&mut c1, "LIST 4 bob").await, "| Room: 1, Status: OCCUPIED");
        assert_eq!(c1.next().await.unwrap().unwrap(), "| Room: 2, Status: FREE");
        assert_eq!(c1.next().await.unwrap().unwrap(), "END");

        assert!(ask(&mut c1, "BOOK 1 4 1 bob")
            .await
            .starts_with("ERR room 1 is already booked"));
        assert_eq!(ask(&mut c1, "FREE 3 2").await, "OK room 2 available");
        assert_eq!(ask(&mut c1, "BOOK 2 3 2 bob").await, "OK room 2 booked");
    }
}

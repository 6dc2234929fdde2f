use crate::hotel::{Day, RoomId};
use crate::sync::lamport::PeerId;
use clap::Parser;
use std::net::SocketAddr;
use thiserror::Error;

/// One hotel server in a fixed cluster coordinated by Lamport's mutual exclusion.
#[derive(Debug, Clone, Parser)]
#[command(name = "hotel-server", version)]
pub struct Config {
    /// Identifier of this server, an index into `--peers`.
    #[arg(long)]
    pub id: PeerId,

    /// Peer-to-peer listen addresses of every server, ordered by identifier.
    #[arg(long, required = true, value_delimiter = ',')]
    pub peers: Vec<SocketAddr>,

    /// Address hotel clients connect to.
    #[arg(long, default_value = "127.0.0.1:7000")]
    pub client_addr: SocketAddr,

    #[arg(long, default_value_t = 10)]
    pub rooms: RoomId,

    #[arg(long, default_value_t = 31)]
    pub days: Day,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("--id {id} is out of range for {peers} peer address(es)")]
    IdOutOfRange { id: PeerId, peers: usize },
    #[error("the hotel needs at least one room")]
    NoRooms,
    #[error("the hotel needs at least one day")]
    NoDays,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id >= self.peers.len() {
            return Err(ConfigError::IdOutOfRange {
                id: self.id,
                peers: self.peers.len(),
            });
        }
        if self.rooms == 0 {
            return Err(ConfigError::NoRooms);
        }
        if self.days == 0 {
            return Err(ConfigError::NoDays);
        }
        Ok(())
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Where this server accepts its peers.
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        self.peers.get(self.id).copied()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Config, ConfigError};
    use clap::Parser;

    #[test]
    fn parses_cluster() {
        let config = Config::try_parse_from([
            "hotel-server",
            "--id",
            "1",
            "--peers",
            "127.0.0.1:6000,127.0.0.1:6001,127.0.0.1:6002",
            "--rooms",
            "4",
        ])
        .unwrap();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.peer_count(), 3);
        assert_eq!(config.listen_addr(), Some("127.0.0.1:6001".parse().unwrap()));
        assert_eq!(config.rooms, 4);
        assert_eq!(config.days, 31);
        assert_eq!(config.client_addr, "127.0.0.1:7000".parse().unwrap());
    }

    #[test]
    fn rejects_bad_cluster() {
        let config = Config::try_parse_from([
            "hotel-server",
            "--id",
            "2",
            "--peers",
            "127.0.0.1:6000,127.0.0.1:6001",
        ])
        .unwrap();
        assert_eq!(
            config.validate(),
            Err(ConfigError::IdOutOfRange { id: 2, peers: 2 })
        );

        let config = Config::try_parse_from([
            "hotel-server",
            "--id",
            "0",
            "--peers",
            "127.0.0.1:6000",
            "--days",
            "0",
        ])
        .unwrap();
        assert_eq!(config.validate(), Err(ConfigError::NoDays));

        assert!(Config::try_parse_from(["hotel-server", "--id", "0"]).is_err());
        let bad_addr = ["hotel-server", "--id", "0", "--peers", "nope"];
        assert!(Config::try_parse_from(bad_addr).is_err());
    }
}

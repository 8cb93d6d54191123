use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind listener on {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to connect to peer {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("peer address list has {got} entries, expected {expected}")]
    PeerCountMismatch { got: usize, expected: usize },

    #[error("rank {rank} is out of range for cluster size {size}")]
    RankOutOfRange { rank: usize, size: usize },
}

//! Resolves one process's cluster configuration from its argv and
//! environment: the CLI carries the four timing/log knobs spec.md names
//! explicitly, while rank/size/peer addresses come from the launcher
//! out-of-band, here via environment variables.

use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("usage: <binary> <min_timeout_ms> <max_timeout_ms> <fail_chance> <log_file_prefix>, got {argc} argument(s)")]
    BadArgc { argc: usize },

    #[error("min_timeout_ms and max_timeout_ms must be positive integers with min <= max")]
    BadTimeoutRange,

    #[error("fail_chance must be a non-negative number")]
    BadFailChance,

    #[error("environment variable {name} is not set")]
    MissingEnv { name: &'static str },

    #[error("environment variable {name} has an invalid value: {value}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("RAFT_PEERS has {got} entries, expected RAFT_SIZE={expected}")]
    PeerCountMismatch { got: usize, expected: usize },

    #[error("RAFT_RANK {rank} is out of range for RAFT_SIZE {size}")]
    RankOutOfRange { rank: usize, size: usize },
}

pub struct Config {
    pub min_timeout_ms: u64,
    pub max_timeout_ms: u64,
    pub fail_chance: f64,
    pub log_file_prefix: String,
    pub rank: usize,
    pub size: usize,
    pub peers: Vec<SocketAddr>,
}

impl Config {
    pub fn from_env(args: &[String]) -> Result<Self, ConfigError> {
        if args.len() != 4 {
            return Err(ConfigError::BadArgc { argc: args.len() });
        }

        let min_timeout_ms: u64 = args[0]
            .parse()
            .map_err(|_| ConfigError::BadTimeoutRange)?;
        let max_timeout_ms: u64 = args[1]
            .parse()
            .map_err(|_| ConfigError::BadTimeoutRange)?;
        if min_timeout_ms == 0 || min_timeout_ms > max_timeout_ms {
            return Err(ConfigError::BadTimeoutRange);
        }

        let fail_chance: f64 = args[2].parse().map_err(|_| ConfigError::BadFailChance)?;
        if fail_chance < 0.0 || !fail_chance.is_finite() {
            return Err(ConfigError::BadFailChance);
        }

        let log_file_prefix = args[3].clone();

        let rank = read_env_usize("RAFT_RANK")?;
        let size = read_env_usize("RAFT_SIZE")?;
        if rank >= size {
            return Err(ConfigError::RankOutOfRange { rank, size });
        }

        let peers_raw = std::env::var("RAFT_PEERS")
            .map_err(|_| ConfigError::MissingEnv { name: "RAFT_PEERS" })?;
        let peers: Vec<SocketAddr> = peers_raw
            .split(',')
            .map(|entry| {
                entry
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidEnv {
                        name: "RAFT_PEERS",
                        value: peers_raw.clone(),
                    })
            })
            .collect::<Result<_, _>>()?;
        if peers.len() != size {
            return Err(ConfigError::PeerCountMismatch {
                got: peers.len(),
                expected: size,
            });
        }

        Ok(Config {
            min_timeout_ms,
            max_timeout_ms,
            fail_chance,
            log_file_prefix,
            rank,
            size,
            peers,
        })
    }

    pub fn log_file_path(&self) -> String {
        format!("{}{}.log", self.log_file_prefix, self.rank)
    }
}

fn read_env_usize(name: &'static str) -> Result<usize, ConfigError> {
    let value = std::env::var(name).map_err(|_| ConfigError::MissingEnv { name })?;
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { name, value })
}

//! One-process-per-rank Raft leader-election node.
//!
//! Resolves its configuration from argv and environment (see
//! [`config::Config`]), opens its log file, establishes the cluster's TCP
//! mesh, waits at the startup barrier, then runs the election state machine
//! forever.

mod config;

use raft_core::{FailSpec, NodeConfig, RaftNode, ThreadRandomSource};
use raft_logging::{LogLevel, Logger};
use raft_transport::TcpTransport;

use config::Config;

#[tokio::main]
async fn main() {
    let argv: Vec<String> = std::env::args().skip(1).collect();

    let cfg = match Config::from_env(&argv) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(-1);
        }
    };

    let logger = match Logger::new(cfg.log_file_path(), LogLevel::Debug) {
        Ok(logger) => logger,
        Err(err) => {
            eprintln!("failed to open log file: {err}");
            std::process::exit(-1);
        }
    };

    let transport = match TcpTransport::bind(cfg.rank, cfg.peers.clone()).await {
        Ok(transport) => transport,
        Err(err) => {
            eprintln!("failed to establish cluster transport: {err}");
            std::process::exit(-1);
        }
    };
    transport.barrier().await;

    let node_config = NodeConfig {
        min_timeout_ms: cfg.min_timeout_ms,
        max_timeout_ms: cfg.max_timeout_ms,
        fail_spec: FailSpec::Chance(cfg.fail_chance),
    };

    let mut node = RaftNode::new(transport, ThreadRandomSource, logger, node_config);
    node.run().await;
}

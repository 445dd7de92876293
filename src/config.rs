//! Command line configuration.

use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use crate::replication::Role;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("invalid --replicaof value {0:?}, expected \"<host> <port>\"")]
    InvalidReplicaOf(String),
}

#[derive(Parser, Debug)]
#[command(name = "redlite", version, about = "Redis-compatible in-memory key-value server")]
pub struct Cli {
    /// Port to listen on.
    #[arg(long, default_value_t = 6379)]
    pub port: u16,

    /// Replicate from "<host> <port>". When absent this node is a master.
    #[arg(long)]
    pub replicaof: Option<String>,

    /// Directory holding the snapshot file to load at startup.
    #[arg(long)]
    pub dir: Option<String>,

    /// Snapshot file name inside --dir.
    #[arg(long)]
    pub dbfilename: Option<String>,
}

/// Resolved server configuration, shared read-only across all tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub master_addr: Option<(String, u16)>,
    pub dir: Option<String>,
    pub dbfilename: Option<String>,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let master_addr = match cli.replicaof {
            Some(ref replicaof) => Some(parse_replica_of(replicaof)?),
            None => None,
        };

        Ok(Self {
            port: cli.port,
            master_addr,
            dir: cli.dir,
            dbfilename: cli.dbfilename,
        })
    }

    pub fn role(&self) -> Role {
        if self.master_addr.is_some() {
            Role::Replica
        } else {
            Role::Master
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    /// Path of the configured snapshot, when both flags were given.
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        match (&self.dir, &self.dbfilename) {
            (Some(dir), Some(file)) => Some(PathBuf::from(dir).join(file)),
            _ => None,
        }
    }
}

fn parse_replica_of(replicaof: &str) -> Result<(String, u16), ConfigError> {
    let parts: Vec<&str> = replicaof.split_whitespace().collect();
    if parts.len() != 2 {
        return Err(ConfigError::InvalidReplicaOf(replicaof.to_string()));
    }
    let port = parts[1]
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidReplicaOf(replicaof.to_string()))?;
    Ok((parts[0].to_string(), port))
}

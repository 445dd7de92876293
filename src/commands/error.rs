//! Command-level errors.
//!
//! Every variant here becomes a RESP error reply on the connection that
//! issued the command; the connection itself always survives. Protocol
//! desync is the only connection-fatal condition and lives in
//! [`crate::resp::RespError`].

use thiserror::Error;

use crate::resp::RespValue;
use crate::store::StoreError;
use crate::stream::StreamIdError;

#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("command frame must be an array of bulk strings")]
    InvalidFrame,
    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),
    #[error("unknown SET modifier '{0}'")]
    UnknownSetModifier(String),
    #[error("invalid expire time in 'set' command")]
    InvalidExpiration,
    #[error("MULTI calls can not be nested")]
    NestedMulti,
    #[error("EXEC without MULTI")]
    ExecWithoutMulti,
    #[error("DISCARD without MULTI")]
    DiscardWithoutMulti,
    #[error("unsupported INFO section '{0}'")]
    UnknownInfoSection(String),
    #[error("unsupported CONFIG parameter '{0}'")]
    UnknownConfigParameter(String),
    #[error("invalid REPLCONF argument")]
    InvalidReplconfArgument,
    #[error("invalid PSYNC replication id")]
    InvalidPsyncReplicationId,
    #[error("invalid PSYNC offset")]
    InvalidPsyncOffset,
    #[error("timeout is not an integer or out of range")]
    InvalidWaitArgument,
    #[error("invalid XREAD BLOCK duration")]
    InvalidBlockDuration,
    #[error("replica can only serve read commands from clients")]
    ReplicaReadOnly,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    StreamId(#[from] StreamIdError),
}

impl CommandError {
    /// Renders the error as a RESP error reply. Wrong-type errors carry
    /// their own `WRONGTYPE` code; everything else gets the generic `ERR`
    /// prefix.
    pub fn to_reply(&self) -> RespValue {
        let message = self.to_string();
        if message.starts_with("WRONGTYPE") {
            RespValue::Error(message)
        } else {
            RespValue::Error(format!("ERR {}", message))
        }
    }
}

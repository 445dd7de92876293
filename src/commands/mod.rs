//! Command parsing, dispatch, and the individual command handlers.

pub mod config_get;
pub mod dispatcher;
mod echo;
mod error;
mod get;
mod incr;
pub mod info;
mod keys;
mod ping;
pub mod psync;
pub mod registry;
pub mod replconf;
mod set;
mod stream_utils;
pub mod transactions;
mod type_command;
pub mod wait;
mod xadd;
mod xrange;
mod xread;

pub use dispatcher::{
    apply_replicated, handle_master_command, handle_replica_client_command, Outcome,
};
pub use error::CommandError;
pub use registry::{resolve, Command, CommandSpec, SUPPORTED_COMMANDS};
pub use transactions::Transaction;

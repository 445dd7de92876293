//! Role-aware command dispatch.
//!
//! The connection server decodes frames into [`Command`]s and hands them
//! here. A master accepts the whole command table, queues queueable
//! commands into an open transaction, and propagates applied writes to
//! its replicas. A replica serves only the read side to its own clients;
//! the commands streamed over its master link are applied through
//! [`apply_replicated`] without producing client replies.

use tracing::debug;

use crate::commands::registry::Command;
use crate::commands::transactions::Transaction;
use crate::commands::{
    config_get, echo, get, incr, info, keys, ping, psync, replconf, set, type_command, wait,
    xadd, xrange, xread, CommandError,
};
use crate::config::Config;
use crate::replication::ReplicationState;
use crate::resp::RespValue;
use crate::store::Store;

/// What the connection loop should do after dispatching one command.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// Encode and send this reply.
    Reply(RespValue),
    /// Send nothing.
    Silent,
    /// Send the FULLRESYNC header and snapshot, then convert this
    /// connection into a registered replica link.
    FullResync(RespValue),
}

/// Executes one command on a master connection.
pub async fn handle_master_command(
    config: &Config,
    store: &Store,
    replication: &ReplicationState,
    txn: &mut Transaction,
    command: Command,
) -> Result<Outcome, CommandError> {
    if txn.is_open() && command.spec.queueable {
        txn.push(command);
        return Ok(Outcome::Reply(RespValue::SimpleString(
            "QUEUED".to_string(),
        )));
    }

    match command.name() {
        "MULTI" => {
            expect_no_args(&command, "MULTI")?;
            txn.begin()?;
            Ok(Outcome::Reply(RespValue::SimpleString("OK".to_string())))
        }
        "EXEC" => {
            expect_no_args(&command, "EXEC")?;
            let queued = txn.take()?;
            let mut replies = Vec::with_capacity(queued.len());
            for queued_command in &queued {
                match apply(config, store, replication, queued_command).await {
                    Ok(reply) => replies.push(reply),
                    // A failing command only poisons its own slot.
                    Err(err) => replies.push(err.to_reply()),
                }
            }
            for queued_command in &queued {
                if queued_command.spec.is_write {
                    replication.propagate(queued_command.to_wire()).await;
                }
            }
            Ok(Outcome::Reply(RespValue::Array(replies)))
        }
        "DISCARD" => {
            expect_no_args(&command, "DISCARD")?;
            txn.discard()?;
            Ok(Outcome::Reply(RespValue::SimpleString("OK".to_string())))
        }
        "PSYNC" => Ok(Outcome::FullResync(psync::fullresync_header(
            replication,
            command.args(),
        )?)),
        "WAIT" => Ok(Outcome::Reply(
            wait::wait(replication, command.args()).await?,
        )),
        "REPLCONF" => Ok(Outcome::Reply(replconf::replconf(command.args())?)),
        "REPLCONF GETACK" => Ok(Outcome::Reply(replconf::replconf_getack(
            replication,
            command.args(),
        )?)),
        // Acks normally arrive on a registered replica link; one sent by
        // an ordinary client has nothing to update.
        "REPLCONF ACK" => Ok(Outcome::Silent),
        _ => {
            let reply = apply(config, store, replication, &command).await?;
            if command.spec.is_write {
                replication.propagate(command.to_wire()).await;
            }
            Ok(Outcome::Reply(reply))
        }
    }
}

/// Executes one command arriving from a client on a replica node. Only
/// the read side of the table is served; writes and replication control
/// belong to the master.
pub async fn handle_replica_client_command(
    config: &Config,
    store: &Store,
    replication: &ReplicationState,
    command: Command,
) -> Result<Outcome, CommandError> {
    match command.name() {
        "ECHO" | "GET" | "KEYS" | "TYPE" | "XRANGE" | "XREAD" | "INFO" | "CONFIG GET" => {
            let reply = apply(config, store, replication, &command).await?;
            Ok(Outcome::Reply(reply))
        }
        "REPLCONF" => Ok(Outcome::Reply(replconf::replconf(command.args())?)),
        "REPLCONF GETACK" => Ok(Outcome::Reply(replconf::replconf_getack(
            replication,
            command.args(),
        )?)),
        _ => Err(CommandError::ReplicaReadOnly),
    }
}

/// Applies one command streamed over the master link. Most commands
/// produce no reply (the master is not a normal client); only
/// `REPLCONF GETACK` answers, reporting the offset accumulated before
/// the GETACK frame itself. The caller advances the offset by the
/// command's wire length afterwards, whether or not it applied cleanly.
pub async fn apply_replicated(
    store: &Store,
    replication: &ReplicationState,
    command: &Command,
) -> Option<RespValue> {
    match command.name() {
        "SET" => {
            if let Err(err) = set::set(store, command.args()).await {
                debug!(%err, "replicated SET failed");
            }
            None
        }
        "INCR" => {
            if let Err(err) = incr::incr(store, command.args()).await {
                debug!(%err, "replicated INCR failed");
            }
            None
        }
        "XADD" => {
            if let Err(err) = xadd::xadd(store, command.args()).await {
                debug!(%err, "replicated XADD failed");
            }
            None
        }
        "PING" => None,
        "REPLCONF GETACK" => match replconf::replconf_getack(replication, command.args()) {
            Ok(reply) => Some(reply),
            Err(err) => {
                debug!(%err, "malformed GETACK from master");
                None
            }
        },
        other => {
            debug!(command = other, "ignoring non-write command from master");
            None
        }
    }
}

/// The shared read/write command core used by direct dispatch and EXEC.
async fn apply(
    config: &Config,
    store: &Store,
    replication: &ReplicationState,
    command: &Command,
) -> Result<RespValue, CommandError> {
    let args = command.args();
    match command.name() {
        "PING" => ping::ping(args),
        "ECHO" => echo::echo(args),
        "GET" => get::get(store, args).await,
        "SET" => set::set(store, args).await,
        "INCR" => incr::incr(store, args).await,
        "KEYS" => keys::keys(store, args).await,
        "TYPE" => type_command::type_command(store, args).await,
        "XADD" => xadd::xadd(store, args).await,
        "XRANGE" => xrange::xrange(store, args).await,
        "XREAD" => xread::xread(store, args).await,
        "INFO" => info::info(replication, args),
        "CONFIG GET" => config_get::config_get(config, args),
        other => Err(CommandError::UnknownCommand(other.to_string())),
    }
}

fn expect_no_args(command: &Command, name: &'static str) -> Result<(), CommandError> {
    if command.args().is_empty() {
        Ok(())
    } else {
        Err(CommandError::WrongArity(name))
    }
}

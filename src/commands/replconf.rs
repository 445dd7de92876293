use crate::commands::CommandError;
use crate::replication::ReplicationState;
use crate::resp::RespValue;

/// Generic REPLCONF configuration during the handshake: the master
/// acknowledges `listening-port <port>` and `capa psync2` with OK.
pub fn replconf(args: &[String]) -> Result<RespValue, CommandError> {
    let [key, value] = args else {
        return Err(CommandError::WrongArity("REPLCONF"));
    };

    match key.to_ascii_lowercase().as_str() {
        "listening-port" => {
            value
                .parse::<u16>()
                .map_err(|_| CommandError::InvalidReplconfArgument)?;
        }
        "capa" => {
            if value != "psync2" {
                return Err(CommandError::InvalidReplconfArgument);
            }
        }
        _ => return Err(CommandError::InvalidReplconfArgument),
    }

    Ok(RespValue::SimpleString("OK".to_string()))
}

/// `REPLCONF GETACK *`: report the offset of everything applied so far.
/// The reply is an array because it travels back over the replication
/// stream, not a normal client reply channel.
pub fn replconf_getack(
    replication: &ReplicationState,
    args: &[String],
) -> Result<RespValue, CommandError> {
    match args {
        [star] if star == "*" => Ok(RespValue::command(&[
            "REPLCONF",
            "ACK",
            &replication.offset().to_string(),
        ])),
        _ => Err(CommandError::InvalidReplconfArgument),
    }
}

/// Parses the offset out of a `REPLCONF ACK <offset>` sent by a replica.
pub fn parse_ack_offset(args: &[String]) -> Result<u64, CommandError> {
    match args {
        [offset] => offset
            .parse::<u64>()
            .map_err(|_| CommandError::InvalidReplconfArgument),
        _ => Err(CommandError::WrongArity("REPLCONF ACK")),
    }
}

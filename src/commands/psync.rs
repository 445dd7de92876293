use crate::commands::CommandError;
use crate::replication::ReplicationState;
use crate::resp::RespValue;

/// Parsed arguments for PSYNC. A first-time replica sends `?` and `-1`;
/// anything else must name this master's replication id.
pub struct PsyncArguments {
    pub replication_id: String,
    pub offset: i64,
}

impl PsyncArguments {
    pub fn parse(args: &[String]) -> Result<Self, CommandError> {
        let [replication_id, offset] = args else {
            return Err(CommandError::WrongArity("PSYNC"));
        };

        let offset = offset
            .parse::<i64>()
            .map_err(|_| CommandError::InvalidPsyncOffset)?;

        Ok(Self {
            replication_id: replication_id.clone(),
            offset,
        })
    }
}

/// Validates a PSYNC request and builds the `+FULLRESYNC <id> <offset>`
/// header. The caller follows up with the raw snapshot payload and then
/// registers the connection as a replica.
pub fn fullresync_header(
    replication: &ReplicationState,
    args: &[String],
) -> Result<RespValue, CommandError> {
    let parsed = PsyncArguments::parse(args)?;

    if parsed.replication_id != "?" && parsed.replication_id != replication.replication_id() {
        return Err(CommandError::InvalidPsyncReplicationId);
    }

    Ok(RespValue::SimpleString(format!(
        "FULLRESYNC {} {}",
        replication.replication_id(),
        replication.offset()
    )))
}

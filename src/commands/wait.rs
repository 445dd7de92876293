use std::time::Duration;

use crate::commands::CommandError;
use crate::replication::ReplicationState;
use crate::resp::RespValue;

/// Parsed arguments for `WAIT numreplicas timeout`. A timeout of zero
/// means block until the requested quorum is reached.
pub struct WaitArguments {
    pub needed: usize,
    pub timeout: Option<Duration>,
}

impl WaitArguments {
    pub fn parse(args: &[String]) -> Result<Self, CommandError> {
        let [needed, timeout_millis] = args else {
            return Err(CommandError::WrongArity("WAIT"));
        };

        let needed = needed
            .parse::<usize>()
            .map_err(|_| CommandError::InvalidWaitArgument)?;
        let timeout_millis = timeout_millis
            .parse::<u64>()
            .map_err(|_| CommandError::InvalidWaitArgument)?;

        Ok(Self {
            needed,
            timeout: (timeout_millis > 0).then(|| Duration::from_millis(timeout_millis)),
        })
    }
}

/// Blocks the calling connection until enough replicas acknowledge the
/// current offset or the timeout elapses, and replies with the number of
/// acknowledgements observed. Only this connection's task blocks; the
/// rest of the server keeps serving.
pub async fn wait(
    replication: &ReplicationState,
    args: &[String],
) -> Result<RespValue, CommandError> {
    let parsed = WaitArguments::parse(args)?;
    let acked = replication
        .wait_for_acks(parsed.needed, parsed.timeout)
        .await;
    Ok(RespValue::Integer(acked as i64))
}

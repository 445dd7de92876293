use crate::commands::CommandError;
use crate::resp::RespValue;
use crate::store::Store;

/// Parsed arguments for the SET command.
///
/// Two shapes are accepted: `SET key value` for permanent storage and
/// `SET key value PX <millis>` for storage with a millisecond TTL. Any
/// other argument count, an unknown modifier in the PX position, or a
/// non-numeric TTL is rejected with a descriptive error.
pub struct SetArguments {
    key: String,
    value: String,
    ttl_millis: Option<u64>,
}

impl SetArguments {
    pub fn parse(args: &[String]) -> Result<Self, CommandError> {
        let ttl_millis = match args.len() {
            2 => None,
            4 => {
                if !args[2].eq_ignore_ascii_case("px") {
                    return Err(CommandError::UnknownSetModifier(args[2].clone()));
                }
                let millis = args[3]
                    .parse::<u64>()
                    .map_err(|_| CommandError::InvalidExpiration)?;
                Some(millis)
            }
            _ => return Err(CommandError::WrongArity("SET")),
        };

        Ok(Self {
            key: args[0].clone(),
            value: args[1].clone(),
            ttl_millis,
        })
    }
}

pub async fn set(store: &Store, args: &[String]) -> Result<RespValue, CommandError> {
    let parsed = SetArguments::parse(args)?;
    store.set(parsed.key, parsed.value, parsed.ttl_millis).await;
    Ok(RespValue::SimpleString("OK".to_string()))
}

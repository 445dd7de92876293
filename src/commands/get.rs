use crate::commands::CommandError;
use crate::resp::RespValue;
use crate::store::Store;

/// Returns the live value for a key, or a null bulk string when the key
/// is absent or expired. Reading never removes an expired entry.
pub async fn get(store: &Store, args: &[String]) -> Result<RespValue, CommandError> {
    let [key] = args else {
        return Err(CommandError::WrongArity("GET"));
    };

    match store.get(key).await {
        Some(value) => Ok(RespValue::BulkString(value)),
        None => Ok(RespValue::NullBulkString),
    }
}

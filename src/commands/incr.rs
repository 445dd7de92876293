use crate::commands::CommandError;
use crate::resp::RespValue;
use crate::store::Store;

/// Parses the current value as a base-10 integer, increments it, and
/// stores it back as a string. An absent key initializes to 1; a
/// non-numeric value is an error and leaves the store untouched.
pub async fn incr(store: &Store, args: &[String]) -> Result<RespValue, CommandError> {
    let [key] = args else {
        return Err(CommandError::WrongArity("INCR"));
    };

    let incremented = store.incr(key).await?;
    Ok(RespValue::Integer(incremented))
}

use crate::commands::CommandError;
use crate::config::Config;
use crate::resp::RespValue;

/// CONFIG GET for the two supported parameters, `dir` and `dbfilename`.
/// Replies `[name, value]`, with an empty value when the flag was not set.
pub fn config_get(config: &Config, args: &[String]) -> Result<RespValue, CommandError> {
    let [parameter] = args else {
        return Err(CommandError::WrongArity("CONFIG GET"));
    };

    let value = match parameter.to_ascii_lowercase().as_str() {
        "dir" => config.dir.clone().unwrap_or_default(),
        "dbfilename" => config.dbfilename.clone().unwrap_or_default(),
        _ => return Err(CommandError::UnknownConfigParameter(parameter.clone())),
    };

    Ok(RespValue::Array(vec![
        RespValue::BulkString(parameter.clone()),
        RespValue::BulkString(value),
    ]))
}

use crate::commands::CommandError;
use crate::resp::RespValue;

pub fn ping(args: &[String]) -> Result<RespValue, CommandError> {
    if !args.is_empty() {
        return Err(CommandError::WrongArity("PING"));
    }
    Ok(RespValue::SimpleString("PONG".to_string()))
}

#[cfg(test)]
mod tests {
    use super::ping;
    use crate::commands::CommandError;
    use crate::resp::RespValue;

    #[test]
    fn test_ping() {
        assert_eq!(
            ping(&[]),
            Ok(RespValue::SimpleString("PONG".to_string()))
        );
        assert_eq!(
            ping(&["extra".to_string()]),
            Err(CommandError::WrongArity("PING"))
        );
    }
}

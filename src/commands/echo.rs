use crate::commands::CommandError;
use crate::resp::RespValue;

pub fn echo(args: &[String]) -> Result<RespValue, CommandError> {
    match args {
        [message] => Ok(RespValue::BulkString(message.clone())),
        _ => Err(CommandError::WrongArity("ECHO")),
    }
}

#[cfg(test)]
mod tests {
    use super::echo;
    use crate::commands::CommandError;
    use crate::resp::RespValue;

    #[test]
    fn test_echo() {
        assert_eq!(
            echo(&["hey".to_string()]),
            Ok(RespValue::BulkString("hey".to_string()))
        );
        assert_eq!(echo(&[]), Err(CommandError::WrongArity("ECHO")));
        assert_eq!(
            echo(&["a".to_string(), "b".to_string()]),
            Err(CommandError::WrongArity("ECHO"))
        );
    }
}

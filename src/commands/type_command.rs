use crate::commands::CommandError;
use crate::resp::RespValue;
use crate::store::Store;

pub async fn type_command(store: &Store, args: &[String]) -> Result<RespValue, CommandError> {
    let [key] = args else {
        return Err(CommandError::WrongArity("TYPE"));
    };

    Ok(RespValue::SimpleString(
        store.value_type(key).await.to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::type_command;
    use crate::resp::RespValue;
    use crate::store::Store;

    #[tokio::test]
    async fn test_type_command() {
        let store = Store::new();
        store.set("text".to_string(), "x".to_string(), None).await;
        store
            .append_stream_entry("log", "1-1", vec![("f".to_string(), "v".to_string())])
            .await
            .unwrap();

        let test_cases = vec![("text", "string"), ("log", "stream"), ("missing", "none")];

        for (key, expected) in test_cases {
            assert_eq!(
                type_command(&store, &[key.to_string()]).await,
                Ok(RespValue::SimpleString(expected.to_string())),
                "TYPE {}",
                key
            );
        }
    }
}

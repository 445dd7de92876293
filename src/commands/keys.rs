use crate::commands::CommandError;
use crate::resp::RespValue;
use crate::store::Store;

/// Lists stored key names. `*` matches every key; any other pattern is an
/// exact match. Expired entries are not filtered out here; that follows
/// the store's construction-time choice.
pub async fn keys(store: &Store, args: &[String]) -> Result<RespValue, CommandError> {
    let [pattern] = args else {
        return Err(CommandError::WrongArity("KEYS"));
    };

    let mut names = store.keys(pattern).await;
    names.sort();
    Ok(RespValue::Array(
        names.into_iter().map(RespValue::BulkString).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::keys;
    use crate::resp::RespValue;
    use crate::store::Store;

    #[tokio::test]
    async fn test_keys_lists_everything_for_star() {
        let store = Store::new();
        store.set("b".to_string(), "2".to_string(), None).await;
        store.set("a".to_string(), "1".to_string(), None).await;

        assert_eq!(
            keys(&store, &["*".to_string()]).await,
            Ok(RespValue::Array(vec![
                RespValue::BulkString("a".to_string()),
                RespValue::BulkString("b".to_string()),
            ]))
        );
    }

    #[tokio::test]
    async fn test_keys_exact_match() {
        let store = Store::new();
        store.set("a".to_string(), "1".to_string(), None).await;

        assert_eq!(
            keys(&store, &["a".to_string()]).await,
            Ok(RespValue::Array(vec![RespValue::BulkString(
                "a".to_string()
            )]))
        );
        assert_eq!(
            keys(&store, &["zzz".to_string()]).await,
            Ok(RespValue::Array(vec![]))
        );
    }
}

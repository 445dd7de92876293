use crate::commands::stream_utils::entries_to_resp;
use crate::commands::CommandError;
use crate::resp::RespValue;
use crate::store::Store;
use crate::stream::EntryId;

/// Parsed arguments for `XRANGE key start end`. Both bounds are
/// inclusive; `-` opens the range at the beginning, `+` closes it at the
/// end, and a bare millis value matches any sequence number on its side.
pub struct XrangeArguments {
    key: String,
    start: EntryId,
    end: EntryId,
}

impl XrangeArguments {
    pub fn parse(args: &[String]) -> Result<Self, CommandError> {
        let [key, start, end] = args else {
            return Err(CommandError::WrongArity("XRANGE"));
        };

        let start = match start.as_str() {
            "-" => EntryId::MIN,
            raw => EntryId::parse_with_default_seq(raw, 0)?,
        };
        let end = match end.as_str() {
            "+" => EntryId::MAX,
            raw => EntryId::parse_with_default_seq(raw, u64::MAX)?,
        };

        Ok(Self {
            key: key.clone(),
            start,
            end,
        })
    }
}

pub async fn xrange(store: &Store, args: &[String]) -> Result<RespValue, CommandError> {
    let parsed = XrangeArguments::parse(args)?;
    let entries = store
        .stream_range(&parsed.key, parsed.start, parsed.end)
        .await?;
    Ok(entries_to_resp(&entries))
}

#[cfg(test)]
mod tests {
    use super::xrange;
    use crate::commands::CommandError;
    use crate::resp::RespValue;
    use crate::store::Store;
    use crate::stream::StreamIdError;

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    async fn seeded_store() -> Store {
        let store = Store::new();
        for id in ["1-1", "1-2", "2-1"] {
            store
                .append_stream_entry("s", id, vec![("f".to_string(), "v".to_string())])
                .await
                .unwrap();
        }
        store
    }

    fn returned_ids(reply: RespValue) -> Vec<String> {
        let RespValue::Array(entries) = reply else {
            panic!("XRANGE must reply with an array");
        };
        entries
            .into_iter()
            .map(|entry| match entry {
                RespValue::Array(parts) => match &parts[0] {
                    RespValue::BulkString(id) => id.clone(),
                    other => panic!("entry id must be a bulk string, got {:?}", other),
                },
                other => panic!("entry must be an array, got {:?}", other),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_xrange_boundaries_are_inclusive() {
        let store = seeded_store().await;

        let reply = xrange(&store, &args(&["s", "1-2", "+"])).await.unwrap();
        assert_eq!(returned_ids(reply), vec!["1-2", "2-1"]);

        let reply = xrange(&store, &args(&["s", "-", "1-1"])).await.unwrap();
        assert_eq!(returned_ids(reply), vec!["1-1"]);
    }

    #[tokio::test]
    async fn test_xrange_bare_millis_bounds() {
        let store = seeded_store().await;

        // A bare millis matches every sequence number on both sides.
        let reply = xrange(&store, &args(&["s", "1", "1"])).await.unwrap();
        assert_eq!(returned_ids(reply), vec!["1-1", "1-2"]);
    }

    #[tokio::test]
    async fn test_xrange_on_missing_key_is_empty() {
        let store = Store::new();
        let reply = xrange(&store, &args(&["nothing", "-", "+"])).await.unwrap();
        assert_eq!(reply, RespValue::Array(vec![]));
    }

    #[tokio::test]
    async fn test_xrange_argument_failures() {
        let store = seeded_store().await;

        assert_eq!(
            xrange(&store, &args(&["s", "-"])).await,
            Err(CommandError::WrongArity("XRANGE"))
        );
        assert_eq!(
            xrange(&store, &args(&["s", "junk", "+"])).await,
            Err(CommandError::StreamId(StreamIdError::Malformed))
        );
    }
}

use crate::commands::CommandError;
use crate::resp::RespValue;
use crate::store::Store;

/// Parsed arguments for XADD: a stream key, an id argument (explicit,
/// `millis-*`, or `*`), and one or more field/value pairs.
pub struct XaddArguments {
    key: String,
    id_spec: String,
    fields: Vec<(String, String)>,
}

impl XaddArguments {
    pub fn parse(args: &[String]) -> Result<Self, CommandError> {
        if args.len() < 4 || (args.len() - 2) % 2 != 0 {
            return Err(CommandError::WrongArity("XADD"));
        }

        let fields = args[2..]
            .chunks(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect();

        Ok(Self {
            key: args[0].clone(),
            id_spec: args[1].clone(),
            fields,
        })
    }
}

/// Appends one entry to a stream, creating the stream on first use, and
/// replies with the resolved entry id. Blocked XREAD callers watching the
/// key are woken by the store.
pub async fn xadd(store: &Store, args: &[String]) -> Result<RespValue, CommandError> {
    let parsed = XaddArguments::parse(args)?;
    let id = store
        .append_stream_entry(&parsed.key, &parsed.id_spec, parsed.fields)
        .await?;
    Ok(RespValue::BulkString(id.to_string()))
}

use std::time::Duration;

use futures_util::future::select_all;
use tokio::sync::broadcast;
use tokio::time::{timeout, Instant};

use crate::commands::stream_utils::entries_to_resp;
use crate::commands::CommandError;
use crate::resp::RespValue;
use crate::store::Store;
use crate::stream::{EntryId, StreamEntry};

/// Parsed arguments for XREAD:
/// `XREAD [BLOCK millis] STREAMS key [key ...] id [id ...]`.
pub struct XreadArguments {
    block_millis: Option<u64>,
    key_id_pairs: Vec<(String, String)>,
}

impl XreadArguments {
    pub fn parse(args: &[String]) -> Result<Self, CommandError> {
        if args.is_empty() {
            return Err(CommandError::WrongArity("XREAD"));
        }

        let (block_millis, streams_index) = if args[0].eq_ignore_ascii_case("block") {
            let millis = args
                .get(1)
                .and_then(|raw| raw.parse::<u64>().ok())
                .ok_or(CommandError::InvalidBlockDuration)?;
            (Some(millis), 2)
        } else {
            (None, 0)
        };

        if !args
            .get(streams_index)
            .map(|token| token.eq_ignore_ascii_case("streams"))
            .unwrap_or(false)
        {
            return Err(CommandError::WrongArity("XREAD"));
        }

        let rest = &args[streams_index + 1..];
        if rest.is_empty() || rest.len() % 2 != 0 {
            return Err(CommandError::WrongArity("XREAD"));
        }

        let half = rest.len() / 2;
        let key_id_pairs = (0..half)
            .map(|i| (rest[i].clone(), rest[half + i].clone()))
            .collect();

        Ok(Self {
            block_millis,
            key_id_pairs,
        })
    }
}

/// Reads entries strictly newer than the given id from each named stream.
///
/// Streams with nothing newer are omitted from the reply; a completely
/// empty reply set is a null bulk string. With BLOCK the call waits for
/// the next append to any requested stream (up to the given number of
/// milliseconds, indefinitely for zero) before evaluating, re-checking
/// after every wakeup so a burst of appends to the wrong stream cannot
/// satisfy it spuriously.
pub async fn xread(store: &Store, args: &[String]) -> Result<RespValue, CommandError> {
    let parsed = XreadArguments::parse(args)?;

    // `$` pins the read to entries appended after this call starts.
    let mut pairs = Vec::with_capacity(parsed.key_id_pairs.len());
    for (key, raw_id) in parsed.key_id_pairs {
        let after = if raw_id == "$" {
            store.stream_last_id(&key).await.unwrap_or(EntryId::MIN)
        } else {
            EntryId::parse_with_default_seq(&raw_id, 0)?
        };
        pairs.push((key, after));
    }

    let Some(block_millis) = parsed.block_millis else {
        let results = read_streams(store, &pairs).await?;
        if results.is_empty() {
            return Ok(RespValue::NullBulkString);
        }
        return Ok(render_results(results));
    };

    // Subscribe before the first wait so an append landing between the
    // wait and the re-check is buffered instead of lost.
    let mut watchers = Vec::with_capacity(pairs.len());
    for (key, _) in &pairs {
        watchers.push(store.stream_watcher(key).await);
    }

    let deadline =
        (block_millis > 0).then(|| Instant::now() + Duration::from_millis(block_millis));

    loop {
        let woke = wait_for_append(&mut watchers, deadline).await;
        let results = read_streams(store, &pairs).await?;
        if !results.is_empty() {
            return Ok(render_results(results));
        }
        if !woke {
            return Ok(RespValue::NullBulkString);
        }
    }
}

/// Waits for an append signal on any watched stream. Returns `false` once
/// the deadline has passed instead.
async fn wait_for_append(
    watchers: &mut [broadcast::Receiver<()>],
    deadline: Option<Instant>,
) -> bool {
    let receives: Vec<_> = watchers
        .iter_mut()
        .map(|watcher| Box::pin(watcher.recv()))
        .collect();
    let any_append = select_all(receives);

    match deadline {
        Some(deadline) => {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            timeout(deadline - now, any_append).await.is_ok()
        }
        None => {
            any_append.await;
            true
        }
    }
}

async fn read_streams(
    store: &Store,
    pairs: &[(String, EntryId)],
) -> Result<Vec<(String, Vec<StreamEntry>)>, CommandError> {
    let mut results = Vec::new();
    for (key, after) in pairs {
        let entries = store.stream_entries_after(key, *after).await?;
        if !entries.is_empty() {
            results.push((key.clone(), entries));
        }
    }
    Ok(results)
}

fn render_results(results: Vec<(String, Vec<StreamEntry>)>) -> RespValue {
    RespValue::Array(
        results
            .into_iter()
            .map(|(key, entries)| {
                RespValue::Array(vec![
                    RespValue::BulkString(key),
                    entries_to_resp(&entries),
                ])
            })
            .collect(),
    )
}

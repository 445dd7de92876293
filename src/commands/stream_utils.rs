//! Shared RESP rendering for stream entries.

use crate::resp::RespValue;
use crate::stream::StreamEntry;

/// Renders entries as the nested RESP shape shared by XRANGE and XREAD:
/// each entry is `[id, [field, value, ...]]`.
pub fn entries_to_resp(entries: &[StreamEntry]) -> RespValue {
    RespValue::Array(
        entries
            .iter()
            .map(|entry| {
                let mut flat = Vec::with_capacity(entry.fields.len() * 2);
                for (field, value) in &entry.fields {
                    flat.push(RespValue::BulkString(field.clone()));
                    flat.push(RespValue::BulkString(value.clone()));
                }
                RespValue::Array(vec![
                    RespValue::BulkString(entry.id.to_string()),
                    RespValue::Array(flat),
                ])
            })
            .collect(),
    )
}

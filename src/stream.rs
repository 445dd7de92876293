//! Append-only stream type and entry id resolution.
//!
//! A stream is an ordered log of entries keyed by a `millis-seq` id pair.
//! Ids within one stream are strictly increasing and `0-0` is invalid.
//! Entries are only ever appended, never reordered or mutated.

use std::fmt;

use thiserror::Error;

/// Errors produced while resolving or parsing a stream entry id. These are
/// command-scoped: they become an error reply for the XADD/XRANGE/XREAD
/// call that triggered them and never affect the connection.
#[derive(Error, Debug, PartialEq)]
pub enum StreamIdError {
    #[error("The ID specified in XADD is equal or smaller than the target stream top item")]
    EqualOrSmallerThanTop,
    #[error("The ID specified in XADD must be greater than 0-0")]
    SmallerThanZero,
    #[error("Invalid stream ID specified as stream command argument")]
    Malformed,
}

/// A stream entry id, ordered first by millisecond timestamp, then by
/// sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EntryId {
    pub millis: u64,
    pub seq: u64,
}

impl EntryId {
    pub const MIN: EntryId = EntryId { millis: 0, seq: 0 };
    pub const MAX: EntryId = EntryId {
        millis: u64::MAX,
        seq: u64::MAX,
    };

    /// Parses an explicit `millis-seq` id. Wildcards are not accepted here;
    /// they only make sense during XADD resolution.
    pub fn parse(raw: &str) -> Result<Self, StreamIdError> {
        let mut pieces = raw.splitn(2, '-');
        let millis = pieces
            .next()
            .and_then(|p| p.parse::<u64>().ok())
            .ok_or(StreamIdError::Malformed)?;
        let seq = match pieces.next() {
            Some(piece) => piece.parse::<u64>().map_err(|_| StreamIdError::Malformed)?,
            None => return Err(StreamIdError::Malformed),
        };
        Ok(EntryId { millis, seq })
    }

    /// Parses a range bound that may omit the sequence part. A bare millis
    /// value gets `default_seq`, so `5` can mean `5-0` as a lower bound or
    /// `5-<max>` as an upper bound.
    pub fn parse_with_default_seq(raw: &str, default_seq: u64) -> Result<Self, StreamIdError> {
        if raw.contains('-') {
            return EntryId::parse(raw);
        }
        let millis = raw.parse::<u64>().map_err(|_| StreamIdError::Malformed)?;
        Ok(EntryId {
            millis,
            seq: default_seq,
        })
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.millis, self.seq)
    }
}

/// One stream entry: an id plus field/value pairs in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: EntryId,
    pub fields: Vec<(String, String)>,
}

/// An append-only log of entries with strictly increasing ids.
#[derive(Debug, Default, PartialEq)]
pub struct Stream {
    entries: Vec<StreamEntry>,
}

impl Stream {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn last_id(&self) -> Option<EntryId> {
        self.entries.last().map(|entry| entry.id)
    }

    /// Resolves an XADD id argument against this stream and appends the
    /// entry. The argument may be fully explicit (`millis-seq`), partially
    /// wildcarded (`millis-*`), or fully wildcarded (`*`).
    pub fn append(
        &mut self,
        id_spec: &str,
        now_millis: u64,
        fields: Vec<(String, String)>,
    ) -> Result<EntryId, StreamIdError> {
        let id = self.resolve_entry_id(id_spec, now_millis)?;
        self.entries.push(StreamEntry { id, fields });
        Ok(id)
    }

    /// Resolves an XADD id argument to a concrete id, enforcing that the
    /// result is strictly greater than the current top entry and not `0-0`.
    pub fn resolve_entry_id(
        &self,
        id_spec: &str,
        now_millis: u64,
    ) -> Result<EntryId, StreamIdError> {
        let candidate = if id_spec == "*" {
            EntryId {
                millis: now_millis,
                seq: 0,
            }
        } else {
            let mut pieces = id_spec.splitn(2, '-');
            let millis = pieces
                .next()
                .and_then(|p| p.parse::<u64>().ok())
                .ok_or(StreamIdError::Malformed)?;
            let seq = match pieces.next() {
                Some("*") => self.next_sequence_for(millis),
                Some(piece) => piece.parse::<u64>().map_err(|_| StreamIdError::Malformed)?,
                None => return Err(StreamIdError::Malformed),
            };
            EntryId { millis, seq }
        };

        if candidate == EntryId::MIN {
            return Err(StreamIdError::SmallerThanZero);
        }
        if let Some(last) = self.last_id() {
            if candidate <= last {
                return Err(StreamIdError::EqualOrSmallerThanTop);
            }
        }
        Ok(candidate)
    }

    /// Next sequence number for a `millis-*` id: one past the newest entry
    /// sharing that millis, `0` if none shares it, or `1` when the stream
    /// holds no entries at all.
    fn next_sequence_for(&self, millis: u64) -> u64 {
        if self.entries.is_empty() {
            return 1;
        }
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.id.millis == millis)
            .map(|entry| entry.id.seq + 1)
            .unwrap_or(0)
    }

    /// All entries with ids in the inclusive range `[start, end]`.
    pub fn range(&self, start: EntryId, end: EntryId) -> Vec<StreamEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.id >= start && entry.id <= end)
            .cloned()
            .collect()
    }

    /// All entries with ids strictly greater than `after`.
    pub fn entries_after(&self, after: EntryId) -> Vec<StreamEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.id > after)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{EntryId, Stream, StreamIdError};

    fn entry_fields() -> Vec<(String, String)> {
        vec![("temperature".to_string(), "37".to_string())]
    }

    #[test]
    fn test_parse_entry_id() {
        let test_cases = vec![
            ("5-1", Ok(EntryId { millis: 5, seq: 1 })),
            (
                "1526919030474-0",
                Ok(EntryId {
                    millis: 1526919030474,
                    seq: 0,
                }),
            ),
            ("5", Err(StreamIdError::Malformed)),
            ("abc-1", Err(StreamIdError::Malformed)),
            ("1-abc", Err(StreamIdError::Malformed)),
            ("-1-1", Err(StreamIdError::Malformed)),
            ("", Err(StreamIdError::Malformed)),
        ];

        for (raw, expected) in test_cases {
            assert_eq!(EntryId::parse(raw), expected, "parsing {:?}", raw);
        }
    }

    #[test]
    fn test_parse_with_default_seq() {
        assert_eq!(
            EntryId::parse_with_default_seq("5", 0),
            Ok(EntryId { millis: 5, seq: 0 })
        );
        assert_eq!(
            EntryId::parse_with_default_seq("5", u64::MAX),
            Ok(EntryId {
                millis: 5,
                seq: u64::MAX
            })
        );
        assert_eq!(
            EntryId::parse_with_default_seq("5-3", u64::MAX),
            Ok(EntryId { millis: 5, seq: 3 })
        );
    }

    #[test]
    fn test_id_ordering() {
        let test_cases = vec![
            (EntryId { millis: 1, seq: 0 }, EntryId { millis: 2, seq: 0 }),
            (EntryId { millis: 1, seq: 0 }, EntryId { millis: 1, seq: 1 }),
            (
                EntryId {
                    millis: 1,
                    seq: 999,
                },
                EntryId { millis: 2, seq: 0 },
            ),
        ];

        for (smaller, larger) in test_cases {
            assert!(smaller < larger, "{} should sort before {}", smaller, larger);
        }
    }

    #[test]
    fn test_resolve_explicit_ids() {
        let mut stream = Stream::new();
        stream.append("5-1", 0, entry_fields()).unwrap();

        let test_cases = vec![
            ("5-1", Err(StreamIdError::EqualOrSmallerThanTop)),
            ("5-0", Err(StreamIdError::EqualOrSmallerThanTop)),
            ("4-9", Err(StreamIdError::EqualOrSmallerThanTop)),
            ("0-0", Err(StreamIdError::SmallerThanZero)),
            ("5-2", Ok(EntryId { millis: 5, seq: 2 })),
            ("6-0", Ok(EntryId { millis: 6, seq: 0 })),
            ("garbage", Err(StreamIdError::Malformed)),
            ("5", Err(StreamIdError::Malformed)),
        ];

        for (spec, expected) in test_cases {
            assert_eq!(
                stream.resolve_entry_id(spec, 0),
                expected,
                "resolving {:?}",
                spec
            );
        }
    }

    #[test]
    fn test_resolve_wildcard_sequence() {
        let mut stream = Stream::new();

        // Empty stream: the auto-assigned sequence starts at 1.
        assert_eq!(
            stream.resolve_entry_id("5-*", 0),
            Ok(EntryId { millis: 5, seq: 1 })
        );

        stream.append("5-1", 0, entry_fields()).unwrap();
        assert_eq!(
            stream.resolve_entry_id("5-*", 0),
            Ok(EntryId { millis: 5, seq: 2 })
        );

        // A millis no entry shares yet gets sequence 0.
        assert_eq!(
            stream.resolve_entry_id("7-*", 0),
            Ok(EntryId { millis: 7, seq: 0 })
        );
    }

    #[test]
    fn test_resolve_full_wildcard_uses_clock() {
        let mut stream = Stream::new();
        assert_eq!(
            stream.resolve_entry_id("*", 1526919030474),
            Ok(EntryId {
                millis: 1526919030474,
                seq: 0,
            })
        );

        stream.append("1526919030474-0", 0, entry_fields()).unwrap();
        // Same wall-clock millis would collide with the top item.
        assert_eq!(
            stream.resolve_entry_id("*", 1526919030474),
            Err(StreamIdError::EqualOrSmallerThanTop)
        );
    }

    #[test]
    fn test_range_boundaries() {
        let mut stream = Stream::new();
        stream.append("1-1", 0, entry_fields()).unwrap();
        stream.append("1-2", 0, entry_fields()).unwrap();
        stream.append("2-1", 0, entry_fields()).unwrap();

        let ids = |entries: Vec<super::StreamEntry>| {
            entries
                .into_iter()
                .map(|e| e.id.to_string())
                .collect::<Vec<_>>()
        };

        assert_eq!(
            ids(stream.range(EntryId { millis: 1, seq: 2 }, EntryId::MAX)),
            vec!["1-2", "2-1"]
        );
        assert_eq!(
            ids(stream.range(EntryId::MIN, EntryId { millis: 1, seq: 1 })),
            vec!["1-1"]
        );
        assert_eq!(
            ids(stream.range(EntryId::MIN, EntryId::MAX)),
            vec!["1-1", "1-2", "2-1"]
        );
        assert!(stream
            .range(EntryId { millis: 3, seq: 0 }, EntryId::MAX)
            .is_empty());
    }

    #[test]
    fn test_entries_after_is_strictly_greater() {
        let mut stream = Stream::new();
        stream.append("1-1", 0, entry_fields()).unwrap();
        stream.append("2-0", 0, entry_fields()).unwrap();

        let after = stream.entries_after(EntryId { millis: 1, seq: 1 });
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].id, EntryId { millis: 2, seq: 0 });

        assert!(stream
            .entries_after(EntryId { millis: 2, seq: 0 })
            .is_empty());
    }
}

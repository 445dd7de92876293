//! Binary RDB snapshot loading.
//!
//! A snapshot is parsed in a single pass at startup, before the server
//! accepts connections: a 9-byte preamble (5-byte magic plus 4 ASCII
//! version digits), then a sequence of opcode-introduced sections, then an
//! end-of-file marker. Only string values are supported; any other value
//! type or an LZF-compressed string fails the load. A load failure is
//! fatal to startup only when a snapshot was explicitly configured.

mod encoding;
mod opcode;

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::store::{ExpiringValue, Store};
use encoding::{read_length_literal, read_string, Reader};
use opcode::{
    parse_record, OPCODE_AUX, OPCODE_EOF, OPCODE_EXPIRY_MILLIS, OPCODE_EXPIRY_SECONDS,
    OPCODE_RESIZE_DB, OPCODE_SELECT_DB,
};

/// The canonical empty snapshot, shipped to replicas during a full resync
/// when the master has nothing persisted.
pub const EMPTY_SNAPSHOT: &[u8] = &[
    0x52, 0x45, 0x44, 0x49, 0x53, 0x30, 0x30, 0x31, 0x31, 0xfa, 0x09, 0x72, 0x65, 0x64, 0x69,
    0x73, 0x2d, 0x76, 0x65, 0x72, 0x05, 0x37, 0x2e, 0x32, 0x2e, 0x30, 0xfa, 0x0a, 0x72, 0x65,
    0x64, 0x69, 0x73, 0x2d, 0x62, 0x69, 0x74, 0x73, 0xc0, 0x40, 0xfa, 0x05, 0x63, 0x74, 0x69,
    0x6d, 0x65, 0xc2, 0x6d, 0x08, 0xbc, 0x65, 0xfa, 0x08, 0x75, 0x73, 0x65, 0x64, 0x2d, 0x6d,
    0x65, 0x6d, 0xc2, 0xb0, 0xc4, 0x10, 0x00, 0xfa, 0x08, 0x61, 0x6f, 0x66, 0x2d, 0x62, 0x61,
    0x73, 0x65, 0xc0, 0x00, 0xff, 0xf0, 0x6e, 0x3b, 0xfe, 0xc0, 0xff, 0x5a, 0xa2,
];

/// Errors raised while loading a snapshot.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("failed to read snapshot file: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot preamble is not a valid RDB header")]
    InvalidHeader,
    #[error("unexpected end of snapshot data")]
    UnexpectedEof,
    #[error("unsupported value type 0x{0:02x}")]
    UnsupportedValueType(u8),
    #[error("LZF-compressed strings are not supported")]
    CompressionUnsupported,
    #[error("invalid length encoding")]
    InvalidLength,
    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,
}

impl PartialEq for SnapshotError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SnapshotError::Io(a), SnapshotError::Io(b)) => a.kind() == b.kind(),
            (SnapshotError::UnsupportedValueType(a), SnapshotError::UnsupportedValueType(b)) => {
                a == b
            }
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

/// One parsed key record. The expiry, when present, is an absolute unix
/// timestamp in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct RdbEntry {
    pub key: String,
    pub value: String,
    pub expires_at_millis: Option<u64>,
}

/// One database section of the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RdbDatabase {
    pub index: u32,
    pub entries: Vec<RdbEntry>,
}

/// Transient parse result, consumed once into the store then discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct RdbSnapshot {
    pub version: String,
    pub aux: Vec<(String, String)>,
    pub databases: Vec<RdbDatabase>,
}

impl RdbSnapshot {
    /// Inserts all parsed entries into the store. Entries carrying an
    /// expiry get `ttl = expiry - now`; entries whose expiry already
    /// passed are dropped here instead of being stored pre-expired.
    /// Returns the number of keys inserted.
    pub async fn apply(&self, store: &Store) -> usize {
        let now = unix_millis();
        let mut inserted = 0;

        for database in &self.databases {
            for entry in &database.entries {
                let ttl_millis = match entry.expires_at_millis {
                    Some(expires_at) => {
                        if expires_at <= now {
                            continue;
                        }
                        Some(expires_at - now)
                    }
                    None => None,
                };
                store
                    .insert_loaded(
                        entry.key.clone(),
                        ExpiringValue::new(entry.value.clone(), ttl_millis),
                    )
                    .await;
                inserted += 1;
            }
        }
        inserted
    }
}

/// Reads and parses the snapshot file at `path`.
pub fn load_file(path: &Path) -> Result<RdbSnapshot, SnapshotError> {
    let bytes = std::fs::read(path)?;
    parse(&bytes)
}

/// Parses raw snapshot bytes.
pub fn parse(bytes: &[u8]) -> Result<RdbSnapshot, SnapshotError> {
    let mut reader = Reader::new(bytes);

    let preamble = reader.take(9).map_err(|_| SnapshotError::InvalidHeader)?;
    if &preamble[..5] != b"REDIS" || !preamble[5..].iter().all(u8::is_ascii_digit) {
        return Err(SnapshotError::InvalidHeader);
    }
    let version = String::from_utf8(preamble[5..].to_vec()).map_err(|_| SnapshotError::InvalidHeader)?;

    let mut snapshot = RdbSnapshot {
        version,
        aux: Vec::new(),
        databases: Vec::new(),
    };

    loop {
        let section = reader.u8()?;
        match section {
            OPCODE_AUX => {
                let key = read_string(&mut reader)?;
                let value = read_string(&mut reader)?;
                snapshot.aux.push((key, value));
            }
            OPCODE_SELECT_DB => {
                let index = read_length_literal(&mut reader)? as u32;
                snapshot.databases.push(RdbDatabase {
                    index,
                    entries: Vec::new(),
                });
            }
            OPCODE_RESIZE_DB => {
                // Hash table size hints; parsed for byte accuracy, unused.
                read_length_literal(&mut reader)?;
                read_length_literal(&mut reader)?;
            }
            OPCODE_EXPIRY_MILLIS => {
                let expires_at = reader.u64_le()?;
                let value_type = reader.u8()?;
                let (key, value) = parse_record(&mut reader, value_type)?;
                push_entry(&mut snapshot, key, value, Some(expires_at));
            }
            OPCODE_EXPIRY_SECONDS => {
                let expires_at = reader.u32_le()? as u64 * 1000;
                let value_type = reader.u8()?;
                let (key, value) = parse_record(&mut reader, value_type)?;
                push_entry(&mut snapshot, key, value, Some(expires_at));
            }
            OPCODE_EOF => {
                // Trailing CRC64 checksum, present in files written by
                // real servers; consumed but not verified.
                if reader.remaining() >= 8 {
                    reader.take(8)?;
                }
                return Ok(snapshot);
            }
            value_type => {
                let (key, value) = parse_record(&mut reader, value_type)?;
                push_entry(&mut snapshot, key, value, None);
            }
        }
    }
}

/// Appends a record to the current database section, opening an implicit
/// database 0 for files that never issue a select opcode.
fn push_entry(snapshot: &mut RdbSnapshot, key: String, value: String, expires_at: Option<u64>) {
    if snapshot.databases.is_empty() {
        snapshot.databases.push(RdbDatabase {
            index: 0,
            entries: Vec::new(),
        });
    }
    if let Some(database) = snapshot.databases.last_mut() {
        database.entries.push(RdbEntry {
            key,
            value,
            expires_at_millis: expires_at,
        });
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

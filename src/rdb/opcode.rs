//! RDB section opcodes and key record parsing.

use super::encoding::{read_string, Reader};
use super::SnapshotError;

/// Auxiliary key/value metadata, kept out of the store.
pub(crate) const OPCODE_AUX: u8 = 0xFA;
/// Hash table size hints for the section that follows.
pub(crate) const OPCODE_RESIZE_DB: u8 = 0xFB;
/// Expiry timestamp in milliseconds, preceding exactly one key record.
pub(crate) const OPCODE_EXPIRY_MILLIS: u8 = 0xFC;
/// Expiry timestamp in seconds, preceding exactly one key record.
pub(crate) const OPCODE_EXPIRY_SECONDS: u8 = 0xFD;
/// Starts a new database section.
pub(crate) const OPCODE_SELECT_DB: u8 = 0xFE;
/// End of file, followed by an optional checksum.
pub(crate) const OPCODE_EOF: u8 = 0xFF;

/// The only supported value type. Anything else fails the load.
pub(crate) const VALUE_TYPE_STRING: u8 = 0x00;

/// Parses one `[key][value]` record after its type byte has been read.
pub(crate) fn parse_record(
    reader: &mut Reader<'_>,
    value_type: u8,
) -> Result<(String, String), SnapshotError> {
    if value_type != VALUE_TYPE_STRING {
        return Err(SnapshotError::UnsupportedValueType(value_type));
    }
    let key = read_string(reader)?;
    let value = read_string(reader)?;
    Ok((key, value))
}

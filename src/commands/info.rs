use crate::commands::CommandError;
use crate::replication::ReplicationState;
use crate::resp::RespValue;

/// INFO with the `replication` section. The body always carries the role;
/// a master additionally reports its replication id and current offset.
pub fn info(replication: &ReplicationState, args: &[String]) -> Result<RespValue, CommandError> {
    let [section] = args else {
        return Err(CommandError::WrongArity("INFO"));
    };
    if !section.eq_ignore_ascii_case("replication") {
        return Err(CommandError::UnknownInfoSection(section.clone()));
    }

    let mut lines = vec![format!("role:{}", replication.role().as_str())];
    if replication.is_master() {
        lines.push(format!("master_replid:{}", replication.replication_id()));
        lines.push(format!("master_repl_offset:{}", replication.offset()));
    }

    Ok(RespValue::BulkString(lines.join("\n")))
}

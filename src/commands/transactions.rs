//! Per-connection transaction state.
//!
//! Each connection owns exactly one [`Transaction`]: a MULTI opens it,
//! queueable commands then accumulate instead of executing, and EXEC or
//! DISCARD closes it again. The state dies with the connection, so a
//! dropped client can never leak a half-open transaction.

use crate::commands::registry::Command;
use crate::commands::CommandError;

#[derive(Debug, Default)]
pub struct Transaction {
    open: bool,
    queue: Vec<Command>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Opens the transaction; a second MULTI while open is an error.
    pub fn begin(&mut self) -> Result<(), CommandError> {
        if self.open {
            return Err(CommandError::NestedMulti);
        }
        self.open = true;
        Ok(())
    }

    /// Appends a command while queuing. The caller checks `is_open`.
    pub fn push(&mut self, command: Command) {
        self.queue.push(command);
    }

    /// Closes the transaction and hands back the queue for execution.
    pub fn take(&mut self) -> Result<Vec<Command>, CommandError> {
        if !self.open {
            return Err(CommandError::ExecWithoutMulti);
        }
        self.open = false;
        Ok(std::mem::take(&mut self.queue))
    }

    /// Closes the transaction and drops the queue.
    pub fn discard(&mut self) -> Result<(), CommandError> {
        if !self.open {
            return Err(CommandError::DiscardWithoutMulti);
        }
        self.open = false;
        self.queue.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Transaction;
    use crate::commands::registry::Command;
    use crate::commands::CommandError;
    use crate::resp::{FrameDecoder, RespValue};

    fn command(parts: &[&str]) -> Command {
        let wire = RespValue::command(parts).encode();
        let mut decoder = FrameDecoder::new();
        decoder.extend(&wire);
        Command::from_frame(decoder.next_frame().unwrap().unwrap()).unwrap()
    }

    #[test]
    fn test_begin_queue_take() {
        let mut txn = Transaction::new();
        assert!(!txn.is_open());

        txn.begin().unwrap();
        assert!(txn.is_open());

        txn.push(command(&["SET", "a", "1"]));
        txn.push(command(&["INCR", "a"]));
        assert_eq!(txn.queued_len(), 2);

        let queued = txn.take().unwrap();
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0].name(), "SET");
        assert_eq!(queued[1].name(), "INCR");
        assert!(!txn.is_open());
        assert_eq!(txn.queued_len(), 0);
    }

    #[test]
    fn test_nested_multi_is_rejected() {
        let mut txn = Transaction::new();
        txn.begin().unwrap();
        assert_eq!(txn.begin(), Err(CommandError::NestedMulti));
    }

    #[test]
    fn test_exec_and_discard_require_open_transaction() {
        let mut txn = Transaction::new();
        assert_eq!(txn.take().unwrap_err(), CommandError::ExecWithoutMulti);
        assert_eq!(
            txn.discard().unwrap_err(),
            CommandError::DiscardWithoutMulti
        );
    }

    #[test]
    fn test_discard_clears_the_queue() {
        let mut txn = Transaction::new();
        txn.begin().unwrap();
        txn.push(command(&["SET", "a", "1"]));

        txn.discard().unwrap();
        assert!(!txn.is_open());

        txn.begin().unwrap();
        assert_eq!(txn.take().unwrap().len(), 0);
    }
}

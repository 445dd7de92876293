//! The supported-command table and command construction.
//!
//! Every command resolves through one static registry entry carrying its
//! queueable/write flags. Resolution is case-insensitive and matches the
//! longest supported prefix, so multi-word commands such as `CONFIG GET`
//! and `REPLCONF GETACK` win over their one-word prefixes.

use crate::commands::CommandError;
use crate::resp::{Frame, RespValue};

/// Static description of one supported command.
#[derive(Debug, PartialEq, Eq)]
pub struct CommandSpec {
    /// Canonical (uppercase) name; multi-word names are space-separated.
    pub name: &'static str,
    /// Whether an open MULTI queues this command instead of executing it.
    pub queueable: bool,
    /// Whether a master propagates this command to its replicas.
    pub is_write: bool,
}

impl CommandSpec {
    fn words(&self) -> impl Iterator<Item = &'static str> {
        self.name.split(' ')
    }

    pub fn word_count(&self) -> usize {
        self.words().count()
    }
}

/// Supported commands, multi-word entries first so longest-prefix
/// resolution can simply take the first match.
pub const SUPPORTED_COMMANDS: &[CommandSpec] = &[
    CommandSpec { name: "CONFIG GET", queueable: false, is_write: false },
    CommandSpec { name: "REPLCONF GETACK", queueable: false, is_write: false },
    CommandSpec { name: "REPLCONF ACK", queueable: false, is_write: false },
    CommandSpec { name: "PING", queueable: false, is_write: false },
    CommandSpec { name: "ECHO", queueable: true, is_write: false },
    CommandSpec { name: "GET", queueable: true, is_write: false },
    CommandSpec { name: "SET", queueable: true, is_write: true },
    CommandSpec { name: "INCR", queueable: true, is_write: true },
    CommandSpec { name: "KEYS", queueable: true, is_write: false },
    CommandSpec { name: "TYPE", queueable: true, is_write: false },
    CommandSpec { name: "INFO", queueable: false, is_write: false },
    CommandSpec { name: "MULTI", queueable: false, is_write: false },
    CommandSpec { name: "EXEC", queueable: false, is_write: false },
    CommandSpec { name: "DISCARD", queueable: false, is_write: false },
    CommandSpec { name: "REPLCONF", queueable: false, is_write: false },
    CommandSpec { name: "PSYNC", queueable: false, is_write: false },
    CommandSpec { name: "WAIT", queueable: false, is_write: false },
    CommandSpec { name: "XADD", queueable: true, is_write: true },
    CommandSpec { name: "XRANGE", queueable: false, is_write: false },
    CommandSpec { name: "XREAD", queueable: false, is_write: false },
];

/// Resolves leading tokens to the longest matching supported command.
pub fn resolve(tokens: &[String]) -> Option<&'static CommandSpec> {
    SUPPORTED_COMMANDS.iter().find(|spec| {
        spec.word_count() <= tokens.len()
            && spec
                .words()
                .zip(tokens.iter())
                .all(|(word, token)| token.eq_ignore_ascii_case(word))
    })
}

/// One parsed command frame: its registry entry, the original tokens, and
/// the exact number of wire bytes the frame consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub spec: &'static CommandSpec,
    tokens: Vec<String>,
    pub wire_len: usize,
}

impl Command {
    /// Builds a command from a decoded frame, which must be a RESP array
    /// of bulk strings naming a supported command.
    pub fn from_frame(frame: Frame) -> Result<Self, CommandError> {
        let RespValue::Array(elements) = frame.value else {
            return Err(CommandError::InvalidFrame);
        };

        let mut tokens = Vec::with_capacity(elements.len());
        for element in elements {
            match element {
                RespValue::BulkString(s) => tokens.push(s),
                _ => return Err(CommandError::InvalidFrame),
            }
        }

        if tokens.is_empty() {
            return Err(CommandError::InvalidFrame);
        }

        let spec =
            resolve(&tokens).ok_or_else(|| CommandError::UnknownCommand(tokens[0].clone()))?;

        Ok(Self {
            spec,
            tokens,
            wire_len: frame.wire_len,
        })
    }

    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    /// Arguments after the matched command words.
    pub fn args(&self) -> &[String] {
        &self.tokens[self.spec.word_count()..]
    }

    /// Re-encodes the command for verbatim propagation to replicas.
    pub fn to_wire(&self) -> Vec<u8> {
        RespValue::command(&self.tokens).encode()
    }
}

//! A Redis-compatible in-memory key-value server.
//!
//! This crate provides a single-process server that speaks the Redis
//! serialization protocol (RESP) and supports:
//!
//! - String key-value operations with passive expiration (GET, SET, INCR, KEYS, TYPE)
//! - Append-only streams with range queries and blocking reads (XADD, XRANGE, XREAD)
//! - Client-side transactions (MULTI, EXEC, DISCARD)
//! - Master/replica replication with full resync and quorum waits (PSYNC, REPLCONF, WAIT)
//! - Loading a binary RDB snapshot at startup
//!
//! The server runs one Tokio task per client connection plus one task per
//! replica link. The keyspace sits behind a single readers-writer lock;
//! the replica registry and the stream/ack wake signals have their own
//! locks so replication and blocking reads never contend with key access.

pub mod commands;
pub mod config;
pub mod handshake;
pub mod rdb;
pub mod replication;
pub mod resp;
pub mod server;
pub mod store;
pub mod stream;

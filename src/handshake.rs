//! Replica-side replication handshake.
//!
//! A replica bootstraps by dialing its master and walking the fixed
//! sequence PING → REPLCONF listening-port → REPLCONF capa psync2 →
//! PSYNC ? -1. The master answers with `+FULLRESYNC <id> <offset>`
//! followed by a raw length-prefixed snapshot payload; everything after
//! that payload on the same socket is the live command stream. Any
//! failure here is fatal to starting up as a replica.

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::resp::{Frame, FrameDecoder, RespError, RespValue};

#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("i/o error talking to master: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error from master: {0}")]
    Resp(#[from] RespError),
    #[error("unexpected reply from master: {0}")]
    UnexpectedReply(String),
    #[error("malformed FULLRESYNC line: {0:?}")]
    MalformedFullResync(String),
}

/// The established link to the master after a successful handshake. The
/// decoder may already hold live-stream bytes that arrived right behind
/// the snapshot payload.
#[derive(Debug)]
pub struct MasterLink {
    pub stream: TcpStream,
    pub decoder: FrameDecoder,
    pub snapshot: Vec<u8>,
    pub master_replication_id: String,
}

/// Runs the full handshake against `master_addr`, announcing
/// `listening_port` as this replica's client port.
pub async fn perform(master_addr: &str, listening_port: u16) -> Result<MasterLink, HandshakeError> {
    let mut stream = TcpStream::connect(master_addr).await?;
    let mut decoder = FrameDecoder::new();

    let reply = exchange(&mut stream, &mut decoder, &["PING"]).await?;
    expect_simple(&reply, "PONG")?;

    let port = listening_port.to_string();
    let reply = exchange(
        &mut stream,
        &mut decoder,
        &["REPLCONF", "listening-port", &port],
    )
    .await?;
    expect_simple(&reply, "OK")?;

    let reply = exchange(&mut stream, &mut decoder, &["REPLCONF", "capa", "psync2"]).await?;
    expect_simple(&reply, "OK")?;

    let reply = exchange(&mut stream, &mut decoder, &["PSYNC", "?", "-1"]).await?;
    let master_replication_id = parse_fullresync(&reply)?;
    debug!(id = %master_replication_id, "master accepted full resync");

    let snapshot = read_raw_payload(&mut stream, &mut decoder).await?;
    debug!(bytes = snapshot.len(), "received snapshot from master");

    Ok(MasterLink {
        stream,
        decoder,
        snapshot,
        master_replication_id,
    })
}

/// Sends one command and reads one reply frame.
async fn exchange(
    stream: &mut TcpStream,
    decoder: &mut FrameDecoder,
    parts: &[&str],
) -> Result<RespValue, HandshakeError> {
    stream
        .write_all(&RespValue::command(parts).encode())
        .await?;
    stream.flush().await?;

    let frame = read_frame(stream, decoder).await?;
    Ok(frame.value)
}

async fn read_frame(
    stream: &mut TcpStream,
    decoder: &mut FrameDecoder,
) -> Result<Frame, HandshakeError> {
    let mut buf = [0u8; 4096];
    loop {
        if let Some(frame) = decoder.next_frame()? {
            return Ok(frame);
        }
        let read = stream.read(&mut buf).await?;
        if read == 0 {
            return Err(HandshakeError::UnexpectedReply(
                "connection closed mid-handshake".to_string(),
            ));
        }
        decoder.extend(&buf[..read]);
    }
}

async fn read_raw_payload(
    stream: &mut TcpStream,
    decoder: &mut FrameDecoder,
) -> Result<Vec<u8>, HandshakeError> {
    let mut buf = [0u8; 4096];
    loop {
        if let Some(payload) = decoder.next_raw_payload()? {
            return Ok(payload);
        }
        let read = stream.read(&mut buf).await?;
        if read == 0 {
            return Err(HandshakeError::UnexpectedReply(
                "connection closed before snapshot arrived".to_string(),
            ));
        }
        decoder.extend(&buf[..read]);
    }
}

fn expect_simple(reply: &RespValue, expected: &str) -> Result<(), HandshakeError> {
    match reply {
        RespValue::SimpleString(s) if s == expected => Ok(()),
        other => Err(HandshakeError::UnexpectedReply(format!("{:?}", other))),
    }
}

/// Validates a `FULLRESYNC <40-char-id> <offset>` line and returns the
/// master's replication id.
fn parse_fullresync(reply: &RespValue) -> Result<String, HandshakeError> {
    let RespValue::SimpleString(line) = reply else {
        return Err(HandshakeError::UnexpectedReply(format!("{:?}", reply)));
    };

    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() != 3 || parts[0] != "FULLRESYNC" {
        return Err(HandshakeError::MalformedFullResync(line.clone()));
    }

    let id = parts[1];
    if id.len() != 40 || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(HandshakeError::MalformedFullResync(line.clone()));
    }
    if parts[2].parse::<i64>().is_err() {
        return Err(HandshakeError::MalformedFullResync(line.clone()));
    }

    Ok(id.to_string())
}

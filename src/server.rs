//! TCP server: the accept loop, per-connection read loops, and the
//! replica's master-link loop.
//!
//! Each client connection gets its own task owning its decoder buffer and
//! transaction state. A connection that issues PSYNC stops being a client:
//! its write half moves into the replication registry and the remaining
//! read loop only collects `REPLCONF ACK` frames. Protocol errors close
//! the connection; command errors are replied to and the connection
//! lives on.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::commands::{
    apply_replicated, handle_master_command, handle_replica_client_command, Command, Outcome,
    Transaction,
};
use crate::config::Config;
use crate::handshake::{self, MasterLink};
use crate::rdb;
use crate::replication::{ReplicationState, Role};
use crate::resp::{FrameDecoder, RespValue};
use crate::store::Store;

const READ_BUFFER_SIZE: usize = 4096;

pub struct Server {
    config: Arc<Config>,
    store: Arc<Store>,
    replication: Arc<ReplicationState>,
}

impl Server {
    pub fn new(config: Arc<Config>, store: Arc<Store>, replication: Arc<ReplicationState>) -> Self {
        Self {
            config,
            store,
            replication,
        }
    }

    /// Binds the configured address and serves until the process exits.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.config.listen_addr())
            .await
            .with_context(|| format!("failed to bind {}", self.config.listen_addr()))?;
        self.run_with_listener(listener).await
    }

    /// Serves on an already-bound listener. A replica completes its
    /// handshake with the master before accepting any client; a handshake
    /// failure is fatal to startup.
    pub async fn run_with_listener(self, listener: TcpListener) -> anyhow::Result<()> {
        let local_addr = listener.local_addr()?;

        if let Some((host, port)) = self.config.master_addr.clone() {
            let master_addr = format!("{}:{}", host, port);
            let link = handshake::perform(&master_addr, local_addr.port())
                .await
                .with_context(|| format!("replication handshake with {} failed", master_addr))?;

            let snapshot = rdb::parse(&link.snapshot)
                .context("snapshot received from master is not a valid RDB file")?;
            let loaded = snapshot.apply(&self.store).await;
            info!(master = %master_addr, keys = loaded, "completed full resync");

            let store = Arc::clone(&self.store);
            let replication = Arc::clone(&self.replication);
            tokio::spawn(async move {
                run_master_link(store, replication, link).await;
            });
        }

        info!(
            addr = %local_addr,
            role = self.replication.role().as_str(),
            "listening for connections"
        );

        loop {
            match listener.accept().await {
                Ok((socket, addr)) => {
                    let config = Arc::clone(&self.config);
                    let store = Arc::clone(&self.store);
                    let replication = Arc::clone(&self.replication);
                    tokio::spawn(async move {
                        handle_connection(config, store, replication, socket, addr).await;
                    });
                }
                Err(err) => {
                    error!(%err, "failed to accept connection");
                }
            }
        }
    }
}

async fn handle_connection(
    config: Arc<Config>,
    store: Arc<Store>,
    replication: Arc<ReplicationState>,
    socket: TcpStream,
    addr: SocketAddr,
) {
    debug!(%addr, "client connected");

    let (mut reader, mut writer) = socket.into_split();
    let mut decoder = FrameDecoder::new();
    let mut txn = Transaction::new();
    let mut buf = [0u8; READ_BUFFER_SIZE];

    loop {
        loop {
            let frame = match decoder.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) => {
                    // Protocol desync is connection-fatal.
                    warn!(%addr, %err, "malformed frame, closing connection");
                    return;
                }
            };

            // Clients may only send command arrays; anything else means
            // the stream is not speaking the request protocol.
            if !matches!(frame.value, RespValue::Array(_)) {
                warn!(%addr, "expected a command array, closing connection");
                return;
            }

            let command = match Command::from_frame(frame) {
                Ok(command) => command,
                Err(err) => {
                    if write_reply(&mut writer, &err.to_reply(), &addr).await.is_err() {
                        return;
                    }
                    continue;
                }
            };

            let outcome = match replication.role() {
                Role::Master => {
                    handle_master_command(&config, &store, &replication, &mut txn, command).await
                }
                Role::Replica => {
                    handle_replica_client_command(&config, &store, &replication, command).await
                }
            };

            match outcome {
                Ok(Outcome::Reply(reply)) => {
                    if write_reply(&mut writer, &reply, &addr).await.is_err() {
                        return;
                    }
                }
                Ok(Outcome::Silent) => {}
                Ok(Outcome::FullResync(header)) => {
                    let mut payload = header.encode();
                    payload.extend_from_slice(
                        &RespValue::Raw(rdb::EMPTY_SNAPSHOT.to_vec()).encode(),
                    );
                    if let Err(err) = writer.write_all(&payload).await {
                        warn!(%addr, %err, "failed to send full resync payload");
                        return;
                    }

                    replication.register_replica(addr, writer).await;
                    replication.backfill_dataset(&addr, &store).await;
                    serve_replica_acks(reader, decoder, replication, addr).await;
                    return;
                }
                Err(err) => {
                    if write_reply(&mut writer, &err.to_reply(), &addr).await.is_err() {
                        return;
                    }
                }
            }
        }

        match reader.read(&mut buf).await {
            Ok(0) => {
                debug!(%addr, "client disconnected");
                return;
            }
            Ok(read) => decoder.extend(&buf[..read]),
            Err(err) => {
                debug!(%addr, %err, "read error, closing connection");
                return;
            }
        }
    }
}

/// After a full resync this connection's read half only carries
/// `REPLCONF ACK <offset>` frames from the replica. The replica stays
/// registered until this loop sees EOF on its own read path.
async fn serve_replica_acks(
    mut reader: OwnedReadHalf,
    mut decoder: FrameDecoder,
    replication: Arc<ReplicationState>,
    addr: SocketAddr,
) {
    let mut buf = [0u8; READ_BUFFER_SIZE];

    loop {
        loop {
            let frame = match decoder.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) => {
                    warn!(%addr, %err, "malformed frame on replica link");
                    replication.deregister_replica(&addr).await;
                    return;
                }
            };

            match Command::from_frame(frame) {
                Ok(command) if command.name() == "REPLCONF ACK" => {
                    match crate::commands::replconf::parse_ack_offset(command.args()) {
                        Ok(offset) => replication.record_ack(&addr, offset).await,
                        Err(err) => debug!(%addr, %err, "ignoring malformed ack"),
                    }
                }
                Ok(command) => {
                    debug!(%addr, command = command.name(), "ignoring frame from replica");
                }
                Err(err) => {
                    debug!(%addr, %err, "ignoring unparseable frame from replica");
                }
            }
        }

        match reader.read(&mut buf).await {
            Ok(0) => {
                info!(%addr, "replica disconnected");
                replication.deregister_replica(&addr).await;
                return;
            }
            Ok(read) => decoder.extend(&buf[..read]),
            Err(err) => {
                warn!(%addr, %err, "replica link read error");
                replication.deregister_replica(&addr).await;
                return;
            }
        }
    }
}

/// The replica side of the replication stream: applies commands arriving
/// from the master, answers GETACK probes, and advances the applied
/// offset by each frame's exact wire length.
async fn run_master_link(
    store: Arc<Store>,
    replication: Arc<ReplicationState>,
    link: MasterLink,
) {
    let MasterLink {
        mut stream,
        mut decoder,
        ..
    } = link;
    let mut buf = [0u8; READ_BUFFER_SIZE];

    loop {
        loop {
            let frame = match decoder.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) => {
                    error!(%err, "protocol error on master link, dropping replication");
                    return;
                }
            };
            let wire_len = frame.wire_len as u64;

            match Command::from_frame(frame) {
                Ok(command) => {
                    if let Some(reply) = apply_replicated(&store, &replication, &command).await {
                        if let Err(err) = stream.write_all(&reply.encode()).await {
                            error!(%err, "failed to answer master, dropping replication");
                            return;
                        }
                    }
                }
                Err(err) => {
                    debug!(%err, "ignoring unknown command from master");
                }
            }

            // Offsets track every frame the master sent, including PING
            // and the GETACK probe itself.
            replication.advance_offset(wire_len);
        }

        match stream.read(&mut buf).await {
            Ok(0) => {
                warn!("master closed the replication link");
                return;
            }
            Ok(read) => decoder.extend(&buf[..read]),
            Err(err) => {
                error!(%err, "master link read error");
                return;
            }
        }
    }
}

async fn write_reply(
    writer: &mut OwnedWriteHalf,
    reply: &RespValue,
    addr: &SocketAddr,
) -> std::io::Result<()> {
    let result = async {
        writer.write_all(&reply.encode()).await?;
        writer.flush().await
    }
    .await;

    if let Err(ref err) = result {
        debug!(%addr, %err, "failed to write reply");
    }
    result
}

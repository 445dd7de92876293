//! Replication state: role, offsets, the replica registry, write
//! propagation, and quorum waits.
//!
//! All replication state lives in one [`ReplicationState`] object that is
//! passed explicitly into the dispatcher and the connection server.
//! Propagation runs over a bounded queue and a dedicated writer task per
//! replica, so a slow or dead replica never blocks the command path; a
//! failed propagation is logged and counted, and the replica stays
//! registered until its own connection reads EOF.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

use crate::resp::RespValue;
use crate::store::Store;

/// Capacity of each replica's outbound command queue.
const REPLICA_QUEUE_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    Replica,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Master => "master",
            Role::Replica => "replica",
        }
    }
}

/// Handle to one registered replica connection.
#[derive(Debug)]
struct ReplicaHandle {
    sender: mpsc::Sender<Vec<u8>>,
    acked_offset: Arc<AtomicU64>,
}

/// Process-wide replication state. The offset counts propagated wire
/// bytes on a master and applied wire bytes on a replica.
#[derive(Debug)]
pub struct ReplicationState {
    role: Role,
    replication_id: String,
    offset: AtomicU64,
    replicas: Mutex<HashMap<SocketAddr, ReplicaHandle>>,
    ack_signal: Notify,
    failed_propagations: Arc<AtomicU64>,
}

impl ReplicationState {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            replication_id: generate_replication_id(),
            offset: AtomicU64::new(0),
            replicas: Mutex::new(HashMap::new()),
            ack_signal: Notify::new(),
            failed_propagations: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_master(&self) -> bool {
        self.role == Role::Master
    }

    pub fn replication_id(&self) -> &str {
        &self.replication_id
    }

    pub fn offset(&self) -> u64 {
        self.offset.load(Ordering::SeqCst)
    }

    pub fn advance_offset(&self, by: u64) -> u64 {
        self.offset.fetch_add(by, Ordering::SeqCst) + by
    }

    pub fn failed_propagation_count(&self) -> u64 {
        self.failed_propagations.load(Ordering::SeqCst)
    }

    pub async fn replica_count(&self) -> usize {
        self.replicas.lock().await.len()
    }

    /// Registers a freshly synced replica and spawns its writer task. The
    /// write half of the socket is owned by that task from here on; the
    /// caller keeps the read half to collect acks.
    pub async fn register_replica(&self, addr: SocketAddr, writer: OwnedWriteHalf) {
        let (sender, mut receiver) = mpsc::channel::<Vec<u8>>(REPLICA_QUEUE_DEPTH);
        let acked_offset = Arc::new(AtomicU64::new(0));
        let failures = Arc::clone(&self.failed_propagations);

        tokio::spawn(async move {
            let mut writer = writer;
            while let Some(payload) = receiver.recv().await {
                let written = async {
                    writer.write_all(&payload).await?;
                    writer.flush().await
                }
                .await;
                if let Err(err) = written {
                    failures.fetch_add(1, Ordering::SeqCst);
                    warn!(%addr, %err, "failed to propagate to replica");
                }
            }
        });

        let mut replicas = self.replicas.lock().await;
        replicas.insert(
            addr,
            ReplicaHandle {
                sender,
                acked_offset,
            },
        );
        debug!(%addr, total = replicas.len(), "registered replica");
    }

    /// Drops a replica whose connection has ended.
    pub async fn deregister_replica(&self, addr: &SocketAddr) {
        let mut replicas = self.replicas.lock().await;
        if replicas.remove(addr).is_some() {
            debug!(%addr, total = replicas.len(), "deregistered replica");
        }
    }

    /// Queues `payload` for every registered replica and advances the
    /// master offset by its length. Fire-and-forget: a full or closed
    /// queue is logged and counted, never retried, and the replica stays
    /// registered.
    pub async fn propagate(&self, payload: Vec<u8>) {
        self.advance_offset(payload.len() as u64);

        let replicas = self.replicas.lock().await;
        for (addr, replica) in replicas.iter() {
            if replica.sender.try_send(payload.clone()).is_err() {
                self.failed_propagations.fetch_add(1, Ordering::SeqCst);
                warn!(%addr, "replica queue rejected propagated command");
            }
        }
    }

    /// Sends the current dataset to one replica as SET commands, right
    /// after the snapshot payload of a full resync. These frames bypass
    /// offset accounting; the receiving replica simply ends up ahead of
    /// the master's counter, which quorum checks tolerate.
    pub async fn backfill_dataset(&self, addr: &SocketAddr, store: &Store) {
        let entries = store.dump_strings().await;
        if entries.is_empty() {
            return;
        }

        let replicas = self.replicas.lock().await;
        let Some(replica) = replicas.get(addr) else {
            return;
        };

        let count = entries.len();
        for (key, value, ttl_millis) in entries {
            let mut parts = vec!["SET".to_string(), key, value];
            if let Some(ttl) = ttl_millis {
                parts.push("px".to_string());
                parts.push(ttl.to_string());
            }
            let payload = RespValue::command(&parts).encode();
            if replica.sender.try_send(payload).is_err() {
                self.failed_propagations.fetch_add(1, Ordering::SeqCst);
                warn!(%addr, "replica queue rejected dataset backfill");
                return;
            }
        }
        debug!(%addr, keys = count, "backfilled dataset to new replica");
    }

    /// Records an acknowledged offset reported by a replica and wakes any
    /// WAIT callers so they can re-check their quorum predicate.
    pub async fn record_ack(&self, addr: &SocketAddr, offset: u64) {
        let replicas = self.replicas.lock().await;
        if let Some(replica) = replicas.get(addr) {
            replica.acked_offset.store(offset, Ordering::SeqCst);
        }
        drop(replicas);
        self.ack_signal.notify_waiters();
    }

    /// Blocks until at least `needed` replicas have acknowledged the
    /// current offset or `timeout_after` elapses, returning the number of
    /// acknowledgements actually observed. With no writes applied yet the
    /// reply is the plain replica count.
    pub async fn wait_for_acks(&self, needed: usize, timeout_after: Option<Duration>) -> usize {
        let target = self.offset();
        if target == 0 {
            return self.replica_count().await;
        }

        self.broadcast_getack().await;

        let deadline = timeout_after.map(|after| Instant::now() + after);
        loop {
            // Register for the next ack before re-checking the predicate,
            // otherwise an ack landing between the check and the await
            // would be lost.
            let notified = self.ack_signal.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let acked = self.count_acked(target).await;
            if acked >= needed {
                return acked;
            }

            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return acked;
                    }
                    if timeout(deadline - now, notified).await.is_err() {
                        return self.count_acked(target).await;
                    }
                }
                None => notified.await,
            }
        }
    }

    async fn count_acked(&self, target: u64) -> usize {
        let replicas = self.replicas.lock().await;
        replicas
            .values()
            .filter(|replica| replica.acked_offset.load(Ordering::SeqCst) >= target)
            .count()
    }

    /// Queues `REPLCONF GETACK *` for every replica. The frame itself
    /// counts toward the master offset, exactly as it will on each
    /// replica.
    async fn broadcast_getack(&self) {
        let payload = RespValue::command(&["REPLCONF", "GETACK", "*"]).encode();
        self.advance_offset(payload.len() as u64);

        let replicas = self.replicas.lock().await;
        for (addr, replica) in replicas.iter() {
            if replica.sender.try_send(payload.clone()).is_err() {
                self.failed_propagations.fetch_add(1, Ordering::SeqCst);
                warn!(%addr, "replica queue rejected GETACK");
            }
        }
    }
}

/// A fresh 40-character lowercase hex replication id.
fn generate_replication_id() -> String {
    let mut raw = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut raw);
    hex::encode(raw)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{generate_replication_id, ReplicationState, Role};

    #[test]
    fn test_replication_id_shape() {
        let id = generate_replication_id();
        assert_eq!(id.len(), 40);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, generate_replication_id());
    }

    #[test]
    fn test_role_strings() {
        assert_eq!(Role::Master.as_str(), "master");
        assert_eq!(Role::Replica.as_str(), "replica");
    }

    #[tokio::test]
    async fn test_offset_accounting() {
        let state = ReplicationState::new(Role::Master);
        assert_eq!(state.offset(), 0);
        assert_eq!(state.advance_offset(31), 31);
        assert_eq!(state.advance_offset(14), 45);
        assert_eq!(state.offset(), 45);
    }

    #[tokio::test]
    async fn test_wait_with_no_writes_reports_replica_count() {
        let state = ReplicationState::new(Role::Master);
        assert_eq!(state.wait_for_acks(3, None).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_with_zero_acks() {
        let state = ReplicationState::new(Role::Master);
        state.advance_offset(10);

        let acked = state
            .wait_for_acks(1, Some(Duration::from_millis(100)))
            .await;
        assert_eq!(acked, 0);
    }

    #[tokio::test]
    async fn test_propagation_to_nobody_still_advances_offset() {
        let state = ReplicationState::new(Role::Master);
        state.propagate(b"*1\r\n$4\r\nPING\r\n".to_vec()).await;
        assert_eq!(state.offset(), 14);
        assert_eq!(state.failed_propagation_count(), 0);
    }
}

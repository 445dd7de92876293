#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use redlite::config::Config;
use redlite::replication::ReplicationState;
use redlite::resp::{FrameDecoder, RespValue};
use redlite::server::Server;
use redlite::store::Store;

/// Spawns a server task on an ephemeral port and returns its address.
pub async fn spawn_server(config: Config, store: Arc<Store>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = Arc::new(Config {
        port: addr.port(),
        ..config
    });
    let replication = Arc::new(ReplicationState::new(config.role()));

    tokio::spawn(async move {
        let server = Server::new(config, store, replication);
        if let Err(err) = server.run_with_listener(listener).await {
            eprintln!("test server exited: {err:?}");
        }
    });

    addr
}

pub fn master_config() -> Config {
    Config {
        port: 0,
        master_addr: None,
        dir: None,
        dbfilename: None,
    }
}

pub async fn spawn_master() -> SocketAddr {
    let addr = spawn_server(master_config(), Arc::new(Store::new())).await;
    wait_until_serving(addr).await;
    addr
}

pub async fn spawn_replica(master: SocketAddr) -> SocketAddr {
    let config = Config {
        port: 0,
        master_addr: Some((master.ip().to_string(), master.port())),
        dir: None,
        dbfilename: None,
    };
    let addr = spawn_server(config, Arc::new(Store::new())).await;
    wait_until_serving(addr).await;
    addr
}

/// Polls INFO until the server answers, so tests only talk to a node
/// that finished its startup (including a replica's handshake).
pub async fn wait_until_serving(addr: SocketAddr) {
    for _ in 0..100 {
        if let Ok(mut client) = TestClient::connect(addr).await {
            if let Ok(RespValue::BulkString(_)) =
                client.try_roundtrip(&["INFO", "replication"]).await
            {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("server at {addr} never became ready");
}

/// A minimal RESP client for driving the server over a real socket.
pub struct TestClient {
    stream: TcpStream,
    decoder: FrameDecoder,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            stream,
            decoder: FrameDecoder::new(),
        })
    }

    pub async fn send(&mut self, parts: &[&str]) {
        self.stream
            .write_all(&RespValue::command(parts).encode())
            .await
            .unwrap();
        self.stream.flush().await.unwrap();
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    /// Reads one complete reply value.
    pub async fn read_value(&mut self) -> RespValue {
        self.try_read_value()
            .await
            .expect("timed out waiting for a reply")
    }

    pub async fn try_read_value(&mut self) -> std::io::Result<RespValue> {
        let mut buf = [0u8; 4096];
        loop {
            if let Some(frame) = self.decoder.next_frame().map_err(|err| {
                std::io::Error::new(std::io::ErrorKind::InvalidData, err.to_string())
            })? {
                return Ok(frame.value);
            }

            let read = timeout(Duration::from_secs(2), self.stream.read(&mut buf))
                .await
                .map_err(|_| {
                    std::io::Error::new(std::io::ErrorKind::TimedOut, "no reply within 2s")
                })??;
            if read == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed",
                ));
            }
            self.decoder.extend(&buf[..read]);
        }
    }

    pub async fn roundtrip(&mut self, parts: &[&str]) -> RespValue {
        self.send(parts).await;
        self.read_value().await
    }

    pub async fn try_roundtrip(&mut self, parts: &[&str]) -> std::io::Result<RespValue> {
        self.send(parts).await;
        self.try_read_value().await
    }

    /// True once the server has closed this connection.
    pub async fn is_closed(&mut self) -> bool {
        let mut buf = [0u8; 64];
        matches!(
            timeout(Duration::from_secs(2), self.stream.read(&mut buf)).await,
            Ok(Ok(0))
        )
    }
}

pub fn simple(s: &str) -> RespValue {
    RespValue::SimpleString(s.to_string())
}

pub fn bulk(s: &str) -> RespValue {
    RespValue::BulkString(s.to_string())
}

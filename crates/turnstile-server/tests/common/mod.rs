//! Shared helpers for server integration tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used, reason = "test helpers fail the calling test")]

use std::time::Duration;

use serde_json::Value;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use turnstile_server::{Server, ServerConfig};

/// How long any single wait may take before the test fails.
pub const WAIT: Duration = Duration::from_secs(5);

/// Start a server on an ephemeral loopback port.
pub async fn start_server(max_accepts: usize) -> Server {
    let config = ServerConfig {
        bind_address: "127.0.0.1:0".to_string(),
        max_outstanding_accepts: max_accepts,
        tick_interval: Duration::from_millis(5),
        ..ServerConfig::default()
    };
    Server::bind(config).await.unwrap()
}

/// Poll `condition` until it holds or [`WAIT`] expires.
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Minimal NUL-delimited JSON client.
pub struct TestClient {
    stream: TcpStream,
    pending: Vec<u8>,
}

impl TestClient {
    /// Connect to `server`.
    pub async fn connect(server: &Server) -> Self {
        let stream = TcpStream::connect(server.local_addr()).await.unwrap();
        Self { stream, pending: Vec::new() }
    }

    /// Send one document as a frame.
    pub async fn send(&mut self, document: &Value) {
        let mut bytes = serde_json::to_vec(document).unwrap();
        bytes.push(0);
        self.send_raw(&bytes).await;
    }

    /// Send raw bytes.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
    }

    /// Receive the next frame.
    pub async fn recv(&mut self) -> Value {
        timeout(WAIT, self.next_frame()).await.expect("timed out waiting for a frame")
    }

    /// Receive the next frame and check its `type`/`subtype`.
    pub async fn expect(&mut self, kind: &str) -> Value {
        let frame = self.recv().await;
        let actual = frame.get("subtype").or_else(|| frame.get("type")).and_then(Value::as_str);
        assert_eq!(actual, Some(kind), "unexpected frame: {frame}");
        frame
    }

    /// Assert nothing arrives for a short while.
    pub async fn expect_silence(&mut self) {
        let result = timeout(Duration::from_millis(100), self.next_frame()).await;
        assert!(result.is_err(), "unexpected frame: {:?}", result.ok());
    }

    /// Wait for the server to close the connection.
    pub async fn expect_closed(&mut self) {
        let mut buf = [0u8; 64];
        loop {
            let n = timeout(WAIT, self.stream.read(&mut buf))
                .await
                .expect("timed out waiting for close")
                .unwrap_or(0);
            if n == 0 {
                return;
            }
        }
    }

    async fn next_frame(&mut self) -> Value {
        loop {
            if let Some(end) = self.pending.iter().position(|&b| b == 0) {
                let frame: Vec<u8> = self.pending.drain(..=end).collect();
                return serde_json::from_slice(&frame[..end]).unwrap();
            }

            let mut buf = [0u8; 1024];
            let n = self.stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "connection closed while waiting for a frame");
            self.pending.extend_from_slice(&buf[..n]);
        }
    }
}

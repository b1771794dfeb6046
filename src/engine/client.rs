//! Line-protocol client: the single channel between gateway and engine.
//!
//! Framing is one JSON object per line on each side. Requests and replies
//! are strictly paired and ordered -- the engine is not pipelined, so a
//! single mutex serializes every send/receive pair end to end. This mirrors
//! `engine_client.py`'s `asyncio.Lock` around `send_command`.

use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::protocol::*;

/// Failure modes of a single `send`. These are transport-level failures,
/// distinct from an `EngineEnvelope { success: false, .. }` business error.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("engine not running")]
    NotRunning,
    #[error("engine process already exited")]
    AlreadyExited,
    #[error("engine stdin write failed: {0}")]
    WriteFailed(#[source] std::io::Error),
    #[error("engine closed connection (no response)")]
    Eof,
    #[error("engine returned invalid JSON: {source}; line={raw:?}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
        raw: String,
    },
}

/// Pipe handles shared with the supervisor.
///
/// The supervisor (C4) is the sole closer of these handles; this client only
/// reads and writes through them while they are installed. Boxed as trait
/// objects rather than naming `ChildStdin`/`ChildStdout` directly so a test
/// can install an in-memory `tokio::io::duplex` pair instead of a real
/// subprocess, per the Design Note on testable seams.
pub struct EnginePipe {
    pub stdin: Box<dyn AsyncWrite + Send + Unpin>,
    pub stdout: BufReader<Box<dyn AsyncRead + Send + Unpin>>,
}

impl EnginePipe {
    /// Wraps a concrete writer/reader pair (real child stdio, or a test
    /// double) into boxed trait objects.
    pub fn new(
        stdin: impl AsyncWrite + Send + Unpin + 'static,
        stdout: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        Self {
            stdin: Box::new(stdin),
            stdout: BufReader::new(Box::new(stdout)),
        }
    }
}

/// Serializes concurrent HTTP-origin requests onto the engine's single
/// full-duplex pipe. `None` means the engine has never been started or has
/// been torn down; `Some` holds the live pipe while the process is up.
///
/// `alive` is a flag shared with the supervisor's exit-watch task (§4.4):
/// it flips to `false` the instant the subprocess exits, even before the
/// pipe itself is detached, so a send racing the exit observes
/// `AlreadyExited` rather than attempting a doomed write.
pub struct EngineClient {
    pipe: Arc<Mutex<Option<EnginePipe>>>,
    alive: Arc<AtomicBool>,
}

impl EngineClient {
    pub fn new() -> Self {
        Self {
            pipe: Arc::new(Mutex::new(None)),
            alive: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The shared liveness flag, handed to the supervisor at construction
    /// so its exit-watch task can flip it without touching the pipe mutex.
    pub fn alive_flag(&self) -> Arc<AtomicBool> {
        self.alive.clone()
    }

    /// Installs a freshly spawned pipe. Called by the supervisor after
    /// `Child::spawn` succeeds.
    pub async fn attach(&self, pipe: EnginePipe) {
        *self.pipe.lock().await = Some(pipe);
        self.alive.store(true, Ordering::SeqCst);
    }

    /// Removes the pipe without touching the underlying process; the
    /// supervisor owns process teardown.
    pub async fn detach(&self) {
        *self.pipe.lock().await = None;
        self.alive.store(false, Ordering::SeqCst);
    }

    pub async fn is_attached(&self) -> bool {
        self.pipe.lock().await.is_some()
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Sends a command and returns the parsed envelope, regardless of the
    /// envelope's own `success` flag -- envelope-level failures are business
    /// errors surfaced to the HTTP layer, not `ClientError`s.
    pub async fn send(&self, command: impl Serialize) -> Result<EngineEnvelope, ClientError> {
        let line = serde_json::to_string(&command).expect("command must serialize") + "\n";

        let mut guard = self.pipe.lock().await;
        if guard.is_none() {
            return Err(ClientError::NotRunning);
        }
        if !self.alive.load(Ordering::SeqCst) {
            *guard = None;
            return Err(ClientError::AlreadyExited);
        }
        let conn = guard.as_mut().ok_or(ClientError::NotRunning)?;

        tracing::debug!(command = %line.trim_end(), "sending to engine");

        if let Err(e) = conn.stdin.write_all(line.as_bytes()).await {
            *guard = None;
            self.alive.store(false, Ordering::SeqCst);
            return Err(ClientError::WriteFailed(e));
        }
        if let Err(e) = conn.stdin.flush().await {
            *guard = None;
            self.alive.store(false, Ordering::SeqCst);
            return Err(ClientError::WriteFailed(e));
        }

        let mut response_line = String::new();
        let n = conn
            .stdout
            .read_line(&mut response_line)
            .await
            .map_err(ClientError::WriteFailed)?;
        if n == 0 {
            // The pipe is desynchronized forever after a short read; drop it
            // so the next call fails fast instead of re-reading stale bytes.
            *guard = None;
            self.alive.store(false, Ordering::SeqCst);
            return Err(ClientError::Eof);
        }

        let envelope: EngineEnvelope =
            serde_json::from_str(&response_line).map_err(|source| ClientError::InvalidJson {
                source,
                raw: response_line.clone(),
            })?;

        tracing::debug!(response = %response_line.trim_end(), "received from engine");
        Ok(envelope)
    }

    pub async fn place_order(&self, order: OrderPayload) -> Result<EngineEnvelope, ClientError> {
        self.send(json!({
            "cmd": "place_order",
            "req_id": Uuid::new_v4().to_string(),
            "order": order,
        }))
        .await
    }

    pub async fn cancel_order(&self, order_id: i64) -> Result<EngineEnvelope, ClientError> {
        self.send(json!({
            "cmd": "cancel_order",
            "req_id": Uuid::new_v4().to_string(),
            "order_id": order_id,
        }))
        .await
    }

    pub async fn get_order(&self, order_id: i64) -> Result<EngineEnvelope, ClientError> {
        self.send(json!({
            "cmd": "get_order",
            "req_id": Uuid::new_v4().to_string(),
            "order_id": order_id,
        }))
        .await
    }

    pub async fn get_book(&self, symbol: &str, depth: u32) -> Result<EngineEnvelope, ClientError> {
        self.send(json!({
            "cmd": "get_book",
            "req_id": Uuid::new_v4().to_string(),
            "symbol": symbol,
            "depth": depth,
        }))
        .await
    }

    pub async fn get_trades(
        &self,
        symbol: &str,
        limit: u32,
    ) -> Result<EngineEnvelope, ClientError> {
        self.send(json!({
            "cmd": "get_trades",
            "req_id": Uuid::new_v4().to_string(),
            "symbol": symbol,
            "limit": limit,
        }))
        .await
    }

    pub async fn get_stats(&self) -> Result<EngineEnvelope, ClientError> {
        self.send(json!({
            "cmd": "get_stats",
            "req_id": Uuid::new_v4().to_string(),
        }))
        .await
    }

    pub async fn health(&self) -> Result<EngineEnvelope, ClientError> {
        self.send(json!({
            "cmd": "health",
            "req_id": Uuid::new_v4().to_string(),
        }))
        .await
    }

    pub async fn shutdown(&self) -> Result<EngineEnvelope, ClientError> {
        self.send(json!({
            "cmd": "shutdown",
            "req_id": Uuid::new_v4().to_string(),
        }))
        .await
    }
}

impl Default for EngineClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_without_attach_fails_fast() {
        let client = EngineClient::new();
        let err = client.health().await.unwrap_err();
        assert!(matches!(err, ClientError::NotRunning));
    }

    #[tokio::test]
    async fn detach_clears_attachment() {
        let client = EngineClient::new();
        assert!(!client.is_attached().await);
        client.detach().await;
        assert!(!client.is_attached().await);
    }
}

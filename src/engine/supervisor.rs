//! Engine subprocess lifecycle: spawn, graceful/forced shutdown, and an
//! exit-watch task that flips the shared liveness flag the instant the
//! engine dies. Ported from `EngineClient.start`/`.stop` in
//! `original_source/api/app/engine_client.py`, split here so the supervisor
//! (process lifecycle) and the client (pipe I/O) have a single owner each,
//! per spec §3's ownership rule: C4 is the sole closer of the pipe.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::engine::client::{EngineClient, EnginePipe};

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("engine binary not found at {0}")]
    BinaryNotFound(PathBuf),
    #[error("failed to create data directories: {0}")]
    DataDirs(#[source] std::io::Error),
    #[error("failed to spawn engine process: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Owns the engine subprocess. The client only ever sees the pipe handles;
/// `Child` itself never leaves this type.
pub struct EngineSupervisor {
    config: Arc<AppConfig>,
    client: Arc<EngineClient>,
    child: Arc<Mutex<Option<Child>>>,
}

impl EngineSupervisor {
    pub fn new(config: Arc<AppConfig>, client: Arc<EngineClient>) -> Self {
        Self {
            config,
            client,
            child: Arc::new(Mutex::new(None)),
        }
    }

    /// Spawns the engine. Preconditions: engine not already running (the
    /// caller -- the application's startup sequence -- only calls this
    /// once). Idempotently creates the data/snapshot directories.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        if !self.config.engine_path.exists() {
            return Err(SupervisorError::BinaryNotFound(
                self.config.engine_path.clone(),
            ));
        }

        std::fs::create_dir_all(&self.config.data_dir).map_err(SupervisorError::DataDirs)?;
        std::fs::create_dir_all(&self.config.snapshot_dir).map_err(SupervisorError::DataDirs)?;

        let mut cmd = Command::new(&self.config.engine_path);
        cmd.arg("--event-log")
            .arg(&self.config.event_log_path)
            .arg("--snapshot-dir")
            .arg(&self.config.snapshot_dir)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        tracing::info!(cmd = ?cmd.as_std(), "starting engine");

        let mut child = cmd.spawn().map_err(SupervisorError::Spawn)?;
        let pid = child.id();

        let stdin = child.stdin.take().expect("stdin piped");
        let stdout = child.stdout.take().expect("stdout piped");
        let stderr = child.stderr.take();

        self.client.attach(EnginePipe::new(stdin, stdout)).await;

        if let Some(stderr) = stderr {
            tokio::spawn(Self::drain_stderr(stderr));
        }

        *self.child.lock().await = Some(child);

        let alive = self.client.alive_flag();
        let client_for_watch = self.client.clone();
        let child_for_watch = self.child.clone();
        // Exit-watch: the only background task in the gateway (§2). Polls
        // rather than holding the lock across a blocking `wait()`, so
        // `stop()` can still take the child out from under it to kill it.
        // Flips the shared liveness flag as soon as the engine exits so
        // in-flight and subsequent `send`s observe `AlreadyExited` rather
        // than racing a doomed write against a half-dead pipe.
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(200)).await;
                let mut guard = child_for_watch.lock().await;
                let Some(c) = guard.as_mut() else {
                    // stop() already took the child; nothing left to watch.
                    return;
                };
                match c.try_wait() {
                    Ok(Some(status)) => {
                        tracing::warn!(%status, "engine process exited");
                        *guard = None;
                        drop(guard);
                        alive.store(false, Ordering::SeqCst);
                        client_for_watch.detach().await;
                        return;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!(error = %e, "failed to poll engine process");
                        return;
                    }
                }
            }
        });

        tracing::info!(pid, "engine started");
        Ok(())
    }

    /// Attempts graceful shutdown via the `shutdown` command (ignoring any
    /// I/O error, matching the Python original's "never crash during
    /// teardown" contract), then force-terminates if still alive, then
    /// awaits exit with a 5-second bound. Idempotent: safe to call on a
    /// supervisor that never started, or one that already stopped.
    pub async fn stop(&self) {
        let mut guard = self.child.lock().await;
        let Some(mut child) = guard.take() else {
            return;
        };
        drop(guard);

        if self.client.is_alive() {
            if let Err(e) = self.client.shutdown().await {
                tracing::warn!(error = %e, "graceful engine shutdown failed (ignored)");
            }
        }
        self.client.detach().await;

        match child.try_wait() {
            Ok(Some(_)) => {}
            Ok(None) => {
                if let Err(e) = child.start_kill() {
                    tracing::warn!(error = %e, "engine terminate failed (ignored)");
                }
                if tokio::time::timeout(Duration::from_secs(5), child.wait())
                    .await
                    .is_err()
                {
                    tracing::warn!("engine did not exit within 5s of termination (ignored)");
                }
            }
            Err(e) => tracing::warn!(error = %e, "engine poll failed during stop (ignored)"),
        }

        tracing::info!("engine stopped");
    }

    /// Observes subprocess state without blocking.
    pub fn is_alive(&self) -> bool {
        self.client.is_alive()
    }

    async fn drain_stderr(stderr: tokio::process::ChildStderr) {
        use tokio::io::AsyncBufReadExt;
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::warn!(engine_stderr = %line, "engine stderr");
        }
    }
}

//! Async client for communicating with the worker sidecar process.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

use super::error::{WorkerError, WorkerResult};
use super::protocol::{codes, ErrorInfo, RequestEnvelope, ResponseEnvelope};
use crate::config::Settings;

/// Default timeout for requests (120 seconds; LLM completions are slow).
const DEFAULT_TIMEOUT_SECS: u64 = 120;

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<ResponseEnvelope>>>>;

/// Async client for the worker sidecar.
///
/// The client spawns the worker as a child process and communicates via
/// NDJSON (newline-delimited JSON) over stdin/stdout. Each request has a
/// unique ID for correlation with responses, enabling concurrent requests
/// from many profiling and LLM tasks over one pipe.
///
/// # Example
///
/// ```ignore
/// use tablescribe::worker::{WorkerClient, protocol::*};
///
/// let client = WorkerClient::spawn("./tablescribe-worker").await?;
///
/// let response: GetColumnsResponse = client.request(
///     methods::GET_COLUMNS,
///     GetColumnsParams { ... }
/// ).await?;
/// ```
pub struct WorkerClient {
    /// Writer for sending requests to worker stdin.
    stdin: Arc<Mutex<BufWriter<ChildStdin>>>,

    /// Map of pending request IDs to response channels.
    pending: PendingMap,

    /// Handle to the worker child process.
    _child: Child,

    /// Handle to the background reader task.
    reader_task: tokio::task::JoinHandle<()>,

    /// Request timeout duration.
    timeout: Duration,
}

impl WorkerClient {
    /// Spawn a new worker process with the default timeout.
    pub async fn spawn<P: AsRef<Path>>(worker_path: P) -> WorkerResult<Self> {
        Self::spawn_with_args_and_timeout(
            worker_path,
            &[],
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
        .await
    }

    /// Spawn a worker using settings configuration.
    ///
    /// Uses the configured path (or searches common locations), extra
    /// arguments and request timeout from `[worker]`.
    pub async fn spawn_with_settings(settings: &Settings) -> WorkerResult<Self> {
        let worker_path = settings.worker_path().ok_or_else(|| {
            WorkerError::SpawnFailed(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Worker binary not found. Set worker.path in tablescribe.toml",
            ))
        })?;

        Self::spawn_with_args_and_timeout(
            &worker_path,
            &settings.worker.args,
            Duration::from_secs(settings.worker.timeout_seconds),
        )
        .await
    }

    /// Spawn a worker with arguments and custom timeout.
    pub async fn spawn_with_args_and_timeout<P: AsRef<Path>>(
        worker_path: P,
        args: &[String],
        timeout: Duration,
    ) -> WorkerResult<Self> {
        let mut child = Command::new(worker_path.as_ref())
            .args(args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(WorkerError::SpawnFailed)?;

        let stdin = child.stdin.take().ok_or_else(|| {
            WorkerError::SpawnFailed(std::io::Error::other("worker stdin not captured"))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            WorkerError::SpawnFailed(std::io::Error::other("worker stdout not captured"))
        })?;

        let stdin = Arc::new(Mutex::new(BufWriter::new(stdin)));
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let reader_task = Self::spawn_reader_task(stdout, pending.clone());

        debug!(path = %worker_path.as_ref().display(), "worker spawned");

        Ok(Self {
            stdin,
            pending,
            _child: child,
            reader_task,
            timeout,
        })
    }

    /// Spawn the background task that reads responses from the worker.
    fn spawn_reader_task(stdout: ChildStdout, pending: PendingMap) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => break,
                    Ok(_) => match serde_json::from_str::<ResponseEnvelope>(&line) {
                        Ok(resp) => {
                            let mut pending = pending.lock().await;
                            if let Some(tx) = pending.remove(&resp.id) {
                                let _ = tx.send(resp);
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "worker: failed to parse response");
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, "worker: read error");
                        break;
                    }
                }
            }

            // Worker exited - fail every waiting caller
            let mut pending = pending.lock().await;
            for (id, tx) in pending.drain() {
                let error_response = ResponseEnvelope {
                    id,
                    success: false,
                    result: None,
                    error: Some(ErrorInfo {
                        code: codes::WORKER_EXITED.to_string(),
                        message: "Worker process exited unexpectedly".to_string(),
                    }),
                };
                let _ = tx.send(error_response);
            }
        })
    }

    /// Send a request to the worker and wait for a response.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails, writing to the worker fails,
    /// the request times out, the worker returns an error response, or the
    /// response cannot be deserialized into `R`.
    pub async fn request<P, R>(&self, method: &str, params: P) -> WorkerResult<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = uuid::Uuid::new_v4().to_string();

        let request = RequestEnvelope {
            id: id.clone(),
            method: method.to_string(),
            params: serde_json::to_value(params).map_err(WorkerError::SerializeFailed)?,
        };

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id.clone(), tx);
        }

        {
            let mut stdin = self.stdin.lock().await;
            let line =
                serde_json::to_string(&request).map_err(WorkerError::SerializeFailed)? + "\n";
            stdin
                .write_all(line.as_bytes())
                .await
                .map_err(WorkerError::WriteFailed)?;
            stdin.flush().await.map_err(WorkerError::WriteFailed)?;
        }

        let response = match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(_)) => return Err(WorkerError::ChannelClosed),
            Err(_) => {
                // Drop the pending entry so a late reply is discarded
                let mut pending = self.pending.lock().await;
                pending.remove(&id);
                return Err(WorkerError::Timeout(self.timeout.as_secs()));
            }
        };

        if response.success {
            let result = response.result.unwrap_or(serde_json::Value::Null);
            serde_json::from_value(result).map_err(WorkerError::DeserializeFailed)
        } else {
            let error = response.error.unwrap_or_else(|| ErrorInfo {
                code: "UNKNOWN".to_string(),
                message: "Unknown error".to_string(),
            });
            Err(Self::classify_error(&error.code, &error.message))
        }
    }

    /// Classify a worker error into a more specific error type.
    fn classify_error(code: &str, message: &str) -> WorkerError {
        match code {
            codes::CONNECTION_FAILED => WorkerError::ConnectionFailed(message.to_string()),
            codes::QUERY_FAILED => WorkerError::QueryFailed(message.to_string()),
            codes::TABLE_NOT_FOUND => WorkerError::TableNotFound(message.to_string()),
            codes::RATE_LIMITED => WorkerError::RateLimited(message.to_string()),
            codes::TIMEOUT => WorkerError::Timeout(0),
            codes::AUTH_FAILED => WorkerError::AuthFailed(message.to_string()),
            codes::INVALID_REQUEST => WorkerError::InvalidRequest(message.to_string()),
            codes::METHOD_NOT_FOUND => WorkerError::MethodNotFound(message.to_string()),
            codes::WORKER_EXITED => WorkerError::WorkerExited,
            _ => WorkerError::remote(code, message),
        }
    }

    /// Check if the worker is still running.
    pub fn is_alive(&self) -> bool {
        !self.reader_task.is_finished()
    }

    /// Get the current request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Set the request timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }
}

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::client::conn::http1;
use hyper::{Method, Request, StatusCode, header};
use hyper_util::rt::TokioIo;
use pangolin_core::{DEFAULT_SOCKET_PATH, EXIT_PATH, ExitResponse, STATUS_PATH, StatusSnapshot};
use serde::de::DeserializeOwned;
use tokio::net::UnixStream;

use crate::error::ControlError;

/// Upper bound for one request/response exchange, connect included.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for a running `olm` process's control socket.
///
/// Every call is a single request on a fresh connection. There are no retries;
/// callers that want to wait for the process loop on their side.
#[derive(Debug, Clone)]
pub struct ControlClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl ControlClient {
    /// Create a client for `socket_path`, or [`DEFAULT_SOCKET_PATH`] when empty.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        let mut socket_path = socket_path.into();
        if socket_path.as_os_str().is_empty() {
            socket_path = PathBuf::from(DEFAULT_SOCKET_PATH);
        }
        Self {
            socket_path,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Liveness heuristic: the socket file exists.
    ///
    /// A stale socket left behind by a crashed process also reads as running.
    pub fn probe(&self) -> bool {
        self.socket_path.exists()
    }

    /// `GET /status`.
    pub async fn status(&self) -> Result<StatusSnapshot, ControlError> {
        self.request(Method::GET, STATUS_PATH).await
    }

    /// `POST /exit`.
    pub async fn exit(&self) -> Result<ExitResponse, ControlError> {
        self.request(Method::POST, EXIT_PATH).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
    ) -> Result<T, ControlError> {
        let (status, body) = match tokio::time::timeout(self.timeout, self.round_trip(method, path))
            .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(self.connection_error(format!(
                    "request timed out after {}ms",
                    self.timeout.as_millis()
                )));
            }
        };

        if status != StatusCode::OK {
            return Err(ControlError::UnexpectedStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).trim().to_string(),
            });
        }

        serde_json::from_slice(&body).map_err(ControlError::InvalidBody)
    }

    async fn round_trip(
        &self,
        method: Method,
        path: &str,
    ) -> Result<(StatusCode, Bytes), ControlError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| self.connection_error(e.to_string()))?;

        let (mut sender, conn) = http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| self.connection_error(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "control connection closed with error");
            }
        });

        let req = Request::builder()
            .method(method)
            .uri(path)
            .header(header::HOST, "localhost")
            .body(Empty::<Bytes>::new())
            .map_err(|e| ControlError::Request(e.to_string()))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| self.connection_error(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| self.connection_error(e.to_string()))?
            .to_bytes();

        Ok((status, body))
    }

    /// Classify a failed exchange by whether the socket file is still there.
    fn connection_error(&self, reason: String) -> ControlError {
        if self.probe() {
            ControlError::Unresponsive {
                path: self.socket_path.clone(),
                reason,
            }
        } else {
            ControlError::Unreachable {
                path: self.socket_path.clone(),
            }
        }
    }
}

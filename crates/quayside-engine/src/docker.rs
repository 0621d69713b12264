//! Docker Engine API implementation of the engine-client boundary.
//!
//! Speaks the engine's HTTP API directly over a per-request connection: a
//! Unix socket by default, or TCP when `DOCKER_HOST` says so. The transport
//! stays thin so that exec attach streams and log endpoints deliver the raw
//! multiplexed byte format, which the harness decodes itself via
//! [`crate::demux`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::client::conn::http1;
use hyper::{Method, Request, StatusCode, header};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;

use async_trait::async_trait;

use quayside_common::error::{QuaysideError, Result};
use quayside_common::types::{ContainerId, ExecId, NetworkId};

use crate::client::{ContainerEngine, ContainerStatus};
use crate::spec::ContainerSpec;
use crate::wire::{
    ContainerInspectResponse, ContainerWaitResponse, CreateContainerRequest,
    CreateContainerResponse, ErrorResponse, ExecCreateRequest, ExecCreateResponse,
    ExecInspectResponse, ExecStartRequest, NetworkCreateRequest, NetworkCreateResponse,
    VolumeCreateRequest, scan_build_progress,
};

/// Engine API version prefix on every request path.
const API_VERSION: &str = "v1.41";

/// Default engine socket on Linux hosts.
const DEFAULT_SOCKET: &str = "/var/run/docker.sock";

/// Environment variable naming the engine endpoint.
const DOCKER_HOST_ENV: &str = "DOCKER_HOST";

/// Host header value; the engine routes on the socket, not the authority.
const HOST_NAME: &str = "localhost";

/// Deadline applied to control-plane round-trips.
const CONTROL_DEADLINE_SECS: u64 = 30;

/// Where to reach the container engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Unix domain socket path.
    Unix(PathBuf),
    /// TCP `host:port` address.
    Tcp(String),
}

impl Endpoint {
    /// Resolves the endpoint from `DOCKER_HOST`, falling back to the
    /// platform default socket when the variable is unset or empty.
    ///
    /// # Errors
    ///
    /// Returns [`QuaysideError::Config`] if `DOCKER_HOST` is set to a value
    /// with an unsupported scheme.
    pub fn from_env() -> Result<Self> {
        match std::env::var(DOCKER_HOST_ENV) {
            Ok(value) if !value.is_empty() => value.parse(),
            _ => Ok(Self::default()),
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::Unix(PathBuf::from(DEFAULT_SOCKET))
    }
}

impl FromStr for Endpoint {
    type Err = QuaysideError;

    fn from_str(value: &str) -> Result<Self> {
        if let Some(path) = value.strip_prefix("unix://") {
            Ok(Self::Unix(PathBuf::from(path)))
        } else if let Some(address) = value.strip_prefix("tcp://") {
            Ok(Self::Tcp(address.to_string()))
        } else {
            Err(QuaysideError::Config {
                message: format!("unsupported engine endpoint: {value}"),
            })
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
            Self::Tcp(address) => write!(f, "tcp://{address}"),
        }
    }
}

/// Docker Engine API client.
///
/// Holds nothing but the endpoint; each call opens a fresh connection,
/// performs one exchange, and lets the connection go. That keeps the client
/// trivially shareable across concurrent lifecycles.
#[derive(Debug, Clone)]
pub struct DockerEngine {
    endpoint: Endpoint,
    control_deadline: Duration,
}

impl DockerEngine {
    /// Creates a client for the given endpoint.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            control_deadline: Duration::from_secs(CONTROL_DEADLINE_SECS),
        }
    }

    /// Creates a client from `DOCKER_HOST` or the platform default.
    ///
    /// # Errors
    ///
    /// Returns [`QuaysideError::Config`] on an unsupported `DOCKER_HOST`.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(Endpoint::from_env()?))
    }

    /// Returns the endpoint this client talks to.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Opens a connection and hands back the request sender half.
    async fn connect(&self, operation: &'static str) -> Result<http1::SendRequest<Full<Bytes>>> {
        match &self.endpoint {
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                let stream = UnixStream::connect(path)
                    .await
                    .map_err(|e| QuaysideError::Io {
                        path: path.clone(),
                        source: e,
                    })?;
                spawn_connection(operation, TokioIo::new(stream)).await
            }
            #[cfg(not(unix))]
            Endpoint::Unix(path) => Err(QuaysideError::Config {
                message: format!(
                    "unix socket endpoint {} is unsupported on this platform",
                    path.display()
                ),
            }),
            Endpoint::Tcp(address) => {
                let stream = TcpStream::connect(address)
                    .await
                    .map_err(|e| engine_error(operation, &e))?;
                spawn_connection(operation, TokioIo::new(stream)).await
            }
        }
    }

    /// One full request/response exchange, body collected to completion.
    async fn exchange(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        content_type: Option<&'static str>,
        body: Bytes,
    ) -> Result<(StatusCode, Bytes)> {
        let mut sender = self.connect(operation).await?;

        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header(header::HOST, HOST_NAME);
        if let Some(value) = content_type {
            builder = builder.header(header::CONTENT_TYPE, value);
        }
        let request = builder
            .body(Full::new(body))
            .map_err(|e| engine_error(operation, &e))?;

        let response = sender
            .send_request(request)
            .await
            .map_err(|e| engine_error(operation, &e))?;
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| engine_error(operation, &e))?
            .to_bytes();
        Ok((status, bytes))
    }

    /// Exchange bounded by the control-plane deadline.
    async fn control(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        json_body: Option<Vec<u8>>,
    ) -> Result<(StatusCode, Bytes)> {
        let (content_type, body) = match json_body {
            Some(payload) => (Some("application/json"), Bytes::from(payload)),
            None => (None, Bytes::new()),
        };
        let exchange = self.exchange(operation, method, path, content_type, body);
        tokio::time::timeout(self.control_deadline, exchange)
            .await
            .map_err(|_| QuaysideError::Timeout {
                operation: operation.into(),
                seconds: self.control_deadline.as_secs(),
            })?
    }

    /// Exchange with no deadline; used for the logically blocking endpoints
    /// (wait, exec attach, logs, build) which callers bound themselves.
    async fn streaming(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        content_type: Option<&'static str>,
        body: Bytes,
    ) -> Result<(StatusCode, Bytes)> {
        self.exchange(operation, method, path, content_type, body)
            .await
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn create_container(&self, name: &str, spec: &ContainerSpec) -> Result<ContainerId> {
        let operation = "create container";
        let payload = serde_json::to_vec(&CreateContainerRequest::from(spec))?;
        let path = format!("/{API_VERSION}/containers/create?name={name}");
        let (status, body) = self
            .control(operation, Method::POST, &path, Some(payload))
            .await?;
        check_status(operation, "image", &spec.image, status, &body)?;

        let response: CreateContainerResponse = serde_json::from_slice(&body)?;
        for warning in &response.warnings {
            tracing::warn!(warning = %warning, "engine warning during create");
        }
        tracing::info!(id = %response.id, name, "container created");
        Ok(ContainerId::new(response.id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<()> {
        let operation = "start container";
        let path = format!("/{API_VERSION}/containers/{id}/start");
        let (status, body) = self.control(operation, Method::POST, &path, None).await?;
        check_status(operation, "container", id.as_str(), status, &body)
    }

    async fn stop_container(&self, id: &ContainerId, grace: Duration) -> Result<()> {
        let operation = "stop container";
        let path = format!(
            "/{API_VERSION}/containers/{id}/stop?t={}",
            grace.as_secs()
        );
        // The engine worst-case blocks for the grace period before killing;
        // give the round-trip that long plus the control margin.
        let exchange = self.exchange(operation, Method::POST, &path, None, Bytes::new());
        let deadline = grace + self.control_deadline;
        let (status, body) = tokio::time::timeout(deadline, exchange)
            .await
            .map_err(|_| QuaysideError::Timeout {
                operation: operation.into(),
                seconds: deadline.as_secs(),
            })??;
        check_status(operation, "container", id.as_str(), status, &body)
    }

    async fn remove_container(&self, id: &ContainerId) -> Result<()> {
        let operation = "remove container";
        let path = format!("/{API_VERSION}/containers/{id}?force=1&v=1");
        let (status, body) = self.control(operation, Method::DELETE, &path, None).await?;
        check_status(operation, "container", id.as_str(), status, &body)
    }

    async fn wait_container(&self, id: &ContainerId) -> Result<i64> {
        let operation = "wait container";
        let path = format!("/{API_VERSION}/containers/{id}/wait");
        let (status, body) = self
            .streaming(operation, Method::POST, &path, None, Bytes::new())
            .await?;
        check_status(operation, "container", id.as_str(), status, &body)?;

        let response: ContainerWaitResponse = serde_json::from_slice(&body)?;
        if let Some(message) = response.error.and_then(|e| e.message) {
            tracing::warn!(id = %id, message = %message, "engine reported wait error");
        }
        Ok(response.status_code)
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerStatus> {
        let operation = "inspect container";
        let path = format!("/{API_VERSION}/containers/{id}/json");
        let (status, body) = self.control(operation, Method::GET, &path, None).await?;
        check_status(operation, "container", id.as_str(), status, &body)?;

        let response: ContainerInspectResponse = serde_json::from_slice(&body)?;
        response.state.ok_or_else(|| QuaysideError::Decode {
            message: format!("inspect response for {id} carries no state"),
        })
    }

    async fn container_logs(&self, id: &ContainerId) -> Result<Vec<u8>> {
        let operation = "stream logs";
        let path = format!("/{API_VERSION}/containers/{id}/logs?stdout=1&stderr=1");
        let (status, body) = self
            .streaming(operation, Method::GET, &path, None, Bytes::new())
            .await?;
        check_status(operation, "container", id.as_str(), status, &body)?;
        Ok(body.to_vec())
    }

    async fn create_exec(&self, id: &ContainerId, user: &str, cmd: &[String]) -> Result<ExecId> {
        let operation = "create exec";
        let payload = serde_json::to_vec(&ExecCreateRequest {
            user: user.to_string(),
            attach_stdout: true,
            attach_stderr: true,
            cmd: cmd.to_vec(),
        })?;
        let path = format!("/{API_VERSION}/containers/{id}/exec");
        let (status, body) = self
            .control(operation, Method::POST, &path, Some(payload))
            .await?;
        check_status(operation, "container", id.as_str(), status, &body)?;

        let response: ExecCreateResponse = serde_json::from_slice(&body)?;
        Ok(ExecId::new(response.id))
    }

    async fn start_exec(&self, id: &ExecId) -> Result<Vec<u8>> {
        let operation = "start exec";
        let payload = serde_json::to_vec(&ExecStartRequest {
            detach: false,
            tty: false,
        })?;
        let path = format!("/{API_VERSION}/exec/{id}/start");
        // Non-detached start streams the command's multiplexed output as the
        // response body; end of body means the command has finished, which
        // is what makes a follow-up exec inspection reliable.
        let (status, body) = self
            .streaming(
                operation,
                Method::POST,
                &path,
                Some("application/json"),
                Bytes::from(payload),
            )
            .await?;
        check_status(operation, "exec", id.as_str(), status, &body)?;
        Ok(body.to_vec())
    }

    async fn inspect_exec(&self, id: &ExecId) -> Result<i64> {
        let operation = "inspect exec";
        let path = format!("/{API_VERSION}/exec/{id}/json");
        let (status, body) = self.control(operation, Method::GET, &path, None).await?;
        check_status(operation, "exec", id.as_str(), status, &body)?;

        let response: ExecInspectResponse = serde_json::from_slice(&body)?;
        if response.running {
            tracing::warn!(id = %id, "exec still running at inspection");
        }
        Ok(response.exit_code.unwrap_or(0))
    }

    async fn build_image(&self, context: Vec<u8>, tag: &str) -> Result<()> {
        let operation = "build image";
        let path = format!("/{API_VERSION}/build?t={tag}");
        let (status, body) = self
            .streaming(
                operation,
                Method::POST,
                &path,
                Some("application/x-tar"),
                Bytes::from(context),
            )
            .await?;
        check_status(operation, "image", tag, status, &body)?;
        scan_build_progress(&body)?;
        tracing::info!(tag, "image built");
        Ok(())
    }

    async fn remove_image(&self, tag: &str) -> Result<()> {
        let operation = "remove image";
        let path = format!("/{API_VERSION}/images/{tag}?force=1");
        let (status, body) = self.control(operation, Method::DELETE, &path, None).await?;
        check_status(operation, "image", tag, status, &body)
    }

    async fn create_volume(&self, name: &str) -> Result<()> {
        let operation = "create volume";
        let payload = serde_json::to_vec(&VolumeCreateRequest {
            name: name.to_string(),
            driver: "local".to_string(),
        })?;
        let path = format!("/{API_VERSION}/volumes/create");
        let (status, body) = self
            .control(operation, Method::POST, &path, Some(payload))
            .await?;
        check_status(operation, "volume", name, status, &body)
    }

    async fn remove_volume(&self, name: &str) -> Result<()> {
        let operation = "remove volume";
        let path = format!("/{API_VERSION}/volumes/{name}?force=1");
        let (status, body) = self.control(operation, Method::DELETE, &path, None).await?;
        check_status(operation, "volume", name, status, &body)
    }

    async fn create_network(&self, name: &str) -> Result<NetworkId> {
        let operation = "create network";
        let payload = serde_json::to_vec(&NetworkCreateRequest {
            name: name.to_string(),
        })?;
        let path = format!("/{API_VERSION}/networks/create");
        let (status, body) = self
            .control(operation, Method::POST, &path, Some(payload))
            .await?;
        check_status(operation, "network", name, status, &body)?;

        let response: NetworkCreateResponse = serde_json::from_slice(&body)?;
        Ok(NetworkId::new(response.id))
    }

    async fn remove_network(&self, id: &NetworkId) -> Result<()> {
        let operation = "remove network";
        let path = format!("/{API_VERSION}/networks/{id}");
        let (status, body) = self.control(operation, Method::DELETE, &path, None).await?;
        check_status(operation, "network", id.as_str(), status, &body)
    }
}

// ---------------------------------------------------------------------------
// Free helper functions
// ---------------------------------------------------------------------------

/// Completes the HTTP handshake and parks the connection driver on a task.
async fn spawn_connection<S>(
    operation: &'static str,
    io: S,
) -> Result<http1::SendRequest<Full<Bytes>>>
where
    S: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
{
    let (sender, connection) = http1::handshake(io)
        .await
        .map_err(|e| engine_error(operation, &e))?;
    drop(tokio::spawn(async move {
        if let Err(error) = connection.await {
            tracing::debug!(error = %error, "engine connection terminated");
        }
    }));
    Ok(sender)
}

/// Wraps a transport or protocol failure as an engine error.
fn engine_error(operation: &'static str, error: &impl fmt::Display) -> QuaysideError {
    QuaysideError::Engine {
        operation: operation.into(),
        message: error.to_string(),
    }
}

/// Maps a response status onto the error taxonomy.
///
/// 304 is success: the engine is saying the container is already in the
/// requested state, which the harness treats the same way.
fn check_status(
    operation: &'static str,
    kind: &'static str,
    id: &str,
    status: StatusCode,
    body: &[u8],
) -> Result<()> {
    if status.is_success() || status == StatusCode::NOT_MODIFIED {
        return Ok(());
    }
    if status == StatusCode::NOT_FOUND {
        return Err(QuaysideError::NotFound {
            kind,
            id: id.to_string(),
        });
    }
    Err(QuaysideError::Engine {
        operation: operation.into(),
        message: error_message(status, body),
    })
}

/// Extracts the engine's error message from a failure body.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<ErrorResponse>(body).map_or_else(
        |_| format!("{status}: {}", String::from_utf8_lossy(body).trim()),
        |parsed| format!("{status}: {}", parsed.message),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_parses_unix_and_tcp_schemes() {
        assert_eq!(
            "unix:///run/user/1000/docker.sock"
                .parse::<Endpoint>()
                .expect("unix"),
            Endpoint::Unix(PathBuf::from("/run/user/1000/docker.sock"))
        );
        assert_eq!(
            "tcp://127.0.0.1:2375".parse::<Endpoint>().expect("tcp"),
            Endpoint::Tcp("127.0.0.1:2375".to_string())
        );
        assert!("ssh://example".parse::<Endpoint>().is_err());
    }

    #[test]
    fn default_endpoint_is_the_local_socket() {
        assert_eq!(
            Endpoint::default(),
            Endpoint::Unix(PathBuf::from(DEFAULT_SOCKET))
        );
    }

    #[test]
    fn status_mapping_matches_the_taxonomy() {
        let ok = check_status("start container", "container", "c1", StatusCode::NO_CONTENT, b"");
        assert!(ok.is_ok());

        let already = check_status(
            "stop container",
            "container",
            "c1",
            StatusCode::NOT_MODIFIED,
            b"",
        );
        assert!(already.is_ok());

        let missing = check_status(
            "remove container",
            "container",
            "c1",
            StatusCode::NOT_FOUND,
            br#"{"message":"No such container: c1"}"#,
        );
        assert!(matches!(
            missing,
            Err(QuaysideError::NotFound { kind: "container", .. })
        ));

        let refused = check_status(
            "create container",
            "image",
            "qm:1",
            StatusCode::CONFLICT,
            br#"{"message":"name already in use"}"#,
        );
        assert!(matches!(refused, Err(QuaysideError::Engine { .. })));
        let message = refused.expect_err("conflict is an engine error").to_string();
        assert!(message.contains("name already in use"));
    }

    #[test]
    fn error_message_falls_back_to_raw_body() {
        let message = error_message(StatusCode::INTERNAL_SERVER_ERROR, b"not json\n");
        assert!(message.contains("not json"));
    }
}

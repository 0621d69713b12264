//! Docker Engine API wire types.
//!
//! Request and response bodies for the endpoints the adapter consumes,
//! mirroring the engine's PascalCase JSON field names. Only the fields the
//! harness actually reads are modeled; everything else is ignored on
//! deserialization.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use quayside_common::error::{QuaysideError, Result};

use crate::spec::ContainerSpec;

/// Body of `POST /containers/create`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateContainerRequest {
    /// Image reference to instantiate.
    pub image: String,
    /// Environment entries in `KEY=value` form.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    /// Optional hostname.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Optional entrypoint override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Vec<String>>,
    /// Exposed ports, keyed by `port/proto` with empty-object values.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub exposed_ports: HashMap<String, HashMap<String, String>>,
    /// Host-level settings (binds, capabilities).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_config: Option<HostConfig>,
}

/// Host-level container settings.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostConfig {
    /// Bind mounts in `host-path:container-path` form.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub binds: Vec<String>,
    /// Added Linux capabilities.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cap_add: Vec<String>,
}

impl From<&ContainerSpec> for CreateContainerRequest {
    fn from(spec: &ContainerSpec) -> Self {
        let exposed_ports = spec
            .exposed_ports
            .iter()
            .map(|port| (port.clone(), HashMap::new()))
            .collect();
        let host_config = if spec.binds.is_empty() && spec.cap_add.is_empty() {
            None
        } else {
            Some(HostConfig {
                binds: spec.binds.clone(),
                cap_add: spec.cap_add.clone(),
            })
        };
        Self {
            image: spec.image.clone(),
            env: spec.env.clone(),
            hostname: spec.hostname.clone(),
            entrypoint: spec.entrypoint.clone(),
            exposed_ports,
            host_config,
        }
    }
}

/// Response of `POST /containers/create`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateContainerResponse {
    /// Engine-assigned container identifier.
    pub id: String,
    /// Non-fatal warnings emitted during creation.
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Response of `POST /containers/{id}/wait`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerWaitResponse {
    /// Exit code of the container's main process.
    pub status_code: i64,
    /// Optional engine-side error detail.
    #[serde(default)]
    pub error: Option<WaitError>,
}

/// Error detail attached to a wait response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WaitError {
    /// Human-readable message.
    #[serde(default)]
    pub message: Option<String>,
}

/// Response of `GET /containers/{id}/json`, reduced to the state subset.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerInspectResponse {
    /// Current engine-side state.
    #[serde(default)]
    pub state: Option<crate::client::ContainerStatus>,
}

/// Body of `POST /containers/{id}/exec`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecCreateRequest {
    /// User to run the command as.
    pub user: String,
    /// Capture stdout over the attach stream.
    pub attach_stdout: bool,
    /// Capture stderr over the attach stream.
    pub attach_stderr: bool,
    /// Command argv.
    pub cmd: Vec<String>,
}

/// Response of `POST /containers/{id}/exec`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecCreateResponse {
    /// Engine-assigned exec identifier.
    pub id: String,
}

/// Body of `POST /exec/{id}/start`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecStartRequest {
    /// Run detached (no output stream). Always false here: the response
    /// body doubles as the completion signal.
    pub detach: bool,
    /// Allocate a TTY. Always false: a TTY would disable multiplexing.
    pub tty: bool,
}

/// Response of `GET /exec/{id}/json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecInspectResponse {
    /// Exit code, absent while the command is still running.
    #[serde(default)]
    pub exit_code: Option<i64>,
    /// Whether the command is still running.
    #[serde(default)]
    pub running: bool,
}

/// Body of `POST /volumes/create`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeCreateRequest {
    /// Volume name.
    pub name: String,
    /// Volume driver; always the local driver here.
    pub driver: String,
}

/// Body of `POST /networks/create`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkCreateRequest {
    /// Network name.
    pub name: String,
}

/// Response of `POST /networks/create`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkCreateResponse {
    /// Engine-assigned network identifier.
    pub id: String,
}

/// Error body the engine attaches to non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub message: String,
}

/// One line of the newline-delimited JSON build progress stream.
#[derive(Debug, Deserialize)]
pub struct BuildMessage {
    /// Human-readable progress text.
    #[serde(default)]
    pub stream: Option<String>,
    /// Build error; its presence aborts the build.
    #[serde(default)]
    pub error: Option<String>,
}

/// Scans a build progress stream, logging progress lines and failing on the
/// first reported error.
///
/// # Errors
///
/// Returns [`QuaysideError::Engine`] when the stream carries an error
/// message, or [`QuaysideError::Serialization`] if a line is not valid JSON.
pub fn scan_build_progress(body: &[u8]) -> Result<()> {
    for line in body.split(|byte| *byte == b'\n') {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let message: BuildMessage = serde_json::from_slice(line)?;
        if let Some(error) = message.error {
            return Err(QuaysideError::Engine {
                operation: "build image".into(),
                message: error,
            });
        }
        if let Some(text) = message.stream {
            let text = text.trim();
            if !text.is_empty() {
                tracing::debug!(step = %text, "image build progress");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_serializes_engine_field_names() {
        let spec = ContainerSpec::new("qm-devserver:latest")
            .with_env("LICENSE=accept")
            .with_hostname("qmhost")
            .with_bind("vol:/mnt/mqm")
            .with_cap("SYS_ADMIN")
            .with_exposed_port("1414/tcp");
        let request = CreateContainerRequest::from(&spec);
        let value = serde_json::to_value(&request).expect("serialize");

        assert_eq!(value["Image"], "qm-devserver:latest");
        assert_eq!(value["Env"][0], "LICENSE=accept");
        assert_eq!(value["Hostname"], "qmhost");
        assert_eq!(value["HostConfig"]["Binds"][0], "vol:/mnt/mqm");
        assert_eq!(value["HostConfig"]["CapAdd"][0], "SYS_ADMIN");
        assert!(value["ExposedPorts"]["1414/tcp"].is_object());
        assert!(value.get("Entrypoint").is_none());
    }

    #[test]
    fn minimal_create_request_omits_empty_sections() {
        let request = CreateContainerRequest::from(&ContainerSpec::new("qm:1"));
        let value = serde_json::to_value(&request).expect("serialize");

        assert_eq!(value["Image"], "qm:1");
        assert!(value.get("Env").is_none());
        assert!(value.get("HostConfig").is_none());
        assert!(value.get("ExposedPorts").is_none());
    }

    #[test]
    fn wait_response_parses_status_code() {
        let response: ContainerWaitResponse =
            serde_json::from_str(r#"{"StatusCode":1}"#).expect("parse");
        assert_eq!(response.status_code, 1);
        assert!(response.error.is_none());
    }

    #[test]
    fn exec_inspect_parses_optional_exit_code() {
        let finished: ExecInspectResponse =
            serde_json::from_str(r#"{"ExitCode":0,"Running":false}"#).expect("parse");
        assert_eq!(finished.exit_code, Some(0));
        assert!(!finished.running);

        let running: ExecInspectResponse =
            serde_json::from_str(r#"{"Running":true}"#).expect("parse");
        assert!(running.exit_code.is_none());
    }

    #[test]
    fn build_progress_error_aborts() {
        let body = concat!(
            "{\"stream\":\"Step 1/2 : FROM qm-devserver:latest\\n\"}\n",
            "{\"stream\":\" ---> abc123\\n\"}\n",
            "{\"error\":\"ADD failed: test.mqsc not found\",",
            "\"errorDetail\":{\"message\":\"ADD failed: test.mqsc not found\"}}\n",
        );
        let error = scan_build_progress(body.as_bytes()).expect_err("must abort");
        assert!(error.to_string().contains("ADD failed"));
    }

    #[test]
    fn build_progress_without_error_succeeds() {
        let body = "{\"stream\":\"Step 1/1 : FROM qm:1\\n\"}\n\n{\"stream\":\"Successfully built\\n\"}\n";
        scan_build_progress(body.as_bytes()).expect("clean build");
    }

    #[test]
    fn build_progress_rejects_non_json_lines() {
        assert!(scan_build_progress(b"not json at all").is_err());
    }
}

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pod-exec seam for the nodetool adapter.
//!
//! [`PodExec`] abstracts the Kubernetes exec subresource so the parsers and
//! ring operations can be unit tested against canned output. The production
//! implementation, [`KubePodExec`], attaches to the pod over the API server's
//! websocket channel and captures stdout and stderr separately.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, AttachParams};
use kube::{Client, ResourceExt};
use tokio::io::AsyncReadExt;

use super::{NodetoolError, NodetoolResult};

/// Captured output of a command executed inside a container.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    /// Everything the command wrote to stdout.
    pub stdout: String,
    /// Everything the command wrote to stderr.
    pub stderr: String,
}

/// Executes a command inside a named container of a pod.
#[async_trait]
pub trait PodExec: Send + Sync {
    /// Run `command` in `container` of `pod`, capturing stdout and stderr.
    ///
    /// A transport error means the command never ran; a non-empty `stderr`
    /// in the returned output is interpreted by the caller.
    async fn run(&self, pod: &Pod, container: &str, command: &[String])
        -> NodetoolResult<ExecOutput>;
}

/// [`PodExec`] backed by the Kubernetes exec subresource.
#[derive(Clone)]
pub struct KubePodExec {
    client: Client,
}

impl KubePodExec {
    /// Create an executor using the given Kubernetes client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PodExec for KubePodExec {
    async fn run(
        &self,
        pod: &Pod,
        container: &str,
        command: &[String],
    ) -> NodetoolResult<ExecOutput> {
        let namespace = pod.namespace().ok_or_else(|| {
            NodetoolError::Transport(format!("pod {} has no namespace", pod.name_any()))
        })?;
        let name = pod.name_any();

        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &namespace);
        let params = AttachParams::default()
            .container(container)
            .stdin(false)
            .stdout(true)
            .stderr(true)
            .tty(false);

        let mut attached = pods
            .exec(&name, command.to_vec(), &params)
            .await
            .map_err(|e| {
                NodetoolError::Transport(format!("exec on {namespace}/{name} failed: {e}"))
            })?;

        let stdout_reader = attached.stdout();
        let stderr_reader = attached.stderr();
        let (stdout, stderr) = tokio::join!(
            drain_stream(stdout_reader),
            drain_stream(stderr_reader)
        );
        let stdout = stdout.map_err(|e| NodetoolError::Transport(format!("reading stdout: {e}")))?;
        let stderr = stderr.map_err(|e| NodetoolError::Transport(format!("reading stderr: {e}")))?;

        attached
            .join()
            .await
            .map_err(|e| NodetoolError::Transport(format!("exec stream on {name}: {e}")))?;

        Ok(ExecOutput { stdout, stderr })
    }
}

/// Read an optional attached stream to completion.
async fn drain_stream(
    reader: Option<impl tokio::io::AsyncRead + Unpin>,
) -> std::io::Result<String> {
    let mut buffer = String::new();
    if let Some(mut reader) = reader {
        reader.read_to_string(&mut buffer).await?;
    }
    Ok(buffer)
}

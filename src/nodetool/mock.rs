// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Canned-output pod executor for nodetool tests.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use super::exec::{ExecOutput, PodExec};
use super::{NodetoolError, NodetoolResult};
use crate::constants::CASSANDRA_CONTAINER_NAME;

/// [`PodExec`] implementation returning scripted responses per subcommand.
///
/// Responses are consumed in FIFO order per subcommand, so a test can script
/// e.g. two different `statusthrift` answers. Executed subcommands are
/// recorded for assertion.
#[derive(Default)]
pub struct MockPodExec {
    responses: Mutex<HashMap<String, VecDeque<NodetoolResult<ExecOutput>>>>,
    calls: Mutex<Vec<String>>,
}

impl MockPodExec {
    /// Create an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a successful response with the given stdout for a subcommand.
    pub fn on_stdout(&self, subcommand: &str, stdout: &str) {
        self.push(
            subcommand,
            Ok(ExecOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
            }),
        );
    }

    /// Script a response that wrote to stderr for a subcommand.
    pub fn on_stderr(&self, subcommand: &str, stderr: &str) {
        self.push(
            subcommand,
            Ok(ExecOutput {
                stdout: String::new(),
                stderr: stderr.to_string(),
            }),
        );
    }

    /// Script a transport failure for a subcommand.
    pub fn on_transport_error(&self, subcommand: &str, message: &str) {
        self.push(
            subcommand,
            Err(NodetoolError::Transport(message.to_string())),
        );
    }

    /// Subcommands executed so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, subcommand: &str, response: NodetoolResult<ExecOutput>) {
        self.responses
            .lock()
            .unwrap()
            .entry(subcommand.to_string())
            .or_default()
            .push_back(response);
    }
}

#[async_trait]
impl PodExec for Arc<MockPodExec> {
    async fn run(
        &self,
        _pod: &Pod,
        _container: &str,
        command: &[String],
    ) -> NodetoolResult<ExecOutput> {
        let subcommand = command.get(1).cloned().unwrap_or_default();
        self.calls.lock().unwrap().push(subcommand.clone());

        self.responses
            .lock()
            .unwrap()
            .get_mut(&subcommand)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| panic!("no scripted response for nodetool {subcommand}"))
    }
}

/// Build a pod carrying the Cassandra container, suitable for exec tests.
pub fn cassandra_pod(name: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: CASSANDRA_CONTAINER_NAME.to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build a pod without the Cassandra container.
pub fn bare_pod(name: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: "sidecar".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    }
}

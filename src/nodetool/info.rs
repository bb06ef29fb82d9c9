// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Host id extraction from `nodetool info`.

use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;

use super::exec::PodExec;
use super::{Nodetool, NodetoolError, NodetoolResult};

impl<E: PodExec> Nodetool<E> {
    /// Return the Cassandra host id of the node running in `pod`.
    ///
    /// Parses the `ID` line of the `nodetool info` key/value listing.
    ///
    /// # Errors
    ///
    /// A listing without an `ID` line is a parse failure.
    pub async fn host_id(&self, pod: &Pod) -> NodetoolResult<String> {
        let output = self.run(pod, "info", &[]).await?;
        parse_host_id(&output).ok_or_else(|| {
            NodetoolError::Parse(format!("no ID line in info output for pod {}", pod.name_any()))
        })
    }
}

/// Find the `ID` line and return its trimmed value.
pub fn parse_host_id(output: &str) -> Option<String> {
    for line in output.lines() {
        if let Some((key, value)) = line.split_once(':') {
            if key.trim() == "ID" {
                let value = value.trim();
                if value.is_empty() {
                    return None;
                }
                return Some(value.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
#[path = "info_tests.rs"]
mod info_tests;

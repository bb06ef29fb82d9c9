// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `nodetool status` parsing.
//!
//! The listing is grouped into datacenter blocks. Each block opens with a
//! `Datacenter: <name>` line followed by four header lines, then one line per
//! node with exactly eight fields:
//!
//! ```text
//! Datacenter: us-central1
//! =======================
//! Status=Up/Down
//! |/ State=Normal/Leaving/Joining/Moving
//! --  Address     Load       Tokens  Owns (effective)  Host ID                               Rack
//! UN  10.4.0.12   51.71 KiB  256     65.7%             86a4d1b5-1a6c-4bd0-95a4-b373bc4e6fb0  rack1
//! ```

use k8s_openapi::api::core::v1::Pod;
use std::collections::HashMap;

use super::exec::PodExec;
use super::types::{NodeState, NodeStatus};
use super::{Nodetool, NodetoolError, NodetoolResult};

/// Number of header lines following each `Datacenter:` heading.
const DATACENTER_HEADER_LINES: usize = 4;

/// Field count of a well-formed node line.
const NODE_LINE_FIELDS: usize = 8;

/// One node entry of a `nodetool status` listing.
#[derive(Debug, Clone, PartialEq)]
pub struct RingStatus {
    /// Gossip reachability.
    pub status: NodeStatus,
    /// Ring membership state.
    pub state: NodeState,
    /// Listen address of the node.
    pub address: String,
    /// Human-readable on-disk load, value and unit.
    pub load: String,
    /// Number of tokens the node owns.
    pub token_count: u32,
    /// Effective ownership percentage.
    pub owns: f32,
    /// Cassandra host id (UUID).
    pub host_id: String,
    /// Rack label.
    pub rack: String,
    /// Datacenter of the block the node was listed under.
    pub datacenter: String,
}

impl<E: PodExec> Nodetool<E> {
    /// Retrieve the ring status as seen from the given node.
    ///
    /// Returns the full ring keyed by host id; entries carry the datacenter
    /// of the block they were listed under.
    ///
    /// # Errors
    ///
    /// Transport, protocol, or parse failures propagate unchanged.
    pub async fn ring_status(&self, pod: &Pod) -> NodetoolResult<HashMap<String, RingStatus>> {
        let output = self.run(pod, "status", &[]).await?;
        parse_ring_status(&output)
    }
}

/// Parse a full `nodetool status` listing into a host-id keyed map.
pub fn parse_ring_status(output: &str) -> NodetoolResult<HashMap<String, RingStatus>> {
    let mut entries = HashMap::new();
    let mut datacenter = String::new();

    let mut lines = output.lines();
    while let Some(line) = lines.next() {
        if line.is_empty() {
            continue;
        }

        if line.contains("Datacenter") {
            datacenter = line
                .split_once(':')
                .map(|(_, dc)| dc.trim().to_string())
                .ok_or_else(|| {
                    NodetoolError::Parse(format!("malformed datacenter heading: {line}"))
                })?;

            for _ in 0..DATACENTER_HEADER_LINES {
                lines.next();
            }
            continue;
        }

        let entry = parse_node_line(line, &datacenter)?;
        entries.insert(entry.host_id.clone(), entry);
    }

    Ok(entries)
}

/// Parse a single node line of the listing.
///
/// Fields are split on anything that is not alphanumeric, `.`, or `-`, which
/// keeps addresses, host ids, and fractional numbers intact while discarding
/// the `%` sign and column whitespace.
fn parse_node_line(line: &str, datacenter: &str) -> NodetoolResult<RingStatus> {
    let fields: Vec<&str> = line
        .split(|c: char| !c.is_alphanumeric() && c != '.' && c != '-')
        .filter(|f| !f.is_empty())
        .collect();

    if fields.len() != NODE_LINE_FIELDS {
        return Err(NodetoolError::Parse(format!(
            "invalid node line, had {} fields, expected {}: {line}",
            fields.len(),
            NODE_LINE_FIELDS
        )));
    }

    let prefix = fields[0].as_bytes();
    if prefix.len() != 2 {
        return Err(NodetoolError::Parse(format!(
            "invalid status prefix {:?}, expected 2 characters",
            fields[0]
        )));
    }

    let token_count: u32 = fields[4]
        .parse()
        .map_err(|_| NodetoolError::Parse(format!("invalid token count: {}", fields[4])))?;

    let owns: f32 = fields[5]
        .parse()
        .map_err(|_| NodetoolError::Parse(format!("invalid ownership: {}", fields[5])))?;

    Ok(RingStatus {
        status: NodeStatus::from_byte(prefix[0]),
        state: NodeState::from_byte(prefix[1]),
        address: fields[1].to_string(),
        load: format!("{} {}", fields[2], fields[3]),
        token_count,
        owns,
        host_id: fields[6].to_string(),
        rack: fields[7].to_string(),
        datacenter: datacenter.to_string(),
    })
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;

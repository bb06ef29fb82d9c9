// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ring state enumerations and the two-character prefix decoding used by
//! `nodetool status` output.

/// Reachability of a node as reported by gossip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Node is up.
    Up,
    /// Node is down.
    Down,
    /// Prefix byte outside {U, D}.
    Unknown,
}

impl NodeStatus {
    /// Decode the first byte of the status prefix.
    ///
    /// Bytes outside {U, D} decode to `Unknown` rather than failing; the
    /// field count check is what guards against malformed lines.
    #[must_use]
    pub fn from_byte(b: u8) -> Self {
        match b {
            b'U' => NodeStatus::Up,
            b'D' => NodeStatus::Down,
            _ => NodeStatus::Unknown,
        }
    }
}

/// Ring membership state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Member with its full token range.
    Normal,
    /// Streaming data in while joining the ring.
    Joining,
    /// Streaming data out while leaving the ring.
    Leaving,
    /// Token ranges are being moved.
    Moving,
    /// Prefix byte outside {N, J, L, M}.
    Unknown,
}

impl NodeState {
    /// Decode the second byte of the status prefix.
    #[must_use]
    pub fn from_byte(b: u8) -> Self {
        match b {
            b'N' => NodeState::Normal,
            b'J' => NodeState::Joining,
            b'L' => NodeState::Leaving,
            b'M' => NodeState::Moving,
            _ => NodeState::Unknown,
        }
    }
}

/// Streaming mode of a node as reported by `nodetool netstats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeMode {
    /// Node is bootstrapping into the ring.
    Joining,
    /// Node is decommissioning out of the ring.
    Leaving,
    /// Node is a normal member.
    Normal,
    /// Node finished decommissioning.
    Decommissioned,
    /// Node is a fat client, not a member.
    Client,
}

impl NodeMode {
    /// Parse the `Mode:` value of a netstats listing.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "JOINING" => Some(NodeMode::Joining),
            "LEAVING" => Some(NodeMode::Leaving),
            "NORMAL" => Some(NodeMode::Normal),
            "DECOMMISSIONED" => Some(NodeMode::Decommissioned),
            "CLIENT" => Some(NodeMode::Client),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;

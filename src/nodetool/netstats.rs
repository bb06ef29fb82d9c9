// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `nodetool netstats` parsing.
//!
//! Netstats reports the node's streaming mode, read-repair statistics, and a
//! thread-pool table:
//!
//! ```text
//! Mode: NORMAL
//! Not sending any streams.
//! Read Repair Statistics:
//! Attempted: 0
//! Mismatch (Blocking): 0
//! Mismatch (Background): 0
//! Pool Name                    Active   Pending      Completed   Dropped
//! Large messages                  n/a         0              0         0
//! Small messages                  n/a         0         166485         0
//! Gossip messages                 n/a         0         166485         0
//! ```

use k8s_openapi::api::core::v1::Pod;

use super::exec::PodExec;
use super::types::NodeMode;
use super::{Nodetool, NodetoolError, NodetoolResult};

/// Placeholder used by nodetool for columns without a value.
const NOT_AVAILABLE: &str = "n/a";

/// Parsed `nodetool netstats` output.
#[derive(Debug, Clone, PartialEq)]
pub struct Netstats {
    /// Streaming mode of the node.
    pub mode: NodeMode,
    /// Successfully completed read repair operations.
    pub attempted_read_repair_ops: u64,
    /// Read repairs since restart that blocked a query.
    pub mismatch_blocking_read_repair_ops: u64,
    /// Read repairs since restart performed in the background.
    pub mismatch_bg_read_repair_ops: u64,
    /// Client read/write request counts by thread pool.
    pub thread_pools: Vec<ThreadPoolNetstat>,
}

/// Active, pending, completed, and dropped counts for one thread pool.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ThreadPoolNetstat {
    /// Thread pool name; may contain spaces.
    pub name: String,
    /// Active commands.
    pub active: u64,
    /// Pending commands.
    pub pending: u64,
    /// Completed commands.
    pub completed: u64,
    /// Dropped commands.
    pub dropped: u64,
}

impl<E: PodExec> Nodetool<E> {
    /// Retrieve streaming and read-repair statistics for the node in `pod`.
    ///
    /// # Errors
    ///
    /// Transport, protocol, or parse failures propagate unchanged.
    pub async fn netstats(&self, pod: &Pod) -> NodetoolResult<Netstats> {
        let output = self.run(pod, "netstats", &[]).await?;
        parse_netstats(&output)
    }
}

/// Parse a full `nodetool netstats` listing.
pub fn parse_netstats(output: &str) -> NodetoolResult<Netstats> {
    let mut mode = None;
    let mut attempted = 0;
    let mut blocking = 0;
    let mut background = 0;
    let mut thread_pools = Vec::new();

    let mut lines = output.lines();
    while let Some(line) = lines.next() {
        if line.is_empty() {
            continue;
        }

        if let Some((key, value)) = line.split_once(':') {
            let value = value.trim();
            match key.trim() {
                "Mode" => {
                    mode = Some(NodeMode::parse(value).ok_or_else(|| {
                        NodetoolError::Parse(format!("unknown netstats mode: {value}"))
                    })?);
                    continue;
                }
                "Attempted" => {
                    attempted = parse_count(value)?;
                    continue;
                }
                "Mismatch (Blocking)" => {
                    blocking = parse_count(value)?;
                    continue;
                }
                "Mismatch (Background)" => {
                    background = parse_count(value)?;
                    continue;
                }
                _ => {}
            }
        }

        if line.contains("Pool Name") {
            for pool_line in lines.by_ref() {
                if pool_line.is_empty() {
                    continue;
                }
                thread_pools.push(parse_thread_pool_line(pool_line)?);
            }
        }
    }

    let mode =
        mode.ok_or_else(|| NodetoolError::Parse("netstats output has no Mode line".to_string()))?;

    Ok(Netstats {
        mode,
        attempted_read_repair_ops: attempted,
        mismatch_blocking_read_repair_ops: blocking,
        mismatch_bg_read_repair_ops: background,
        thread_pools,
    })
}

fn parse_count(value: &str) -> NodetoolResult<u64> {
    value
        .parse()
        .map_err(|_| NodetoolError::Parse(format!("invalid netstats counter: {value}")))
}

/// Parse one thread-pool row.
///
/// The pool name can span several fields; it ends at the first field that is
/// numeric or `n/a`. Missing columns keep their zero default.
fn parse_thread_pool_line(line: &str) -> NodetoolResult<ThreadPoolNetstat> {
    let fields: Vec<&str> = line
        .split(|c: char| !c.is_alphanumeric() && c != '.' && c != '-' && c != '/')
        .filter(|f| !f.is_empty())
        .collect();

    let mut name_parts = Vec::new();
    let mut base_idx = fields.len();
    for (i, field) in fields.iter().enumerate() {
        if *field == NOT_AVAILABLE || field.parse::<u64>().is_ok() {
            base_idx = i;
            break;
        }
        name_parts.push(*field);
    }

    Ok(ThreadPoolNetstat {
        name: name_parts.join(" "),
        active: column(&fields, base_idx)?,
        pending: column(&fields, base_idx + 1)?,
        completed: column(&fields, base_idx + 2)?,
        dropped: column(&fields, base_idx + 3)?,
    })
}

/// Numeric column value; missing columns and `n/a` count as zero.
fn column(fields: &[&str], idx: usize) -> NodetoolResult<u64> {
    match fields.get(idx) {
        None => Ok(0),
        Some(&NOT_AVAILABLE) => Ok(0),
        Some(value) => value
            .parse()
            .map_err(|_| NodetoolError::Parse(format!("invalid thread pool count: {value}"))),
    }
}

#[cfg(test)]
#[path = "netstats_tests.rs"]
mod netstats_tests;

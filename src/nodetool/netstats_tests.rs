// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `nodetool netstats` parsing.

#[cfg(test)]
mod tests {
    use crate::nodetool::netstats::parse_netstats;
    use crate::nodetool::types::NodeMode;
    use crate::nodetool::NodetoolError;

    const NETSTATS_OUTPUT: &str = "\
Mode: NORMAL
Not sending any streams.
Read Repair Statistics:
Attempted: 12
Mismatch (Blocking): 3
Mismatch (Background): 7
Pool Name                    Active   Pending      Completed   Dropped
Large messages                  n/a         0              0         0
Small messages                  n/a         1         166485         2
Gossip messages                 n/a         0         166485         0
";

    #[test]
    fn parses_mode_and_read_repair_counters() {
        let stats = parse_netstats(NETSTATS_OUTPUT).expect("netstats parses");
        assert_eq!(stats.mode, NodeMode::Normal);
        assert_eq!(stats.attempted_read_repair_ops, 12);
        assert_eq!(stats.mismatch_blocking_read_repair_ops, 3);
        assert_eq!(stats.mismatch_bg_read_repair_ops, 7);
    }

    #[test]
    fn parses_thread_pool_table() {
        let stats = parse_netstats(NETSTATS_OUTPUT).expect("netstats parses");
        assert_eq!(stats.thread_pools.len(), 3);

        let small = &stats.thread_pools[1];
        assert_eq!(small.name, "Small messages");
        assert_eq!(small.active, 0);
        assert_eq!(small.pending, 1);
        assert_eq!(small.completed, 166_485);
        assert_eq!(small.dropped, 2);
    }

    #[test]
    fn multi_word_pool_names_are_joined() {
        let stats = parse_netstats(NETSTATS_OUTPUT).expect("netstats parses");
        assert_eq!(stats.thread_pools[0].name, "Large messages");
        assert_eq!(stats.thread_pools[2].name, "Gossip messages");
    }

    #[test]
    fn decommissioning_mode_parses() {
        let output = "Mode: LEAVING\nAttempted: 0\n";
        let stats = parse_netstats(output).expect("netstats parses");
        assert_eq!(stats.mode, NodeMode::Leaving);
        assert!(stats.thread_pools.is_empty());
    }

    #[test]
    fn unknown_mode_is_a_parse_failure() {
        let err = parse_netstats("Mode: SIDEWAYS\n").expect_err("unknown mode fails");
        assert!(matches!(err, NodetoolError::Parse(_)));
    }

    #[test]
    fn missing_mode_is_a_parse_failure() {
        let err = parse_netstats("Attempted: 0\n").expect_err("missing mode fails");
        assert!(matches!(err, NodetoolError::Parse(_)));
    }

    #[test]
    fn non_numeric_counter_is_a_parse_failure() {
        let err = parse_netstats("Mode: NORMAL\nAttempted: many\n").expect_err("bad counter");
        assert!(matches!(err, NodetoolError::Parse(_)));
    }
}

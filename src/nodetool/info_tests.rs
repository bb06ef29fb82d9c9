// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `nodetool info` host id extraction.

#[cfg(test)]
mod tests {
    use crate::nodetool::info::parse_host_id;
    use crate::nodetool::mock::{cassandra_pod, MockPodExec};
    use crate::nodetool::{Nodetool, NodetoolError};
    use std::sync::Arc;

    const INFO_OUTPUT: &str = "\
ID                     : 86a4d1b5-1a6c-4bd0-95a4-b373bc4e6fb0
Gossip active          : true
Thrift active          : true
Native Transport active: true
Load                   : 51.71 KiB
Generation No          : 1552587144
Uptime (seconds)       : 4671
Heap Memory (MB)       : 65.72 / 386.00
";

    #[test]
    fn parses_the_id_line() {
        assert_eq!(
            parse_host_id(INFO_OUTPUT),
            Some("86a4d1b5-1a6c-4bd0-95a4-b373bc4e6fb0".to_string())
        );
    }

    #[test]
    fn id_line_may_appear_later_in_the_listing() {
        let output = "Gossip active : true\nID : abc-123\n";
        assert_eq!(parse_host_id(output), Some("abc-123".to_string()));
    }

    #[test]
    fn missing_id_line_yields_none() {
        assert_eq!(parse_host_id("Gossip active : true\n"), None);
        assert_eq!(parse_host_id(""), None);
    }

    #[test]
    fn empty_id_value_yields_none() {
        assert_eq!(parse_host_id("ID :\n"), None);
    }

    #[tokio::test]
    async fn host_id_runs_info() {
        let mock = Arc::new(MockPodExec::new());
        mock.on_stdout("info", INFO_OUTPUT);
        let nodetool = Nodetool::new(mock.clone());

        let id = nodetool
            .host_id(&cassandra_pod("c-0"))
            .await
            .expect("host id resolves");
        assert_eq!(id, "86a4d1b5-1a6c-4bd0-95a4-b373bc4e6fb0");
        assert_eq!(mock.calls(), vec!["info".to_string()]);
    }

    #[tokio::test]
    async fn missing_id_is_a_parse_failure() {
        let mock = Arc::new(MockPodExec::new());
        mock.on_stdout("info", "Gossip active : true\n");
        let nodetool = Nodetool::new(mock);

        let err = nodetool
            .host_id(&cassandra_pod("c-0"))
            .await
            .expect_err("missing ID fails");
        assert!(matches!(err, NodetoolError::Parse(_)));
    }
}

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the nodetool command runner.

#[cfg(test)]
mod tests {
    use crate::nodetool::mock::{bare_pod, cassandra_pod, MockPodExec};
    use crate::nodetool::{Nodetool, NodetoolError};
    use std::sync::Arc;

    #[tokio::test]
    async fn run_returns_stdout() {
        let mock = Arc::new(MockPodExec::new());
        mock.on_stdout("version", "ReleaseVersion: 3.11.4\n");
        let nodetool = Nodetool::new(mock.clone());

        let out = nodetool
            .run(&cassandra_pod("c-0"), "version", &[])
            .await
            .expect("command succeeds");
        assert_eq!(out, "ReleaseVersion: 3.11.4\n");
        assert_eq!(mock.calls(), vec!["version".to_string()]);
    }

    #[tokio::test]
    async fn run_requires_cassandra_container() {
        let mock = Arc::new(MockPodExec::new());
        let nodetool = Nodetool::new(mock);

        let err = nodetool
            .run(&bare_pod("c-0"), "status", &[])
            .await
            .expect_err("missing container fails");
        assert!(matches!(err, NodetoolError::Transport(_)));
    }

    #[tokio::test]
    async fn stderr_output_is_a_protocol_failure() {
        let mock = Arc::new(MockPodExec::new());
        mock.on_stderr("drain", "error: Connection refused");
        let nodetool = Nodetool::new(mock);

        let err = nodetool
            .run(&cassandra_pod("c-0"), "drain", &[])
            .await
            .expect_err("stderr fails the command");
        match err {
            NodetoolError::Protocol(msg) => assert!(msg.contains("Connection refused")),
            other => panic!("expected protocol failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let mock = Arc::new(MockPodExec::new());
        mock.on_transport_error("info", "connection reset");
        let nodetool = Nodetool::new(mock);

        let err = nodetool
            .run(&cassandra_pod("c-0"), "info", &[])
            .await
            .expect_err("transport failure propagates");
        assert!(matches!(err, NodetoolError::Transport(_)));
    }
}

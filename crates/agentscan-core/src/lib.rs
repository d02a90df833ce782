// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the agentscan orchestration engine.
//!
//! This crate provides the error taxonomy, the domain types, and the three
//! contracts the engine consumes: [`SecurityAgent`] (one per scanning tool),
//! [`JobQueue`] (the priority work queue), and [`ScanRepository`]
//! (persistence for scan jobs, results, and findings).

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{AgentscanError, ErrorKind};
pub use traits::{JobQueue, ScanRepository, SecurityAgent};
pub use types::{JobId, Priority, QueueJob, ScanJob};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agentscan_error_has_all_variants() {
        let errors = [
            AgentscanError::Validation("test".into()),
            AgentscanError::not_found("scan job", "x"),
            AgentscanError::Conflict("test".into()),
            AgentscanError::storage(std::io::Error::other("test")),
            AgentscanError::queue("test"),
            AgentscanError::Agent {
                agent: "a".into(),
                message: "test".into(),
            },
            AgentscanError::HealthCheckFailed {
                name: "a".into(),
                source: Box::new(std::io::Error::other("test")),
            },
            AgentscanError::AgentUnhealthy {
                name: "a".into(),
                reason: "test".into(),
            },
            AgentscanError::Timeout {
                duration: std::time::Duration::from_secs(30),
            },
            AgentscanError::Cancelled,
            AgentscanError::Unavailable("test".into()),
            AgentscanError::Config("test".into()),
            AgentscanError::Internal("test".into()),
        ];
        assert_eq!(errors.len(), 13);
        for err in &errors {
            assert!(!err.to_string().is_empty());
        }
    }

    #[test]
    fn all_traits_are_object_safe() {
        fn _assert_agent(_: &dyn SecurityAgent) {}
        fn _assert_queue(_: &dyn JobQueue) {}
        fn _assert_repository(_: &dyn ScanRepository) {}
    }

    #[test]
    fn queue_job_serializes_priority_and_status_as_strings() {
        let job = QueueJob::new("scan", Priority::High, serde_json::Map::new());
        let json = serde_json::to_value(&job).expect("should serialize");
        assert_eq!(json["priority"], "high");
        assert_eq!(json["status"], "queued");
    }
}

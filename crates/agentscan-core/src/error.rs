// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the agentscan orchestration engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// The primary error type shared by every agentscan crate.
#[derive(Debug, Error)]
pub enum AgentscanError {
    /// A request or job field is missing or malformed.
    #[error("validation error: {0}")]
    Validation(String),

    /// The referenced job, scan, finding, or agent does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    /// The operation is illegal for the entity's current lifecycle state.
    #[error("invalid state: {0}")]
    Conflict(String),

    /// Persistence backend errors (connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Queue store errors.
    #[error("queue error: {message}")]
    Queue {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A scanning agent returned an error from its scan operation.
    #[error("agent {agent} failed: {message}")]
    Agent { agent: String, message: String },

    /// An agent's health probe failed.
    #[error("health check failed for {name}: {source}")]
    HealthCheckFailed {
        name: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A scan was refused because the agent is not healthy.
    #[error("agent {name} is unhealthy: {reason}")]
    AgentUnhealthy { name: String, reason: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// The caller cancelled the operation before it finished.
    #[error("operation cancelled")]
    Cancelled,

    /// A component reported itself unavailable (service stopped, no healthy agents).
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Configuration errors.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse error classification used for logging, metrics, and caller decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Infrastructure,
    Agent,
    Internal,
}

impl AgentscanError {
    /// Shorthand for a [`AgentscanError::NotFound`] error.
    pub fn not_found(kind: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.to_string(),
        }
    }

    /// Wrap any error as a storage failure.
    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Storage {
            source: source.into(),
        }
    }

    /// A queue failure without an underlying cause.
    pub fn queue(message: impl Into<String>) -> Self {
        Self::Queue {
            message: message.into(),
            source: None,
        }
    }

    /// Classify this error into the engine's error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::Config(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Storage { .. } | Self::Queue { .. } | Self::Unavailable(_) => {
                ErrorKind::Infrastructure
            }
            Self::Agent { .. }
            | Self::HealthCheckFailed { .. }
            | Self::AgentUnhealthy { .. }
            | Self::Timeout { .. }
            | Self::Cancelled => ErrorKind::Agent,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. } | Self::Queue { .. } | Self::Unavailable(_) | Self::Timeout { .. }
        )
    }
}

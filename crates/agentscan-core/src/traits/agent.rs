// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Security agent trait implemented by every scanning-tool wrapper.

use async_trait::async_trait;

use crate::error::AgentscanError;
use crate::types::agent::{AgentConfig, ScanConfig, ScanOutput};

/// A scanning tool wrapped behind a fixed capability contract.
///
/// Cancellation is cooperative: callers drop the returned future when a
/// deadline passes, so implementations must not rely on running to completion.
#[async_trait]
pub trait SecurityAgent: Send + Sync + 'static {
    /// Run the tool against the repository described by `config`.
    async fn scan(&self, config: &ScanConfig) -> Result<ScanOutput, AgentscanError>;

    /// Verify the tool is operational.
    async fn health_check(&self) -> Result<(), AgentscanError>;

    /// Declared capabilities (languages, categories, resource needs).
    fn config(&self) -> AgentConfig;
}

// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent management for agentscan.
//!
//! The [`AgentManager`] owns every registered [`SecurityAgent`], tracks its
//! health, and runs scans across several agents at once without letting one
//! agent's failure affect another.
//!
//! [`SecurityAgent`]: agentscan_core::SecurityAgent

pub mod manager;

pub use manager::{AgentInfo, AgentManager, AgentManagerStats, FanOut};

// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Priority job queue for the agentscan engine.
//!
//! [`policy`] holds the rules every queue store shares (validation,
//! exponential backoff, retry versus dead-letter). [`MemoryJobQueue`] is the
//! in-process store; the durable SQLite store lives in `agentscan-storage`.

pub mod memory;
pub mod policy;

pub use memory::MemoryJobQueue;
pub use policy::{QueueSettings, apply_failure, backoff_delay, validate_job};

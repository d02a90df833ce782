// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contracts the orchestration engine consumes.
//!
//! All traits use `#[async_trait]` so implementations can be held as
//! `Arc<dyn Trait>` and swapped without touching the worker pool or service.

pub mod agent;
pub mod queue;
pub mod repository;

pub use agent::SecurityAgent;
pub use queue::JobQueue;
pub use repository::ScanRepository;

// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for agentscan integration tests.
//!
//! Provides mock agents, an in-memory repository, a fault-injecting queue,
//! and a harness that wires them into a running orchestration service.
//!
//! # Components
//!
//! - [`MockAgent`] - Scanning agent with canned findings and switchable failures
//! - [`MemoryScanRepository`] - In-memory scan repository
//! - [`FaultyQueue`] - Job queue wrapper with fault switches
//! - [`TestHarness`] - End-to-end environment builder

pub mod faulty_queue;
pub mod harness;
pub mod memory_repository;
pub mod mock_agent;

pub use faulty_queue::FaultyQueue;
pub use harness::{TestHarness, scan_request};
pub use memory_repository::MemoryScanRepository;
pub use mock_agent::{MockAgent, sample_finding};

// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the agentscan engine.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, a durable [`SqliteJobQueue`], and
//! the [`SqliteScanRepository`] for scan jobs, results, and findings.

mod codec;
pub mod database;
pub mod job_queue;
pub mod migrations;
pub mod queries;
pub mod repository;

pub use database::Database;
pub use job_queue::SqliteJobQueue;
pub use repository::SqliteScanRepository;

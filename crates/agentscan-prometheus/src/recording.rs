// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any installed recorder collects these
//! metrics. Without a recorder every call is a no-op.

use metrics::{describe_counter, describe_gauge, describe_histogram};

pub const JOBS_ENQUEUED: &str = "agentscan_jobs_enqueued_total";
pub const JOBS_PROCESSED: &str = "agentscan_jobs_processed_total";
pub const JOB_DURATION: &str = "agentscan_job_duration_seconds";
pub const QUEUE_DEPTH: &str = "agentscan_queue_depth";
pub const AGENT_SCANS: &str = "agentscan_agent_scans_total";
pub const AGENT_HEALTH: &str = "agentscan_agent_health";
pub const AGENT_HEALTH_FAILURES: &str = "agentscan_agent_health_failures_total";

/// Register all agentscan metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(JOBS_ENQUEUED, "Queue jobs accepted, by priority tier");
    describe_counter!(
        JOBS_PROCESSED,
        "Queue jobs finished by a worker, by outcome"
    );
    describe_histogram!(JOB_DURATION, "Wall time of one scan job attempt in seconds");
    describe_gauge!(QUEUE_DEPTH, "Queue jobs per status at the last cleanup pass");
    describe_counter!(AGENT_SCANS, "Agent scan invocations, by outcome");
    describe_gauge!(AGENT_HEALTH, "1 when the agent's last health check passed");
    describe_counter!(AGENT_HEALTH_FAILURES, "Failed agent health checks");
}

/// Record a job accepted by the queue.
pub fn record_job_enqueued(priority: &str) {
    metrics::counter!(JOBS_ENQUEUED, "priority" => priority.to_string()).increment(1);
}

/// Record a job attempt finished by a worker.
pub fn record_job_processed(worker: &str, outcome: &str, seconds: f64) {
    metrics::counter!(
        JOBS_PROCESSED,
        "worker" => worker.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    metrics::histogram!(JOB_DURATION).record(seconds);
}

/// Set the number of jobs in `status`.
pub fn set_queue_depth(status: &str, depth: u64) {
    metrics::gauge!(QUEUE_DEPTH, "status" => status.to_string()).set(depth as f64);
}

/// Record one agent scan invocation.
pub fn record_agent_scan(agent: &str, outcome: &str) {
    metrics::counter!(
        AGENT_SCANS,
        "agent" => agent.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record the result of an agent health check.
pub fn set_agent_health(agent: &str, healthy: bool) {
    metrics::gauge!(AGENT_HEALTH, "agent" => agent.to_string()).set(if healthy { 1.0 } else { 0.0 });
    if !healthy {
        metrics::counter!(AGENT_HEALTH_FAILURES, "agent" => agent.to_string()).increment(1);
    }
}

// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property and concurrency tests for the in-memory priority queue.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use agentscan_core::traits::JobQueue;
use agentscan_core::types::{FailureDisposition, JobStatus, Priority, QueueJob};
use agentscan_queue::{MemoryJobQueue, backoff_delay};
use proptest::prelude::*;

fn job(priority: Priority) -> QueueJob {
    let mut payload = serde_json::Map::new();
    payload.insert("scan_job_id".into(), "x".into());
    QueueJob::new("scan", priority, payload)
}

fn priority_strategy() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Low),
        Just(Priority::Medium),
        Just(Priority::High)
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn dequeue_order_is_tier_then_fifo(priorities in prop::collection::vec(priority_strategy(), 1..40)) {
        let rt = runtime();
        let (expected, actual) = rt.block_on(async {
            let queue = MemoryJobQueue::default();
            let mut enqueued = Vec::new();
            for priority in &priorities {
                let id = queue.enqueue(job(*priority)).await.unwrap();
                enqueued.push((*priority, id));
            }

            // Stable sort keeps insertion order inside a tier.
            let mut expected = enqueued.clone();
            expected.sort_by_key(|(priority, _)| std::cmp::Reverse(*priority));
            let expected: Vec<_> = expected.into_iter().map(|(_, id)| id).collect();

            let mut actual = Vec::new();
            while let Some(job) = queue.dequeue("w").await.unwrap() {
                actual.push(job.id);
            }
            (expected, actual)
        });
        prop_assert_eq!(expected, actual);
    }

    #[test]
    fn backoff_is_monotonic_and_capped(
        base_ms in 0u64..120_000,
        cap_ms in 0u64..7_200_000,
        attempt in 1u32..64,
    ) {
        let base = Duration::from_millis(base_ms);
        let cap = Duration::from_millis(cap_ms);
        let current = backoff_delay(base, attempt, cap);
        let next = backoff_delay(base, attempt + 1, cap);
        prop_assert!(next >= current);
        prop_assert!(current <= cap);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_dequeue_hands_each_job_to_one_worker() {
    let queue = Arc::new(MemoryJobQueue::default());
    let mut enqueued = HashSet::new();
    for i in 0..100 {
        let priority = match i % 3 {
            0 => Priority::Low,
            1 => Priority::Medium,
            _ => Priority::High,
        };
        enqueued.insert(queue.enqueue(job(priority)).await.unwrap());
    }

    let mut handles = Vec::new();
    for w in 0..8 {
        let queue = Arc::clone(&queue);
        handles.push(tokio::spawn(async move {
            let worker = format!("worker-{w}");
            let mut claimed = Vec::new();
            while let Some(job) = queue.dequeue(&worker).await.unwrap() {
                assert_eq!(job.worker_id.as_deref(), Some(worker.as_str()));
                claimed.push(job.id);
            }
            claimed
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.await.unwrap() {
            assert!(seen.insert(id), "job {id} claimed twice");
        }
    }
    assert_eq!(seen, enqueued);
}

#[tokio::test]
async fn job_runs_at_most_max_attempts_times() {
    let queue = MemoryJobQueue::default();
    let id = queue
        .enqueue(
            job(Priority::Medium)
                .with_max_attempts(4)
                .with_retry_delay(Duration::ZERO),
        )
        .await
        .unwrap();

    let mut runs = 0;
    let mut last = None;
    while let Some(claimed) = queue.dequeue("w").await.unwrap() {
        runs += 1;
        assert_eq!(claimed.attempt, runs);
        last = Some(queue.fail(&id, "still broken").await.unwrap());
    }

    assert_eq!(runs, 4);
    assert_eq!(last, Some(FailureDisposition::DeadLettered));
    assert_eq!(
        queue.get_job(&id).await.unwrap().status,
        JobStatus::DeadLettered
    );
}

#[tokio::test]
async fn first_retry_waits_the_base_delay() {
    let queue = MemoryJobQueue::default();
    let base = Duration::from_secs(10);
    let id = queue
        .enqueue(job(Priority::Low).with_max_attempts(3).with_retry_delay(base))
        .await
        .unwrap();

    queue.dequeue("w").await.unwrap();
    let before = chrono::Utc::now();
    let FailureDisposition::Retrying { retry_at: first, .. } =
        queue.fail(&id, "boom").await.unwrap()
    else {
        panic!("expected a retry");
    };
    let first_delay = first - before;
    assert!(first_delay >= chrono::Duration::seconds(9));
    assert!(first_delay <= chrono::Duration::seconds(11));
}

#[tokio::test]
async fn promoted_scheduled_job_competes_by_tier() {
    let queue = MemoryJobQueue::default();
    let soon = chrono::Utc::now() + chrono::Duration::milliseconds(20);
    let scheduled = queue
        .enqueue(job(Priority::High).scheduled_for(soon))
        .await
        .unwrap();
    let low = queue.enqueue(job(Priority::Low)).await.unwrap();
    let medium = queue.enqueue(job(Priority::Medium)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(40)).await;

    assert_eq!(queue.dequeue("w").await.unwrap().unwrap().id, scheduled);
    assert_eq!(queue.dequeue("w").await.unwrap().unwrap().id, medium);
    assert_eq!(queue.dequeue("w").await.unwrap().unwrap().id, low);
}

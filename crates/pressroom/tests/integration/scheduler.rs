/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Schedule coordinator behavior: mutual exclusion, auto-pause, the timer
//! loop, and startup catchup.

use std::time::Duration;

use chrono::Utc;
use pressroom::{CoordinatorConfig, SchedulerError};
use serial_test::serial;

use crate::fixtures::{self, Harness};

#[tokio::test]
async fn manual_trigger_runs_a_full_batch() {
    fixtures::init_tracing();
    let target = fixtures::target("site-a");
    let harness = Harness::new(vec![target.clone()]);
    harness
        .seed_topics(&target.id, "health", &["first", "second"])
        .await;
    harness.seed_topics(&target.id, "beauty", &["third"]).await;

    let coordinator = harness.coordinator(fixtures::fast_coordinator_config());
    let summary = coordinator.trigger_batch(&target.id).await.unwrap();

    assert_eq!(summary.dispatched, 2);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(harness.ledger.all_records().await.len(), 2);
    assert_eq!(harness.publisher.created().await.len(), 2);
}

#[tokio::test]
async fn a_second_batch_for_the_same_target_is_rejected_while_one_runs() {
    let target = fixtures::target("site-a");
    let harness = Harness::new(vec![target.clone()]);
    harness
        .seed_topics(&target.id, "health", &["first", "second"])
        .await;
    harness.seed_topics(&target.id, "beauty", &["third"]).await;

    // Slow the content backend down so the first batch stays in flight.
    harness
        .backend
        .set_delay(Some(Duration::from_millis(150)))
        .await;

    let coordinator = harness.coordinator(fixtures::fast_coordinator_config());
    let background = {
        let coordinator = coordinator.clone();
        let target_id = target.id.clone();
        tokio::spawn(async move { coordinator.trigger_batch(&target_id).await })
    };
    tokio::time::sleep(Duration::from_millis(40)).await;

    let err = coordinator.trigger_batch(&target.id).await.unwrap_err();
    assert!(matches!(err, SchedulerError::BatchAlreadyRunning(_)));

    let summary = background.await.unwrap().unwrap();
    assert_eq!(summary.succeeded, 2);

    // Once the batch settles, the target can run again.
    harness.backend.set_delay(None).await;
    harness.seed_topics(&target.id, "fitness", &["fourth", "fifth"]).await;
    assert!(coordinator.trigger_batch(&target.id).await.is_ok());
}

#[tokio::test]
async fn disabled_targets_are_rejected_and_skipped() {
    let target = fixtures::target("site-a");
    let harness = Harness::new(vec![target.clone()]);
    harness.targets.set_enabled(&target.id, false).await.unwrap();

    let coordinator = harness.coordinator(fixtures::fast_coordinator_config());
    let err = coordinator.trigger_batch(&target.id).await.unwrap_err();
    assert!(matches!(err, SchedulerError::TargetDisabled(_)));

    let err = coordinator.trigger_batch("nowhere").await.unwrap_err();
    assert!(matches!(err, SchedulerError::UnknownTarget(_)));
}

#[tokio::test]
async fn repeated_empty_batches_auto_pause_the_target() {
    let mut target = fixtures::target("site-a");
    target.batch_size = 1;
    let harness = Harness::new(vec![target.clone()]);

    let config = CoordinatorConfig::builder()
        .tick_interval(Duration::from_millis(50))
        .max_consecutive_failures(2)
        .build();
    let coordinator = harness.coordinator(config);

    // Two batches in a row find no topics anywhere: backlog empty and the
    // suggestion backend returns nothing.
    for _ in 0..2 {
        harness.backend.queue_topics(vec![]).await;
        let summary = coordinator.trigger_batch(&target.id).await.unwrap();
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.failed, 1);
    }

    assert!(coordinator.status().paused.contains(&target.id));
    let err = coordinator.trigger_batch(&target.id).await.unwrap_err();
    assert!(matches!(err, SchedulerError::TargetPaused(_)));

    // An operator resume clears the pause; the default backend now supplies
    // topics and the batch succeeds, resetting the failure counter.
    coordinator.resume_target(&target.id);
    let summary = coordinator.trigger_batch(&target.id).await.unwrap();
    assert_eq!(summary.succeeded, 1);
    assert!(coordinator.status().paused.is_empty());
}

#[tokio::test]
async fn every_dispatch_without_a_topic_leaves_a_ledger_record() {
    let mut target = fixtures::target("site-a");
    target.batch_size = 2;
    let harness = Harness::new(vec![target.clone()]);
    harness.backend.queue_topics(vec![]).await;
    harness.backend.queue_topics(vec![]).await;

    let coordinator = harness.coordinator(fixtures::fast_coordinator_config());
    let summary = coordinator.trigger_batch(&target.id).await.unwrap();

    assert_eq!(summary.dispatched, 0);
    assert_eq!(summary.failed, 2);
    // No run disappears without a recorded outcome.
    let records = harness.ledger.all_records().await;
    assert_eq!(records.len(), 2);
    assert!(records
        .iter()
        .all(|record| !record.final_status.is_success()));
}

// Wall-clock driven: serialized so timer windows are not skewed by
// neighboring tests competing for the runtime.
#[tokio::test]
#[serial]
async fn timer_loop_fires_a_due_target_once() {
    let mut target = fixtures::target("site-a");
    target.batch_size = 1;
    // Fire shortly after the loop starts, in the target's (UTC) timezone.
    target.fire_times = vec![(Utc::now() + chrono::Duration::milliseconds(200)).time()];
    let harness = Harness::new(vec![target.clone()]);
    harness.seed_topics(&target.id, "health", &["timed topic"]).await;

    let coordinator = harness.coordinator(fixtures::fast_coordinator_config());
    let loop_handle = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.run().await })
    };

    tokio::time::sleep(Duration::from_millis(900)).await;
    coordinator.shutdown();
    loop_handle.await.unwrap();

    let records = harness.ledger.all_records().await;
    assert_eq!(records.len(), 1);
    assert!(records[0].final_status.is_success());
}

#[tokio::test]
#[serial]
async fn catchup_dispatches_a_fire_time_missed_earlier_today() {
    let mut target = fixtures::target("site-a");
    target.batch_size = 1;
    let earlier = Utc::now() - chrono::Duration::minutes(90);
    // Skip the brittle window right after local midnight: "earlier today"
    // must actually be today.
    if earlier.date_naive() != Utc::now().date_naive() {
        return;
    }
    target.fire_times = vec![earlier.time()];

    let harness = Harness::new(vec![target.clone()]);
    harness.seed_topics(&target.id, "health", &["missed topic"]).await;

    let config = CoordinatorConfig::builder()
        .tick_interval(Duration::from_millis(50))
        .catchup_on_start(true)
        .build();
    let coordinator = harness.coordinator(config);
    let loop_handle = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.run().await })
    };

    tokio::time::sleep(Duration::from_millis(500)).await;
    coordinator.shutdown();
    loop_handle.await.unwrap();

    let records = harness.ledger.all_records().await;
    assert_eq!(records.len(), 1);
}

#[tokio::test]
#[serial]
async fn missed_fire_times_are_ignored_without_catchup() {
    let mut target = fixtures::target("site-a");
    target.batch_size = 1;
    let earlier = Utc::now() - chrono::Duration::minutes(90);
    if earlier.date_naive() != Utc::now().date_naive() {
        return;
    }
    target.fire_times = vec![earlier.time()];

    let harness = Harness::new(vec![target.clone()]);
    harness.seed_topics(&target.id, "health", &["missed topic"]).await;

    let coordinator = harness.coordinator(fixtures::fast_coordinator_config());
    let loop_handle = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.run().await })
    };

    tokio::time::sleep(Duration::from_millis(300)).await;
    coordinator.shutdown();
    loop_handle.await.unwrap();

    assert!(harness.ledger.all_records().await.is_empty());
}

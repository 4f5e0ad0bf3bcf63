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

//! Pipeline executor stage semantics.

use std::time::Duration;

use pressroom::{
    FailureKind, FinalStatus, GeneratedDraft, PlatformAccount, Stage, StageOutcome, TopicStatus,
};
use tracing_test::traced_test;

use crate::fixtures::{self, Harness};

fn invalid_draft() -> GeneratedDraft {
    GeneratedDraft {
        title: "A valid looking title".into(),
        summary: "A valid looking summary sentence.".into(),
        body_html: "<p>Far too short to publish.</p>".into(),
    }
}

async fn topic_status(harness: &Harness, topic_id: uuid::Uuid) -> TopicStatus {
    harness
        .topics
        .snapshot()
        .await
        .into_iter()
        .find(|t| t.id == topic_id)
        .expect("seeded topic still present")
        .status
}

#[tokio::test]
async fn repeated_validation_failures_exhaust_the_draft_budget() {
    let target = fixtures::target("site-a");
    let harness = Harness::new(vec![target.clone()]);
    harness.seed_topics(&target.id, "health", &["sleep"]).await;

    for _ in 0..3 {
        harness.backend.queue_draft(Ok(invalid_draft())).await;
    }

    let item = harness.claim_item(&target, "health", "ana").await;
    let item_id = item.id;
    let topic_id = item.topic.id;
    let record = harness.executor.run(&target, item).await;

    match &record.final_status {
        FinalStatus::Failed {
            stage,
            kind,
            reason,
        } => {
            assert_eq!(*stage, Stage::Draft);
            assert_eq!(*kind, FailureKind::Validation);
            assert!(reason.contains("body too short"));
        }
        other => panic!("expected draft failure, got {:?}", other),
    }

    // Exactly the configured number of attempts, no more.
    assert_eq!(harness.backend.generate_calls(), 3);
    let transitions = harness.ledger.transitions_for(item_id).await;
    let draft_attempts: Vec<_> = transitions
        .iter()
        .filter(|t| t.stage == Stage::Draft)
        .collect();
    assert_eq!(draft_attempts.len(), 3);
    assert_eq!(draft_attempts[0].outcome, StageOutcome::AttemptFailed);
    assert_eq!(draft_attempts[1].outcome, StageOutcome::AttemptFailed);
    assert_eq!(draft_attempts[2].outcome, StageOutcome::Failed);

    // The originating topic goes back to pending for a later batch.
    assert_eq!(topic_status(&harness, topic_id).await, TopicStatus::Pending);
}

#[tokio::test]
async fn stage_timeout_counts_as_a_failed_attempt() {
    let target = fixtures::target("site-a");
    let harness = Harness::with_executor_config(
        vec![target.clone()],
        fixtures::executor_config_with(Duration::from_millis(50), 2),
    );
    harness.seed_topics(&target.id, "health", &["sleep"]).await;
    harness
        .backend
        .set_delay(Some(Duration::from_millis(200)))
        .await;

    let item = harness.claim_item(&target, "health", "ana").await;
    let record = harness.executor.run(&target, item).await;

    match &record.final_status {
        FinalStatus::Failed { stage, kind, .. } => {
            assert_eq!(*stage, Stage::Draft);
            assert_eq!(*kind, FailureKind::Timeout);
        }
        other => panic!("expected timeout failure, got {:?}", other),
    }
    // Both attempts started before timing out.
    assert_eq!(harness.backend.generate_calls(), 2);
}

#[tokio::test]
async fn missing_media_everywhere_still_publishes_text_only() {
    let target = fixtures::target("site-a");
    let harness = Harness::new(vec![target.clone()]);
    harness.seed_topics(&target.id, "health", &["sleep"]).await;

    let item = harness.claim_item(&target, "health", "ana").await;
    let record = harness.executor.run(&target, item).await;

    assert_eq!(record.final_status, FinalStatus::Published);
    assert!(record
        .notes
        .iter()
        .any(|note| note.contains("no media candidates")));

    // Both configured sources were consulted, in order, and the content went
    // out without an attached asset.
    assert_eq!(harness.media.search_calls(), 2);
    let created = harness.publisher.created().await;
    assert_eq!(created.len(), 1);
    assert!(created[0].media.is_none());
    assert!(harness.publisher.uploads().await.is_empty());
}

#[tokio::test]
async fn first_media_source_with_a_candidate_wins() {
    let target = fixtures::target("site-a");
    let harness = Harness::new(vec![target.clone()]);
    harness.seed_topics(&target.id, "health", &["sleep"]).await;

    // "unsplash" is scanned first and comes up empty; "google" delivers.
    harness
        .media
        .queue_candidate("google", "https://img.example/sleep.jpg")
        .await;

    let item = harness.claim_item(&target, "health", "ana").await;
    let record = harness.executor.run(&target, item).await;

    assert_eq!(record.final_status, FinalStatus::Published);
    let uploads = harness.publisher.uploads().await;
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].source, "google");
    let created = harness.publisher.created().await;
    assert!(created[0].media.is_some());
}

#[tokio::test]
async fn short_tag_set_is_filled_by_one_supplemental_call() {
    let target = fixtures::target("site-a");
    let harness = Harness::new(vec![target.clone()]);
    harness.seed_topics(&target.id, "health", &["sleep"]).await;

    harness
        .tags
        .queue_tags(vec![
            "sleep".into(),
            "rest".into(),
            "recovery".into(),
            "habits".into(),
        ])
        .await;
    harness
        .tags
        .queue_tags(vec!["bedtime".into(), "routine".into()])
        .await;

    let item = harness.claim_item(&target, "health", "ana").await;
    let record = harness.executor.run(&target, item).await;

    assert_eq!(record.final_status, FinalStatus::Published);
    assert_eq!(harness.tags.calls(), 2);
    let created = harness.publisher.created().await;
    assert_eq!(
        created[0].tags,
        vec!["sleep", "rest", "recovery", "habits", "bedtime", "routine"]
    );
}

#[tokio::test]
async fn tag_set_is_padded_when_the_generator_runs_dry() {
    let target = fixtures::target("site-a");
    let harness = Harness::new(vec![target.clone()]);
    harness.seed_topics(&target.id, "health", &["sleep"]).await;

    harness.tags.queue_tags(vec!["sleep".into()]).await;
    harness.tags.queue_tags(vec![]).await;

    let item = harness.claim_item(&target, "health", "ana").await;
    let record = harness.executor.run(&target, item).await;

    assert_eq!(record.final_status, FinalStatus::Published);
    let created = harness.publisher.created().await;
    // Exactly the configured count, padded from the category and topic.
    assert_eq!(created[0].tags.len(), 6);
    assert_eq!(created[0].tags[0], "sleep");
    assert!(created[0].tags.contains(&"health".to_string()));
}

#[traced_test]
#[tokio::test]
async fn distribution_failure_is_partial_and_does_not_revert_publish() {
    let mut target = fixtures::target("site-a");
    target.platform_accounts = vec![
        PlatformAccount {
            platform: "facebook".into(),
            handle: "site-a".into(),
        },
        PlatformAccount {
            platform: "twitter".into(),
            handle: "site-a".into(),
        },
    ];
    let harness = Harness::new(vec![target.clone()]);
    harness.seed_topics(&target.id, "health", &["sleep"]).await;
    harness.distributor.fail_platform("facebook").await;

    let item = harness.claim_item(&target, "health", "ana").await;
    let topic_id = item.topic.id;
    let record = harness.executor.run(&target, item).await;

    // Overall success with a recorded partial failure.
    assert_eq!(record.final_status, FinalStatus::Published);
    assert!(record.has_partial_failure());
    assert!(record
        .notes
        .iter()
        .any(|note| note.contains("partial distribution failure")));

    // The healthy platform still received its post and the topic is spent.
    let posts = harness.distributor.posts().await;
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].0, "twitter");
    assert_eq!(topic_status(&harness, topic_id).await, TopicStatus::Consumed);
    assert!(logs_contain("partial distribution failure"));

    let summary = pressroom::summarize(&harness.ledger.all_records().await);
    assert_eq!(summary.published, 1);
    assert_eq!(summary.partial, 1);
}

#[tokio::test]
async fn held_draft_skips_distribution_and_consumes_the_topic() {
    let mut target = fixtures::target("site-a");
    target.auto_publish = false;
    target.platform_accounts = vec![PlatformAccount {
        platform: "facebook".into(),
        handle: "site-a".into(),
    }];
    let harness = Harness::new(vec![target.clone()]);
    harness.seed_topics(&target.id, "health", &["sleep"]).await;

    let item = harness.claim_item(&target, "health", "ana").await;
    let topic_id = item.topic.id;
    let record = harness.executor.run(&target, item).await;

    assert_eq!(record.final_status, FinalStatus::Held);
    assert!(record.notes.iter().any(|note| note.contains("held as draft")));
    assert!(harness.distributor.posts().await.is_empty());

    let created = harness.publisher.created().await;
    assert_eq!(created.len(), 1);
    assert!(!created[0].publish);

    // Held content is persisted at the destination; the topic is consumed.
    assert_eq!(topic_status(&harness, topic_id).await, TopicStatus::Consumed);
}

#[tokio::test]
async fn transient_publish_failure_retries_and_succeeds() {
    let target = fixtures::target("site-a");
    let harness = Harness::new(vec![target.clone()]);
    harness.seed_topics(&target.id, "health", &["sleep"]).await;
    harness.publisher.fail_next_creates(1);

    let item = harness.claim_item(&target, "health", "ana").await;
    let item_id = item.id;
    let record = harness.executor.run(&target, item).await;

    assert_eq!(record.final_status, FinalStatus::Published);
    let transitions = harness.ledger.transitions_for(item_id).await;
    let publish: Vec<_> = transitions
        .iter()
        .filter(|t| t.stage == Stage::Publish)
        .collect();
    assert_eq!(publish.len(), 2);
    assert_eq!(publish[0].outcome, StageOutcome::AttemptFailed);
    assert_eq!(publish[1].outcome, StageOutcome::Advanced);
}

#[tokio::test]
async fn exhausted_publish_retries_fail_the_item_and_release_the_topic() {
    let target = fixtures::target("site-a");
    let harness = Harness::new(vec![target.clone()]);
    harness.seed_topics(&target.id, "health", &["sleep"]).await;
    harness.publisher.fail_next_creates(3);

    let item = harness.claim_item(&target, "health", "ana").await;
    let topic_id = item.topic.id;
    let record = harness.executor.run(&target, item).await;

    match &record.final_status {
        FinalStatus::Failed { stage, kind, .. } => {
            assert_eq!(*stage, Stage::Publish);
            assert_eq!(*kind, FailureKind::Backend);
        }
        other => panic!("expected publish failure, got {:?}", other),
    }
    // Nothing was persisted, so the topic returns to the backlog.
    assert!(harness.publisher.created().await.is_empty());
    assert_eq!(topic_status(&harness, topic_id).await, TopicStatus::Pending);
}

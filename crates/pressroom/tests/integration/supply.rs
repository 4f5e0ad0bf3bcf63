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

//! Topic claim exclusivity under concurrency.

use std::collections::HashSet;

use pressroom::{SupplyError, TopicStatus, TopicStore};

use crate::fixtures::{self, Harness};

#[tokio::test]
async fn concurrent_dispatches_never_share_a_topic() {
    let target = fixtures::target("site-a");
    let harness = Harness::new(vec![target.clone()]);

    let texts: Vec<String> = (0..10).map(|i| format!("topic {}", i)).collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    harness.seed_topics(&target.id, "health", &refs).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let supply = harness.supply.clone();
        let target = target.clone();
        handles.push(tokio::spawn(async move {
            supply.next_topic(&target, "health").await.unwrap()
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        let topic = handle.await.unwrap();
        // Every claim must hand out a distinct topic.
        assert!(seen.insert(topic.id));
    }
    assert_eq!(seen.len(), 10);
}

#[tokio::test]
async fn claimed_topic_is_unavailable_until_released() {
    let target = fixtures::target("site-a");
    let harness = Harness::new(vec![target.clone()]);
    harness.seed_topics(&target.id, "health", &["only one"]).await;

    let claimed = harness.supply.next_topic(&target, "health").await.unwrap();

    // Backlog empty and the replenishment call yields nothing.
    harness.backend.queue_topics(vec![]).await;
    let err = harness
        .supply
        .next_topic(&target, "health")
        .await
        .unwrap_err();
    assert!(matches!(err, SupplyError::NoTopicsAvailable { .. }));

    // A failed run releases the claim; the topic is claimable again.
    harness.topics.release(claimed.id).await.unwrap();
    let reclaimed = harness.supply.next_topic(&target, "health").await.unwrap();
    assert_eq!(reclaimed.id, claimed.id);
    assert_eq!(reclaimed.status, TopicStatus::Claimed);
}

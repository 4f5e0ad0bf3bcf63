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

//! Rotation coverage across full pick/complete cycles.

use std::sync::Arc;

use chrono::Utc;
use pressroom::{FinalStatus, MemoryRunLedger, RotationTracker, RunLedger, RunRecord};
use uuid::Uuid;

use crate::fixtures;

async fn commit_success(ledger: &Arc<MemoryRunLedger>, target_id: &str, pick: &pressroom::Pick) {
    let now = Utc::now();
    ledger
        .record_outcome(RunRecord {
            work_item_id: Uuid::new_v4(),
            target_id: target_id.to_string(),
            category: pick.category.clone(),
            author: pick.author.clone(),
            transitions: vec![],
            final_status: FinalStatus::Published,
            notes: vec![],
            started_at: now,
            finished_at: now,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn consecutive_successful_picks_cover_every_ring_entry_once() {
    let ledger = Arc::new(MemoryRunLedger::new());
    let tracker = RotationTracker::new(ledger.clone(), 50);
    let mut target = fixtures::target("site-a");
    target.categories = vec!["a".into(), "b".into(), "c".into(), "d".into()];
    target.authors = vec!["x".into(), "y".into(), "z".into()];

    let mut categories = Vec::new();
    let mut authors = Vec::new();
    for _ in 0..4 {
        let pick = tracker.begin_pick(&target).await.unwrap();
        commit_success(&ledger, &target.id, &pick).await;
        tracker.complete_pick(&target.id, &pick).await;
        categories.push(pick.category);
        authors.push(pick.author);
    }

    // Four category picks cover the whole ring in order; three author picks
    // cover theirs before the cycle restarts.
    assert_eq!(categories, vec!["a", "b", "c", "d"]);
    assert_eq!(authors, vec!["x", "y", "z", "x"]);
}

#[tokio::test]
async fn coverage_holds_regardless_of_starting_history() {
    let ledger = Arc::new(MemoryRunLedger::new());
    let tracker = RotationTracker::new(ledger.clone(), 50);
    let mut target = fixtures::target("site-a");
    target.categories = vec!["a".into(), "b".into(), "c".into()];
    target.authors = vec!["x".into()];

    // Pre-existing history ending mid-ring.
    let seed = tracker.begin_pick(&target).await.unwrap();
    commit_success(&ledger, &target.id, &seed).await;
    tracker.complete_pick(&target.id, &seed).await;

    let mut seen = Vec::new();
    for _ in 0..3 {
        let pick = tracker.begin_pick(&target).await.unwrap();
        commit_success(&ledger, &target.id, &pick).await;
        tracker.complete_pick(&target.id, &pick).await;
        seen.push(pick.category);
    }

    // Starting after "a", three picks still cover every entry exactly once.
    seen.sort();
    assert_eq!(seen, vec!["a", "b", "c"]);
}

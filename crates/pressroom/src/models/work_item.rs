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

//! Work items: the unit the pipeline executor operates on.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::content::{GeneratedDraft, MediaCandidate, RemoteId};
use super::target::TargetId;
use super::topic::Topic;

/// One discrete step of the content pipeline, with its own retry and
/// timeout policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Exclusive claim of a backlog topic.
    TopicClaim,
    /// Content generation plus structural validation.
    Draft,
    /// Media sourcing across the target's priority list.
    Media,
    /// Tag generation to the target's exact tag count.
    Tags,
    /// Persisting the content item at the destination.
    Publish,
    /// Best-effort posting to the configured platform accounts.
    Distribute,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::TopicClaim => "topic_claim",
            Stage::Draft => "draft",
            Stage::Media => "media",
            Stage::Tags => "tags",
            Stage::Publish => "publish",
            Stage::Distribute => "distribute",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one stage attempt, as recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    /// The stage succeeded and the item advanced.
    Advanced,
    /// The stage was skipped without failing the item (e.g. no media
    /// available, distribution of a held draft).
    Skipped,
    /// The attempt failed and a retry was scheduled.
    AttemptFailed,
    /// The attempt failed with no retry budget left, or with a
    /// non-retryable error.
    Failed,
}

/// One ledger entry for a stage attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTransition {
    pub stage: Stage,
    /// 1-based attempt counter within the stage.
    pub attempt: u32,
    pub outcome: StageOutcome,
    pub at: DateTime<Utc>,
    /// Failure reason or informational note, if any.
    pub note: Option<String>,
}

impl StageTransition {
    pub fn new(stage: Stage, attempt: u32, outcome: StageOutcome, note: Option<String>) -> Self {
        Self {
            stage,
            attempt,
            outcome,
            at: Utc::now(),
            note,
        }
    }
}

/// The unit of pipeline execution.
///
/// Owned exclusively by one pipeline executor invocation; never shared
/// across concurrent runs. Created when the schedule coordinator (or a
/// manual trigger) dispatches a topic, archived into the run ledger when the
/// pipeline reaches a terminal state. Not persisted itself; the run record
/// is the durable artifact.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub id: Uuid,
    pub target_id: TargetId,
    /// The exclusively claimed topic driving this run.
    pub topic: Topic,
    /// Category assigned by the rotation selector.
    pub category: String,
    /// Author assigned by the rotation selector.
    pub author: String,
    /// Stage the item is currently in.
    pub stage: Stage,
    /// Per-stage attempt counters.
    pub attempts: HashMap<Stage, u32>,
    /// Accumulated partial results.
    pub draft: Option<GeneratedDraft>,
    pub media: Option<MediaCandidate>,
    pub tags: Vec<String>,
    pub remote_id: Option<RemoteId>,
    /// Informational notes accumulated during the run.
    pub notes: Vec<String>,
    pub started_at: DateTime<Utc>,
}

impl WorkItem {
    /// Creates a fresh work item for a claimed topic.
    pub fn new(
        target_id: impl Into<TargetId>,
        topic: Topic,
        category: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_id: target_id.into(),
            topic,
            category: category.into(),
            author: author.into(),
            stage: Stage::TopicClaim,
            attempts: HashMap::new(),
            draft: None,
            media: None,
            tags: Vec::new(),
            remote_id: None,
            notes: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Increments and returns the attempt counter for a stage.
    pub fn next_attempt(&mut self, stage: Stage) -> u32 {
        let counter = self.attempts.entry(stage).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Attempts made so far in the given stage.
    pub fn attempts_for(&self, stage: Stage) -> u32 {
        self.attempts.get(&stage).copied().unwrap_or(0)
    }

    /// Keywords for media search: the topic text plus up to three topic
    /// keywords, so queries stay broad enough to match.
    pub fn media_keywords(&self) -> Vec<String> {
        let mut keywords = vec![self.topic.text.clone()];
        keywords.extend(self.topic.keywords.iter().take(3).cloned());
        keywords
    }
}

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

//! Immutable run ledger records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::target::TargetId;
use super::work_item::{Stage, StageOutcome, StageTransition};

/// Classification of a terminal failure, for operator queries and batch
/// accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Target misconfiguration or rejected credentials. Aborts the batch.
    Configuration,
    /// Transient backend failure that exhausted the retry budget.
    Backend,
    /// A stage timed out on every attempt.
    Timeout,
    /// Generated content never passed structural acceptance.
    Validation,
    /// The topic backlog and the suggestion backend both came up empty.
    NoTopics,
    /// A storage surface failed.
    Storage,
}

/// Terminal status of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FinalStatus {
    /// The content item was published at the destination.
    Published,
    /// The content item was persisted as a held draft (auto-publish off).
    /// This is not a failure.
    Held,
    /// The run failed at the given stage after exhausting its options.
    Failed {
        stage: Stage,
        kind: FailureKind,
        reason: String,
    },
}

impl FinalStatus {
    /// Whether the run produced a persisted content item.
    pub fn is_success(&self) -> bool {
        matches!(self, FinalStatus::Published | FinalStatus::Held)
    }
}

/// Immutable ledger entry describing one completed pipeline run.
///
/// Append-only: records are never updated or deleted. Rotation history and
/// operator-facing history views are both computed from these records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub work_item_id: Uuid,
    pub target_id: TargetId,
    /// Category assigned to the run; feeds rotation history.
    pub category: String,
    /// Author assigned to the run; feeds rotation history.
    pub author: String,
    /// Stage-by-stage attempt outcomes with timestamps.
    pub transitions: Vec<StageTransition>,
    pub final_status: FinalStatus,
    /// Informational notes (missing media, partial distribution failures).
    pub notes: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunRecord {
    /// Whether distribution partially failed after a successful publish.
    pub fn has_partial_failure(&self) -> bool {
        self.final_status.is_success()
            && self.transitions.iter().any(|t| {
                t.stage == Stage::Distribute
                    && matches!(t.outcome, StageOutcome::Failed | StageOutcome::AttemptFailed)
            })
    }
}

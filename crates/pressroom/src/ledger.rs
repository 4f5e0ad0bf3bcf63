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

//! Append-only run ledger.
//!
//! Every pipeline run writes its stage transitions and exactly one terminal
//! record here. No run disappears without a recorded outcome. The ledger is
//! the source of truth for rotation history and operator-facing run views;
//! existing entries are never updated or deleted. Archival and retention are
//! a housekeeping concern of the storage backend, not of this interface.

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StorageError;
use crate::models::{FinalStatus, RunRecord, StageTransition, TargetId, WorkItem};

/// Append-only record of pipeline run transitions and outcomes.
#[async_trait]
pub trait RunLedger: Send + Sync {
    /// Appends one stage transition for an in-flight work item.
    async fn record_transition(
        &self,
        item: &WorkItem,
        transition: StageTransition,
    ) -> Result<(), StorageError>;

    /// Appends the immutable terminal record of a completed run.
    async fn record_outcome(&self, record: RunRecord) -> Result<(), StorageError>;

    /// The most recent terminal records for a target, newest first.
    async fn recent_history(
        &self,
        target_id: &str,
        limit: usize,
    ) -> Result<Vec<RunRecord>, StorageError>;
}

/// Per-status counts over a slice of run records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSummary {
    pub published: usize,
    pub held: usize,
    pub failed: usize,
    /// Successful runs whose distribution partially failed.
    pub partial: usize,
}

/// Serializes run records for operator-facing history views.
pub fn to_json(records: &[RunRecord]) -> serde_json::Value {
    serde_json::to_value(records).unwrap_or(serde_json::Value::Null)
}

/// Computes per-status counts for operator reports.
pub fn summarize(records: &[RunRecord]) -> LedgerSummary {
    let mut summary = LedgerSummary::default();
    for record in records {
        match record.final_status {
            FinalStatus::Published => summary.published += 1,
            FinalStatus::Held => summary.held += 1,
            FinalStatus::Failed { .. } => summary.failed += 1,
        }
        if record.has_partial_failure() {
            summary.partial += 1;
        }
    }
    summary
}

/// In-memory run ledger.
#[derive(Default)]
pub struct MemoryRunLedger {
    transitions: RwLock<Vec<(Uuid, TargetId, StageTransition)>>,
    records: RwLock<Vec<RunRecord>>,
}

impl MemoryRunLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transition rows recorded for one work item, in append order.
    pub async fn transitions_for(&self, work_item_id: Uuid) -> Vec<StageTransition> {
        self.transitions
            .read()
            .await
            .iter()
            .filter(|(id, _, _)| *id == work_item_id)
            .map(|(_, _, t)| t.clone())
            .collect()
    }

    /// All terminal records, in append order.
    pub async fn all_records(&self) -> Vec<RunRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl RunLedger for MemoryRunLedger {
    async fn record_transition(
        &self,
        item: &WorkItem,
        transition: StageTransition,
    ) -> Result<(), StorageError> {
        self.transitions
            .write()
            .await
            .push((item.id, item.target_id.clone(), transition));
        Ok(())
    }

    async fn record_outcome(&self, record: RunRecord) -> Result<(), StorageError> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn recent_history(
        &self,
        target_id: &str,
        limit: usize,
    ) -> Result<Vec<RunRecord>, StorageError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.target_id == target_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

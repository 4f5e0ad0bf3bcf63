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

//! Storage surfaces for target configuration and the topic backlog.
//!
//! Persistence is an external capability with a narrow keyed read/write
//! contract. The traits here are those contracts; the `Memory*`
//! implementations are the in-process reference backends used by tests and
//! small deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::error::StorageError;
use crate::models::{ProductionTarget, Topic, TopicStatus};

/// Read surface for production target configuration.
///
/// Targets are created and edited by operators outside the core; the
/// orchestrator only ever reads them. The coordinator re-reads the directory
/// on every tick, so disabling a target takes effect before its next
/// evaluation.
#[async_trait]
pub trait TargetDirectory: Send + Sync {
    /// All configured targets, enabled or not.
    async fn list(&self) -> Result<Vec<ProductionTarget>, StorageError>;

    /// One target by id.
    async fn get(&self, id: &str) -> Result<ProductionTarget, StorageError>;
}

/// Keyed read/write surface for the topic backlog.
///
/// The claim operation is an atomic conditional update: a topic moves
/// `pending -> claimed` exactly once, so two simultaneous dispatches can
/// never claim the same topic.
#[async_trait]
pub trait TopicStore: Send + Sync {
    /// Inserts a topic unless an entry with the same normalized text already
    /// exists for the target. Returns whether the topic was stored.
    async fn insert_if_new(&self, topic: Topic) -> Result<bool, StorageError>;

    /// Claims the oldest pending topic for `(target, category)`, marking it
    /// `claimed`. Returns `None` when the backlog is empty.
    async fn claim_oldest_pending(
        &self,
        target_id: &str,
        category: &str,
    ) -> Result<Option<Topic>, StorageError>;

    /// Returns a claimed topic to `pending` so a later batch can retry it.
    async fn release(&self, topic_id: Uuid) -> Result<(), StorageError>;

    /// Marks a claimed topic `consumed`.
    async fn consume(&self, topic_id: Uuid) -> Result<(), StorageError>;

    /// Archives pending topics created before the cutoff. Returns how many
    /// were archived.
    async fn archive_pending_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError>;

    /// Number of pending topics for `(target, category)`.
    async fn count_pending(&self, target_id: &str, category: &str) -> Result<usize, StorageError>;
}

/// In-memory target directory.
#[derive(Default)]
pub struct MemoryTargetDirectory {
    targets: RwLock<Vec<ProductionTarget>>,
}

impl MemoryTargetDirectory {
    pub fn new(targets: Vec<ProductionTarget>) -> Self {
        Self {
            targets: RwLock::new(targets),
        }
    }

    /// Inserts or replaces a target by id.
    pub async fn upsert(&self, target: ProductionTarget) {
        let mut targets = self.targets.write().await;
        if let Some(existing) = targets.iter_mut().find(|t| t.id == target.id) {
            *existing = target;
        } else {
            targets.push(target);
        }
    }

    /// Flips a target's enabled flag. Takes effect on the coordinator's next
    /// tick; an in-progress batch is allowed to finish.
    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), StorageError> {
        let mut targets = self.targets.write().await;
        let target = targets
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StorageError::TargetNotFound(id.to_string()))?;
        target.enabled = enabled;
        Ok(())
    }
}

#[async_trait]
impl TargetDirectory for MemoryTargetDirectory {
    async fn list(&self) -> Result<Vec<ProductionTarget>, StorageError> {
        Ok(self.targets.read().await.clone())
    }

    async fn get(&self, id: &str) -> Result<ProductionTarget, StorageError> {
        self.targets
            .read()
            .await
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| StorageError::TargetNotFound(id.to_string()))
    }
}

/// In-memory topic backlog.
#[derive(Default)]
pub struct MemoryTopicStore {
    rows: Mutex<Vec<Topic>>,
}

impl MemoryTopicStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all rows, newest last. Test and operator visibility only.
    pub async fn snapshot(&self) -> Vec<Topic> {
        self.rows.lock().await.clone()
    }
}

#[async_trait]
impl TopicStore for MemoryTopicStore {
    async fn insert_if_new(&self, topic: Topic) -> Result<bool, StorageError> {
        let mut rows = self.rows.lock().await;
        let normalized = topic.normalized_text();
        let duplicate = rows
            .iter()
            .any(|t| t.target_id == topic.target_id && t.normalized_text() == normalized);
        if duplicate {
            debug!(
                "Skipping duplicate topic for target {}: {:?}",
                topic.target_id, topic.text
            );
            return Ok(false);
        }
        rows.push(topic);
        Ok(true)
    }

    async fn claim_oldest_pending(
        &self,
        target_id: &str,
        category: &str,
    ) -> Result<Option<Topic>, StorageError> {
        let mut rows = self.rows.lock().await;
        let oldest = rows
            .iter_mut()
            .filter(|t| {
                t.target_id == target_id
                    && t.category == category
                    && t.status == TopicStatus::Pending
            })
            .min_by_key(|t| t.created_at);

        Ok(oldest.map(|topic| {
            topic.status = TopicStatus::Claimed;
            topic.clone()
        }))
    }

    async fn release(&self, topic_id: Uuid) -> Result<(), StorageError> {
        self.set_status(topic_id, TopicStatus::Claimed, TopicStatus::Pending)
            .await
    }

    async fn consume(&self, topic_id: Uuid) -> Result<(), StorageError> {
        self.set_status(topic_id, TopicStatus::Claimed, TopicStatus::Consumed)
            .await
    }

    async fn archive_pending_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
        let mut rows = self.rows.lock().await;
        let mut archived = 0;
        for topic in rows.iter_mut() {
            if topic.status == TopicStatus::Pending && topic.created_at < cutoff {
                topic.status = TopicStatus::Archived;
                archived += 1;
            }
        }
        Ok(archived)
    }

    async fn count_pending(&self, target_id: &str, category: &str) -> Result<usize, StorageError> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .filter(|t| {
                t.target_id == target_id
                    && t.category == category
                    && t.status == TopicStatus::Pending
            })
            .count())
    }
}

impl MemoryTopicStore {
    async fn set_status(
        &self,
        topic_id: Uuid,
        expected: TopicStatus,
        next: TopicStatus,
    ) -> Result<(), StorageError> {
        let mut rows = self.rows.lock().await;
        let topic = rows
            .iter_mut()
            .find(|t| t.id == topic_id)
            .ok_or(StorageError::TopicNotFound(topic_id))?;
        if topic.status != expected {
            return Err(StorageError::TopicStateConflict {
                id: topic_id,
                expected: format!("{:?}", expected).to_lowercase(),
            });
        }
        topic.status = next;
        Ok(())
    }
}

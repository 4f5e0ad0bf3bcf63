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

//! Topic supply: the backlog of approved topics per (target, category).
//!
//! `next_topic` pops the oldest pending topic and claims it exclusively.
//! When the backlog is empty it asks the suggestion backend for a fresh
//! batch, persists the suggestions, and retries the pop exactly once — a
//! failing backend surfaces [`SupplyError::NoTopicsAvailable`] instead of
//! looping. Claims for the same (target, category) are serialized through a
//! per-key mutex so two simultaneous dispatches never claim the same topic
//! or double-replenish.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::backends::TopicSuggester;
use crate::error::{BackendError, SupplyError};
use crate::models::{ProductionTarget, Topic};
use crate::storage::TopicStore;

/// Tuning knobs for the topic supply.
#[derive(Debug, Clone)]
pub struct SupplyConfig {
    /// How many suggestions to request per replenishment call.
    pub replenish_count: usize,
    /// Backlog level below which `ensure_backlog` tops a category up.
    pub low_water: usize,
    /// Timeout for one suggestion backend call.
    pub suggest_timeout: Duration,
}

impl Default for SupplyConfig {
    fn default() -> Self {
        Self {
            replenish_count: 10,
            low_water: 5,
            suggest_timeout: Duration::from_secs(60),
        }
    }
}

type ClaimKey = (String, String);

/// Maintains the per-(target, category) topic backlog.
pub struct TopicSupply {
    store: Arc<dyn TopicStore>,
    suggester: Arc<dyn TopicSuggester>,
    config: SupplyConfig,
    claim_locks: Mutex<HashMap<ClaimKey, Arc<Mutex<()>>>>,
}

impl TopicSupply {
    pub fn new(
        store: Arc<dyn TopicStore>,
        suggester: Arc<dyn TopicSuggester>,
        config: SupplyConfig,
    ) -> Self {
        Self {
            store,
            suggester,
            config,
            claim_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Claims the next topic for `(target, category)`.
    ///
    /// Pops the oldest pending topic; on an empty backlog, replenishes from
    /// the suggestion backend and retries the pop once. Serialized per
    /// (target, category).
    pub async fn next_topic(
        &self,
        target: &ProductionTarget,
        category: &str,
    ) -> Result<Topic, SupplyError> {
        let lock = self.claim_lock(&target.id, category).await;
        let _guard = lock.lock().await;

        if let Some(topic) = self.store.claim_oldest_pending(&target.id, category).await? {
            return Ok(topic);
        }

        info!(
            "Topic backlog empty for target {} category {:?}, replenishing",
            target.id, category
        );
        self.replenish(target, category).await?;

        self.store
            .claim_oldest_pending(&target.id, category)
            .await?
            .ok_or_else(|| SupplyError::NoTopicsAvailable {
                target: target.id.clone(),
                category: category.to_string(),
            })
    }

    /// Tops a category's backlog up to the low-water mark, replenishing at
    /// most once. Called by the coordinator before a batch starts so claims
    /// rarely hit an empty backlog mid-dispatch.
    pub async fn ensure_backlog(
        &self,
        target: &ProductionTarget,
        category: &str,
    ) -> Result<(), SupplyError> {
        let lock = self.claim_lock(&target.id, category).await;
        let _guard = lock.lock().await;

        let pending = self.store.count_pending(&target.id, category).await?;
        if pending >= self.config.low_water {
            return Ok(());
        }

        info!(
            "Backlog low for target {} category {:?} ({} pending), replenishing",
            target.id, category, pending
        );
        self.replenish(target, category).await?;
        Ok(())
    }

    /// Stores an operator-entered topic. Rejects duplicates of an existing
    /// backlog entry.
    pub async fn add_manual_topic(
        &self,
        target: &ProductionTarget,
        category: &str,
        text: &str,
        keywords: Vec<String>,
    ) -> Result<Topic, SupplyError> {
        let topic = Topic::new(target.id.clone(), category, text, keywords);
        if self.store.insert_if_new(topic.clone()).await? {
            Ok(topic)
        } else {
            Err(SupplyError::DuplicateTopic {
                target: target.id.clone(),
                text: text.to_string(),
            })
        }
    }

    /// Archives pending topics older than the retention period. Returns how
    /// many were archived.
    pub async fn archive_stale(&self, retention: chrono::Duration) -> Result<usize, SupplyError> {
        let cutoff = Utc::now() - retention;
        let archived = self.store.archive_pending_before(cutoff).await?;
        if archived > 0 {
            info!("Archived {} stale pending topics", archived);
        }
        Ok(archived)
    }

    /// Asks the suggestion backend for a batch of topics and persists the
    /// usable ones. Blank and duplicate suggestions are dropped.
    async fn replenish(
        &self,
        target: &ProductionTarget,
        category: &str,
    ) -> Result<usize, SupplyError> {
        let call = self
            .suggester
            .suggest_topics(target, category, self.config.replenish_count);
        let suggestions = match tokio::time::timeout(self.config.suggest_timeout, call).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(SupplyError::Backend(BackendError::Transient(format!(
                    "topic suggestion timed out after {:?}",
                    self.config.suggest_timeout
                ))))
            }
        };

        let mut stored = 0;
        for text in suggestions {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                warn!(
                    "Discarding blank topic suggestion for target {} category {:?}",
                    target.id, category
                );
                continue;
            }
            let topic = Topic::new(target.id.clone(), category, trimmed, Vec::new());
            if self.store.insert_if_new(topic).await? {
                stored += 1;
            }
        }

        info!(
            "Stored {} new topics for target {} category {:?}",
            stored, target.id, category
        );
        Ok(stored)
    }

    async fn claim_lock(&self, target_id: &str, category: &str) -> Arc<Mutex<()>> {
        let mut locks = self.claim_locks.lock().await;
        locks
            .entry((target_id.to_string(), category.to_string()))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

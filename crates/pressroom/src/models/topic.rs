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

//! Topic backlog entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::target::TargetId;

/// Lifecycle state of a topic.
///
/// At most one in-flight pipeline run may hold a topic in `Claimed` state;
/// the claim is exclusive and enforced by the topic store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicStatus {
    /// Waiting in the backlog.
    Pending,
    /// Exclusively held by one in-flight work item.
    Claimed,
    /// Used by a successfully persisted content item.
    Consumed,
    /// Expired out of the backlog after the retention period.
    Archived,
}

/// A candidate subject for one content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: Uuid,
    /// Owning production target.
    pub target_id: TargetId,
    /// Category the topic belongs to.
    pub category: String,
    /// The topic text itself.
    pub text: String,
    /// Optional keywords, used to build media search queries.
    pub keywords: Vec<String>,
    pub status: TopicStatus,
    pub created_at: DateTime<Utc>,
}

impl Topic {
    /// Creates a new pending topic.
    pub fn new(
        target_id: impl Into<TargetId>,
        category: impl Into<String>,
        text: impl Into<String>,
        keywords: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_id: target_id.into(),
            category: category.into(),
            text: text.into(),
            keywords,
            status: TopicStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Normalized form of the topic text, used for duplicate detection.
    pub fn normalized_text(&self) -> String {
        normalize_text(&self.text)
    }
}

/// Lowercases and collapses whitespace so trivially re-suggested topics
/// compare equal.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

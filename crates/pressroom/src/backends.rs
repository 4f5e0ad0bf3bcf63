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

//! Collaborator contracts consumed by the orchestrator core.
//!
//! Each external capability is expressed as a narrow async trait with an
//! explicit structured result. The orchestrator never depends on a concrete
//! wire protocol: production deployments implement these traits against
//! their own backends, tests use the mocks in [`crate::testing`].

use async_trait::async_trait;

use crate::error::BackendError;
use crate::models::{
    CategoryContext, ContentFields, DistributionAck, GeneratedDraft, MediaCandidate,
    PlatformAccount, ProductionTarget, RemoteId, RemoteMediaId, Topic,
};

/// Generates a structured content draft for a topic.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Produces `{title, summary, body_html}` for the given topic, or fails.
    ///
    /// The caller validates the draft structurally; a malformed or truncated
    /// draft is regenerated against the same topic.
    async fn generate(
        &self,
        topic: &Topic,
        context: &CategoryContext,
    ) -> Result<GeneratedDraft, BackendError>;
}

/// Suggests new backlog topics for a target/category.
#[async_trait]
pub trait TopicSuggester: Send + Sync {
    /// Returns up to `count` topic texts. An empty list is a valid answer
    /// and is surfaced by the supply as `NoTopicsAvailable`.
    async fn suggest_topics(
        &self,
        target: &ProductionTarget,
        category: &str,
        count: usize,
    ) -> Result<Vec<String>, BackendError>;
}

/// Looks up candidate media items for a keyword query.
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    /// Queries one named source. `Ok(None)` means the source has no
    /// acceptable candidate; that is not an error.
    async fn search(
        &self,
        keywords: &[String],
        source: &str,
    ) -> Result<Option<MediaCandidate>, BackendError>;
}

/// Generates metadata tags for a draft.
#[async_trait]
pub trait TagGenerator: Send + Sync {
    /// Returns up to `count` tags. The pipeline pads or truncates the final
    /// set to exactly the target's configured tag count.
    async fn tags(
        &self,
        draft: &GeneratedDraft,
        context: &CategoryContext,
        count: usize,
    ) -> Result<Vec<String>, BackendError>;
}

/// Persists content at the publication target.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Creates (or updates) a content item and returns its persisted id.
    async fn create_content(
        &self,
        target: &ProductionTarget,
        fields: &ContentFields,
    ) -> Result<RemoteId, BackendError>;

    /// Uploads a media asset so it can be attached to a content item.
    async fn upload_media(
        &self,
        target: &ProductionTarget,
        media: &MediaCandidate,
    ) -> Result<RemoteMediaId, BackendError>;
}

/// Posts a published item's summary and link to a platform account.
///
/// Distribution is best-effort: failures are logged as partial failures and
/// never revert a successful publish.
#[async_trait]
pub trait Distributor: Send + Sync {
    async fn post(
        &self,
        account: &PlatformAccount,
        summary: &str,
        link: &str,
    ) -> Result<DistributionAck, BackendError>;
}

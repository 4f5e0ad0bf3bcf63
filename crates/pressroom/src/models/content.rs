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

//! Payload types exchanged with external collaborators.
//!
//! Every collaborator answers with an explicit structured result; shapes
//! that do not satisfy these contracts are rejected at the boundary instead
//! of flowing downstream as ambiguous partial records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Context handed to generation backends alongside a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryContext {
    /// Human-readable name of the destination site.
    pub target_name: String,
    /// Category the content item belongs to.
    pub category: String,
    /// Keywords carried by the topic, if any.
    pub keywords: Vec<String>,
}

/// Structured result of a content generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedDraft {
    pub title: String,
    pub summary: String,
    pub body_html: String,
}

/// One ranked media item returned by a media source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaCandidate {
    pub url: String,
    pub title: Option<String>,
    /// Name of the source that produced the candidate.
    pub source: String,
    /// Attribution text required by the source, if any.
    pub attribution: Option<String>,
}

/// Identifier of a content item persisted at the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteId(pub String);

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a media asset persisted at the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMediaId(pub String);

impl fmt::Display for RemoteMediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fields sent to the publication target when creating a content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentFields {
    pub title: String,
    pub summary: String,
    pub body_html: String,
    pub category: String,
    pub author: String,
    pub tags: Vec<String>,
    /// Uploaded media asset to attach, if any.
    pub media: Option<RemoteMediaId>,
    /// `true` publishes immediately; `false` persists a held draft.
    pub publish: bool,
}

/// Acknowledgement of a distribution post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionAck {
    pub platform: String,
    pub post_url: String,
}

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

//! Production target configuration.

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Identifier of a production target (one destination site/channel).
pub type TargetId = String;

/// One configured distribution destination attached to a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformAccount {
    /// Platform name, e.g. `"facebook"`.
    pub platform: String,
    /// Account handle on that platform.
    pub handle: String,
}

/// Configuration of one destination site/channel.
///
/// Created and edited by operators; read-only to the orchestrator. Disabling
/// a target causes the schedule coordinator to skip it on the next tick
/// without canceling in-flight runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionTarget {
    /// Stable identifier, unique across targets.
    pub id: TargetId,
    /// Human-readable name.
    pub name: String,
    /// Public base URL of the destination, used to build distribution links.
    pub base_url: String,
    /// Content categories, in rotation ring order. Must be non-empty.
    pub categories: Vec<String>,
    /// Eligible authors, in rotation ring order. Must be non-empty.
    pub authors: Vec<String>,
    /// Whether the schedule coordinator considers this target at all.
    pub enabled: bool,
    /// Number of work items dispatched per scheduled batch.
    pub batch_size: usize,
    /// Times of day (in `timezone`) at which a batch fires.
    pub fire_times: Vec<NaiveTime>,
    /// Timezone in which `fire_times` are interpreted.
    pub timezone: Tz,
    /// Publish immediately, or persist content as a held draft.
    pub auto_publish: bool,
    /// Media sources queried in priority order during the media stage.
    pub media_sources: Vec<String>,
    /// Exact number of tags attached to every content item.
    pub tag_count: usize,
    /// Distribution destinations, posted to best-effort after publication.
    pub platform_accounts: Vec<PlatformAccount>,
}

impl ProductionTarget {
    /// Checks the invariants the orchestrator relies on.
    ///
    /// A target failing validation aborts its batch with a configuration
    /// error rather than producing partial work.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.categories.is_empty() {
            return Err(ConfigurationError::EmptyCategories {
                target: self.id.clone(),
            });
        }
        if self.authors.is_empty() {
            return Err(ConfigurationError::EmptyAuthors {
                target: self.id.clone(),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigurationError::ZeroBatchSize {
                target: self.id.clone(),
            });
        }
        if self.tag_count == 0 {
            return Err(ConfigurationError::ZeroTagCount {
                target: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Builds the public link for a published content item.
    pub fn content_link(&self, remote_id: &crate::models::RemoteId) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), remote_id)
    }
}

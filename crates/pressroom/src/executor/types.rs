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

//! Configuration types for the pipeline executor.

use std::time::Duration;

use crate::executor::validation::DraftPolicy;
use crate::models::Stage;
use crate::retry::RetryPolicy;

/// Timeout and retry policy for one pipeline stage.
///
/// A stage that exceeds its timeout is treated as a failed attempt, counted
/// against the retry budget — never as a silent success.
#[derive(Debug, Clone)]
pub struct StagePolicy {
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl StagePolicy {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Self {
        Self { timeout, retry }
    }

    fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            retry: RetryPolicy::default(),
        }
    }
}

/// Configuration for the pipeline executor.
///
/// # Construction
///
/// ```rust,ignore
/// let config = ExecutorConfig::builder()
///     .draft(StagePolicy::new(Duration::from_secs(300), RetryPolicy::default()))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    draft: StagePolicy,
    media: StagePolicy,
    tags: StagePolicy,
    publish: StagePolicy,
    distribute: StagePolicy,
    draft_policy: DraftPolicy,
}

impl ExecutorConfig {
    /// Creates a new configuration builder with default values.
    pub fn builder() -> ExecutorConfigBuilder {
        ExecutorConfigBuilder::default()
    }

    /// Policy for the given stage.
    pub fn stage_policy(&self, stage: Stage) -> &StagePolicy {
        match stage {
            Stage::Draft => &self.draft,
            Stage::Media => &self.media,
            Stage::Tags => &self.tags,
            Stage::Publish => &self.publish,
            Stage::Distribute => &self.distribute,
            // Topic claims are store-local conditional updates; they reuse
            // the draft policy's bounds if ever driven through a stage loop.
            Stage::TopicClaim => &self.draft,
        }
    }

    /// Structural acceptance thresholds for generated drafts.
    pub fn draft_policy(&self) -> &DraftPolicy {
        &self.draft_policy
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfigBuilder::default().build()
    }
}

/// Builder for [`ExecutorConfig`].
#[derive(Debug, Clone)]
pub struct ExecutorConfigBuilder {
    config: ExecutorConfig,
}

impl Default for ExecutorConfigBuilder {
    fn default() -> Self {
        Self {
            config: ExecutorConfig {
                draft: StagePolicy::with_timeout(Duration::from_secs(180)),
                media: StagePolicy::with_timeout(Duration::from_secs(30)),
                tags: StagePolicy::with_timeout(Duration::from_secs(30)),
                publish: StagePolicy::with_timeout(Duration::from_secs(60)),
                // Distribution is best-effort: one attempt per account.
                distribute: StagePolicy::new(Duration::from_secs(30), RetryPolicy::none()),
                draft_policy: DraftPolicy::default(),
            },
        }
    }
}

impl ExecutorConfigBuilder {
    pub fn draft(mut self, policy: StagePolicy) -> Self {
        self.config.draft = policy;
        self
    }

    pub fn media(mut self, policy: StagePolicy) -> Self {
        self.config.media = policy;
        self
    }

    pub fn tags(mut self, policy: StagePolicy) -> Self {
        self.config.tags = policy;
        self
    }

    pub fn publish(mut self, policy: StagePolicy) -> Self {
        self.config.publish = policy;
        self
    }

    pub fn distribute(mut self, policy: StagePolicy) -> Self {
        self.config.distribute = policy;
        self
    }

    pub fn validation(mut self, policy: DraftPolicy) -> Self {
        self.config.draft_policy = policy;
        self
    }

    pub fn build(self) -> ExecutorConfig {
        self.config
    }
}

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

//! Operator-facing configuration file.
//!
//! A single TOML file describes the production targets (categories, authors,
//! fire-times, timezone, batch size, auto-publish, media sources, tag count,
//! platform accounts) and the orchestrator tuning knobs. Loading validates
//! everything up front: a malformed target is rejected at startup instead of
//! failing batches at runtime.
//!
//! ```toml
//! [coordinator]
//! tick_interval_secs = 30
//! batch_parallelism = 2
//!
//! [[targets]]
//! id = "family-blog"
//! name = "Family Blog"
//! base_url = "https://family-blog.example"
//! categories = ["pregnancy", "child-development", "nutrition"]
//! authors = ["tomasz", "gabriela", "helena", "zofia"]
//! batch_size = 4
//! fire_times = ["07:00"]
//! timezone = "Europe/Warsaw"
//! auto_publish = true
//! media_sources = ["unsplash", "google"]
//! tag_count = 6
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::executor::validation::DraftPolicy;
use crate::executor::{ExecutorConfig, StagePolicy};
use crate::models::{PlatformAccount, ProductionTarget};
use crate::scheduler::CoordinatorConfig;
use crate::supply::SupplyConfig;

/// Fully validated runtime configuration.
#[derive(Debug, Clone)]
pub struct PressroomConfig {
    pub targets: Vec<ProductionTarget>,
    pub coordinator: CoordinatorConfig,
    pub supply: SupplyConfig,
    pub executor: ExecutorConfig,
}

impl PressroomConfig {
    /// Loads and validates a configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content, path)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml(content: &str, origin: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.into(),
            source,
        })?;
        raw.try_into()
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    coordinator: RawCoordinator,
    #[serde(default)]
    supply: RawSupply,
    #[serde(default)]
    validation: RawValidation,
    #[serde(default)]
    stages: RawStages,
    #[serde(default)]
    targets: Vec<RawTarget>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCoordinator {
    tick_interval_secs: Option<u64>,
    batch_parallelism: Option<usize>,
    max_concurrent_items: Option<usize>,
    catchup_on_start: Option<bool>,
    max_consecutive_failures: Option<u32>,
    rotation_history_depth: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSupply {
    replenish_count: Option<usize>,
    low_water: Option<usize>,
    suggest_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawValidation {
    min_words: Option<usize>,
    min_title_chars: Option<usize>,
    max_title_chars: Option<usize>,
    min_summary_chars: Option<usize>,
    max_summary_chars: Option<usize>,
    min_headings: Option<usize>,
    min_paragraphs: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct RawStages {
    draft: Option<RawStagePolicy>,
    media: Option<RawStagePolicy>,
    tags: Option<RawStagePolicy>,
    publish: Option<RawStagePolicy>,
    distribute: Option<RawStagePolicy>,
}

#[derive(Debug, Default, Deserialize)]
struct RawStagePolicy {
    timeout_secs: Option<u64>,
    max_attempts: Option<i32>,
    initial_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawTarget {
    id: String,
    name: String,
    base_url: String,
    categories: Vec<String>,
    authors: Vec<String>,
    #[serde(default = "default_true")]
    enabled: bool,
    batch_size: usize,
    #[serde(default)]
    fire_times: Vec<String>,
    timezone: String,
    #[serde(default = "default_true")]
    auto_publish: bool,
    #[serde(default)]
    media_sources: Vec<String>,
    #[serde(default = "default_tag_count")]
    tag_count: usize,
    #[serde(default)]
    platform_accounts: Vec<RawPlatformAccount>,
}

#[derive(Debug, Deserialize)]
struct RawPlatformAccount {
    platform: String,
    handle: String,
}

fn default_true() -> bool {
    true
}

fn default_tag_count() -> usize {
    6
}

impl TryFrom<RawConfig> for PressroomConfig {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, ConfigError> {
        let mut targets = Vec::with_capacity(raw.targets.len());
        for raw_target in raw.targets {
            targets.push(build_target(raw_target)?);
        }

        let mut seen = std::collections::HashSet::new();
        for target in &targets {
            if !seen.insert(target.id.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate target id {:?}",
                    target.id
                )));
            }
        }

        Ok(PressroomConfig {
            targets,
            coordinator: build_coordinator(raw.coordinator),
            supply: build_supply(raw.supply),
            executor: build_executor(raw.validation, raw.stages),
        })
    }
}

fn build_target(raw: RawTarget) -> Result<ProductionTarget, ConfigError> {
    let timezone: Tz = raw
        .timezone
        .parse()
        .map_err(|_| ConfigError::UnknownTimezone(raw.timezone.clone()))?;

    let mut fire_times = Vec::with_capacity(raw.fire_times.len());
    for value in &raw.fire_times {
        fire_times.push(parse_fire_time(value)?);
    }

    let target = ProductionTarget {
        id: raw.id,
        name: raw.name,
        base_url: raw.base_url,
        categories: raw.categories,
        authors: raw.authors,
        enabled: raw.enabled,
        batch_size: raw.batch_size,
        fire_times,
        timezone,
        auto_publish: raw.auto_publish,
        media_sources: raw.media_sources,
        tag_count: raw.tag_count,
        platform_accounts: raw
            .platform_accounts
            .into_iter()
            .map(|account| PlatformAccount {
                platform: account.platform,
                handle: account.handle,
            })
            .collect(),
    };

    target
        .validate()
        .map_err(|err| ConfigError::Invalid(err.to_string()))?;
    Ok(target)
}

fn parse_fire_time(raw: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| ConfigError::InvalidFireTime(raw.to_string()))
}

fn build_coordinator(raw: RawCoordinator) -> CoordinatorConfig {
    let mut builder = CoordinatorConfig::builder();
    if let Some(secs) = raw.tick_interval_secs {
        builder = builder.tick_interval(Duration::from_secs(secs));
    }
    if let Some(parallelism) = raw.batch_parallelism {
        builder = builder.batch_parallelism(parallelism);
    }
    if let Some(ceiling) = raw.max_concurrent_items {
        builder = builder.max_concurrent_items(ceiling);
    }
    if let Some(catchup) = raw.catchup_on_start {
        builder = builder.catchup_on_start(catchup);
    }
    if let Some(count) = raw.max_consecutive_failures {
        builder = builder.max_consecutive_failures(count);
    }
    if let Some(depth) = raw.rotation_history_depth {
        builder = builder.rotation_history_depth(depth);
    }
    builder.build()
}

fn build_supply(raw: RawSupply) -> SupplyConfig {
    let mut config = SupplyConfig::default();
    if let Some(count) = raw.replenish_count {
        config.replenish_count = count;
    }
    if let Some(low_water) = raw.low_water {
        config.low_water = low_water;
    }
    if let Some(secs) = raw.suggest_timeout_secs {
        config.suggest_timeout = Duration::from_secs(secs);
    }
    config
}

fn build_executor(validation: RawValidation, stages: RawStages) -> ExecutorConfig {
    let mut draft_policy = DraftPolicy::default();
    if let Some(value) = validation.min_words {
        draft_policy.min_words = value;
    }
    if let Some(value) = validation.min_title_chars {
        draft_policy.min_title_chars = value;
    }
    if let Some(value) = validation.max_title_chars {
        draft_policy.max_title_chars = value;
    }
    if let Some(value) = validation.min_summary_chars {
        draft_policy.min_summary_chars = value;
    }
    if let Some(value) = validation.max_summary_chars {
        draft_policy.max_summary_chars = value;
    }
    if let Some(value) = validation.min_headings {
        draft_policy.min_headings = value;
    }
    if let Some(value) = validation.min_paragraphs {
        draft_policy.min_paragraphs = value;
    }

    let defaults = ExecutorConfig::default();
    let mut builder = ExecutorConfig::builder().validation(draft_policy);
    if let Some(raw) = stages.draft {
        builder = builder.draft(apply_stage_overrides(
            defaults.stage_policy(crate::models::Stage::Draft).clone(),
            raw,
        ));
    }
    if let Some(raw) = stages.media {
        builder = builder.media(apply_stage_overrides(
            defaults.stage_policy(crate::models::Stage::Media).clone(),
            raw,
        ));
    }
    if let Some(raw) = stages.tags {
        builder = builder.tags(apply_stage_overrides(
            defaults.stage_policy(crate::models::Stage::Tags).clone(),
            raw,
        ));
    }
    if let Some(raw) = stages.publish {
        builder = builder.publish(apply_stage_overrides(
            defaults.stage_policy(crate::models::Stage::Publish).clone(),
            raw,
        ));
    }
    if let Some(raw) = stages.distribute {
        builder = builder.distribute(apply_stage_overrides(
            defaults
                .stage_policy(crate::models::Stage::Distribute)
                .clone(),
            raw,
        ));
    }
    builder.build()
}

fn apply_stage_overrides(mut policy: StagePolicy, raw: RawStagePolicy) -> StagePolicy {
    if let Some(secs) = raw.timeout_secs {
        policy.timeout = Duration::from_secs(secs);
    }
    let retry = &mut policy.retry;
    if let Some(attempts) = raw.max_attempts {
        retry.max_attempts = attempts.max(1);
    }
    if let Some(ms) = raw.initial_delay_ms {
        retry.initial_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = raw.max_delay_ms {
        retry.max_delay = Duration::from_millis(ms);
    }
    policy
}

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

//! The pipeline executor: drives one work item to a terminal outcome.
//!
//! Stage sequence: topic claim, draft, media, tags, publish (or hold),
//! distribute. Each stage makes its collaborator call under an independent
//! timeout and retries per its policy; exhausting the budget moves the whole
//! work item to a failed terminal state with the failing stage and last
//! reason. Every attempt is recorded in the run ledger, so no run disappears
//! without an outcome.
//!
//! Two stages deviate from plain advance-or-fail:
//! - media sourcing: if every source cleanly reports no candidate, the item
//!   proceeds text-only with a ledger note;
//! - distribution: best-effort after a successful publish; failures become a
//!   partial-failure note and the item still completes.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::backends::{ContentGenerator, Distributor, MediaLibrary, Publisher, TagGenerator};
use crate::error::StageError;
use crate::executor::types::ExecutorConfig;
use crate::executor::validation::validate_draft;
use crate::ledger::RunLedger;
use crate::models::{
    CategoryContext, ContentFields, FinalStatus, MediaCandidate, ProductionTarget, RunRecord,
    Stage, StageOutcome, StageTransition, Topic, WorkItem,
};
use crate::storage::TopicStore;

/// Successful stage result plus how to record it.
struct StageSuccess<T> {
    value: T,
    outcome: StageOutcome,
    note: Option<String>,
}

impl<T> StageSuccess<T> {
    fn advanced(value: T) -> Self {
        Self {
            value,
            outcome: StageOutcome::Advanced,
            note: None,
        }
    }

    fn skipped(value: T, note: impl Into<String>) -> Self {
        Self {
            value,
            outcome: StageOutcome::Skipped,
            note: Some(note.into()),
        }
    }
}

/// Runs work items through the content pipeline.
///
/// Each invocation owns its work item exclusively; the only shared state it
/// touches is the topic store (release/consume) and the run ledger (append).
pub struct PipelineExecutor {
    content: Arc<dyn ContentGenerator>,
    media: Arc<dyn MediaLibrary>,
    tags: Arc<dyn TagGenerator>,
    publisher: Arc<dyn Publisher>,
    distributor: Arc<dyn Distributor>,
    topics: Arc<dyn TopicStore>,
    ledger: Arc<dyn RunLedger>,
    config: ExecutorConfig,
}

impl PipelineExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        content: Arc<dyn ContentGenerator>,
        media: Arc<dyn MediaLibrary>,
        tags: Arc<dyn TagGenerator>,
        publisher: Arc<dyn Publisher>,
        distributor: Arc<dyn Distributor>,
        topics: Arc<dyn TopicStore>,
        ledger: Arc<dyn RunLedger>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            content,
            media,
            tags,
            publisher,
            distributor,
            topics,
            ledger,
            config,
        }
    }

    /// Drives a work item to its terminal state and returns the run record.
    pub async fn run(&self, target: &ProductionTarget, mut item: WorkItem) -> RunRecord {
        info!(
            "Pipeline start: item {} (target: {}, topic: {:?}, category: {}, author: {})",
            item.id, target.id, item.topic.text, item.category, item.author
        );

        let mut trace = Vec::new();
        self.record(
            &item,
            &mut trace,
            StageTransition::new(Stage::TopicClaim, 1, StageOutcome::Advanced, None),
        )
        .await;

        let context = CategoryContext {
            target_name: target.name.clone(),
            category: item.category.clone(),
            keywords: item.topic.keywords.clone(),
        };

        // Draft: generate, then validate structurally. A rejected draft is a
        // failed attempt; the collaborator regenerates against the same topic.
        let draft = {
            let topic = item.topic.clone();
            let ctx = context.clone();
            let policy = self.config.draft_policy().clone();
            let result = self
                .run_stage(&mut item, &mut trace, Stage::Draft, move || {
                    let topic = topic.clone();
                    let ctx = ctx.clone();
                    let policy = policy.clone();
                    async move {
                        let draft = self.content.generate(&topic, &ctx).await?;
                        let problems = validate_draft(&draft, &policy);
                        if problems.is_empty() {
                            Ok(StageSuccess::advanced(draft))
                        } else {
                            Err(StageError::Validation(problems.join("; ")))
                        }
                    }
                })
                .await;
            match result {
                Ok(draft) => draft,
                Err(error) => return self.fail(target, item, trace, Stage::Draft, error).await,
            }
        };
        item.draft = Some(draft.clone());

        // Media: first source in priority order with an acceptable candidate
        // wins. All sources cleanly empty: proceed text-only with a note.
        let media = {
            let keywords = item.media_keywords();
            let sources = target.media_sources.clone();
            let result = self
                .run_stage(&mut item, &mut trace, Stage::Media, move || {
                    let keywords = keywords.clone();
                    let sources = sources.clone();
                    async move { self.search_media(&keywords, &sources).await }
                })
                .await;
            match result {
                Ok(media) => media,
                Err(error) => return self.fail(target, item, trace, Stage::Media, error).await,
            }
        };
        item.media = media;

        // Tags: one generation call, one supplemental fill call if short,
        // then pad or truncate to the target's exact tag count.
        let tags = {
            let draft_c = draft.clone();
            let ctx = context.clone();
            let topic = item.topic.clone();
            let count = target.tag_count;
            let result = self
                .run_stage(&mut item, &mut trace, Stage::Tags, move || {
                    let draft_c = draft_c.clone();
                    let ctx = ctx.clone();
                    let topic = topic.clone();
                    async move {
                        let mut tags =
                            normalize_tags(self.tags.tags(&draft_c, &ctx, count).await?);
                        if tags.len() < count {
                            let missing = count - tags.len();
                            debug!(
                                "Tag generator returned {}/{} tags, requesting {} more",
                                tags.len(),
                                count,
                                missing
                            );
                            let extra = self.tags.tags(&draft_c, &ctx, missing).await?;
                            for tag in normalize_tags(extra) {
                                if tags.len() >= count {
                                    break;
                                }
                                push_unique(&mut tags, tag);
                            }
                        }
                        if tags.len() < count {
                            pad_tags(&mut tags, count, &ctx.category, &topic);
                        }
                        tags.truncate(count);
                        Ok(StageSuccess::advanced(tags))
                    }
                })
                .await;
            match result {
                Ok(tags) => tags,
                Err(error) => return self.fail(target, item, trace, Stage::Tags, error).await,
            }
        };
        item.tags = tags;

        // Publish: upload the chosen media (if any), then persist the content
        // item. Auto-publish off persists a held draft; that is not a failure.
        let remote_id = {
            let target_c = target.clone();
            let draft_c = draft.clone();
            let media_c = item.media.clone();
            let tags_c = item.tags.clone();
            let category = item.category.clone();
            let author = item.author.clone();
            let result = self
                .run_stage(&mut item, &mut trace, Stage::Publish, move || {
                    let target_c = target_c.clone();
                    let draft_c = draft_c.clone();
                    let media_c = media_c.clone();
                    let tags_c = tags_c.clone();
                    let category = category.clone();
                    let author = author.clone();
                    async move {
                        let media_id = match media_c.as_ref() {
                            Some(candidate) => {
                                Some(self.publisher.upload_media(&target_c, candidate).await?)
                            }
                            None => None,
                        };
                        let fields = ContentFields {
                            title: draft_c.title.clone(),
                            summary: draft_c.summary.clone(),
                            body_html: draft_c.body_html.clone(),
                            category,
                            author,
                            tags: tags_c,
                            media: media_id,
                            publish: target_c.auto_publish,
                        };
                        let remote_id = self.publisher.create_content(&target_c, &fields).await?;
                        Ok(StageSuccess::advanced(remote_id))
                    }
                })
                .await;
            match result {
                Ok(remote_id) => remote_id,
                Err(error) => return self.fail(target, item, trace, Stage::Publish, error).await,
            }
        };
        item.remote_id = Some(remote_id.clone());

        // Distribute: best-effort once the content is public. A held draft
        // has no public link, so distribution is skipped with a note.
        let final_status = if target.auto_publish {
            let link = target.content_link(&remote_id);
            self.distribute(target, &mut item, &mut trace, &draft.summary, &link)
                .await;
            FinalStatus::Published
        } else {
            let note = "auto-publish disabled; content held as draft, distribution skipped";
            item.notes.push(note.to_string());
            item.stage = Stage::Distribute;
            self.record(
                &item,
                &mut trace,
                StageTransition::new(Stage::Distribute, 1, StageOutcome::Skipped, Some(note.into())),
            )
            .await;
            FinalStatus::Held
        };

        self.complete(target, item, trace, final_status).await
    }

    /// Scans the media sources in priority order.
    async fn search_media(
        &self,
        keywords: &[String],
        sources: &[String],
    ) -> Result<StageSuccess<Option<MediaCandidate>>, StageError> {
        let mut last_error: Option<StageError> = None;
        let mut clean_miss = false;

        for source in sources {
            match self.media.search(keywords, source).await {
                Ok(Some(candidate)) => {
                    debug!("Media source {:?} produced candidate {}", source, candidate.url);
                    return Ok(StageSuccess::advanced(Some(candidate)));
                }
                Ok(None) => {
                    debug!("Media source {:?} has no candidates", source);
                    clean_miss = true;
                }
                Err(err) => {
                    warn!("Media source {:?} failed: {}", source, err);
                    last_error = Some(err.into());
                }
            }
        }

        match last_error {
            // At least one source errored and no candidate surfaced: a retry
            // may still find one.
            Some(error) if !clean_miss => Err(error),
            _ => Ok(StageSuccess::skipped(
                None,
                "no media candidates available; publishing text-only",
            )),
        }
    }

    /// Posts to every configured platform account, best-effort.
    async fn distribute(
        &self,
        target: &ProductionTarget,
        item: &mut WorkItem,
        trace: &mut Vec<StageTransition>,
        summary: &str,
        link: &str,
    ) {
        item.stage = Stage::Distribute;
        let attempt = item.next_attempt(Stage::Distribute);

        if target.platform_accounts.is_empty() {
            self.record(
                item,
                trace,
                StageTransition::new(
                    Stage::Distribute,
                    attempt,
                    StageOutcome::Skipped,
                    Some("no platform accounts configured".into()),
                ),
            )
            .await;
            return;
        }

        let policy = self.config.stage_policy(Stage::Distribute).clone();
        let mut failures = Vec::new();
        for account in &target.platform_accounts {
            match tokio::time::timeout(
                policy.timeout,
                self.distributor.post(account, summary, link),
            )
            .await
            {
                Ok(Ok(ack)) => {
                    debug!("Distributed to {}: {}", account.platform, ack.post_url);
                }
                Ok(Err(err)) => {
                    warn!("Distribution to {} failed: {}", account.platform, err);
                    failures.push(format!("{}: {}", account.platform, err));
                }
                Err(_) => {
                    warn!(
                        "Distribution to {} timed out after {:?}",
                        account.platform, policy.timeout
                    );
                    failures.push(format!(
                        "{}: timed out after {:?}",
                        account.platform, policy.timeout
                    ));
                }
            }
        }

        if failures.is_empty() {
            self.record(
                item,
                trace,
                StageTransition::new(Stage::Distribute, attempt, StageOutcome::Advanced, None),
            )
            .await;
        } else {
            // The content is already published; this never reverts the run.
            let note = format!("partial distribution failure: {}", failures.join("; "));
            warn!("Item {}: {}", item.id, note);
            item.notes.push(note.clone());
            self.record(
                item,
                trace,
                StageTransition::new(Stage::Distribute, attempt, StageOutcome::Failed, Some(note)),
            )
            .await;
        }
    }

    /// Runs one stage with timeout and retry handling.
    async fn run_stage<T, F, Fut>(
        &self,
        item: &mut WorkItem,
        trace: &mut Vec<StageTransition>,
        stage: Stage,
        op: F,
    ) -> Result<T, StageError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<StageSuccess<T>, StageError>>,
    {
        let policy = self.config.stage_policy(stage).clone();
        item.stage = stage;

        loop {
            let attempt = item.next_attempt(stage);
            let result = match tokio::time::timeout(policy.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(StageError::Timeout(policy.timeout)),
            };

            match result {
                Ok(success) => {
                    let StageSuccess {
                        value,
                        outcome,
                        note,
                    } = success;
                    self.record(
                        item,
                        trace,
                        StageTransition::new(stage, attempt, outcome, note.clone()),
                    )
                    .await;
                    if let Some(note) = note {
                        item.notes.push(note);
                    }
                    return Ok(value);
                }
                Err(error) if policy.retry.should_retry(attempt as i32, &error) => {
                    let delay = policy.retry.calculate_delay(attempt as i32);
                    warn!(
                        "Stage {} attempt {} failed for item {}: {} (retry in {:?})",
                        stage, attempt, item.id, error, delay
                    );
                    self.record(
                        item,
                        trace,
                        StageTransition::new(
                            stage,
                            attempt,
                            StageOutcome::AttemptFailed,
                            Some(error.to_string()),
                        ),
                    )
                    .await;
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    self.record(
                        item,
                        trace,
                        StageTransition::new(
                            stage,
                            attempt,
                            StageOutcome::Failed,
                            Some(error.to_string()),
                        ),
                    )
                    .await;
                    return Err(error);
                }
            }
        }
    }

    /// Appends a stage transition to the in-flight trace and the run ledger.
    async fn record(
        &self,
        item: &WorkItem,
        trace: &mut Vec<StageTransition>,
        transition: StageTransition,
    ) {
        trace.push(transition.clone());
        if let Err(err) = self.ledger.record_transition(item, transition).await {
            error!("Failed to record transition for item {}: {}", item.id, err);
        }
    }

    /// Terminal failure: release or consume the topic, append the run record.
    async fn fail(
        &self,
        target: &ProductionTarget,
        item: WorkItem,
        trace: Vec<StageTransition>,
        stage: Stage,
        error: StageError,
    ) -> RunRecord {
        let kind = error.kind();
        let reason = error.to_string();
        error!(
            "Pipeline failed: item {} (target: {}, stage: {}, reason: {})",
            item.id, target.id, stage, reason
        );

        if item.remote_id.is_some() {
            // The content item exists at the destination; the topic is spent
            // regardless of what failed downstream.
            if let Err(err) = self.topics.consume(item.topic.id).await {
                error!("Failed to consume topic {}: {}", item.topic.id, err);
            }
        } else if let Err(err) = self.topics.release(item.topic.id).await {
            error!("Failed to release topic {}: {}", item.topic.id, err);
        } else {
            info!(
                "Topic {} returned to pending for a later batch",
                item.topic.id
            );
        }

        let record = RunRecord {
            work_item_id: item.id,
            target_id: item.target_id.clone(),
            category: item.category.clone(),
            author: item.author.clone(),
            transitions: trace,
            final_status: FinalStatus::Failed {
                stage,
                kind,
                reason,
            },
            notes: item.notes.clone(),
            started_at: item.started_at,
            finished_at: Utc::now(),
        };
        if let Err(err) = self.ledger.record_outcome(record.clone()).await {
            error!("Failed to record run outcome for item {}: {}", item.id, err);
        }
        record
    }

    /// Terminal success: consume the topic, append the run record.
    async fn complete(
        &self,
        target: &ProductionTarget,
        item: WorkItem,
        trace: Vec<StageTransition>,
        final_status: FinalStatus,
    ) -> RunRecord {
        if let Err(err) = self.topics.consume(item.topic.id).await {
            error!("Failed to consume topic {}: {}", item.topic.id, err);
        }

        info!(
            "Pipeline complete: item {} (target: {}, status: {:?}, remote: {:?})",
            item.id, target.id, final_status, item.remote_id
        );

        let record = RunRecord {
            work_item_id: item.id,
            target_id: item.target_id.clone(),
            category: item.category.clone(),
            author: item.author.clone(),
            transitions: trace,
            final_status,
            notes: item.notes.clone(),
            started_at: item.started_at,
            finished_at: Utc::now(),
        };
        if let Err(err) = self.ledger.record_outcome(record.clone()).await {
            error!("Failed to record run outcome for item {}: {}", item.id, err);
        }
        record
    }
}

/// Trims, drops empties, and dedupes case-insensitively, preserving order.
fn normalize_tags(raw: Vec<String>) -> Vec<String> {
    let mut tags = Vec::new();
    for tag in raw {
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            continue;
        }
        push_unique(&mut tags, trimmed.to_string());
    }
    tags
}

fn push_unique(tags: &mut Vec<String>, candidate: String) {
    if !tags
        .iter()
        .any(|existing| existing.eq_ignore_ascii_case(&candidate))
    {
        tags.push(candidate);
    }
}

/// Pads a short tag set from the category, the topic keywords, and finally
/// the topic words, guaranteeing the configured exact count.
fn pad_tags(tags: &mut Vec<String>, count: usize, category: &str, topic: &Topic) {
    let mut fallbacks = vec![category.to_lowercase()];
    fallbacks.extend(topic.keywords.iter().map(|k| k.to_lowercase()));
    fallbacks.extend(
        topic
            .text
            .split_whitespace()
            .map(|word| {
                word.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .filter(|word| word.chars().count() > 3),
    );

    for fallback in fallbacks {
        if tags.len() >= count {
            return;
        }
        if !fallback.is_empty() {
            push_unique(tags, fallback);
        }
    }

    let mut n = 1;
    while tags.len() < count {
        push_unique(tags, format!("{}-{}", category.to_lowercase(), n));
        n += 1;
    }
}

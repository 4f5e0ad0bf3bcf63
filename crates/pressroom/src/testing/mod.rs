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

//! Programmable mock collaborators for tests.
//!
//! Each mock answers from a scripted queue when one is present and falls
//! back to a sensible default otherwise, so most tests only script the
//! behavior they care about. All mocks count their calls.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::backends::{
    ContentGenerator, Distributor, MediaLibrary, Publisher, TagGenerator, TopicSuggester,
};
use crate::error::BackendError;
use crate::models::{
    CategoryContext, ContentFields, DistributionAck, GeneratedDraft, MediaCandidate,
    PlatformAccount, ProductionTarget, RemoteId, RemoteMediaId, Topic,
};

/// Builds a draft that passes the default structural validation policy.
pub fn sample_draft(topic_text: &str) -> GeneratedDraft {
    let mut title = format!("Field notes on {}", topic_text.trim());
    if title.chars().count() > 60 {
        title = title.chars().take(60).collect();
    }
    if title.chars().count() < 10 {
        title.push_str(" explained");
    }

    let mut summary = format!(
        "A practical walkthrough of {} with advice you can apply today.",
        topic_text.trim()
    );
    if summary.chars().count() > 160 {
        summary = summary.chars().take(160).collect();
    }

    let sentence =
        "The practice rewards patience, steady effort, and honest review of what actually worked.";
    let paragraph = vec![sentence; 7].join(" ");

    let mut body = format!(
        "<p>{} deserves a closer look than it usually gets. {}</p>",
        topic_text.trim(),
        paragraph
    );
    for section in 1..=4 {
        body.push_str(&format!("<h2>Part {}: what to know</h2>", section));
        for _ in 0..4 {
            body.push_str(&format!("<p>{}</p>", paragraph));
        }
    }

    GeneratedDraft {
        title,
        summary,
        body_html: body,
    }
}

/// Mock content generation and topic suggestion backend.
#[derive(Default)]
pub struct MockContentBackend {
    drafts: Mutex<VecDeque<Result<GeneratedDraft, BackendError>>>,
    topics: Mutex<VecDeque<Vec<String>>>,
    delay: Mutex<Option<Duration>>,
    generate_calls: AtomicUsize,
    suggest_calls: AtomicUsize,
    topic_counter: AtomicUsize,
}

impl MockContentBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the next `generate` result. Unscripted calls return a valid
    /// draft built from the topic text.
    pub async fn queue_draft(&self, result: Result<GeneratedDraft, BackendError>) {
        self.drafts.lock().await.push_back(result);
    }

    /// Scripts the next `suggest_topics` response. Unscripted calls
    /// synthesize unique topic texts.
    pub async fn queue_topics(&self, topics: Vec<String>) {
        self.topics.lock().await.push_back(topics);
    }

    /// Makes every call sleep first; used to exercise stage timeouts.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().await = delay;
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn suggest_calls(&self) -> usize {
        self.suggest_calls.load(Ordering::SeqCst)
    }

    async fn apply_delay(&self) {
        let delay = *self.delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ContentGenerator for MockContentBackend {
    async fn generate(
        &self,
        topic: &Topic,
        _context: &CategoryContext,
    ) -> Result<GeneratedDraft, BackendError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay().await;
        match self.drafts.lock().await.pop_front() {
            Some(result) => result,
            None => Ok(sample_draft(&topic.text)),
        }
    }
}

#[async_trait]
impl TopicSuggester for MockContentBackend {
    async fn suggest_topics(
        &self,
        _target: &ProductionTarget,
        category: &str,
        count: usize,
    ) -> Result<Vec<String>, BackendError> {
        self.suggest_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay().await;
        match self.topics.lock().await.pop_front() {
            Some(topics) => Ok(topics),
            None => Ok((0..count)
                .map(|_| {
                    let n = self.topic_counter.fetch_add(1, Ordering::SeqCst);
                    format!("{} idea {}", category, n)
                })
                .collect()),
        }
    }
}

/// Mock media lookup backend keyed by source name.
#[derive(Default)]
pub struct MockMediaLibrary {
    results: Mutex<HashMap<String, VecDeque<Result<Option<MediaCandidate>, BackendError>>>>,
    search_calls: AtomicUsize,
}

impl MockMediaLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the next result for one source. Unscripted sources report no
    /// candidates.
    pub async fn queue_result(
        &self,
        source: &str,
        result: Result<Option<MediaCandidate>, BackendError>,
    ) {
        self.results
            .lock()
            .await
            .entry(source.to_string())
            .or_default()
            .push_back(result);
    }

    /// Convenience: the next search of `source` returns one candidate.
    pub async fn queue_candidate(&self, source: &str, url: &str) {
        self.queue_result(
            source,
            Ok(Some(MediaCandidate {
                url: url.to_string(),
                title: None,
                source: source.to_string(),
                attribution: None,
            })),
        )
        .await;
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaLibrary for MockMediaLibrary {
    async fn search(
        &self,
        _keywords: &[String],
        source: &str,
    ) -> Result<Option<MediaCandidate>, BackendError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        match self
            .results
            .lock()
            .await
            .get_mut(source)
            .and_then(|queue| queue.pop_front())
        {
            Some(result) => result,
            None => Ok(None),
        }
    }
}

/// Mock tag generation backend.
#[derive(Default)]
pub struct MockTagGenerator {
    responses: Mutex<VecDeque<Vec<String>>>,
    calls: AtomicUsize,
    counter: AtomicUsize,
}

impl MockTagGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the next response. Unscripted calls return exactly the
    /// requested number of unique tags.
    pub async fn queue_tags(&self, tags: Vec<String>) {
        self.responses.lock().await.push_back(tags);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TagGenerator for MockTagGenerator {
    async fn tags(
        &self,
        _draft: &GeneratedDraft,
        _context: &CategoryContext,
        count: usize,
    ) -> Result<Vec<String>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.lock().await.pop_front() {
            Some(tags) => Ok(tags),
            None => Ok((0..count)
                .map(|_| {
                    let n = self.counter.fetch_add(1, Ordering::SeqCst);
                    format!("auto-tag-{}", n)
                })
                .collect()),
        }
    }
}

/// Mock publication target.
#[derive(Default)]
pub struct MockPublisher {
    created: Mutex<Vec<ContentFields>>,
    uploads: Mutex<Vec<MediaCandidate>>,
    fail_creates: AtomicUsize,
    next_id: AtomicUsize,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` create calls fail transiently.
    pub fn fail_next_creates(&self, n: usize) {
        self.fail_creates.store(n, Ordering::SeqCst);
    }

    /// Every content item persisted so far, in order.
    pub async fn created(&self) -> Vec<ContentFields> {
        self.created.lock().await.clone()
    }

    pub async fn uploads(&self) -> Vec<MediaCandidate> {
        self.uploads.lock().await.clone()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn create_content(
        &self,
        _target: &ProductionTarget,
        fields: &ContentFields,
    ) -> Result<RemoteId, BackendError> {
        let should_fail = self
            .fail_creates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(BackendError::Transient("destination unavailable".into()));
        }
        self.created.lock().await.push(fields.clone());
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1000;
        Ok(RemoteId(id.to_string()))
    }

    async fn upload_media(
        &self,
        _target: &ProductionTarget,
        media: &MediaCandidate,
    ) -> Result<RemoteMediaId, BackendError> {
        self.uploads.lock().await.push(media.clone());
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 5000;
        Ok(RemoteMediaId(id.to_string()))
    }
}

/// Mock distribution backend.
#[derive(Default)]
pub struct MockDistributor {
    posts: Mutex<Vec<(String, String, String)>>,
    failing_platforms: Mutex<HashSet<String>>,
}

impl MockDistributor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every post to the given platform fails.
    pub async fn fail_platform(&self, platform: &str) {
        self.failing_platforms
            .lock()
            .await
            .insert(platform.to_string());
    }

    /// Posts accepted so far, as `(platform, summary, link)`.
    pub async fn posts(&self) -> Vec<(String, String, String)> {
        self.posts.lock().await.clone()
    }
}

#[async_trait]
impl Distributor for MockDistributor {
    async fn post(
        &self,
        account: &PlatformAccount,
        summary: &str,
        link: &str,
    ) -> Result<DistributionAck, BackendError> {
        if self.failing_platforms.lock().await.contains(&account.platform) {
            return Err(BackendError::Transient(format!(
                "{} timeline unavailable",
                account.platform
            )));
        }
        self.posts.lock().await.push((
            account.platform.clone(),
            summary.to_string(),
            link.to_string(),
        ));
        Ok(DistributionAck {
            platform: account.platform.clone(),
            post_url: format!("https://{}.example/posts/{}", account.platform, link.len()),
        })
    }
}

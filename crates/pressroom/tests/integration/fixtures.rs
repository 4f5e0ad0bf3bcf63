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

//! Shared fixtures: a fully wired orchestrator over mock collaborators with
//! millisecond-scale policies so retry paths stay fast.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pressroom::testing::{
    MockContentBackend, MockDistributor, MockMediaLibrary, MockPublisher, MockTagGenerator,
};
use pressroom::{
    BackoffStrategy, CoordinatorConfig, DraftPolicy, ExecutorConfig, MemoryRunLedger,
    MemoryTargetDirectory, MemoryTopicStore, PipelineExecutor, ProductionTarget, RetryCondition,
    RetryPolicy, RotationTracker, ScheduleCoordinator, StagePolicy, SupplyConfig, Topic,
    TopicStore, TopicSupply, WorkItem,
};

/// Installs a fmt subscriber honoring `RUST_LOG`, once per test binary.
/// Harmless if another subscriber (e.g. `#[traced_test]`) is already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// A production target with sensible test defaults; tests mutate fields as
/// needed.
pub fn target(id: &str) -> ProductionTarget {
    ProductionTarget {
        id: id.to_string(),
        name: format!("Target {}", id),
        base_url: format!("https://{}.example", id),
        categories: vec!["health".into(), "beauty".into(), "fitness".into()],
        authors: vec!["ana".into(), "piotr".into()],
        enabled: true,
        batch_size: 2,
        fire_times: vec![],
        timezone: chrono_tz::UTC,
        auto_publish: true,
        media_sources: vec!["unsplash".into(), "google".into()],
        tag_count: 6,
        platform_accounts: vec![],
    }
}

/// Fast retry policy: 3 attempts, millisecond backoff, same curve as the
/// production default.
pub fn fast_retry(max_attempts: i32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        backoff_strategy: BackoffStrategy::Exponential {
            base: 2.5,
            multiplier: 1.0,
        },
        retry_conditions: vec![RetryCondition::TransientOnly],
        jitter: false,
    }
}

pub fn fast_executor_config() -> ExecutorConfig {
    executor_config_with(Duration::from_millis(500), 3)
}

pub fn executor_config_with(timeout: Duration, max_attempts: i32) -> ExecutorConfig {
    let stage = StagePolicy::new(timeout, fast_retry(max_attempts));
    ExecutorConfig::builder()
        .draft(stage.clone())
        .media(stage.clone())
        .tags(stage.clone())
        .publish(stage)
        .distribute(StagePolicy::new(timeout, RetryPolicy::none()))
        .validation(DraftPolicy::default())
        .build()
}

pub fn fast_supply_config() -> SupplyConfig {
    SupplyConfig {
        replenish_count: 5,
        // Disables proactive top-ups so tests control the backlog exactly.
        low_water: 0,
        suggest_timeout: Duration::from_millis(500),
    }
}

pub fn fast_coordinator_config() -> CoordinatorConfig {
    CoordinatorConfig::builder()
        .tick_interval(Duration::from_millis(50))
        .batch_parallelism(2)
        .max_concurrent_items(8)
        .build()
}

/// A fully wired orchestrator over mocks.
pub struct Harness {
    pub backend: Arc<MockContentBackend>,
    pub media: Arc<MockMediaLibrary>,
    pub tags: Arc<MockTagGenerator>,
    pub publisher: Arc<MockPublisher>,
    pub distributor: Arc<MockDistributor>,
    pub topics: Arc<MemoryTopicStore>,
    pub ledger: Arc<MemoryRunLedger>,
    pub targets: Arc<MemoryTargetDirectory>,
    pub supply: Arc<TopicSupply>,
    pub executor: Arc<PipelineExecutor>,
    pub rotation: Arc<RotationTracker>,
}

impl Harness {
    pub fn new(targets: Vec<ProductionTarget>) -> Self {
        Self::with_executor_config(targets, fast_executor_config())
    }

    pub fn with_executor_config(
        targets: Vec<ProductionTarget>,
        executor_config: ExecutorConfig,
    ) -> Self {
        let backend = Arc::new(MockContentBackend::new());
        let media = Arc::new(MockMediaLibrary::new());
        let tags = Arc::new(MockTagGenerator::new());
        let publisher = Arc::new(MockPublisher::new());
        let distributor = Arc::new(MockDistributor::new());
        let topics = Arc::new(MemoryTopicStore::new());
        let ledger = Arc::new(MemoryRunLedger::new());
        let directory = Arc::new(MemoryTargetDirectory::new(targets));

        let supply = Arc::new(TopicSupply::new(
            topics.clone(),
            backend.clone(),
            fast_supply_config(),
        ));
        let executor = Arc::new(PipelineExecutor::new(
            backend.clone(),
            media.clone(),
            tags.clone(),
            publisher.clone(),
            distributor.clone(),
            topics.clone(),
            ledger.clone(),
            executor_config,
        ));
        let rotation = Arc::new(RotationTracker::new(ledger.clone(), 50));

        Self {
            backend,
            media,
            tags,
            publisher,
            distributor,
            topics,
            ledger,
            targets: directory,
            supply,
            executor,
            rotation,
        }
    }

    pub fn coordinator(&self, config: CoordinatorConfig) -> ScheduleCoordinator {
        ScheduleCoordinator::new(
            self.targets.clone(),
            self.supply.clone(),
            self.executor.clone(),
            self.rotation.clone(),
            self.ledger.clone(),
            config,
        )
    }

    /// Seeds pending topics with strictly increasing creation times so the
    /// oldest-first claim order matches the given order.
    pub async fn seed_topics(&self, target_id: &str, category: &str, texts: &[&str]) {
        let base = Utc::now() - chrono::Duration::minutes(texts.len() as i64);
        for (index, text) in texts.iter().enumerate() {
            let mut topic = Topic::new(target_id, category, *text, vec![]);
            topic.created_at = base + chrono::Duration::seconds(index as i64);
            assert!(self.topics.insert_if_new(topic).await.unwrap());
        }
    }

    /// Claims a seeded topic and wraps it in a work item, the way the
    /// coordinator dispatches one.
    pub async fn claim_item(
        &self,
        target: &ProductionTarget,
        category: &str,
        author: &str,
    ) -> WorkItem {
        let topic = self
            .topics
            .claim_oldest_pending(&target.id, category)
            .await
            .unwrap()
            .expect("a seeded topic to claim");
        WorkItem::new(target.id.clone(), topic, category, author)
    }
}

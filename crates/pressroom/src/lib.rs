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

//! # Pressroom
//!
//! Pressroom is a library for resilient automated content production: it
//! drives a multi-step content pipeline (topic selection, content
//! generation, media sourcing, metadata tagging, publication, distribution)
//! across multiple independently-configured production targets, on recurring
//! schedules, with retry and rotation policies.
//!
//! ## Components
//!
//! - [`rotation`]: round-robin category and author selection over each
//!   target's configured rings, with per-target serialization.
//! - [`supply`]: the per-(target, category) topic backlog, replenished from
//!   a suggestion backend when it runs dry.
//! - [`executor`]: the pipeline executor driving one work item through the
//!   stage sequence with per-stage timeouts and retry policies.
//! - [`scheduler`]: the process-wide coordinator firing per-target batches
//!   at configured local times, with per-target batch mutual exclusion.
//! - [`ledger`]: the append-only record of every run's stage transitions
//!   and terminal outcome.
//!
//! External capabilities (content generation, media lookup, publication,
//! distribution, persistent storage) are consumed through the narrow async
//! traits in [`backends`] and [`storage`]; nothing in the core depends on a
//! concrete wire protocol.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pressroom::*;
//!
//! let config = PressroomConfig::from_path("pressroom.toml")?;
//! let targets = Arc::new(MemoryTargetDirectory::new(config.targets.clone()));
//! let topics = Arc::new(MemoryTopicStore::new());
//! let ledger = Arc::new(MemoryRunLedger::new());
//!
//! let backend = Arc::new(my_backends::Stack::connect()?);
//! let supply = Arc::new(TopicSupply::new(topics.clone(), backend.clone(), config.supply));
//! let executor = Arc::new(PipelineExecutor::new(
//!     backend.clone(), backend.clone(), backend.clone(), backend.clone(),
//!     backend, topics, ledger.clone(), config.executor,
//! ));
//! let rotation = Arc::new(RotationTracker::new(
//!     ledger.clone(),
//!     config.coordinator.rotation_history_depth(),
//! ));
//!
//! let coordinator = ScheduleCoordinator::new(
//!     targets, supply, executor, rotation, ledger, config.coordinator,
//! );
//! coordinator.run().await;
//! ```

pub mod backends;
pub mod config;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod models;
pub mod retry;
pub mod rotation;
pub mod scheduler;
pub mod storage;
pub mod supply;
pub mod testing;

pub use backends::{
    ContentGenerator, Distributor, MediaLibrary, Publisher, TagGenerator, TopicSuggester,
};
pub use config::PressroomConfig;
pub use error::{
    BackendError, ConfigError, ConfigurationError, RotationError, SchedulerError, StageError,
    StorageError, SupplyError,
};
pub use executor::validation::{validate_draft, DraftPolicy};
pub use executor::{ExecutorConfig, PipelineExecutor, StagePolicy};
pub use ledger::{summarize, LedgerSummary, MemoryRunLedger, RunLedger};
pub use models::{
    CategoryContext, ContentFields, DistributionAck, FailureKind, FinalStatus, GeneratedDraft,
    MediaCandidate, PlatformAccount, ProductionTarget, RemoteId, RemoteMediaId, RunRecord, Stage,
    StageOutcome, StageTransition, TargetId, Topic, TopicStatus, WorkItem,
};
pub use retry::{BackoffStrategy, RetryCondition, RetryPolicy};
pub use rotation::{select_author, select_category, Pick, RotationState, RotationTracker};
pub use scheduler::{
    BatchSummary, CoordinatorConfig, CoordinatorConfigBuilder, CoordinatorStatus,
    ScheduleCoordinator,
};
pub use storage::{MemoryTargetDirectory, MemoryTopicStore, TargetDirectory, TopicStore};
pub use supply::{SupplyConfig, TopicSupply};

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

//! Domain models for the content production pipeline.
//!
//! These are plain serializable records: target configuration, topic backlog
//! entries, in-flight work items, and immutable ledger records. Orchestration
//! logic lives in the component modules, not here.

mod content;
mod run_record;
mod target;
mod topic;
mod work_item;

pub use content::{
    CategoryContext, ContentFields, DistributionAck, GeneratedDraft, MediaCandidate, RemoteId,
    RemoteMediaId,
};
pub use run_record::{FailureKind, FinalStatus, RunRecord};
pub use target::{PlatformAccount, ProductionTarget, TargetId};
pub use topic::{normalize_text, Topic, TopicStatus};
pub use work_item::{Stage, StageOutcome, StageTransition, WorkItem};

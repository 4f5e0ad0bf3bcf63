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

//! Pipeline execution.
//!
//! The [`PipelineExecutor`] drives one work item through the ordered stage
//! sequence, applying per-stage timeout and retry policy and recording every
//! transition in the run ledger.

mod pipeline;
mod types;
pub mod validation;

pub use pipeline::PipelineExecutor;
pub use types::{ExecutorConfig, ExecutorConfigBuilder, StagePolicy};

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

//! Error types for the pressroom orchestrator.
//!
//! Each subsystem has its own error enum. The broad taxonomy:
//!
//! - [`ConfigurationError`]: a production target is misconfigured. Fatal for
//!   the affected batch item, never retried.
//! - [`BackendError`]: an external collaborator call failed. Transient
//!   variants are retried per stage policy; malformed responses fail the
//!   attempt at the boundary rather than propagating partial data downstream.
//! - [`StageError`]: a pipeline stage attempt failed. Carries enough shape to
//!   decide retryability and to classify the terminal failure.
//! - [`SupplyError`]: the topic backlog could not produce a topic.
//! - [`StorageError`]: a storage surface (topic store, ledger, target
//!   directory) failed.
//! - [`SchedulerError`]: coordinator-level dispatch problems.
//! - [`ConfigError`]: the operator configuration file could not be loaded.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::models::FailureKind;

/// A production target's configuration cannot support a pipeline run.
///
/// These are operator mistakes, not runtime conditions: they are surfaced
/// immediately, abort the target's batch, and are never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The target has no configured content categories.
    #[error("target {target} has no configured categories")]
    EmptyCategories { target: String },

    /// The target has no configured authors.
    #[error("target {target} has no configured authors")]
    EmptyAuthors { target: String },

    /// The target's batch size is zero.
    #[error("target {target} has a batch size of 0")]
    ZeroBatchSize { target: String },

    /// The target's tag count is zero.
    #[error("target {target} has a tag count of 0")]
    ZeroTagCount { target: String },

    /// A backend rejected the target's credentials.
    #[error("invalid credentials for target {target}: {reason}")]
    InvalidCredentials { target: String, reason: String },
}

/// An external collaborator call failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Network trouble, rate limiting, or a backend-side outage. Retryable.
    #[error("transient backend error: {0}")]
    Transient(String),

    /// The backend rejected the configured credentials. Not retryable.
    #[error("backend rejected credentials: {0}")]
    Unauthorized(String),

    /// The backend answered with a payload that does not satisfy the
    /// structured result contract. The attempt fails at the boundary.
    #[error("malformed backend response: {0}")]
    MalformedResponse(String),
}

/// A single pipeline stage attempt failed.
#[derive(Debug, Error)]
pub enum StageError {
    /// The target configuration cannot support this stage.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A collaborator call failed transiently.
    #[error("transient backend error: {0}")]
    Transient(String),

    /// A backend rejected the configured credentials.
    #[error("backend rejected credentials: {0}")]
    Unauthorized(String),

    /// The stage exceeded its configured timeout. Counted as a failed
    /// attempt, never as a silent success.
    #[error("stage timed out after {0:?}")]
    Timeout(Duration),

    /// Generated content failed structural acceptance checks.
    #[error("draft validation failed: {0}")]
    Validation(String),

    /// A backend payload did not satisfy the result contract.
    #[error("malformed backend response: {0}")]
    MalformedResponse(String),

    /// The topic backlog produced nothing for this dispatch.
    #[error("no topics available for target {target}, category {category}")]
    NoTopics { target: String, category: String },

    /// A storage surface failed mid-stage.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl StageError {
    /// Whether a retry of the same stage could plausibly succeed.
    ///
    /// Validation failures are retryable: the content collaborator is asked
    /// to regenerate against the same topic, consuming the same budget.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StageError::Transient(_)
                | StageError::Timeout(_)
                | StageError::Validation(_)
                | StageError::MalformedResponse(_)
        )
    }

    /// Classifies this error for ledger records and batch accounting.
    pub fn kind(&self) -> FailureKind {
        match self {
            StageError::Configuration(_) | StageError::Unauthorized(_) => {
                FailureKind::Configuration
            }
            StageError::Transient(_) => FailureKind::Backend,
            StageError::Timeout(_) => FailureKind::Timeout,
            StageError::Validation(_) | StageError::MalformedResponse(_) => {
                FailureKind::Validation
            }
            StageError::NoTopics { .. } => FailureKind::NoTopics,
            StageError::Storage(_) => FailureKind::Storage,
        }
    }
}

impl From<BackendError> for StageError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Transient(msg) => StageError::Transient(msg),
            BackendError::Unauthorized(msg) => StageError::Unauthorized(msg),
            BackendError::MalformedResponse(msg) => StageError::MalformedResponse(msg),
        }
    }
}

/// The topic supply could not produce a claimed topic.
#[derive(Debug, Error)]
pub enum SupplyError {
    /// Neither the backlog nor a replenishment call yielded a topic.
    ///
    /// Surfaced to the caller rather than retried, so a failing suggestion
    /// backend cannot trap a dispatch in a loop.
    #[error("no topics available for target {target}, category {category}")]
    NoTopicsAvailable { target: String, category: String },

    /// A manually entered topic duplicates an existing one.
    #[error("duplicate topic for target {target}: {text:?}")]
    DuplicateTopic { target: String, text: String },

    /// The suggestion backend call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The topic store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A storage surface operation failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("topic {0} not found")]
    TopicNotFound(Uuid),

    #[error("topic {id} is not in the {expected} state")]
    TopicStateConflict { id: Uuid, expected: String },

    #[error("target {0} not found")]
    TargetNotFound(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// A rotation pick could not be produced.
#[derive(Debug, Error)]
pub enum RotationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Coordinator-level dispatch problems.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("unknown target: {0}")]
    UnknownTarget(String),

    #[error("target {0} is disabled")]
    TargetDisabled(String),

    #[error("target {0} is paused after repeated batch failures")]
    TargetPaused(String),

    #[error("a batch is already running for target {0}")]
    BatchAlreadyRunning(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The operator configuration file could not be loaded or validated.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unknown timezone {0:?}")]
    UnknownTimezone(String),

    #[error("invalid fire time {0:?} (expected HH:MM or HH:MM:SS)")]
    InvalidFireTime(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

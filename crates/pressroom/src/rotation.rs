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

//! Category and author rotation.
//!
//! Each target's category and author lists are fixed-order rings: the next
//! pick is the entry immediately after the last-used one, wrapping at the
//! end, so every entry is used once before any repeats. Selection itself is
//! a pure function of the target configuration and rotation history; the
//! [`RotationTracker`] serializes the read-pick-record cycle per target and
//! layers not-yet-completed picks over committed history so concurrent items
//! of one batch never receive the same pick.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ConfigurationError, RotationError};
use crate::ledger::RunLedger;
use crate::models::{ProductionTarget, RunRecord, TargetId};

/// Last-used rotation entries for a target, derived on demand from the most
/// recent run records. Never stored independently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationState {
    pub last_category: Option<String>,
    pub last_author: Option<String>,
}

impl RotationState {
    /// Derives the state from ledger history, newest first.
    ///
    /// Only runs that completed successfully count: a failed run's pick is
    /// reused by a later batch rather than skipped forever.
    pub fn from_history(records: &[RunRecord]) -> Self {
        match records.iter().find(|r| r.final_status.is_success()) {
            Some(record) => Self {
                last_category: Some(record.category.clone()),
                last_author: Some(record.author.clone()),
            },
            None => Self::default(),
        }
    }
}

/// Picks the next category for a target, in ring order.
pub fn select_category(
    target: &ProductionTarget,
    state: &RotationState,
) -> Result<String, ConfigurationError> {
    if target.categories.is_empty() {
        return Err(ConfigurationError::EmptyCategories {
            target: target.id.clone(),
        });
    }
    Ok(ring_next(&target.categories, state.last_category.as_deref()))
}

/// Picks the next author for a target, in ring order.
pub fn select_author(
    target: &ProductionTarget,
    state: &RotationState,
) -> Result<String, ConfigurationError> {
    if target.authors.is_empty() {
        return Err(ConfigurationError::EmptyAuthors {
            target: target.id.clone(),
        });
    }
    Ok(ring_next(&target.authors, state.last_author.as_deref()))
}

/// Next ring entry after `last`, wrapping at the end. With no history, or
/// when the last-used entry was removed from the list, the first entry is
/// used.
fn ring_next(ring: &[String], last: Option<&str>) -> String {
    match last.and_then(|value| ring.iter().position(|entry| entry == value)) {
        Some(index) => ring[(index + 1) % ring.len()].clone(),
        None => ring[0].clone(),
    }
}

/// A provisional category/author assignment for one dispatched work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pick {
    pub id: Uuid,
    pub category: String,
    pub author: String,
}

/// Serializes rotation picks per target.
///
/// Committed history lives in the run ledger; picks whose runs have not yet
/// completed are held here and act as the effective "last used" entries for
/// subsequent picks in the same batch. Completing a pick simply drops it:
/// a successful run has already committed its assignment through its run
/// record, and a failed run's assignment is rolled back by the drop.
pub struct RotationTracker {
    ledger: Arc<dyn RunLedger>,
    history_depth: usize,
    in_flight: Mutex<HashMap<TargetId, Vec<Pick>>>,
}

impl RotationTracker {
    pub fn new(ledger: Arc<dyn RunLedger>, history_depth: usize) -> Self {
        Self {
            ledger,
            history_depth,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Produces the next category/author pick for a target.
    ///
    /// The whole read-pick-record cycle runs under one lock, so two items of
    /// the same batch can never observe the same rotation state.
    pub async fn begin_pick(&self, target: &ProductionTarget) -> Result<Pick, RotationError> {
        let mut in_flight = self.in_flight.lock().await;
        let pending = in_flight.entry(target.id.clone()).or_default();

        let state = match pending.last() {
            Some(pick) => RotationState {
                last_category: Some(pick.category.clone()),
                last_author: Some(pick.author.clone()),
            },
            None => {
                let history = self
                    .ledger
                    .recent_history(&target.id, self.history_depth)
                    .await?;
                RotationState::from_history(&history)
            }
        };

        let pick = Pick {
            id: Uuid::new_v4(),
            category: select_category(target, &state)?,
            author: select_author(target, &state)?,
        };
        debug!(
            "Rotation pick for target {}: category={}, author={}",
            target.id, pick.category, pick.author
        );
        pending.push(pick.clone());
        Ok(pick)
    }

    /// Settles a pick once its run has reached a terminal state (success or
    /// failure) and its run record, if any, has been written.
    pub async fn complete_pick(&self, target_id: &str, pick: &Pick) {
        let mut in_flight = self.in_flight.lock().await;
        if let Some(pending) = in_flight.get_mut(target_id) {
            pending.retain(|p| p.id != pick.id);
            if pending.is_empty() {
                in_flight.remove(target_id);
            }
        }
    }
}

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

//! The schedule coordinator.
//!
//! A process-wide timer loop evaluates, on a fixed tick interval, whether
//! any enabled production target has a fire-time inside the tick window and
//! no batch currently running. Batches dispatch their work items in backlog
//! order with bounded parallelism; a target whose previous batch is still
//! running when its next fire-time arrives skips that slot entirely, so
//! backend slowness never grows an unbounded backlog.
//!
//! Beyond the timer itself the coordinator owns the per-target batch
//! accounting: the running-batch mutual exclusion, the consecutive-failure
//! auto-pause, optional startup catchup of fire-times missed earlier today,
//! and the manual batch trigger.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{RotationError, SchedulerError, StorageError, SupplyError};
use crate::executor::PipelineExecutor;
use crate::ledger::RunLedger;
use crate::models::{
    FailureKind, FinalStatus, ProductionTarget, RunRecord, Stage, StageOutcome, StageTransition,
    TargetId, WorkItem,
};
use crate::rotation::{Pick, RotationTracker};
use crate::storage::TargetDirectory;
use crate::supply::TopicSupply;

/// Accounting for one completed batch.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub target_id: TargetId,
    /// Work items actually handed to the pipeline executor.
    pub dispatched: usize,
    pub succeeded: usize,
    /// Failed runs, including dispatches that never obtained a topic.
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchSummary {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Operator-facing snapshot of the coordinator's state.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorStatus {
    /// Targets with a batch currently running.
    pub running: Vec<TargetId>,
    /// Targets auto-paused after repeated batch failures.
    pub paused: Vec<TargetId>,
}

/// Configuration for the schedule coordinator.
///
/// # Construction
///
/// ```rust,ignore
/// let config = CoordinatorConfig::builder()
///     .tick_interval(Duration::from_secs(30))
///     .batch_parallelism(2)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    tick_interval: Duration,
    batch_parallelism: usize,
    max_concurrent_items: usize,
    catchup_on_start: bool,
    max_consecutive_failures: u32,
    rotation_history_depth: usize,
}

impl CoordinatorConfig {
    /// Creates a new configuration builder with default values.
    pub fn builder() -> CoordinatorConfigBuilder {
        CoordinatorConfigBuilder::default()
    }

    /// How often the coordinator evaluates fire-times.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Concurrent work items within one target's batch.
    pub fn batch_parallelism(&self) -> usize {
        self.batch_parallelism
    }

    /// Process-wide ceiling on concurrent work items across all targets.
    pub fn max_concurrent_items(&self) -> usize {
        self.max_concurrent_items
    }

    /// Whether fire-times missed earlier today are dispatched at startup.
    pub fn catchup_on_start(&self) -> bool {
        self.catchup_on_start
    }

    /// Completely-failed batches in a row before a target is auto-paused.
    pub fn max_consecutive_failures(&self) -> u32 {
        self.max_consecutive_failures
    }

    /// How many recent run records feed rotation-state computation.
    pub fn rotation_history_depth(&self) -> usize {
        self.rotation_history_depth
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfigBuilder::default().build()
    }
}

/// Builder for [`CoordinatorConfig`].
#[derive(Debug, Clone)]
pub struct CoordinatorConfigBuilder {
    config: CoordinatorConfig,
}

impl Default for CoordinatorConfigBuilder {
    fn default() -> Self {
        Self {
            config: CoordinatorConfig {
                tick_interval: Duration::from_secs(30),
                batch_parallelism: 2,
                max_concurrent_items: 8,
                catchup_on_start: false,
                max_consecutive_failures: 3,
                rotation_history_depth: 50,
            },
        }
    }
}

impl CoordinatorConfigBuilder {
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.config.tick_interval = interval;
        self
    }

    pub fn batch_parallelism(mut self, parallelism: usize) -> Self {
        self.config.batch_parallelism = parallelism.max(1);
        self
    }

    pub fn max_concurrent_items(mut self, ceiling: usize) -> Self {
        self.config.max_concurrent_items = ceiling.max(1);
        self
    }

    pub fn catchup_on_start(mut self, enabled: bool) -> Self {
        self.config.catchup_on_start = enabled;
        self
    }

    pub fn max_consecutive_failures(mut self, count: u32) -> Self {
        self.config.max_consecutive_failures = count.max(1);
        self
    }

    pub fn rotation_history_depth(mut self, depth: usize) -> Self {
        self.config.rotation_history_depth = depth.max(1);
        self
    }

    pub fn build(self) -> CoordinatorConfig {
        self.config
    }
}

/// Drives scheduled batches across all configured production targets.
///
/// All shared state lives behind `Arc`s, so the coordinator is cheap to
/// clone; batch tasks run on clones of it.
pub struct ScheduleCoordinator {
    targets: Arc<dyn TargetDirectory>,
    supply: Arc<TopicSupply>,
    executor: Arc<PipelineExecutor>,
    rotation: Arc<RotationTracker>,
    ledger: Arc<dyn RunLedger>,
    config: CoordinatorConfig,
    limiter: Arc<Semaphore>,
    running: Arc<StdMutex<HashSet<TargetId>>>,
    failures: Arc<StdMutex<HashMap<TargetId, u32>>>,
    paused: Arc<StdMutex<HashSet<TargetId>>>,
    shutdown: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Clone for ScheduleCoordinator {
    fn clone(&self) -> Self {
        Self {
            targets: Arc::clone(&self.targets),
            supply: Arc::clone(&self.supply),
            executor: Arc::clone(&self.executor),
            rotation: Arc::clone(&self.rotation),
            ledger: Arc::clone(&self.ledger),
            config: self.config.clone(),
            limiter: Arc::clone(&self.limiter),
            running: Arc::clone(&self.running),
            failures: Arc::clone(&self.failures),
            paused: Arc::clone(&self.paused),
            shutdown: Arc::clone(&self.shutdown),
            notify: Arc::clone(&self.notify),
        }
    }
}

impl ScheduleCoordinator {
    pub fn new(
        targets: Arc<dyn TargetDirectory>,
        supply: Arc<TopicSupply>,
        executor: Arc<PipelineExecutor>,
        rotation: Arc<RotationTracker>,
        ledger: Arc<dyn RunLedger>,
        config: CoordinatorConfig,
    ) -> Self {
        let limiter = Arc::new(Semaphore::new(config.max_concurrent_items()));
        Self {
            targets,
            supply,
            executor,
            rotation,
            ledger,
            config,
            limiter,
            running: Arc::new(StdMutex::new(HashSet::new())),
            failures: Arc::new(StdMutex::new(HashMap::new())),
            paused: Arc::new(StdMutex::new(HashSet::new())),
            shutdown: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Runs the coordinator's tick loop until [`shutdown`](Self::shutdown)
    /// is called. Spawned batches run to their natural terminal points.
    pub async fn run(&self) {
        info!(
            "Starting schedule coordinator (tick: {:?}, batch parallelism: {}, ceiling: {})",
            self.config.tick_interval(),
            self.config.batch_parallelism(),
            self.config.max_concurrent_items()
        );

        if self.config.catchup_on_start() {
            self.catchup().await;
        }

        let mut interval = tokio::time::interval(self.config.tick_interval());
        let mut window_start = Utc::now();

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.notify.notified() => {}
            }
            if self.shutdown.load(Ordering::SeqCst) {
                info!("Schedule coordinator shutting down");
                break;
            }

            let window_end = Utc::now();
            self.evaluate_window(window_start, window_end).await;
            window_start = window_end;
        }
    }

    /// Signals the tick loop to stop. In-flight batches are not aborted.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Snapshot of running and paused targets.
    pub fn status(&self) -> CoordinatorStatus {
        let running = self.running.lock().map(|set| set.iter().cloned().collect());
        let paused = self.paused.lock().map(|set| set.iter().cloned().collect());
        CoordinatorStatus {
            running: running.unwrap_or_default(),
            paused: paused.unwrap_or_default(),
        }
    }

    /// Clears a target's auto-pause and failure counter.
    pub fn resume_target(&self, target_id: &str) {
        if let Ok(mut paused) = self.paused.lock() {
            paused.remove(target_id);
        }
        if let Ok(mut failures) = self.failures.lock() {
            failures.remove(target_id);
        }
        info!("Target {} resumed by operator", target_id);
    }

    /// Runs one batch for a target immediately, subject to the same
    /// per-target mutual exclusion as scheduled batches.
    pub async fn trigger_batch(&self, target_id: &str) -> Result<BatchSummary, SchedulerError> {
        let target = match self.targets.get(target_id).await {
            Ok(target) => target,
            Err(StorageError::TargetNotFound(id)) => {
                return Err(SchedulerError::UnknownTarget(id))
            }
            Err(err) => return Err(SchedulerError::Storage(err)),
        };

        if !target.enabled {
            return Err(SchedulerError::TargetDisabled(target.id));
        }
        if self.is_paused(&target.id) {
            return Err(SchedulerError::TargetPaused(target.id));
        }
        if !self.try_mark_running(&target.id) {
            return Err(SchedulerError::BatchAlreadyRunning(target.id));
        }

        info!("Manual batch trigger for target {}", target.id);
        Ok(self.run_batch(target).await)
    }

    /// Dispatches batches for fire-times earlier today that passed while
    /// the coordinator was not running. At most one batch per target: the
    /// latest missed fire-time stands in for all of them.
    async fn catchup(&self) {
        let now = Utc::now();
        let targets = match self.targets.list().await {
            Ok(targets) => targets,
            Err(err) => {
                error!("Catchup skipped, target directory unavailable: {}", err);
                return;
            }
        };

        for target in targets {
            if !target.enabled || self.is_paused(&target.id) {
                continue;
            }
            let local_now = now.with_timezone(&target.timezone);
            let today = local_now.date_naive();
            let missed = target
                .fire_times
                .iter()
                .filter_map(|fire| {
                    target
                        .timezone
                        .from_local_datetime(&today.and_time(*fire))
                        .earliest()
                })
                .map(|occurrence| occurrence.with_timezone(&Utc))
                .filter(|occurrence| *occurrence <= now)
                .max();

            if let Some(occurrence) = missed {
                info!(
                    "Catchup: target {} missed fire-time at {} today, dispatching one batch",
                    target.id, occurrence
                );
                self.dispatch(target);
            }
        }
    }

    /// Evaluates one tick window and spawns batches for due targets.
    async fn evaluate_window(&self, window_start: DateTime<Utc>, window_end: DateTime<Utc>) {
        let targets = match self.targets.list().await {
            Ok(targets) => targets,
            Err(err) => {
                error!("Tick skipped, target directory unavailable: {}", err);
                return;
            }
        };

        for target in targets {
            if !target.enabled {
                debug!("Target {} disabled, skipping", target.id);
                continue;
            }
            if self.is_paused(&target.id) {
                debug!("Target {} paused, skipping", target.id);
                continue;
            }
            if !fire_time_due(&target, window_start, window_end) {
                continue;
            }
            self.dispatch(target);
        }
    }

    /// Marks a target running and spawns its batch. A target whose previous
    /// batch is still running skips the slot entirely rather than queuing.
    fn dispatch(&self, target: ProductionTarget) {
        if !self.try_mark_running(&target.id) {
            warn!(
                "Previous batch still running for target {}, skipping this fire-time",
                target.id
            );
            return;
        }
        let coordinator = self.clone();
        tokio::spawn(async move {
            coordinator.run_batch(target).await;
        });
    }

    /// Runs one batch: N work items dispatched in backlog order with bounded
    /// parallelism. Clears the running mark when every item has settled.
    async fn run_batch(&self, target: ProductionTarget) -> BatchSummary {
        let started_at = Utc::now();
        info!(
            "Batch start: target {} ({} items, auto-publish: {})",
            target.id, target.batch_size, target.auto_publish
        );

        // Top the backlog up front so claims rarely hit an empty category
        // mid-dispatch.
        for category in &target.categories {
            if let Err(err) = self.supply.ensure_backlog(&target, category).await {
                warn!(
                    "Backlog top-up failed for target {} category {:?}: {}",
                    target.id, category, err
                );
            }
        }

        let batch_limiter = Arc::new(Semaphore::new(self.config.batch_parallelism()));
        let mut join_set: JoinSet<RunRecord> = JoinSet::new();
        let mut dispatched = 0usize;
        let mut failed = 0usize;
        let mut succeeded = 0usize;

        for slot in 0..target.batch_size {
            if self.shutdown.load(Ordering::SeqCst) {
                info!(
                    "Batch for target {} stopping early at item {} (shutdown requested)",
                    target.id, slot
                );
                break;
            }
            if !self.target_still_enabled(&target.id).await {
                info!(
                    "Batch for target {} stopping early at item {} (target disabled)",
                    target.id, slot
                );
                break;
            }

            let pick = match self.rotation.begin_pick(&target).await {
                Ok(pick) => pick,
                Err(RotationError::Configuration(err)) => {
                    error!(
                        "Batch for target {} aborted: configuration error: {}",
                        target.id, err
                    );
                    failed += 1;
                    break;
                }
                Err(RotationError::Storage(err)) => {
                    error!(
                        "Batch for target {} aborted: rotation history unavailable: {}",
                        target.id, err
                    );
                    failed += 1;
                    break;
                }
            };

            let topic = match self.supply.next_topic(&target, &pick.category).await {
                Ok(topic) => topic,
                Err(err) => {
                    warn!(
                        "Dispatch failed for target {} category {:?}: {}",
                        target.id, pick.category, err
                    );
                    self.record_dispatch_failure(&target.id, &pick, &err).await;
                    self.rotation.complete_pick(&target.id, &pick).await;
                    failed += 1;
                    continue;
                }
            };

            let item = WorkItem::new(
                target.id.clone(),
                topic,
                pick.category.clone(),
                pick.author.clone(),
            );
            let global_permit = match self.limiter.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let batch_permit = match batch_limiter.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            dispatched += 1;
            let coordinator = self.clone();
            let target_clone = target.clone();
            let pick_clone = pick.clone();
            join_set.spawn(async move {
                let _global = global_permit;
                let _batch = batch_permit;
                let record = coordinator.executor.run(&target_clone, item).await;
                coordinator
                    .rotation
                    .complete_pick(&target_clone.id, &pick_clone)
                    .await;
                record
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(record) => {
                    if record.final_status.is_success() {
                        succeeded += 1;
                    } else {
                        failed += 1;
                    }
                }
                Err(err) => {
                    error!("Batch task for target {} panicked: {}", target.id, err);
                    failed += 1;
                }
            }
        }

        self.clear_running(&target.id);
        self.track_batch_outcome(&target.id, succeeded, failed);

        let summary = BatchSummary {
            target_id: target.id.clone(),
            dispatched,
            succeeded,
            failed,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            "Batch complete: target {} ({} dispatched, {} succeeded, {} failed, {}s)",
            summary.target_id,
            summary.dispatched,
            summary.succeeded,
            summary.failed,
            summary.duration().num_seconds()
        );
        summary
    }

    /// Writes a failed run record for a dispatch that never obtained a
    /// topic, so the attempt is queryable like any other outcome.
    async fn record_dispatch_failure(&self, target_id: &str, pick: &Pick, err: &SupplyError) {
        let kind = match err {
            SupplyError::NoTopicsAvailable { .. } => FailureKind::NoTopics,
            SupplyError::Backend(_) => FailureKind::Backend,
            SupplyError::Storage(_) => FailureKind::Storage,
            SupplyError::DuplicateTopic { .. } => FailureKind::Validation,
        };
        let now = Utc::now();
        let record = RunRecord {
            work_item_id: Uuid::new_v4(),
            target_id: target_id.to_string(),
            category: pick.category.clone(),
            author: pick.author.clone(),
            transitions: vec![StageTransition::new(
                Stage::TopicClaim,
                1,
                StageOutcome::Failed,
                Some(err.to_string()),
            )],
            final_status: FinalStatus::Failed {
                stage: Stage::TopicClaim,
                kind,
                reason: err.to_string(),
            },
            notes: vec![],
            started_at: now,
            finished_at: now,
        };
        if let Err(ledger_err) = self.ledger.record_outcome(record).await {
            error!(
                "Failed to record dispatch failure for target {}: {}",
                target_id, ledger_err
            );
        }
    }

    /// Advances the consecutive-failure counter and auto-pauses a target
    /// whose batches keep failing completely.
    fn track_batch_outcome(&self, target_id: &str, succeeded: usize, failed: usize) {
        if succeeded > 0 {
            if let Ok(mut failures) = self.failures.lock() {
                failures.remove(target_id);
            }
            return;
        }
        if failed == 0 {
            return;
        }

        let mut should_pause = false;
        if let Ok(mut failures) = self.failures.lock() {
            let count = failures.entry(target_id.to_string()).or_insert(0);
            *count += 1;
            if *count >= self.config.max_consecutive_failures() {
                should_pause = true;
            }
        }
        if should_pause {
            if let Ok(mut paused) = self.paused.lock() {
                paused.insert(target_id.to_string());
            }
            error!(
                "Target {} auto-paused after {} completely failed batches",
                target_id,
                self.config.max_consecutive_failures()
            );
        }
    }

    async fn target_still_enabled(&self, target_id: &str) -> bool {
        match self.targets.get(target_id).await {
            Ok(target) => target.enabled,
            Err(err) => {
                warn!("Could not re-read target {}: {}", target_id, err);
                false
            }
        }
    }

    fn is_paused(&self, target_id: &str) -> bool {
        self.paused
            .lock()
            .map(|paused| paused.contains(target_id))
            .unwrap_or(false)
    }

    fn try_mark_running(&self, target_id: &str) -> bool {
        self.running
            .lock()
            .map(|mut running| running.insert(target_id.to_string()))
            .unwrap_or(false)
    }

    fn clear_running(&self, target_id: &str) {
        if let Ok(mut running) = self.running.lock() {
            running.remove(target_id);
        }
    }
}

/// Whether one of the target's fire-times falls inside `(window_start,
/// window_end]`, resolved in the target's timezone.
///
/// The window can cross a local midnight, so both local dates are checked.
/// An ambiguous local time (autumn DST overlap) resolves to its earliest
/// occurrence; a nonexistent one (spring gap) is skipped for that day.
pub(crate) fn fire_time_due(
    target: &ProductionTarget,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> bool {
    if window_end <= window_start {
        return false;
    }

    let tz = target.timezone;
    let start_date = window_start.with_timezone(&tz).date_naive();
    let end_date = window_end.with_timezone(&tz).date_naive();

    let mut date = start_date;
    loop {
        for fire in &target.fire_times {
            if let Some(occurrence) = tz.from_local_datetime(&date.and_time(*fire)).earliest() {
                let occurrence = occurrence.with_timezone(&Utc);
                if window_start < occurrence && occurrence <= window_end {
                    return true;
                }
            }
        }
        if date >= end_date {
            break;
        }
        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    false
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multi-user test queue orchestrator.
//!
//! Maintains one FIFO per device, ordered by (priority desc, submitted
//! asc). An item is dispatched only when it is at the head of every queue
//! it sits in and its whole device set is idle; with split execution opted
//! in, the idle subset runs immediately and a clone covers the rest. All
//! queue mutations happen inside a single critical section; dispatch and
//! the completion callback run outside it.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use dl_core::{
    ClientId, Clock, DeviceId, DeviceQueueStatus, Event, ExecutionId, IdGen, QueueId, QueueItem,
    QueueState, QueueStatusEntry, ReportId, ReportStats, TestReport, TestRequest, TestRunStatus,
    UuidIdGen,
};
use dl_driver::{AutomationDriver, TemplateMatcher};
use dl_storage::{collections, DocumentStore};

use crate::error::EngineError;
use crate::events::EventSink;
use crate::executor::TestExecutor;

/// Completed-run durations kept for wait estimation.
const DURATION_HISTORY_CAP: usize = 50;

/// Answer to a submission.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub queue_id: QueueId,
    pub state: QueueState,
    /// Worst-case position across the requested devices (0 = next/running).
    pub position: usize,
    pub estimated_wait_ms: Option<u64>,
}

struct SplitGroup {
    remaining_parts: usize,
    reports: Vec<TestReport>,
}

#[derive(Default)]
struct QueueMap {
    /// All non-terminal items.
    items: HashMap<QueueId, QueueItem>,
    device_queues: HashMap<DeviceId, Vec<QueueId>>,
    device_busy: HashMap<DeviceId, QueueId>,
    user_index: HashMap<ClientId, HashSet<QueueId>>,
    durations: VecDeque<u64>,
    split_groups: HashMap<QueueId, SplitGroup>,
}

impl QueueMap {
    fn position_of(&self, item: &QueueItem) -> usize {
        item.device_ids
            .iter()
            .map(|device_id| {
                let in_queue = self
                    .device_queues
                    .get(device_id)
                    .and_then(|q| q.iter().position(|id| id == &item.queue_id))
                    .unwrap_or(0);
                let busy_penalty = usize::from(self.device_busy.contains_key(device_id));
                in_queue + busy_penalty
            })
            .max()
            .unwrap_or(0)
    }

    fn avg_duration_ms(&self) -> Option<u64> {
        if self.durations.is_empty() {
            return None;
        }
        Some(self.durations.iter().sum::<u64>() / self.durations.len() as u64)
    }

    fn estimated_wait_ms(&self, item: &QueueItem) -> Option<u64> {
        let avg = self.avg_duration_ms()?;
        Some(self.position_of(item) as u64 * avg)
    }

    /// Insert sorted by (priority desc, submitted asc); stable for ties.
    fn enqueue(&mut self, device_id: &DeviceId, item: &QueueItem) {
        let at = match self.device_queues.get(device_id) {
            Some(queue) => queue
                .iter()
                .position(|id| {
                    self.items
                        .get(id)
                        .is_some_and(|other| other.priority < item.priority)
                })
                .unwrap_or(queue.len()),
            None => 0,
        };
        self.device_queues
            .entry(device_id.clone())
            .or_default()
            .insert(at, item.queue_id.clone());
    }

    fn remove_from_queues(&mut self, item: &QueueItem) {
        for device_id in &item.device_ids {
            if let Some(queue) = self.device_queues.get_mut(device_id) {
                queue.retain(|id| id != &item.queue_id);
            }
        }
    }

    /// Devices on which the item is at the queue head and the device idle.
    fn ready_devices(&self, item: &QueueItem) -> Vec<DeviceId> {
        item.device_ids
            .iter()
            .filter(|device_id| {
                !self.device_busy.contains_key(*device_id)
                    && self
                        .device_queues
                        .get(*device_id)
                        .and_then(|q| q.first())
                        == Some(&item.queue_id)
            })
            .cloned()
            .collect()
    }
}

struct DispatchJob {
    execution_id: ExecutionId,
    queue_id: QueueId,
    request: TestRequest,
}

/// Admits submissions from many users and hands runs to the executor.
pub struct QueueOrchestrator<D: AutomationDriver, M: TemplateMatcher, C: Clock> {
    executor: Arc<TestExecutor<D, M, C>>,
    store: DocumentStore,
    sink: EventSink,
    clock: C,
    idgen: UuidIdGen,
    state: Mutex<QueueMap>,
}

impl<D, M, C> QueueOrchestrator<D, M, C>
where
    D: AutomationDriver,
    M: TemplateMatcher,
    C: Clock,
{
    pub fn new(
        executor: Arc<TestExecutor<D, M, C>>,
        store: DocumentStore,
        sink: EventSink,
        clock: C,
    ) -> Self {
        Self {
            executor,
            store,
            sink,
            clock,
            idgen: UuidIdGen,
            state: Mutex::new(QueueMap::default()),
        }
    }

    /// Admit a submission. Validation failures never enter the queue.
    pub fn submit_test(
        self: &Arc<Self>,
        request: TestRequest,
        socket_id: ClientId,
    ) -> Result<SubmitOutcome, EngineError> {
        if request.device_ids.is_empty() {
            return Err(EngineError::InvalidRequest("no devices requested".into()));
        }
        if request.scenario_ids.is_empty() {
            return Err(EngineError::InvalidRequest("no scenarios requested".into()));
        }
        for device_id in &request.device_ids {
            DeviceId::parse(device_id.as_str())
                .map_err(|e| EngineError::InvalidRequest(e.to_string()))?;
        }

        let queue_id = QueueId::new(self.idgen.next());
        let item = QueueItem {
            queue_id: queue_id.clone(),
            user_name: request.user_name.clone(),
            socket_id: socket_id.clone(),
            device_ids: request.device_ids.clone(),
            scenario_ids: request.scenario_ids.clone(),
            repeat_count: request.repeat_count,
            scenario_interval_ms: request.scenario_interval_ms,
            priority: request.priority,
            test_name: request.test_name.clone(),
            submitted_at_ms: self.clock.epoch_ms(),
            state: QueueState::Queued,
            split_execution: request.split_execution,
            split_parent: None,
        };

        let position = {
            let mut state = self.state.lock();
            for device_id in &item.device_ids {
                state.enqueue(device_id, &item);
            }
            state
                .user_index
                .entry(socket_id)
                .or_default()
                .insert(queue_id.clone());
            state.items.insert(queue_id.clone(), item.clone());
            state.position_of(&item)
        };

        self.sink.emit(Event::QueueSubmitted {
            queue_id: queue_id.clone(),
            user_name: item.user_name.clone(),
            state: QueueState::Queued,
            position,
            estimated_wait_ms: self.state.lock().estimated_wait_ms(&item),
        });

        self.try_assign();

        let state = self.state.lock();
        let (current_state, position, estimate) = match state.items.get(&queue_id) {
            Some(item) => (
                item.state,
                state.position_of(item),
                state.estimated_wait_ms(item),
            ),
            // Already dispatched and settled before we re-read
            None => (QueueState::Running, 0, None),
        };
        Ok(SubmitOutcome {
            queue_id,
            state: current_state,
            position,
            estimated_wait_ms: estimate,
        })
    }

    /// Assignment step: dispatch every item whose device set can run now.
    fn try_assign(self: &Arc<Self>) {
        let jobs = {
            let mut state = self.state.lock();
            let mut jobs = Vec::new();
            loop {
                let Some(job) = self.assign_one(&mut state) else {
                    break;
                };
                jobs.push(job);
            }
            jobs
        };
        self.emit_positions();
        for job in jobs {
            self.spawn_dispatch(job);
        }
    }

    /// Pick one dispatchable item, mutate queue state, and describe the job.
    fn assign_one(&self, state: &mut QueueMap) -> Option<DispatchJob> {
        // Head candidates across all device queues
        let candidates: Vec<QueueId> = {
            let mut seen = HashSet::new();
            state
                .device_queues
                .values()
                .filter_map(|q| q.first())
                .filter(|id| seen.insert((*id).clone()))
                .cloned()
                .collect()
        };

        for queue_id in candidates {
            let Some(item) = state.items.get(&queue_id).cloned() else {
                continue;
            };
            if item.state != QueueState::Queued {
                continue;
            }
            let ready = state.ready_devices(&item);
            if ready.len() == item.device_ids.len() {
                // Whole set idle: atomic full assignment
                for device_id in &item.device_ids {
                    state.device_busy.insert(device_id.clone(), queue_id.clone());
                }
                state.remove_from_queues(&item);
                if let Some(stored) = state.items.get_mut(&queue_id) {
                    stored.transition(QueueState::Running);
                }
                self.sink.emit(Event::QueueAssigned {
                    queue_id: queue_id.clone(),
                    execution_id: ExecutionId::new(queue_id.as_str()),
                    device_ids: item.device_ids.clone(),
                });
                return Some(DispatchJob {
                    execution_id: ExecutionId::new(queue_id.as_str()),
                    queue_id: queue_id.clone(),
                    request: request_for(&item, &item.device_ids),
                });
            }

            if item.split_execution && !ready.is_empty() {
                return Some(self.split_assign(state, &item, ready));
            }
        }
        None
    }

    /// Split policy: run the idle subset now, requeue a clone for the rest.
    fn split_assign(
        &self,
        state: &mut QueueMap,
        item: &QueueItem,
        ready: Vec<DeviceId>,
    ) -> DispatchJob {
        let group_key = item
            .split_parent
            .clone()
            .unwrap_or_else(|| item.queue_id.clone());
        let remainder: Vec<DeviceId> = item
            .device_ids
            .iter()
            .filter(|d| !ready.contains(d))
            .cloned()
            .collect();

        state.remove_from_queues(item);
        for device_id in &ready {
            state
                .device_busy
                .insert(device_id.clone(), item.queue_id.clone());
        }
        if let Some(stored) = state.items.get_mut(&item.queue_id) {
            stored.transition(QueueState::Split);
            stored.device_ids = ready.clone();
            stored.split_parent = Some(group_key.clone());
        }

        // Clone covering the remainder goes to the tail of its queues
        let clone_id = QueueId::new(self.idgen.next());
        let mut clone = item.clone();
        clone.queue_id = clone_id.clone();
        clone.device_ids = remainder;
        clone.state = QueueState::Queued;
        clone.split_execution = true;
        clone.split_parent = Some(group_key.clone());
        clone.submitted_at_ms = self.clock.epoch_ms();
        for device_id in &clone.device_ids {
            state.enqueue(device_id, &clone);
        }
        state
            .user_index
            .entry(clone.socket_id.clone())
            .or_default()
            .insert(clone_id.clone());
        state.items.insert(clone_id, clone);

        // One part became two
        let group = state
            .split_groups
            .entry(group_key.clone())
            .or_insert(SplitGroup {
                remaining_parts: 1,
                reports: Vec::new(),
            });
        group.remaining_parts += 1;

        tracing::info!(
            queue_id = %item.queue_id,
            group = %group_key,
            ready = ready.len(),
            "split execution: dispatching idle subset"
        );
        self.sink.emit(Event::QueueAssigned {
            queue_id: item.queue_id.clone(),
            execution_id: ExecutionId::new(item.queue_id.as_str()),
            device_ids: ready.clone(),
        });
        DispatchJob {
            execution_id: ExecutionId::new(item.queue_id.as_str()),
            queue_id: item.queue_id.clone(),
            request: request_for(item, &ready),
        }
    }

    fn spawn_dispatch(self: &Arc<Self>, job: DispatchJob) {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let result = orchestrator
                .executor
                .execute(job.execution_id, job.request)
                .await;
            orchestrator.on_run_complete(&job.queue_id, result);
        });
    }

    /// Completion callback: free devices, settle the item, re-assign.
    fn on_run_complete(self: &Arc<Self>, queue_id: &QueueId, result: Result<TestReport, EngineError>) {
        let merged = {
            let mut state = self.state.lock();
            state
                .device_busy
                .retain(|_, running| running != queue_id);

            let Some(item) = state.items.get(queue_id).cloned() else {
                tracing::warn!(queue_id = %queue_id, "completion for unknown queue item");
                return;
            };

            let terminal = match &result {
                Ok(report) => {
                    let duration = report.finished_at_ms.saturating_sub(report.started_at_ms);
                    state.durations.push_back(duration);
                    while state.durations.len() > DURATION_HISTORY_CAP {
                        state.durations.pop_front();
                    }
                    match report.status {
                        TestRunStatus::Completed | TestRunStatus::Partial => QueueState::Completed,
                        TestRunStatus::Failed => QueueState::Failed,
                        TestRunStatus::Stopped => QueueState::Cancelled,
                    }
                }
                Err(e) => {
                    tracing::warn!(queue_id = %queue_id, error = %e, "run failed to start");
                    self.sink.emit(Event::Error {
                        message: e.to_string(),
                        context: Some(queue_id.to_string()),
                    });
                    QueueState::Failed
                }
            };

            self.settle(&mut state, &item, terminal, result.ok())
        };

        if let Some(report) = merged {
            if let Err(e) =
                self.store
                    .put(collections::TEST_REPORTS, report.report_id.as_str(), &report)
            {
                tracing::warn!(error = %e, report = %report.report_id, "merged report persist failed");
            }
        }
        self.try_assign();
    }

    /// Remove a finished item and update its split group. Returns the
    /// merged report when the last part of a split settled.
    fn settle(
        &self,
        state: &mut QueueMap,
        item: &QueueItem,
        terminal: QueueState,
        report: Option<TestReport>,
    ) -> Option<TestReport> {
        state.items.remove(&item.queue_id);
        if let Some(ids) = state.user_index.get_mut(&item.socket_id) {
            ids.remove(&item.queue_id);
        }
        tracing::info!(queue_id = %item.queue_id, state = %terminal, "queue item settled");

        let group_key = item.split_parent.as_ref()?;
        let group = state.split_groups.get_mut(group_key)?;
        if let Some(report) = report {
            group.reports.push(report);
        }
        group.remaining_parts = group.remaining_parts.saturating_sub(1);
        if group.remaining_parts > 0 {
            return None;
        }
        let group = state.split_groups.remove(group_key)?;
        Some(merge_reports(group_key, group.reports))
    }

    /// Only the submitting client may cancel. Queued items leave the queue
    /// immediately; running items get a cooperative stop; settled items are
    /// a diagnostic no-op.
    pub fn cancel_test(
        self: &Arc<Self>,
        queue_id: &QueueId,
        socket_id: &ClientId,
    ) -> Result<(bool, String), EngineError> {
        let response = {
            let mut state = self.state.lock();
            let Some(item) = state.items.get(queue_id).cloned() else {
                let response = (false, format!("queue item {queue_id} not found or already finished"));
                self.emit_cancel_response(queue_id, &response);
                return Ok(response);
            };
            if &item.socket_id != socket_id {
                return Err(EngineError::OwnerMismatch(queue_id.clone()));
            }
            match item.state {
                QueueState::Queued => {
                    let merged = self.cancel_queued(&mut state, &item);
                    drop(state);
                    self.persist_merged(merged);
                    (true, "cancelled".to_string())
                }
                QueueState::Running | QueueState::Split => {
                    drop(state);
                    let stopping = self.executor.stop(&ExecutionId::new(queue_id.as_str()));
                    if stopping {
                        (true, "stopping".to_string())
                    } else {
                        (false, "execution is not stoppable".to_string())
                    }
                }
                other => (false, format!("queue item is already {other}")),
            }
        };
        self.emit_cancel_response(queue_id, &response);
        self.try_assign();
        Ok(response)
    }

    fn emit_cancel_response(&self, queue_id: &QueueId, response: &(bool, String)) {
        self.sink.emit(Event::QueueCancelResponse {
            queue_id: queue_id.clone(),
            success: response.0,
            message: response.1.clone(),
        });
    }

    fn cancel_queued(&self, state: &mut QueueMap, item: &QueueItem) -> Option<TestReport> {
        state.remove_from_queues(item);
        if let Some(stored) = state.items.get_mut(&item.queue_id) {
            stored.transition(QueueState::Cancelled);
        }
        self.settle(state, item, QueueState::Cancelled, None)
    }

    fn persist_merged(&self, merged: Option<TestReport>) {
        let Some(report) = merged else {
            return;
        };
        if let Err(e) = self
            .store
            .put(collections::TEST_REPORTS, report.report_id.as_str(), &report)
        {
            tracing::warn!(error = %e, report = %report.report_id, "merged report persist failed");
        }
    }

    /// Cancel every queued item of a disconnected client; running items
    /// finish on their own.
    pub fn handle_socket_disconnect(self: &Arc<Self>, socket_id: &ClientId) {
        {
            let mut state = self.state.lock();
            let queued: Vec<QueueItem> = state
                .user_index
                .get(socket_id)
                .map(|ids| {
                    ids.iter()
                        .filter_map(|id| state.items.get(id))
                        .filter(|item| item.state == QueueState::Queued)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            let mut merged = Vec::new();
            for item in queued {
                tracing::info!(queue_id = %item.queue_id, "cancelling queued item on disconnect");
                merged.push(self.cancel_queued(&mut state, &item));
            }
            state.user_index.remove(socket_id);
            drop(state);
            for report in merged {
                self.persist_merged(report);
            }
        }
        self.try_assign();
    }

    /// Queue introspection: items (optionally one user's) plus per-device
    /// contention.
    pub fn queue_status(
        &self,
        user_name: Option<&str>,
    ) -> (Vec<QueueStatusEntry>, Vec<DeviceQueueStatus>) {
        let state = self.state.lock();
        let mut entries: Vec<QueueStatusEntry> = state
            .items
            .values()
            .filter(|item| user_name.is_none_or(|u| item.user_name == u))
            .map(|item| QueueStatusEntry {
                queue_id: item.queue_id.clone(),
                user_name: item.user_name.clone(),
                state: item.state,
                priority: item.priority,
                device_ids: item.device_ids.clone(),
                submitted_at_ms: item.submitted_at_ms,
                position: state.position_of(item),
                estimated_wait_ms: state.estimated_wait_ms(item),
            })
            .collect();
        entries.sort_by_key(|e| e.submitted_at_ms);

        let mut device_ids: Vec<DeviceId> = state
            .device_queues
            .keys()
            .chain(state.device_busy.keys())
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        device_ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        let device_statuses = device_ids
            .into_iter()
            .map(|device_id| DeviceQueueStatus {
                busy: state.device_busy.contains_key(&device_id),
                running_queue_id: state.device_busy.get(&device_id).cloned(),
                waiting: state
                    .device_queues
                    .get(&device_id)
                    .map(Vec::len)
                    .unwrap_or(0),
                device_id,
            })
            .collect();
        (entries, device_statuses)
    }

    /// Emit a position event for every still-queued item.
    fn emit_positions(&self) {
        let state = self.state.lock();
        for item in state.items.values() {
            if item.state != QueueState::Queued {
                continue;
            }
            for device_id in &item.device_ids {
                let Some(position) = state
                    .device_queues
                    .get(device_id)
                    .and_then(|q| q.iter().position(|id| id == &item.queue_id))
                else {
                    continue;
                };
                self.sink.emit(Event::QueuePosition {
                    queue_id: item.queue_id.clone(),
                    device_id: device_id.clone(),
                    position,
                });
            }
        }
    }

    /// A device is busy iff it belongs to exactly one running item.
    pub fn is_device_busy(&self, device_id: &DeviceId) -> bool {
        self.state.lock().device_busy.contains_key(device_id)
    }
}

/// Rebuild the executor request for (a subset of) an item's devices.
fn request_for(item: &QueueItem, devices: &[DeviceId]) -> TestRequest {
    TestRequest {
        device_ids: devices.to_vec(),
        scenario_ids: item.scenario_ids.clone(),
        repeat_count: item.repeat_count,
        scenario_interval_ms: item.scenario_interval_ms,
        user_name: item.user_name.clone(),
        priority: item.priority,
        test_name: item.test_name.clone(),
        split_execution: false,
    }
}

/// Consolidate the parts of a split run into one report under the parent id.
fn merge_reports(parent: &QueueId, mut reports: Vec<TestReport>) -> TestReport {
    reports.sort_by_key(|r| r.started_at_ms);
    let mut summaries = Vec::new();
    let mut device_ids = Vec::new();
    let mut started_at_ms = u64::MAX;
    let mut finished_at_ms = 0;
    let mut statuses = Vec::new();
    let mut user_name = String::new();
    let mut test_name = None;
    for report in reports {
        started_at_ms = started_at_ms.min(report.started_at_ms);
        finished_at_ms = finished_at_ms.max(report.finished_at_ms);
        statuses.push(report.status);
        device_ids.extend(report.device_ids);
        summaries.extend(report.summaries);
        user_name = report.user_name;
        test_name = report.test_name.or(test_name);
    }
    let all_results: Vec<_> = summaries
        .iter()
        .flat_map(|s| s.device_results.iter().cloned())
        .collect();
    let stats = ReportStats::from_results(&all_results);
    let status = if statuses.iter().any(|s| *s == TestRunStatus::Stopped) {
        TestRunStatus::Stopped
    } else if stats.failed == 0 {
        TestRunStatus::Completed
    } else if stats.passed == 0 {
        TestRunStatus::Failed
    } else {
        TestRunStatus::Partial
    };
    TestReport {
        report_id: ReportId::new(format!("tr-split-{parent}")),
        execution_id: ExecutionId::new(parent.as_str()),
        test_name,
        user_name,
        status,
        device_ids,
        summaries,
        stats,
        started_at_ms: if started_at_ms == u64::MAX { 0 } else { started_at_ms },
        finished_at_ms,
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test executor: one submitted test, many devices, sequenced scenarios.
//!
//! Each device independently walks the same scenario queue (scenarios ×
//! repeats, in order). A failed scenario halts that device's sequence and
//! never touches the others. Multiple executions may run concurrently as
//! long as their device sets are disjoint; the queue orchestrator enforces
//! the disjointness.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

use dl_core::{
    Clock, DeviceId, DeviceProgress, DeviceScenarioResult, Event, ExecutionId, ReportId,
    ScenarioExecutionSummary, ScenarioId, StopSignal, TestReport, TestRequest, TestRunStatus,
    ReportStats,
};
use dl_driver::{AutomationDriver, TemplateMatcher};
use dl_scenario::Scenario;
use dl_storage::{collections, DocumentStore, PackageDoc};

use crate::error::EngineError;
use crate::events::EventSink;
use crate::interpreter::{CaptureOptions, RunParams, ScenarioRunner};
use crate::registry::SessionRegistry;

/// Granularity of the inter-scenario pause, so stops stay responsive.
const PAUSE_SLICE_MS: u64 = 250;

/// One entry of the per-device scenario queue.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PlannedScenario {
    pub scenario_id: ScenarioId,
    pub scenario_name: String,
    pub package_id: Option<String>,
    pub package_name: Option<String>,
    pub app_package: Option<String>,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    /// Position within one repeat pass.
    pub order: usize,
    /// 1-based repeat pass this entry belongs to.
    pub repeat_index: u32,
}

/// Aggregate status answer for `get_status`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExecutionStatus {
    pub execution_id: ExecutionId,
    pub completed: usize,
    pub total: usize,
    pub percentage: u8,
    /// A scenario currently running on any one active device.
    pub current_scenario: Option<ScenarioId>,
    pub per_device: Vec<DeviceProgress>,
}

struct ExecutionState {
    execution_id: ExecutionId,
    stop: StopSignal,
    total: usize,
    progress: Mutex<HashMap<DeviceId, DeviceProgress>>,
}

impl ExecutionState {
    fn snapshot(&self) -> (usize, Vec<DeviceProgress>) {
        let progress = self.progress.lock();
        let completed = progress.values().map(|p| p.completed).sum();
        let mut per_device: Vec<DeviceProgress> = progress.values().cloned().collect();
        per_device.sort_by(|a, b| a.device_id.as_str().cmp(b.device_id.as_str()));
        (completed, per_device)
    }
}

/// Runs sequenced test submissions.
pub struct TestExecutor<D: AutomationDriver, M: TemplateMatcher, C: Clock> {
    registry: Arc<SessionRegistry<D, C>>,
    runner: ScenarioRunner<D, M, C>,
    store: DocumentStore,
    sink: EventSink,
    clock: C,
    executions: Mutex<HashMap<ExecutionId, Arc<ExecutionState>>>,
    current: Mutex<Option<ExecutionId>>,
}

impl<D, M, C> TestExecutor<D, M, C>
where
    D: AutomationDriver,
    M: TemplateMatcher,
    C: Clock,
{
    pub fn new(
        registry: Arc<SessionRegistry<D, C>>,
        runner: ScenarioRunner<D, M, C>,
        store: DocumentStore,
        sink: EventSink,
        clock: C,
    ) -> Self {
        Self {
            registry,
            runner,
            store,
            sink,
            clock,
            executions: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
        }
    }

    /// Run one submission to completion and persist its report.
    pub async fn execute(
        self: &Arc<Self>,
        execution_id: ExecutionId,
        request: TestRequest,
    ) -> Result<TestReport, EngineError> {
        if request.device_ids.is_empty() {
            return Err(EngineError::InvalidRequest("no devices requested".into()));
        }
        if request.scenario_ids.is_empty() {
            return Err(EngineError::InvalidRequest("no scenarios requested".into()));
        }

        self.sink.emit(Event::TestPreparing {
            execution_id: execution_id.clone(),
        });

        // Preflight: resolve scenario documents and their package/category
        // metadata; scenarios that fail to resolve are skipped, not fatal.
        let (plan, skipped) = self.build_plan(&request)?;
        if !skipped.is_empty() {
            self.sink.emit(Event::TestScenariosSkipped {
                execution_id: execution_id.clone(),
                scenario_ids: skipped.clone(),
            });
        }
        if plan.is_empty() {
            return Err(EngineError::NoScenarios);
        }
        let plan = Arc::new(plan);

        // Session validation: only devices with a live session proceed
        self.sink.emit(Event::TestSessionValidating {
            execution_id: execution_id.clone(),
            device_ids: request.device_ids.clone(),
        });
        let outcome = self.registry.validate_and_ensure(&request.device_ids).await;
        if !outcome.recreated.is_empty() {
            self.sink.emit(Event::TestSessionRecreated {
                execution_id: execution_id.clone(),
                device_ids: outcome.recreated.clone(),
            });
        }
        if !outcome.failed.is_empty() {
            self.sink.emit(Event::TestSessionFailed {
                execution_id: execution_id.clone(),
                device_ids: outcome.failed.clone(),
            });
        }
        let devices = outcome.usable();
        if devices.is_empty() {
            return Err(EngineError::NoValidDevices(
                "no sessions could be established".into(),
            ));
        }

        let started_at = self.clock.epoch_ms();
        let report_id = ReportId::test(started_at);
        let state = Arc::new(ExecutionState {
            execution_id: execution_id.clone(),
            stop: StopSignal::new(),
            total: plan.len() * devices.len(),
            progress: Mutex::new(
                devices
                    .iter()
                    .map(|d| {
                        (
                            d.clone(),
                            DeviceProgress {
                                device_id: d.clone(),
                                completed: 0,
                                total: plan.len(),
                                current_scenario: None,
                                failed: false,
                            },
                        )
                    })
                    .collect(),
            ),
        });
        self.register(Arc::clone(&state));

        self.sink.emit(Event::TestStart {
            execution_id: execution_id.clone(),
            device_ids: devices.clone(),
            total_scenarios: plan.len(),
        });

        // Per-device workers, mutually independent
        let mut join_set = JoinSet::new();
        for device_id in devices.clone() {
            let executor = Arc::clone(self);
            let state = Arc::clone(&state);
            let plan = Arc::clone(&plan);
            let report_id = report_id.clone();
            let interval_ms = request.scenario_interval_ms;
            join_set.spawn(async move {
                let results = executor
                    .device_run(&state, &plan, &device_id, &report_id, interval_ms)
                    .await;
                (device_id, results)
            });
        }

        let mut by_device: HashMap<DeviceId, Vec<(usize, DeviceScenarioResult)>> = HashMap::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((device_id, results)) => {
                    by_device.insert(device_id, results);
                }
                Err(e) => tracing::error!(error = %e, "device worker panicked"),
            }
        }

        let report = self.aggregate(
            &execution_id,
            &report_id,
            &request,
            &devices,
            &plan,
            by_device,
            &state,
            started_at,
        );

        // Persistence failures never fail the run itself
        if let Err(e) = self
            .store
            .put(collections::TEST_REPORTS, report.report_id.as_str(), &report)
        {
            tracing::warn!(error = %e, report = %report.report_id, "test report persist failed");
        }

        self.sink.emit(Event::TestComplete {
            execution_id: execution_id.clone(),
            status: report.status,
            report_id: Some(report.report_id.clone()),
        });

        self.unregister(&execution_id);
        Ok(report)
    }

    /// Build the ordered scenario queue: repeats × scenarios, with package
    /// and category resolved through per-call caches.
    fn build_plan(
        &self,
        request: &TestRequest,
    ) -> Result<(Vec<(PlannedScenario, Scenario)>, Vec<ScenarioId>), EngineError> {
        let mut scenario_cache: HashMap<ScenarioId, Scenario> = HashMap::new();
        let mut package_cache: HashMap<String, Option<PackageDoc>> = HashMap::new();
        let mut category_cache: HashMap<String, Option<String>> = HashMap::new();
        let mut skipped = Vec::new();

        for scenario_id in &request.scenario_ids {
            if scenario_cache.contains_key(scenario_id) || skipped.contains(scenario_id) {
                continue;
            }
            match self
                .store
                .try_get::<Scenario>(collections::SCENARIOS, scenario_id.as_str())?
            {
                Some(doc) => {
                    scenario_cache.insert(scenario_id.clone(), doc);
                }
                None => {
                    tracing::warn!(scenario = %scenario_id, "scenario not found, skipping");
                    skipped.push(scenario_id.clone());
                }
            }
        }

        let mut plan = Vec::new();
        for repeat_index in 1..=request.repeat_count.max(1) {
            for (order, scenario_id) in request.scenario_ids.iter().enumerate() {
                let Some(scenario) = scenario_cache.get(scenario_id) else {
                    continue;
                };
                let package = scenario.package_id.as_ref().and_then(|pid| {
                    package_cache
                        .entry(pid.clone())
                        .or_insert_with(|| {
                            self.store
                                .try_get::<PackageDoc>(collections::PACKAGES, pid)
                                .ok()
                                .flatten()
                        })
                        .clone()
                });
                let category_id = package.as_ref().and_then(|p| p.category_id.clone());
                let category_name = category_id.as_ref().and_then(|cid| {
                    category_cache
                        .entry(cid.clone())
                        .or_insert_with(|| {
                            self.store
                                .try_get::<dl_storage::CategoryDoc>(collections::CATEGORIES, cid)
                                .ok()
                                .flatten()
                                .map(|c| c.name)
                        })
                        .clone()
                });

                plan.push((
                    PlannedScenario {
                        scenario_id: scenario_id.clone(),
                        scenario_name: scenario.name.clone(),
                        package_id: scenario.package_id.clone(),
                        package_name: package.as_ref().map(|p| p.name.clone()),
                        app_package: package.as_ref().map(|p| p.app_package.clone()),
                        category_id,
                        category_name,
                        order,
                        repeat_index,
                    },
                    scenario.clone(),
                ));
            }
        }
        Ok((plan, skipped))
    }

    /// Walk the scenario queue on one device.
    async fn device_run(
        self: &Arc<Self>,
        state: &Arc<ExecutionState>,
        plan: &Arc<Vec<(PlannedScenario, Scenario)>>,
        device_id: &DeviceId,
        report_id: &ReportId,
        interval_ms: u64,
    ) -> Vec<(usize, DeviceScenarioResult)> {
        let execution_id = state.execution_id.clone();
        self.sink.emit(Event::TestDeviceStart {
            execution_id: execution_id.clone(),
            device_id: device_id.clone(),
        });

        let mut results = Vec::new();
        let mut device_ok = true;

        for (index, (planned, scenario)) in plan.iter().enumerate() {
            if state.stop.is_stopped() {
                break;
            }
            let Some(session) = self.registry.info(device_id) else {
                tracing::warn!(device = %device_id, "session vanished mid-run");
                device_ok = false;
                break;
            };

            self.sink.emit(Event::TestDeviceScenarioStart {
                execution_id: execution_id.clone(),
                device_id: device_id.clone(),
                scenario_id: planned.scenario_id.clone(),
                scenario_name: planned.scenario_name.clone(),
                repeat_index: planned.repeat_index,
                order: planned.order,
            });
            self.set_current_scenario(state, device_id, Some(planned.scenario_id.clone()));

            let result = self
                .runner
                .run(RunParams {
                    scenario,
                    device_id,
                    session_id: session.session_id.as_str(),
                    execution_id: &execution_id,
                    report_id,
                    app_package: planned.app_package.as_deref(),
                    stop: &state.stop,
                    capture: CaptureOptions::default(),
                })
                .await;

            self.sink.emit(Event::TestDeviceScenarioComplete {
                execution_id: execution_id.clone(),
                device_id: device_id.clone(),
                scenario_id: planned.scenario_id.clone(),
                repeat_index: planned.repeat_index,
                success: result.success,
                duration_ms: result.duration_ms,
            });

            let success = result.success;
            results.push((index, result));
            self.bump_progress(state, device_id, !success);

            if !success {
                // A failed scenario halts this device's sequence only
                device_ok = false;
                break;
            }

            let is_last = index + 1 == plan.len();
            if !is_last && interval_ms > 0 {
                self.pause(&state.stop, interval_ms).await;
            }
        }

        self.set_current_scenario(state, device_id, None);
        self.sink.emit(Event::TestDeviceComplete {
            execution_id,
            device_id: device_id.clone(),
            success: device_ok,
        });
        results
    }

    async fn pause(&self, stop: &StopSignal, total_ms: u64) {
        let mut remaining = total_ms;
        while remaining > 0 && !stop.is_stopped() {
            let slice = remaining.min(PAUSE_SLICE_MS);
            tokio::time::sleep(Duration::from_millis(slice)).await;
            remaining -= slice;
        }
    }

    fn set_current_scenario(
        &self,
        state: &ExecutionState,
        device_id: &DeviceId,
        scenario: Option<ScenarioId>,
    ) {
        let mut progress = state.progress.lock();
        if let Some(p) = progress.get_mut(device_id) {
            p.current_scenario = scenario;
        }
    }

    /// Record one finished scenario and emit the recomputed global progress.
    fn bump_progress(&self, state: &ExecutionState, device_id: &DeviceId, failed: bool) {
        {
            let mut progress = state.progress.lock();
            if let Some(p) = progress.get_mut(device_id) {
                p.completed += 1;
                if failed {
                    p.failed = true;
                }
            }
        }
        let (completed, per_device) = state.snapshot();
        let percentage = if state.total == 0 {
            100
        } else {
            ((completed * 100) / state.total) as u8
        };
        self.sink.emit(Event::TestProgress {
            execution_id: state.execution_id.clone(),
            completed,
            total: state.total,
            percentage,
            per_device,
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn aggregate(
        &self,
        execution_id: &ExecutionId,
        report_id: &ReportId,
        request: &TestRequest,
        devices: &[DeviceId],
        plan: &[(PlannedScenario, Scenario)],
        mut by_device: HashMap<DeviceId, Vec<(usize, DeviceScenarioResult)>>,
        state: &ExecutionState,
        started_at: u64,
    ) -> TestReport {
        // Every device that entered execution appears in the report, even
        // when it never ran a scenario.
        for device_id in devices {
            let results = by_device.entry(device_id.clone()).or_default();
            if results.is_empty() {
                if let Some((planned, _)) = plan.first() {
                    results.push((
                        0,
                        DeviceScenarioResult {
                            device_id: device_id.clone(),
                            scenario_id: planned.scenario_id.clone(),
                            scenario_name: planned.scenario_name.clone(),
                            success: false,
                            duration_ms: 0,
                            error: Some("no scenarios ran".to_string()),
                            steps: Vec::new(),
                            screenshots: Vec::new(),
                            video: None,
                        },
                    ));
                }
            }
        }

        let mut summaries = Vec::new();
        for (index, (planned, _)) in plan.iter().enumerate() {
            let mut device_results = Vec::new();
            for device_id in devices {
                if let Some(results) = by_device.get(device_id) {
                    for (i, result) in results {
                        if *i == index {
                            device_results.push(result.clone());
                        }
                    }
                }
            }
            if device_results.is_empty() {
                continue;
            }
            let passed = device_results.iter().filter(|r| r.success).count();
            let failed = device_results.len() - passed;
            summaries.push(ScenarioExecutionSummary {
                scenario_id: planned.scenario_id.clone(),
                scenario_name: planned.scenario_name.clone(),
                repeat_index: planned.repeat_index,
                device_results,
                passed,
                failed,
            });
        }

        let all_results: Vec<DeviceScenarioResult> = summaries
            .iter()
            .flat_map(|s| s.device_results.iter().cloned())
            .collect();
        let stats = ReportStats::from_results(&all_results);

        let status = if state.stop.is_stopped() {
            TestRunStatus::Stopped
        } else if stats.failed == 0 {
            TestRunStatus::Completed
        } else if stats.passed == 0 {
            TestRunStatus::Failed
        } else {
            TestRunStatus::Partial
        };

        TestReport {
            report_id: report_id.clone(),
            execution_id: execution_id.clone(),
            test_name: request.test_name.clone(),
            user_name: request.user_name.clone(),
            status,
            device_ids: devices.to_vec(),
            summaries,
            stats,
            started_at_ms: started_at,
            finished_at_ms: self.clock.epoch_ms(),
        }
    }

    fn register(&self, state: Arc<ExecutionState>) {
        let execution_id = state.execution_id.clone();
        self.executions.lock().insert(execution_id.clone(), state);
        *self.current.lock() = Some(execution_id);
    }

    /// Drop the execution; promote an arbitrary still-active one to
    /// "current" for legacy status queries.
    fn unregister(&self, execution_id: &ExecutionId) {
        let mut executions = self.executions.lock();
        executions.remove(execution_id);
        let mut current = self.current.lock();
        if current.as_ref() == Some(execution_id) {
            *current = executions.keys().next().cloned();
        }
    }

    /// Signal a cooperative stop. Returns false for unknown executions.
    pub fn stop(&self, execution_id: &ExecutionId) -> bool {
        let state = self.executions.lock().get(execution_id).cloned();
        match state {
            Some(state) => {
                state.stop.stop();
                self.sink.emit(Event::TestStopping {
                    execution_id: execution_id.clone(),
                });
                true
            }
            None => false,
        }
    }

    /// Aggregate counts for one execution (or the current one).
    pub fn get_status(&self, execution_id: Option<&ExecutionId>) -> Option<ExecutionStatus> {
        let id = match execution_id {
            Some(id) => id.clone(),
            None => self.current.lock().clone()?,
        };
        let state = self.executions.lock().get(&id).cloned()?;
        let (completed, per_device) = state.snapshot();
        let percentage = if state.total == 0 {
            100
        } else {
            ((completed * 100) / state.total) as u8
        };
        let current_scenario = per_device
            .iter()
            .find_map(|p| p.current_scenario.clone());
        Some(ExecutionStatus {
            execution_id: id,
            completed,
            total: state.total,
            percentage,
            current_scenario,
            per_device,
        })
    }

    /// Number of live executions (for introspection and tests).
    pub fn active_count(&self) -> usize {
        self.executions.lock().len()
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;

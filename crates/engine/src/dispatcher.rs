// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parallel dispatcher: one scenario fanned across many devices.
//!
//! A single dispatcher permits one active parallel run at a time; the
//! pre-allocated report id and the per-device artifact directories share
//! naming, so overlapping runs would collide.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;

use dl_core::{
    Clock, DeviceId, DeviceScenarioResult, Event, ExecutionId, ParallelReport, ReportId,
    ReportStats, ScenarioId, StopSignal,
};
use dl_driver::{AutomationDriver, RecordingOptions, TemplateMatcher};
use dl_scenario::Scenario;
use dl_storage::{collections, ArtifactStore, DocumentStore, PackageDoc};

use crate::error::EngineError;
use crate::events::EventSink;
use crate::interpreter::{CaptureOptions, RunParams, ScenarioRunner};
use crate::registry::SessionRegistry;

/// Options for one parallel run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelOptions {
    pub capture_screenshots: bool,
    pub capture_on_complete: bool,
    pub record_video: bool,
}

/// Fans one scenario across devices and materializes an integrated report.
pub struct ParallelDispatcher<D: AutomationDriver, M: TemplateMatcher, C: Clock> {
    registry: Arc<SessionRegistry<D, C>>,
    runner: ScenarioRunner<D, M, C>,
    store: DocumentStore,
    artifacts: ArtifactStore,
    sink: EventSink,
    clock: C,
    running: AtomicBool,
    stops: Mutex<HashMap<DeviceId, StopSignal>>,
}

impl<D, M, C> ParallelDispatcher<D, M, C>
where
    D: AutomationDriver,
    M: TemplateMatcher,
    C: Clock,
{
    pub fn new(
        registry: Arc<SessionRegistry<D, C>>,
        runner: ScenarioRunner<D, M, C>,
        store: DocumentStore,
        artifacts: ArtifactStore,
        sink: EventSink,
        clock: C,
    ) -> Self {
        Self {
            registry,
            runner,
            store,
            artifacts,
            sink,
            clock,
            running: AtomicBool::new(false),
            stops: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run one scenario across the given devices.
    pub async fn execute_parallel(
        self: &Arc<Self>,
        scenario_id: &ScenarioId,
        device_ids: &[DeviceId],
        options: ParallelOptions,
    ) -> Result<ParallelReport, EngineError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(EngineError::DispatcherBusy);
        }
        let result = self.execute_inner(scenario_id, device_ids, options).await;
        self.stops.lock().clear();
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn execute_inner(
        self: &Arc<Self>,
        scenario_id: &ScenarioId,
        device_ids: &[DeviceId],
        options: ParallelOptions,
    ) -> Result<ParallelReport, EngineError> {
        let scenario: Scenario = self
            .store
            .try_get(collections::SCENARIOS, scenario_id.as_str())?
            .ok_or_else(|| EngineError::ScenarioNotFound(scenario_id.clone()))?;
        let app_package = match &scenario.package_id {
            Some(pid) => self
                .store
                .try_get::<PackageDoc>(collections::PACKAGES, pid)?
                .map(|p| p.app_package),
            None => None,
        };

        // All artifacts of this run reference one pre-allocated report id
        let started_at = self.clock.epoch_ms();
        let report_id = ReportId::parallel(started_at);
        let execution_id = ExecutionId::new(report_id.as_str());

        let outcome = self.registry.validate_and_ensure(device_ids).await;
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

        self.sink.emit(Event::ParallelStart {
            report_id: report_id.clone(),
            scenario_id: scenario_id.clone(),
            device_ids: devices.clone(),
        });

        {
            let mut stops = self.stops.lock();
            for device_id in &devices {
                stops.insert(device_id.clone(), StopSignal::new());
            }
        }

        let scenario = Arc::new(scenario);
        let app_package = Arc::new(app_package);
        let mut join_set = JoinSet::new();
        for device_id in devices.clone() {
            let dispatcher = Arc::clone(self);
            let scenario = Arc::clone(&scenario);
            let app_package = Arc::clone(&app_package);
            let report_id = report_id.clone();
            let execution_id = execution_id.clone();
            join_set.spawn(async move {
                dispatcher
                    .device_run(
                        &scenario,
                        app_package.as_deref(),
                        &device_id,
                        &report_id,
                        &execution_id,
                        options,
                    )
                    .await
            });
        }

        let mut device_results = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(result) => device_results.push(result),
                Err(e) => tracing::error!(error = %e, "parallel device run panicked"),
            }
        }
        device_results.sort_by_key(|r| devices.iter().position(|d| d == &r.device_id));

        let stats = ReportStats::from_results(&device_results);
        let report = ParallelReport {
            report_id: report_id.clone(),
            scenario_id: scenario_id.clone(),
            scenario_name: scenario.name.clone(),
            device_results,
            stats: stats.clone(),
            started_at_ms: started_at,
            finished_at_ms: self.clock.epoch_ms(),
        };

        // Persistence failures are logged, never fatal to the run
        if let Err(e) = self
            .store
            .put(collections::PARALLEL_REPORTS, report_id.as_str(), &report)
        {
            tracing::warn!(error = %e, report = %report_id, "parallel report persist failed");
        }

        self.sink.emit(Event::ParallelComplete {
            report_id,
            passed: stats.passed,
            failed: stats.failed,
            duration_ms: report.finished_at_ms.saturating_sub(report.started_at_ms),
        });

        Ok(report)
    }

    async fn device_run(
        &self,
        scenario: &Scenario,
        app_package: Option<&str>,
        device_id: &DeviceId,
        report_id: &ReportId,
        execution_id: &ExecutionId,
        options: ParallelOptions,
    ) -> DeviceScenarioResult {
        let stop = self
            .stops
            .lock()
            .get(device_id)
            .cloned()
            .unwrap_or_default();

        let Some(session) = self.registry.info(device_id) else {
            return DeviceScenarioResult {
                device_id: device_id.clone(),
                scenario_id: scenario.id.clone(),
                scenario_name: scenario.name.clone(),
                success: false,
                duration_ms: 0,
                error: Some("session vanished before run".to_string()),
                steps: Vec::new(),
                screenshots: Vec::new(),
                video: None,
            };
        };
        let session_id = session.session_id.as_str().to_string();

        if options.record_video {
            let recording = RecordingOptions::default();
            if let Err(e) = self
                .registry
                .driver()
                .start_recording(&session_id, &recording)
                .await
            {
                tracing::warn!(device = %device_id, error = %e, "screen recording start failed");
            }
        }

        let mut result = self
            .runner
            .run(RunParams {
                scenario,
                device_id,
                session_id: &session_id,
                execution_id,
                report_id,
                app_package,
                stop: &stop,
                capture: CaptureOptions {
                    screenshots: options.capture_screenshots,
                    on_complete: options.capture_on_complete,
                },
            })
            .await;

        if options.record_video {
            match self.registry.driver().stop_recording(&session_id).await {
                Ok(mp4) if !mp4.is_empty() => {
                    match self.artifacts.write_video(report_id, device_id, &mp4) {
                        Ok(path) => result.video = Some(path),
                        Err(e) => tracing::warn!(device = %device_id, error = %e, "video persist failed"),
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(device = %device_id, error = %e, "screen recording stop failed"),
            }
        }

        result
    }

    /// Signal one device's run to stop. Returns false when the device is
    /// not part of the active run.
    pub fn stop_device(&self, device_id: &DeviceId) -> bool {
        match self.stops.lock().get(device_id) {
            Some(stop) => {
                stop.stop();
                true
            }
            None => false,
        }
    }

    /// Fan-out stop over every device of the active run.
    pub fn stop_all(&self) {
        for stop in self.stops.lock().values() {
            stop.stop();
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;

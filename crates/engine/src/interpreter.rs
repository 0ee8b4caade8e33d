// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario interpreter: walks one scenario graph on one device.
//!
//! Traversal is an explicit work loop (no recursion, so graph depth never
//! threatens the stack). The stop signal is polled before every node; wait
//! actions additionally poll it on every tick.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use dl_core::{
    Clock, DeviceId, DeviceScenarioResult, Event, ExecutionId, FailureType, NodeRunStatus,
    ReportId, ScreenshotKind, ScreenshotRef, StepResult, StepStatus, StopSignal,
};
use dl_driver::{AutomationDriver, DriverError, TemplateMatcher};
use dl_scenario::{
    validate, ActionKind, ActionParams, Branch, ConditionKind, ConditionParams, LoopKind, Node,
    NodeId, NodeKind, Scenario, Selector, DEFAULT_WAIT_INTERVAL_MS,
};
use dl_storage::ArtifactStore;

use crate::events::EventSink;

/// Offset subtracted from a wait step's start so the waiting band and the
/// terminal band render adjacent on a UI timeline.
const WAIT_BACKDATE_MS: u64 = 1_000;

/// Retries for touch actions on transient driver faults.
const TOUCH_RETRIES: u32 = 2;
const TOUCH_RETRY_PAUSE_MS: u64 = 300;

/// Gap between the two taps of a double tap.
const DOUBLE_TAP_GAP_MS: u64 = 100;

/// Delay before the best-effort app terminate after a fatal failure.
const AUTO_TERMINATE_DELAY_MS: u64 = 10_000;

/// Granularity of interruptible sleeps.
const SLEEP_SLICE_MS: u64 = 250;

/// Screenshot capture policy for a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureOptions {
    /// Capture after every passed action.
    pub screenshots: bool,
    /// Capture once when the scenario completes.
    pub on_complete: bool,
}

/// Per-run inputs for the interpreter.
pub struct RunParams<'a> {
    pub scenario: &'a Scenario,
    pub device_id: &'a DeviceId,
    /// Driver session handle, already ensured by the caller.
    pub session_id: &'a str,
    pub execution_id: &'a ExecutionId,
    pub report_id: &'a ReportId,
    /// Application id of the scenario's package, when known.
    pub app_package: Option<&'a str>,
    pub stop: &'a StopSignal,
    pub capture: CaptureOptions,
}

/// How one action ended.
struct ActionFailure {
    status: StepStatus,
    failure_type: FailureType,
    message: String,
    /// Fatal failures abort the scenario even with continue-on-error.
    fatal: bool,
}

type ActionResult = Result<(), ActionFailure>;

/// Interprets scenarios against one driver + matcher pair.
#[derive(Clone)]
pub struct ScenarioRunner<D, M, C> {
    driver: D,
    matcher: M,
    clock: C,
    artifacts: ArtifactStore,
    sink: EventSink,
}

impl<D, M, C> ScenarioRunner<D, M, C>
where
    D: AutomationDriver,
    M: TemplateMatcher,
    C: Clock,
{
    pub fn new(driver: D, matcher: M, clock: C, artifacts: ArtifactStore, sink: EventSink) -> Self {
        Self {
            driver,
            matcher,
            clock,
            artifacts,
            sink,
        }
    }

    /// Run one scenario to completion on one device.
    ///
    /// Never fails outright: driver faults, graph defects, and cancellation
    /// all land in the returned result.
    pub async fn run(&self, params: RunParams<'_>) -> DeviceScenarioResult {
        let started_at = self.clock.epoch_ms();
        let mut run = RunState {
            steps: Vec::new(),
            screenshots: Vec::new(),
            error: None,
            success: false,
        };

        if let Err(e) = validate(params.scenario) {
            run.error = Some(e.to_string());
            return self.finish(params, run, started_at).await;
        }
        let Some(start) = params.scenario.start_node() else {
            run.error = Some("scenario has no unique start node".to_string());
            return self.finish(params, run, started_at).await;
        };

        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut loop_counters: HashMap<NodeId, u32> = HashMap::new();
        let mut current = Some(start.id.clone());

        while let Some(node_id) = current.take() {
            let Some(node) = params.scenario.node(&node_id) else {
                run.error = Some(format!("connection leads to unknown node: {node_id}"));
                break;
            };

            if params.stop.is_stopped() {
                self.record_skipped(&mut run, node);
                run.error = Some("stopped".to_string());
                break;
            }

            if !node.kind.is_loop() && !visited.insert(node_id.clone()) {
                run.error = Some(format!("cycle detected at node {node_id}"));
                let mut step = StepResult::begin(
                    node_id.as_str(),
                    &node.display_name(),
                    node.kind.type_name(),
                    self.clock.epoch_ms(),
                );
                step.finish(StepStatus::Error, self.clock.epoch_ms());
                step.error = run.error.clone();
                run.steps.push(step);
                break;
            }

            match &node.kind {
                NodeKind::Start => {
                    current = params.scenario.successor(&node_id).cloned();
                    if current.is_none() {
                        run.error = Some("start node has no successor".to_string());
                    }
                }
                NodeKind::End => {
                    let now = self.clock.epoch_ms();
                    let mut step = StepResult::begin(
                        node_id.as_str(),
                        &node.display_name(),
                        "end",
                        now,
                    );
                    step.finish(StepStatus::Passed, now);
                    run.steps.push(step);
                    self.emit_node(&params, node, NodeRunStatus::Passed, None);
                    run.success = true;
                }
                NodeKind::Action(action) => {
                    let proceed = self.run_action_node(&params, &mut run, node, action).await;
                    if proceed {
                        current = params.scenario.successor(&node_id).cloned();
                        if current.is_none() {
                            run.error = Some(format!("action node {node_id} has no successor"));
                        }
                    }
                }
                NodeKind::Condition(condition) => {
                    let branch = self.run_condition_node(&params, &mut run, node, condition).await;
                    current = params.scenario.branch_successor(&node_id, branch).cloned();
                    if current.is_none() {
                        run.error = Some(format!("condition node {node_id} is missing a branch"));
                    }
                }
                NodeKind::Loop(lp) => {
                    let take_loop = self
                        .run_loop_node(&params, &mut run, node, &lp.kind, &mut loop_counters)
                        .await;
                    let branch = if take_loop { Branch::Loop } else { Branch::Exit };
                    if take_loop {
                        // Iteration boundary: the body may be revisited
                        visited.clear();
                    }
                    current = params.scenario.branch_successor(&node_id, branch).cloned();
                    if current.is_none() {
                        run.error = Some(format!("loop node {node_id} is missing a branch"));
                    }
                }
            }
        }

        self.finish(params, run, started_at).await
    }

    async fn finish(
        &self,
        params: RunParams<'_>,
        mut run: RunState,
        started_at: u64,
    ) -> DeviceScenarioResult {
        if run.success && params.capture.on_complete {
            self.capture(&params, &mut run, "end", ScreenshotKind::Final).await;
        }
        let finished_at = self.clock.epoch_ms();
        DeviceScenarioResult {
            device_id: params.device_id.clone(),
            scenario_id: params.scenario.id.clone(),
            scenario_name: params.scenario.name.clone(),
            success: run.success,
            duration_ms: finished_at.saturating_sub(started_at),
            error: run.error,
            steps: run.steps,
            screenshots: run.screenshots,
            video: None,
        }
    }

    fn record_skipped(&self, run: &mut RunState, node: &Node) {
        if matches!(node.kind, NodeKind::Start) {
            return;
        }
        let now = self.clock.epoch_ms();
        let mut step = StepResult::begin(
            node.id.as_str(),
            &node.display_name(),
            node.kind.type_name(),
            now,
        );
        step.finish(StepStatus::Skipped, now);
        run.steps.push(step);
    }

    fn emit_node(
        &self,
        params: &RunParams<'_>,
        node: &Node,
        status: NodeRunStatus,
        error: Option<String>,
    ) {
        self.sink.emit(Event::TestDeviceNode {
            execution_id: params.execution_id.clone(),
            device_id: params.device_id.clone(),
            scenario_id: params.scenario.id.clone(),
            node_id: node.id.to_string(),
            node_name: node.display_name(),
            status,
            error,
        });
    }

    /// Run one action node. Returns true when the walk should continue.
    async fn run_action_node(
        &self,
        params: &RunParams<'_>,
        run: &mut RunState,
        node: &Node,
        action: &ActionParams,
    ) -> bool {
        let is_wait = action.kind.is_wait();
        let begin_status = if is_wait {
            NodeRunStatus::Waiting
        } else {
            NodeRunStatus::Running
        };
        self.emit_node(params, node, begin_status, None);

        let start_ms = self.clock.epoch_ms();
        let mut step = StepResult::begin(
            node.id.as_str(),
            &node.display_name(),
            "action",
            start_ms,
        );
        let outcome = self.dispatch_action(params, action).await;
        let now = self.clock.epoch_ms();

        if is_wait {
            // The waiting marker is finalized in place; back-dating the
            // start keeps the waiting and terminal bands adjacent on the
            // timeline.
            step.start_ms = now.saturating_sub(WAIT_BACKDATE_MS).max(start_ms);
        }

        match outcome {
            Ok(()) => {
                step.finish(StepStatus::Passed, now);
                run.steps.push(step);
                self.emit_node(params, node, NodeRunStatus::Passed, None);
                if params.capture.screenshots {
                    self.capture(params, run, node.id.as_str(), ScreenshotKind::Step)
                        .await;
                }
                true
            }
            Err(failure) => {
                step.finish(failure.status, now);
                step.error = Some(failure.message.clone());
                step.failure_type = Some(failure.failure_type);
                run.steps.push(step);
                self.emit_node(params, node, NodeRunStatus::Failed, Some(failure.message.clone()));
                self.capture(params, run, node.id.as_str(), ScreenshotKind::Failed)
                    .await;

                if action.continue_on_error && !failure.fatal {
                    tracing::debug!(node = %node.id, "action failed, continuing on error");
                    return true;
                }
                run.error = Some(failure.message);
                self.schedule_auto_terminate(params);
                false
            }
        }
    }

    /// Evaluate a condition node and pick the branch to follow.
    async fn run_condition_node(
        &self,
        params: &RunParams<'_>,
        run: &mut RunState,
        node: &Node,
        condition: &ConditionParams,
    ) -> Branch {
        self.emit_node(params, node, NodeRunStatus::Running, None);
        let now = self.clock.epoch_ms();
        let mut step = StepResult::begin(
            node.id.as_str(),
            &node.display_name(),
            "condition",
            now,
        );

        let (branch, status, error) = match self.evaluate_condition(params, &condition.kind).await {
            Ok(true) => (Branch::Yes, StepStatus::Passed, None),
            Ok(false) => (Branch::No, StepStatus::Passed, None),
            // A throwing condition is recorded and treated as "no"
            Err(e) => (Branch::No, StepStatus::Error, Some(e.to_string())),
        };
        step.finish(status, self.clock.epoch_ms());
        step.error = error.clone();
        run.steps.push(step);
        let emitted = if status == StepStatus::Error {
            NodeRunStatus::Failed
        } else {
            NodeRunStatus::Passed
        };
        self.emit_node(params, node, emitted, error);
        branch
    }

    /// Evaluate a loop node: true means take the `loop` branch.
    async fn run_loop_node(
        &self,
        params: &RunParams<'_>,
        run: &mut RunState,
        node: &Node,
        kind: &LoopKind,
        counters: &mut HashMap<NodeId, u32>,
    ) -> bool {
        self.emit_node(params, node, NodeRunStatus::Running, None);
        let now = self.clock.epoch_ms();
        let mut step = StepResult::begin(node.id.as_str(), &node.display_name(), "loop", now);

        let (take_loop, error) = match kind {
            LoopKind::Count { count } => {
                let done = counters.entry(node.id.clone()).or_insert(0);
                if *done < *count {
                    *done += 1;
                    (true, None)
                } else {
                    counters.remove(&node.id);
                    (false, None)
                }
            }
            LoopKind::WhileExists { target } => match self.element_exists(params, target).await {
                Ok(exists) => (exists, None),
                Err(e) => (false, Some(e.to_string())),
            },
            LoopKind::WhileNotExists { target } => match self.element_exists(params, target).await {
                Ok(exists) => (!exists, None),
                Err(e) => (false, Some(e.to_string())),
            },
        };

        let status = if error.is_some() {
            StepStatus::Error
        } else {
            StepStatus::Passed
        };
        step.finish(status, self.clock.epoch_ms());
        step.error = error.clone();
        run.steps.push(step);
        let emitted = if error.is_some() {
            NodeRunStatus::Failed
        } else {
            NodeRunStatus::Passed
        };
        self.emit_node(params, node, emitted, error);
        take_loop
    }

    async fn element_exists(
        &self,
        params: &RunParams<'_>,
        target: &Selector,
    ) -> Result<bool, DriverError> {
        Ok(self
            .driver
            .find_element(params.session_id, target)
            .await?
            .is_some())
    }

    async fn template_on_screen(
        &self,
        params: &RunParams<'_>,
        template_id: &str,
    ) -> Result<bool, DriverError> {
        let png = self.driver.screenshot(params.session_id).await?;
        match self.matcher.find_template(&png, template_id).await {
            Ok(found) => Ok(found.is_some()),
            Err(e) => Err(DriverError::CommandFailed(e.to_string())),
        }
    }

    async fn evaluate_condition(
        &self,
        params: &RunParams<'_>,
        kind: &ConditionKind,
    ) -> Result<bool, String> {
        match kind {
            ConditionKind::ElementExists { target } => self
                .element_exists(params, target)
                .await
                .map_err(|e| e.to_string()),
            ConditionKind::ElementNotExists { target } => self
                .element_exists(params, target)
                .await
                .map(|exists| !exists)
                .map_err(|e| e.to_string()),
            ConditionKind::TextExists { text } => self
                .driver
                .text_on_screen(params.session_id, text)
                .await
                .map_err(|e| e.to_string()),
            ConditionKind::TextNotExists { text } => self
                .driver
                .text_on_screen(params.session_id, text)
                .await
                .map(|on_screen| !on_screen)
                .map_err(|e| e.to_string()),
            ConditionKind::ImageExists { template_id } => self
                .find_template(params, template_id)
                .await
                .map(|found| found.is_some())
                .map_err(|f| f.message),
            ConditionKind::ImageNotExists { template_id } => self
                .find_template(params, template_id)
                .await
                .map(|found| found.is_none())
                .map_err(|f| f.message),
        }
    }

    async fn dispatch_action(&self, params: &RunParams<'_>, action: &ActionParams) -> ActionResult {
        let timeout_ms = action.timeout_ms();
        match &action.kind {
            ActionKind::Tap { x, y } => self.with_retries(|| self.driver.tap(params.session_id, *x, *y)).await,
            ActionKind::DoubleTap { x, y } => {
                self.with_retries(|| async {
                    self.driver.tap(params.session_id, *x, *y).await?;
                    tokio::time::sleep(Duration::from_millis(DOUBLE_TAP_GAP_MS)).await;
                    self.driver.tap(params.session_id, *x, *y).await
                })
                .await
            }
            ActionKind::LongPress { x, y, duration_ms } => {
                self.with_retries(|| self.driver.long_press(params.session_id, *x, *y, *duration_ms))
                    .await
            }
            ActionKind::Swipe {
                x1,
                y1,
                x2,
                y2,
                duration_ms,
            } => {
                self.with_retries(|| {
                    self.driver
                        .swipe(params.session_id, *x1, *y1, *x2, *y2, *duration_ms)
                })
                .await
            }
            ActionKind::TapElement { target } => self.tap_element(params, target, timeout_ms).await,
            ActionKind::Wait { ms } => self.plain_wait(params, *ms).await,
            ActionKind::WaitUntilExists { target, interval_ms } => {
                self.wait_until(params, timeout_ms, interval_ms.unwrap_or(DEFAULT_WAIT_INTERVAL_MS), || async {
                    self.element_exists(params, target).await
                })
                .await
            }
            ActionKind::WaitUntilGone { target, interval_ms } => {
                self.wait_until(params, timeout_ms, interval_ms.unwrap_or(DEFAULT_WAIT_INTERVAL_MS), || async {
                    Ok(!self.element_exists(params, target).await?)
                })
                .await
            }
            ActionKind::WaitUntilTextExists { text } => {
                self.wait_until(params, timeout_ms, DEFAULT_WAIT_INTERVAL_MS, || async {
                    self.driver.text_on_screen(params.session_id, text).await
                })
                .await
            }
            ActionKind::WaitUntilTextGone { text } => {
                self.wait_until(params, timeout_ms, DEFAULT_WAIT_INTERVAL_MS, || async {
                    Ok(!self.driver.text_on_screen(params.session_id, text).await?)
                })
                .await
            }
            ActionKind::WaitUntilImage { template_id } => {
                self.wait_until(params, timeout_ms, DEFAULT_WAIT_INTERVAL_MS, || async {
                    self.template_on_screen(params, template_id).await
                })
                .await
            }
            ActionKind::WaitUntilImageGone { template_id } => {
                self.wait_until(params, timeout_ms, DEFAULT_WAIT_INTERVAL_MS, || async {
                    Ok(!self.template_on_screen(params, template_id).await?)
                })
                .await
            }
            ActionKind::LaunchApp { package } => {
                // Launching with no known package is the one fatal case
                let package = self
                    .resolve_package(params, package.as_deref())
                    .ok_or_else(|| missing_package(true))?;
                self.driver
                    .launch_app(params.session_id, &package)
                    .await
                    .map_err(runtime_failure)
            }
            ActionKind::TerminateApp { package } => {
                let package = self
                    .resolve_package(params, package.as_deref())
                    .ok_or_else(|| missing_package(false))?;
                self.driver
                    .terminate_app(params.session_id, &package)
                    .await
                    .map_err(runtime_failure)
            }
            ActionKind::RestartApp => {
                let package = self
                    .resolve_package(params, None)
                    .ok_or_else(|| missing_package(false))?;
                self.driver
                    .terminate_app(params.session_id, &package)
                    .await
                    .map_err(runtime_failure)?;
                tokio::time::sleep(Duration::from_millis(500)).await;
                self.driver
                    .launch_app(params.session_id, &package)
                    .await
                    .map_err(runtime_failure)
            }
            ActionKind::ClearData { package } => {
                let package = self
                    .resolve_package(params, package.as_deref())
                    .ok_or_else(|| missing_package(false))?;
                self.driver
                    .clear_app_data(params.session_id, &package)
                    .await
                    .map_err(runtime_failure)
            }
            ActionKind::ClearCache { package } => {
                let package = self
                    .resolve_package(params, package.as_deref())
                    .ok_or_else(|| missing_package(false))?;
                self.driver
                    .clear_app_cache(params.session_id, &package)
                    .await
                    .map_err(runtime_failure)
            }
            ActionKind::Back => self
                .driver
                .press_key(params.session_id, dl_driver::automation::keycodes::BACK)
                .await
                .map_err(runtime_failure),
            ActionKind::Home => self
                .driver
                .press_key(params.session_id, dl_driver::automation::keycodes::HOME)
                .await
                .map_err(runtime_failure),
            ActionKind::InputText { text } => self
                .driver
                .input_text(params.session_id, text)
                .await
                .map_err(runtime_failure),
            ActionKind::ClearText => self
                .driver
                .clear_text(params.session_id)
                .await
                .map_err(runtime_failure),
            ActionKind::PressKey { keycode } => self
                .driver
                .press_key(params.session_id, *keycode)
                .await
                .map_err(runtime_failure),
            ActionKind::TapImage { template_id } => {
                self.tap_image(params, template_id, timeout_ms).await
            }
        }
    }

    /// The package an app action targets: its own override, else the
    /// scenario's.
    fn resolve_package(&self, params: &RunParams<'_>, explicit: Option<&str>) -> Option<String> {
        explicit.or(params.app_package).map(str::to_string)
    }

    /// Retry transient driver faults a couple of times.
    async fn with_retries<F, Fut>(&self, call: F) -> ActionResult
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<(), DriverError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < TOUCH_RETRIES => {
                    attempt += 1;
                    tracing::debug!(error = %e, attempt, "transient driver fault, retrying");
                    tokio::time::sleep(Duration::from_millis(TOUCH_RETRY_PAUSE_MS)).await;
                }
                Err(e) => return Err(runtime_failure(e)),
            }
        }
    }

    async fn tap_element(
        &self,
        params: &RunParams<'_>,
        target: &Selector,
        timeout_ms: u64,
    ) -> ActionResult {
        let mut elapsed = 0u64;
        loop {
            match self.driver.find_element(params.session_id, target).await {
                Ok(Some(rect)) => {
                    let (x, y) = rect.center();
                    return self.with_retries(|| self.driver.tap(params.session_id, x, y)).await;
                }
                Ok(None) => {}
                Err(e) if !e.is_transient() => return Err(runtime_failure(e)),
                Err(e) => tracing::debug!(error = %e, "element lookup fault, retrying"),
            }
            if params.stop.is_stopped() || elapsed >= timeout_ms {
                return Err(ActionFailure {
                    status: StepStatus::Failed,
                    failure_type: FailureType::Timeout,
                    message: format!("element not found within {timeout_ms} ms: {target}"),
                    fatal: false,
                });
            }
            tokio::time::sleep(Duration::from_millis(DEFAULT_WAIT_INTERVAL_MS)).await;
            elapsed += DEFAULT_WAIT_INTERVAL_MS;
        }
    }

    async fn tap_image(
        &self,
        params: &RunParams<'_>,
        template_id: &str,
        timeout_ms: u64,
    ) -> ActionResult {
        let mut elapsed = 0u64;
        loop {
            let found = self.find_template(params, template_id).await;
            match found {
                Ok(Some((m, png))) => {
                    let (x, y) = m.center();
                    self.with_retries(|| self.driver.tap(params.session_id, x, y)).await?;
                    // Persist the matched frame so the report can highlight it
                    if let Err(e) = self.artifacts.write_screenshot(
                        params.report_id,
                        params.device_id,
                        template_id,
                        ScreenshotKind::Highlight,
                        self.clock.epoch_ms(),
                        &png,
                    ) {
                        tracing::warn!(error = %e, "highlight screenshot write failed");
                    }
                    return Ok(());
                }
                Ok(None) => {}
                Err(e) => return Err(e),
            }
            if params.stop.is_stopped() || elapsed >= timeout_ms {
                return Err(ActionFailure {
                    status: StepStatus::Failed,
                    failure_type: FailureType::Timeout,
                    message: format!("template not matched within {timeout_ms} ms: {template_id}"),
                    fatal: false,
                });
            }
            tokio::time::sleep(Duration::from_millis(DEFAULT_WAIT_INTERVAL_MS)).await;
            elapsed += DEFAULT_WAIT_INTERVAL_MS;
        }
    }

    async fn find_template(
        &self,
        params: &RunParams<'_>,
        template_id: &str,
    ) -> Result<Option<(dl_driver::TemplateMatch, Vec<u8>)>, ActionFailure> {
        let png = self
            .driver
            .screenshot(params.session_id)
            .await
            .map_err(runtime_failure)?;
        let found = self
            .matcher
            .find_template(&png, template_id)
            .await
            .map_err(|e| ActionFailure {
                status: StepStatus::Error,
                failure_type: FailureType::Runtime,
                message: e.to_string(),
                fatal: false,
            })?;
        Ok(found.map(|m| (m, png)))
    }

    /// Fixed-length wait, sliced so cancellation stays responsive.
    async fn plain_wait(&self, params: &RunParams<'_>, ms: u64) -> ActionResult {
        let mut remaining = ms;
        while remaining > 0 {
            if params.stop.is_stopped() {
                return Ok(());
            }
            let slice = remaining.min(SLEEP_SLICE_MS);
            tokio::time::sleep(Duration::from_millis(slice)).await;
            remaining -= slice;
        }
        Ok(())
    }

    /// Poll a predicate until it holds or the timeout lapses.
    async fn wait_until<F, Fut>(
        &self,
        params: &RunParams<'_>,
        timeout_ms: u64,
        interval_ms: u64,
        predicate: F,
    ) -> ActionResult
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<bool, DriverError>>,
    {
        let mut elapsed = 0u64;
        loop {
            match predicate().await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) if !e.is_transient() => return Err(runtime_failure(e)),
                Err(e) => tracing::debug!(error = %e, "wait probe fault, retrying"),
            }
            if params.stop.is_stopped() {
                return Ok(());
            }
            if elapsed >= timeout_ms {
                // Timeouts are the expected failure mode for waits
                return Err(ActionFailure {
                    status: StepStatus::Failed,
                    failure_type: FailureType::Timeout,
                    message: format!("condition not met within {timeout_ms} ms"),
                    fatal: false,
                });
            }
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
            elapsed += interval_ms;
        }
    }

    async fn capture(
        &self,
        params: &RunParams<'_>,
        run: &mut RunState,
        node_id: &str,
        kind: ScreenshotKind,
    ) {
        let png = match self.driver.screenshot(params.session_id).await {
            Ok(png) => png,
            Err(e) => {
                tracing::warn!(device = %params.device_id, error = %e, "screenshot failed");
                return;
            }
        };
        match self.artifacts.write_screenshot(
            params.report_id,
            params.device_id,
            node_id,
            kind,
            self.clock.epoch_ms(),
            &png,
        ) {
            Ok(path) => run.screenshots.push(ScreenshotRef {
                node_id: node_id.to_string(),
                kind,
                path,
            }),
            Err(e) => tracing::warn!(error = %e, "screenshot write failed"),
        }
    }

    /// Best-effort app terminate a few seconds after a fatal failure.
    fn schedule_auto_terminate(&self, params: &RunParams<'_>) {
        let Some(package) = params.app_package.map(str::to_string) else {
            return;
        };
        let driver = self.driver.clone();
        let session_id = params.session_id.to_string();
        let device_id = params.device_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(AUTO_TERMINATE_DELAY_MS)).await;
            if let Err(e) = driver.terminate_app(&session_id, &package).await {
                tracing::debug!(device = %device_id, error = %e, "post-failure app terminate failed");
            }
        });
    }
}

struct RunState {
    steps: Vec<StepResult>,
    screenshots: Vec<ScreenshotRef>,
    error: Option<String>,
    success: bool,
}

fn runtime_failure(e: DriverError) -> ActionFailure {
    ActionFailure {
        status: StepStatus::Error,
        failure_type: FailureType::Runtime,
        message: e.to_string(),
        fatal: false,
    }
}

fn missing_package(fatal: bool) -> ActionFailure {
    ActionFailure {
        status: StepStatus::Error,
        failure_type: FailureType::Runtime,
        message: "no app package configured for this scenario".to_string(),
        fatal,
    }
}

#[cfg(test)]
#[path = "interpreter_tests/mod.rs"]
mod tests;

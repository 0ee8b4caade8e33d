// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dl-daemon: root context wiring the devicelab orchestration core.
//!
//! [`System`] owns every component as a value created at startup: the
//! session registry, the interpreter runner, the executor, the queue
//! orchestrator, the parallel dispatcher, the schedule manager, and the
//! event bus. The HTTP and realtime layers are external collaborators that
//! call the methods here.

pub mod config;
pub mod env;
pub mod event_bus;

pub use config::Config;
pub use event_bus::{ClientInfo, EventBus};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;

use dl_core::{
    ClientId, Clock, DeviceId, DeviceQueueStatus, Event, ExecutionId, ParallelReport, QueueId,
    QueueStatusEntry, ScenarioId, Schedule, ScheduleHistoryEntry, ScheduleId, SessionInfo,
    TestRequest,
};
use dl_driver::{AutomationDriver, TemplateMatcher};
use dl_engine::{
    DeviceInventory, EngineError, EventSink, ExecutionStatus, ParallelDispatcher, ParallelOptions,
    QueueOrchestrator, ScanSummary, ScenarioRunner, ScheduleManager, SessionRegistry, SubmitOutcome,
    TestExecutor,
};
use dl_storage::{ArtifactStore, DocumentStore, ScheduleHistoryStore};

/// Errors from daemon startup and environment resolution
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("cannot determine a data directory (set DL_DATA_DIR)")]
    NoDataDir,
    #[error("another daemon instance holds the lock")]
    LockHeld,
    #[error("invalid daemon.toml: {0}")]
    InvalidConfig(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// The root context: every core component, owned, wired to one event bus.
pub struct System<D: AutomationDriver, M: TemplateMatcher, C: Clock> {
    data_dir: PathBuf,
    bus: Arc<EventBus>,
    registry: Arc<SessionRegistry<D, C>>,
    executor: Arc<TestExecutor<D, M, C>>,
    orchestrator: Arc<QueueOrchestrator<D, M, C>>,
    dispatcher: Arc<ParallelDispatcher<D, M, C>>,
    schedules: Arc<ScheduleManager<D, M, C>>,
    inventory: DeviceInventory<D, C>,
}

impl<D, M, C> System<D, M, C>
where
    D: AutomationDriver,
    M: TemplateMatcher,
    C: Clock,
{
    /// Assemble the system over a data directory.
    pub fn new(driver: D, matcher: M, clock: C, data_dir: &Path, config: &Config) -> Self {
        let store = DocumentStore::new(data_dir);
        let artifacts = ArtifactStore::new(data_dir);
        let bus = Arc::new(EventBus::new(config.event_capacity()));
        let sink: EventSink = bus.sink();

        let registry = Arc::new(match config.mjpeg_port_base {
            Some(base) => SessionRegistry::with_port_base(driver.clone(), clock.clone(), base),
            None => SessionRegistry::new(driver.clone(), clock.clone()),
        });
        let runner = ScenarioRunner::new(
            driver.clone(),
            matcher,
            clock.clone(),
            artifacts.clone(),
            sink.clone(),
        );
        let executor = Arc::new(TestExecutor::new(
            Arc::clone(&registry),
            runner.clone(),
            store.clone(),
            sink.clone(),
            clock.clone(),
        ));
        let orchestrator = Arc::new(QueueOrchestrator::new(
            Arc::clone(&executor),
            store.clone(),
            sink.clone(),
            clock.clone(),
        ));
        let dispatcher = Arc::new(ParallelDispatcher::new(
            Arc::clone(&registry),
            runner,
            store.clone(),
            artifacts,
            sink.clone(),
            clock.clone(),
        ));
        let schedules = Arc::new(ScheduleManager::new(
            store.clone(),
            ScheduleHistoryStore::new(data_dir),
            Arc::clone(&dispatcher),
            Arc::clone(&registry),
            sink,
            clock.clone(),
        ));
        let inventory = DeviceInventory::new(driver, store, clock);

        Self {
            data_dir: data_dir.to_path_buf(),
            bus,
            registry,
            executor,
            orchestrator,
            dispatcher,
            schedules,
            inventory,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn registry(&self) -> &Arc<SessionRegistry<D, C>> {
        &self.registry
    }

    pub fn schedules(&self) -> &Arc<ScheduleManager<D, M, C>> {
        &self.schedules
    }

    pub fn dispatcher(&self) -> &Arc<ParallelDispatcher<D, M, C>> {
        &self.dispatcher
    }

    /// Register triggers for stored schedules. Call once at startup.
    pub fn init_schedules(&self) -> Result<usize, EngineError> {
        self.schedules.init()
    }

    // -- realtime channel -------------------------------------------------

    /// Register a client connection and return its event stream.
    pub fn subscribe(&self, client_id: ClientId) -> broadcast::Receiver<Event> {
        self.bus.subscribe(client_id)
    }

    /// `user:identify` from the channel.
    pub fn identify(&self, client_id: &ClientId, user_name: &str) -> bool {
        self.bus.identify(client_id, user_name)
    }

    /// Drop a client: its queued submissions are cancelled, running ones
    /// finish on their own.
    pub fn handle_disconnect(&self, client_id: &ClientId) {
        self.orchestrator.handle_socket_disconnect(client_id);
        self.bus.disconnect(client_id);
    }

    // -- queue surface ----------------------------------------------------

    pub fn submit_test(
        &self,
        request: TestRequest,
        socket_id: ClientId,
    ) -> Result<SubmitOutcome, EngineError> {
        self.orchestrator.submit_test(request, socket_id)
    }

    pub fn cancel_test(
        &self,
        queue_id: &QueueId,
        socket_id: &ClientId,
    ) -> Result<(bool, String), EngineError> {
        self.orchestrator.cancel_test(queue_id, socket_id)
    }

    /// Queue introspection; also pushed to subscribers as
    /// `queue:status:response`.
    pub fn queue_status(
        &self,
        user_name: Option<&str>,
    ) -> (Vec<QueueStatusEntry>, Vec<DeviceQueueStatus>) {
        let (queue, device_statuses) = self.orchestrator.queue_status(user_name);
        self.bus.emit(Event::QueueStatusResponse {
            queue: queue.clone(),
            device_statuses: device_statuses.clone(),
        });
        (queue, device_statuses)
    }

    pub fn execution_status(&self, execution_id: Option<&ExecutionId>) -> Option<ExecutionStatus> {
        self.executor.get_status(execution_id)
    }

    // -- session surface --------------------------------------------------

    pub async fn create_session(&self, device_id: &DeviceId) -> Result<SessionInfo, EngineError> {
        self.registry.create(device_id).await
    }

    pub async fn destroy_session(&self, device_id: &DeviceId) -> Result<bool, EngineError> {
        self.registry.destroy(device_id).await
    }

    pub async fn execute_parallel(
        &self,
        scenario_id: &ScenarioId,
        device_ids: &[DeviceId],
        options: ParallelOptions,
    ) -> Result<ParallelReport, EngineError> {
        self.dispatcher
            .execute_parallel(scenario_id, device_ids, options)
            .await
    }

    // -- schedule surface -------------------------------------------------

    pub fn create_schedule(&self, schedule: Schedule) -> Result<Schedule, EngineError> {
        self.schedules.create(schedule)
    }

    pub fn update_schedule(&self, schedule: Schedule) -> Result<Schedule, EngineError> {
        self.schedules.update(schedule)
    }

    pub fn delete_schedule(&self, schedule_id: &ScheduleId) -> Result<(), EngineError> {
        self.schedules.delete(schedule_id)
    }

    /// Enable or disable a schedule, keeping its one-live-trigger invariant.
    pub fn set_schedule_enabled(
        &self,
        schedule_id: &ScheduleId,
        enabled: bool,
    ) -> Result<Schedule, EngineError> {
        self.schedules.set_enabled(schedule_id, enabled)
    }

    pub fn list_schedules(&self) -> Result<Vec<Schedule>, EngineError> {
        self.schedules.list()
    }

    pub fn schedule_history(&self) -> Result<Vec<ScheduleHistoryEntry>, EngineError> {
        self.schedules.history()
    }

    // -- fleet ------------------------------------------------------------

    pub async fn scan_devices(&self) -> Result<ScanSummary, EngineError> {
        self.inventory.scan().await
    }

    /// Cooperative shutdown: stop triggers, tear down every session.
    pub async fn shutdown(&self) {
        self.schedules.shutdown();
        self.dispatcher.stop_all();
        self.registry.destroy_all().await;
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

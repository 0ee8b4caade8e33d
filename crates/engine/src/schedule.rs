// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule manager: cron-driven recurring launches.
//!
//! Every enabled schedule owns exactly one live trigger task. A fire
//! resolves the schedule from storage, checks the dispatcher and the live
//! sessions, launches a parallel run when possible, and always records a
//! history entry.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use dl_core::{
    Clock, Event, Schedule, ScheduleHistoryEntry, ScheduleId, ScheduleOutcome,
};
use dl_driver::{AutomationDriver, TemplateMatcher};
use dl_storage::{collections, DocumentStore, ScheduleHistoryStore};

use crate::cron::CronExpr;
use crate::dispatcher::{ParallelDispatcher, ParallelOptions};
use crate::error::EngineError;
use crate::events::EventSink;
use crate::registry::SessionRegistry;

/// Owns the live cron triggers.
pub struct ScheduleManager<D: AutomationDriver, M: TemplateMatcher, C: Clock> {
    store: DocumentStore,
    history: ScheduleHistoryStore,
    dispatcher: Arc<ParallelDispatcher<D, M, C>>,
    registry: Arc<SessionRegistry<D, C>>,
    sink: EventSink,
    clock: C,
    triggers: Mutex<HashMap<ScheduleId, JoinHandle<()>>>,
}

impl<D, M, C> ScheduleManager<D, M, C>
where
    D: AutomationDriver,
    M: TemplateMatcher,
    C: Clock,
{
    pub fn new(
        store: DocumentStore,
        history: ScheduleHistoryStore,
        dispatcher: Arc<ParallelDispatcher<D, M, C>>,
        registry: Arc<SessionRegistry<D, C>>,
        sink: EventSink,
        clock: C,
    ) -> Self {
        Self {
            store,
            history,
            dispatcher,
            registry,
            sink,
            clock,
            triggers: Mutex::new(HashMap::new()),
        }
    }

    /// Load all enabled schedules and register their triggers.
    pub fn init(self: &Arc<Self>) -> Result<usize, EngineError> {
        let schedules: Vec<Schedule> = self.store.list(collections::SCHEDULES)?;
        let mut registered = 0;
        for schedule in schedules {
            if !schedule.enabled {
                continue;
            }
            match self.register(&schedule) {
                Ok(()) => registered += 1,
                Err(e) => {
                    tracing::warn!(schedule = %schedule.id, error = %e, "skipping unregisterable schedule")
                }
            }
        }
        tracing::info!(registered, "schedule manager initialized");
        Ok(registered)
    }

    /// Create a schedule document; registers a trigger when enabled.
    pub fn create(self: &Arc<Self>, mut schedule: Schedule) -> Result<Schedule, EngineError> {
        let cron = CronExpr::parse(&schedule.cron_expression)?;
        schedule.next_run_at_ms = cron.next_after_ms(self.clock.epoch_ms());
        self.store
            .put(collections::SCHEDULES, schedule.id.as_str(), &schedule)?;
        if schedule.enabled {
            self.register(&schedule)?;
        }
        Ok(schedule)
    }

    /// Replace a schedule document and its trigger.
    pub fn update(self: &Arc<Self>, schedule: Schedule) -> Result<Schedule, EngineError> {
        if self
            .store
            .try_get::<Schedule>(collections::SCHEDULES, schedule.id.as_str())?
            .is_none()
        {
            return Err(EngineError::ScheduleNotFound(schedule.id.clone()));
        }
        self.deregister(&schedule.id);
        self.create(schedule)
    }

    /// Delete a schedule and its trigger.
    pub fn delete(&self, schedule_id: &ScheduleId) -> Result<(), EngineError> {
        self.deregister(schedule_id);
        if !self.store.delete(collections::SCHEDULES, schedule_id.as_str())? {
            return Err(EngineError::ScheduleNotFound(schedule_id.clone()));
        }
        Ok(())
    }

    /// Enable or disable. Enabling recomputes `next_run_at` from the
    /// expression and the current wall time only, so disable→enable is
    /// idempotent.
    pub fn set_enabled(
        self: &Arc<Self>,
        schedule_id: &ScheduleId,
        enabled: bool,
    ) -> Result<Schedule, EngineError> {
        let mut schedule: Schedule = self
            .store
            .try_get(collections::SCHEDULES, schedule_id.as_str())?
            .ok_or_else(|| EngineError::ScheduleNotFound(schedule_id.clone()))?;
        schedule.enabled = enabled;
        self.deregister(schedule_id);
        if enabled {
            let cron = CronExpr::parse(&schedule.cron_expression)?;
            schedule.next_run_at_ms = cron.next_after_ms(self.clock.epoch_ms());
            self.store
                .put(collections::SCHEDULES, schedule_id.as_str(), &schedule)?;
            self.register(&schedule)?;
        } else {
            schedule.next_run_at_ms = None;
            self.store
                .put(collections::SCHEDULES, schedule_id.as_str(), &schedule)?;
        }
        Ok(schedule)
    }

    pub fn list(&self) -> Result<Vec<Schedule>, EngineError> {
        Ok(self.store.list(collections::SCHEDULES)?)
    }

    pub fn history(&self) -> Result<Vec<ScheduleHistoryEntry>, EngineError> {
        Ok(self.history.read()?)
    }

    /// Number of live triggers (for introspection and tests).
    pub fn trigger_count(&self) -> usize {
        self.triggers.lock().len()
    }

    /// Register the one live trigger for a schedule, replacing any old one.
    fn register(self: &Arc<Self>, schedule: &Schedule) -> Result<(), EngineError> {
        let cron = CronExpr::parse(&schedule.cron_expression)?;
        let manager = Arc::clone(self);
        let schedule_id = schedule.id.clone();
        let handle = tokio::spawn({
            let schedule_id = schedule_id.clone();
            async move {
                loop {
                    let now = manager.clock.epoch_ms();
                    let Some(next) = cron.next_after_ms(now) else {
                        tracing::warn!(schedule = %schedule_id, "cron has no future fire time");
                        break;
                    };
                    tokio::time::sleep(Duration::from_millis(next.saturating_sub(now))).await;
                    manager.fire(&schedule_id).await;
                }
            }
        });
        let old = self.triggers.lock().insert(schedule_id, handle);
        if let Some(old) = old {
            old.abort();
        }
        Ok(())
    }

    fn deregister(&self, schedule_id: &ScheduleId) {
        if let Some(handle) = self.triggers.lock().remove(schedule_id) {
            handle.abort();
        }
    }

    /// One fire: launch the run when possible, record history either way.
    pub async fn fire(&self, schedule_id: &ScheduleId) -> ScheduleOutcome {
        let fired_at = self.clock.epoch_ms();
        let schedule: Schedule = match self
            .store
            .try_get(collections::SCHEDULES, schedule_id.as_str())
        {
            Ok(Some(schedule)) => schedule,
            Ok(None) => {
                tracing::warn!(schedule = %schedule_id, "fired schedule no longer exists");
                return ScheduleOutcome::Skipped;
            }
            Err(e) => {
                tracing::warn!(schedule = %schedule_id, error = %e, "schedule read failed on fire");
                return ScheduleOutcome::Skipped;
            }
        };

        self.sink.emit(Event::ScheduleStart {
            schedule_id: schedule.id.clone(),
            name: schedule.name.clone(),
        });

        let live: Vec<_> = schedule
            .device_ids
            .iter()
            .filter(|d| self.registry.info(d).is_some())
            .cloned()
            .collect();

        let (outcome, message, report_id) = if self.dispatcher.is_running() {
            (
                ScheduleOutcome::Skipped,
                Some("parallel dispatcher is busy".to_string()),
                None,
            )
        } else if live.is_empty() {
            (
                ScheduleOutcome::Skipped,
                Some("no devices with live sessions".to_string()),
                None,
            )
        } else {
            match self
                .dispatcher
                .execute_parallel(&schedule.scenario_id, &live, ParallelOptions::default())
                .await
            {
                Ok(report) => (ScheduleOutcome::Triggered, None, Some(report.report_id)),
                Err(e) => (ScheduleOutcome::Failed, Some(e.to_string()), None),
            }
        };

        let success = outcome == ScheduleOutcome::Triggered;
        self.sink.emit(Event::ScheduleComplete {
            schedule_id: schedule.id.clone(),
            name: schedule.name.clone(),
            success,
            message: message.clone(),
        });

        if let Err(e) = self.history.append(ScheduleHistoryEntry {
            schedule_id: schedule.id.clone(),
            schedule_name: schedule.name.clone(),
            fired_at_ms: fired_at,
            outcome,
            message,
            report_id,
        }) {
            tracing::warn!(schedule = %schedule.id, error = %e, "history append failed");
        }

        self.record_fire_times(schedule, fired_at);
        outcome
    }

    fn record_fire_times(&self, mut schedule: Schedule, fired_at: u64) {
        schedule.last_run_at_ms = Some(fired_at);
        schedule.next_run_at_ms = CronExpr::parse(&schedule.cron_expression)
            .ok()
            .and_then(|cron| cron.next_after_ms(self.clock.epoch_ms()));
        if let Err(e) = self
            .store
            .put(collections::SCHEDULES, schedule.id.as_str(), &schedule)
        {
            tracing::warn!(schedule = %schedule.id, error = %e, "schedule timestamps persist failed");
        }
    }

    /// Abort every trigger (daemon shutdown).
    pub fn shutdown(&self) {
        let mut triggers = self.triggers.lock();
        for (_, handle) in triggers.drain() {
            handle.abort();
        }
    }
}

impl<D, M, C> Drop for ScheduleManager<D, M, C>
where
    D: AutomationDriver,
    M: TemplateMatcher,
    C: Clock,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the orchestration core

use thiserror::Error;

use dl_core::{DeviceId, ExecutionId, QueueId, ScenarioId, ScheduleId};
use dl_driver::DriverError;
use dl_scenario::ScenarioError;
use dl_storage::StorageError;

/// Errors that can occur in the engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no session for device: {0}")]
    SessionNotFound(DeviceId),
    #[error("session creation failed for {device}: {reason}")]
    SessionCreationFailed { device: DeviceId, reason: String },
    #[error("scenario not found: {0}")]
    ScenarioNotFound(ScenarioId),
    #[error("no scenarios could be resolved")]
    NoScenarios,
    #[error("no valid devices: {0}")]
    NoValidDevices(String),
    #[error("a parallel run is already in progress")]
    DispatcherBusy,
    #[error("queue item not found: {0}")]
    QueueItemNotFound(QueueId),
    #[error("only the submitting client may cancel {0}")]
    OwnerMismatch(QueueId),
    #[error("execution not found: {0}")]
    ExecutionNotFound(ExecutionId),
    #[error("schedule not found: {0}")]
    ScheduleNotFound(ScheduleId),
    #[error("invalid cron expression: {0}")]
    InvalidCron(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),
    #[error("scenario error: {0}")]
    Scenario(#[from] ScenarioError),
}

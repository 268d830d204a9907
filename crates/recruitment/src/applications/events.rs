use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::info;

use super::domain::{ApplicantId, ApplicationStatus, Timestamp};

/// Emitted after a status change has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChangeEvent {
    pub applicant_id: ApplicantId,
    pub previous: ApplicationStatus,
    pub current: ApplicationStatus,
    pub last_modified_at: Timestamp,
}

/// Outbound hook for committed status changes (audit log, notifications).
pub trait StatusEventSink: Send + Sync {
    fn publish(&self, event: StatusChangeEvent) -> Result<(), EventError>;
}

/// Event dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("event transport unavailable: {0}")]
    Transport(String),
}

/// Writes each event as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl StatusEventSink for TracingEventSink {
    fn publish(&self, event: StatusChangeEvent) -> Result<(), EventError> {
        info!(
            target: "recruitment::audit",
            applicant_id = event.applicant_id.0,
            previous = %event.previous,
            current = %event.current,
            last_modified_at = %event.last_modified_at,
            "application status changed"
        );
        Ok(())
    }
}

/// Keeps events in memory so callers can inspect what was published.
#[derive(Debug, Default, Clone)]
pub struct RecordingEventSink {
    events: Arc<Mutex<Vec<StatusChangeEvent>>>,
}

impl RecordingEventSink {
    pub fn events(&self) -> Vec<StatusChangeEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl StatusEventSink for RecordingEventSink {
    fn publish(&self, event: StatusChangeEvent) -> Result<(), EventError> {
        let mut guard = self
            .events
            .lock()
            .map_err(|_| EventError::Transport("event buffer mutex poisoned".to_string()))?;
        guard.push(event);
        Ok(())
    }
}

use std::{
    net::IpAddr,
    sync::{PoisonError, RwLock},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::access::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    pub actor: Option<UserId>,
    pub action: String,
    pub origin: Option<IpAddr>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit log is unavailable: {0}")]
    Unavailable(String),
}

/// Append-only destination for audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError>;

    /// All recorded events, newest first.
    fn list(&self) -> Result<Vec<AuditEvent>, AuditError>;
}

#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    events: RwLock<Vec<AuditEvent>>,
}

impl InMemoryAuditLog {
    pub fn len(&self) -> usize {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for InMemoryAuditLog {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.events
            .write()
            .map_err(|err| AuditError::Unavailable(err.to_string()))?
            .push(event);
        Ok(())
    }

    fn list(&self) -> Result<Vec<AuditEvent>, AuditError> {
        let events = self
            .events
            .read()
            .map_err(|err| AuditError::Unavailable(err.to_string()))?;
        let mut newest_first: Vec<AuditEvent> = events.iter().rev().cloned().collect();
        // stable, so events sharing a timestamp stay in reverse insertion order
        newest_first.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(newest_first)
    }
}

//! Roster Audit - append-only audit sink.
//!
//! Every mutation operator and every auto-fix correction emits one
//! [`AuditLogEntry`](roster_types::AuditLogEntry) through an [`AuditSink`].
//! Emission is fire-and-forget from the caller's point of view: a sink
//! failure is logged and never blocks or rolls back the mutation that
//! produced the entry.
//!
//! Two sinks are provided:
//!
//! - [`InMemoryAuditSink`]: retains entries for tests and operator queries
//! - [`TracingAuditSink`]: forwards entries to the `tracing` subscriber

#![deny(unsafe_code)]

use async_trait::async_trait;
use roster_types::AuditLogEntry;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

/// Errors from an audit sink.
///
/// Callers treat these as non-fatal: the entry is dropped and the failure
/// is logged.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

/// Append-only destination for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one write-once entry.
    async fn emit(&self, entry: AuditLogEntry) -> Result<(), AuditError>;
}

/// Sink that retains every entry in memory.
#[derive(Default)]
pub struct InMemoryAuditSink {
    entries: RwLock<Vec<AuditLogEntry>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries, oldest first.
    pub async fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries.read().await.clone()
    }

    /// Number of entries recorded so far.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn emit(&self, entry: AuditLogEntry) -> Result<(), AuditError> {
        self.entries.write().await.push(entry);
        Ok(())
    }
}

/// Sink that forwards entries to the active `tracing` subscriber.
///
/// Useful where the real audit writer lives in another service and local
/// visibility is all that is needed.
#[derive(Default)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn emit(&self, entry: AuditLogEntry) -> Result<(), AuditError> {
        info!(
            action = %entry.action,
            entity_type = ?entry.entity_type,
            entity_id = %entry.entity_id,
            actor = %entry.actor,
            details = entry.details.as_deref().unwrap_or(""),
            "audit entry"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_types::{AuditAction, AuditEntityType};

    fn entry(actor: &str) -> AuditLogEntry {
        AuditLogEntry::new(
            AuditAction::Create,
            AuditEntityType::Association,
            "assoc-1",
            actor,
        )
    }

    #[tokio::test]
    async fn in_memory_sink_retains_entries_in_order() {
        let sink = InMemoryAuditSink::new();
        sink.emit(entry("first")).await.unwrap();
        sink.emit(entry("second")).await.unwrap();

        let entries = sink.entries().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].actor, "first");
        assert_eq!(entries[1].actor, "second");
    }

    #[tokio::test]
    async fn tracing_sink_accepts_entries() {
        let sink = TracingAuditSink::new();
        sink.emit(entry("maria")).await.unwrap();
    }
}

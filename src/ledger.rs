//! Spend ledger output.
//!
//! The coordinator produces one [`SpendLedgerEntry`] per completed attempt and
//! hands it to a [`SpendSink`]. Storing entries is the caller's business; this
//! module only defines the record and a few sinks.
//!
//! | Sink | Description |
//! |------|-------------|
//! | [`NoopSpendSink`] | Discards entries (default) |
//! | [`InMemorySpendSink`] | Bounded in-memory buffer, for tests and status pages |
//! | [`TracingSpendSink`] | Emits each entry as a `tracing` event |
//! | [`CompositeSpendSink`] | Fans out to several sinks |

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpendStatus {
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

/// Immutable record of one completed attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendLedgerEntry {
    pub request_id: Uuid,
    pub backend: String,
    pub model: String,
    /// Zero when the attempt failed or was refunded.
    pub cost_charged: Decimal,
    pub status: SpendStatus,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait SpendSink: Send + Sync {
    async fn record(&self, entry: SpendLedgerEntry) -> Result<()>;
    async fn record_batch(&self, entries: Vec<SpendLedgerEntry>) -> Result<()> {
        for e in entries {
            self.record(e).await?;
        }
        Ok(())
    }
}

pub struct NoopSpendSink;

#[async_trait]
impl SpendSink for NoopSpendSink {
    async fn record(&self, _: SpendLedgerEntry) -> Result<()> {
        Ok(())
    }
}

pub fn noop_sink() -> Arc<dyn SpendSink> {
    Arc::new(NoopSpendSink)
}

/// Keeps the most recent `max_entries` entries.
pub struct InMemorySpendSink {
    entries: RwLock<VecDeque<SpendLedgerEntry>>,
    max_entries: usize,
}

impl InMemorySpendSink {
    pub fn new(max: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            max_entries: max,
        }
    }

    pub fn entries(&self) -> Vec<SpendLedgerEntry> {
        self.entries
            .read()
            .map(|e| e.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn entries_for(&self, request_id: Uuid) -> Vec<SpendLedgerEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.request_id == request_id)
            .collect()
    }

    /// Sum of `cost_charged` over retained entries.
    pub fn total_charged(&self) -> Decimal {
        self.entries().iter().map(|e| e.cost_charged).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SpendSink for InMemorySpendSink {
    async fn record(&self, entry: SpendLedgerEntry) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| crate::Error::poisoned("spend_sink"))?;
        entries.push_back(entry);
        while entries.len() > self.max_entries {
            entries.pop_front();
        }
        Ok(())
    }
}

pub struct TracingSpendSink;

#[async_trait]
impl SpendSink for TracingSpendSink {
    async fn record(&self, entry: SpendLedgerEntry) -> Result<()> {
        info!(
            request_id = %entry.request_id,
            backend = entry.backend.as_str(),
            model = entry.model.as_str(),
            cost = %entry.cost_charged,
            status = ?entry.status,
            "spend"
        );
        Ok(())
    }
}

/// Fans entries out; a failing sink does not stop the others.
#[derive(Default)]
pub struct CompositeSpendSink {
    sinks: Vec<Arc<dyn SpendSink>>,
}

impl CompositeSpendSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sink(mut self, sink: Arc<dyn SpendSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl SpendSink for CompositeSpendSink {
    async fn record(&self, entry: SpendLedgerEntry) -> Result<()> {
        for s in &self.sinks {
            if let Err(e) = s.record(entry.clone()).await {
                warn!(error = %e, request_id = %entry.request_id, "spend sink failed, continuing fan-out");
            }
        }
        Ok(())
    }
}

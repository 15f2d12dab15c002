use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local, SubsecRound};
use tracemsg_core::{DateRange, NewTrace, TraceError, TraceMessage, TraceStore, TraceStream};

/// Source of the server time stamped onto inserted traces.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock at the host's local offset.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Orchestration between the HTTP layer and the store gateway.
#[derive(Clone)]
pub struct TraceService {
    store: Arc<dyn TraceStore>,
    clock: Arc<dyn Clock>,
}

impl TraceService {
    pub fn new(store: Arc<dyn TraceStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn TraceStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Stamp the current server time and persist.
    ///
    /// The timestamp is truncated to milliseconds, the precision the store
    /// keeps, so the returned record matches what a later query yields.
    pub async fn insert(&self, new: NewTrace) -> Result<TraceMessage, TraceError> {
        let record = new.stamped(self.clock.now().trunc_subsecs(3));

        tracing::info!(
            session_id = %record.session_id,
            payload_len = record.payload.len(),
            ts = %record.ts.to_rfc3339(),
            backend = self.store.name(),
            "Inserting trace message"
        );

        match self.store.insert(record).await {
            Ok(saved) => {
                tracing::debug!(id = ?saved.id, "Trace message stored");
                Ok(saved)
            }
            Err(e) => {
                tracing::error!(error = %e, "Trace insert failed");
                Err(e)
            }
        }
    }

    pub async fn find_in_range(&self, range: &DateRange) -> Result<TraceStream, TraceError> {
        tracing::info!(
            from = %range.from.to_rfc3339(),
            to = %range.to.to_rfc3339(),
            backend = self.store.name(),
            "Querying trace messages by range"
        );

        self.store.find_by_timestamp_range(range).await.map_err(|e| {
            tracing::error!(error = %e, "Trace range query failed");
            e
        })
    }
}

//! Per-stream projection cursors.
//!
//! A cursor tracks the last sequence number a projection applied for one
//! (tenant, aggregate) stream. Replays at or below the cursor are skipped;
//! gaps are rejected.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use realty_core::{AggregateId, TenantId};
use realty_events::EventEnvelope;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: RwLock<HashMap<CursorKey, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> u64 {
        self.inner
            .read()
            .ok()
            .and_then(|c| c.get(&CursorKey { tenant_id, aggregate_id }).copied())
            .unwrap_or(0)
    }

    /// Whether `seq` is the next event to apply.
    ///
    /// `Ok(false)` means the event was already applied.
    pub fn should_apply(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        seq: u64,
    ) -> Result<bool, ProjectionError> {
        let last = self.get(tenant_id, aggregate_id);
        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(false);
        }
        if seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        Ok(true)
    }

    pub fn advance(&self, tenant_id: TenantId, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.insert(CursorKey { tenant_id, aggregate_id }, seq);
        }
    }

    pub fn clear_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.retain(|k, _| k.tenant_id != tenant_id);
        }
    }
}

/// Distinct tenants of `envelopes`, plus the envelopes in replay order
/// (tenant, aggregate, sequence).
pub(crate) fn replay_order(
    envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
) -> (Vec<TenantId>, Vec<EventEnvelope<JsonValue>>) {
    let mut envs: Vec<_> = envelopes.into_iter().collect();

    let mut tenants = envs.iter().map(|e| e.tenant_id()).collect::<Vec<_>>();
    tenants.sort_by_key(|t| *t.as_uuid().as_bytes());
    tenants.dedup();

    envs.sort_by_key(|e| {
        (
            *e.tenant_id().as_uuid().as_bytes(),
            *e.aggregate_id().as_uuid().as_bytes(),
            e.sequence_number(),
        )
    });
    (tenants, envs)
}

/// Envelope tenant/aggregate must match the coordinates carried by the event.
pub(crate) fn ensure_same_stream(
    envelope: &EventEnvelope<JsonValue>,
    tenant_id: TenantId,
    aggregate_id: AggregateId,
) -> Result<(), ProjectionError> {
    if envelope.tenant_id() != tenant_id {
        return Err(ProjectionError::TenantIsolation(
            "event tenant_id does not match envelope tenant_id".to_string(),
        ));
    }
    if envelope.aggregate_id() != aggregate_id {
        return Err(ProjectionError::TenantIsolation(
            "event aggregate id does not match envelope aggregate_id".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_skips_replays_and_rejects_gaps() {
        let cursors = StreamCursors::new();
        let (tenant_id, aggregate_id) = (TenantId::new(), AggregateId::new());

        assert!(cursors.should_apply(tenant_id, aggregate_id, 1).unwrap());
        cursors.advance(tenant_id, aggregate_id, 1);

        assert!(!cursors.should_apply(tenant_id, aggregate_id, 1).unwrap());
        assert!(matches!(
            cursors.should_apply(tenant_id, aggregate_id, 3),
            Err(ProjectionError::NonMonotonicSequence { last: 1, found: 3 })
        ));
        assert!(cursors.should_apply(tenant_id, aggregate_id, 0).is_err());
    }

    #[test]
    fn clearing_a_tenant_resets_its_cursors() {
        let cursors = StreamCursors::new();
        let (a, b, aggregate_id) = (TenantId::new(), TenantId::new(), AggregateId::new());
        cursors.advance(a, aggregate_id, 4);
        cursors.advance(b, aggregate_id, 2);

        cursors.clear_tenant(a);

        assert_eq!(cursors.get(a, aggregate_id), 0);
        assert_eq!(cursors.get(b, aggregate_id), 2);
    }
}

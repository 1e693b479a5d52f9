use std::collections::HashMap;
use std::sync::RwLock;

use realty_core::{AggregateId, ExpectedVersion, TenantId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

/// In-memory append-only event store.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<StreamKey, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }

    /// Every event of a tenant, grouped by stream, for read-model rebuilds.
    pub fn load_tenant(&self, tenant_id: TenantId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        let mut events: Vec<StoredEvent> = streams
            .iter()
            .filter(|(key, _)| key.tenant_id == tenant_id)
            .flat_map(|(_, stream)| stream.iter().cloned())
            .collect();
        events.sort_by_key(|e| (*e.aggregate_id.as_uuid(), e.sequence_number));
        Ok(events)
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let Some(first) = events.first() else {
            return Ok(vec![]);
        };

        // All events must target the same tenant + aggregate stream.
        let tenant_id = first.tenant_id;
        let aggregate_id = first.aggregate_id;
        let aggregate_type = first.aggregate_type.clone();

        for (idx, e) in events.iter().enumerate() {
            if e.tenant_id != tenant_id {
                return Err(EventStoreError::TenantIsolation(format!(
                    "batch contains multiple tenant_ids (index {idx})"
                )));
            }
            if e.aggregate_id != aggregate_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch contains multiple aggregate_ids (index {idx})"
                )));
            }
            if e.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "batch contains multiple aggregate_types (index {idx})"
                )));
            }
        }

        let key = StreamKey {
            tenant_id,
            aggregate_id,
        };

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        let stream = streams.entry(key).or_default();
        let current = Self::current_version(stream);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        if let Some(existing) = stream.first() {
            if existing.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{}', attempted append with '{}'",
                    existing.aggregate_type, aggregate_type
                )));
            }
        }

        let committed: Vec<StoredEvent> = events
            .into_iter()
            .zip(current + 1..)
            .map(|(e, sequence_number)| StoredEvent {
                event_id: e.event_id,
                tenant_id: e.tenant_id,
                aggregate_id: e.aggregate_id,
                aggregate_type: e.aggregate_type,
                sequence_number,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            })
            .collect();
        stream.extend(committed.iter().cloned());

        Ok(committed)
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let key = StreamKey {
            tenant_id,
            aggregate_id,
        };

        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        Ok(streams.get(&key).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn event(tenant_id: TenantId, aggregate_id: AggregateId, aggregate_type: &str) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            tenant_id,
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            event_type: "estate.property.created".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: serde_json::json!({}),
        }
    }

    #[test]
    fn append_assigns_consecutive_sequence_numbers() {
        let store = InMemoryEventStore::new();
        let (tenant_id, aggregate_id) = (TenantId::new(), AggregateId::new());

        let first = store
            .append(
                vec![
                    event(tenant_id, aggregate_id, "estate.property"),
                    event(tenant_id, aggregate_id, "estate.property"),
                ],
                ExpectedVersion::Exact(0),
            )
            .unwrap();
        let second = store
            .append(
                vec![event(tenant_id, aggregate_id, "estate.property")],
                ExpectedVersion::Exact(2),
            )
            .unwrap();

        assert_eq!(first.iter().map(|e| e.sequence_number).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(second[0].sequence_number, 3);
        assert_eq!(store.load_stream(tenant_id, aggregate_id).unwrap().len(), 3);
    }

    #[test]
    fn stale_expected_version_is_rejected_and_nothing_is_written() {
        let store = InMemoryEventStore::new();
        let (tenant_id, aggregate_id) = (TenantId::new(), AggregateId::new());
        store
            .append(vec![event(tenant_id, aggregate_id, "estate.property")], ExpectedVersion::Exact(0))
            .unwrap();

        let err = store
            .append(vec![event(tenant_id, aggregate_id, "estate.property")], ExpectedVersion::Exact(0))
            .unwrap_err();

        assert!(matches!(err, EventStoreError::Concurrency(_)));
        assert_eq!(store.load_stream(tenant_id, aggregate_id).unwrap().len(), 1);
    }

    #[test]
    fn mixed_tenant_batch_is_rejected() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        let err = store
            .append(
                vec![
                    event(TenantId::new(), aggregate_id, "estate.property"),
                    event(TenantId::new(), aggregate_id, "estate.property"),
                ],
                ExpectedVersion::Any,
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::TenantIsolation(_)));
    }

    #[test]
    fn streams_are_tenant_scoped() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();
        let (tenant_a, tenant_b) = (TenantId::new(), TenantId::new());
        store
            .append(vec![event(tenant_a, aggregate_id, "invoicing.invoice")], ExpectedVersion::Any)
            .unwrap();

        assert!(store.load_stream(tenant_b, aggregate_id).unwrap().is_empty());
        assert_eq!(store.load_tenant(tenant_a).unwrap().len(), 1);
        assert!(store.load_tenant(tenant_b).unwrap().is_empty());
    }

    #[test]
    fn aggregate_type_is_stable_per_stream() {
        let store = InMemoryEventStore::new();
        let (tenant_id, aggregate_id) = (TenantId::new(), AggregateId::new());
        store
            .append(vec![event(tenant_id, aggregate_id, "estate.property")], ExpectedVersion::Any)
            .unwrap();

        let err = store
            .append(vec![event(tenant_id, aggregate_id, "products.product")], ExpectedVersion::Any)
            .unwrap_err();
        assert!(matches!(err, EventStoreError::AggregateTypeMismatch(_)));
    }
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use realty_core::{AggregateId, TenantId};

/// Envelope for an event, containing multi-tenant + stream metadata.
///
/// This is the unit read models consume.
///
/// Notes:
/// - **Multi-tenancy** is carried here via `tenant_id`.
/// - `sequence_number` is monotonically increasing per stream.
/// - `payload` is the domain-agnostic event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    tenant_id: TenantId,

    aggregate_id: AggregateId,
    aggregate_type: String,

    /// Monotonically increasing position in the aggregate stream.
    sequence_number: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            tenant_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }

    /// Transform the payload, keeping the stream metadata.
    pub fn map<F, T>(self, f: F) -> EventEnvelope<T>
    where
        F: FnOnce(E) -> T,
    {
        EventEnvelope {
            event_id: self.event_id,
            tenant_id: self.tenant_id,
            aggregate_id: self.aggregate_id,
            aggregate_type: self.aggregate_type,
            sequence_number: self.sequence_number,
            payload: f(self.payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_keeps_stream_metadata() {
        let tenant_id = TenantId::new();
        let aggregate_id = AggregateId::new();
        let env = EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            aggregate_id,
            "estate.property",
            3,
            serde_json::json!({ "price": 1 }),
        );

        let mapped = env.clone().map(|v| v["price"].as_i64().unwrap_or_default());
        assert_eq!(mapped.tenant_id(), tenant_id);
        assert_eq!(mapped.aggregate_id(), aggregate_id);
        assert_eq!(mapped.aggregate_type(), "estate.property");
        assert_eq!(mapped.sequence_number(), 3);
        assert_eq!(*mapped.payload(), 1);
        assert_eq!(mapped.event_id(), env.event_id());
    }
}

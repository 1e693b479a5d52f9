//! Command execution pipeline.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load events from store (tenant-scoped)
//!   ↓
//! 2. Rehydrate aggregate
//!   ↓
//! 3. Handle command (pure decision logic, produces events)
//!   ↓
//! 4. Persist events to store (append-only, optimistic concurrency check)
//! ```
//!
//! Read models are updated by the caller from the returned committed events.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use realty_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, TenantId};
use realty_estate::EstateError;

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Optimistic concurrency failure (stale aggregate version).
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// Cross-tenant or cross-aggregate stream mixing.
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("not found")]
    NotFound,

    /// Domain-level conflict (duplicate id or name, document already sent).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Module-specific rule violation, carried with its stable code.
    #[error("{message}")]
    Rejected { code: &'static str, message: String },

    /// Historical payload does not match the aggregate event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    #[error(transparent)]
    Store(EventStoreError),
}

impl DispatchError {
    /// Stable machine-readable code (used by the HTTP layer).
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::Concurrency(_) => "concurrency_conflict",
            DispatchError::TenantIsolation(_) => "tenant_isolation",
            DispatchError::Validation(_) => "validation_error",
            DispatchError::InvariantViolation(_) => "invariant_violation",
            DispatchError::NotFound => "not_found",
            DispatchError::Conflict(_) => "conflict",
            DispatchError::Rejected { code, .. } => code,
            DispatchError::Deserialize(_) => "deserialize_error",
            DispatchError::Store(_) => "store_error",
        }
    }
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            EventStoreError::TenantIsolation(msg) => DispatchError::TenantIsolation(msg),
            EventStoreError::Decode(msg) => DispatchError::Deserialize(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Conflict(msg),
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

impl From<EstateError> for DispatchError {
    fn from(value: EstateError) -> Self {
        match value {
            EstateError::Domain(e) => e.into(),
            other => DispatchError::Rejected {
                code: other.code(),
                message: other.to_string(),
            },
        }
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Events are persisted with `ExpectedVersion::Exact(loaded_version)`, so two
/// commands racing on the same stream cannot both commit.
#[derive(Debug)]
pub struct CommandDispatcher<S> {
    store: S,
}

impl<S> CommandDispatcher<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S> CommandDispatcher<S>
where
    S: EventStore,
{
    /// Run `command` against the aggregate and persist the decided events.
    ///
    /// Returns the committed events (with their sequence numbers). A command
    /// that decides nothing (a no-op) commits nothing and returns an empty
    /// vector.
    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: &A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate,
        A::Error: Into<DispatchError>,
        A::Event: realty_events::Event + Serialize + DeserializeOwned,
    {
        let (aggregate, version) = self.rehydrate(tenant_id, aggregate_id, make_aggregate)?;

        let decided = aggregate.handle(command).map_err(|e| {
            let err: DispatchError = e.into();
            tracing::debug!(
                %tenant_id,
                %aggregate_id,
                aggregate_type,
                code = err.code(),
                "command rejected"
            );
            err
        })?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    tenant_id,
                    aggregate_id,
                    aggregate_type,
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self
            .store
            .append(uncommitted, ExpectedVersion::Exact(version))
            .inspect_err(|e| {
                tracing::warn!(%tenant_id, %aggregate_id, aggregate_type, error = %e, "append failed");
            })?;

        tracing::debug!(
            %tenant_id,
            %aggregate_id,
            aggregate_type,
            events = committed.len(),
            version = stream_version(&committed),
            "events committed"
        );
        Ok(committed)
    }

    /// Current state of an aggregate, or `NotFound` when its stream is empty.
    pub fn load_aggregate<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let (aggregate, version) = self.rehydrate(tenant_id, aggregate_id, make_aggregate)?;
        if version == 0 {
            return Err(DispatchError::NotFound);
        }
        Ok(aggregate)
    }

    fn rehydrate<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<(A, u64), DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;

        let mut aggregate = make_aggregate(aggregate_id);
        for stored in &history {
            let ev: A::Event = serde_json::from_value(stored.payload.clone())
                .map_err(|e| DispatchError::Deserialize(format!("{}: {e}", stored.event_type)))?;
            aggregate.apply(&ev);
        }
        Ok((aggregate, stream_version(&history)))
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Enforced even if a buggy backend returns cross-tenant data.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.tenant_id != tenant_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong tenant_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number != last + 1 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "gap in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

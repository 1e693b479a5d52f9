//! Entity trait: identity + continuity across state changes.
//!
//! Child records owned by an aggregate (e.g. the offers of a property) are
//! entities: they are addressed by id inside their aggregate, but never loaded
//! or persisted on their own.

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// Find an entity by id in a slice of entities.
pub fn find_by_id<'a, E: Entity>(entities: &'a [E], id: &E::Id) -> Option<&'a E> {
    entities.iter().find(|e| e.id() == id)
}

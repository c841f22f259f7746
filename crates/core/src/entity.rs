//! Entity trait: identity + continuity across state changes.
//!
//! Line items are entities owned by their parent aggregate: they keep their
//! `line_no` while quantity, price or discount change.

/// Entity marker + minimal interface.
pub trait Entity {
    /// Identifier, unique within the owning aggregate.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// Find an entity by id in a slice of entities.
pub fn find_by_id<'a, E: Entity>(items: &'a [E], id: &E::Id) -> Option<&'a E> {
    items.iter().find(|item| item.id() == id)
}

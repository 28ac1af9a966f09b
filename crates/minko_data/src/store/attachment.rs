//! Attachment bookkeeping: which providers and collections a store observes.

use std::rc::Rc;

use crate::collection::CollectionPtr;
use crate::provider::ProviderPtr;
use crate::signal::SignalSlot;

/// Where a provider is exposed.
#[derive(Clone, Debug)]
pub(crate) enum Scope {
    /// Directly attached: properties visible under their bare names.
    Root,
    /// Member of an attached collection.
    Collection(CollectionPtr),
}

impl Scope {
    pub(crate) fn matches(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Root, Self::Root) => true,
            (Self::Collection(a), Self::Collection(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// One (provider, scope) pair the store subscribes to.
///
/// Attaching the same provider to the same scope again only bumps `count`,
/// so provider events are forwarded once per scope.
pub(crate) struct Attachment {
    pub(crate) provider: ProviderPtr,
    pub(crate) scope: Scope,
    pub(crate) count: usize,
    /// Added, changed and removed forwarding slots.
    _slots: [SignalSlot; 3],
}

impl Attachment {
    pub(crate) fn new(provider: ProviderPtr, scope: Scope, slots: [SignalSlot; 3]) -> Self {
        Self {
            provider,
            scope,
            count: 1,
            _slots: slots,
        }
    }

    pub(crate) fn is(&self, provider: &ProviderPtr, scope: &Scope) -> bool {
        Rc::ptr_eq(&self.provider, provider) && self.scope.matches(scope)
    }
}

/// An attached collection and its item forwarding slots.
pub(crate) struct AttachedCollection {
    pub(crate) collection: CollectionPtr,
    _slots: [SignalSlot; 2],
}

impl AttachedCollection {
    pub(crate) fn new(collection: CollectionPtr, slots: [SignalSlot; 2]) -> Self {
        Self {
            collection,
            _slots: slots,
        }
    }
}

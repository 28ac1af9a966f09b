//! # Collections
//!
//! A named, ordered, observable sequence of providers.
//!
//! Once attached to a store, every item exposes its properties at
//! `name[index].property` and `name[uuid].property`, and the store keeps a
//! read-only `name.length` property up to date.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::{DataError, DataResult};
use crate::provider::ProviderPtr;
use crate::signal::Signal;

/// Shared collection handle.
pub type CollectionPtr = Rc<Collection>;

/// Payload of the collection signals.
#[derive(Clone, Debug)]
pub struct CollectionEvent {
    /// The collection that changed.
    pub collection: CollectionPtr,
    /// The provider inserted or removed.
    pub provider: ProviderPtr,
    /// Index the provider was inserted at, or removed from.
    pub index: usize,
}

/// An ordered list of providers under one name.
///
/// The same provider may appear several times.
pub struct Collection {
    name: String,
    items: RefCell<Vec<ProviderPtr>>,
    item_added: Signal<CollectionEvent>,
    item_removed: Signal<CollectionEvent>,
    this: Weak<Collection>,
}

impl Collection {
    /// Creates an empty collection.
    #[allow(clippy::new_ret_no_self)]
    #[must_use]
    pub fn new(name: impl Into<String>) -> CollectionPtr {
        let name = name.into();
        Rc::new_cyclic(|this| Self {
            name,
            items: RefCell::new(Vec::new()),
            item_added: Signal::new(),
            item_removed: Signal::new(),
            this: this.clone(),
        })
    }

    /// Collection name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the items.
    #[must_use]
    pub fn items(&self) -> Vec<ProviderPtr> {
        self.items.borrow().clone()
    }

    /// Number of items.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    /// Returns true if the collection holds no item.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Item at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<ProviderPtr> {
        self.items.borrow().get(index).cloned()
    }

    /// First item.
    #[must_use]
    pub fn front(&self) -> Option<ProviderPtr> {
        self.items.borrow().first().cloned()
    }

    /// Last item.
    #[must_use]
    pub fn back(&self) -> Option<ProviderPtr> {
        self.items.borrow().last().cloned()
    }

    /// Returns true if `provider` appears at least once.
    #[must_use]
    pub fn contains(&self, provider: &ProviderPtr) -> bool {
        self.position(provider).is_some()
    }

    /// Index of the first occurrence of `provider`.
    #[must_use]
    pub fn position(&self, provider: &ProviderPtr) -> Option<usize> {
        self.items
            .borrow()
            .iter()
            .position(|item| Rc::ptr_eq(item, provider))
    }

    /// Every index at which `provider` appears, ascending.
    #[must_use]
    pub fn positions(&self, provider: &ProviderPtr) -> Vec<usize> {
        self.items
            .borrow()
            .iter()
            .enumerate()
            .filter(|(_, item)| Rc::ptr_eq(item, provider))
            .map(|(index, _)| index)
            .collect()
    }

    /// Looks an item up by uuid.
    #[must_use]
    pub fn find_by_uuid(&self, uuid: &str) -> Option<ProviderPtr> {
        self.items
            .borrow()
            .iter()
            .find(|item| item.uuid() == uuid)
            .cloned()
    }

    /// Appends a provider.
    ///
    /// # Returns
    ///
    /// `self`, for chaining.
    pub fn push_back(&self, provider: ProviderPtr) -> &Self {
        let index = {
            let mut items = self.items.borrow_mut();
            items.push(Rc::clone(&provider));
            items.len() - 1
        };
        self.notify(&self.item_added, provider, index);
        self
    }

    /// Inserts a provider at `index`, shifting later items.
    ///
    /// # Errors
    ///
    /// `IndexOutOfRange` if `index > len()`.
    pub fn insert(&self, index: usize, provider: ProviderPtr) -> DataResult<&Self> {
        {
            let mut items = self.items.borrow_mut();
            if index > items.len() {
                return Err(DataError::IndexOutOfRange {
                    index,
                    len: items.len(),
                });
            }
            items.insert(index, Rc::clone(&provider));
        }
        self.notify(&self.item_added, provider, index);
        Ok(self)
    }

    /// Removes the first occurrence of `provider`.
    ///
    /// # Returns
    ///
    /// The index it was removed from.
    ///
    /// # Errors
    ///
    /// `ProviderNotFound` if the provider is not in the collection.
    pub fn remove(&self, provider: &ProviderPtr) -> DataResult<usize> {
        let index = self
            .position(provider)
            .ok_or_else(|| DataError::ProviderNotFound {
                context: format!("collection {}", self.name),
            })?;
        self.erase(index)?;
        Ok(index)
    }

    /// Removes the item at `index`, shifting later items.
    ///
    /// # Errors
    ///
    /// `IndexOutOfRange` if there is no item at `index`.
    pub fn erase(&self, index: usize) -> DataResult<ProviderPtr> {
        let provider = {
            let mut items = self.items.borrow_mut();
            if index >= items.len() {
                return Err(DataError::IndexOutOfRange {
                    index,
                    len: items.len(),
                });
            }
            items.remove(index)
        };
        self.notify(&self.item_removed, Rc::clone(&provider), index);
        Ok(provider)
    }

    /// Removes every item, back to front.
    pub fn clear(&self) {
        while let Some(last) = self.len().checked_sub(1) {
            // Cannot fail: `last` is in range.
            let _ = self.erase(last);
        }
    }

    /// Fired after an item is inserted.
    #[inline]
    #[must_use]
    pub fn item_added(&self) -> &Signal<CollectionEvent> {
        &self.item_added
    }

    /// Fired after an item is removed.
    #[inline]
    #[must_use]
    pub fn item_removed(&self) -> &Signal<CollectionEvent> {
        &self.item_removed
    }

    fn notify(&self, signal: &Signal<CollectionEvent>, provider: ProviderPtr, index: usize) {
        if signal.num_callbacks() == 0 {
            return;
        }
        let Some(collection) = self.this.upgrade() else {
            return;
        };
        signal.execute(&CollectionEvent {
            collection,
            provider,
            index,
        });
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("len", &self.len())
            .finish()
    }
}

//! # Store
//!
//! The flat, path-addressed property namespace of a scene node.
//!
//! A store aggregates providers and collections:
//!
//! - Directly attached providers expose their properties by bare name
//! - Collection items expose theirs at `name[index].property` and
//!   `name[uuid].property`, plus a read-only `name.length`
//!
//! Every change is reported twice: on the per-path signal of the affected
//! path (if anybody asked for it) and then on the catch-all signal.
//! A property entering the namespace fires added then changed; a property
//! leaving it fires changed then removed.
//!
//! Per-path signals are created on demand and released once they have no
//! callback, no outside handle and their path no longer resolves.
//!
//! ## Example
//!
//! ```rust,ignore
//! let store = Store::new();
//! let material = Provider::new();
//! material.set("diffuseColor", [1.0f32, 0.0, 0.0, 1.0]);
//!
//! let _slot = store
//!     .property_changed_at("material[0].diffuseColor")
//!     .connect(|event| println!("{} changed", event.path));
//!
//! store.add_provider_to_collection(&material, "material");
//! assert_eq!(store.get::<u32>("material.length")?, 1);
//! ```

mod attachment;
mod registry;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::collection::{Collection, CollectionEvent, CollectionPtr};
use crate::error::{DataError, DataResult};
use crate::path::{item_path, length_path, uuid_path, ItemKey, PropertyPath};
use crate::provider::{Provider, ProviderEvent, ProviderPtr};
use crate::signal::{Signal, SignalSlot};
use crate::value::{Property, ValueSlot};

use attachment::{AttachedCollection, Attachment, Scope};
use registry::{SignalFamily, SignalRegistry};

/// Payload of every store signal.
#[derive(Clone, Debug)]
pub struct PropertyEvent {
    /// The store that emitted the notification.
    pub store: Store,
    /// The provider holding the property.
    pub provider: ProviderPtr,
    /// The property name on the provider.
    pub property_name: String,
    /// The store path the notification is about.
    pub path: String,
}

/// Path-addressed aggregation of providers and collections.
///
/// `Store` is a shared handle: clones refer to the same namespace.
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

struct StoreInner {
    state: RefCell<StoreState>,
    registry: RefCell<SignalRegistry>,
    property_added: Signal<PropertyEvent>,
    property_changed: Signal<PropertyEvent>,
    property_removed: Signal<PropertyEvent>,
}

#[derive(Default)]
struct StoreState {
    /// Every attachment occurrence, direct or through a collection.
    providers: Vec<ProviderPtr>,
    /// Unique (provider, scope) subscriptions, in first-attach order.
    attachments: Vec<Attachment>,
    collections: Vec<AttachedCollection>,
    /// Internal provider holding the `name.length` properties.
    length_provider: Option<ProviderPtr>,
}

type ProviderHandler = fn(&Store, &ProviderPtr, &Scope, &str);
type CollectionHandler = fn(&Store, &CollectionPtr, &ProviderPtr, usize);

impl Store {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(StoreInner {
                state: RefCell::new(StoreState::default()),
                registry: RefCell::new(SignalRegistry::default()),
                property_added: Signal::new(),
                property_changed: Signal::new(),
                property_removed: Signal::new(),
            }),
        }
    }

    /// Returns true if both handles refer to the same store.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // =========================================================================
    // READ / WRITE
    // =========================================================================

    /// Reads a copy of the value at `path`.
    ///
    /// # Errors
    ///
    /// `InvalidPath`, `PropertyNotFound` or `TypeMismatch`.
    pub fn get<T: Property>(&self, path: &str) -> DataResult<T> {
        let (provider, name) = self.locate(path)?;
        provider.get::<T>(&name).map_err(|err| at_path(err, path))
    }

    /// Returns the stable address of the value at `path`.
    ///
    /// The address stays valid while the property keeps its type and the
    /// providing provider keeps it.
    ///
    /// # Errors
    ///
    /// `InvalidPath`, `PropertyNotFound` or `TypeMismatch`.
    pub fn get_pointer<T: Property>(&self, path: &str) -> DataResult<*const T> {
        let (provider, name) = self.locate(path)?;
        provider.get_pointer::<T>(&name).map_err(|err| at_path(err, path))
    }

    /// Returns the cell backing the value at `path`.
    #[must_use]
    pub fn property_slot(&self, path: &str) -> Option<ValueSlot> {
        let (provider, name) = self.locate(path).ok()?;
        provider.slot(&name)
    }

    /// Writes through to the provider that currently owns `path`.
    ///
    /// # Errors
    ///
    /// `InvalidPath`, `PropertyNotFound`, or `ReadOnlyProperty` for the
    /// collection length properties.
    pub fn set<T: Property>(&self, path: &str, value: T) -> DataResult<()> {
        let (provider, name) = self.locate(path)?;
        if self.is_length_provider(&provider) {
            return Err(DataError::ReadOnlyProperty {
                path: path.to_owned(),
            });
        }
        provider.set(&name, value);
        Ok(())
    }

    /// Returns true if `path` currently resolves.
    #[must_use]
    pub fn has_property(&self, path: &str) -> bool {
        self.locate(path).is_ok()
    }

    /// Returns true if `path` resolves to a value of type `T`.
    #[must_use]
    pub fn property_has_type<T: Property>(&self, path: &str) -> bool {
        self.locate(path)
            .is_ok_and(|(provider, name)| provider.property_has_type::<T>(&name))
    }

    /// Every attachment occurrence, direct ones and collection items alike.
    #[must_use]
    pub fn providers(&self) -> Vec<ProviderPtr> {
        self.inner.state.borrow().providers.clone()
    }

    /// Attached collections.
    #[must_use]
    pub fn collections(&self) -> Vec<CollectionPtr> {
        self.inner
            .state
            .borrow()
            .collections
            .iter()
            .map(|attached| Rc::clone(&attached.collection))
            .collect()
    }

    /// First attached collection named `name`.
    #[must_use]
    pub fn collection(&self, name: &str) -> Option<CollectionPtr> {
        self.find_collection(name)
    }

    // =========================================================================
    // PROVIDERS
    // =========================================================================

    /// Attaches a provider directly.
    ///
    /// Fires added then changed for each of its properties, on every call,
    /// even when the provider is already attached.
    pub fn add_provider(&self, provider: &ProviderPtr) {
        self.inner
            .state
            .borrow_mut()
            .providers
            .push(Rc::clone(provider));
        self.attach(provider, &Scope::Root);
        tracing::debug!(uuid = provider.uuid(), "provider attached");

        for name in provider.property_names() {
            self.announce_added(provider, &name, std::slice::from_ref(&name), &[]);
        }
    }

    /// Detaches one direct attachment of `provider`.
    ///
    /// Changed then removed fire for its properties only when the last
    /// direct attachment goes away.
    ///
    /// # Errors
    ///
    /// `ProviderNotFound` if the provider is not directly attached.
    pub fn remove_provider(&self, provider: &ProviderPtr) -> DataResult<()> {
        let attached = self
            .inner
            .state
            .borrow()
            .attachments
            .iter()
            .any(|attachment| attachment.is(provider, &Scope::Root));
        if !attached || self.is_length_provider(provider) {
            return Err(DataError::ProviderNotFound {
                context: String::from("store"),
            });
        }

        self.unlist(provider);
        if self.detach(provider, &Scope::Root) {
            tracing::debug!(uuid = provider.uuid(), "provider detached");
            for name in provider.property_names() {
                self.announce_removed(provider, &name, std::slice::from_ref(&name), &[]);
            }
        }
        Ok(())
    }

    /// Appends `provider` to the collection `collection_name`, creating and
    /// attaching the collection if needed.
    ///
    /// An empty name attaches the provider directly.
    pub fn add_provider_to_collection(&self, provider: &ProviderPtr, collection_name: &str) {
        if collection_name.is_empty() {
            self.add_provider(provider);
            return;
        }

        let collection = if let Some(existing) = self.find_collection(collection_name) {
            existing
        } else {
            let created = Collection::new(collection_name);
            self.add_collection(&created);
            created
        };
        collection.push_back(Rc::clone(provider));
    }

    /// Removes the first occurrence of `provider` from `collection_name`.
    ///
    /// # Errors
    ///
    /// `CollectionNotFound` or `ProviderNotFound`.
    pub fn remove_provider_from_collection(
        &self,
        provider: &ProviderPtr,
        collection_name: &str,
    ) -> DataResult<()> {
        if collection_name.is_empty() {
            return self.remove_provider(provider);
        }

        let collection =
            self.find_collection(collection_name)
                .ok_or_else(|| DataError::CollectionNotFound {
                    name: collection_name.to_owned(),
                })?;
        collection.remove(provider).map(|_| ())
    }

    // =========================================================================
    // COLLECTIONS
    // =========================================================================

    /// Attaches a collection and all of its current items.
    ///
    /// Attaching an already attached collection does nothing.
    pub fn add_collection(&self, collection: &CollectionPtr) {
        let already = self
            .inner
            .state
            .borrow()
            .collections
            .iter()
            .any(|attached| Rc::ptr_eq(&attached.collection, collection));
        if already {
            tracing::warn!(name = collection.name(), "collection already attached");
            return;
        }

        let slots = [
            self.forward_items(collection.item_added(), Self::on_item_added),
            self.forward_items(collection.item_removed(), Self::on_item_removed),
        ];
        self.inner
            .state
            .borrow_mut()
            .collections
            .push(AttachedCollection::new(Rc::clone(collection), slots));
        tracing::debug!(name = collection.name(), len = collection.len(), "collection attached");

        let items = collection.items();
        let scope = Scope::Collection(Rc::clone(collection));
        for provider in &items {
            self.inner
                .state
                .borrow_mut()
                .providers
                .push(Rc::clone(provider));
            self.attach(provider, &scope);
        }
        for (index, provider) in items.iter().enumerate() {
            let first = first_position(&items, provider) == Some(index);
            for name in provider.property_names() {
                let paths = [item_path(collection.name(), index, &name)];
                let aliases = alias_for(first, collection, provider, &name);
                self.announce_added(provider, &name, &paths, &aliases);
            }
        }

        self.update_length(collection);
    }

    /// Detaches a collection and all of its items.
    ///
    /// The collection's length property is removed with it.
    ///
    /// # Errors
    ///
    /// `CollectionNotFound` if the collection is not attached.
    pub fn remove_collection(&self, collection: &CollectionPtr) -> DataResult<()> {
        let record = {
            let mut state = self.inner.state.borrow_mut();
            let index = state
                .collections
                .iter()
                .position(|attached| Rc::ptr_eq(&attached.collection, collection))
                .ok_or_else(|| DataError::CollectionNotFound {
                    name: collection.name().to_owned(),
                })?;
            state.collections.remove(index)
        };
        drop(record);
        tracing::debug!(name = collection.name(), "collection detached");

        let items = collection.items();
        let scope = Scope::Collection(Rc::clone(collection));
        for provider in &items {
            self.unlist(provider);
            self.detach(provider, &scope);
        }
        for (index, provider) in items.iter().enumerate() {
            let first = first_position(&items, provider) == Some(index);
            for name in provider.property_names() {
                let paths = [item_path(collection.name(), index, &name)];
                let aliases = alias_for(first, collection, provider, &name);
                self.announce_removed(provider, &name, &paths, &aliases);
            }
        }

        match self.find_collection(collection.name()) {
            Some(remaining) => self.update_length(&remaining),
            None => {
                let length_provider = self.inner.state.borrow().length_provider.clone();
                if let Some(length_provider) = length_provider {
                    length_provider.unset(&length_path(collection.name()));
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // SIGNALS
    // =========================================================================

    /// Catch-all signal fired when any property enters the namespace.
    #[inline]
    #[must_use]
    pub fn property_added(&self) -> &Signal<PropertyEvent> {
        &self.inner.property_added
    }

    /// Catch-all signal fired when any visible property changes.
    #[inline]
    #[must_use]
    pub fn property_changed(&self) -> &Signal<PropertyEvent> {
        &self.inner.property_changed
    }

    /// Catch-all signal fired when any property leaves the namespace.
    #[inline]
    #[must_use]
    pub fn property_removed(&self) -> &Signal<PropertyEvent> {
        &self.inner.property_removed
    }

    /// Added signal of one path, created on first request.
    pub fn property_added_at(&self, path: &str) -> Signal<PropertyEvent> {
        self.signal_at(SignalFamily::Added, path)
    }

    /// Changed signal of one path, created on first request.
    pub fn property_changed_at(&self, path: &str) -> Signal<PropertyEvent> {
        self.signal_at(SignalFamily::Changed, path)
    }

    /// Removed signal of one path, created on first request.
    pub fn property_removed_at(&self, path: &str) -> Signal<PropertyEvent> {
        self.signal_at(SignalFamily::Removed, path)
    }

    /// Returns true if an added signal currently exists for `path`.
    #[must_use]
    pub fn has_property_added_signal(&self, path: &str) -> bool {
        self.inner.registry.borrow().contains(SignalFamily::Added, path)
    }

    /// Returns true if a changed signal currently exists for `path`.
    #[must_use]
    pub fn has_property_changed_signal(&self, path: &str) -> bool {
        self.inner
            .registry
            .borrow()
            .contains(SignalFamily::Changed, path)
    }

    /// Returns true if a removed signal currently exists for `path`.
    #[must_use]
    pub fn has_property_removed_signal(&self, path: &str) -> bool {
        self.inner
            .registry
            .borrow()
            .contains(SignalFamily::Removed, path)
    }

    /// Number of live per-path signals, all families included.
    #[must_use]
    pub fn num_path_signals(&self) -> usize {
        self.inner.registry.borrow().len()
    }

    // =========================================================================
    // RESOLUTION
    // =========================================================================

    fn locate(&self, path: &str) -> DataResult<(ProviderPtr, String)> {
        let parsed = PropertyPath::parse(path)?;
        let state = self.inner.state.borrow();

        let found = match parsed {
            PropertyPath::Plain(name) => state
                .attachments
                .iter()
                .filter(|attachment| matches!(attachment.scope, Scope::Root))
                .find(|attachment| attachment.provider.has_property(name))
                .map(|attachment| (Rc::clone(&attachment.provider), name.to_owned())),
            PropertyPath::Item {
                collection,
                key,
                property,
            } => state
                .collections
                .iter()
                .find(|attached| attached.collection.name() == collection)
                .and_then(|attached| match key {
                    ItemKey::Index(index) => attached.collection.get(index),
                    ItemKey::Uuid(uuid) => attached.collection.find_by_uuid(uuid),
                })
                .filter(|provider| provider.has_property(property))
                .map(|provider| (provider, property.to_owned())),
        };

        found.ok_or_else(|| DataError::PropertyNotFound {
            path: path.to_owned(),
        })
    }

    fn find_collection(&self, name: &str) -> Option<CollectionPtr> {
        self.inner
            .state
            .borrow()
            .collections
            .iter()
            .find(|attached| attached.collection.name() == name)
            .map(|attached| Rc::clone(&attached.collection))
    }

    fn is_length_provider(&self, provider: &ProviderPtr) -> bool {
        self.inner
            .state
            .borrow()
            .length_provider
            .as_ref()
            .is_some_and(|length| Rc::ptr_eq(length, provider))
    }

    // =========================================================================
    // ATTACHMENTS
    // =========================================================================

    /// Records one more attachment of `provider` in `scope`.
    ///
    /// Returns true if this is the first one.
    fn attach(&self, provider: &ProviderPtr, scope: &Scope) -> bool {
        {
            let mut state = self.inner.state.borrow_mut();
            if let Some(attachment) = state
                .attachments
                .iter_mut()
                .find(|attachment| attachment.is(provider, scope))
            {
                attachment.count += 1;
                return false;
            }
        }

        let slots = [
            self.forward_provider(provider.property_added(), scope, Self::on_provider_added),
            self.forward_provider(provider.property_changed(), scope, Self::on_provider_changed),
            self.forward_provider(provider.property_removed(), scope, Self::on_provider_removed),
        ];
        self.inner.state.borrow_mut().attachments.push(Attachment::new(
            Rc::clone(provider),
            scope.clone(),
            slots,
        ));
        true
    }

    /// Drops one attachment of `provider` in `scope`.
    ///
    /// Returns true if it was the last one.
    fn detach(&self, provider: &ProviderPtr, scope: &Scope) -> bool {
        let removed = {
            let mut state = self.inner.state.borrow_mut();
            let Some(index) = state
                .attachments
                .iter()
                .position(|attachment| attachment.is(provider, scope))
            else {
                return false;
            };
            let attachment = &mut state.attachments[index];
            attachment.count -= 1;
            if attachment.count > 0 {
                return false;
            }
            state.attachments.remove(index)
        };
        // Disconnects the forwarding slots outside of the state borrow.
        drop(removed);
        true
    }

    /// Removes the first listed occurrence of `provider`.
    fn unlist(&self, provider: &ProviderPtr) {
        let mut state = self.inner.state.borrow_mut();
        if let Some(index) = state
            .providers
            .iter()
            .position(|listed| Rc::ptr_eq(listed, provider))
        {
            state.providers.remove(index);
        }
    }

    fn forward_provider(
        &self,
        signal: &Signal<ProviderEvent>,
        scope: &Scope,
        handler: ProviderHandler,
    ) -> SignalSlot {
        let weak = Rc::downgrade(&self.inner);
        let scope = scope.clone();
        signal.connect(move |event: &ProviderEvent| {
            if let Some(inner) = weak.upgrade() {
                handler(&Store { inner }, &event.provider, &scope, &event.name);
            }
        })
    }

    fn forward_items(
        &self,
        signal: &Signal<CollectionEvent>,
        handler: CollectionHandler,
    ) -> SignalSlot {
        let weak = Rc::downgrade(&self.inner);
        signal.connect(move |event: &CollectionEvent| {
            if let Some(inner) = weak.upgrade() {
                handler(&Store { inner }, &event.collection, &event.provider, event.index);
            }
        })
    }

    fn length_provider(&self) -> ProviderPtr {
        let existing = self.inner.state.borrow().length_provider.clone();
        if let Some(provider) = existing {
            return provider;
        }

        let provider = Provider::new();
        self.inner.state.borrow_mut().length_provider = Some(Rc::clone(&provider));
        self.attach(&provider, &Scope::Root);
        provider
    }

    fn update_length(&self, collection: &CollectionPtr) {
        let len = length_value(collection.name(), collection.len());
        self.length_provider()
            .set(&length_path(collection.name()), len);
    }

    // =========================================================================
    // PROVIDER AND COLLECTION HANDLERS
    // =========================================================================

    fn on_provider_added(&self, provider: &ProviderPtr, scope: &Scope, name: &str) {
        let (paths, aliases) = scope_paths(provider, scope, name);
        self.announce_added(provider, name, &paths, &aliases);
    }

    fn on_provider_changed(&self, provider: &ProviderPtr, scope: &Scope, name: &str) {
        let (paths, aliases) = scope_paths(provider, scope, name);
        self.emit(SignalFamily::Changed, provider, name, &paths, &aliases);
    }

    fn on_provider_removed(&self, provider: &ProviderPtr, scope: &Scope, name: &str) {
        let (paths, aliases) = scope_paths(provider, scope, name);
        self.announce_removed(provider, name, &paths, &aliases);
    }

    fn on_item_added(&self, collection: &CollectionPtr, provider: &ProviderPtr, index: usize) {
        let after = collection.items();
        let mut before = after.clone();
        if index < before.len() {
            before.remove(index);
        }

        self.inner
            .state
            .borrow_mut()
            .providers
            .push(Rc::clone(provider));
        let first = self.attach(provider, &Scope::Collection(Rc::clone(collection)));

        // Each further attachment is reported at the first occurrence too.
        if !first {
            let earlier = after
                .iter()
                .position(|item| Rc::ptr_eq(item, provider))
                .filter(|&earlier| earlier != index);
            if let Some(earlier) = earlier {
                for name in provider.property_names() {
                    let paths = [item_path(collection.name(), earlier, &name)];
                    self.announce_added(provider, &name, &paths, &[]);
                }
            }
        }

        self.reindex(collection, &before, &after, index);
        if first {
            for name in provider.property_names() {
                let aliases = [uuid_path(collection.name(), provider.uuid(), &name)];
                self.announce_added(provider, &name, &[], &aliases);
            }
        }
        self.update_length(collection);
    }

    fn on_item_removed(&self, collection: &CollectionPtr, provider: &ProviderPtr, index: usize) {
        let after = collection.items();
        let mut before = after.clone();
        before.insert(index.min(before.len()), Rc::clone(provider));

        self.unlist(provider);
        let last = self.detach(provider, &Scope::Collection(Rc::clone(collection)));

        self.reindex(collection, &before, &after, index);
        if last {
            for name in provider.property_names() {
                let aliases = [uuid_path(collection.name(), provider.uuid(), &name)];
                self.announce_removed(provider, &name, &[], &aliases);
            }
        }
        self.update_length(collection);
    }

    /// Reports every positional path from `from` on whose provider differs
    /// between `before` and `after`.
    fn reindex(
        &self,
        collection: &CollectionPtr,
        before: &[ProviderPtr],
        after: &[ProviderPtr],
        from: usize,
    ) {
        let end = before.len().max(after.len());
        for index in from..end {
            let old = before.get(index);
            let new = after.get(index);
            if let (Some(old), Some(new)) = (old, new) {
                if Rc::ptr_eq(old, new) {
                    continue;
                }
            }

            if let Some(old) = old {
                for name in old.property_names() {
                    let paths = [item_path(collection.name(), index, &name)];
                    self.announce_removed(old, &name, &paths, &[]);
                }
            }
            if let Some(new) = new {
                for name in new.property_names() {
                    let paths = [item_path(collection.name(), index, &name)];
                    self.announce_added(new, &name, &paths, &[]);
                }
            }
        }
    }

    // =========================================================================
    // NOTIFICATION
    // =========================================================================

    fn announce_added(&self, provider: &ProviderPtr, name: &str, paths: &[String], aliases: &[String]) {
        self.emit(SignalFamily::Added, provider, name, paths, aliases);
        self.emit(SignalFamily::Changed, provider, name, paths, aliases);
    }

    fn announce_removed(&self, provider: &ProviderPtr, name: &str, paths: &[String], aliases: &[String]) {
        self.emit(SignalFamily::Changed, provider, name, paths, aliases);
        self.emit(SignalFamily::Removed, provider, name, paths, aliases);

        for path in paths.iter().chain(aliases) {
            for family in SignalFamily::ALL {
                self.release_signal(family, path);
            }
        }
    }

    /// Fires `family` for every path (per-path signal then catch-all) and
    /// for every alias (per-path signal only).
    fn emit(
        &self,
        family: SignalFamily,
        provider: &ProviderPtr,
        name: &str,
        paths: &[String],
        aliases: &[String],
    ) {
        let general = self.general(family);

        for path in paths {
            let specific = self.inner.registry.borrow().get(family, path);
            if specific.is_none() && general.num_callbacks() == 0 {
                continue;
            }
            let event = self.event(provider, name, path);
            if let Some(signal) = specific {
                self.execute_at(family, path, signal, &event);
            }
            general.execute(&event);
        }

        for alias in aliases {
            let specific = self.inner.registry.borrow().get(family, alias);
            if let Some(signal) = specific {
                let event = self.event(provider, name, alias);
                self.execute_at(family, alias, signal, &event);
            }
        }
    }

    fn execute_at(&self, family: SignalFamily, path: &str, signal: Signal<PropertyEvent>, event: &PropertyEvent) {
        signal.execute(event);
        let idle = signal.num_callbacks() == 0;
        drop(signal);
        if idle {
            self.release_signal(family, path);
        }
    }

    fn event(&self, provider: &ProviderPtr, name: &str, path: &str) -> PropertyEvent {
        PropertyEvent {
            store: self.clone(),
            provider: Rc::clone(provider),
            property_name: name.to_owned(),
            path: path.to_owned(),
        }
    }

    fn general(&self, family: SignalFamily) -> &Signal<PropertyEvent> {
        match family {
            SignalFamily::Added => &self.inner.property_added,
            SignalFamily::Changed => &self.inner.property_changed,
            SignalFamily::Removed => &self.inner.property_removed,
        }
    }

    fn signal_at(&self, family: SignalFamily, path: &str) -> Signal<PropertyEvent> {
        if let Some(signal) = self.inner.registry.borrow().get(family, path) {
            return signal;
        }

        let signal = Signal::new();
        let weak = Rc::downgrade(&self.inner);
        let owned = path.to_owned();
        signal.set_on_empty(move || {
            if let Some(inner) = weak.upgrade() {
                Store { inner }.release_signal(family, &owned);
            }
        });
        self.inner
            .registry
            .borrow_mut()
            .insert(family, path, signal.clone());
        signal
    }

    /// Frees the per-path signal if it is unobservable and `path` does not
    /// resolve.
    fn release_signal(&self, family: SignalFamily, path: &str) {
        // A store mid-mutation counts as resolving: retried on next removal.
        let resolves = match self.inner.state.try_borrow() {
            Ok(state) => {
                drop(state);
                self.has_property(path)
            }
            Err(_) => true,
        };
        if resolves {
            return;
        }

        let released = match self.inner.registry.try_borrow_mut() {
            Ok(mut registry) => registry.release_if_idle(family, path),
            Err(_) => None,
        };
        if released.is_some() {
            tracing::trace!(path, ?family, "released path signal");
        }
        drop(released);
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.state.try_borrow() {
            Ok(state) => f
                .debug_struct("Store")
                .field("providers", &state.providers.len())
                .field("collections", &state.collections.len())
                .finish(),
            Err(_) => f.debug_struct("Store").finish_non_exhaustive(),
        }
    }
}

/// Positional paths and uuid aliases under which `provider`'s property
/// `name` is visible in `scope`.
fn scope_paths(provider: &ProviderPtr, scope: &Scope, name: &str) -> (Vec<String>, Vec<String>) {
    match scope {
        Scope::Root => (vec![name.to_owned()], Vec::new()),
        Scope::Collection(collection) => (
            collection
                .positions(provider)
                .into_iter()
                .map(|index| item_path(collection.name(), index, name))
                .collect(),
            vec![uuid_path(collection.name(), provider.uuid(), name)],
        ),
    }
}

fn first_position(items: &[ProviderPtr], provider: &ProviderPtr) -> Option<usize> {
    items.iter().position(|item| Rc::ptr_eq(item, provider))
}

fn alias_for(first: bool, collection: &CollectionPtr, provider: &ProviderPtr, name: &str) -> Vec<String> {
    if first {
        vec![uuid_path(collection.name(), provider.uuid(), name)]
    } else {
        Vec::new()
    }
}

/// Rewrites provider-level errors to report the store path.
fn at_path(err: DataError, path: &str) -> DataError {
    match err {
        DataError::PropertyNotFound { .. } => DataError::PropertyNotFound {
            path: path.to_owned(),
        },
        DataError::TypeMismatch {
            expected, found, ..
        } => DataError::TypeMismatch {
            path: path.to_owned(),
            expected,
            found,
        },
        other => other,
    }
}

/// Collection lengths are published as `u32`.
fn length_value(name: &str, len: usize) -> u32 {
    u32::try_from(len).unwrap_or_else(|_| {
        tracing::warn!(name, len, "collection length exceeds u32, saturating");
        u32::MAX
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_lookup_first_attached_wins() {
        let store = Store::new();
        let a = Provider::new();
        let b = Provider::new();
        a.set("foo", 1);
        b.set("foo", 2);

        store.add_provider(&a);
        store.add_provider(&b);
        assert_eq!(store.get::<i32>("foo"), Ok(1));

        assert!(store.remove_provider(&a).is_ok());
        assert_eq!(store.get::<i32>("foo"), Ok(2));
    }

    #[test]
    fn test_type_mismatch_reports_store_path() {
        let store = Store::new();
        let p = Provider::new();
        p.set("foo", 1);
        store.add_provider_to_collection(&p, "bar");

        assert_eq!(
            store.get::<f32>("bar[0].foo"),
            Err(DataError::TypeMismatch {
                path: String::from("bar[0].foo"),
                expected: "f32",
                found: "i32",
            })
        );
    }

    #[test]
    fn test_length_is_read_only() {
        let store = Store::new();
        store.add_collection(&Collection::new("lights"));

        assert!(matches!(
            store.set("lights.length", 3u32),
            Err(DataError::ReadOnlyProperty { .. })
        ));
        assert!(store.remove_provider(&Provider::new()).is_err());
    }

    #[test]
    fn test_set_writes_through() {
        let store = Store::new();
        let p = Provider::new();
        p.set("foo", 1);
        store.add_provider_to_collection(&p, "bar");

        assert!(store.set("bar[0].foo", 5).is_ok());
        assert_eq!(p.get::<i32>("foo"), Ok(5));
        assert!(store.set("missing", 5).is_err());
    }

    #[test]
    fn test_scope_paths_cover_every_position() {
        let c = Collection::new("bar");
        let p = Provider::new();
        c.push_back(Rc::clone(&p)).push_back(Provider::new()).push_back(Rc::clone(&p));

        let (paths, aliases) = scope_paths(&p, &Scope::Collection(Rc::clone(&c)), "foo");

        assert_eq!(paths, vec!["bar[0].foo".to_owned(), "bar[2].foo".to_owned()]);
        assert_eq!(aliases, vec![format!("bar[{}].foo", p.uuid())]);
    }

    #[test]
    fn test_length_value_saturates() {
        assert_eq!(length_value("bar", 3), 3);
        assert_eq!(length_value("bar", usize::MAX), u32::MAX);
    }
}

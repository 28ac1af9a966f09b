//! # Providers
//!
//! A provider is an identity-bearing bag of named, typed properties.
//!
//! - Each provider carries a process-unique uuid (a ULID string)
//! - Writes notify only on actual change (same type and equal value is silent)
//! - Property addresses are stable across same-type writes
//!
//! Providers are shared as `ProviderPtr` (`Rc<Provider>`): the same provider
//! can be attached to several stores and collections at once.

use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::{any, cell::RefCell};

use ulid::Ulid;

use crate::error::{DataError, DataResult};
use crate::signal::Signal;
use crate::value::{Property, ValueSlot};

/// Shared provider handle.
pub type ProviderPtr = Rc<Provider>;

/// Payload of every provider signal.
#[derive(Clone, Debug)]
pub struct ProviderEvent {
    /// The provider that changed.
    pub provider: ProviderPtr,
    /// The affected property name.
    pub name: String,
}

/// A named bag of typed properties.
///
/// # Example
///
/// ```rust,ignore
/// let material = Provider::new();
/// material
///     .set("diffuseColor", [1.0f32, 0.0, 0.0, 1.0])
///     .set("priority", 2000.0f32);
///
/// assert_eq!(material.get::<f32>("priority")?, 2000.0);
/// ```
pub struct Provider {
    uuid: String,
    /// Property cells, by name.
    values: RefCell<HashMap<String, ValueSlot>>,
    /// Property names in insertion order.
    names: RefCell<Vec<String>>,
    property_added: Signal<ProviderEvent>,
    property_changed: Signal<ProviderEvent>,
    property_removed: Signal<ProviderEvent>,
    changed_by_name: RefCell<HashMap<String, Signal<ProviderEvent>>>,
    removed_by_name: RefCell<HashMap<String, Signal<ProviderEvent>>>,
    this: Weak<Provider>,
}

impl Provider {
    /// Creates an empty provider with a fresh uuid.
    #[allow(clippy::new_ret_no_self)]
    #[must_use]
    pub fn new() -> ProviderPtr {
        Self::with_uuid(Ulid::new().to_string())
    }

    /// Creates an empty provider with a caller-chosen uuid.
    #[must_use]
    pub fn with_uuid(uuid: impl Into<String>) -> ProviderPtr {
        let uuid = uuid.into();
        Rc::new_cyclic(|this| Self {
            uuid,
            values: RefCell::new(HashMap::new()),
            names: RefCell::new(Vec::new()),
            property_added: Signal::new(),
            property_changed: Signal::new(),
            property_removed: Signal::new(),
            changed_by_name: RefCell::new(HashMap::new()),
            removed_by_name: RefCell::new(HashMap::new()),
            this: this.clone(),
        })
    }

    /// Creates a new provider holding deep copies of `source`'s properties.
    ///
    /// The copy gets its own uuid and its own signals.
    #[must_use]
    pub fn duplicate(source: &Provider) -> ProviderPtr {
        let copy = Self::new();
        {
            let values = source.values.borrow();
            let mut target = copy.values.borrow_mut();
            for name in source.names.borrow().iter() {
                if let Some(slot) = values.get(name) {
                    target.insert(name.clone(), ValueSlot::new(slot.clone_value()));
                }
            }
        }
        copy.names.borrow_mut().clone_from(&source.names.borrow());
        copy
    }

    /// Returns the provider's uuid.
    #[inline]
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Writes a property.
    ///
    /// Fires `property_added` when the name is new. Otherwise, if the value
    /// actually changed, fires the per-name changed signal followed by the
    /// general `property_changed`.
    ///
    /// # Returns
    ///
    /// `self`, for chaining.
    pub fn set<T: Property>(&self, name: &str, value: T) -> &Self {
        let existing = self.values.borrow().get(name).cloned();

        match existing {
            Some(slot) => {
                if slot.store(value) {
                    self.notify_changed(name);
                }
            }
            None => {
                self.values
                    .borrow_mut()
                    .insert(name.to_owned(), ValueSlot::new(Box::new(value)));
                self.names.borrow_mut().push(name.to_owned());
                self.notify(&self.property_added, name);
            }
        }
        self
    }

    /// Removes a property.
    ///
    /// Fires the per-name removed signal then the general
    /// `property_removed`. Does nothing if the property is absent.
    ///
    /// # Returns
    ///
    /// `true` if a property was removed.
    pub fn unset(&self, name: &str) -> bool {
        if self.values.borrow_mut().remove(name).is_none() {
            return false;
        }
        self.names.borrow_mut().retain(|n| n != name);

        let specific = self.removed_by_name.borrow().get(name).cloned();
        if let Some(signal) = specific {
            self.notify(&signal, name);
        }
        self.notify(&self.property_removed, name);
        true
    }

    /// Exchanges the values of two properties.
    ///
    /// Both properties must exist. Fires changed for both names.
    ///
    /// # Errors
    ///
    /// Returns `PropertyNotFound` if either name is missing.
    pub fn swap(&self, first: &str, second: &str) -> DataResult<()> {
        let a = self.slot_or_err(first)?;
        let b = self.slot_or_err(second)?;
        if a.ptr_eq(&b) {
            return Ok(());
        }

        a.swap(&b);
        self.notify_changed(first);
        self.notify_changed(second);
        Ok(())
    }

    /// Reads a copy of a property.
    ///
    /// # Errors
    ///
    /// `PropertyNotFound` if absent, `TypeMismatch` if stored as another type.
    pub fn get<T: Property>(&self, name: &str) -> DataResult<T> {
        let slot = self.slot_or_err(name)?;
        slot.get::<T>().ok_or_else(|| DataError::TypeMismatch {
            path: name.to_owned(),
            expected: any::type_name::<T>(),
            found: slot.type_name(),
        })
    }

    /// Returns the stable address of a property's value.
    ///
    /// # Errors
    ///
    /// `PropertyNotFound` if absent, `TypeMismatch` if stored as another type.
    pub fn get_pointer<T: Property>(&self, name: &str) -> DataResult<*const T> {
        let slot = self.slot_or_err(name)?;
        slot.pointer::<T>().ok_or_else(|| DataError::TypeMismatch {
            path: name.to_owned(),
            expected: any::type_name::<T>(),
            found: slot.type_name(),
        })
    }

    /// Returns the cell backing a property.
    #[must_use]
    pub fn slot(&self, name: &str) -> Option<ValueSlot> {
        self.values.borrow().get(name).cloned()
    }

    /// Returns true if the property exists.
    #[inline]
    #[must_use]
    pub fn has_property(&self, name: &str) -> bool {
        self.values.borrow().contains_key(name)
    }

    /// Returns true if the property exists and holds a `T`.
    #[must_use]
    pub fn property_has_type<T: Property>(&self, name: &str) -> bool {
        self.values
            .borrow()
            .get(name)
            .is_some_and(ValueSlot::is::<T>)
    }

    /// Property names, in insertion order.
    #[must_use]
    pub fn property_names(&self) -> Vec<String> {
        self.names.borrow().clone()
    }

    /// Number of properties.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.borrow().len()
    }

    /// Returns true if the provider holds no property.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.borrow().is_empty()
    }

    /// Fired when a new property name is written.
    #[inline]
    #[must_use]
    pub fn property_added(&self) -> &Signal<ProviderEvent> {
        &self.property_added
    }

    /// Fired when an existing property's value changes.
    #[inline]
    #[must_use]
    pub fn property_changed(&self) -> &Signal<ProviderEvent> {
        &self.property_changed
    }

    /// Fired when a property is removed.
    #[inline]
    #[must_use]
    pub fn property_removed(&self) -> &Signal<ProviderEvent> {
        &self.property_removed
    }

    /// Changed signal restricted to one property name.
    pub fn property_changed_for(&self, name: &str) -> Signal<ProviderEvent> {
        self.changed_by_name
            .borrow_mut()
            .entry(name.to_owned())
            .or_default()
            .clone()
    }

    /// Removed signal restricted to one property name.
    pub fn property_removed_for(&self, name: &str) -> Signal<ProviderEvent> {
        self.removed_by_name
            .borrow_mut()
            .entry(name.to_owned())
            .or_default()
            .clone()
    }

    fn slot_or_err(&self, name: &str) -> DataResult<ValueSlot> {
        self.slot(name).ok_or_else(|| DataError::PropertyNotFound {
            path: name.to_owned(),
        })
    }

    fn notify_changed(&self, name: &str) {
        let specific = self.changed_by_name.borrow().get(name).cloned();
        if let Some(signal) = specific {
            self.notify(&signal, name);
        }
        self.notify(&self.property_changed, name);
    }

    fn notify(&self, signal: &Signal<ProviderEvent>, name: &str) {
        if signal.num_callbacks() == 0 {
            return;
        }
        // Only reachable through a live `ProviderPtr`.
        let Some(provider) = self.this.upgrade() else {
            return;
        };
        signal.execute(&ProviderEvent {
            provider,
            name: name.to_owned(),
        });
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("uuid", &self.uuid)
            .field("properties", &self.names.borrow())
            .finish()
    }
}

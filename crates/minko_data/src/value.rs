//! # Property Values
//!
//! Type-erased, stably addressed property storage.
//!
//! Every property lives in its own heap cell. Overwriting a property with a
//! value of the same type mutates the cell in place, so the address handed
//! out by `ValueSlot::address` (and `Provider::get_pointer`) stays valid for
//! as long as the property exists with that type.

use std::any::{self, Any};
use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::Rc;

/// Any value that can be stored in a provider.
///
/// Blanket-implemented for every `'static` type that is `Clone`,
/// `PartialEq` and `Debug`: numbers, arrays of floats, strings, enums...
pub trait Property: Any + Clone + PartialEq + fmt::Debug {}

impl<T> Property for T where T: Any + Clone + PartialEq + fmt::Debug {}

/// Object-safe view of a stored property value.
pub trait PropertyValue: Any + fmt::Debug {
    /// Upcast for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Value equality across erased values of possibly different types.
    fn equals(&self, other: &dyn PropertyValue) -> bool;

    /// Deep copy.
    fn clone_value(&self) -> Box<dyn PropertyValue>;

    /// Name of the concrete type, for diagnostics.
    fn type_name(&self) -> &'static str;

    /// Exchanges values in place with `other` if both have the same type.
    ///
    /// Returns false, leaving both untouched, on a type mismatch.
    fn swap_value(&mut self, other: &mut dyn PropertyValue) -> bool;
}

impl<T: Property> PropertyValue for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn equals(&self, other: &dyn PropertyValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| other == self)
    }

    fn clone_value(&self) -> Box<dyn PropertyValue> {
        Box::new(self.clone())
    }

    fn type_name(&self) -> &'static str {
        any::type_name::<T>()
    }

    fn swap_value(&mut self, other: &mut dyn PropertyValue) -> bool {
        match other.as_any_mut().downcast_mut::<T>() {
            Some(other) => {
                mem::swap(self, other);
                true
            }
            None => false,
        }
    }
}

/// Shared handle on one property cell.
///
/// Cloning the slot does not copy the value: both handles observe the same
/// cell. Consumers that bind to a property (draw calls, pointers) hold a
/// slot and read through it.
#[derive(Clone)]
pub struct ValueSlot {
    cell: Rc<RefCell<Box<dyn PropertyValue>>>,
}

impl ValueSlot {
    /// Wraps a value into a fresh cell.
    pub(crate) fn new(value: Box<dyn PropertyValue>) -> Self {
        Self {
            cell: Rc::new(RefCell::new(value)),
        }
    }

    /// Returns a copy of the value if it has type `T`.
    #[must_use]
    pub fn get<T: Property>(&self) -> Option<T> {
        self.cell.borrow().as_any().downcast_ref::<T>().cloned()
    }

    /// Runs `f` on the value if it has type `T`.
    pub fn with<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.cell.borrow().as_any().downcast_ref::<T>().map(f)
    }

    /// Runs `f` on the erased value.
    pub fn with_value<R>(&self, f: impl FnOnce(&dyn PropertyValue) -> R) -> R {
        f(&**self.cell.borrow())
    }

    /// Returns true if the value has type `T`.
    #[inline]
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.cell.borrow().as_any().is::<T>()
    }

    /// Typed address of the value, if it has type `T`.
    #[must_use]
    pub fn pointer<T: Any>(&self) -> Option<*const T> {
        self.cell
            .borrow()
            .as_any()
            .downcast_ref::<T>()
            .map(|value| value as *const T)
    }

    /// Untyped address of the value.
    ///
    /// Stable across same-type writes; changes when the property is
    /// overwritten with a value of another type.
    #[must_use]
    pub fn address(&self) -> *const u8 {
        let value = self.cell.borrow();
        value.as_any() as *const dyn Any as *const u8
    }

    /// Name of the stored type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.cell.borrow().type_name()
    }

    /// Returns true if both slots share one cell.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    /// Deep copy of the stored value.
    pub(crate) fn clone_value(&self) -> Box<dyn PropertyValue> {
        self.cell.borrow().clone_value()
    }

    /// Writes `value`, in place when the type is unchanged.
    ///
    /// # Returns
    ///
    /// `true` if the stored value actually changed.
    pub(crate) fn store<T: Property>(&self, value: T) -> bool {
        let mut current = self.cell.borrow_mut();
        if let Some(current) = current.as_any_mut().downcast_mut::<T>() {
            if *current == value {
                return false;
            }
            *current = value;
            return true;
        }
        *current = Box::new(value);
        true
    }

    /// Exchanges the contents of two cells.
    ///
    /// Same-type values are exchanged in place and keep their addresses.
    pub(crate) fn swap(&self, other: &Self) {
        if self.ptr_eq(other) {
            return;
        }
        let mut mine = self.cell.borrow_mut();
        let mut theirs = other.cell.borrow_mut();
        if !mine.swap_value(&mut **theirs) {
            mem::swap(&mut *mine, &mut *theirs);
        }
    }
}

impl fmt::Debug for ValueSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self.cell.borrow(), f)
    }
}

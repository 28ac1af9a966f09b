//! # Signals
//!
//! Synchronous, single-threaded observer lists.
//!
//! - `Signal<A>` is a cheap, cloneable handle: clones share one callback list
//! - `connect` returns a `SignalSlot`; dropping the slot disconnects the callback
//! - `execute` runs callbacks in connection order, on the caller's stack
//!
//! Callbacks may connect, disconnect or execute other signals while running.
//! A callback disconnected during an execution is not invoked afterwards.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<A> = Rc<dyn Fn(&A)>;

/// Hook invoked when the last callback of a signal is disconnected.
type EmptyHook = Rc<dyn Fn()>;

struct SignalInner<A> {
    /// Connected callbacks, keyed by connection id.
    callbacks: RefCell<Vec<(u64, Callback<A>)>>,
    /// Next connection id.
    next_id: Cell<u64>,
    /// Optional owner notification, see `Signal::set_on_empty`.
    on_empty: RefCell<Option<EmptyHook>>,
}

/// A synchronous observer list carrying arguments of type `A`.
///
/// # Example
///
/// ```rust,ignore
/// let signal: Signal<i32> = Signal::new();
/// let slot = signal.connect(|value| println!("got {value}"));
///
/// signal.execute(&42);
/// drop(slot); // disconnected
/// assert_eq!(signal.num_callbacks(), 0);
/// ```
pub struct Signal<A> {
    inner: Rc<SignalInner<A>>,
}

impl<A: 'static> Signal<A> {
    /// Creates a signal with no callbacks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(SignalInner {
                callbacks: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
                on_empty: RefCell::new(None),
            }),
        }
    }

    /// Connects a callback.
    ///
    /// # Returns
    ///
    /// A slot owning the connection. The callback stays connected until the
    /// slot is dropped or explicitly disconnected.
    pub fn connect<F>(&self, callback: F) -> SignalSlot
    where
        F: Fn(&A) + 'static,
    {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .callbacks
            .borrow_mut()
            .push((id, Rc::new(callback)));

        let weak: Weak<SignalInner<A>> = Rc::downgrade(&self.inner);
        SignalSlot {
            disconnect: Some(Box::new(move || disconnect(&weak, id))),
        }
    }

    /// Runs every connected callback with `args`.
    pub fn execute(&self, args: &A) {
        let snapshot: Vec<(u64, Callback<A>)> = self
            .inner
            .callbacks
            .borrow()
            .iter()
            .map(|(id, callback)| (*id, Rc::clone(callback)))
            .collect();

        for (id, callback) in snapshot {
            if self.is_connected(id) {
                callback(args);
            }
        }
    }

    /// Returns the number of connected callbacks.
    #[inline]
    #[must_use]
    pub fn num_callbacks(&self) -> usize {
        self.inner.callbacks.borrow().len()
    }

    /// Returns true if both handles share the same callback list.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of live handles on this signal, owner included.
    #[inline]
    pub(crate) fn handle_count(&self) -> usize {
        Rc::strong_count(&self.inner)
    }

    /// Installs a hook called each time the callback count drops to zero
    /// through a slot disconnection.
    pub(crate) fn set_on_empty<F>(&self, hook: F)
    where
        F: Fn() + 'static,
    {
        *self.inner.on_empty.borrow_mut() = Some(Rc::new(hook));
    }

    fn is_connected(&self, id: u64) -> bool {
        self.inner
            .callbacks
            .borrow()
            .iter()
            .any(|(connected, _)| *connected == id)
    }
}

fn disconnect<A>(weak: &Weak<SignalInner<A>>, id: u64) {
    let Some(inner) = weak.upgrade() else {
        return;
    };

    let now_empty = {
        let mut callbacks = inner.callbacks.borrow_mut();
        let before = callbacks.len();
        callbacks.retain(|(connected, _)| *connected != id);
        before != callbacks.len() && callbacks.is_empty()
    };
    if !now_empty {
        return;
    }

    let hook = inner.on_empty.borrow().clone();
    // The hook may inspect the handle count, release ours first.
    drop(inner);
    if let Some(hook) = hook {
        hook();
    }
}

impl<A: 'static> Default for Signal<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for Signal<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A> fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("callbacks", &self.inner.callbacks.borrow().len())
            .finish()
    }
}

/// Owner of one signal connection.
///
/// Dropping the slot disconnects the callback.
#[must_use = "dropping a SignalSlot disconnects its callback immediately"]
pub struct SignalSlot {
    disconnect: Option<Box<dyn FnOnce()>>,
}

impl SignalSlot {
    /// Disconnects the callback now.
    pub fn disconnect(mut self) {
        if let Some(disconnect) = self.disconnect.take() {
            disconnect();
        }
    }
}

impl Drop for SignalSlot {
    fn drop(&mut self) {
        if let Some(disconnect) = self.disconnect.take() {
            disconnect();
        }
    }
}

impl fmt::Debug for SignalSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalSlot")
            .field("connected", &self.disconnect.is_some())
            .finish()
    }
}
